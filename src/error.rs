use thiserror::Error;

/// Which kind of device a statistics record describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    VirtualDisk,
    DiskDrive,
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceKind::VirtualDisk => write!(f, "virtual disk"),
            DeviceKind::DiskDrive => write!(f, "disk drive"),
        }
    }
}

/// Errors raised by the polling/aggregation core.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("unexpected IO {histogram} index labels for {host} {device_kind} {index}")]
    SchemaMismatch {
        host: String,
        device_kind: DeviceKind,
        index: u32,
        histogram: &'static str,
    },

    #[error("no LUN mapped to virtual disk {index}")]
    MappingNotFound { index: u32 },

    #[error("time series {metric} for device {device} has {samples} usable sample(s), need 2")]
    EmptyTimeSeries {
        metric: &'static str,
        device: u32,
        samples: usize,
    },

    #[error("failed to fetch {what} from {host}")]
    HardwareFetch {
        host: String,
        what: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("controller {host} firmware '{found}' is too old, minimum is '{minimum}'")]
    MinimumVersionUnmet {
        host: String,
        found: String,
        minimum: String,
    },

    #[error("malformed firmware version '{version}'")]
    MalformedVersion { version: String },

    #[error("invalid poll schedule: {0}")]
    InvalidSchedule(String),
}

impl PollError {
    /// Per-device and per-metric conditions are skipped for one tick;
    /// everything else stops the controller instance.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            PollError::MappingNotFound { .. } | PollError::EmptyTimeSeries { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PollError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_device_errors_are_not_fatal() {
        assert!(!PollError::MappingNotFound { index: 3 }.is_fatal());
        assert!(!PollError::EmptyTimeSeries {
            metric: "lun_read_iops",
            device: 1,
            samples: 1
        }
        .is_fatal());
        assert!(PollError::MalformedVersion {
            version: "x".into()
        }
        .is_fatal());
    }

    #[test]
    fn schema_mismatch_names_host_and_device() {
        let err = PollError::SchemaMismatch {
            host: "sfa-a".into(),
            device_kind: DeviceKind::VirtualDisk,
            index: 7,
            histogram: "size",
        };
        let msg = err.to_string();
        assert!(msg.contains("sfa-a"));
        assert!(msg.contains("virtual disk 7"));
    }
}
