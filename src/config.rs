use crate::domain::timeseries::DEFAULT_CAPACITY;
use crate::poller::TierSchedule;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub hardware: HardwareConfig,
    #[serde(default)]
    pub controllers: Vec<ControllerConfig>,
    pub line_protocol: Option<LineProtocolConfig>,
    pub log_sink: Option<LogSinkConfig>,
}

/// Fast interval in seconds; medium and slow are multiples of it.
/// 2.0, 15 and 60 poll every 2 seconds, 30 seconds and 2 minutes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub fast_poll_interval: f64,
    pub med_poll_multiple: u64,
    pub slow_poll_multiple: u64,
    /// Window in seconds for published rate averages
    pub average_span: f64,
    pub series_capacity: usize,
    pub collect_disk_drives: bool,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            fast_poll_interval: 2.0,
            med_poll_multiple: 15,
            slow_poll_multiple: 60,
            average_span: 60.0,
            series_capacity: DEFAULT_CAPACITY,
            collect_disk_drives: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    pub program: String,
    pub args: Vec<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            program: "sfa-query".to_string(),
            args: Vec::new(),
            user: None,
            password: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControllerConfig {
    pub address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineProtocolConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSinkConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::parse(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let p = &self.polling;
        if !(p.fast_poll_interval.is_finite() && p.fast_poll_interval > 0.0) {
            anyhow::bail!("fast_poll_interval must be a positive number of seconds");
        }
        if p.med_poll_multiple == 0 || p.slow_poll_multiple == 0 {
            anyhow::bail!("med_poll_multiple and slow_poll_multiple must be at least 1");
        }
        if p.series_capacity < 2 {
            anyhow::bail!("series_capacity must hold at least 2 samples");
        }
        if !(p.average_span.is_finite() && p.average_span > 0.0) {
            anyhow::bail!("average_span must be a positive number of seconds");
        }
        if self.controllers.is_empty() {
            anyhow::bail!("no controllers configured");
        }
        Ok(())
    }

    pub fn schedule(&self) -> Result<TierSchedule> {
        let p = &self.polling;
        Ok(TierSchedule::new(
            Duration::from_secs_f64(p.fast_poll_interval),
            p.med_poll_multiple,
            p.slow_poll_multiple,
        )?)
    }

    /// True when at least one sink is configured.
    pub fn has_outputs(&self) -> bool {
        self.line_protocol.is_some() || self.log_sink.as_ref().is_some_and(|l| l.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
        [polling]
        fast_poll_interval = 2.0
        med_poll_multiple = 15
        slow_poll_multiple = 60

        [hardware]
        program = "/usr/local/bin/sfa-query"
        user = "monitor"
        password = "secret"

        [[controllers]]
        address = "sfa-a.example"

        [[controllers]]
        address = "sfa-b.example"

        [line_protocol]
        path = "/var/lib/sfapoll/lun.lp"
    "#;

    #[test]
    fn parses_full_config() {
        let config = Config::parse(SAMPLE).unwrap();
        assert_eq!(config.controllers.len(), 2);
        assert_eq!(config.polling.series_capacity, 300);
        assert_eq!(config.polling.average_span, 60.0);
        assert_eq!(config.hardware.user.as_deref(), Some("monitor"));
        assert!(config.has_outputs());

        let schedule = config.schedule().unwrap();
        assert_eq!(schedule.fast_interval, Duration::from_secs(2));
        assert_eq!(schedule.med_multiple, 15);
    }

    #[test]
    fn rejects_zero_multiple() {
        let raw = r#"
            [polling]
            med_poll_multiple = 0
            [[controllers]]
            address = "a"
        "#;
        assert!(Config::parse(raw).is_err());
    }

    #[test]
    fn requires_a_controller() {
        assert!(Config::parse("[polling]\nfast_poll_interval = 1.0\n").is_err());
    }

    #[test]
    fn no_sinks_means_no_outputs() {
        let config = Config::parse("[[controllers]]\naddress = \"a\"\n").unwrap();
        assert!(!config.has_outputs());
        let config = Config::parse("[[controllers]]\naddress = \"a\"\n[log_sink]\n").unwrap();
        assert!(config.has_outputs());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.controllers[0].address, "sfa-a.example");
    }

    #[test]
    fn missing_file_is_reported() {
        let err = Config::load(Path::new("/nonexistent/sfapoll.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/sfapoll.toml"));
    }
}
