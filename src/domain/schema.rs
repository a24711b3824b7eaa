//! Histogram label contract.
//!
//! Sinks store histogram buckets positionally, so the labels the controller
//! reports for each bucket must match these lists exactly and in order.

use crate::domain::counters::{DiskDriveStats, VirtualDiskStats, HISTOGRAM_BUCKETS};
use crate::error::{DeviceKind, PollError, Result};

pub const SIZE_LABELS: [&str; HISTOGRAM_BUCKETS] = [
    "IO Size <=4KiB",
    "IO Size <=8KiB",
    "IO Size <=16KiB",
    "IO Size <=32KiB",
    "IO Size <=64KiB",
    "IO Size <=128KiB",
    "IO Size <=256KiB",
    "IO Size <=512KiB",
    "IO Size <=1MiB",
    "IO Size <=2MiB",
    "IO Size <=4MiB",
    "IO Size >4MiB",
];

pub const LUN_LATENCY_LABELS: [&str; HISTOGRAM_BUCKETS] = [
    "Latency Counts <=16ms",
    "Latency Counts <=32ms",
    "Latency Counts <=64ms",
    "Latency Counts <=128ms",
    "Latency Counts <=256ms",
    "Latency Counts <=512ms",
    "Latency Counts <=1s",
    "Latency Counts <=2s",
    "Latency Counts <=4s",
    "Latency Counts <=8s",
    "Latency Counts <=16s",
    "Latency Counts >16s",
];

pub const DRIVE_LATENCY_LABELS: [&str; HISTOGRAM_BUCKETS] = [
    "Latency Counts <=4ms",
    "Latency Counts <=8ms",
    "Latency Counts <=16ms",
    "Latency Counts <=32ms",
    "Latency Counts <=64ms",
    "Latency Counts <=128ms",
    "Latency Counts <=256ms",
    "Latency Counts <=512ms",
    "Latency Counts <=1s",
    "Latency Counts <=2s",
    "Latency Counts <=4s",
    "Latency Counts >4s",
];

/// Anything that reports its own histogram bucket labels.
pub trait LabeledRecord {
    const KIND: DeviceKind;
    fn index(&self) -> u32;
    fn size_labels(&self) -> &[String];
    fn latency_labels(&self) -> &[String];
}

impl LabeledRecord for VirtualDiskStats {
    const KIND: DeviceKind = DeviceKind::VirtualDisk;

    fn index(&self) -> u32 {
        self.index
    }
    fn size_labels(&self) -> &[String] {
        &self.size_labels
    }
    fn latency_labels(&self) -> &[String] {
        &self.latency_labels
    }
}

impl LabeledRecord for DiskDriveStats {
    const KIND: DeviceKind = DeviceKind::DiskDrive;

    fn index(&self) -> u32 {
        self.index
    }
    fn size_labels(&self) -> &[String] {
        &self.size_labels
    }
    fn latency_labels(&self) -> &[String] {
        &self.latency_labels
    }
}

fn labels_match(actual: &[String], expected: &[&str]) -> bool {
    actual.len() == expected.len() && actual.iter().zip(expected).all(|(a, e)| a == e)
}

/// Fails on the first record whose labels differ from the expected sets.
pub fn validate<R: LabeledRecord>(
    host: &str,
    records: &[R],
    expected_size_labels: &[&str],
    expected_latency_labels: &[&str],
) -> Result<()> {
    for record in records {
        if !labels_match(record.size_labels(), expected_size_labels) {
            return Err(PollError::SchemaMismatch {
                host: host.to_string(),
                device_kind: R::KIND,
                index: record.index(),
                histogram: "size",
            });
        }
        if !labels_match(record.latency_labels(), expected_latency_labels) {
            return Err(PollError::SchemaMismatch {
                host: host.to_string(),
                device_kind: R::KIND,
                index: record.index(),
                histogram: "latency",
            });
        }
    }
    Ok(())
}

pub fn validate_virtual_disks(host: &str, records: &[VirtualDiskStats]) -> Result<()> {
    validate(host, records, &SIZE_LABELS, &LUN_LATENCY_LABELS)
}

pub fn validate_disk_drives(host: &str, records: &[DiskDriveStats]) -> Result<()> {
    validate(host, records, &SIZE_LABELS, &DRIVE_LATENCY_LABELS)
}

pub fn owned_labels(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vd(index: u32) -> VirtualDiskStats {
        VirtualDiskStats {
            index,
            size_labels: owned_labels(&SIZE_LABELS),
            latency_labels: owned_labels(&LUN_LATENCY_LABELS),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_expected_labels() {
        assert!(validate_virtual_disks("sfa-a", &[vd(0), vd(1)]).is_ok());
    }

    #[test]
    fn rejects_one_mislabeled_bucket() {
        let mut bad = vd(6);
        bad.size_labels[3] = "IO Size <=30KiB".to_string();
        let err = validate_virtual_disks("sfa-b", &[vd(0), bad]).unwrap_err();
        match err {
            PollError::SchemaMismatch {
                host,
                index,
                histogram,
                ..
            } => {
                assert_eq!(host, "sfa-b");
                assert_eq!(index, 6);
                assert_eq!(histogram, "size");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn order_matters() {
        let mut bad = vd(2);
        bad.latency_labels.swap(0, 1);
        assert!(validate_virtual_disks("sfa-a", &[bad]).is_err());
    }

    #[test]
    fn drives_use_their_own_latency_labels() {
        let drive = DiskDriveStats {
            index: 12,
            size_labels: owned_labels(&SIZE_LABELS),
            latency_labels: owned_labels(&LUN_LATENCY_LABELS),
            ..Default::default()
        };
        let err = validate_disk_drives("sfa-a", &[drive]).unwrap_err();
        assert!(err.to_string().contains("disk drive 12"));
    }
}
