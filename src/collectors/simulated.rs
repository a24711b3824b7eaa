use crate::collectors::Controller;
use crate::domain::schema::{owned_labels, DRIVE_LATENCY_LABELS, LUN_LATENCY_LABELS, SIZE_LABELS};
use crate::domain::{
    DiskDriveStats, Histogram, PathPair, PoolState, Presentation, StoragePool, VirtualDisk,
    VirtualDiskStats, HISTOGRAM_BUCKETS,
};
use anyhow::Result;

/// Size labels one virtual disk reports from a given stats poll onwards.
struct LabelDrift {
    from_poll: u64,
    virtual_disk_index: u32,
    labels: Vec<String>,
}

/// In-process controller producing deterministic per-interval counters.
///
/// Virtual disk indexes are deliberately sparse (`2 * lun + 1`) so the
/// LUN remapping is always exercised. Each virtual disk's traffic sits on
/// one controller path, alternating between disks.
pub struct SimulatedController {
    host: String,
    luns: u32,
    drives: u32,
    firmware: String,
    polls: u64,
    label_drift: Option<LabelDrift>,
    unpresented: Vec<u32>,
    fail_after: Option<u64>,
}

impl SimulatedController {
    pub fn new(host: impl Into<String>, luns: u32) -> Self {
        Self {
            host: host.into(),
            luns,
            drives: 0,
            firmware: "3.1.0.18052".to_string(),
            polls: 0,
            label_drift: None,
            unpresented: Vec::new(),
            fail_after: None,
        }
    }

    pub fn with_firmware(mut self, firmware: impl Into<String>) -> Self {
        self.firmware = firmware.into();
        self
    }

    pub fn with_disk_drives(mut self, drives: u32) -> Self {
        self.drives = drives;
        self
    }

    /// Report `labels` as the size labels of one virtual disk.
    pub fn with_size_labels(self, virtual_disk_index: u32, labels: Vec<String>) -> Self {
        self.with_size_labels_after(0, virtual_disk_index, labels)
    }

    /// Like [`with_size_labels`](Self::with_size_labels), but only once
    /// `polls` stats fetches have been answered with the standard labels.
    pub fn with_size_labels_after(
        mut self,
        polls: u64,
        virtual_disk_index: u32,
        labels: Vec<String>,
    ) -> Self {
        self.label_drift = Some(LabelDrift {
            from_poll: polls,
            virtual_disk_index,
            labels,
        });
        self
    }

    /// Report statistics for a virtual disk that has no presentation.
    pub fn with_unpresented(mut self, virtual_disk_index: u32) -> Self {
        self.unpresented.push(virtual_disk_index);
        self
    }

    /// Fail every virtual-disk stats fetch after the first `polls`.
    pub fn fail_after(mut self, polls: u64) -> Self {
        self.fail_after = Some(polls);
        self
    }

    pub fn virtual_disk_index(lun: u32) -> u32 {
        lun * 2 + 1
    }

    /// Read IOs reported for a LUN on a given stats poll (zero based).
    pub fn read_ios_at(lun: u32, poll: u64) -> u64 {
        (poll * 7 + u64::from(lun) * 13) % 50 + 10
    }

    pub fn write_ios_at(lun: u32, poll: u64) -> u64 {
        (poll * 3 + u64::from(lun) * 5) % 20 + 5
    }

    fn on_path(index: u32, value: u64) -> PathPair {
        if index % 2 == 0 {
            PathPair::new(value, 0)
        } else {
            PathPair::new(0, value)
        }
    }

    fn spread(total: u64) -> Histogram {
        let mut buckets = [0u64; HISTOGRAM_BUCKETS];
        let mut remaining = total;
        for bucket in buckets.iter_mut() {
            let share = remaining / 2;
            *bucket = share;
            remaining -= share;
        }
        buckets[0] += remaining;
        buckets
    }

    fn lun_stats(&self, lun: u32, vd_index: u32, poll: u64) -> VirtualDiskStats {
        let reads = Self::read_ios_at(lun, poll);
        let writes = Self::write_ios_at(lun, poll);
        let forwarded = reads / 10;

        let size_labels = match &self.label_drift {
            Some(drift) if drift.virtual_disk_index == vd_index && poll >= drift.from_poll => {
                drift.labels.clone()
            }
            _ => owned_labels(&SIZE_LABELS),
        };

        VirtualDiskStats {
            index: vd_index,
            read_ios: Self::on_path(lun, reads),
            write_ios: Self::on_path(lun, writes),
            kbytes_read: Self::on_path(lun, reads * 64),
            kbytes_written: Self::on_path(lun, writes * 128),
            kbytes_transferred: Self::on_path(lun, reads * 64 + writes * 128),
            kbytes_forwarded: Self::on_path(lun, forwarded * 64),
            forwarded_ios: Self::on_path(lun, forwarded),
            total_ios: Self::on_path(lun, reads + writes),
            read_size_buckets: Self::spread(reads),
            write_size_buckets: Self::spread(writes),
            read_latency_buckets: Self::spread(reads),
            write_latency_buckets: Self::spread(writes),
            size_labels,
            latency_labels: owned_labels(&LUN_LATENCY_LABELS),
        }
    }
}

impl Controller for SimulatedController {
    fn host(&self) -> &str {
        &self.host
    }

    fn firmware_version(&mut self) -> Result<String> {
        Ok(self.firmware.clone())
    }

    fn virtual_disk_stats(&mut self) -> Result<Vec<VirtualDiskStats>> {
        if let Some(limit) = self.fail_after {
            if self.polls >= limit {
                anyhow::bail!("{}: simulated connection loss", self.host);
            }
        }

        let poll = self.polls;
        self.polls += 1;

        let mut records: Vec<VirtualDiskStats> = (0..self.luns)
            .map(|lun| self.lun_stats(lun, Self::virtual_disk_index(lun), poll))
            .collect();
        for &index in &self.unpresented {
            records.push(self.lun_stats(index, index, poll));
        }
        Ok(records)
    }

    fn disk_drive_stats(&mut self) -> Result<Vec<DiskDriveStats>> {
        let poll = self.polls;
        Ok((0..self.drives)
            .map(|drive| {
                let reads = Self::read_ios_at(drive, poll) / 4;
                let writes = Self::write_ios_at(drive, poll) / 4;
                DiskDriveStats {
                    index: drive,
                    read_ios: Self::on_path(drive, reads),
                    write_ios: Self::on_path(drive, writes),
                    kbytes_transferred: Self::on_path(drive, (reads + writes) * 64),
                    read_size_buckets: Self::spread(reads),
                    write_size_buckets: Self::spread(writes),
                    read_latency_buckets: Self::spread(reads),
                    write_latency_buckets: Self::spread(writes),
                    size_labels: owned_labels(&SIZE_LABELS),
                    latency_labels: owned_labels(&DRIVE_LATENCY_LABELS),
                }
            })
            .collect())
    }

    fn presentations(&mut self) -> Result<Vec<Presentation>> {
        Ok((0..self.luns)
            .map(|lun| Presentation {
                virtual_disk_index: Self::virtual_disk_index(lun),
                logical_unit_number: lun,
            })
            .collect())
    }

    fn storage_pools(&mut self) -> Result<Vec<StoragePool>> {
        Ok(vec![
            StoragePool {
                pool_index: 0,
                pool_state: PoolState(0),
            },
            StoragePool {
                pool_index: 1,
                pool_state: PoolState(1),
            },
        ])
    }

    fn virtual_disks(&mut self) -> Result<Vec<VirtualDisk>> {
        Ok((0..self.luns)
            .map(|lun| VirtualDisk {
                index: Self::virtual_disk_index(lun),
                pool_index: lun % 2,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traffic_is_on_one_path() {
        let mut controller = SimulatedController::new("sim", 2);
        let stats = controller.virtual_disk_stats().unwrap();
        assert_eq!(stats[0].read_ios.0[1], 0);
        assert_eq!(stats[1].read_ios.0[0], 0);
        assert_eq!(stats[0].read_ios.sum(), SimulatedController::read_ios_at(0, 0));
    }

    #[test]
    fn histograms_account_for_every_io() {
        let mut controller = SimulatedController::new("sim", 1);
        let stats = controller.virtual_disk_stats().unwrap();
        let reads: u64 = stats[0].read_size_buckets.iter().sum();
        assert_eq!(reads, stats[0].read_ios.sum());
    }

    #[test]
    fn size_labels_drift_on_the_requested_poll() {
        let drifted = vec!["bogus".to_string(); HISTOGRAM_BUCKETS];
        let vd = SimulatedController::virtual_disk_index(1);
        let mut controller =
            SimulatedController::new("sim", 2).with_size_labels_after(2, vd, drifted.clone());

        for _ in 0..2 {
            let stats = controller.virtual_disk_stats().unwrap();
            assert!(stats.iter().all(|s| s.size_labels == owned_labels(&SIZE_LABELS)));
        }
        let stats = controller.virtual_disk_stats().unwrap();
        assert_eq!(stats[1].size_labels, drifted);
        assert_eq!(stats[0].size_labels, owned_labels(&SIZE_LABELS));
    }

    #[test]
    fn fails_after_limit() {
        let mut controller = SimulatedController::new("sim", 1).fail_after(1);
        assert!(controller.virtual_disk_stats().is_ok());
        assert!(controller.virtual_disk_stats().is_err());
    }
}
