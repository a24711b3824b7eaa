use crate::collectors::Controller;
use crate::domain::firmware::{self, MINIMUM_FW_VERSION};
use crate::domain::schema;
use crate::domain::{DiskDriveStats, Metric, PoolState, VirtualDiskStats};
use crate::error::{PollError, Result};
use crate::poller::gate::epoch_millis;
use crate::poller::scheduler::{PollTick, Tier};
use crate::poller::state::{PollState, StateHandle};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;

/// Outcome of folding one statistics fetch into the state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FoldReport {
    pub applied: usize,
    pub skipped: usize,
}

/// Pulls statistics from one controller and folds them into its state.
pub struct SnapshotAggregator<C: Controller> {
    controller: C,
    state: StateHandle,
    collect_disk_drives: bool,
    minimum_firmware: String,
}

impl<C: Controller> SnapshotAggregator<C> {
    pub fn new(controller: C, series_capacity: usize) -> Self {
        let state = StateHandle::new(controller.host(), series_capacity);
        Self {
            controller,
            state,
            collect_disk_drives: false,
            minimum_firmware: MINIMUM_FW_VERSION.to_string(),
        }
    }

    pub fn with_disk_drives(mut self, enabled: bool) -> Self {
        self.collect_disk_drives = enabled;
        self
    }

    pub fn with_minimum_firmware(mut self, minimum: impl Into<String>) -> Self {
        self.minimum_firmware = minimum.into();
        self
    }

    pub fn handle(&self) -> StateHandle {
        self.state.clone()
    }

    pub fn host(&self) -> &str {
        self.state.host()
    }

    fn fetch<T>(
        &mut self,
        what: &'static str,
        f: impl FnOnce(&mut C) -> anyhow::Result<T>,
    ) -> Result<T> {
        f(&mut self.controller).map_err(|source| PollError::HardwareFetch {
            host: self.state.host().to_string(),
            what,
            source,
        })
    }

    /// Version gate, registry, schema check and the first sample of
    /// every series. Must succeed before the tick loop starts.
    pub fn start(&mut self) -> Result<()> {
        let host = self.host().to_string();

        let version = self.fetch("controller firmware version", |c| c.firmware_version())?;
        firmware::check_minimum(&host, &version, &self.minimum_firmware)?;
        info!("{}: controller firmware {}", host, version);

        self.rebuild_registry()?;

        let vd_stats = self.fetch("virtual disk statistics", |c| c.virtual_disk_stats())?;
        schema::validate_virtual_disks(&host, &vd_stats)?;
        let dd_stats = if self.collect_disk_drives {
            let stats = self.fetch("disk drive statistics", |c| c.disk_drive_stats())?;
            schema::validate_disk_drives(&host, &stats)?;
            Some(stats)
        } else {
            None
        };

        // Same millisecond clock the lockstep deadlines come from
        let now = epoch_millis() as f64 / 1000.0;
        {
            let mut state = self.state.lock();
            let report = fold_virtual_disks(&host, &mut state, vd_stats, now, None);
            if let Some(stats) = dd_stats {
                fold_disk_drives(&mut state, stats, now);
            }
            state.primed = true;
            debug!(
                "{}: primed {} LUNs ({} skipped)",
                host, report.applied, report.skipped
            );
        }

        self.refresh_pool_states()?;
        Ok(())
    }

    /// Run one polling tier for `tick`.
    pub fn poll_tier(&mut self, tick: &PollTick, tier: Tier) -> Result<()> {
        match tier {
            Tier::Fast => self.fast_tasks(tick).map(|_| ()),
            Tier::Medium => {
                self.rebuild_registry()?;
                self.refresh_pool_states()
            }
            Tier::Slow => self.revalidate_schema(),
        }
    }

    fn fast_tasks(&mut self, tick: &PollTick) -> Result<FoldReport> {
        let vd_stats = self.fetch("virtual disk statistics", |c| c.virtual_disk_stats())?;
        let timestamp = tick.timestamp();
        let host = self.host().to_string();

        let report = {
            let mut state = self.state.lock();
            fold_virtual_disks(&host, &mut state, vd_stats, timestamp, Some(tick.index))
        };

        // The lock is released across the slower drive fetch.
        if self.collect_disk_drives {
            let dd_stats = self.fetch("disk drive statistics", |c| c.disk_drive_stats())?;
            let mut state = self.state.lock();
            fold_disk_drives(&mut state, dd_stats, timestamp);
        }

        if report.skipped > 0 {
            warn!(
                "{}: tick {} skipped {} unmapped virtual disk(s)",
                host, tick.index, report.skipped
            );
        }
        Ok(report)
    }

    fn rebuild_registry(&mut self) -> Result<()> {
        let presentations = self.fetch("presentations", |c| c.presentations())?;
        self.state.lock().registry.rebuild(&presentations);
        Ok(())
    }

    fn refresh_pool_states(&mut self) -> Result<()> {
        let pools = self.fetch("storage pools", |c| c.storage_pools())?;
        let virtual_disks = self.fetch("virtual disks", |c| c.virtual_disks())?;

        let pool_states: HashMap<u32, PoolState> =
            pools.iter().map(|p| (p.pool_index, p.pool_state)).collect();

        let mut state = self.state.lock();
        let registry = state.registry.view();
        let mut by_lun = HashMap::new();
        for disk in &virtual_disks {
            let lun = match registry.resolve(disk.index) {
                Ok(lun) => lun,
                Err(e) => {
                    debug!("{}: no pool state recorded: {}", self.state.host(), e);
                    continue;
                }
            };
            match pool_states.get(&disk.pool_index) {
                Some(pool_state) => {
                    by_lun.insert(lun, *pool_state);
                }
                None => warn!(
                    "{}: virtual disk {} references unknown pool {}",
                    self.state.host(),
                    disk.index,
                    disk.pool_index
                ),
            }
        }
        state.snapshot.pool_states = Arc::new(by_lun);
        Ok(())
    }

    /// Label drift after startup is as fatal as at startup.
    fn revalidate_schema(&self) -> Result<()> {
        let snapshot = self.state.snapshot();
        let host = self.state.host();
        let luns: Vec<VirtualDiskStats> = snapshot.luns.values().cloned().collect();
        schema::validate_virtual_disks(host, &luns)?;
        let drives: Vec<DiskDriveStats> = snapshot.drives.values().cloned().collect();
        schema::validate_disk_drives(host, &drives)?;
        Ok(())
    }
}

/// Append one sample per LUN metric and replace the LUN snapshot.
///
/// Records whose virtual disk has no LUN yet are left out of both.
pub fn fold_virtual_disks(
    host: &str,
    state: &mut PollState,
    records: Vec<VirtualDiskStats>,
    timestamp: f64,
    tick: Option<u64>,
) -> FoldReport {
    let registry = state.registry.view();
    let mut report = FoldReport::default();
    let mut luns = HashMap::with_capacity(records.len());

    for stats in records {
        let lun = match registry.resolve(stats.index) {
            Ok(lun) => lun,
            Err(e) => {
                warn!("{}: {}", host, e);
                report.skipped += 1;
                continue;
            }
        };

        let totals = stats.totals();
        let deltas = [
            (Metric::LunReadIops, totals.read_ios),
            (Metric::LunWriteIops, totals.write_ios),
            (Metric::LunTransferBytes, totals.transfer_bytes),
            (Metric::LunReadBytes, totals.read_bytes),
            (Metric::LunWriteBytes, totals.write_bytes),
            (Metric::LunForwardedBytes, totals.forwarded_bytes),
            (Metric::LunForwardedIops, totals.forwarded_ios),
        ];
        for (metric, value) in deltas {
            state.store.append(metric, lun, value as f64, timestamp);
        }

        luns.insert(lun, stats);
        report.applied += 1;
    }

    state.snapshot.tick = tick;
    state.snapshot.luns = Arc::new(luns);
    report
}

/// Drives are tracked by their own index; there is no remapping.
pub fn fold_disk_drives(state: &mut PollState, records: Vec<DiskDriveStats>, timestamp: f64) {
    let mut drives = HashMap::with_capacity(records.len());
    for stats in records {
        let deltas = [
            (Metric::DriveReadIops, stats.read_ios.sum()),
            (Metric::DriveWriteIops, stats.write_ios.sum()),
            (Metric::DriveTransferBytes, stats.kbytes_transferred.sum_bytes()),
        ];
        for (metric, value) in deltas {
            state.store.append(metric, stats.index, value as f64, timestamp);
        }
        drives.insert(stats.index, stats);
    }
    state.snapshot.drives = Arc::new(drives);
}
