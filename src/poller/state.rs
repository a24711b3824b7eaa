use crate::domain::{
    Average, DeviceRegistry, DiskDriveStats, Histogram, HistogramKind, Metric, PoolState,
    RegistryView, TimeSeriesStore, VirtualDiskStats,
};
use crate::error::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// The latest raw counters and pool health for one controller.
///
/// Each map is replaced as a whole, never patched, so any clone of a
/// snapshot holds records from exactly one fetch per map.
#[derive(Clone, Debug, Default)]
pub struct StatsSnapshot {
    /// Tick that produced the counters; `None` for the startup fetch.
    pub tick: Option<u64>,
    pub luns: Arc<HashMap<u32, VirtualDiskStats>>,
    pub drives: Arc<HashMap<u32, DiskDriveStats>>,
    pub pool_states: Arc<HashMap<u32, PoolState>>,
}

impl StatsSnapshot {
    pub fn lun(&self, lun: u32) -> Option<&VirtualDiskStats> {
        self.luns.get(&lun)
    }

    pub fn pool_state(&self, lun: u32) -> Option<PoolState> {
        self.pool_states.get(&lun).copied()
    }
}

/// Everything one controller's poll loop owns.
#[derive(Debug)]
pub struct PollState {
    pub(crate) store: TimeSeriesStore,
    pub(crate) registry: DeviceRegistry,
    pub(crate) snapshot: StatsSnapshot,
    pub(crate) primed: bool,
    pub(crate) last_tick: Option<u64>,
}

impl PollState {
    pub fn new(series_capacity: usize) -> Self {
        Self {
            store: TimeSeriesStore::new(series_capacity),
            registry: DeviceRegistry::new(),
            snapshot: StatsSnapshot::default(),
            primed: false,
            last_tick: None,
        }
    }
}

/// Lock-guarded access to a controller's [`PollState`].
///
/// The poll loop is the only writer; every other holder reads through the
/// accessors, each of which takes the lock for the duration of the read.
#[derive(Clone, Debug)]
pub struct StateHandle {
    host: Arc<str>,
    inner: Arc<Mutex<PollState>>,
}

impl StateHandle {
    pub fn new(host: &str, series_capacity: usize) -> Self {
        Self {
            host: Arc::from(host),
            inner: Arc::new(Mutex::new(PollState::new(series_capacity))),
        }
    }

    /// Exclusive access for the poll loop.
    pub(crate) fn lock(&self) -> MutexGuard<'_, PollState> {
        // A panicked reader must not take the poller down with it.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record that every due tier of tick `index` has run.
    pub(crate) fn mark_polled(&self, index: u64) {
        self.lock().last_tick = Some(index);
    }

    fn read<T>(&self, f: impl FnOnce(&PollState) -> T) -> T {
        f(&self.lock())
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Sorted LUN numbers from the current registry generation.
    pub fn lun_numbers(&self) -> Vec<u32> {
        self.read(|s| s.registry.lun_numbers())
    }

    /// Sorted disk drive indexes from the latest snapshot.
    pub fn drive_numbers(&self) -> Vec<u32> {
        self.read(|s| {
            let mut drives: Vec<u32> = s.snapshot.drives.keys().copied().collect();
            drives.sort_unstable();
            drives
        })
    }

    pub fn metric_names(&self) -> Vec<&'static str> {
        self.read(|s| s.store.metric_names())
    }

    pub fn average(&self, metric: Metric, device: u32, span: f64) -> Result<Average> {
        self.read(|s| s.store.average(metric, device, span))
    }

    /// Averages of several metrics for one device, all read under one lock.
    pub fn averages(&self, metrics: &[Metric], device: u32, span: f64) -> Result<Vec<Average>> {
        self.read(|s| {
            metrics
                .iter()
                .map(|m| s.store.average(*m, device, span))
                .collect()
        })
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.read(|s| s.snapshot.clone())
    }

    pub fn registry(&self) -> Arc<RegistryView> {
        self.read(|s| s.registry.view())
    }

    pub fn pool_state(&self, lun: u32) -> Option<PoolState> {
        self.read(|s| s.snapshot.pool_state(lun))
    }

    pub fn lun_histogram(&self, lun: u32, kind: HistogramKind) -> Option<Histogram> {
        self.read(|s| s.snapshot.luns.get(&lun).map(|v| *v.histogram(kind)))
    }

    pub fn drive_histogram(&self, drive: u32, kind: HistogramKind) -> Option<Histogram> {
        self.read(|s| s.snapshot.drives.get(&drive).map(|d| *d.histogram(kind)))
    }

    /// Labels reported by the controller; identical on every virtual disk
    /// once the schema check has passed.
    pub fn io_size_labels(&self) -> Option<Vec<String>> {
        self.read(|s| s.snapshot.luns.values().next().map(|v| v.size_labels.clone()))
    }

    pub fn io_latency_labels(&self) -> Option<Vec<String>> {
        self.read(|s| s.snapshot.luns.values().next().map(|v| v.latency_labels.clone()))
    }

    /// True once the startup fetch and at least one tick have completed.
    pub fn is_ready(&self) -> bool {
        self.read(|s| s.primed && s.last_tick.is_some())
    }

    pub fn last_tick(&self) -> Option<u64> {
        self.read(|s| s.last_tick)
    }
}
