use serde::Deserialize;

/// Number of buckets in every request-size and latency histogram.
pub const HISTOGRAM_BUCKETS: usize = 12;

pub type Histogram = [u64; HISTOGRAM_BUCKETS];

/// A counter reported once per controller in an active/active couplet.
///
/// In a healthy couplet only one side is non-zero, but nothing enforces
/// that, so the two sides are always added.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct PathPair(pub [u64; 2]);

impl PathPair {
    pub fn new(first: u64, second: u64) -> Self {
        PathPair([first, second])
    }

    pub fn sum(&self) -> u64 {
        self.0[0].saturating_add(self.0[1])
    }

    /// Sum of a kilobyte counter, converted to bytes.
    pub fn sum_bytes(&self) -> u64 {
        self.sum().saturating_mul(1024)
    }
}

/// Per-interval counters for one virtual disk, as reported by the controller.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct VirtualDiskStats {
    pub index: u32,
    #[serde(default)]
    pub read_ios: PathPair,
    #[serde(default)]
    pub write_ios: PathPair,
    #[serde(default)]
    pub kbytes_read: PathPair,
    #[serde(default)]
    pub kbytes_written: PathPair,
    #[serde(default)]
    pub kbytes_transferred: PathPair,
    #[serde(default)]
    pub kbytes_forwarded: PathPair,
    #[serde(default)]
    pub forwarded_ios: PathPair,
    #[serde(default)]
    pub total_ios: PathPair,
    #[serde(default)]
    pub read_size_buckets: Histogram,
    #[serde(default)]
    pub write_size_buckets: Histogram,
    #[serde(default)]
    pub read_latency_buckets: Histogram,
    #[serde(default)]
    pub write_latency_buckets: Histogram,
    #[serde(default)]
    pub size_labels: Vec<String>,
    #[serde(default)]
    pub latency_labels: Vec<String>,
}

/// Disk-drive scoped analog of [`VirtualDiskStats`].
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct DiskDriveStats {
    pub index: u32,
    #[serde(default)]
    pub read_ios: PathPair,
    #[serde(default)]
    pub write_ios: PathPair,
    #[serde(default)]
    pub kbytes_transferred: PathPair,
    #[serde(default)]
    pub read_size_buckets: Histogram,
    #[serde(default)]
    pub write_size_buckets: Histogram,
    #[serde(default)]
    pub read_latency_buckets: Histogram,
    #[serde(default)]
    pub write_latency_buckets: Histogram,
    #[serde(default)]
    pub size_labels: Vec<String>,
    #[serde(default)]
    pub latency_labels: Vec<String>,
}

/// Maps a virtual disk onto the LUN it is presented as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct Presentation {
    pub virtual_disk_index: u32,
    pub logical_unit_number: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct StoragePool {
    pub pool_index: u32,
    pub pool_state: PoolState,
}

/// Virtual disk to storage pool association.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct VirtualDisk {
    pub index: u32,
    pub pool_index: u32,
}

/// Raw pool health code as reported by the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct PoolState(pub u16);

impl PoolState {
    /// Published when no pool is known for a LUN.
    pub const UNKNOWN: PoolState = PoolState(255);
}

impl Default for PoolState {
    fn default() -> Self {
        PoolState::UNKNOWN
    }
}

impl std::fmt::Display for PoolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Selects one of the four histograms a statistics record carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HistogramKind {
    ReadSize,
    WriteSize,
    ReadLatency,
    WriteLatency,
}

impl HistogramKind {
    pub const ALL: [HistogramKind; 4] = [
        HistogramKind::ReadSize,
        HistogramKind::WriteSize,
        HistogramKind::ReadLatency,
        HistogramKind::WriteLatency,
    ];

    pub fn is_read(&self) -> bool {
        matches!(self, HistogramKind::ReadSize | HistogramKind::ReadLatency)
    }

    pub fn is_size(&self) -> bool {
        matches!(self, HistogramKind::ReadSize | HistogramKind::WriteSize)
    }
}

/// Two-path sums of a virtual disk's counters, bytes already converted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LunTotals {
    pub read_ios: u64,
    pub write_ios: u64,
    pub total_ios: u64,
    pub forwarded_ios: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub transfer_bytes: u64,
    pub forwarded_bytes: u64,
}

impl VirtualDiskStats {
    pub fn totals(&self) -> LunTotals {
        LunTotals {
            read_ios: self.read_ios.sum(),
            write_ios: self.write_ios.sum(),
            total_ios: self.total_ios.sum(),
            forwarded_ios: self.forwarded_ios.sum(),
            read_bytes: self.kbytes_read.sum_bytes(),
            write_bytes: self.kbytes_written.sum_bytes(),
            transfer_bytes: self.kbytes_transferred.sum_bytes(),
            forwarded_bytes: self.kbytes_forwarded.sum_bytes(),
        }
    }

    pub fn histogram(&self, kind: HistogramKind) -> &Histogram {
        match kind {
            HistogramKind::ReadSize => &self.read_size_buckets,
            HistogramKind::WriteSize => &self.write_size_buckets,
            HistogramKind::ReadLatency => &self.read_latency_buckets,
            HistogramKind::WriteLatency => &self.write_latency_buckets,
        }
    }
}

impl DiskDriveStats {
    pub fn histogram(&self, kind: HistogramKind) -> &Histogram {
        match kind {
            HistogramKind::ReadSize => &self.read_size_buckets,
            HistogramKind::WriteSize => &self.write_size_buckets,
            HistogramKind::ReadLatency => &self.read_latency_buckets,
            HistogramKind::WriteLatency => &self.write_latency_buckets,
        }
    }
}
