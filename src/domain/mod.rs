pub mod counters;
pub mod firmware;
pub mod registry;
pub mod schema;
pub mod timeseries;

pub use counters::{
    DiskDriveStats, Histogram, HistogramKind, LunTotals, PathPair, PoolState, Presentation,
    StoragePool, VirtualDisk, VirtualDiskStats, HISTOGRAM_BUCKETS,
};
pub use registry::{DeviceRegistry, RegistryView};
pub use timeseries::{Average, Metric, TimeSeries, TimeSeriesStore};
