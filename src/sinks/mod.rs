pub mod line_protocol;
pub mod log_sink;

pub use line_protocol::LineProtocolPublisher;
pub use log_sink::LogPublisher;

use crate::domain::{Histogram, LunTotals, PoolState};
use anyhow::Result;

/// Windowed rates for one LUN, bandwidths in bytes per second.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LunRate {
    pub lun: u32,
    pub transfer_bw: f64,
    pub read_bw: f64,
    pub write_bw: f64,
    pub read_iops: f64,
    pub write_iops: f64,
    pub forwarded_bw: f64,
    pub forwarded_iops: f64,
    pub pool_state: PoolState,
}

/// Raw counters of the latest tick for one LUN.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LunRaw {
    pub lun: u32,
    pub totals: LunTotals,
    pub pool_state: PoolState,
}

/// Destination for per-tick LUN records.
pub trait Publisher: Send {
    fn name(&self) -> &str;

    fn publish_lun_rate(&mut self, host: &str, tick_time: u64, rate: &LunRate) -> Result<()>;

    fn publish_lun_raw(&mut self, host: &str, tick_time: u64, raw: &LunRaw) -> Result<()>;

    fn publish_size_histogram(
        &mut self,
        host: &str,
        tick_time: u64,
        lun: u32,
        is_read: bool,
        buckets: &Histogram,
    ) -> Result<()>;

    fn publish_latency_histogram(
        &mut self,
        host: &str,
        tick_time: u64,
        lun: u32,
        is_read: bool,
        buckets: &Histogram,
    ) -> Result<()>;

    /// Push out anything buffered during the tick.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
