use crate::domain::Histogram;
use crate::sinks::{LunRate, LunRaw, Publisher};
use anyhow::Result;
use log::info;

/// Writes every record to the log at `info` level.
pub struct LogPublisher;

impl LogPublisher {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher for LogPublisher {
    fn name(&self) -> &str {
        "log"
    }

    fn publish_lun_rate(&mut self, host: &str, tick_time: u64, rate: &LunRate) -> Result<()> {
        info!(
            "{} @{} LUN {}: {:.1}/{:.1} r/w io/s {:.2}/{:.2}/{:.2} r/w/total MB/s, \
             fwd {:.1} io/s {:.2} MB/s, pool {}",
            host,
            tick_time,
            rate.lun,
            rate.read_iops,
            rate.write_iops,
            rate.read_bw / 1_000_000.0,
            rate.write_bw / 1_000_000.0,
            rate.transfer_bw / 1_000_000.0,
            rate.forwarded_iops,
            rate.forwarded_bw / 1_000_000.0,
            rate.pool_state
        );
        Ok(())
    }

    fn publish_lun_raw(&mut self, host: &str, tick_time: u64, raw: &LunRaw) -> Result<()> {
        let t = &raw.totals;
        info!(
            "{} @{} LUN {} raw: {} ios ({} r, {} w, {} fwd), {} B ({} r, {} w, {} fwd), pool {}",
            host,
            tick_time,
            raw.lun,
            t.total_ios,
            t.read_ios,
            t.write_ios,
            t.forwarded_ios,
            t.transfer_bytes,
            t.read_bytes,
            t.write_bytes,
            t.forwarded_bytes,
            raw.pool_state
        );
        Ok(())
    }

    fn publish_size_histogram(
        &mut self,
        host: &str,
        tick_time: u64,
        lun: u32,
        is_read: bool,
        buckets: &Histogram,
    ) -> Result<()> {
        info!(
            "{} @{} LUN {} {} sizes {:?}",
            host,
            tick_time,
            lun,
            if is_read { "read" } else { "write" },
            buckets
        );
        Ok(())
    }

    fn publish_latency_histogram(
        &mut self,
        host: &str,
        tick_time: u64,
        lun: u32,
        is_read: bool,
        buckets: &Histogram,
    ) -> Result<()> {
        info!(
            "{} @{} LUN {} {} latencies {:?}",
            host,
            tick_time,
            lun,
            if is_read { "read" } else { "write" },
            buckets
        );
        Ok(())
    }
}
