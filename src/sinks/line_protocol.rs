use crate::domain::schema::{LUN_LATENCY_LABELS, SIZE_LABELS};
use crate::domain::Histogram;
use crate::sinks::{LunRate, LunRaw, Publisher};
use anyhow::{Context, Result};
use log::debug;
use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Buffers InfluxDB line-protocol records and writes them on `flush`.
pub struct LineProtocolPublisher<W: Write + Send> {
    writer: W,
    pending: Vec<String>,
}

impl LineProtocolPublisher<File> {
    /// Append to `path`, creating it if needed.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        Ok(Self::new(file))
    }
}

impl<W: Write + Send> LineProtocolPublisher<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            pending: Vec::new(),
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn push(
        &mut self,
        measurement: &str,
        tags: &[(&str, String)],
        fields: &[(String, String)],
        tick_time: u64,
    ) {
        let mut line = escape(measurement, false);
        for (key, value) in tags {
            let _ = write!(line, ",{}={}", escape(key, true), escape(value, true));
        }
        let fields: Vec<String> = fields
            .iter()
            .map(|(k, v)| format!("{}={}", escape(k, true), v))
            .collect();
        let _ = write!(
            line,
            " {} {}",
            fields.join(","),
            tick_time.saturating_mul(NANOS_PER_SECOND)
        );
        self.pending.push(line);
    }

    fn push_histogram(
        &mut self,
        measurement: &str,
        labels: &[&str],
        host: &str,
        tick_time: u64,
        lun: u32,
        is_read: bool,
        buckets: &Histogram,
    ) {
        let tags = [
            ("host", host.to_string()),
            ("lun", lun.to_string()),
            ("direction", if is_read { "read" } else { "write" }.to_string()),
        ];
        let fields: Vec<(String, String)> = labels
            .iter()
            .zip(buckets.iter())
            .map(|(label, count)| (label.to_string(), format!("{}i", count)))
            .collect();
        self.push(measurement, &tags, &fields, tick_time);
    }
}

/// Escape a measurement name (spaces, commas) or a tag/field key or tag
/// value (additionally `=`).
fn escape(raw: &str, key: bool) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == ' ' || c == ',' || (key && c == '=') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn float(value: f64) -> String {
    if value.is_finite() {
        format!("{}", value)
    } else {
        "0".to_string()
    }
}

impl<W: Write + Send> Publisher for LineProtocolPublisher<W> {
    fn name(&self) -> &str {
        "line-protocol"
    }

    fn publish_lun_rate(&mut self, host: &str, tick_time: u64, rate: &LunRate) -> Result<()> {
        let tags = [("host", host.to_string()), ("lun", rate.lun.to_string())];
        let fields = [
            ("transfer_bw".to_string(), float(rate.transfer_bw)),
            ("read_bw".to_string(), float(rate.read_bw)),
            ("write_bw".to_string(), float(rate.write_bw)),
            ("read_iops".to_string(), float(rate.read_iops)),
            ("write_iops".to_string(), float(rate.write_iops)),
            ("forwarded_bw".to_string(), float(rate.forwarded_bw)),
            ("forwarded_iops".to_string(), float(rate.forwarded_iops)),
            ("pool_state".to_string(), format!("{}i", rate.pool_state.0)),
        ];
        self.push("lun_rates", &tags, &fields, tick_time);
        Ok(())
    }

    fn publish_lun_raw(&mut self, host: &str, tick_time: u64, raw: &LunRaw) -> Result<()> {
        let t = &raw.totals;
        let tags = [("host", host.to_string()), ("lun", raw.lun.to_string())];
        let fields = [
            ("transfer_bytes".to_string(), format!("{}i", t.transfer_bytes)),
            ("read_bytes".to_string(), format!("{}i", t.read_bytes)),
            ("write_bytes".to_string(), format!("{}i", t.write_bytes)),
            ("forwarded_bytes".to_string(), format!("{}i", t.forwarded_bytes)),
            ("total_ios".to_string(), format!("{}i", t.total_ios)),
            ("read_ios".to_string(), format!("{}i", t.read_ios)),
            ("write_ios".to_string(), format!("{}i", t.write_ios)),
            ("forwarded_ios".to_string(), format!("{}i", t.forwarded_ios)),
            ("pool_state".to_string(), format!("{}i", raw.pool_state.0)),
        ];
        self.push("lun_raw", &tags, &fields, tick_time);
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
        self.push_histogram(
            "lun_request_size",
            &SIZE_LABELS,
            host,
            tick_time,
            lun,
            is_read,
            buckets,
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
        self.push_histogram(
            "lun_request_latency",
            &LUN_LATENCY_LABELS,
            host,
            tick_time,
            lun,
            is_read,
            buckets,
        );
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut body = self.pending.join("\n");
        body.push('\n');
        self.writer
            .write_all(body.as_bytes())
            .context("Failed to write line-protocol records")?;
        self.writer.flush().context("Failed to flush line-protocol records")?;
        debug!("wrote {} line-protocol records", self.pending.len());
        self.pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LunTotals, PoolState};

    #[test]
    fn buffers_until_flush() {
        let mut sink = LineProtocolPublisher::new(Vec::new());
        let raw = LunRaw {
            lun: 3,
            totals: LunTotals {
                read_ios: 37,
                ..Default::default()
            },
            pool_state: PoolState(0),
        };
        sink.publish_lun_raw("sfa-a", 100, &raw).unwrap();
        assert_eq!(sink.pending(), 1);
        sink.flush().unwrap();
        assert_eq!(sink.pending(), 0);

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(out.starts_with("lun_raw,host=sfa-a,lun=3 "));
        assert!(out.contains("read_ios=37i"));
        assert!(out.trim_end().ends_with(" 100000000000"));
    }

    #[test]
    fn histogram_fields_use_bucket_labels() {
        let mut sink = LineProtocolPublisher::new(Vec::new());
        let mut buckets = [0u64; 12];
        buckets[0] = 5;
        sink.publish_size_histogram("sfa a", 1, 0, true, &buckets).unwrap();
        sink.flush().unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(out.starts_with("lun_request_size,host=sfa\\ a,lun=0,direction=read "));
        assert!(out.contains("IO\\ Size\\ <\\=4KiB=5i"));
        assert!(out.contains("IO\\ Size\\ >4MiB=0i"));
    }

    #[test]
    fn empty_flush_writes_nothing() {
        let mut sink = LineProtocolPublisher::new(Vec::new());
        sink.flush().unwrap();
        assert!(sink.into_inner().is_empty());
    }
}
