use crate::error::{PollError, Result};
use std::collections::{HashMap, VecDeque};

/// 10 minutes of data at a 2 second fast tick
pub const DEFAULT_CAPACITY: usize = 300;

/// Metrics tracked per device, one series each.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    LunReadIops,
    LunWriteIops,
    LunTransferBytes,
    LunReadBytes,
    LunWriteBytes,
    LunForwardedBytes,
    LunForwardedIops,
    DriveReadIops,
    DriveWriteIops,
    DriveTransferBytes,
}

impl Metric {
    pub const LUN: [Metric; 7] = [
        Metric::LunReadIops,
        Metric::LunWriteIops,
        Metric::LunTransferBytes,
        Metric::LunReadBytes,
        Metric::LunWriteBytes,
        Metric::LunForwardedBytes,
        Metric::LunForwardedIops,
    ];

    pub const DRIVE: [Metric; 3] = [
        Metric::DriveReadIops,
        Metric::DriveWriteIops,
        Metric::DriveTransferBytes,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::LunReadIops => "lun_read_iops",
            Metric::LunWriteIops => "lun_write_iops",
            Metric::LunTransferBytes => "lun_transfer_bytes",
            Metric::LunReadBytes => "lun_read_bytes",
            Metric::LunWriteBytes => "lun_write_bytes",
            Metric::LunForwardedBytes => "lun_forwarded_bytes",
            Metric::LunForwardedIops => "lun_forwarded_iops",
            Metric::DriveReadIops => "dd_read_iops",
            Metric::DriveWriteIops => "dd_write_iops",
            Metric::DriveTransferBytes => "dd_transfer_bytes",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub timestamp: f64,
    pub value: f64,
}

/// Windowed rate over the newest samples of a series.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Average {
    pub rate: f64,
    /// Elapsed seconds actually covered, which may be shorter than requested.
    pub span: f64,
}

/// Fixed-capacity FIFO of per-interval samples.
#[derive(Clone, Debug)]
pub struct TimeSeries {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl TimeSeries {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, value: f64, timestamp: f64) {
        self.samples.push_back(Sample { timestamp, value });
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn samples(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Sum of the samples no older than `span` seconds before the newest
    /// one, divided by the time between the oldest and newest of them.
    ///
    /// Returns `None` when fewer than two samples qualify or they share a
    /// timestamp, since there is no elapsed interval to divide by.
    pub fn average(&self, span: f64) -> Option<Average> {
        let newest = self.samples.back()?;
        let t_max = newest.timestamp;
        let cutoff = t_max - span;

        let mut count = 0usize;
        let mut sum = 0.0;
        let mut t_min = t_max;
        for sample in self.samples.iter().rev() {
            if sample.timestamp < cutoff {
                break;
            }
            count += 1;
            sum += sample.value;
            t_min = sample.timestamp;
        }

        let elapsed = t_max - t_min;
        if count < 2 || elapsed <= 0.0 {
            return None;
        }

        Some(Average {
            rate: sum / elapsed,
            span: elapsed,
        })
    }
}

/// All series of one controller, keyed by (metric, device id).
#[derive(Clone, Debug)]
pub struct TimeSeriesStore {
    series: HashMap<(Metric, u32), TimeSeries>,
    capacity: usize,
}

impl TimeSeriesStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            series: HashMap::new(),
            capacity,
        }
    }

    /// Appends a sample, creating the series on first sight of the device.
    pub fn append(&mut self, metric: Metric, device: u32, value: f64, timestamp: f64) {
        let capacity = self.capacity;
        self.series
            .entry((metric, device))
            .or_insert_with(|| TimeSeries::new(capacity))
            .append(value, timestamp);
    }

    pub fn average(&self, metric: Metric, device: u32, span: f64) -> Result<Average> {
        let series = self.series.get(&(metric, device));
        series
            .and_then(|s| s.average(span))
            .ok_or(PollError::EmptyTimeSeries {
                metric: metric.name(),
                device,
                samples: series.map(|s| s.len()).unwrap_or(0),
            })
    }

    pub fn get(&self, metric: Metric, device: u32) -> Option<&TimeSeries> {
        self.series.get(&(metric, device))
    }

    /// Sorted, deduplicated names of the metrics that have at least one series.
    pub fn metric_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.series.keys().map(|(m, _)| m.name()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

impl Default for TimeSeriesStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
