use crate::domain::{HistogramKind, Metric, PoolState};
use crate::error::PollError;
use crate::poller::scheduler::{DueTiers, PollTick};
use crate::poller::state::StateHandle;
use crate::sinks::{LunRate, LunRaw, Publisher};
use log::{debug, error, warn};

/// Metric order used to build a [`LunRate`].
const RATE_METRICS: [Metric; 7] = [
    Metric::LunTransferBytes,
    Metric::LunReadBytes,
    Metric::LunWriteBytes,
    Metric::LunReadIops,
    Metric::LunWriteIops,
    Metric::LunForwardedBytes,
    Metric::LunForwardedIops,
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub rates: usize,
    pub raws: usize,
    pub histograms: usize,
    pub skipped: usize,
}

/// Forward one tick's averages and snapshot to every publisher.
///
/// Missing data for one LUN never holds back the others. Publisher
/// failures are logged and do not stop the poll loop.
pub fn publish_tick(
    state: &StateHandle,
    tick: &PollTick,
    due: DueTiers,
    average_span: f64,
    publishers: &mut [Box<dyn Publisher>],
) -> PublishReport {
    let mut report = PublishReport::default();
    if publishers.is_empty() {
        return report;
    }

    let host = state.host();
    let tick_time = tick.epoch_seconds();
    let snapshot = state.snapshot();
    let luns = state.lun_numbers();

    for &lun in &luns {
        let pool_state = snapshot.pool_state(lun).unwrap_or_else(|| {
            error!(
                "{}: no storage pool state mapped to LUN {}, reporting UNKNOWN",
                host, lun
            );
            PoolState::UNKNOWN
        });

        if due.fast {
            match state.averages(&RATE_METRICS, lun, average_span) {
                Ok(avgs) => {
                    let rate = LunRate {
                        lun,
                        transfer_bw: avgs[0].rate,
                        read_bw: avgs[1].rate,
                        write_bw: avgs[2].rate,
                        read_iops: avgs[3].rate,
                        write_iops: avgs[4].rate,
                        forwarded_bw: avgs[5].rate,
                        forwarded_iops: avgs[6].rate,
                        pool_state,
                    };
                    for publisher in publishers.iter_mut() {
                        if let Err(e) = publisher.publish_lun_rate(host, tick_time, &rate) {
                            warn!(
                                "{}: {} rejected LUN {} rates: {:#}",
                                host,
                                publisher.name(),
                                lun,
                                e
                            );
                        }
                    }
                    report.rates += 1;
                }
                Err(e @ PollError::EmptyTimeSeries { .. }) => {
                    debug!("{}: skipping LUN {} rates: {}", host, lun, e);
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!("{}: LUN {} rates unavailable: {}", host, lun, e);
                    report.skipped += 1;
                }
            }
        }

        let Some(stats) = snapshot.lun(lun) else {
            debug!("{}: LUN {} has no statistics this tick", host, lun);
            report.skipped += 1;
            continue;
        };

        if due.fast {
            let raw = LunRaw {
                lun,
                totals: stats.totals(),
                pool_state,
            };
            for publisher in publishers.iter_mut() {
                if let Err(e) = publisher.publish_lun_raw(host, tick_time, &raw) {
                    warn!(
                        "{}: {} rejected LUN {} raw counters: {:#}",
                        host,
                        publisher.name(),
                        lun,
                        e
                    );
                }
            }
            report.raws += 1;
        }

        if due.medium {
            for kind in HistogramKind::ALL {
                let buckets = stats.histogram(kind);
                for publisher in publishers.iter_mut() {
                    let is_read = kind.is_read();
                    let result = if kind.is_size() {
                        publisher.publish_size_histogram(host, tick_time, lun, is_read, buckets)
                    } else {
                        publisher.publish_latency_histogram(host, tick_time, lun, is_read, buckets)
                    };
                    if let Err(e) = result {
                        warn!(
                            "{}: {} rejected LUN {} histogram: {:#}",
                            host,
                            publisher.name(),
                            lun,
                            e
                        );
                    }
                }
                report.histograms += 1;
            }
        }
    }

    for publisher in publishers.iter_mut() {
        if let Err(e) = publisher.flush() {
            error!("{}: failed to flush {}: {:#}", host, publisher.name(), e);
        }
    }

    report
}
