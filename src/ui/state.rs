use crate::domain::{Metric, PoolState};
use crate::poller::StateHandle;
use std::collections::{HashMap, VecDeque};
use std::time::Instant;

/// Minimum history size to ensure some data is always available
const MIN_HISTORY_SIZE: usize = 60;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

const ROW_METRICS: [Metric; 5] = [
    Metric::LunReadIops,
    Metric::LunWriteIops,
    Metric::LunReadBytes,
    Metric::LunWriteBytes,
    Metric::LunForwardedIops,
];

/// Averaged rates for one LUN row.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LunRates {
    pub read_iops: f64,
    pub write_iops: f64,
    pub read_mbps: f64,
    pub write_mbps: f64,
    pub forwarded_iops: f64,
}

impl LunRates {
    pub fn total_iops(&self) -> f64 {
        self.read_iops + self.write_iops
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LunRow {
    pub lun: u32,
    /// `None` until the series holds enough samples to average
    pub rates: Option<LunRates>,
    pub pool_state: Option<PoolState>,
}

#[derive(Clone, Debug)]
pub struct ControllerView {
    pub host: String,
    pub ready: bool,
    pub last_tick: Option<u64>,
    pub rows: Vec<LunRow>,
}

impl ControllerView {
    pub fn total_iops(&self) -> f64 {
        self.rows
            .iter()
            .filter_map(|r| r.rates.as_ref())
            .map(LunRates::total_iops)
            .sum()
    }
}

#[derive(Clone, Debug)]
pub struct AppState {
    pub controllers: Vec<ControllerView>,
    pub average_span: f64,
    pub last_update: Instant,
    pub should_quit: bool,

    // Dynamic history size based on terminal width
    history_size: usize,

    // Per-controller total IOPS for sparklines
    pub iops_history: HashMap<String, VecDeque<f64>>,
}

impl AppState {
    pub fn new(average_span: f64) -> Self {
        Self {
            controllers: Vec::new(),
            average_span,
            last_update: Instant::now(),
            should_quit: false,
            history_size: MIN_HISTORY_SIZE,
            iops_history: HashMap::new(),
        }
    }

    /// Update history size based on terminal width
    pub fn set_terminal_width(&mut self, width: u16) {
        self.history_size = (width as usize).max(MIN_HISTORY_SIZE);
    }

    fn trim_history<T>(history: &mut VecDeque<T>, max_size: usize) {
        while history.len() > max_size {
            history.pop_front();
        }
    }

    /// Re-read every controller's state and extend the IOPS history when a
    /// controller has completed a new tick since the last refresh.
    pub fn refresh(&mut self, handles: &[StateHandle]) {
        let history_size = self.history_size;
        let mut controllers = Vec::with_capacity(handles.len());

        for handle in handles {
            let view = Self::read_controller(handle, self.average_span);

            let previous_tick = self
                .controllers
                .iter()
                .find(|c| c.host == view.host)
                .and_then(|c| c.last_tick);
            if view.last_tick.is_some() && view.last_tick != previous_tick {
                let history = self.iops_history.entry(view.host.clone()).or_default();
                history.push_back(view.total_iops());
                Self::trim_history(history, history_size);
            }
            controllers.push(view);
        }

        self.iops_history
            .retain(|host, _| controllers.iter().any(|c| &c.host == host));
        self.controllers = controllers;
        self.last_update = Instant::now();
    }

    fn read_controller(handle: &StateHandle, average_span: f64) -> ControllerView {
        let snapshot = handle.snapshot();
        let rows = handle
            .lun_numbers()
            .into_iter()
            .map(|lun| {
                let rates = handle
                    .averages(&ROW_METRICS, lun, average_span)
                    .ok()
                    .map(|avgs| LunRates {
                        read_iops: avgs[0].rate,
                        write_iops: avgs[1].rate,
                        read_mbps: avgs[2].rate / BYTES_PER_MB,
                        write_mbps: avgs[3].rate / BYTES_PER_MB,
                        forwarded_iops: avgs[4].rate,
                    });
                LunRow {
                    lun,
                    rates,
                    pool_state: snapshot.pool_state(lun),
                }
            })
            .collect();

        ControllerView {
            host: handle.host().to_string(),
            ready: handle.is_ready(),
            last_tick: handle.last_tick(),
            rows,
        }
    }

    pub fn lun_count(&self) -> usize {
        self.controllers.iter().map(|c| c.rows.len()).sum()
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Presentation;

    fn handle() -> StateHandle {
        let handle = StateHandle::new("sfa-a", 10);
        handle.lock().registry.rebuild(&[
            Presentation {
                virtual_disk_index: 1,
                logical_unit_number: 0,
            },
            Presentation {
                virtual_disk_index: 3,
                logical_unit_number: 1,
            },
        ]);
        handle
    }

    #[test]
    fn rows_without_history_have_no_rates() {
        let handle = handle();
        let mut state = AppState::new(60.0);
        state.refresh(std::slice::from_ref(&handle));

        assert_eq!(state.lun_count(), 2);
        let view = &state.controllers[0];
        assert!(!view.ready);
        assert!(view.rows.iter().all(|r| r.rates.is_none()));
        assert!(state.iops_history.is_empty());
    }

    #[test]
    fn history_grows_once_per_tick() {
        let handle = handle();
        {
            let mut s = handle.lock();
            for metric in ROW_METRICS {
                s.store.append(metric, 0, 0.0, 0.0);
                s.store.append(metric, 0, 20.0, 2.0);
            }
            s.last_tick = Some(0);
        }

        let mut state = AppState::new(60.0);
        state.refresh(std::slice::from_ref(&handle));
        state.refresh(std::slice::from_ref(&handle));

        let rates = state.controllers[0].rows[0].rates.unwrap();
        assert_eq!(rates.read_iops, 10.0);
        assert_eq!(state.controllers[0].total_iops(), 20.0);
        assert_eq!(state.iops_history["sfa-a"].len(), 1);

        handle.lock().last_tick = Some(1);
        state.refresh(std::slice::from_ref(&handle));
        assert_eq!(state.iops_history["sfa-a"].len(), 2);
    }

    #[test]
    fn history_is_bounded() {
        let mut history: VecDeque<u32> = (0..100).collect();
        AppState::trim_history(&mut history, 60);
        assert_eq!(history.len(), 60);
        assert_eq!(history.front(), Some(&40));
    }
}
