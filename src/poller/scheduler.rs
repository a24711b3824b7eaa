use crate::error::{PollError, Result};
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Fast interval plus the medium and slow multiples of it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TierSchedule {
    pub fast_interval: Duration,
    pub med_multiple: u64,
    pub slow_multiple: u64,
}

impl TierSchedule {
    pub fn new(fast_interval: Duration, med_multiple: u64, slow_multiple: u64) -> Result<Self> {
        if fast_interval.is_zero() {
            return Err(PollError::InvalidSchedule(
                "fast interval must be greater than zero".into(),
            ));
        }
        if med_multiple == 0 || slow_multiple == 0 {
            return Err(PollError::InvalidSchedule(format!(
                "multiples must be at least 1 (medium {}, slow {})",
                med_multiple, slow_multiple
            )));
        }
        Ok(Self {
            fast_interval,
            med_multiple,
            slow_multiple,
        })
    }

    /// Tiers due on the given tick. Tick 0 runs every tier.
    pub fn due(&self, tick_index: u64) -> DueTiers {
        DueTiers {
            fast: true,
            medium: tick_index % self.med_multiple == 0,
            slow: tick_index % self.slow_multiple == 0,
        }
    }
}

impl Default for TierSchedule {
    fn default() -> Self {
        Self {
            fast_interval: Duration::from_secs(2),
            med_multiple: 15,
            slow_multiple: 60,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DueTiers {
    pub fast: bool,
    pub medium: bool,
    pub slow: bool,
}

impl DueTiers {
    /// Due tiers in the order they run: fast, medium, slow.
    pub fn tiers(&self) -> impl Iterator<Item = Tier> {
        [
            (self.fast, Tier::Fast),
            (self.medium, Tier::Medium),
            (self.slow, Tier::Slow),
        ]
        .into_iter()
        .filter_map(|(due, tier)| due.then_some(tier))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tier {
    Fast,
    Medium,
    Slow,
}

impl Tier {
    pub fn phase(&self) -> SchedulerPhase {
        match self {
            Tier::Fast => SchedulerPhase::FastDue,
            Tier::Medium => SchedulerPhase::MediumDue,
            Tier::Slow => SchedulerPhase::SlowDue,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PollTick {
    pub index: u64,
    pub started: SystemTime,
}

impl PollTick {
    pub fn new(index: u64, started: SystemTime) -> Self {
        Self { index, started }
    }

    /// Tick start as fractional seconds since the epoch.
    pub fn timestamp(&self) -> f64 {
        self.started
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Tick start as whole seconds since the epoch, as published to sinks.
    pub fn epoch_seconds(&self) -> u64 {
        self.started
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Where the scheduler is within its cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerPhase {
    Idle,
    Ticking,
    FastDue,
    MediumDue,
    SlowDue,
    PublishDue,
}

/// Supplies tick boundaries. `None` means the loop should stop.
pub trait TickSource {
    /// Called once startup work is done, before the first `next_tick`.
    fn ready(&mut self) {}

    fn next_tick(&mut self) -> Option<PollTick>;

    /// Called once the work for `tick` is finished.
    fn complete(&mut self, _tick: &PollTick) {}
}

/// Paces ticks from the local clock, one fast interval apart.
pub struct IntervalClock {
    interval: Duration,
    next_deadline: Instant,
    index: u64,
    stop: Arc<AtomicBool>,
    max_ticks: Option<u64>,
}

impl IntervalClock {
    /// The first tick fires one interval from now.
    pub fn new(interval: Duration, stop: Arc<AtomicBool>) -> Self {
        Self {
            interval,
            next_deadline: Instant::now() + interval,
            index: 0,
            stop,
            max_ticks: None,
        }
    }

    pub fn with_max_ticks(mut self, max_ticks: Option<u64>) -> Self {
        self.max_ticks = max_ticks;
        self
    }
}

impl TickSource for IntervalClock {
    fn next_tick(&mut self) -> Option<PollTick> {
        if self.stop.load(Ordering::SeqCst) {
            return None;
        }
        if let Some(max) = self.max_ticks {
            if self.index >= max {
                return None;
            }
        }

        let now = Instant::now();
        if now < self.next_deadline {
            std::thread::sleep(self.next_deadline - now);
        }
        if self.stop.load(Ordering::SeqCst) {
            return None;
        }

        // Keep the cadence anchored; skip boundaries missed by a slow tick.
        self.next_deadline += self.interval;
        let now = Instant::now();
        while self.next_deadline <= now {
            self.next_deadline += self.interval;
        }

        let tick = PollTick::new(self.index, SystemTime::now());
        self.index += 1;
        Some(tick)
    }
}

/// Drives the tiered tick loop for one controller.
pub struct PollScheduler<S: TickSource> {
    schedule: TierSchedule,
    source: S,
    phase: SchedulerPhase,
}

impl<S: TickSource> PollScheduler<S> {
    pub fn new(schedule: TierSchedule, source: S) -> Self {
        Self {
            schedule,
            source,
            phase: SchedulerPhase::Idle,
        }
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn schedule(&self) -> &TierSchedule {
        &self.schedule
    }

    /// Run ticks until the source stops or a tick returns an error.
    ///
    /// `poll` runs once per due tier, fast then medium then slow, and
    /// `publish` runs afterwards on the same tick. A started tick always
    /// runs to the end (or its first error) before the stop condition is
    /// looked at again. Returns the number of completed ticks.
    pub fn run<P, Q>(&mut self, mut poll: P, mut publish: Q) -> Result<u64>
    where
        P: FnMut(&PollTick, Tier) -> Result<()>,
        Q: FnMut(&PollTick, DueTiers) -> Result<()>,
    {
        let mut completed = 0;

        while let Some(tick) = self.source.next_tick() {
            self.phase = SchedulerPhase::Ticking;
            let due = self.schedule.due(tick.index);
            debug!(
                "tick {} due: fast={} medium={} slow={}",
                tick.index, due.fast, due.medium, due.slow
            );

            let mut result = Ok(());
            for tier in due.tiers() {
                self.phase = tier.phase();
                result = poll(&tick, tier);
                if result.is_err() {
                    break;
                }
            }
            let result = result.and_then(|_| {
                self.phase = SchedulerPhase::PublishDue;
                publish(&tick, due)
            });

            self.source.complete(&tick);
            self.phase = SchedulerPhase::Idle;
            result?;
            completed += 1;
        }

        Ok(completed)
    }
}
