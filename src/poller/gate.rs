//! Shared go/done tick signal for running several controllers in lockstep.
//!
//! A driver publishes a tick deadline (epoch milliseconds) and wakes every
//! participant; each participant runs one tick and reports done. A deadline
//! of zero tells participants to shut down without doing any work.

use crate::poller::scheduler::{PollTick, TickSource};
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Milliseconds since the epoch, never zero.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(1)
        .max(1)
}

#[derive(Debug, Default)]
struct GateState {
    generation: u64,
    deadline: u64,
    participants: usize,
    pending: usize,
    /// Participants that have not finished their startup yet
    starting: usize,
}

#[derive(Debug, Default)]
pub struct TickGate {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl TickGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a participant that will be woken by subsequent `fire` calls.
    pub fn join(self: &Arc<Self>) -> GateReceiver {
        let mut state = self.lock();
        state.participants += 1;
        state.starting += 1;
        GateReceiver {
            gate: Arc::clone(self),
            seen_generation: state.generation,
            outstanding: false,
            ready: false,
            last_stamp: 0,
            index: 0,
        }
    }

    /// Start a new tick with the given deadline and wake all participants.
    pub fn fire(&self, deadline: u64) {
        let mut state = self.lock();
        state.generation += 1;
        state.deadline = deadline;
        state.pending = state.participants;
        debug!(
            "gate generation {} deadline {} for {} participants",
            state.generation, deadline, state.participants
        );
        self.changed.notify_all();
    }

    /// Fire the zero deadline so every participant exits.
    pub fn shutdown(&self) {
        self.fire(0);
    }

    /// Block until every participant has finished the current tick.
    ///
    /// Returns false if `timeout` elapsed with participants still busy.
    pub fn wait_done(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while state.pending > 0 {
            let now = Instant::now();
            if now >= deadline {
                warn!(
                    "{} of {} participants still busy with generation {}",
                    state.pending, state.participants, state.generation
                );
                return false;
            }
            state = self
                .changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
        true
    }

    /// Block until every participant has taken its startup sample.
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while state.starting > 0 {
            let now = Instant::now();
            if now >= deadline {
                debug!(
                    "{} of {} participants still starting",
                    state.starting, state.participants
                );
                return false;
            }
            state = self
                .changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
        true
    }

    pub fn participants(&self) -> usize {
        self.lock().participants
    }

    fn finish_one(&self, state: &mut GateState) {
        state.pending = state.pending.saturating_sub(1);
        if state.pending == 0 {
            self.changed.notify_all();
        }
    }

    fn finish_starting(&self, state: &mut GateState) {
        state.starting = state.starting.saturating_sub(1);
        if state.starting == 0 {
            self.changed.notify_all();
        }
    }
}

/// One participant's view of a [`TickGate`].
pub struct GateReceiver {
    gate: Arc<TickGate>,
    seen_generation: u64,
    outstanding: bool,
    ready: bool,
    /// Millisecond stamp of the last tick, or of readiness before the first
    last_stamp: u64,
    index: u64,
}

impl TickSource for GateReceiver {
    fn ready(&mut self) {
        if self.ready {
            return;
        }
        self.ready = true;
        self.last_stamp = epoch_millis();
        let mut state = self.gate.lock();
        self.gate.finish_starting(&mut state);
    }

    fn next_tick(&mut self) -> Option<PollTick> {
        // Waiting for a tick means startup is over.
        self.ready();

        let mut state = self.gate.lock();
        while state.generation == self.seen_generation {
            state = self
                .gate
                .changed
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
        self.seen_generation = state.generation;

        if state.deadline == 0 {
            // Shutdown still counts as finishing the generation.
            self.gate.finish_one(&mut state);
            return None;
        }

        // Samples taken before readiness must stay strictly older than
        // every tick, whatever deadline the driver picked.
        let stamp = state.deadline.max(self.last_stamp + 1);
        if stamp != state.deadline {
            debug!(
                "gate deadline {} precedes this participant's last sample, stamping {}",
                state.deadline, stamp
            );
        }
        self.last_stamp = stamp;
        self.outstanding = true;

        let tick = PollTick::new(self.index, UNIX_EPOCH + Duration::from_millis(stamp));
        self.index += 1;
        Some(tick)
    }

    fn complete(&mut self, _tick: &PollTick) {
        if self.outstanding {
            self.outstanding = false;
            let mut state = self.gate.lock();
            self.gate.finish_one(&mut state);
        }
    }
}

impl Drop for GateReceiver {
    fn drop(&mut self) {
        let mut state = self.gate.lock();
        state.participants = state.participants.saturating_sub(1);
        if !self.ready {
            self.gate.finish_starting(&mut state);
        }
        // Owes a done for a tick in progress or one fired but never picked up.
        let unclaimed = state.generation != self.seen_generation && state.pending > 0;
        if self.outstanding || unclaimed {
            self.gate.finish_one(&mut state);
        }
    }
}

/// Fire the gate once per `interval` until `stop` says otherwise, then
/// send the shutdown deadline.
///
/// No tick fires before every participant has finished startup, and the
/// first one comes a full interval after that.
pub fn drive(gate: &TickGate, interval: Duration, max_ticks: Option<u64>, stop: &AtomicBool) {
    while !gate.wait_ready(interval) {
        if stop.load(Ordering::SeqCst) {
            break;
        }
    }

    let mut fired = 0u64;
    let mut last_deadline = 0u64;
    let mut next = Instant::now() + interval;

    loop {
        let now = Instant::now();
        if now < next {
            std::thread::sleep(next - now);
        }
        next += interval;

        if stop.load(Ordering::SeqCst)
            || max_ticks.is_some_and(|max| fired >= max)
            || gate.participants() == 0
        {
            break;
        }

        let deadline = epoch_millis().max(last_deadline + 1);
        last_deadline = deadline;
        gate.fire(deadline);
        fired += 1;

        // A tick may overrun the interval; never fire on top of it.
        while !gate.wait_done(interval) {
            if stop.load(Ordering::SeqCst) {
                break;
            }
        }
    }

    gate.shutdown();
    gate.wait_done(interval.max(Duration::from_secs(1)));
}
