use sfapoll::collectors::SimulatedController;
use sfapoll::domain::schema::{owned_labels, SIZE_LABELS};
use sfapoll::domain::{Histogram, Metric, PoolState};
use sfapoll::poller::{
    epoch_millis, gate, ControllerWorker, PollTick, SnapshotAggregator, TickGate, TickSource,
    TierSchedule,
};
use sfapoll::sinks::{LunRate, LunRaw, Publisher};
use sfapoll::PollError;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, SystemTime};

#[derive(Default)]
struct Recorded {
    rates: Vec<(u64, LunRate)>,
    raws: Vec<(u64, LunRaw)>,
    size_histograms: Vec<(u32, bool)>,
    latency_histograms: Vec<(u32, bool)>,
    flushes: usize,
}

struct Recorder(Arc<Mutex<Recorded>>);

impl Publisher for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn publish_lun_rate(
        &mut self,
        _host: &str,
        tick_time: u64,
        rate: &LunRate,
    ) -> anyhow::Result<()> {
        self.0.lock().unwrap().rates.push((tick_time, *rate));
        Ok(())
    }

    fn publish_lun_raw(
        &mut self,
        _host: &str,
        tick_time: u64,
        raw: &LunRaw,
    ) -> anyhow::Result<()> {
        self.0.lock().unwrap().raws.push((tick_time, *raw));
        Ok(())
    }

    fn publish_size_histogram(
        &mut self,
        _host: &str,
        _tick_time: u64,
        lun: u32,
        is_read: bool,
        _buckets: &Histogram,
    ) -> anyhow::Result<()> {
        self.0.lock().unwrap().size_histograms.push((lun, is_read));
        Ok(())
    }

    fn publish_latency_histogram(
        &mut self,
        _host: &str,
        _tick_time: u64,
        lun: u32,
        is_read: bool,
        _buckets: &Histogram,
    ) -> anyhow::Result<()> {
        self.0.lock().unwrap().latency_histograms.push((lun, is_read));
        Ok(())
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        self.0.lock().unwrap().flushes += 1;
        Ok(())
    }
}

/// Ticks two seconds apart, starting two seconds after creation, without sleeping.
struct SteppedClock {
    base: SystemTime,
    index: u64,
    ticks: u64,
}

impl SteppedClock {
    fn new(ticks: u64) -> Self {
        Self {
            base: SystemTime::now(),
            index: 0,
            ticks,
        }
    }
}

impl TickSource for SteppedClock {
    fn next_tick(&mut self) -> Option<PollTick> {
        if self.index >= self.ticks {
            return None;
        }
        let started = self.base + Duration::from_secs(2 * (self.index + 1));
        let tick = PollTick::new(self.index, started);
        self.index += 1;
        Some(tick)
    }
}

fn schedule() -> TierSchedule {
    TierSchedule::new(Duration::from_secs(2), 2, 4).unwrap()
}

type Recording = Arc<Mutex<Recorded>>;

fn worker_with(
    controller: SimulatedController,
    schedule: TierSchedule,
) -> (ControllerWorker<SimulatedController>, Recording) {
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    let publishers: Vec<Box<dyn Publisher>> = vec![Box::new(Recorder(Arc::clone(&recorded)))];
    let aggregator = SnapshotAggregator::new(controller, 50);
    (ControllerWorker::new(aggregator, schedule, 60.0, publishers), recorded)
}

fn worker(controller: SimulatedController) -> (ControllerWorker<SimulatedController>, Recording) {
    worker_with(controller, schedule())
}

#[test]
fn full_cycle_publishes_every_lun() {
    let (worker, recorded) = worker(SimulatedController::new("sfa-a", 3));
    let handle = worker.handle();

    let ticks = worker.run(SteppedClock::new(3)).unwrap();
    assert_eq!(ticks, 3);
    assert!(handle.is_ready());
    assert_eq!(handle.last_tick(), Some(2));
    assert_eq!(handle.lun_numbers(), vec![0, 1, 2]);

    let recorded = recorded.lock().unwrap();
    // Priming gives tick 0 its second sample, so every tick has rates.
    assert_eq!(recorded.rates.len(), 9);
    assert_eq!(recorded.raws.len(), 9);
    assert!(recorded.rates.iter().all(|(_, r)| r.read_iops > 0.0));
    assert_eq!(recorded.flushes, 3);

    // Medium tier is due on ticks 0 and 2: four histograms per LUN each time.
    assert_eq!(recorded.size_histograms.len(), 12);
    assert_eq!(recorded.latency_histograms.len(), 12);
    assert!(recorded.size_histograms.contains(&(2, false)));

    // The first tick folds the second stats fetch.
    let (_, first) = recorded.raws.iter().find(|(_, r)| r.lun == 1).unwrap();
    assert_eq!(first.totals.read_ios, SimulatedController::read_ios_at(1, 1));
    assert_eq!(first.pool_state, PoolState(1));
    let (_, lun0) = recorded.rates.iter().find(|(_, r)| r.lun == 0).unwrap();
    assert_eq!(lun0.pool_state, PoolState(0));
}

#[test]
fn averages_are_readable_after_the_loop() {
    let (worker, _recorded) = worker(SimulatedController::new("sfa-a", 1));
    let handle = worker.handle();
    worker.run(SteppedClock::new(4)).unwrap();

    let average = handle.average(Metric::LunWriteIops, 0, 60.0).unwrap();
    assert!(average.rate > 0.0);
    assert!(average.span > 0.0);
    assert!(handle.metric_names().contains(&"lun_read_iops"));
    assert!(handle.average(Metric::LunWriteIops, 7, 60.0).is_err());
}

#[test]
fn label_mismatch_stops_before_any_tick() {
    let mut labels = owned_labels(&SIZE_LABELS);
    labels[3] = "IO Size <=48KiB".to_string();
    let controller = SimulatedController::new("sfa-a", 2)
        .with_size_labels(SimulatedController::virtual_disk_index(1), labels);
    let (worker, recorded) = worker(controller);
    let handle = worker.handle();

    let err = worker.run(SteppedClock::new(3)).unwrap_err();
    assert!(matches!(err, PollError::SchemaMismatch { index: 3, .. }), "{err}");
    assert!(err.is_fatal());
    assert!(!handle.is_ready());

    let recorded = recorded.lock().unwrap();
    assert!(recorded.rates.is_empty());
    assert_eq!(recorded.flushes, 0);
}

#[test]
fn label_drift_on_a_slow_tick_stops_the_loop() {
    let mut labels = owned_labels(&SIZE_LABELS);
    labels[7] = "IO Size <=768KiB".to_string();
    let vd = SimulatedController::virtual_disk_index(1);
    // Fetch 0 primes, ticks 0 and 1 fold fetches 1 and 2. Fetch 2 carries
    // the drifted labels; the next slow tier (tick 2) must catch it.
    let controller =
        SimulatedController::new("sfa-a", 2).with_size_labels_after(2, vd, labels);
    let slow_every_other = TierSchedule::new(Duration::from_secs(2), 2, 2).unwrap();
    let (worker, recorded) = worker_with(controller, slow_every_other);
    let handle = worker.handle();

    let err = worker.run(SteppedClock::new(10)).unwrap_err();
    assert!(matches!(err, PollError::SchemaMismatch { index, .. } if index == vd), "{err}");
    assert!(err.is_fatal());
    assert_eq!(handle.last_tick(), Some(1));

    let recorded = recorded.lock().unwrap();
    // Nothing is published for the tick that failed, or after it.
    assert_eq!(recorded.flushes, 2);
    assert_eq!(recorded.raws.len(), 4);
}

#[test]
fn old_firmware_is_refused() {
    let controller = SimulatedController::new("sfa-a", 2).with_firmware("2.2.9");
    let (worker, _recorded) = worker(controller);
    let err = worker.run(SteppedClock::new(1)).unwrap_err();
    assert!(matches!(err, PollError::MinimumVersionUnmet { .. }));
}

#[test]
fn unpresented_virtual_disk_is_skipped() {
    let controller = SimulatedController::new("sfa-a", 2).with_unpresented(40);
    let (worker, recorded) = worker(controller);
    let handle = worker.handle();

    assert_eq!(worker.run(SteppedClock::new(2)).unwrap(), 2);
    assert_eq!(handle.lun_numbers(), vec![0, 1]);

    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.raws.len(), 4);
    assert!(recorded.raws.iter().all(|(_, r)| r.lun < 2));
}

#[test]
fn fetch_failure_stops_the_controller() {
    // Startup uses fetch 0, tick 0 uses fetch 1, tick 1 fails.
    let controller = SimulatedController::new("sfa-a", 1).fail_after(2);
    let (worker, recorded) = worker(controller);

    let err = worker.run(SteppedClock::new(5)).unwrap_err();
    assert!(matches!(err, PollError::HardwareFetch { .. }));
    assert_eq!(recorded.lock().unwrap().flushes, 1);
}

#[test]
fn lockstep_controllers_share_deadlines() {
    let gate = TickGate::new();
    let mut threads = Vec::new();
    let mut outputs = Vec::new();

    for host in ["sfa-a", "sfa-b"] {
        let (worker, recorded) = worker(SimulatedController::new(host, 2));
        let receiver = gate.join();
        outputs.push(recorded);
        threads.push(thread::spawn(move || worker.run(receiver)));
    }
    assert_eq!(gate.participants(), 2);
    assert!(gate.wait_ready(Duration::from_secs(10)));

    let base = epoch_millis();
    for k in 1..=3 {
        gate.fire(base + 2_000 * k);
        assert!(gate.wait_done(Duration::from_secs(10)));
    }
    gate.shutdown();

    for t in threads {
        assert_eq!(t.join().unwrap().unwrap(), 3);
    }
    assert_eq!(gate.participants(), 0);

    for recorded in outputs {
        let recorded = recorded.lock().unwrap();
        let times: Vec<u64> = recorded.raws.iter().map(|(t, _)| *t).collect();
        let expected: Vec<u64> = (1..=3)
            .flat_map(|k| [(base + 2_000 * k) / 1_000; 2])
            .collect();
        assert_eq!(times, expected);
        // Every tick, tick 0 included, lands after the startup sample.
        assert_eq!(recorded.rates.len(), 6);
    }
}

#[test]
fn driven_gate_gives_every_tick_rates() {
    let gate = TickGate::new();
    let mut threads = Vec::new();
    let mut handles = Vec::new();
    let mut outputs = Vec::new();

    for host in ["sfa-a", "sfa-b"] {
        let (worker, recorded) = worker(SimulatedController::new(host, 2));
        let receiver = gate.join();
        handles.push(worker.handle());
        outputs.push(recorded);
        threads.push(thread::spawn(move || worker.run(receiver)));
    }

    let driver_gate = Arc::clone(&gate);
    let driver = thread::spawn(move || {
        let stop = AtomicBool::new(false);
        gate::drive(&driver_gate, Duration::from_millis(100), Some(3), &stop);
    });

    for t in threads {
        assert_eq!(t.join().unwrap().unwrap(), 3);
    }
    driver.join().unwrap();

    let mut tick_times = Vec::new();
    for recorded in &outputs {
        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.rates.len(), 6);
        assert!(recorded.rates.iter().all(|(_, r)| r.read_iops > 0.0));
        let times: Vec<u64> = recorded.raws.iter().map(|(t, _)| *t).collect();
        assert!(times.windows(2).all(|w| w[1] >= w[0]));
        tick_times.push(times);
    }
    assert_eq!(tick_times[0], tick_times[1]);

    for handle in &handles {
        assert_eq!(handle.last_tick(), Some(2));
        let average = handle.average(Metric::LunReadIops, 1, 60.0).unwrap();
        assert!(average.span > 0.0);
    }
}

#[test]
fn whole_second_deadline_still_follows_startup() {
    let gate = TickGate::new();
    let (worker, recorded) = worker(SimulatedController::new("sfa-a", 2));
    let receiver = gate.join();
    let runner = thread::spawn(move || worker.run(receiver));

    assert!(gate.wait_ready(Duration::from_secs(10)));
    // Truncated to the second, so usually earlier than the startup sample
    gate.fire(epoch_millis() / 1_000 * 1_000);
    assert!(gate.wait_done(Duration::from_secs(10)));
    gate.shutdown();
    assert_eq!(runner.join().unwrap().unwrap(), 1);

    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.rates.len(), 2);
}

#[test]
fn failed_participant_does_not_hold_the_gate() {
    let gate = TickGate::new();

    let (good, _) = worker(SimulatedController::new("sfa-a", 1));
    let (bad, _) = worker(SimulatedController::new("sfa-b", 1).with_firmware("1.0"));
    let good_rx = gate.join();
    let bad_rx = gate.join();

    let good = thread::spawn(move || good.run(good_rx));
    let bad = thread::spawn(move || bad.run(bad_rx));
    assert!(bad.join().unwrap().is_err());
    assert_eq!(gate.participants(), 1);

    gate.fire(epoch_millis() + 2_000);
    assert!(gate.wait_done(Duration::from_secs(10)));
    gate.shutdown();
    assert_eq!(good.join().unwrap().unwrap(), 1);
}
