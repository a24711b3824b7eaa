use anyhow::{Context, Result};
use clap::Parser;
use sfapoll::collectors::{CommandController, Controller, SimulatedController};
use sfapoll::config::Config;
use sfapoll::poller::{gate, ControllerWorker, IntervalClock, SnapshotAggregator, TickGate};
use sfapoll::sinks::{LineProtocolPublisher, LogPublisher, Publisher};
use sfapoll::ui::run_tui;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "sfapoll")]
#[command(about = "Storage controller performance poller - LUN rates, histograms and pool health")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "/usr/local/etc/sfapoll.toml")]
    config: PathBuf,

    /// Poll N simulated LUNs per controller instead of the hardware
    #[arg(long, value_name = "LUNS")]
    simulate: Option<u32>,

    /// Show the live LUN view
    #[arg(long)]
    tui: bool,

    /// Drive every controller from one shared tick gate
    #[arg(long)]
    lockstep: bool,

    /// Stop after this many ticks
    #[arg(long, value_name = "N")]
    ticks: Option<u64>,
}

fn build_controller(config: &Config, address: &str, simulate: Option<u32>) -> Box<dyn Controller> {
    match simulate {
        Some(luns) => {
            let drives = if config.polling.collect_disk_drives { luns * 2 } else { 0 };
            Box::new(SimulatedController::new(address, luns).with_disk_drives(drives))
        }
        None => {
            let hw = &config.hardware;
            Box::new(
                CommandController::new(address, hw.program.clone())
                    .with_args(hw.args.clone())
                    .with_credentials(hw.user.clone(), hw.password.clone()),
            )
        }
    }
}

fn build_publishers(config: &Config) -> Result<Vec<Box<dyn Publisher>>> {
    let mut publishers: Vec<Box<dyn Publisher>> = Vec::new();
    if config.log_sink.as_ref().is_some_and(|l| l.enabled) {
        publishers.push(Box::new(LogPublisher::new()));
    }
    if let Some(lp) = &config.line_protocol {
        publishers.push(Box::new(LineProtocolPublisher::open(&lp.path)?));
    }
    Ok(publishers)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = Config::load(&args.config)?;
    if !config.has_outputs() && !args.tui {
        anyhow::bail!(
            "No place to write the results: configure [log_sink] or [line_protocol], or pass --tui"
        );
    }
    let schedule = config.schedule()?;
    let average_span = config.polling.average_span;

    let stop = Arc::new(AtomicBool::new(false));
    let signal_stop = Arc::clone(&stop);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupted, stopping after the current tick");
            signal_stop.store(true, Ordering::SeqCst);
        }
    });

    let tick_gate = args.lockstep.then(TickGate::new);

    // Build every worker before starting any, so the gate knows all participants
    let mut handles = Vec::new();
    let mut workers = Vec::new();
    for controller in &config.controllers {
        let address = controller.address.as_str();
        let aggregator = SnapshotAggregator::new(
            build_controller(&config, address, args.simulate),
            config.polling.series_capacity,
        )
        .with_disk_drives(config.polling.collect_disk_drives);
        let publishers = build_publishers(&config)
            .with_context(|| format!("Failed to set up publishers for {}", address))?;

        let worker = ControllerWorker::new(aggregator, schedule, average_span, publishers);
        handles.push(worker.handle());
        workers.push((address.to_string(), worker));
    }
    log::info!(
        "Polling {} controllers every {:?} ({} mode)",
        workers.len(),
        schedule.fast_interval,
        if args.lockstep { "lockstep" } else { "free-running" }
    );

    let mut tasks = Vec::new();
    for (host, worker) in workers {
        let task = match &tick_gate {
            Some(gate) => {
                let receiver = gate.join();
                tokio::task::spawn_blocking(move || worker.run(receiver))
            }
            None => {
                let clock = IntervalClock::new(schedule.fast_interval, Arc::clone(&stop))
                    .with_max_ticks(args.ticks);
                tokio::task::spawn_blocking(move || worker.run(clock))
            }
        };
        tasks.push((host, task));
    }

    let driver = tick_gate.map(|tick_gate| {
        let stop = Arc::clone(&stop);
        let interval = schedule.fast_interval;
        let max_ticks = args.ticks;
        tokio::task::spawn_blocking(move || gate::drive(&tick_gate, interval, max_ticks, &stop))
    });

    let tui = args.tui.then(|| {
        let stop = Arc::clone(&stop);
        tokio::task::spawn_blocking(move || run_tui(handles, average_span, stop))
    });

    let total = tasks.len();
    let mut failed = 0;
    for (host, task) in tasks {
        match task.await {
            Ok(Ok(ticks)) => log::info!("{}: finished after {} ticks", host, ticks),
            // Already logged by the worker
            Ok(Err(_)) => failed += 1,
            Err(e) => {
                log::error!("{}: poller task failed: {}", host, e);
                failed += 1;
            }
        }
    }

    // Release the driver and the live view once every poller is done
    stop.store(true, Ordering::SeqCst);
    if let Some(driver) = driver {
        driver.await.context("Tick gate driver failed")?;
    }
    if let Some(tui) = tui {
        tui.await.context("TUI task failed")??;
    }

    if failed == total {
        anyhow::bail!("All {} controllers stopped with errors", total);
    }
    Ok(())
}
