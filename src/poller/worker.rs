use crate::collectors::Controller;
use crate::error::Result;
use crate::poller::aggregator::SnapshotAggregator;
use crate::poller::publish::publish_tick;
use crate::poller::scheduler::{PollScheduler, TickSource, TierSchedule};
use crate::poller::state::StateHandle;
use crate::sinks::Publisher;
use log::{error, info};

/// One controller's complete poll-aggregate-publish pipeline.
pub struct ControllerWorker<C: Controller> {
    aggregator: SnapshotAggregator<C>,
    publishers: Vec<Box<dyn Publisher>>,
    schedule: TierSchedule,
    average_span: f64,
}

impl<C: Controller> ControllerWorker<C> {
    pub fn new(
        aggregator: SnapshotAggregator<C>,
        schedule: TierSchedule,
        average_span: f64,
        publishers: Vec<Box<dyn Publisher>>,
    ) -> Self {
        Self {
            aggregator,
            publishers,
            schedule,
            average_span,
        }
    }

    pub fn handle(&self) -> StateHandle {
        self.aggregator.handle()
    }

    /// Start up, then tick until `source` stops or something fatal happens.
    ///
    /// Returns the number of completed ticks.
    pub fn run<S: TickSource>(mut self, mut source: S) -> Result<u64> {
        let host = self.aggregator.host().to_string();

        if let Err(e) = self.aggregator.start() {
            error!("{}: startup failed: {}", host, e);
            return Err(e);
        }
        info!("{}: starting poll loop", host);
        source.ready();

        let handle = self.aggregator.handle();
        let average_span = self.average_span;
        let aggregator = &mut self.aggregator;
        let publishers = &mut self.publishers;

        let mut scheduler = PollScheduler::new(self.schedule, source);
        let result = scheduler.run(
            |tick, tier| aggregator.poll_tier(tick, tier),
            |tick, due| {
                handle.mark_polled(tick.index);
                publish_tick(&handle, tick, due, average_span, publishers);
                Ok(())
            },
        );

        match result {
            Ok(ticks) => {
                info!("{}: poll loop stopped after {} ticks", host, ticks);
                Ok(ticks)
            }
            Err(e) => {
                error!("{}: {}", host, e);
                Err(e)
            }
        }
    }
}
