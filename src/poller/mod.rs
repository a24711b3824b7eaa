pub mod aggregator;
pub mod gate;
pub mod publish;
pub mod scheduler;
pub mod state;
pub mod worker;

pub use aggregator::{FoldReport, SnapshotAggregator};
pub use gate::{epoch_millis, GateReceiver, TickGate};
pub use publish::{publish_tick, PublishReport};
pub use scheduler::{
    DueTiers, IntervalClock, PollScheduler, PollTick, SchedulerPhase, Tier, TickSource,
    TierSchedule,
};
pub use state::{StateHandle, StatsSnapshot};
pub use worker::ControllerWorker;
