pub mod command;
pub mod controller;
pub mod simulated;

pub use command::CommandController;
pub use controller::Controller;
pub use simulated::SimulatedController;
