pub mod collectors;
pub mod config;
pub mod domain;
pub mod error;
pub mod poller;
pub mod sinks;
pub mod ui;

pub use error::{PollError, Result};
