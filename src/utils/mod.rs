/// Shared helpers for running external tools and bounded polling
pub mod command;
pub mod polling;

pub use polling::{PollOutcome, PollingConfig, Probe};
