/// Reset orchestration: guard, teardown, reapply, and readiness
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod probe;
pub mod progress;
pub mod provisioner;
pub mod readiness;
pub mod reaper;
pub mod tunnel;
pub mod volume;

#[cfg(test)]
pub mod testing;

pub use context::{ensure_context, TerminalConfirm};
pub use orchestrator::Orchestrator;
pub use progress::ProgressReporter;
pub use tunnel::KubectlTunnel;

/// How much is torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    /// Delete and recreate the namespace only
    Quick,
    /// Rebuild the whole local cluster first
    Nuke,
}

impl std::fmt::Display for ResetMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResetMode::Quick => write!(f, "quick"),
            ResetMode::Nuke => write!(f, "nuke"),
        }
    }
}
