/// Active cluster context guard
use std::io::{BufRead, IsTerminal, Write};
use tracing::{info, warn};

use super::error::{ResetError, Result};
use crate::k8s::ClusterApi;

/// Yes/no question put to the operator
pub trait Confirm: Send + Sync {
    fn confirm(&self, question: &str) -> bool;
}

/// Asks on the terminal; answers "no" when stdin is not interactive
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, question: &str) -> bool {
        let stdin = std::io::stdin();
        if !stdin.is_terminal() {
            return false;
        }

        eprint!("{} [y/N] ", question);
        let _ = std::io::stderr().flush();

        let mut answer = String::new();
        if stdin.lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

/// Refuse to touch a cluster other than `expected`
///
/// With `switch` set, a mismatch is offered to the operator; an accepted
/// switch is re-read before the guard passes.
pub async fn ensure_context(
    cluster: &dyn ClusterApi,
    expected: &str,
    switch: Option<&dyn Confirm>,
) -> Result<()> {
    let actual = cluster.current_context().await?;
    if actual == expected {
        info!("✓ Cluster context: {}", actual);
        return Ok(());
    }

    warn!("Active context is {}, expected {}", actual, expected);

    let Some(confirm) = switch else {
        return Err(ResetError::ContextMismatch {
            expected: expected.to_string(),
            actual,
        });
    };

    let question = format!("Switch kubectl context from {} to {}?", actual, expected);
    if !confirm.confirm(&question) {
        return Err(ResetError::ContextMismatch {
            expected: expected.to_string(),
            actual,
        });
    }

    cluster.use_context(expected).await?;
    let now = cluster.current_context().await?;
    if now != expected {
        return Err(ResetError::ContextMismatch {
            expected: expected.to_string(),
            actual: now,
        });
    }

    info!("✓ Cluster context: {}", now);
    Ok(())
}
