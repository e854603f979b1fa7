//! Cooperative cancellation and per-project computation budgets.
//!
//! Pairwise matching is quadratic in the contributor count of a project, so
//! long-running loops poll a [`ComputeBudget`] once per project.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::CalcError;

/// Cancellation flag shared between a caller and running calculations.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

/// Cancellation token plus an optional wall-clock deadline.
#[derive(Debug, Clone, Default)]
pub struct ComputeBudget {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl ComputeBudget {
    /// A budget that never runs out and cannot be cancelled by anyone else.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Budget expiring `limit` from now. `None` means no deadline.
    pub fn starting_now(token: CancellationToken, limit: Option<Duration>) -> Self {
        Self {
            token,
            deadline: limit.map(|l| Instant::now() + l),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Fail when cancelled or past the deadline.
    ///
    /// `projects_done` is only used to describe progress in the error.
    pub fn check(&self, projects_done: usize) -> Result<(), CalcError> {
        if self.token.is_cancelled() {
            return Err(CalcError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(CalcError::BudgetExceeded { projects_done });
            }
        }
        Ok(())
    }
}
