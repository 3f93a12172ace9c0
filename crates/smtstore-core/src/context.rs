//! Operation context: cancellation and deadlines
//!
//! Every storage call takes a [`Context`]. Backends race their database work
//! against [`Context::done`] and abort the pending statement when it resolves.

use crate::error::StorageError;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation and deadline carried through a storage call
///
/// Cloning a context shares the same token and deadline.
#[derive(Debug, Clone)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Deadline>,
}

#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    timeout: Duration,
}

impl Context {
    /// A context that is never cancelled unless [`cancel`](Self::cancel) is called
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// A context that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().timeout(timeout)
    }

    /// A context cancelled through an existing token
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Builder-style: add (or tighten) a deadline `timeout` from now
    ///
    /// A timeout too large to represent as an instant adds no deadline.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        let Some(at) = Instant::now().checked_add(timeout) else {
            return self;
        };
        match self.deadline {
            Some(existing) if existing.at <= at => {}
            _ => self.deadline = Some(Deadline { at, timeout }),
        }
        self
    }

    /// Derive a context that is cancelled when this one is, but can also be
    /// cancelled on its own
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancel this context and all of its children
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline.map(|d| d.at)
    }

    /// The error this context would abort with right now, if any
    pub fn err(&self) -> Option<StorageError> {
        if self.token.is_cancelled() {
            return Some(StorageError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline.at => Some(timeout_error(deadline)),
            _ => None,
        }
    }

    /// Resolve once the context is cancelled or its deadline passes
    pub async fn done(&self) -> StorageError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => StorageError::Cancelled,
                    _ = tokio::time::sleep_until(deadline.at) => timeout_error(deadline),
                }
            }
            None => {
                self.token.cancelled().await;
                StorageError::Cancelled
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

fn timeout_error(deadline: Deadline) -> StorageError {
    StorageError::Timeout {
        duration_ms: u64::try_from(deadline.timeout.as_millis()).unwrap_or(u64::MAX),
    }
}
