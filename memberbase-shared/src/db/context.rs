//! Per-request execution context
//!
//! Every repository call takes an [`ExecContext`]. It carries the request's
//! trace ID for log correlation, an optional deadline and a cancellation
//! token. The transaction coordinator runs each store primitive through
//! [`ExecContext::run`], so a caller timeout or cancellation aborts in-flight
//! work instead of blocking on the store.

use crate::error::StoreError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Trace ID, deadline and cancellation for one logical operation
#[derive(Debug, Clone)]
pub struct ExecContext {
    trace_id: String,
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl ExecContext {
    /// Context with no deadline and a fresh cancellation token
    pub fn new(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Context with a random trace ID, for background jobs and tests
    pub fn background() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    /// Sets the deadline to `timeout` from now
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Shares an externally owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Token that cancels every operation run under this context
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Runs `fut` unless the context is cancelled or its deadline passes first
    ///
    /// `op` names the operation in the resulting [`StoreError`]. A context
    /// that is already cancelled or expired never polls `fut`.
    ///
    /// # Errors
    ///
    /// - `StoreError::Cancelled` if the token fires first
    /// - `StoreError::DeadlineExceeded` if the deadline passes first
    /// - whatever `fut` itself returns
    pub async fn run<T, E, F>(&self, op: &'static str, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<StoreError>,
    {
        if self.cancel.is_cancelled() {
            return Err(StoreError::Cancelled { op }.into());
        }

        let guarded = async {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(StoreError::Cancelled { op }.into()),
                result = fut => result,
            }
        };

        match self.deadline {
            Some(deadline) => {
                if Instant::now() >= deadline {
                    return Err(StoreError::DeadlineExceeded { op }.into());
                }
                match tokio::time::timeout_at(deadline, guarded).await {
                    Ok(result) => result,
                    Err(_) => Err(StoreError::DeadlineExceeded { op }.into()),
                }
            }
            None => guarded.await,
        }
    }
}
