//! Caller-supplied deadlines.
//!
//! Service operations only make their writes visible when the unit of work
//! commits, so abandoning a future at the deadline leaves no partial state.
//! Once a store has started committing the outcome is no longer ours to
//! abandon: [`Deadline::run`] then waits for it instead of reporting
//! `Timeout` for writes that may have landed.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::CoreError;

tokio::task_local! {
    static COMMITTING: Arc<AtomicBool>;
}

/// Record that the current operation has sent its commit.
///
/// Called by `UnitOfWork::commit` implementations. Outside [`Deadline::run`]
/// this does nothing.
pub fn commit_started() {
    let _ = COMMITTING.try_with(|flag| flag.store(true, Ordering::SeqCst));
}

/// Point in time by which an operation must finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn at(at: Instant) -> Self {
        Self { at }
    }

    /// Deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Run `fut`, failing with [`CoreError::Timeout`] once the deadline passes.
    ///
    /// A deadline that passes while `fut` is committing does not interrupt
    /// it; the commit's own result is returned.
    pub async fn run<T, F>(&self, operation: &str, fut: F) -> Result<T, CoreError>
    where
        F: Future<Output = Result<T, CoreError>>,
    {
        let committing = Arc::new(AtomicBool::new(false));
        let mut fut = std::pin::pin!(COMMITTING.scope(committing.clone(), fut));
        match tokio::time::timeout_at(self.at, &mut fut).await {
            Ok(result) => result,
            Err(_) if committing.load(Ordering::SeqCst) => {
                tracing::warn!(operation, "Deadline passed during commit, awaiting its outcome");
                fut.await
            }
            Err(_) => {
                tracing::warn!(operation, "Operation abandoned at deadline");
                Err(CoreError::Timeout(format!(
                    "{operation} did not finish before its deadline"
                )))
            }
        }
    }
}
