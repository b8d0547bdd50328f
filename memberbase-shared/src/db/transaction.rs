//! Transaction coordinator
//!
//! Two higher-order helpers wrap a unit of work in a store scope:
//!
//! - [`without_transaction`]: acquire a read-only session, run, release
//! - [`with_transaction`]: begin, run, then commit on `Ok` or roll back on
//!   `Err`/panic
//!
//! A unit of work is a closure taking the scoped connection and returning a
//! boxed future. Captured data should be owned (clone `Arc`s in) because the
//! future only borrows the connection.
//!
//! # Example
//!
//! ```
//! use memberbase_shared::db::context::ExecContext;
//! use memberbase_shared::db::filter::Predicate;
//! use memberbase_shared::db::memory::MemoryStore;
//! use memberbase_shared::db::store::MemberStore;
//! use memberbase_shared::db::transaction::without_transaction;
//! use memberbase_shared::error::StoreError;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), StoreError> {
//! let store = Arc::new(MemoryStore::new());
//! let ctx = ExecContext::background();
//!
//! let reader = Arc::clone(&store);
//! let total = without_transaction(&ctx, store.as_ref(), move |conn| {
//!     Box::pin(async move { reader.count(conn, &Predicate::MatchAll).await })
//! })
//! .await?;
//! assert_eq!(total, 0);
//! # Ok(())
//! # }
//! ```

use crate::db::context::ExecContext;
use crate::db::store::TransactionalStore;
use crate::error::StoreError;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, warn};

/// Runs `work` inside a read-only session
///
/// The session is released on every exit path. A release failure is logged
/// and does not replace the unit of work's result. If `work` panics, the
/// session is dropped while unwinding.
///
/// # Errors
///
/// Acquisition errors short-circuit without running `work`; otherwise the
/// unit of work's own result is returned.
pub async fn without_transaction<S, T, E, F>(
    ctx: &ExecContext,
    store: &S,
    work: F,
) -> Result<T, E>
where
    S: TransactionalStore,
    E: From<StoreError>,
    F: for<'c> FnOnce(&'c mut S::Conn) -> BoxFuture<'c, Result<T, E>>,
{
    let mut session = ctx.run("acquire", store.acquire()).await?;

    let result = ctx.run("read", work(&mut *session)).await;

    if let Err(err) = ctx.run("release", store.release(session)).await {
        warn!(trace_id = %ctx.trace_id(), error = %err, "Failed to release read session");
    }

    result
}

/// Runs `work` inside a transaction
///
/// Outcome resolution:
///
/// - `Ok`: commit; a commit failure becomes the result
/// - `Err`: roll back, then return the original error
/// - panic: roll back, then resume the panic
///
/// Exactly one of commit or rollback is issued. If the context is cancelled
/// before rollback runs, the transaction handle is dropped, which rolls it
/// back in every store implementation.
///
/// # Errors
///
/// Begin and commit failures, or the unit of work's error.
pub async fn with_transaction<S, T, E, F>(
    ctx: &ExecContext,
    store: &S,
    work: F,
) -> Result<T, E>
where
    S: TransactionalStore,
    E: From<StoreError>,
    F: for<'c> FnOnce(&'c mut S::Conn) -> BoxFuture<'c, Result<T, E>>,
{
    let mut tx = ctx.run("begin", store.begin()).await?;
    debug!(trace_id = %ctx.trace_id(), "Transaction started");

    let outcome = AssertUnwindSafe(ctx.run("unit of work", work(&mut *tx)))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(value)) => {
            ctx.run("commit", store.commit(tx)).await?;
            debug!(trace_id = %ctx.trace_id(), "Transaction committed");
            Ok(value)
        }
        Ok(Err(err)) => {
            rollback(ctx, store, tx).await;
            Err(err)
        }
        Err(panic) => {
            error!(
                trace_id = %ctx.trace_id(),
                panic = %panic_message(panic.as_ref()),
                "Unit of work panicked, rolling back"
            );
            rollback(ctx, store, tx).await;
            std::panic::resume_unwind(panic)
        }
    }
}

async fn rollback<S: TransactionalStore>(ctx: &ExecContext, store: &S, tx: S::Transaction) {
    match ctx.run("rollback", store.rollback(tx)).await {
        Ok(()) => debug!(trace_id = %ctx.trace_id(), "Transaction rolled back"),
        Err(err) => warn!(trace_id = %ctx.trace_id(), error = %err, "Rollback failed"),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::ops::{Deref, DerefMut};
    use std::sync::{Arc, Mutex};

    /// Store that records every primitive call and can be told to fail some
    #[derive(Default)]
    struct RecordingStore {
        events: Arc<Mutex<Vec<&'static str>>>,
        fail_acquire: bool,
        fail_release: bool,
        fail_commit: bool,
        fail_rollback: bool,
    }

    impl RecordingStore {
        fn events(&self) -> Vec<&'static str> {
            self.events.lock().unwrap().clone()
        }

        fn record(&self, event: &'static str) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[derive(Default)]
    struct Conn {
        writes: Vec<u32>,
    }

    struct Scope(Conn);

    impl Deref for Scope {
        type Target = Conn;
        fn deref(&self) -> &Conn {
            &self.0
        }
    }

    impl DerefMut for Scope {
        fn deref_mut(&mut self) -> &mut Conn {
            &mut self.0
        }
    }

    fn injected() -> StoreError {
        StoreError::Corrupt("injected".to_string())
    }

    #[async_trait]
    impl TransactionalStore for RecordingStore {
        type Conn = Conn;
        type Session = Scope;
        type Transaction = Scope;

        async fn acquire(&self) -> Result<Scope, StoreError> {
            self.record("acquire");
            if self.fail_acquire {
                return Err(injected());
            }
            Ok(Scope(Conn::default()))
        }

        async fn release(&self, _session: Scope) -> Result<(), StoreError> {
            self.record("release");
            if self.fail_release {
                return Err(injected());
            }
            Ok(())
        }

        async fn begin(&self) -> Result<Scope, StoreError> {
            self.record("begin");
            Ok(Scope(Conn::default()))
        }

        async fn commit(&self, _tx: Scope) -> Result<(), StoreError> {
            self.record("commit");
            if self.fail_commit {
                return Err(injected());
            }
            Ok(())
        }

        async fn rollback(&self, _tx: Scope) -> Result<(), StoreError> {
            self.record("rollback");
            if self.fail_rollback {
                return Err(injected());
            }
            Ok(())
        }
    }

    #[derive(Debug, thiserror::Error)]
    enum WorkError {
        #[error("work failed")]
        Work,
        #[error(transparent)]
        Store(#[from] StoreError),
    }

    #[tokio::test]
    async fn test_ok_commits() {
        let store = RecordingStore::default();
        let ctx = ExecContext::background();

        let result: Result<usize, WorkError> = with_transaction(&ctx, &store, |conn| {
            Box::pin(async move {
                conn.writes.push(1);
                Ok(conn.writes.len())
            })
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(store.events(), vec!["begin", "commit"]);
    }

    #[tokio::test]
    async fn test_err_rolls_back_and_returns_original_error() {
        let store = RecordingStore {
            fail_rollback: true,
            ..Default::default()
        };
        let ctx = ExecContext::background();

        let result: Result<(), WorkError> =
            with_transaction(&ctx, &store, |_conn| Box::pin(async { Err(WorkError::Work) })).await;

        assert!(matches!(result, Err(WorkError::Work)));
        assert_eq!(store.events(), vec!["begin", "rollback"]);
    }

    #[tokio::test]
    async fn test_commit_failure_is_final_error() {
        let store = RecordingStore {
            fail_commit: true,
            ..Default::default()
        };
        let ctx = ExecContext::background();

        let result: Result<(), WorkError> =
            with_transaction(&ctx, &store, |_conn| Box::pin(async { Ok(()) })).await;

        assert!(matches!(result, Err(WorkError::Store(StoreError::Corrupt(_)))));
        assert_eq!(store.events(), vec!["begin", "commit"]);
    }

    async fn explode() -> Result<(), WorkError> {
        panic!("unit of work exploded")
    }

    #[tokio::test]
    async fn test_panic_rolls_back_then_propagates() {
        let store = Arc::new(RecordingStore::default());
        let task_store = Arc::clone(&store);

        let handle = tokio::spawn(async move {
            let ctx = ExecContext::background();
            let _: Result<(), WorkError> = with_transaction(&ctx, task_store.as_ref(), |_conn| {
                Box::pin(explode())
            })
            .await;
        });

        let join_err = handle.await.expect_err("panic should propagate");
        assert!(join_err.is_panic());
        let message = panic_message(join_err.into_panic().as_ref());
        assert_eq!(message, "unit of work exploded");
        assert_eq!(store.events(), vec!["begin", "rollback"]);
    }

    #[tokio::test]
    async fn test_cancelled_before_begin_runs_nothing() {
        let store = RecordingStore::default();
        let ctx = ExecContext::background();
        ctx.cancellation_token().cancel();

        let result: Result<(), WorkError> =
            with_transaction(&ctx, &store, |_conn| Box::pin(async { Ok(()) })).await;

        assert!(matches!(
            result,
            Err(WorkError::Store(StoreError::Cancelled { op: "begin" }))
        ));
        assert!(store.events().is_empty());
    }

    #[tokio::test]
    async fn test_read_only_releases_after_success_and_error() {
        let store = RecordingStore::default();
        let ctx = ExecContext::background();

        let ok: Result<u8, WorkError> =
            without_transaction(&ctx, &store, |_conn| Box::pin(async { Ok(3) })).await;
        let err: Result<u8, WorkError> =
            without_transaction(&ctx, &store, |_conn| Box::pin(async { Err(WorkError::Work) }))
                .await;

        assert_eq!(ok.unwrap(), 3);
        assert!(matches!(err, Err(WorkError::Work)));
        assert_eq!(
            store.events(),
            vec!["acquire", "release", "acquire", "release"]
        );
    }

    #[tokio::test]
    async fn test_acquire_failure_skips_work() {
        let store = RecordingStore {
            fail_acquire: true,
            ..Default::default()
        };
        let ctx = ExecContext::background();
        let ran = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&ran);

        let result: Result<(), WorkError> = without_transaction(&ctx, &store, move |_conn| {
            Box::pin(async move {
                *flag.lock().unwrap() = true;
                Ok(())
            })
        })
        .await;

        assert!(result.is_err());
        assert!(!*ran.lock().unwrap());
        assert_eq!(store.events(), vec!["acquire"]);
    }

    #[tokio::test]
    async fn test_release_failure_does_not_override_result() {
        let store = RecordingStore {
            fail_release: true,
            ..Default::default()
        };
        let ctx = ExecContext::background();

        let result: Result<&str, WorkError> =
            without_transaction(&ctx, &store, |_conn| Box::pin(async { Ok("done") })).await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(store.events(), vec!["acquire", "release"]);
    }
}
