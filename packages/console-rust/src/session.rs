//! Caller-side bulk session: the engine plus the auto-clear policy.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use fleet_core::{BulkOperationResult, Outcome, ParamBag, ValidationError};
use tokio_util::sync::CancellationToken;

use crate::auto_clear::AutoClearScheduler;
use crate::engine::BulkOperationEngine;

/// One caller's view of bulk operations.
///
/// After a successful run the `on_clear` callback fires once
/// `auto_clear_delay` has elapsed. Any failure keeps the selection, and any
/// new run cancels a clear that has not fired yet.
pub struct BulkSession {
    engine: Arc<BulkOperationEngine>,
    scheduler: AutoClearScheduler,
    on_clear: Arc<dyn Fn() + Send + Sync>,
    delay: Duration,
}

impl BulkSession {
    /// `on_clear` must not call back into this session.
    pub fn new<F>(engine: Arc<BulkOperationEngine>, on_clear: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::build(engine, on_clear, AutoClearScheduler::new())
    }

    /// Creates a session that is torn down together with `scope`.
    pub fn with_scope<F>(engine: Arc<BulkOperationEngine>, on_clear: F, scope: &CancellationToken) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::build(engine, on_clear, AutoClearScheduler::with_scope(scope))
    }

    fn build<F>(engine: Arc<BulkOperationEngine>, on_clear: F, scheduler: AutoClearScheduler) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let delay = engine.config().auto_clear_delay;
        Self {
            engine,
            scheduler,
            on_clear: Arc::new(on_clear),
            delay,
        }
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<BulkOperationEngine> {
        &self.engine
    }

    /// Executes an operation and schedules the clear on success.
    ///
    /// # Errors
    ///
    /// Propagates the engine's `ValidationError`.
    pub async fn run(
        &self,
        operation_id: &str,
        target_ids: &[i64],
        params: Option<ParamBag>,
    ) -> Result<BulkOperationResult, ValidationError> {
        self.scheduler.cancel();
        let result = self.engine.execute(operation_id, target_ids, params).await?;
        self.after(operation_id, &result);
        Ok(result)
    }

    /// Retries the failed items of `previous`, scheduling the clear if the
    /// retry succeeds.
    ///
    /// # Errors
    ///
    /// Propagates the engine's `ValidationError`.
    pub async fn retry(
        &self,
        operation_id: &str,
        previous: &BulkOperationResult,
        params: Option<ParamBag>,
    ) -> Result<BulkOperationResult, ValidationError> {
        self.scheduler.cancel();
        let result = self
            .engine
            .retry_failed(operation_id, previous, params)
            .await?;
        self.after(operation_id, &result);
        Ok(result)
    }

    fn after(&self, operation_id: &str, result: &BulkOperationResult) {
        if !Outcome::of(result).auto_clear_eligible() {
            return;
        }
        let on_clear = Arc::clone(&self.on_clear);
        self.scheduler.schedule(move || on_clear(), self.delay);
        tracing::debug!(
            operation = operation_id,
            delay_ms = u64::try_from(self.delay.as_millis()).unwrap_or(u64::MAX),
            "auto-clear scheduled"
        );
    }

    /// Cancels a pending clear, e.g. when the user changes the selection.
    pub fn cancel_auto_clear(&self) {
        self.scheduler.cancel();
    }

    #[must_use]
    pub fn auto_clear_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    /// Tears the session down; no clear fires afterwards.
    pub fn close(&self) {
        self.scheduler.close();
    }
}

impl fmt::Debug for BulkSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkSession")
            .field("engine", &self.engine)
            .field("scheduler", &self.scheduler)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use fleet_core::DispatchFailure;
    use serde_json::json;

    use super::*;
    use crate::engine::testing::{engine, RecordingHandler};

    fn session(handler: &Arc<RecordingHandler>) -> (BulkSession, Arc<AtomicUsize>) {
        let cleared = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&cleared);
        let session = BulkSession::new(Arc::new(engine(handler)), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (session, cleared)
    }

    async fn advance(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn success_clears_selection_after_delay() {
        let handler = RecordingHandler::new();
        let (session, cleared) = session(&handler);

        session.run("build", &[1, 2], None).await.unwrap();
        assert!(session.auto_clear_pending());
        advance(4).await;
        assert_eq!(cleared.load(Ordering::SeqCst), 0);
        advance(2).await;
        assert_eq!(cleared.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_keep_the_selection() {
        let handler = RecordingHandler::new();
        handler.respond(Err(DispatchFailure::Message("boom".to_string())));
        handler.respond(Ok(json!({
            "success_count": 1, "failed_count": 1,
            "errors": [{"item_id": 2, "message": "Locked"}]
        })));
        let (session, cleared) = session(&handler);

        session.run("build", &[1, 2], None).await.unwrap();
        assert!(!session.auto_clear_pending());
        session.run("build", &[1, 2], None).await.unwrap();
        assert!(!session.auto_clear_pending());
        advance(30).await;
        assert_eq!(cleared.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn new_run_cancels_pending_clear() {
        let handler = RecordingHandler::new();
        handler.respond(Ok(json!({"message": "ok"})));
        handler.respond(Err(DispatchFailure::Unknown));
        let (session, cleared) = session(&handler);

        session.run("build", &[1], None).await.unwrap();
        assert!(session.auto_clear_pending());
        session.run("build", &[1], None).await.unwrap();
        assert!(!session.auto_clear_pending());
        advance(30).await;
        assert_eq!(cleared.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_retry_schedules_clear() {
        let handler = RecordingHandler::new();
        handler.respond(Ok(json!({
            "success_count": 1, "failed_count": 1,
            "errors": [{"item_id": 2, "message": "Locked"}]
        })));
        let (session, cleared) = session(&handler);

        let first = session.run("build", &[1, 2], None).await.unwrap();
        session.retry("build", &first, None).await.unwrap();
        assert!(session.auto_clear_pending());
        advance(6).await;
        assert_eq!(cleared.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn close_and_explicit_cancel_prevent_clear() {
        let handler = RecordingHandler::new();
        let (session, cleared) = session(&handler);

        session.run("build", &[1], None).await.unwrap();
        session.cancel_auto_clear();
        assert!(!session.auto_clear_pending());

        session.run("build", &[1], None).await.unwrap();
        session.close();
        advance(30).await;
        assert_eq!(cleared.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn validation_errors_leave_pending_clear_cancelled() {
        let handler = RecordingHandler::new();
        let (session, cleared) = session(&handler);

        session.run("build", &[1], None).await.unwrap();
        assert!(session.run("nope", &[1], None).await.is_err());
        advance(30).await;
        assert_eq!(cleared.load(Ordering::SeqCst), 0);
    }
}
