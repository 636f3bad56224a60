//! Cancellable delayed clearing of the caller's selection.
//!
//! At most one timer is pending per scheduler. Scheduling again cancels the
//! previous timer; cancelling the owning scope or dropping the scheduler
//! cancels whatever is pending. The callback runs under the scheduler's lock,
//! so once `cancel` or `close` returns no callback is running or will run.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct PendingAutoClear {
    token: CancellationToken,
    scheduled_at: Instant,
    generation: u64,
}

#[derive(Debug, Default)]
struct SchedulerState {
    generation: u64,
    pending: Option<PendingAutoClear>,
}

/// Single-slot delayed task runner.
#[derive(Debug)]
pub struct AutoClearScheduler {
    scope: CancellationToken,
    state: Arc<Mutex<SchedulerState>>,
}

impl AutoClearScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scope: CancellationToken::new(),
            state: Arc::new(Mutex::new(SchedulerState::default())),
        }
    }

    /// Creates a scheduler whose timers are cancelled together with `parent`.
    #[must_use]
    pub fn with_scope(parent: &CancellationToken) -> Self {
        Self {
            scope: parent.child_token(),
            state: Arc::new(Mutex::new(SchedulerState::default())),
        }
    }

    /// Runs `on_fire` after `delay` unless cancelled first. Replaces any
    /// pending timer.
    ///
    /// `on_fire` must not call back into this scheduler.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn schedule<F>(&self, on_fire: F, delay: Duration)
    where
        F: FnOnce() + Send + 'static,
    {
        let token = self.scope.child_token();
        let generation = {
            let mut state = self.state.lock();
            if let Some(previous) = state.pending.take() {
                previous.token.cancel();
            }
            state.generation += 1;
            state.pending = Some(PendingAutoClear {
                token: token.clone(),
                scheduled_at: Instant::now(),
                generation: state.generation,
            });
            state.generation
        };

        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    let mut state = state.lock();
                    let current = state
                        .pending
                        .as_ref()
                        .is_some_and(|p| p.generation == generation);
                    if current {
                        state.pending = None;
                    }
                    if current && !token.is_cancelled() {
                        tracing::debug!(generation, "auto-clear fired");
                        on_fire();
                    }
                }
            }
        });
    }

    /// Cancels the pending timer, if any.
    pub fn cancel(&self) {
        if let Some(pending) = self.state.lock().pending.take() {
            pending.token.cancel();
            tracing::debug!(generation = pending.generation, "auto-clear cancelled");
        }
    }

    /// Cancels the pending timer and every timer scheduled afterwards.
    pub fn close(&self) {
        self.cancel();
        self.scope.cancel();
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state
            .lock()
            .pending
            .as_ref()
            .is_some_and(|p| !p.token.is_cancelled())
    }

    /// When the pending timer was scheduled.
    #[must_use]
    pub fn pending_since(&self) -> Option<Instant> {
        self.state
            .lock()
            .pending
            .as_ref()
            .filter(|p| !p.token.is_cancelled())
            .map(|p| p.scheduled_at)
    }
}

impl Default for AutoClearScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AutoClearScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counter(fired: &Arc<AtomicUsize>) -> impl FnOnce() + Send + 'static {
        let fired = Arc::clone(fired);
        move || {
            fired.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn advance(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_delay() {
        let scheduler = AutoClearScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule(counter(&fired), Duration::from_secs(5));
        assert!(scheduler.is_pending());
        advance(4).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        advance(2).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn scheduling_twice_fires_exactly_once() {
        let scheduler = AutoClearScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule(counter(&fired), Duration::from_secs(5));
        advance(2).await;
        scheduler.schedule(counter(&fired), Duration::from_secs(5));
        advance(4).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        advance(2).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        advance(10).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_expiry_prevents_firing() {
        let scheduler = AutoClearScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule(counter(&fired), Duration::from_secs(5));
        advance(1).await;
        scheduler.cancel();
        assert!(!scheduler.is_pending());
        assert!(scheduler.pending_since().is_none());
        advance(10).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_the_scope_cancels_pending_timer() {
        let scope = CancellationToken::new();
        let scheduler = AutoClearScheduler::with_scope(&scope);
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule(counter(&fired), Duration::from_secs(5));
        scope.cancel();
        assert!(!scheduler.is_pending());
        advance(10).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_scheduler_cancels_pending_timer() {
        let fired = Arc::new(AtomicUsize::new(0));
        {
            let scheduler = AutoClearScheduler::new();
            scheduler.schedule(counter(&fired), Duration::from_secs(5));
        }
        advance(10).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_scheduler_never_fires() {
        let scheduler = AutoClearScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.close();
        scheduler.schedule(counter(&fired), Duration::from_secs(1));
        assert!(!scheduler.is_pending());
        advance(5).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn close_waits_for_a_running_callback() {
        use std::sync::atomic::AtomicBool;

        let scheduler = AutoClearScheduler::new();
        let started = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let (s, f) = (Arc::clone(&started), Arc::clone(&finished));

        scheduler.schedule(
            move || {
                s.store(true, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(100));
                f.store(true, Ordering::SeqCst);
            },
            Duration::from_millis(1),
        );
        while !started.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        scheduler.close();
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn pending_since_reports_schedule_time() {
        let scheduler = AutoClearScheduler::new();
        let start = Instant::now();
        advance(3).await;
        scheduler.schedule(|| {}, Duration::from_secs(5));
        assert_eq!(scheduler.pending_since(), Some(start + Duration::from_secs(3)));
    }
}
