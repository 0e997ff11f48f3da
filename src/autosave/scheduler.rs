//! AutoSaveScheduler: periodic persistence with bounded retry
//!
//! One background task per open file. Every `interval` it checks for unsaved
//! changes and, if there are any, saves. A failing save is retried after a
//! flat `retry_delay`, up to `max_retries` attempts in total. When a cycle
//! exhausts its attempts the task stops for good and a single `Failed` event
//! is published; the document keeps its unsaved state.

use crate::config::AutoSaveConfig;
use crate::error::{EditorError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;

/// Something the scheduler can persist
#[async_trait]
pub trait SaveTarget: Send + Sync + 'static {
    fn has_unsaved_changes(&self) -> bool;

    /// One save attempt; the scheduler owns retrying
    async fn save(&self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum AutoSaveEvent {
    Saved { attempts: u32 },
    #[serde(rename_all = "camelCase")]
    RetryScheduled {
        attempt: u32,
        delay_ms: u64,
        error: String,
    },
    Failed { attempts: u32, error: String },
}

#[derive(Debug, Default)]
struct Shared {
    last_outcome: Option<AutoSaveEvent>,
    failed: bool,
}

pub struct AutoSaveScheduler {
    config: AutoSaveConfig,
    shared: Arc<Mutex<Shared>>,
    reset: Arc<Notify>,
    events: broadcast::Sender<AutoSaveEvent>,
    task: Option<JoinHandle<()>>,
}

impl AutoSaveScheduler {
    pub fn new(config: AutoSaveConfig) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            config,
            shared: Arc::new(Mutex::new(Shared::default())),
            reset: Arc::new(Notify::new()),
            events,
            task: None,
        }
    }

    pub fn config(&self) -> &AutoSaveConfig {
        &self.config
    }

    /// Spawn the timer task; no-op when disabled or already running
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, target: Arc<dyn SaveTarget>) {
        if !self.config.enabled || self.is_running() {
            return;
        }
        self.shared.lock().failed = false;

        let config = self.config.clone();
        let shared = Arc::clone(&self.shared);
        let reset = Arc::clone(&self.reset);
        let events = self.events.clone();
        tracing::debug!(interval_ms = config.interval, "autosave started");
        self.task = Some(tokio::spawn(run(target, config, shared, reset, events)));
    }

    /// Abort the timer task, including any save in flight
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("autosave stopped");
        }
    }

    /// Restart the interval from now (after a manual save)
    pub fn reset_timer(&self) {
        self.reset.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Whether the last cycle exhausted its attempts
    pub fn has_failed(&self) -> bool {
        self.shared.lock().failed
    }

    pub fn last_outcome(&self) -> Option<AutoSaveEvent> {
        self.shared.lock().last_outcome.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AutoSaveEvent> {
        self.events.subscribe()
    }
}

impl Drop for AutoSaveScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(
    target: Arc<dyn SaveTarget>,
    config: AutoSaveConfig,
    shared: Arc<Mutex<Shared>>,
    reset: Arc<Notify>,
    events: broadcast::Sender<AutoSaveEvent>,
) {
    let interval = config.interval().max(Duration::from_millis(1));
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = reset.notified() => continue,
        }

        if !target.has_unsaved_changes() {
            continue;
        }

        let outcome = match save_with_retry(target.as_ref(), &config, &events).await {
            Ok(attempts) => {
                tracing::debug!(attempts, "autosave succeeded");
                AutoSaveEvent::Saved { attempts }
            }
            Err(EditorError::AutoSaveExhausted {
                attempts,
                last_error,
            }) => {
                tracing::warn!(attempts, error = %last_error, "autosave gave up");
                AutoSaveEvent::Failed {
                    attempts,
                    error: last_error,
                }
            }
            Err(e) => AutoSaveEvent::Failed {
                attempts: 0,
                error: e.to_string(),
            },
        };

        let failed = matches!(outcome, AutoSaveEvent::Failed { .. });
        {
            let mut shared = shared.lock();
            shared.last_outcome = Some(outcome.clone());
            shared.failed = failed;
        }
        // No subscribers is fine
        let _ = events.send(outcome);

        if failed {
            break;
        }
    }
}

/// Attempt a save up to `max_retries` times; returns the attempts used
async fn save_with_retry(
    target: &dyn SaveTarget,
    config: &AutoSaveConfig,
    events: &broadcast::Sender<AutoSaveEvent>,
) -> Result<u32> {
    let max_attempts = config.max_retries.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let error = match tokio::time::timeout(config.request_timeout(), target.save()).await {
            Ok(Ok(())) => return Ok(attempt),
            Ok(Err(e)) => e,
            Err(_) => EditorError::Timeout(config.request_timeout),
        };

        if attempt >= max_attempts || !error.is_retryable() {
            return Err(EditorError::AutoSaveExhausted {
                attempts: attempt,
                last_error: error.to_string(),
            });
        }

        tracing::debug!(attempt, error = %error, "autosave attempt failed, retrying");
        let _ = events.send(AutoSaveEvent::RetryScheduled {
            attempt,
            delay_ms: config.retry_delay,
            error: error.to_string(),
        });
        tokio::time::sleep(config.retry_delay()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct MockTarget {
        dirty: AtomicBool,
        attempts: AtomicU32,
        failures: u32,
        hang: bool,
    }

    impl MockTarget {
        fn new(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                dirty: AtomicBool::new(true),
                attempts: AtomicU32::new(0),
                failures,
                hang: false,
            })
        }

        fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SaveTarget for MockTarget {
        fn has_unsaved_changes(&self) -> bool {
            self.dirty.load(Ordering::SeqCst)
        }

        async fn save(&self) -> Result<()> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if self.hang {
                std::future::pending::<()>().await;
            }
            if n <= self.failures {
                return Err(EditorError::Persistence("503 Service Unavailable".into()));
            }
            self.dirty.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    fn config() -> AutoSaveConfig {
        AutoSaveConfig {
            enabled: true,
            interval: 1_000,
            max_retries: 3,
            retry_delay: 100,
            request_timeout: 500,
        }
    }

    async fn next_terminal(rx: &mut broadcast::Receiver<AutoSaveEvent>) -> AutoSaveEvent {
        loop {
            match rx.recv().await.unwrap() {
                AutoSaveEvent::RetryScheduled { .. } => continue,
                other => return other,
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_retry_then_stop() {
        let target = MockTarget::new(u32::MAX);
        let mut scheduler = AutoSaveScheduler::new(config());
        let mut rx = scheduler.subscribe();
        scheduler.start(target.clone());

        let event = next_terminal(&mut rx).await;
        assert!(matches!(event, AutoSaveEvent::Failed { attempts: 3, .. }));
        assert_eq!(target.attempts(), 3);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(target.attempts(), 3);
        assert!(!scheduler.is_running());
        assert!(scheduler.has_failed());
        assert!(target.has_unsaved_changes());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_retry_keeps_running() {
        let target = MockTarget::new(1);
        let mut scheduler = AutoSaveScheduler::new(config());
        let mut rx = scheduler.subscribe();
        scheduler.start(target.clone());

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, AutoSaveEvent::RetryScheduled { attempt: 1, .. }));
        assert_eq!(rx.recv().await.unwrap(), AutoSaveEvent::Saved { attempts: 2 });

        assert!(scheduler.is_running());
        assert!(!target.has_unsaved_changes());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_document_not_saved() {
        let target = MockTarget::new(0);
        target.dirty.store(false, Ordering::SeqCst);
        let mut scheduler = AutoSaveScheduler::new(config());
        scheduler.start(target.clone());

        tokio::time::sleep(Duration::from_millis(5_500)).await;
        assert_eq!(target.attempts(), 0);
        assert!(scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_postpones_tick() {
        let target = MockTarget::new(0);
        let mut scheduler = AutoSaveScheduler::new(config());
        scheduler.start(target.clone());

        tokio::time::sleep(Duration::from_millis(800)).await;
        scheduler.reset_timer();
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert_eq!(target.attempts(), 0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(target.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_attempt() {
        let target = Arc::new(MockTarget {
            dirty: AtomicBool::new(true),
            attempts: AtomicU32::new(0),
            failures: 0,
            hang: true,
        });
        let mut scheduler = AutoSaveScheduler::new(config());
        let mut rx = scheduler.subscribe();
        scheduler.start(target.clone());

        match next_terminal(&mut rx).await {
            AutoSaveEvent::Failed { attempts, error } => {
                assert_eq!(attempts, 3);
                assert!(error.contains("timed out"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_and_stop() {
        let target = MockTarget::new(0);
        let mut disabled = AutoSaveScheduler::new(AutoSaveConfig {
            enabled: false,
            ..config()
        });
        disabled.start(target.clone());
        assert!(!disabled.is_running());

        let mut scheduler = AutoSaveScheduler::new(config());
        scheduler.start(target.clone());
        assert!(scheduler.is_running());
        scheduler.stop();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(target.attempts(), 0);
    }
}
