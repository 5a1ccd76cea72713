//! Debounce gate for free-text input.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::trace;

/// Delays propagation of input until it has been quiet for `delay`.
///
/// Each input replaces the pending one; only the latest value is emitted.
/// The pending timer is aborted on supersession, [`cancel`](Self::cancel)
/// and drop, so nothing is emitted after teardown.
#[derive(Debug)]
pub struct DebounceGate {
    delay: Duration,
    tx: mpsc::UnboundedSender<String>,
    pending: Option<JoinHandle<()>>,
}

impl DebounceGate {
    /// Create a gate and the receiver its emissions arrive on.
    pub fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                delay,
                tx,
                pending: None,
            },
            rx,
        )
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `text` for emission after the quiet period. Must be called
    /// within a Tokio runtime.
    pub fn on_input(&mut self, text: impl Into<String>) {
        self.cancel();
        let text = text.into();
        let deadline = Instant::now() + self.delay;
        let tx = self.tx.clone();
        trace!(len = text.len(), "Debounce timer scheduled");
        self.pending = Some(tokio::spawn(async move {
            sleep_until(deadline).await;
            let _ = tx.send(text);
        }));
    }

    /// Emit `text` now, dropping any pending value.
    pub fn flush(&mut self, text: impl Into<String>) {
        self.cancel();
        let _ = self.tx.send(text.into());
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for DebounceGate {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::advance;

    use super::*;

    const QUIET: Duration = Duration::from_millis(400);

    #[tokio::test(start_paused = true)]
    async fn emits_latest_value_once_after_quiet_period() {
        let (mut gate, mut rx) = DebounceGate::new(QUIET);
        let start = Instant::now();

        gate.on_input("a");
        advance(Duration::from_millis(100)).await;
        gate.on_input("ab");
        advance(Duration::from_millis(150)).await;
        gate.on_input("abc");

        let value = rx.recv().await.expect("one emission");
        let elapsed = start.elapsed();
        assert_eq!(value, "abc");
        assert!(elapsed >= Duration::from_millis(650), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(652), "{elapsed:?}");

        advance(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
        assert!(!gate.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_suppresses_emission() {
        let (mut gate, mut rx) = DebounceGate::new(QUIET);
        gate.on_input("shoe");
        assert!(gate.is_pending());
        gate.cancel();

        advance(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_pending_timer() {
        let (mut gate, mut rx) = DebounceGate::new(QUIET);
        gate.on_input("shoe");
        drop(gate);

        advance(Duration::from_secs(1)).await;
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn flush_emits_immediately() {
        let (mut gate, mut rx) = DebounceGate::new(QUIET);
        gate.on_input("sh");
        gate.flush("shoe");

        assert_eq!(rx.try_recv().ok().as_deref(), Some("shoe"));
        advance(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }
}
