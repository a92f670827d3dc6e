//! Process-wide shutdown coordination.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Lightweight handle for signaling and awaiting shutdown.
#[derive(Clone, Default)]
pub struct ShutdownHandle {
    shutdown: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn signal(&self) {
        if !self.shutdown.swap(true, Ordering::SeqCst) {
            tracing::info!("shutdown initiated");
            self.notify.notify_waiters();
        }
    }

    pub async fn wait(&self) {
        // Subscribe to the Notify before checking the flag: signal() between
        // the check and the await would otherwise have no subscriber and the
        // notification would be lost.
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_shutting_down() {
            return;
        }
        notified.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_returns_after_signal() {
        let handle = ShutdownHandle::new();
        let waiter = handle.clone();
        let task = tokio::spawn(async move { waiter.wait().await });
        handle.signal();
        task.await.unwrap();
        assert!(handle.is_shutting_down());
    }

    #[tokio::test]
    async fn wait_after_signal_returns_immediately() {
        let handle = ShutdownHandle::new();
        handle.signal();
        handle.wait().await;
    }

    #[tokio::test]
    async fn signal_is_idempotent() {
        let handle = ShutdownHandle::new();
        handle.signal();
        handle.signal();
        assert!(handle.is_shutting_down());
    }
}
