//! Cooperative cancellation for export invocations.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::ExportError;

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    pub fn check(&self) -> Result<(), ExportError> {
        if self.is_cancelled() {
            Err(ExportError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Race `fut` against cancellation. Cancellation wins ties.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, ExportError> {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(ExportError::Cancelled),
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_completes_when_not_cancelled() {
        let token = CancelToken::new();
        assert_eq!(token.run(async { 7 }).await, Ok(7));
        assert!(token.check().is_ok());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pending_future() {
        let token = CancelToken::new();
        let remote = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            remote.cancel();
        });
        let result = token.run(std::future::pending::<()>()).await;
        assert_eq!(result, Err(ExportError::Cancelled));
        assert_eq!(token.check(), Err(ExportError::Cancelled));
    }

    #[tokio::test]
    async fn test_already_cancelled_wins_over_ready_future() {
        let token = CancelToken::new();
        token.cancel();
        assert_eq!(token.run(async { 1 }).await, Err(ExportError::Cancelled));
    }
}
