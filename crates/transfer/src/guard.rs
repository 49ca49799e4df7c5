//! Deadline and cancellation wrapper for blocking I/O steps.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::TransferError;

/// Wraps every suspension point of a session (connect, each read/write,
/// each token wait) with an idle deadline and a cancellation signal.
#[derive(Debug, Clone)]
pub struct IoGuard {
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl IoGuard {
    pub fn new(timeout: Option<Duration>, cancel: CancellationToken) -> Self {
        Self { timeout, cancel }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Runs one I/O step.
    ///
    /// Cancellation wins over completion; a deadline breach yields
    /// [`TransferError::Timeout`].
    pub async fn run<F, T, E>(&self, fut: F) -> Result<T, TransferError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<TransferError>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TransferError::Cancelled),
            result = with_deadline(self.timeout, fut) => result,
        }
    }
}

async fn with_deadline<F, T, E>(timeout: Option<Duration>, fut: F) -> Result<T, TransferError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<TransferError>,
{
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(TransferError::Timeout),
        },
        None => fut.await.map_err(Into::into),
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn stalled_step_times_out() {
        let guard = IoGuard::new(Some(Duration::from_secs(5)), CancellationToken::new());
        let result = guard
            .run(std::future::pending::<Result<(), io::Error>>())
            .await;
        assert!(matches!(result, Err(TransferError::Timeout)));
    }

    #[tokio::test]
    async fn cancelled_step() {
        let cancel = CancellationToken::new();
        let guard = IoGuard::new(None, cancel.clone());
        cancel.cancel();

        let result = guard
            .run(std::future::pending::<Result<(), io::Error>>())
            .await;
        assert!(matches!(result, Err(TransferError::Cancelled)));
        assert!(guard.is_cancelled());
    }

    #[tokio::test]
    async fn errors_are_converted() {
        let guard = IoGuard::new(None, CancellationToken::new());
        let result = guard
            .run(async { Err::<(), _>(io::Error::from(io::ErrorKind::UnexpectedEof)) })
            .await;
        assert!(matches!(result, Err(TransferError::ConnectionLost)));
    }

    #[tokio::test]
    async fn completed_step_passes_through() {
        let guard = IoGuard::new(Some(Duration::from_secs(1)), CancellationToken::new());
        let value = guard.run(async { Ok::<_, io::Error>(42) }).await.unwrap();
        assert_eq!(value, 42);
    }
}
