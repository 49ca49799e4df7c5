//! Receiving side of a transfer.
//!
//! Parses the metadata header, acknowledges it, writes exactly the
//! declared number of payload bytes into the output directory and answers
//! with a completion token.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use filedrop_protocol::token::write_token;
use filedrop_protocol::wire::read_metadata;
use filedrop_protocol::{AckToken, DEFAULT_CHUNK_SIZE, TransferMetadata, validate_transfer_name};

use crate::error::TransferError;
use crate::guard::IoGuard;
use crate::session::{Phase, TransferSession};
use crate::{DEFAULT_IO_TIMEOUT, Progress, report_progress};

/// Receiver configuration.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Upper bound for a single payload read.
    pub chunk_size: usize,
    /// Idle deadline for each read/write (`None` = wait forever).
    pub io_timeout: Option<Duration>,
    /// Re-stat the written file and compare it to the declared size.
    pub verify_size: bool,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            io_timeout: Some(DEFAULT_IO_TIMEOUT),
            verify_size: true,
        }
    }
}

/// A file written by a successful session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    pub name: String,
    pub path: PathBuf,
    pub bytes_transferred: u64,
}

/// Drives the receiving state machine, one connection per call.
///
/// Cloning is cheap; clones share only the immutable output directory.
#[derive(Clone)]
pub struct Receiver {
    output_dir: Arc<Path>,
    config: ReceiverConfig,
    cancel: CancellationToken,
    progress: Option<mpsc::Sender<Progress>>,
}

impl Receiver {
    pub fn new(output_dir: impl Into<PathBuf>, config: ReceiverConfig) -> Self {
        Self {
            output_dir: Arc::from(output_dir.into()),
            config,
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    /// Attaches a progress channel, fed after every chunk.
    pub fn with_progress(mut self, tx: mpsc::Sender<Progress>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Uses `cancel` to abort sessions from outside.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Runs one session over `stream` and shuts its write side down.
    ///
    /// The stream is only borrowed and never read ahead: once the declared
    /// payload has been consumed, any further bytes stay in the stream.
    pub async fn receive<S>(&self, stream: &mut S) -> Result<ReceivedFile, TransferError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let guard = IoGuard::new(self.config.io_timeout, self.cancel.clone());
        let mut session = TransferSession::new();

        let result = self.run_session(stream, &guard, &mut session).await;
        if result.is_err() {
            session.fail();
        }

        let _ = guard.run(stream.shutdown()).await;
        result
    }

    async fn run_session<S>(
        &self,
        stream: &mut S,
        guard: &IoGuard,
        session: &mut TransferSession,
    ) -> Result<ReceivedFile, TransferError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let meta = match guard.run(read_metadata(stream)).await {
            Ok(meta) => meta,
            Err(TransferError::ConnectionLost) => return Err(TransferError::IncompleteHeader),
            Err(e @ TransferError::Protocol(_)) => {
                warn!("malformed metadata header: {e}");
                send_failure(stream, guard, AckToken::Error).await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        session.header_received(meta.size);

        if let Err(e) = validate_transfer_name(&meta.name) {
            warn!(name = %meta.name, "rejecting transfer: {e}");
            send_failure(stream, guard, AckToken::Error).await;
            return Err(e.into());
        }

        let path = self.output_dir.join(&meta.name);
        info!(name = %meta.name, size = meta.size, "receiving file");

        guard.run(write_token(stream, AckToken::MetadataOk)).await?;
        session.advance(Phase::Streaming);

        if let Err(e) = self.receive_payload(stream, guard, session, &meta, &path).await {
            send_failure(stream, guard, AckToken::Error).await;
            if matches!(e, TransferError::Io(_)) {
                // Closing with unread payload resets the connection and
                // loses the token.
                let _ = guard.run(stream.shutdown()).await;
                self.discard_payload(stream, guard, session.remaining()).await;
            }
            return Err(e);
        }
        session.advance(Phase::AwaitingCompletion);

        if self.config.verify_size {
            let actual = guard.run(tokio::fs::metadata(&path)).await?.len();
            if actual != meta.size {
                warn!(path = %path.display(), expected = meta.size, actual, "size mismatch, keeping file");
                send_failure(stream, guard, AckToken::SizeMismatch).await;
                return Err(TransferError::SizeMismatch {
                    expected: meta.size,
                    actual,
                });
            }
        }

        guard.run(write_token(stream, AckToken::Ok)).await?;
        session.advance(Phase::Complete);

        info!(
            path = %path.display(),
            bytes = session.bytes_transferred(),
            "file received"
        );

        Ok(ReceivedFile {
            name: meta.name,
            path,
            bytes_transferred: session.bytes_transferred(),
        })
    }

    /// Copies exactly `meta.size` bytes from the stream into `path`.
    ///
    /// Each read asks for at most the bytes still owed, so the loop never
    /// waits for data past the payload. The file handle is dropped (closed)
    /// on every return path.
    async fn receive_payload<S>(
        &self,
        stream: &mut S,
        guard: &IoGuard,
        session: &mut TransferSession,
        meta: &TransferMetadata,
        path: &Path,
    ) -> Result<(), TransferError>
    where
        S: AsyncRead + Unpin,
    {
        let mut file = guard.run(tokio::fs::File::create(path)).await?;
        let mut buf = vec![0u8; self.config.chunk_size.max(1)];

        while !session.is_complete() {
            let to_read = session.next_read_len(buf.len());
            let n = match guard.run(stream.read(&mut buf[..to_read])).await {
                Ok(n) => n,
                Err(TransferError::ConnectionLost) => 0,
                Err(e) => return Err(e),
            };
            if n == 0 {
                warn!(
                    name = %meta.name,
                    received = session.bytes_transferred(),
                    expected = meta.size,
                    "peer closed mid-payload"
                );
                return Err(TransferError::IncompleteTransfer {
                    received: session.bytes_transferred(),
                    expected: meta.size,
                });
            }

            guard.run(file.write_all(&buf[..n])).await?;
            session.record(n)?;
            report_progress(self.progress.as_ref(), &meta.name, session);
        }

        guard.run(file.flush()).await?;
        debug!(name = %meta.name, bytes = session.bytes_transferred(), "payload written");
        Ok(())
    }

    /// Reads and drops up to `remaining` payload bytes, stopping early on
    /// close, error, timeout or cancellation.
    async fn discard_payload<S>(&self, stream: &mut S, guard: &IoGuard, mut remaining: u64)
    where
        S: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; self.config.chunk_size.max(1)];
        while remaining > 0 {
            let to_read = remaining.min(buf.len() as u64) as usize;
            match guard.run(stream.read(&mut buf[..to_read])).await {
                Ok(0) | Err(_) => break,
                Ok(n) => remaining -= n as u64,
            }
        }
        debug!(unread = remaining, "discarded rejected payload");
    }
}

/// Sends a failure token if the peer is still listening.
async fn send_failure<S>(stream: &mut S, guard: &IoGuard, token: AckToken)
where
    S: AsyncWrite + Unpin,
{
    if let Err(e) = guard.run(write_token(stream, token)).await {
        debug!(%token, "could not deliver failure token: {e}");
    }
}
