//! Sending side of a transfer.
//!
//! Connects to the receiver, sends the metadata header, waits for
//! `METADATA_OK`, streams the payload and waits for the completion token.

use std::future::Future;
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use filedrop_protocol::token::{METADATA_OK, MAX_TOKEN_LEN, read_token};
use filedrop_protocol::wire::write_metadata;
use filedrop_protocol::{AckToken, DEFAULT_CHUNK_SIZE, TransferMetadata, transfer_name};

use crate::error::TransferError;
use crate::guard::IoGuard;
use crate::session::{Phase, TransferSession};
use crate::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_IO_TIMEOUT, Progress, report_progress};

/// Sender configuration.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Bytes read from the source and written per step.
    pub chunk_size: usize,
    /// Deadline for establishing the connection (`None` = wait forever).
    pub connect_timeout: Option<Duration>,
    /// Idle deadline for each read/write (`None` = wait forever).
    pub io_timeout: Option<Duration>,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            io_timeout: Some(DEFAULT_IO_TIMEOUT),
        }
    }
}

/// Outcome of a successful send.
#[derive(Debug, Clone)]
pub struct SendReport {
    pub name: String,
    pub bytes_transferred: u64,
    pub elapsed: Duration,
}

/// Drives the sending state machine for one file.
pub struct Sender {
    config: SenderConfig,
    cancel: CancellationToken,
    progress: Option<mpsc::Sender<Progress>>,
}

impl Sender {
    pub fn new(config: SenderConfig) -> Self {
        Self {
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

    /// Uses `cancel` to abort the transfer from outside.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Sends the file at `path` to the receiver listening on `endpoint`.
    ///
    /// The file size is read once here and trusted for the whole session.
    pub async fn send(&self, path: &Path, endpoint: &str) -> Result<SendReport, TransferError> {
        let name = transfer_name(path)?;
        let file = tokio::fs::File::open(path).await?;
        let stat = file.metadata().await?;
        if !stat.is_file() {
            return Err(TransferError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", path.display()),
            )));
        }

        let meta = TransferMetadata::new(name, stat.len());
        info!(name = %meta.name, size = meta.size, %endpoint, "sending file");

        let connect = IoGuard::new(None, self.cancel.clone());
        let stream = connect
            .run(connect_within(
                endpoint,
                self.config.connect_timeout,
                TcpStream::connect(endpoint),
            ))
            .await?;
        debug!(%endpoint, "connected");

        self.send_over(stream, meta, file).await
    }

    /// Runs the protocol over an established stream, reading the payload
    /// from `source`.
    ///
    /// `source` must yield exactly `meta.size` bytes. If it runs dry early
    /// the session is aborted with [`TransferError::SourceTruncated`] and
    /// the connection is closed, so the receiver sees an incomplete
    /// transfer instead of waiting for bytes that never come.
    pub async fn send_over<S, R>(
        &self,
        stream: S,
        meta: TransferMetadata,
        mut source: R,
    ) -> Result<SendReport, TransferError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
        R: AsyncRead + Unpin,
    {
        let started = Instant::now();
        let guard = IoGuard::new(self.config.io_timeout, self.cancel.clone());
        let mut session = TransferSession::with_expected(meta.size);

        let (mut reader, mut writer) = tokio::io::split(stream);

        guard.run(write_metadata(&mut writer, &meta)).await?;

        let ack = guard.run(read_token(&mut reader, METADATA_OK.len())).await?;
        if AckToken::from_bytes(&ack) != Some(AckToken::MetadataOk) {
            session.fail();
            return Err(if ack.is_empty() {
                TransferError::Protocol("connection closed before metadata acknowledgment".into())
            } else {
                TransferError::Protocol(format!(
                    "expected METADATA_OK, got {:?}",
                    String::from_utf8_lossy(&ack)
                ))
            });
        }
        debug!(name = %meta.name, "metadata acknowledged");

        session.advance(Phase::Streaming);
        let mut buf = vec![0u8; self.config.chunk_size.max(1)];

        while !session.is_complete() {
            let to_read = session.next_read_len(buf.len());
            let n = guard.run(source.read(&mut buf[..to_read])).await?;
            if n == 0 {
                session.fail();
                warn!(
                    name = %meta.name,
                    sent = session.bytes_transferred(),
                    expected = meta.size,
                    "source ended early, aborting"
                );
                return Err(TransferError::SourceTruncated {
                    sent: session.bytes_transferred(),
                    expected: meta.size,
                });
            }

            guard.run(writer.write_all(&buf[..n])).await?;
            session.record(n)?;
            report_progress(self.progress.as_ref(), &meta.name, &session);
        }

        guard.run(writer.flush()).await?;
        session.advance(Phase::AwaitingCompletion);

        let token = guard.run(read_token(&mut reader, MAX_TOKEN_LEN)).await?;
        match AckToken::from_bytes(&token) {
            Some(AckToken::Ok) => {}
            _ if token.is_empty() => {
                session.fail();
                return Err(TransferError::ConnectionLost);
            }
            _ => {
                session.fail();
                return Err(TransferError::TransferRejected(
                    String::from_utf8_lossy(&token).into_owned(),
                ));
            }
        }

        session.advance(Phase::Complete);
        let elapsed = started.elapsed();
        info!(
            name = %meta.name,
            bytes = session.bytes_transferred(),
            elapsed_ms = elapsed.as_millis() as u64,
            "file sent"
        );

        Ok(SendReport {
            name: meta.name,
            bytes_transferred: session.bytes_transferred(),
            elapsed,
        })
    }
}

/// Awaits `connect`, turning failure or a missed deadline into
/// [`TransferError::Connect`].
async fn connect_within<F, S>(
    endpoint: &str,
    limit: Option<Duration>,
    connect: F,
) -> Result<S, TransferError>
where
    F: Future<Output = io::Result<S>>,
{
    let result = match limit {
        Some(limit) => tokio::time::timeout(limit, connect)
            .await
            .unwrap_or_else(|_| {
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no connection within {limit:?}"),
                ))
            }),
        None => connect.await,
    };

    result.map_err(|source| TransferError::Connect {
        endpoint: endpoint.to_string(),
        source,
    })
}
