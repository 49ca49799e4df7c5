//! Error types for transfer sessions.

use std::io;

use filedrop_protocol::WireError;

/// Errors produced by a sender or receiver session.
///
/// Every error is scoped to the session that produced it.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("could not connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("peer closed before the metadata header was complete")]
    IncompleteHeader,

    #[error("peer closed after {received} of {expected} payload bytes")]
    IncompleteTransfer { received: u64, expected: u64 },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("size mismatch: declared {expected} bytes, wrote {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("source file truncated: read {sent} of {expected} bytes")]
    SourceTruncated { sent: u64, expected: u64 },

    #[error("receiver rejected the transfer: {0}")]
    TransferRejected(String),

    #[error("connection lost")]
    ConnectionLost,

    #[error("timed out")]
    Timeout,

    #[error("invalid transfer name: {0}")]
    InvalidName(String),

    #[error("cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for TransferError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => TransferError::ConnectionLost,
            io::ErrorKind::TimedOut => TransferError::Timeout,
            _ => TransferError::Io(e),
        }
    }
}

impl From<WireError> for TransferError {
    fn from(e: WireError) -> Self {
        match e {
            WireError::Io(e) => e.into(),
            WireError::InvalidTransferName(msg) => TransferError::InvalidName(msg),
            other => TransferError::Protocol(other.to_string()),
        }
    }
}
