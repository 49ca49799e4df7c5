//! Acknowledgment tokens exchanged at the two protocol checkpoints.
//!
//! Tokens are bare ASCII literals with no length prefix. The metadata
//! token has a fixed length, and the receiver closes the connection right
//! after the completion token, so orderly close delimits it.

use std::fmt;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::WireError;

/// Metadata accepted; payload may follow.
pub const METADATA_OK: &[u8] = b"METADATA_OK";

/// Payload received and written.
pub const OK: &[u8] = b"OK";

/// Session failed on the receiving side.
pub const ERROR: &[u8] = b"ERROR";

/// Payload received but the written file does not match the declared size.
pub const SIZE_MISMATCH: &[u8] = b"SIZE_MISMATCH";

/// Length of the longest token in the vocabulary.
pub const MAX_TOKEN_LEN: usize = SIZE_MISMATCH.len();

/// A protocol-level acknowledgment signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckToken {
    MetadataOk,
    Ok,
    Error,
    SizeMismatch,
}

impl AckToken {
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            AckToken::MetadataOk => METADATA_OK,
            AckToken::Ok => OK,
            AckToken::Error => ERROR,
            AckToken::SizeMismatch => SIZE_MISMATCH,
        }
    }

    /// Matches a received literal by exact value.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            METADATA_OK => Some(AckToken::MetadataOk),
            OK => Some(AckToken::Ok),
            ERROR => Some(AckToken::Error),
            SIZE_MISMATCH => Some(AckToken::SizeMismatch),
            _ => None,
        }
    }
}

impl fmt::Display for AckToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.as_bytes()))
    }
}

/// Writes a token and flushes it.
pub async fn write_token<W: AsyncWrite + Unpin>(
    writer: &mut W,
    token: AckToken,
) -> Result<(), WireError> {
    writer.write_all(token.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads a raw token of at most `max_len` bytes.
///
/// Stops at `max_len` bytes or at orderly close, whichever comes first.
/// An empty result means the peer closed without sending anything.
pub async fn read_token<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_len: usize,
) -> Result<Vec<u8>, WireError> {
    let mut buf = Vec::with_capacity(max_len);
    reader.take(max_len as u64).read_to_end(&mut buf).await?;
    Ok(buf)
}
