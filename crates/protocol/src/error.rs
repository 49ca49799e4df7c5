//! Error types for the wire codec.

/// Errors produced while encoding or decoding protocol frames.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transfer name too long: {0} bytes (max {max})", max = crate::MAX_NAME_LEN)]
    NameTooLong(usize),

    #[error("malformed name length: {0}")]
    MalformedNameLength(u32),

    #[error("transfer name is not valid UTF-8: {0}")]
    InvalidName(String),

    #[error("transfer name rejected: {0}")]
    InvalidTransferName(String),
}
