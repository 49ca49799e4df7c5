//! Wire protocol for single-file transfers over a byte stream.
//!
//! A session carries exactly one file:
//!
//! ```text
//! SENDER -> RECEIVER:  [4 bytes BE: name_len]
//!                      [name_len bytes: transfer name, UTF-8]
//!                      [8 bytes BE: file_size]
//! RECEIVER -> SENDER:  "METADATA_OK"
//! SENDER -> RECEIVER:  [file_size bytes: raw payload, any chunking]
//! RECEIVER -> SENDER:  "OK" | "ERROR" | "SIZE_MISMATCH"
//! ```
//!
//! See [`wire`] for the header codec and [`token`] for the acknowledgment
//! vocabulary.

pub mod error;
pub mod name;
pub mod token;
pub mod wire;

pub use error::WireError;
pub use name::{transfer_name, validate_transfer_name};
pub use token::AckToken;
pub use wire::TransferMetadata;

/// Default payload chunk size (4 KiB).
///
/// Tuning only: the receiver accepts any chunking the sender picks.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Largest transfer name accepted on the wire, in bytes.
pub const MAX_NAME_LEN: usize = u16::MAX as usize;
