//! Metadata header codec.
//!
//! # Wire format
//!
//! ```text
//! [4 bytes BE: name_len]       0..=65535
//! [name_len bytes: name UTF-8] basename only
//! [8 bytes BE: file_size]
//! ```
//!
//! All reads are exact-count: the length prefix is read first and then
//! sizes the name read, so a header is never over-read into the payload.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::MAX_NAME_LEN;
use crate::error::WireError;

/// Name and size of the single file carried by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferMetadata {
    /// Transfer name (basename of the source file).
    pub name: String,
    /// Payload size in bytes.
    pub size: u64,
}

impl TransferMetadata {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }

    /// Number of bytes the encoded header occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        4 + self.name.len() + 8
    }
}

/// Encodes a metadata header into a fresh buffer.
pub fn encode_metadata(meta: &TransferMetadata) -> Result<Vec<u8>, WireError> {
    let name_bytes = meta.name.as_bytes();
    if name_bytes.len() > MAX_NAME_LEN {
        return Err(WireError::NameTooLong(name_bytes.len()));
    }

    let mut buf = Vec::with_capacity(meta.encoded_len());
    buf.extend_from_slice(&(name_bytes.len() as u32).to_be_bytes());
    buf.extend_from_slice(name_bytes);
    buf.extend_from_slice(&meta.size.to_be_bytes());
    Ok(buf)
}

/// Writes a metadata header as a single logical write and flushes it.
pub async fn write_metadata<W: AsyncWrite + Unpin>(
    writer: &mut W,
    meta: &TransferMetadata,
) -> Result<(), WireError> {
    let buf = encode_metadata(meta)?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads a metadata header from the stream.
///
/// A peer closing mid-header surfaces as an `UnexpectedEof` I/O error.
pub async fn read_metadata<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<TransferMetadata, WireError> {
    let name_len = reader.read_u32().await?;
    if name_len as usize > MAX_NAME_LEN {
        return Err(WireError::MalformedNameLength(name_len));
    }

    let mut name_buf = vec![0u8; name_len as usize];
    reader.read_exact(&mut name_buf).await?;
    let name = String::from_utf8(name_buf).map_err(|e| WireError::InvalidName(e.to_string()))?;

    let size = reader.read_u64().await?;

    Ok(TransferMetadata { name, size })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn metadata_roundtrip() {
        let meta = TransferMetadata::new("level1.bin", 1_048_576);

        let mut buf = Vec::new();
        write_metadata(&mut buf, &meta).await.unwrap();
        assert_eq!(buf.len(), meta.encoded_len());

        let mut cursor = &buf[..];
        let parsed = read_metadata(&mut cursor).await.unwrap();
        assert_eq!(parsed, meta);
        assert!(cursor.is_empty());
    }

    #[test]
    fn report_txt_header_layout() {
        let buf = encode_metadata(&TransferMetadata::new("report.txt", 2000)).unwrap();

        assert_eq!(&buf[..4], &10u32.to_be_bytes());
        assert_eq!(&buf[4..14], b"report.txt");
        assert_eq!(&buf[14..], &2000u64.to_be_bytes());
    }

    #[tokio::test]
    async fn empty_name_and_max_size() {
        let meta = TransferMetadata::new("", u64::MAX);

        let buf = encode_metadata(&meta).unwrap();
        assert_eq!(buf.len(), 12);

        let parsed = read_metadata(&mut &buf[..]).await.unwrap();
        assert_eq!(parsed, meta);
    }

    #[tokio::test]
    async fn longest_name_accepted() {
        let meta = TransferMetadata::new("n".repeat(MAX_NAME_LEN), 7);

        let buf = encode_metadata(&meta).unwrap();
        let parsed = read_metadata(&mut &buf[..]).await.unwrap();
        assert_eq!(parsed.name.len(), MAX_NAME_LEN);
        assert_eq!(parsed.size, 7);
    }

    #[test]
    fn name_too_long() {
        let meta = TransferMetadata::new("a".repeat(MAX_NAME_LEN + 1), 0);
        let result = encode_metadata(&meta);
        assert!(matches!(result, Err(WireError::NameTooLong(n)) if n == MAX_NAME_LEN + 1));
    }

    #[tokio::test]
    async fn oversized_length_prefix_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MAX_NAME_LEN as u32 + 1).to_be_bytes());
        buf.extend_from_slice(b"whatever");

        let result = read_metadata(&mut &buf[..]).await;
        assert!(matches!(result, Err(WireError::MalformedNameLength(_))));
    }

    #[tokio::test]
    async fn truncated_header_is_eof() {
        let buf = encode_metadata(&TransferMetadata::new("report.txt", 2000)).unwrap();

        for cut in [0, 3, 4, 9, 14, buf.len() - 1] {
            let result = read_metadata(&mut &buf[..cut]).await;
            match result {
                Err(WireError::Io(e)) => {
                    assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof, "cut at {cut}")
                }
                other => panic!("cut at {cut}: expected EOF, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn invalid_utf8_name() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&2u32.to_be_bytes());
        buf.extend_from_slice(&[0xFF, 0xFE]);
        buf.extend_from_slice(&1u64.to_be_bytes());

        let result = read_metadata(&mut &buf[..]).await;
        assert!(matches!(result, Err(WireError::InvalidName(_))));
    }

    #[tokio::test]
    async fn header_does_not_consume_payload() {
        let mut buf = encode_metadata(&TransferMetadata::new("a.bin", 3)).unwrap();
        buf.extend_from_slice(b"xyz");

        let mut cursor = &buf[..];
        read_metadata(&mut cursor).await.unwrap();
        assert_eq!(cursor, b"xyz");
    }
}
