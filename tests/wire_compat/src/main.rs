fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use serde::Deserialize;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use filedrop_protocol::token::{ERROR, METADATA_OK, OK, SIZE_MISMATCH};
    use filedrop_protocol::wire::{encode_metadata, read_metadata};
    use filedrop_protocol::{AckToken, TransferMetadata};
    use filedrop_transfer::{Receiver, ReceiverConfig};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads and deserializes a fixture file.
    fn load_fixture<T: serde::de::DeserializeOwned>(name: &str) -> T {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    fn unhex(case: &str, s: &str) -> Vec<u8> {
        hex::decode(s).unwrap_or_else(|e| panic!("{case}: bad hex in fixture: {e}"))
    }

    #[derive(Deserialize)]
    struct HeaderFixture {
        case: String,
        name: String,
        size: u64,
        hex: String,
    }

    #[derive(Deserialize)]
    struct SessionFixture {
        case: String,
        header_hex: String,
        payload_len: usize,
        payload_byte: u8,
        receiver_hex: String,
    }

    #[test]
    fn header_encoding_matches_fixtures() {
        let fixtures: Vec<HeaderFixture> = load_fixture("headers.json");
        assert!(!fixtures.is_empty());

        for f in fixtures {
            let encoded = encode_metadata(&TransferMetadata::new(f.name.clone(), f.size)).unwrap();
            assert_eq!(
                hex::encode(&encoded),
                f.hex,
                "encoding mismatch for {}",
                f.case
            );
        }
    }

    #[tokio::test]
    async fn header_decoding_matches_fixtures() {
        let fixtures: Vec<HeaderFixture> = load_fixture("headers.json");

        for f in fixtures {
            let bytes = unhex(&f.case, &f.hex);
            let mut cursor = &bytes[..];
            let parsed = read_metadata(&mut cursor).await.unwrap();
            assert_eq!(parsed.name, f.name, "name mismatch for {}", f.case);
            assert_eq!(parsed.size, f.size, "size mismatch for {}", f.case);
            assert!(cursor.is_empty(), "{}: header not fully consumed", f.case);
        }
    }

    #[test]
    fn token_literals_match_fixtures() {
        let fixtures: std::collections::BTreeMap<String, String> = load_fixture("tokens.json");

        let expected: [(&str, &[u8], AckToken); 4] = [
            ("METADATA_OK", METADATA_OK, AckToken::MetadataOk),
            ("OK", OK, AckToken::Ok),
            ("ERROR", ERROR, AckToken::Error),
            ("SIZE_MISMATCH", SIZE_MISMATCH, AckToken::SizeMismatch),
        ];
        assert_eq!(fixtures.len(), expected.len());

        for (key, literal, token) in expected {
            let bytes = unhex(key, &fixtures[key]);
            assert_eq!(bytes, literal, "literal mismatch for {key}");
            assert_eq!(AckToken::from_bytes(&bytes), Some(token));
        }
    }

    /// Replays a recorded sender byte stream against a live receiver and
    /// compares everything the receiver writes back.
    #[tokio::test]
    async fn receiver_transcripts_match_fixtures() {
        let fixtures: Vec<SessionFixture> = load_fixture("sessions.json");

        for f in fixtures {
            let dir = tempfile::tempdir().unwrap();
            let receiver = Receiver::new(dir.path(), ReceiverConfig::default());
            let (mut client, mut server) = tokio::io::duplex(64 * 1024);

            let session = tokio::spawn(async move { receiver.receive(&mut server).await });

            client
                .write_all(&unhex(&f.case, &f.header_hex))
                .await
                .unwrap();
            client
                .write_all(&vec![f.payload_byte; f.payload_len])
                .await
                .unwrap();

            let mut reply = Vec::new();
            client.read_to_end(&mut reply).await.unwrap();
            assert_eq!(
                hex::encode(&reply),
                f.receiver_hex,
                "receiver reply mismatch for {}",
                f.case
            );

            let result = session.await.unwrap();
            if reply.ends_with(OK) {
                let file = result.unwrap_or_else(|e| panic!("{}: {e}", f.case));
                assert_eq!(file.bytes_transferred, f.payload_len as u64);
                let written = fs::read(&file.path).unwrap();
                assert!(written.iter().all(|b| *b == f.payload_byte));
                assert_eq!(written.len(), f.payload_len);
            } else {
                assert!(result.is_err(), "{}: expected a failed session", f.case);
            }
        }
    }
}
