//! Content-hash helpers.
//!
//! Solobase content-addresses blobs by SHA-256, unlike the multi-algorithm
//! checksum negotiation of S3 (MD5/CRC32/CRC32C/SHA1/SHA256); one algorithm
//! keeps the blob backend's key space simple.

use sha2::{Digest, Sha256};

/// Compute the lowercase hex SHA-256 digest of `data`.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Incremental SHA-256 hasher used while streaming upload bytes to disk, so
/// the whole body never needs to be buffered twice.
#[derive(Default)]
pub struct StreamingHasher {
    inner: Sha256,
}

impl StreamingHasher {
    /// Start a fresh hasher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed another chunk of data into the running digest.
    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
    }

    /// Finalize and return the lowercase hex digest.
    #[must_use]
    pub fn finish(self) -> String {
        hex::encode(self.inner.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_match_oneshot_and_streaming_digest() {
        let data = b"the quick brown fox";
        let oneshot = sha256_hex(data);

        let mut streaming = StreamingHasher::new();
        streaming.update(&data[..10]);
        streaming.update(&data[10..]);
        assert_eq!(streaming.finish(), oneshot);
    }

    #[test]
    fn test_should_hash_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85"
        );
    }
}
