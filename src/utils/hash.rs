//! Hash calculation utilities.
//!
//! Every file is read exactly once; each chunk is fed to the MD5, SHA1 and
//! SHA256 accumulators in turn.

use crate::core::error::{Error, Result};
use crate::core::types::{DigestOutcome, DigestSet};
use md5::{Digest, Md5};
use sha1::Sha1;
use sha2::Sha256;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Default read chunk size (8 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Streaming multi-digest calculator.
#[derive(Debug, Clone, Copy)]
pub struct HashCalculator {
    chunk_size: usize,
}

impl Default for HashCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl HashCalculator {
    /// Create a calculator with the default chunk size.
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Use a different chunk size (clamped to at least one byte).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Compute MD5, SHA1 and SHA256 of a file in a single pass.
    pub fn hash_file(&self, path: &Path) -> Result<DigestSet> {
        let mut file = File::open(path).map_err(|e| Error::file_read(path, e))?;
        let mut md5_hasher = Md5::new();
        let mut sha1_hasher = Sha1::new();
        let mut sha256_hasher = Sha256::new();
        let mut buffer = vec![0u8; self.chunk_size];

        loop {
            let bytes_read = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::file_read(path, e)),
            };
            let chunk = &buffer[..bytes_read];
            md5_hasher.update(chunk);
            sha1_hasher.update(chunk);
            sha256_hasher.update(chunk);
        }

        Ok(DigestSet {
            md5: hex::encode(md5_hasher.finalize()),
            sha1: hex::encode(sha1_hasher.finalize()),
            sha256: hex::encode(sha256_hasher.finalize()),
        })
    }

    /// Hash a file, folding a read failure into an error marker.
    pub fn digest_outcome(&self, path: &Path) -> DigestOutcome {
        match self.hash_file(path) {
            Ok(set) => DigestOutcome::Computed(set),
            Err(Error::FileRead { source, .. }) => DigestOutcome::Failed {
                message: source.to_string(),
            },
            Err(e) => DigestOutcome::Failed {
                message: e.to_string(),
            },
        }
    }

    /// Compute all three digests of in-memory data.
    pub fn hash_bytes(data: &[u8]) -> DigestSet {
        DigestSet {
            md5: hex::encode(Md5::digest(data)),
            sha1: hex::encode(Sha1::digest(data)),
            sha256: hex::encode(Sha256::digest(data)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const EMPTY_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";
    const EMPTY_SHA1: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";
    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn test_hash_bytes_hello() {
        let set = HashCalculator::hash_bytes(b"hello");
        assert_eq!(set.md5, "5d41402abc4b2a76b9719d911017c592");
        assert_eq!(set.sha1, "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
        assert_eq!(
            set.sha256,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_empty_file() {
        let file = NamedTempFile::new().unwrap();
        let set = HashCalculator::new().hash_file(file.path()).unwrap();
        assert_eq!(set.md5, EMPTY_MD5);
        assert_eq!(set.sha1, EMPTY_SHA1);
        assert_eq!(set.sha256, EMPTY_SHA256);
    }

    #[test]
    fn test_hash_file_matches_bytes_and_is_deterministic() {
        let content: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&content).unwrap();

        let calc = HashCalculator::new();
        let first = calc.hash_file(file.path()).unwrap();
        let second = calc.hash_file(file.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, HashCalculator::hash_bytes(&content));
    }

    #[test]
    fn test_chunk_size_does_not_change_result() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"the quick brown fox jumps over the lazy dog").unwrap();

        let tiny = HashCalculator::new().with_chunk_size(1).hash_file(file.path()).unwrap();
        let large = HashCalculator::new().with_chunk_size(1 << 20).hash_file(file.path()).unwrap();
        assert_eq!(tiny, large);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.bin");
        let err = HashCalculator::new().hash_file(&missing).unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));

        let outcome = HashCalculator::new().digest_outcome(&missing);
        assert!(outcome.is_error());
    }
}
