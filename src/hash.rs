//! Certificate identity: SHA-256 digests and shard routing

use std::fmt;

use sha2::{Digest, Sha256};

use crate::error::CorpusError;

/// Length of a certificate digest in bytes
pub const HASH_LEN: usize = 32;

/// SHA-256 digest of a DER-encoded certificate.
///
/// The digest is the certificate's identity everywhere in the corpus: blobs
/// are keyed by it, TOC rows reference it, and its first byte selects the
/// shard file the blob lives in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CertHash([u8; HASH_LEN]);

impl CertHash {
    /// Compute the digest of DER-encoded certificate bytes
    pub fn compute(der: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(der);
        Self(hasher.finalize().into())
    }

    pub fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Build from a slice; `None` unless it is exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; HASH_LEN] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Parse a lowercase or uppercase hex digest
    pub fn from_hex(s: &str) -> Result<Self, CorpusError> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
            .ok_or_else(|| CorpusError::InvalidHash(format!("expected 64 hex chars, got {}", s.len())))
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Index of the shard file holding this digest's blob (first byte)
    pub fn shard_index(&self) -> usize {
        self.0[0] as usize
    }
}

impl fmt::Debug for CertHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CertHash({}..)", &self.to_hex()[..16])
    }
}

impl fmt::Display for CertHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for CertHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
