//! Content identity computation for ROM payloads

use crate::HashAlgorithm;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Size of the optional header some dumps carry in front of the ROM data
pub const HEADER_SIZE: usize = 16;

/// Signature of the iNES header ("NES" followed by MS-DOS EOF)
pub const HEADER_SIGNATURE: [u8; 4] = [0x4E, 0x45, 0x53, 0x1A];

/// Ordered hash variants derived from one payload.
///
/// The first entry is always the hash of the full payload. Lookups walk the
/// entries in order and stop at the first match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentitySet {
    hashes: Vec<String>,
}

impl IdentitySet {
    fn with_primary(hash: String) -> Self {
        Self { hashes: vec![hash] }
    }

    /// Hash of the full payload
    pub fn primary(&self) -> &str {
        &self.hashes[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.hashes.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.hashes.iter().any(|h| h == hash)
    }

    fn push(&mut self, hash: String) {
        self.hashes.push(hash);
    }
}

/// Computer for content hashes and identity sets
#[derive(Debug, Clone, Copy)]
pub struct IdentityComputer {
    algorithm: HashAlgorithm,
}

impl IdentityComputer {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Lowercase hex digest of the given bytes
    pub fn hash(&self, data: &[u8]) -> String {
        match self.algorithm {
            HashAlgorithm::Md5 => format!("{:x}", md5::compute(data)),
            HashAlgorithm::Sha256 => format!("{:x}", Sha256::digest(data)),
        }
    }

    /// Derive every identity variant of a payload.
    ///
    /// The headerless variant is emitted when the payload starts with the
    /// header signature, and independently whenever the payload is longer than
    /// the header, since some libraries hash headerless data even without the
    /// signature. The two paths can produce the same hash, which is kept once.
    pub fn compute_identities(&self, payload: &[u8]) -> IdentitySet {
        let mut identities = IdentitySet::with_primary(self.hash(payload));

        if payload.len() >= HEADER_SIZE && payload[..4] == HEADER_SIGNATURE {
            identities.push(self.hash(&payload[HEADER_SIZE..]));
        }

        if payload.len() > HEADER_SIZE {
            let headerless = self.hash(&payload[HEADER_SIZE..]);
            if !identities.contains(&headerless) {
                identities.push(headerless);
            }
        }

        identities
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}

impl Default for IdentityComputer {
    fn default() -> Self {
        Self::new(HashAlgorithm::Md5)
    }
}
