// CLASSIFICATION: COMMUNITY
// Filename: digest.rs v0.4
// Author: Lukas Bower
// Date Modified: 2026-08-25

//! Stateless sequential-update digest service.
//!
//! Each modeling domain fixes one algorithm at creation; everything the
//! engine hashes goes through [`DigestState`] so the byte layout of an
//! update sequence is identical wherever it is replayed.

use core::cmp::Ordering;
use core::fmt;

use sha2::{Digest as _, Sha256, Sha384, Sha512};

use crate::errors::{Result, SentinelError};

/// Largest digest width any domain may configure.
pub const MAX_DIGEST_SIZE: usize = 64;

/// Fixed-width digest value with inline storage.
///
/// Ordering is lexicographic over the significant bytes, which is the
/// order used when folding points into the model state.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest {
    len: u8,
    bytes: [u8; MAX_DIGEST_SIZE],
}

impl Default for Digest {
    fn default() -> Self {
        Digest {
            len: 0,
            bytes: [0u8; MAX_DIGEST_SIZE],
        }
    }
}

impl Digest {
    /// Build a digest from raw bytes.
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        if raw.is_empty() || raw.len() > MAX_DIGEST_SIZE {
            return Err(SentinelError::CryptoFailure("digest width out of range"));
        }
        let mut bytes = [0u8; MAX_DIGEST_SIZE];
        bytes[..raw.len()].copy_from_slice(raw);
        Ok(Digest {
            len: raw.len() as u8,
            bytes,
        })
    }

    /// The all-zeroes constant of the given width. This is the domain
    /// zero digest substituted for elided or empty file content.
    pub fn zero(width: usize) -> Self {
        let width = width.min(MAX_DIGEST_SIZE);
        Digest {
            len: width as u8,
            bytes: [0u8; MAX_DIGEST_SIZE],
        }
    }

    /// Significant bytes of the digest.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Width in bytes.
    pub fn width(&self) -> usize {
        self.len as usize
    }

    /// True when every significant byte is zero.
    pub fn is_zero(&self) -> bool {
        self.as_bytes().iter().all(|&b| b == 0)
    }

    /// Lowercase hexadecimal rendering, exactly `2 * width` characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// Parse a lowercase or uppercase hex string of width `2 * D`.
    pub fn from_hex(text: &str) -> Result<Self> {
        let raw = hex::decode(text)
            .map_err(|_| SentinelError::InvalidInput("digest is not valid hexadecimal"))?;
        Digest::from_bytes(&raw)
            .map_err(|_| SentinelError::InvalidInput("digest width out of range"))
    }
}

impl PartialOrd for Digest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Digest {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Hash algorithms a domain may select by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    /// Resolve an algorithm from its configured name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sha256" => Some(DigestAlgorithm::Sha256),
            "sha384" => Some(DigestAlgorithm::Sha384),
            "sha512" => Some(DigestAlgorithm::Sha512),
            _ => None,
        }
    }

    /// Canonical name of the algorithm.
    pub fn name(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha384 => "sha384",
            DigestAlgorithm::Sha512 => "sha512",
        }
    }

    /// Output width `D` in bytes.
    pub fn digest_size(self) -> usize {
        match self {
            DigestAlgorithm::Sha256 => 32,
            DigestAlgorithm::Sha384 => 48,
            DigestAlgorithm::Sha512 => 64,
        }
    }

    /// The domain zero digest for this algorithm.
    pub fn zero_digest(self) -> Digest {
        Digest::zero(self.digest_size())
    }

    /// Start a streaming digest.
    pub fn new_state(self) -> DigestState {
        match self {
            DigestAlgorithm::Sha256 => DigestState::Sha256(Sha256::new()),
            DigestAlgorithm::Sha384 => DigestState::Sha384(Sha384::new()),
            DigestAlgorithm::Sha512 => DigestState::Sha512(Sha512::new()),
        }
    }

    /// One-shot digest of a byte string.
    pub fn digest(self, bytes: &[u8]) -> Digest {
        let mut state = self.new_state();
        state.update(bytes);
        state.finish()
    }
}

/// In-progress sequential-update digest.
pub enum DigestState {
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl DigestState {
    /// Append bytes to the running digest.
    pub fn update(&mut self, bytes: &[u8]) {
        match self {
            DigestState::Sha256(h) => h.update(bytes),
            DigestState::Sha384(h) => h.update(bytes),
            DigestState::Sha512(h) => h.update(bytes),
        }
    }

    /// Finalize and return the digest value.
    pub fn finish(self) -> Digest {
        let (len, mut bytes) = (self.width(), [0u8; MAX_DIGEST_SIZE]);
        match self {
            DigestState::Sha256(h) => bytes[..len].copy_from_slice(&h.finalize()),
            DigestState::Sha384(h) => bytes[..len].copy_from_slice(&h.finalize()),
            DigestState::Sha512(h) => bytes[..len].copy_from_slice(&h.finalize()),
        }
        Digest {
            len: len as u8,
            bytes,
        }
    }

    fn width(&self) -> usize {
        match self {
            DigestState::Sha256(_) => 32,
            DigestState::Sha384(_) => 48,
            DigestState::Sha512(_) => 64,
        }
    }
}
