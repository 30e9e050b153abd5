// CLASSIFICATION: COMMUNITY
// Filename: inode.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-08-25

//! Per-inode content digest shadow.
//!
//! Each host inode the engine has seen carries a shadow holding the most
//! recent content digest per hash algorithm, keyed by inode version so a
//! rewrite invalidates the cache. The shadow mutex is held across the
//! whole content-digest computation; only blocking callers touch it.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::digest::Digest;

/// Collection status of an inode's content digest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InodeStatus {
    #[default]
    Absent,
    Collecting,
    Collected,
}

/// One cached `(algorithm, version, value)` triple.
#[derive(Clone, Debug)]
pub struct CachedDigest {
    pub name: &'static str,
    pub version: u64,
    pub value: Digest,
}

#[derive(Default)]
pub(crate) struct ShadowInner {
    pub status: InodeStatus,
    digests: Vec<CachedDigest>,
}

impl ShadowInner {
    /// Look up the cached digest for an algorithm name.
    pub fn find(&self, name: &str) -> Option<&CachedDigest> {
        self.digests.iter().find(|entry| entry.name == name)
    }

    /// Store or replace the cached digest for an algorithm.
    pub fn store(&mut self, name: &'static str, version: u64, value: Digest) {
        if let Some(entry) = self.digests.iter_mut().find(|entry| entry.name == name) {
            entry.version = version;
            entry.value = value;
        } else {
            self.digests.push(CachedDigest {
                name,
                version,
                value,
            });
        }
    }
}

/// Shadow state for one host inode.
#[derive(Default)]
pub struct InodeShadow {
    inner: Mutex<ShadowInner>,
}

impl InodeShadow {
    pub fn new() -> Arc<Self> {
        Arc::new(InodeShadow::default())
    }

    /// Current collection status.
    pub fn status(&self) -> InodeStatus {
        crate::lock(&self.inner).status
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ShadowInner> {
        crate::lock(&self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::DigestAlgorithm;

    #[test]
    fn store_and_find_by_algorithm() {
        let shadow = InodeShadow::new();
        let value = DigestAlgorithm::Sha256.digest(b"content");
        {
            let mut inner = shadow.lock();
            inner.store("sha256", 3, value);
            inner.status = InodeStatus::Collected;
        }
        let inner = shadow.lock();
        let hit = inner.find("sha256").unwrap();
        assert_eq!(hit.version, 3);
        assert_eq!(hit.value, value);
        assert!(inner.find("sha512").is_none());
    }

    #[test]
    fn store_replaces_stale_version() {
        let shadow = InodeShadow::new();
        let mut inner = shadow.lock();
        inner.store("sha256", 1, DigestAlgorithm::Sha256.digest(b"old"));
        inner.store("sha256", 2, DigestAlgorithm::Sha256.digest(b"new"));
        assert_eq!(inner.find("sha256").unwrap().version, 2);
    }
}
