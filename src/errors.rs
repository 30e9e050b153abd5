// CLASSIFICATION: COMMUNITY
// Filename: errors.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-08-25

//! Error taxonomy shared by every engine subsystem.
//!
//! All hook-visible failures reduce to one of these variants. Magazine
//! and cache misses are recovered locally by the callers; everything
//! else propagates to the security hook unchanged.

use thiserror::Error;

/// Errors surfaced by the modeling engine.
#[derive(Debug, Error)]
pub enum SentinelError {
    /// A record magazine was exhausted in atomic context or a heap
    /// allocation failed. Transient; never fatal to the model.
    #[error("record allocation exhausted")]
    OutOfMemory,

    /// A digest operation could not be completed.
    #[error("digest operation failed: {0}")]
    CryptoFailure(&'static str),

    /// Malformed caller input: bad key length, unrecognized event kind,
    /// or an address inconsistent with its family.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// File content could not be read while building a file cell.
    #[error("file content read failed: {0}")]
    IoFailure(#[from] std::io::Error),

    /// The export FIFO is empty.
    #[error("no export data available")]
    NoData,

    /// The external-mode verdict wait was aborted by a kill signal.
    #[error("verdict wait interrupted")]
    Interrupted,

    /// The domain's configured action for the event kind is DENY and the
    /// calling task is untrusted.
    #[error("event denied by domain policy")]
    PermissionDenied,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SentinelError>;
