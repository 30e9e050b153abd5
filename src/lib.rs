// CLASSIFICATION: COMMUNITY
// Filename: lib.rs v0.5
// Author: Lukas Bower
// Date Modified: 2026-08-25

//! Cohesix Sentinel: a security event modeling engine.
//!
//! Sentinel reduces host security events to fixed-width coefficients and
//! maintains a per-domain trust model over them: the set of observed
//! points, an order-dependent running measurement, an order-independent
//! state aggregate, and trajectory/forensics logs. Domains model either
//! in-process or by exporting event descriptions to an external trust
//! orchestrator; the root domain can anchor its measurement in a TPM.
//!
//! The host side (VFS, TPM, user namespaces) enters through traits and
//! parameter structs, so the engine embeds in tests and services alike.

use std::sync::{Mutex, MutexGuard};

pub mod digest;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod event;
pub mod export;
pub mod inode;
pub mod magazine;
pub(crate) mod mapper;
pub mod model;
pub mod names;
pub mod task;
pub mod trust;
pub mod workqueue;

pub use digest::{Digest, DigestAlgorithm, MAX_DIGEST_SIZE};
pub use domain::{
    DomainConfig, DomainContext, IdentityNamespaces, ModelType, NsReference, UserNamespaces,
};
pub use engine::{Engine, EngineConfig, DEFAULT_CACHE_SIZE};
pub use errors::{Result, SentinelError};
pub use event::{
    EventParams, FileContent, FileParams, FsContent, MmapParams, SocketAcceptAddress,
    SocketAcceptParams, SocketAddress, SocketConnectParams, SocketCreateParams, TaskKillParams,
};
pub use export::External;
pub use inode::InodeShadow;
pub use model::{pseudonym_mapping, Model};
pub use names::{Action, EventKind};
pub use task::{Credentials, Task, TrustFlags};
pub use trust::{PcrBank, PcrBankAlg, TpmChip, DEFAULT_ROOT_MODEL_PCR};

/// Lock a mutex, riding through poisoning; the guarded structures stay
/// coherent because every writer updates them in place.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
