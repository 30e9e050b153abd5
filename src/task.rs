// CLASSIFICATION: COMMUNITY
// Filename: task.rs v0.4
// Author: Lukas Bower
// Date Modified: 2026-08-25

//! Per-task security state.
//!
//! A [`Task`] is the engine's view of one host task: a pid/comm
//! snapshot, the kernel-view credentials at hook time, the task identity
//! digest installed at exec, and the trust status side-band the hooks
//! report through.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use bitflags::bitflags;

use crate::digest::Digest;
use crate::errors::{Result, SentinelError};
use crate::lock;

/// Size of the random per-domain authentication key material.
pub const TASK_KEY_SIZE: usize = 64;

bitflags! {
    /// Trust status flags. An empty set means the task is trusted.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct TrustFlags: u8 {
        /// The task has injected an invalid or forensic coefficient, or
        /// an orchestrator returned a negative verdict.
        const UNTRUSTED = 1 << 0;
        /// The task is parked waiting for an orchestrator verdict.
        const PENDING = 1 << 1;
    }
}

/// Kernel-view credentials captured at hook time.
///
/// The ids are raw host values; domains translate them through the
/// configured user namespace when the COE is captured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Credentials {
    pub uid: u32,
    pub euid: u32,
    pub suid: u32,
    pub gid: u32,
    pub egid: u32,
    pub sgid: u32,
    pub fsuid: u32,
    pub fsgid: u32,
    /// Effective capability mask.
    pub capeff: u64,
}

/// Context of execution: the credential view captured for an event
/// after translation through the domain's configured user namespace.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Coe {
    pub uid: u32,
    pub euid: u32,
    pub suid: u32,
    pub gid: u32,
    pub egid: u32,
    pub sgid: u32,
    pub fsuid: u32,
    pub fsgid: u32,
    pub capeff: u64,
}

/// Security state for one host task.
pub struct Task {
    pid: u32,
    comm: String,
    creds: Credentials,
    task_id: Mutex<Option<Digest>>,
    trust: Mutex<TrustFlags>,
    trust_cv: Condvar,
    kill_pending: AtomicBool,
}

impl Task {
    /// Create a task snapshot. A task with no installed identity uses
    /// the engine-wide zero task id until its first exec.
    pub fn new(pid: u32, comm: &str, creds: Credentials) -> Arc<Self> {
        Arc::new(Task {
            pid,
            comm: comm.into(),
            creds,
            task_id: Mutex::new(None),
            trust: Mutex::new(TrustFlags::empty()),
            trust_cv: Condvar::new(),
            kill_pending: AtomicBool::new(false),
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn comm(&self) -> &str {
        &self.comm
    }

    pub fn creds(&self) -> Credentials {
        self.creds
    }

    /// The task identity digest, or the zero id of the given width when
    /// no exec has installed one.
    pub fn task_id(&self, width: usize) -> Digest {
        lock(&self.task_id).unwrap_or_else(|| Digest::zero(width))
    }

    /// Install the identity computed from the task's exec event.
    pub fn set_task_id(&self, id: Digest) {
        *lock(&self.task_id) = Some(id);
    }

    /// Current trust flags.
    pub fn trust_status(&self) -> TrustFlags {
        *lock(&self.trust)
    }

    /// True while no untrusted flag is set.
    pub fn is_trusted(&self) -> bool {
        !lock(&self.trust).contains(TrustFlags::UNTRUSTED)
    }

    /// Mark the task untrusted.
    pub fn mark_untrusted(&self) {
        let mut trust = lock(&self.trust);
        trust.insert(TrustFlags::UNTRUSTED);
        self.trust_cv.notify_all();
    }

    /// Deliver a kill signal: a parked verdict wait resumes untrusted.
    pub fn deliver_kill(&self) {
        self.kill_pending.store(true, Ordering::SeqCst);
        self.trust_cv.notify_all();
    }

    /// Resolve a pending orchestrator verdict and wake the task.
    pub fn resolve_verdict(&self, trusted: bool) {
        let mut trust = lock(&self.trust);
        trust.remove(TrustFlags::PENDING);
        if !trusted {
            trust.insert(TrustFlags::UNTRUSTED);
        }
        self.trust_cv.notify_all();
    }

    pub(crate) fn begin_pending(&self) {
        lock(&self.trust).insert(TrustFlags::PENDING);
    }

    /// Park until the pending flag clears. A delivered kill forces the
    /// task untrusted and returns [`SentinelError::Interrupted`].
    pub(crate) fn wait_verdict(&self) -> Result<()> {
        let mut trust = lock(&self.trust);
        while trust.contains(TrustFlags::PENDING) {
            if self.kill_pending.load(Ordering::SeqCst) {
                trust.insert(TrustFlags::UNTRUSTED);
                trust.remove(TrustFlags::PENDING);
                return Err(SentinelError::Interrupted);
            }
            trust = self
                .trust_cv
                .wait(trust)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn fresh_task_is_trusted_with_zero_id() {
        let task = Task::new(7, "init", Credentials::default());
        assert!(task.is_trusted());
        assert!(task.task_id(32).is_zero());
        assert_eq!(task.task_id(32).width(), 32);
    }

    #[test]
    fn verdict_wakes_parked_task() {
        let task = Task::new(8, "worker", Credentials::default());
        task.begin_pending();
        let waiter = Arc::clone(&task);
        let handle = thread::spawn(move || waiter.wait_verdict());
        thread::sleep(Duration::from_millis(20));
        task.resolve_verdict(false);
        assert!(handle.join().unwrap().is_ok());
        assert!(!task.is_trusted());
    }

    #[test]
    fn kill_interrupts_pending_wait() {
        let task = Task::new(9, "victim", Credentials::default());
        task.begin_pending();
        let waiter = Arc::clone(&task);
        let handle = thread::spawn(move || waiter.wait_verdict());
        thread::sleep(Duration::from_millis(20));
        task.deliver_kill();
        assert!(matches!(
            handle.join().unwrap(),
            Err(SentinelError::Interrupted)
        ));
        assert!(!task.is_trusted());
    }
}
