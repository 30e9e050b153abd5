// CLASSIFICATION: COMMUNITY
// Filename: domain.rs v0.6
// Author: Lukas Bower
// Date Modified: 2026-08-25

//! Modeling domain contexts.
//!
//! A domain binds a digest algorithm, a credential namespace view, an
//! action policy and either an in-process model or an export handle for
//! an external orchestrator. The root domain has context id 0 and is
//! always internally modeled.

use std::sync::{Arc, Mutex};

use serde::Deserialize;

use crate::digest::{Digest, DigestAlgorithm};
use crate::event::Event;
use crate::export::External;
use crate::lock;
use crate::magazine::Magazine;
use crate::model::Model;
use crate::names::{Action, EventKind, EVENT_KIND_COUNT};
use crate::task::{Coe, Task, TASK_KEY_SIZE};
use crate::workqueue::WorkQueue;

/// Which user namespace credentials are translated through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NsReference {
    /// The host's initial namespace.
    #[default]
    Initial,
    /// The namespace current at domain creation.
    Current,
}

/// Host user-namespace collaborator.
///
/// The engine never owns id mappings; the host supplies the translation
/// for whichever view a domain was configured with.
pub trait UserNamespaces: Send + Sync {
    fn translate_uid(&self, view: NsReference, uid: u32) -> u32;
    fn translate_gid(&self, view: NsReference, gid: u32) -> u32;
}

/// Identity mapping, the view of a host without id remapping.
pub struct IdentityNamespaces;

impl UserNamespaces for IdentityNamespaces {
    fn translate_uid(&self, _view: NsReference, uid: u32) -> u32 {
        uid
    }

    fn translate_gid(&self, _view: NsReference, gid: u32) -> u32 {
        gid
    }
}

/// Where a domain's model runs.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Internal,
    External,
}

/// Domain configuration written to the control surface.
#[derive(Debug, Deserialize)]
pub struct DomainConfig {
    #[serde(rename = "type")]
    pub model_type: ModelType,
    /// Digest algorithm name; defaults to sha256.
    #[serde(default)]
    pub digest: Option<String>,
    /// Namespace view name, `initial` or `current`.
    #[serde(default)]
    pub ns: Option<String>,
    /// Orchestrator authentication key, `2·D` hex characters.
    pub key: String,
    /// Magazine slot count for atomic-context allocation.
    #[serde(default)]
    pub cache_size: Option<usize>,
}

/// One modeling domain.
pub struct DomainContext {
    id: u64,
    algorithm: DigestAlgorithm,
    zero: Digest,
    ns_view: NsReference,
    namespaces: Arc<dyn UserNamespaces>,
    event_magazine: Arc<Magazine<Event>>,
    model: Option<Arc<Model>>,
    external: Option<Arc<External>>,
    actions: Mutex<[Action; EVENT_KIND_COUNT]>,
    /// Random key material published on the control surface.
    task_key: [u8; TASK_KEY_SIZE],
    /// `H(task_key || user_key)`, proven by the orchestrator on attach.
    auth_id: Digest,
}

impl DomainContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: u64,
        algorithm: DigestAlgorithm,
        ns_view: NsReference,
        namespaces: Arc<dyn UserNamespaces>,
        model: Option<Arc<Model>>,
        external: Option<Arc<External>>,
        actions: [Action; EVENT_KIND_COUNT],
        task_key: [u8; TASK_KEY_SIZE],
        auth_id: Digest,
        cache_size: usize,
        refill_wq: Arc<WorkQueue>,
    ) -> Arc<Self> {
        Arc::new(DomainContext {
            id,
            algorithm,
            zero: algorithm.zero_digest(),
            ns_view,
            namespaces,
            event_magazine: Magazine::new(cache_size, "event", refill_wq),
            model,
            external,
            actions: Mutex::new(actions),
            task_key,
            auth_id,
        })
    }

    /// Context id; 0 is the root domain.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// The domain's zero digest, width `D`.
    pub fn zero_digest(&self) -> Digest {
        self.zero
    }

    /// The in-process model, absent for external domains.
    pub fn model(&self) -> Option<&Arc<Model>> {
        self.model.as_ref()
    }

    /// The export handle, present only for external domains.
    pub fn external(&self) -> Option<&Arc<External>> {
        self.external.as_ref()
    }

    pub fn is_external(&self) -> bool {
        self.external.is_some()
    }

    pub(crate) fn event_magazine(&self) -> &Arc<Magazine<Event>> {
        &self.event_magazine
    }

    /// Capture a task's context of execution through the domain's
    /// namespace view.
    pub(crate) fn capture_coe(&self, task: &Task) -> Coe {
        let creds = task.creds();
        Coe {
            uid: self.translate_uid(creds.uid),
            euid: self.translate_uid(creds.euid),
            suid: self.translate_uid(creds.suid),
            gid: self.translate_gid(creds.gid),
            egid: self.translate_gid(creds.egid),
            sgid: self.translate_gid(creds.sgid),
            fsuid: self.translate_uid(creds.fsuid),
            fsgid: self.translate_gid(creds.fsgid),
            capeff: creds.capeff,
        }
    }

    pub(crate) fn translate_uid(&self, uid: u32) -> u32 {
        self.namespaces.translate_uid(self.ns_view, uid)
    }

    pub(crate) fn translate_gid(&self, gid: u32) -> u32 {
        self.namespaces.translate_gid(self.ns_view, gid)
    }

    /// Action applied when an untrusted task triggers this event kind.
    pub fn action(&self, kind: EventKind) -> Action {
        lock(&self.actions)[kind.index()]
    }

    /// Override one event kind's action policy.
    pub fn set_action(&self, kind: EventKind, action: Action) {
        lock(&self.actions)[kind.index()] = action;
    }

    /// Snapshot of the full action table, used for child inheritance.
    pub(crate) fn actions(&self) -> [Action; EVENT_KIND_COUNT] {
        *lock(&self.actions)
    }

    /// Random key material the orchestrator folds with its user key to
    /// derive the authentication digest.
    pub fn task_key(&self) -> &[u8; TASK_KEY_SIZE] {
        &self.task_key
    }

    /// Validate an orchestrator key presented on the control surface.
    pub fn authenticate_key(&self, key: &Digest) -> bool {
        *key == self.auth_id
    }

    pub(crate) fn auth_id(&self) -> &Digest {
        &self.auth_id
    }

    /// Freeze the domain's model. External domains seal on the
    /// orchestrator side; sealing here is a no-op for them.
    pub fn seal(&self) {
        if let Some(model) = &self.model {
            model.seal();
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.model.as_ref().map(|m| m.is_sealed()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Credentials;

    struct ShiftNamespaces;

    impl UserNamespaces for ShiftNamespaces {
        fn translate_uid(&self, view: NsReference, uid: u32) -> u32 {
            match view {
                NsReference::Initial => uid,
                NsReference::Current => uid.wrapping_sub(100_000),
            }
        }

        fn translate_gid(&self, view: NsReference, gid: u32) -> u32 {
            self.translate_uid(view, gid)
        }
    }

    fn domain(ns_view: NsReference) -> Arc<DomainContext> {
        let wq = Arc::new(WorkQueue::new("domain-test-wq"));
        DomainContext::new(
            1,
            DigestAlgorithm::Sha256,
            ns_view,
            Arc::new(ShiftNamespaces),
            None,
            None,
            [Action::Log; EVENT_KIND_COUNT],
            [0u8; crate::task::TASK_KEY_SIZE],
            DigestAlgorithm::Sha256.digest(b"auth"),
            4,
            wq,
        )
    }

    #[test]
    fn coe_translates_through_configured_view() {
        let creds = Credentials {
            uid: 101_000,
            euid: 101_000,
            fsuid: 101_000,
            gid: 100_100,
            egid: 100_100,
            sgid: 100_100,
            fsgid: 100_100,
            suid: 101_000,
            capeff: 0x1ff,
        };
        let task = Task::new(10, "shifted", creds);

        let current = domain(NsReference::Current).capture_coe(&task);
        assert_eq!(current.uid, 1000);
        assert_eq!(current.gid, 100);
        assert_eq!(current.capeff, 0x1ff);

        let initial = domain(NsReference::Initial).capture_coe(&task);
        assert_eq!(initial.uid, 101_000);
    }

    #[test]
    fn action_policy_is_per_kind() {
        let domain = domain(NsReference::Initial);
        assert_eq!(domain.action(EventKind::FileOpen), Action::Log);
        domain.set_action(EventKind::FileOpen, Action::Deny);
        assert_eq!(domain.action(EventKind::FileOpen), Action::Deny);
        assert_eq!(domain.action(EventKind::SocketConnect), Action::Log);
    }

    #[test]
    fn key_authentication_is_exact() {
        let domain = domain(NsReference::Initial);
        assert!(domain.authenticate_key(&DigestAlgorithm::Sha256.digest(b"auth")));
        assert!(!domain.authenticate_key(&DigestAlgorithm::Sha256.digest(b"other")));
    }
}
