// CLASSIFICATION: COMMUNITY
// Filename: engine.rs v0.7
// Author: Lukas Bower
// Date Modified: 2026-08-25

//! Engine instance.
//!
//! Owns the process-wide singletons (trust root, context-id counter,
//! system work queue, domain registry) so tests can construct isolated
//! engines without touching a real TPM or filesystem. Hooks enter
//! through [`Engine::dispatch`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use log::warn;
use rand::RngCore;

use crate::digest::{Digest, DigestAlgorithm};
use crate::domain::{
    DomainConfig, DomainContext, ModelType, NsReference, UserNamespaces,
};
use crate::errors::{Result, SentinelError};
use crate::event::{Event, EventParams};
use crate::export::External;
use crate::lock;
use crate::mapper;
use crate::model::Model;
use crate::names::{Action, EventKind, EVENT_KIND_COUNT};
use crate::task::{Task, TASK_KEY_SIZE};
use crate::trust::{TpmChip, TrustRoot, DEFAULT_ROOT_MODEL_PCR};
use crate::workqueue::WorkQueue;

/// Default magazine slot count for domains that do not override it.
pub const DEFAULT_CACHE_SIZE: usize = 32;

/// Boot-time engine configuration.
pub struct EngineConfig {
    /// Host TPM, absent on TPM-less hosts.
    pub tpm: Option<Arc<dyn TpmChip>>,
    /// Credential translation collaborator.
    pub namespaces: Arc<dyn UserNamespaces>,
    /// Root domain digest algorithm name.
    pub root_digest: String,
    /// PCR the root model extends.
    pub root_pcr: u32,
    /// Default magazine size.
    pub cache_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            tpm: None,
            namespaces: Arc::new(crate::domain::IdentityNamespaces),
            root_digest: "sha256".into(),
            root_pcr: DEFAULT_ROOT_MODEL_PCR,
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

/// One isolated modeling engine.
pub struct Engine {
    system_wq: Arc<WorkQueue>,
    trust: Arc<TrustRoot>,
    namespaces: Arc<dyn UserNamespaces>,
    next_id: AtomicU64,
    domains: Mutex<Vec<Weak<DomainContext>>>,
    cache_size: usize,
    root: Arc<DomainContext>,
}

impl Engine {
    /// Bring up an engine: trust root, system work queue and the root
    /// domain with the hardware aggregate already injected.
    pub fn new(config: EngineConfig) -> Result<Engine> {
        let algorithm = DigestAlgorithm::from_name(&config.root_digest)
            .ok_or(SentinelError::InvalidInput("unknown digest algorithm"))?;

        let system_wq = Arc::new(WorkQueue::new("sentinel-wq"));
        let trust = Arc::new(TrustRoot::new(config.tpm, config.root_pcr));

        let model = Model::new(algorithm, config.cache_size, Arc::clone(&system_wq));
        let aggregate = trust.aggregate(algorithm);
        model.add_aggregate(&aggregate, Some(trust.as_ref()))?;

        let (task_key, auth_id) = generate_auth_id(algorithm, &[]);
        let root = DomainContext::new(
            0,
            algorithm,
            NsReference::Initial,
            Arc::clone(&config.namespaces),
            Some(model),
            None,
            [Action::Log; EVENT_KIND_COUNT],
            task_key,
            auth_id,
            config.cache_size,
            Arc::clone(&system_wq),
        );

        let engine = Engine {
            system_wq,
            trust,
            namespaces: config.namespaces,
            next_id: AtomicU64::new(1),
            domains: Mutex::new(Vec::new()),
            cache_size: config.cache_size,
            root: Arc::clone(&root),
        };
        lock(&engine.domains).push(Arc::downgrade(&root));
        Ok(engine)
    }

    /// The root domain, context id 0.
    pub fn root(&self) -> &Arc<DomainContext> {
        &self.root
    }

    /// Hardware aggregate under the given algorithm.
    pub fn aggregate(&self, algorithm: DigestAlgorithm) -> Digest {
        self.trust.aggregate(algorithm)
    }

    /// Create a modeling domain from a control-surface configuration
    /// write. The action policy is inherited from `parent`.
    pub fn create_domain(
        &self,
        parent: &Arc<DomainContext>,
        json: &str,
    ) -> Result<Arc<DomainContext>> {
        let config: DomainConfig = serde_json::from_str(json)
            .map_err(|_| SentinelError::InvalidInput("malformed domain configuration"))?;

        let algorithm = DigestAlgorithm::from_name(config.digest.as_deref().unwrap_or("sha256"))
            .ok_or(SentinelError::InvalidInput("unknown digest algorithm"))?;

        let ns_view = match config.ns.as_deref() {
            None | Some("initial") => NsReference::Initial,
            Some("current") => NsReference::Current,
            Some(_) => return Err(SentinelError::InvalidInput("unknown namespace view")),
        };

        if config.key.len() != 2 * algorithm.digest_size() {
            return Err(SentinelError::InvalidInput("invalid key length"));
        }
        let user_key = hex::decode(&config.key)
            .map_err(|_| SentinelError::InvalidInput("invalid key encoding"))?;

        let (task_key, auth_id) = generate_auth_id(algorithm, &user_key);
        let mut domains = lock(&self.domains);
        if domains
            .iter()
            .filter_map(Weak::upgrade)
            .any(|d| *d.auth_id() == auth_id)
        {
            return Err(SentinelError::InvalidInput("duplicate authentication key"));
        }

        let cache_size = config.cache_size.unwrap_or(self.cache_size);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let (model, external) = match config.model_type {
            ModelType::Internal => (
                Some(Model::new(algorithm, cache_size, Arc::clone(&self.system_wq))),
                None,
            ),
            ModelType::External => (
                None,
                Some(External::new(cache_size, Arc::clone(&self.system_wq))),
            ),
        };

        let domain = DomainContext::new(
            id,
            algorithm,
            ns_view,
            Arc::clone(&self.namespaces),
            model,
            external,
            parent.actions(),
            task_key,
            auth_id,
            cache_size,
            Arc::clone(&self.system_wq),
        );

        // Announce the hardware state the domain was born under.
        let aggregate = self.trust.aggregate(algorithm);
        if let Some(model) = domain.model() {
            model.add_aggregate(&aggregate, None)?;
        }
        if let Some(external) = domain.external() {
            external.export_aggregate(aggregate)?;
        }

        domains.push(Arc::downgrade(&domain));
        Ok(domain)
    }

    /// Model one security event on behalf of a hook.
    ///
    /// An already-untrusted task bypasses modeling and consults the
    /// domain's action policy instead. `BprmSetCreds` installs the
    /// task's identity rather than inserting a point.
    pub fn dispatch(
        &self,
        domain: &Arc<DomainContext>,
        kind: EventKind,
        params: EventParams<'_>,
        locked: bool,
        task: &Task,
    ) -> Result<()> {
        if !task.is_trusted() {
            return self.enforce(domain, kind, task, locked);
        }

        let mut ep = Event::build(domain, kind, params, locked, task)?;

        if kind == EventKind::BprmSetCreds {
            return map_task(domain, &mut ep, task);
        }

        let task_id = ep.task_id;
        mapper::map_event(domain.algorithm(), &domain.zero_digest(), &mut ep, &task_id);
        let ep: Arc<Event> = Arc::from(ep);

        if let Some(external) = domain.external() {
            return external.export_event(&ep, task);
        }

        let model = domain
            .model()
            .ok_or(SentinelError::InvalidInput("domain has no model"))?;
        let trust = (domain.id() == 0).then_some(self.trust.as_ref());
        model.insert(&ep, task, trust)
    }

    fn enforce(
        &self,
        domain: &Arc<DomainContext>,
        kind: EventKind,
        task: &Task,
        locked: bool,
    ) -> Result<()> {
        let action = domain.action(kind);
        warn!(
            "untrusted task {} [{}], event {}, action {}",
            task.comm(),
            task.pid(),
            kind.name(),
            action.name()
        );
        if let Some(external) = domain.external() {
            external.export_action(kind, action, task.comm(), locked)?;
        }
        match action {
            Action::Log => Ok(()),
            Action::Deny => Err(SentinelError::PermissionDenied),
        }
    }

    /// Resolve an orchestrator verdict delivered on the control surface.
    pub fn resolve_verdict(
        &self,
        domain: &Arc<DomainContext>,
        key: &Digest,
        task: &Task,
        trusted: bool,
    ) -> Result<()> {
        if !domain.authenticate_key(key) {
            return Err(SentinelError::PermissionDenied);
        }
        task.resolve_verdict(trusted);
        Ok(())
    }

    /// Retire a domain context. The final drop runs on a worker since
    /// model teardown may block.
    pub fn release_domain(&self, domain: Arc<DomainContext>) {
        let id = domain.id();
        lock(&self.domains).retain(|weak| match weak.upgrade() {
            Some(live) => live.id() != id,
            None => false,
        });
        self.system_wq.enqueue(move || drop(domain));
    }

    /// Number of live domains, the root included.
    pub fn domain_count(&self) -> usize {
        lock(&self.domains)
            .iter()
            .filter(|weak| weak.upgrade().is_some())
            .count()
    }

    /// Drain the system and TPM work queues.
    pub fn flush(&self) {
        self.system_wq.flush();
        self.trust.flush();
    }
}

/// Install the task identity from an exec event: its coefficient is
/// computed against the null task id.
fn map_task(domain: &DomainContext, ep: &mut Event, task: &Task) -> Result<()> {
    let algorithm = domain.algorithm();
    let null_id = Digest::zero(algorithm.digest_size());
    ep.task_id = null_id;
    mapper::map_event(algorithm, &domain.zero_digest(), ep, &null_id);
    task.set_task_id(ep.mapping);
    Ok(())
}

fn generate_auth_id(
    algorithm: DigestAlgorithm,
    user_key: &[u8],
) -> ([u8; TASK_KEY_SIZE], Digest) {
    let mut task_key = [0u8; TASK_KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut task_key);
    let mut state = algorithm.new_state();
    state.update(&task_key);
    state.update(user_key);
    (task_key, state.finish())
}
