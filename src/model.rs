// CLASSIFICATION: COMMUNITY
// Filename: model.rs v0.8
// Author: Lukas Bower
// Date Modified: 2026-08-25

//! In-kernel trust model for internally modeled domains.
//!
//! A model holds the set of unique coefficients observed in its domain,
//! the order-dependent running measurement, the order-independent state
//! aggregate, and the trajectory/forensics logs. Insertion order is
//! whatever the points lock serializes; the state fold is invariant to
//! it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::digest::{Digest, DigestAlgorithm};
use crate::errors::{Result, SentinelError};
use crate::event::Event;
use crate::lock;
use crate::magazine::Magazine;
use crate::task::Task;
use crate::trust::TrustRoot;
use crate::workqueue::WorkQueue;

/// One observed coefficient.
#[derive(Clone, Debug, Default)]
pub struct EventPoint {
    /// The coefficient.
    pub point: Digest,
    /// First observed while the model was unsealed.
    pub valid: bool,
    /// Occurrence count.
    pub count: u64,
}

/// Per-domain security model.
pub struct Model {
    algorithm: DigestAlgorithm,
    points: Mutex<Vec<Box<EventPoint>>>,
    measurement: Mutex<Digest>,
    state: Mutex<Digest>,
    base: Mutex<Digest>,
    sealed: AtomicBool,
    have_aggregate: AtomicBool,
    trajectory: Mutex<Vec<Arc<Event>>>,
    forensics: Mutex<Vec<Arc<Event>>>,
    pseudonyms: Mutex<Vec<Digest>>,
    magazine: Arc<Magazine<EventPoint>>,
}

impl Model {
    /// Allocate a model with a point magazine of `cache_size` slots.
    pub(crate) fn new(
        algorithm: DigestAlgorithm,
        cache_size: usize,
        refill_wq: Arc<WorkQueue>,
    ) -> Arc<Self> {
        let zero = algorithm.zero_digest();
        Arc::new(Model {
            algorithm,
            points: Mutex::new(Vec::new()),
            measurement: Mutex::new(zero),
            state: Mutex::new(zero),
            base: Mutex::new(zero),
            sealed: AtomicBool::new(false),
            have_aggregate: AtomicBool::new(false),
            trajectory: Mutex::new(Vec::new()),
            forensics: Mutex::new(Vec::new()),
            pseudonyms: Mutex::new(Vec::new()),
            magazine: Magazine::new(cache_size, "model-point", refill_wq),
        })
    }

    /// `H(base || id)`, the per-point contribution to measurement and
    /// state.
    fn host_measurement(&self, id: &Digest) -> Digest {
        let mut state = self.algorithm.new_state();
        state.update(lock(&self.base).as_bytes());
        state.update(id.as_bytes());
        state.finish()
    }

    fn update_measurement(&self, id: &Digest) {
        let contribution = self.host_measurement(id);
        let mut measurement = lock(&self.measurement);
        let mut state = self.algorithm.new_state();
        state.update(measurement.as_bytes());
        state.update(contribution.as_bytes());
        *measurement = state.finish();
    }

    /// Inject a security event into the model.
    ///
    /// A previously seen coefficient only increments its count; a novel
    /// one updates the running measurement and lands in the trajectory
    /// (unsealed) or the forensics log (sealed, task goes untrusted).
    /// For the root domain `trust` carries the TPM extension path.
    pub(crate) fn insert(
        &self,
        ep: &Arc<Event>,
        task: &Task,
        trust: Option<&TrustRoot>,
    ) -> Result<()> {
        let mut points = lock(&self.points);

        if let Some(existing) = points.iter_mut().find(|p| p.point == ep.mapping) {
            existing.count += 1;
            if !existing.valid {
                task.mark_untrusted();
            }
            return Ok(());
        }

        // Acquire the point record before touching the measurement so a
        // magazine miss leaves the model untouched.
        let mut point = self
            .magazine
            .acquire(ep.locked)
            .ok_or(SentinelError::OutOfMemory)?;

        self.update_measurement(&ep.mapping);
        if let Some(trust) = trust {
            trust.extend(ep.mapping);
        }

        let valid = !self.is_sealed();
        point.point = ep.mapping;
        point.valid = valid;
        point.count = 1;
        points.push(point);

        if valid {
            lock(&self.trajectory).push(Arc::clone(ep));
        } else {
            lock(&self.forensics).push(Arc::clone(ep));
            task.mark_untrusted();
        }

        Ok(())
    }

    /// Compute the order-independent state aggregate.
    ///
    /// `state := H(0^D || H(base || aggregate))`, then folded over the
    /// points sorted by lexicographic coefficient order.
    pub fn compute_state(&self, aggregate: &Digest) -> Digest {
        let width = self.algorithm.digest_size();

        let mut snapshot: Vec<Digest> = {
            let points = lock(&self.points);
            points.iter().map(|p| p.point).collect()
        };
        snapshot.sort();

        let mut state = self.algorithm.new_state();
        state.update(Digest::zero(width).as_bytes());
        state.update(self.host_measurement(aggregate).as_bytes());
        let mut value = state.finish();

        for point in &snapshot {
            let contribution = self.host_measurement(point);
            let mut fold = self.algorithm.new_state();
            fold.update(value.as_bytes());
            fold.update(contribution.as_bytes());
            value = fold.finish();
        }

        *lock(&self.state) = value;
        value
    }

    /// Admit a coefficient while restoring a model from recorded state.
    ///
    /// Idempotent; the first load also injects the hardware aggregate.
    pub fn load_point(
        &self,
        point: &Digest,
        aggregate: &Digest,
        trust: Option<&TrustRoot>,
    ) -> Result<()> {
        {
            let points = lock(&self.points);
            if points.iter().any(|p| p.point == *point) {
                return Ok(());
            }
        }

        let mut record = self
            .magazine
            .acquire(false)
            .ok_or(SentinelError::OutOfMemory)?;
        record.point = *point;
        record.valid = true;
        record.count = 0;
        lock(&self.points).push(record);

        if !self.have_aggregate.swap(true, Ordering::SeqCst) {
            self.add_aggregate(aggregate, trust)?;
        }

        self.update_measurement(point);
        if let Some(trust) = trust {
            trust.extend(*point);
        }
        Ok(())
    }

    /// Declare a pseudonym: files whose name maps to it have their
    /// content elided from the coefficient.
    pub fn load_pseudonym(&self, mapping: Digest) {
        lock(&self.pseudonyms).push(mapping);
    }

    /// Set the model base point.
    pub fn load_base(&self, base: Digest) {
        *lock(&self.base) = base;
    }

    /// Fold the hardware aggregate into the running measurement.
    pub(crate) fn add_aggregate(
        &self,
        aggregate: &Digest,
        trust: Option<&TrustRoot>,
    ) -> Result<()> {
        self.have_aggregate.store(true, Ordering::SeqCst);
        self.update_measurement(aggregate);
        if let Some(trust) = trust {
            trust.extend(*aggregate);
        }
        Ok(())
    }

    /// Probe for a pseudonym declared for a file name.
    pub fn has_pseudonym(&self, name_length: u32, name_digest: &Digest) -> bool {
        let mapping = pseudonym_mapping(self.algorithm, name_length, name_digest);
        lock(&self.pseudonyms).iter().any(|p| *p == mapping)
    }

    /// Freeze the set of valid coefficients.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::SeqCst);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }

    /// The order-dependent running measurement.
    pub fn measurement(&self) -> Digest {
        *lock(&self.measurement)
    }

    /// The most recently computed state value.
    pub fn state(&self) -> Digest {
        *lock(&self.state)
    }

    pub fn base(&self) -> Digest {
        *lock(&self.base)
    }

    /// Number of distinct points in the model.
    pub fn point_count(&self) -> usize {
        lock(&self.points).len()
    }

    /// Snapshot of the point for a coefficient, if present.
    pub fn point(&self, coefficient: &Digest) -> Option<EventPoint> {
        lock(&self.points)
            .iter()
            .find(|p| p.point == *coefficient)
            .map(|p| (**p).clone())
    }

    /// Events first seen while the model was unsealed, in order.
    pub fn trajectory(&self) -> Vec<Arc<Event>> {
        lock(&self.trajectory).clone()
    }

    /// Events first seen while the model was sealed, in order.
    pub fn forensics(&self) -> Vec<Arc<Event>> {
        lock(&self.forensics).clone()
    }
}

/// Pseudonym digest for a file name: `H(nameLen || H(name))`.
pub fn pseudonym_mapping(
    algorithm: DigestAlgorithm,
    name_length: u32,
    name_digest: &Digest,
) -> Digest {
    let mut state = algorithm.new_state();
    state.update(&name_length.to_ne_bytes());
    state.update(name_digest.as_bytes());
    state.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::EventKind;
    use crate::task::Credentials;

    fn model() -> (Arc<Model>, Arc<WorkQueue>) {
        let wq = Arc::new(WorkQueue::new("model-test-wq"));
        (
            Model::new(DigestAlgorithm::Sha256, 8, Arc::clone(&wq)),
            wq,
        )
    }

    fn event_with(mapping: Digest) -> Arc<Event> {
        Arc::new(Event {
            kind: EventKind::FileOpen,
            mapping,
            ..Event::default()
        })
    }

    #[test]
    fn duplicate_insert_increments_count_only() {
        let (model, _wq) = model();
        let task = Task::new(1, "t", Credentials::default());
        let c = DigestAlgorithm::Sha256.digest(b"point");

        model.insert(&event_with(c), &task, None).unwrap();
        let first = model.measurement();
        model.insert(&event_with(c), &task, None).unwrap();

        assert_eq!(model.point_count(), 1);
        assert_eq!(model.point(&c).unwrap().count, 2);
        assert_eq!(model.measurement(), first);
        assert_eq!(model.trajectory().len(), 1);
        assert!(task.is_trusted());
    }

    #[test]
    fn sealed_insert_is_forensic_and_untrusts() {
        let (model, _wq) = model();
        let task = Task::new(2, "t", Credentials::default());
        model.seal();
        let c = DigestAlgorithm::Sha256.digest(b"rogue");
        model.insert(&event_with(c), &task, None).unwrap();

        let point = model.point(&c).unwrap();
        assert!(!point.valid);
        assert_eq!(model.forensics().len(), 1);
        assert!(model.trajectory().is_empty());
        assert!(!task.is_trusted());
    }

    #[test]
    fn state_is_order_independent() {
        let alg = DigestAlgorithm::Sha256;
        let aggregate = alg.zero_digest();
        let task = Task::new(3, "t", Credentials::default());
        let coefficients: Vec<Digest> =
            [b"a".as_ref(), b"b".as_ref(), b"c".as_ref()]
                .iter()
                .map(|b| alg.digest(b))
                .collect();

        let (forward, _w1) = model();
        for c in &coefficients {
            forward.insert(&event_with(*c), &task, None).unwrap();
        }
        let (reverse, _w2) = model();
        for c in coefficients.iter().rev() {
            reverse.insert(&event_with(*c), &task, None).unwrap();
        }

        assert_eq!(
            forward.compute_state(&aggregate),
            reverse.compute_state(&aggregate)
        );
        assert_ne!(forward.measurement(), reverse.measurement());
    }

    #[test]
    fn load_point_then_insert_counts_once() {
        let (model, _wq) = model();
        let alg = DigestAlgorithm::Sha256;
        let task = Task::new(4, "t", Credentials::default());
        let c = alg.digest(b"restored");

        model.load_point(&c, &alg.zero_digest(), None).unwrap();
        model.load_point(&c, &alg.zero_digest(), None).unwrap();
        model.insert(&event_with(c), &task, None).unwrap();

        assert_eq!(model.point_count(), 1);
        assert_eq!(model.point(&c).unwrap().count, 1);
        assert!(model.point(&c).unwrap().valid);
        assert!(task.is_trusted());
    }

    #[test]
    fn pseudonym_probe_matches_loaded_mapping() {
        let (model, _wq) = model();
        let alg = DigestAlgorithm::Sha256;
        let name_digest = alg.digest(b"/tmp/secret");
        let mapping = pseudonym_mapping(alg, 11, &name_digest);

        assert!(!model.has_pseudonym(11, &name_digest));
        model.load_pseudonym(mapping);
        assert!(model.has_pseudonym(11, &name_digest));
        assert!(!model.has_pseudonym(12, &name_digest));
    }
}
