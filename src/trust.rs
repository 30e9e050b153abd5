// CLASSIFICATION: COMMUNITY
// Filename: trust.rs v0.4
// Author: Lukas Bower
// Date Modified: 2026-08-25

//! Hardware trust root.
//!
//! Caches the hardware aggregate derived from PCRs 0-7 and extends a
//! designated PCR with every coefficient the root model records. The
//! extension worker runs on an ordered queue so PCR history matches the
//! root model's insertion order.

use std::sync::{Arc, Mutex};

use log::warn;

use crate::digest::{Digest, DigestAlgorithm, MAX_DIGEST_SIZE};
use crate::lock;
use crate::workqueue::WorkQueue;

/// PCR the root model's coefficients are extended into.
pub const DEFAULT_ROOT_MODEL_PCR: u32 = 11;

/// Number of boot-measurement PCRs folded into the hardware aggregate.
const AGGREGATE_PCRS: u32 = 8;

/// Hash bank of a TPM PCR.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PcrBankAlg {
    Sha1,
    Sha256,
}

/// One allocated PCR bank.
#[derive(Clone, Copy, Debug)]
pub struct PcrBank {
    pub alg: PcrBankAlg,
    pub digest_size: usize,
}

/// Host TPM collaborator. The engine only needs PCR reads and extends.
pub trait TpmChip: Send + Sync {
    /// True for a TPM 2.0 device.
    fn is_tpm2(&self) -> bool;
    /// Banks allocated on the device.
    fn allocated_banks(&self) -> Vec<PcrBank>;
    /// Read one PCR from the given bank.
    fn pcr_read(&self, bank: PcrBankAlg, index: u32) -> Option<Vec<u8>>;
    /// Extend a PCR in every listed bank. Returns false on failure.
    fn pcr_extend(&self, index: u32, digests: &[(PcrBankAlg, Vec<u8>)]) -> bool;
}

/// Cached hardware aggregates and the PCR extension queue.
pub struct TrustRoot {
    tpm: Option<Arc<dyn TpmChip>>,
    root_pcr: u32,
    aggregates: Mutex<Vec<(&'static str, Digest)>>,
    update_wq: WorkQueue,
}

impl TrustRoot {
    pub(crate) fn new(tpm: Option<Arc<dyn TpmChip>>, root_pcr: u32) -> Self {
        TrustRoot {
            tpm,
            root_pcr,
            aggregates: Mutex::new(Vec::new()),
            update_wq: WorkQueue::new("sentinel-tpm"),
        }
    }

    /// The hardware aggregate `H(PCR_0 || ... || PCR_7)` under the given
    /// algorithm, read from the TPM's native bank. Absence of a TPM or a
    /// read failure yields the zero digest.
    pub fn aggregate(&self, algorithm: DigestAlgorithm) -> Digest {
        let tpm = match &self.tpm {
            Some(tpm) => tpm,
            None => return algorithm.zero_digest(),
        };

        let mut cache = lock(&self.aggregates);
        if let Some((_, cached)) = cache.iter().find(|(name, _)| *name == algorithm.name()) {
            return *cached;
        }

        let bank = if tpm.is_tpm2() {
            PcrBankAlg::Sha256
        } else {
            PcrBankAlg::Sha1
        };

        let mut state = algorithm.new_state();
        for index in 0..AGGREGATE_PCRS {
            match tpm.pcr_read(bank, index) {
                Some(value) => state.update(&value),
                None => {
                    warn!("trust root: error generating platform aggregate");
                    return algorithm.zero_digest();
                }
            }
        }
        let aggregate = state.finish();
        cache.push((algorithm.name(), aggregate));
        aggregate
    }

    /// Queue a PCR extension for one coefficient.
    ///
    /// The value is written into every allocated bank, truncated or
    /// zero-padded to the bank width, and extended into the root-model
    /// PCR by the ordered worker.
    pub(crate) fn extend(&self, coefficient: Digest) {
        let tpm = match &self.tpm {
            Some(tpm) => Arc::clone(tpm),
            None => return,
        };
        let root_pcr = self.root_pcr;

        self.update_wq.enqueue(move || {
            let mut digests = Vec::new();
            for bank in tpm.allocated_banks() {
                let width = bank.digest_size.min(MAX_DIGEST_SIZE);
                let mut value = vec![0u8; bank.digest_size];
                let take = coefficient.width().min(width);
                value[..take].copy_from_slice(&coefficient.as_bytes()[..take]);
                digests.push((bank.alg, value));
            }
            if !tpm.pcr_extend(root_pcr, &digests) {
                warn!("trust root: failed TPM update");
            }
        });
    }

    /// Wait for all queued extensions to complete.
    pub fn flush(&self) {
        self.update_wq.flush();
    }
}
