// CLASSIFICATION: COMMUNITY
// Filename: magazine.rs v0.5
// Author: Lukas Bower
// Date Modified: 2026-08-25

//! Pre-allocated record magazines.
//!
//! Security hooks may run with interrupts disabled or host spinlocks
//! held, where blocking allocation is forbidden. A magazine trades a
//! bounded set of pre-zeroed records for a guaranteed non-blocking
//! acquire: slot occupancy is tracked in a bitmap under a short lock and
//! consumed slots are replenished by jobs on the system work queue.
//!
//! Invariant: a slot's occupancy bit is set iff the slot is currently
//! checked out; the refill worker never clears a bit without first
//! storing a fresh record.

use std::sync::atomic::{fence, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use log::warn;

use crate::lock;
use crate::workqueue::WorkQueue;

const BITS_PER_WORD: usize = 64;

/// Exhaustion warnings are emitted once per this many failed acquires.
const WARN_INTERVAL: u32 = 64;

struct Slots<T> {
    records: Vec<Option<Box<T>>>,
    occupied: Vec<u64>,
}

impl<T> Slots<T> {
    fn first_clear(&self, size: usize) -> Option<usize> {
        for index in 0..size {
            if self.occupied[index / BITS_PER_WORD] & (1u64 << (index % BITS_PER_WORD)) == 0 {
                return Some(index);
            }
        }
        None
    }

    fn set_bit(&mut self, index: usize) {
        self.occupied[index / BITS_PER_WORD] |= 1u64 << (index % BITS_PER_WORD);
    }

    fn clear_bit(&mut self, index: usize) {
        self.occupied[index / BITS_PER_WORD] &= !(1u64 << (index % BITS_PER_WORD));
    }
}

/// Bitmap-indexed cache of pre-zeroed records.
pub struct Magazine<T> {
    label: &'static str,
    size: usize,
    slots: Mutex<Slots<T>>,
    refill_wq: Arc<WorkQueue>,
    exhausted: AtomicU32,
}

impl<T: Default + Send + 'static> Magazine<T> {
    /// Allocate a magazine with `size` pre-zeroed records.
    pub fn new(size: usize, label: &'static str, refill_wq: Arc<WorkQueue>) -> Arc<Self> {
        let mut records = Vec::with_capacity(size);
        records.resize_with(size, || Some(Box::new(T::default())));
        let words = size.div_ceil(BITS_PER_WORD).max(1);
        Arc::new(Magazine {
            label,
            size,
            slots: Mutex::new(Slots {
                records,
                occupied: vec![0u64; words],
            }),
            refill_wq,
            exhausted: AtomicU32::new(0),
        })
    }

    /// Number of slots in the magazine.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Obtain a zeroed record.
    ///
    /// With `locked` false the pool is bypassed and a fresh record is
    /// allocated on the heap. With `locked` true the first free slot is
    /// detached under the magazine lock and a refill job is queued;
    /// `None` means the magazine is exhausted and the caller must treat
    /// the event as a transient allocation failure.
    pub fn acquire(self: &Arc<Self>, locked: bool) -> Option<Box<T>> {
        if !locked {
            return Some(Box::new(T::default()));
        }

        let record = {
            let mut slots = lock(&self.slots);
            match slots.first_clear(self.size) {
                Some(index) => {
                    slots.set_bit(index);
                    let record = slots.records[index].take();
                    // Publish the consumed slot before the refill job can
                    // observe the bitmap.
                    fence(Ordering::SeqCst);
                    record.map(|r| (index, r))
                }
                None => None,
            }
        };

        match record {
            Some((index, record)) => {
                let magazine = Arc::clone(self);
                self.refill_wq.enqueue(move || magazine.refill(index));
                Some(record)
            }
            None => {
                if self.exhausted.fetch_add(1, Ordering::Relaxed) % WARN_INTERVAL == 0 {
                    warn!(
                        "magazine {}: failed atomic allocation, cache size={}",
                        self.label, self.size
                    );
                }
                None
            }
        }
    }

    /// Refill one consumed slot. Runs outside atomic context.
    fn refill(self: Arc<Self>, index: usize) {
        let fresh = Box::new(T::default());
        let mut slots = lock(&self.slots);
        if slots.records[index].is_some() {
            // Slot already repopulated; drop the extra allocation and
            // leave the occupancy bit alone.
            return;
        }
        slots.records[index] = Some(fresh);
        slots.clear_bit(index);
        fence(Ordering::SeqCst);
    }

    /// Number of slots currently checked out.
    pub fn occupied_count(&self) -> usize {
        let slots = lock(&self.slots);
        slots
            .occupied
            .iter()
            .map(|word| word.count_ones() as usize)
            .sum()
    }

    /// True when every slot has been refilled.
    pub fn is_idle(&self) -> bool {
        self.occupied_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Record {
        value: u64,
    }

    fn system_wq() -> Arc<WorkQueue> {
        Arc::new(WorkQueue::new("magazine-test-wq"))
    }

    #[test]
    fn unlocked_acquire_bypasses_pool() {
        let wq = system_wq();
        let magazine = Magazine::<Record>::new(2, "test", Arc::clone(&wq));
        let rec = magazine.acquire(false).unwrap();
        assert_eq!(rec.value, 0);
        assert!(magazine.is_idle());
    }

    #[test]
    fn exhaustion_returns_none() {
        let wq = system_wq();
        let magazine = Magazine::<Record>::new(1, "test", Arc::clone(&wq));
        // Park the refill queue so the consumed slot cannot be refilled
        // until the gate opens.
        let (gate_tx, gate_rx) = std::sync::mpsc::channel::<()>();
        wq.enqueue(move || {
            let _ = gate_rx.recv();
        });
        let first = magazine.acquire(true);
        assert!(first.is_some());
        assert!(magazine.acquire(true).is_none());
        gate_tx.send(()).unwrap();
        wq.flush();
        assert!(magazine.is_idle());
    }

    #[test]
    fn bitmap_converges_after_refill() {
        let wq = system_wq();
        let magazine = Magazine::<Record>::new(4, "test", Arc::clone(&wq));
        let held: Vec<_> = (0..4).filter_map(|_| magazine.acquire(true)).collect();
        assert_eq!(held.len(), 4);
        wq.flush();
        assert!(magazine.is_idle());
    }

    #[test]
    fn each_slot_served_to_one_acquirer() {
        let wq = system_wq();
        let magazine = Magazine::<Record>::new(8, "test", Arc::clone(&wq));
        let mut workers = Vec::new();
        for _ in 0..4 {
            let magazine = Arc::clone(&magazine);
            workers.push(std::thread::spawn(move || {
                let mut got = 0usize;
                for _ in 0..64 {
                    if let Some(rec) = magazine.acquire(true) {
                        got += 1;
                        drop(rec);
                    }
                }
                got
            }));
        }
        let total: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();
        assert!(total > 0);
        wq.flush();
        assert!(magazine.is_idle());
    }
}
