// CLASSIFICATION: COMMUNITY
// Filename: workqueue.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-08-25

//! Single-consumer work queues.
//!
//! Jobs submitted to one queue run on one dedicated thread in submission
//! order, which is what the trust root relies on to keep PCR extensions
//! aligned with model insertion order. Magazine refills share a second
//! "system" queue where ordering is incidental.

use std::sync::mpsc::{self, Sender};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

use log::warn;

use crate::lock;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A named queue with a dedicated consumer thread.
pub struct WorkQueue {
    name: &'static str,
    tx: Mutex<Option<Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WorkQueue {
    /// Spawn the consumer thread and return the queue handle.
    pub fn new(name: &'static str) -> Self {
        let (tx, rx) = mpsc::channel::<Job>();
        let worker = thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                while let Ok(job) = rx.recv() {
                    job();
                }
            })
            .ok();
        if worker.is_none() {
            warn!("workqueue {name}: consumer thread failed to start");
        }
        WorkQueue {
            name,
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(worker),
        }
    }

    /// Submit a job. Returns false when the queue is shut down.
    pub fn enqueue(&self, job: impl FnOnce() + Send + 'static) -> bool {
        match lock(&self.tx).as_ref() {
            Some(tx) => tx.send(Box::new(job)).is_ok(),
            None => false,
        }
    }

    /// Block until every job submitted before this call has completed.
    pub fn flush(&self) {
        let (done_tx, done_rx) = mpsc::channel::<()>();
        if self.enqueue(move || {
            let _ = done_tx.send(());
        }) {
            let _ = done_rx.recv();
        }
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        // Closing the channel lets the consumer drain and exit.
        lock(&self.tx).take();
        if let Some(handle) = lock(&self.worker).take() {
            if handle.join().is_err() {
                warn!("workqueue {}: consumer thread panicked", self.name);
            }
        }
    }
}
