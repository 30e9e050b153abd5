// CLASSIFICATION: COMMUNITY
// Filename: export.rs v0.6
// Author: Lukas Bower
// Date Modified: 2026-08-25

//! Event export to an external trust orchestrator.
//!
//! Externally modeled domains serialize event descriptions into a FIFO
//! that the orchestrator drains through the domain's control file. A
//! hook in atomic context exports fire-and-forget; otherwise the caller
//! parks until the orchestrator returns a verdict.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::{Arc, Condvar, Mutex};

use crate::errors::{Result, SentinelError};
use crate::event::{AcceptTail, Cell, Event, FileCell, SocketConnectCell};
use crate::digest::Digest;
use crate::lock;
use crate::magazine::Magazine;
use crate::names::{Action, EventKind};
use crate::task::Task;
use crate::workqueue::WorkQueue;

/// Payload of one export record.
#[derive(Clone, Debug)]
pub(crate) enum ExportBody {
    /// Hardware aggregate announced at domain birth.
    Aggregate(Digest),
    /// A security event description; the flag marks atomic-context
    /// (async) events.
    Event(Arc<Event>),
    /// Notification of the action applied to an untrusted task.
    Log {
        comm: String,
        event: EventKind,
        action: Action,
    },
}

/// One entry in the export FIFO.
#[derive(Clone, Debug, Default)]
pub struct ExportRecord {
    pub(crate) body: Option<ExportBody>,
}

/// Export handle for an externally modeled domain.
pub struct External {
    list: Mutex<VecDeque<Box<ExportRecord>>>,
    have_event: Mutex<bool>,
    wq: Condvar,
    magazine: Arc<Magazine<ExportRecord>>,
}

impl External {
    pub(crate) fn new(cache_size: usize, refill_wq: Arc<WorkQueue>) -> Arc<Self> {
        Arc::new(External {
            list: Mutex::new(VecDeque::new()),
            have_event: Mutex::new(false),
            wq: Condvar::new(),
            magazine: Magazine::new(cache_size, "export", refill_wq),
        })
    }

    fn trigger(&self) {
        *lock(&self.have_event) = true;
        self.wq.notify_all();
    }

    /// Queue an event description for the orchestrator.
    ///
    /// Atomic-context events are tagged `async_event` and return
    /// immediately; otherwise the task is marked pending and parked
    /// until the verdict arrives or a kill forces it untrusted.
    pub(crate) fn export_event(&self, ep: &Arc<Event>, task: &Task) -> Result<()> {
        let mut record = self
            .magazine
            .acquire(ep.locked)
            .ok_or(SentinelError::OutOfMemory)?;
        record.body = Some(ExportBody::Event(Arc::clone(ep)));

        if ep.locked {
            lock(&self.list).push_back(record);
            self.trigger();
            return Ok(());
        }

        // Flag the pending verdict before the record becomes visible so
        // an immediate resolution cannot be lost.
        task.begin_pending();
        lock(&self.list).push_back(record);
        self.trigger();
        task.wait_verdict()
    }

    /// Queue a log record describing the action taken for an event.
    pub(crate) fn export_action(
        &self,
        event: EventKind,
        action: Action,
        comm: &str,
        locked: bool,
    ) -> Result<()> {
        let mut record = self
            .magazine
            .acquire(locked)
            .ok_or(SentinelError::OutOfMemory)?;
        record.body = Some(ExportBody::Log {
            comm: comm.into(),
            event,
            action,
        });
        lock(&self.list).push_back(record);
        self.trigger();
        Ok(())
    }

    /// Queue the hardware aggregate record emitted at domain birth.
    pub(crate) fn export_aggregate(&self, aggregate: Digest) -> Result<()> {
        let mut record = self
            .magazine
            .acquire(false)
            .ok_or(SentinelError::OutOfMemory)?;
        record.body = Some(ExportBody::Aggregate(aggregate));
        lock(&self.list).push_back(record);
        self.trigger();
        Ok(())
    }

    /// Pop and serialize one record.
    ///
    /// The record is consumed before serialization and never
    /// redelivered. An empty FIFO returns [`SentinelError::NoData`].
    pub fn show_next(&self) -> Result<String> {
        let record = {
            let mut list = lock(&self.list);
            let record = list.pop_front();
            if list.is_empty() {
                *lock(&self.have_event) = false;
            }
            record
        };

        let record = record.ok_or(SentinelError::NoData)?;
        match record.body {
            Some(body) => Ok(serialize_record(&body)),
            None => Err(SentinelError::NoData),
        }
    }

    /// Block until at least one record has been queued.
    pub fn wait_for_event(&self) {
        let mut have = lock(&self.have_event);
        while !*have {
            have = self
                .wq
                .wait(have)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// True when a record is waiting.
    pub fn have_event(&self) -> bool {
        *lock(&self.have_event)
    }

    /// Number of queued records.
    pub fn queued(&self) -> usize {
        lock(&self.list).len()
    }
}

fn serialize_record(body: &ExportBody) -> String {
    let mut out = String::from("{export{");
    match body {
        ExportBody::Aggregate(aggregate) => {
            let _ = write!(out, "type=aggregate}}, aggregate{{value={}}}", aggregate);
        }
        ExportBody::Event(ep) => {
            let kind = if ep.locked { "async_event" } else { "event" };
            let _ = write!(out, "type={}}}, ", kind);
            show_trajectory(&mut out, ep);
        }
        ExportBody::Log {
            comm,
            event,
            action,
        } => {
            let _ = write!(
                out,
                "type=log}}, log{{process={}, event={}, action={}}}",
                comm,
                event.name(),
                action.name()
            );
        }
    }
    out.push('}');
    out.push('\n');
    out
}

/// Render the trajectory view of one event description.
fn show_trajectory(out: &mut String, ep: &Event) {
    let _ = write!(
        out,
        "trajectory{{process={}, event={}, pid={}, task_id={}, coefficient={}, ",
        ep.comm,
        ep.kind.name(),
        ep.pid,
        ep.task_id,
        ep.mapping
    );
    let _ = write!(
        out,
        "COE{{uid={}, euid={}, suid={}, gid={}, egid={}, sgid={}, fsuid={}, fsgid={}, capeff={:#x}}}",
        ep.coe.uid,
        ep.coe.euid,
        ep.coe.suid,
        ep.coe.gid,
        ep.coe.egid,
        ep.coe.sgid,
        ep.coe.fsuid,
        ep.coe.fsgid,
        ep.coe.capeff
    );
    match &ep.cell {
        Cell::File => {
            if let Some(file) = &ep.file {
                out.push_str(", ");
                show_file(out, file);
            }
        }
        Cell::Mmap(mmap) => {
            let _ = write!(
                out,
                ", mmap_file{{anonymous={}, reqprot={}, prot={}, flags={}}}",
                mmap.anonymous as u8, mmap.reqprot, mmap.prot, mmap.flags
            );
            if let Some(file) = &ep.file {
                out.push_str(", ");
                show_file(out, file);
            }
        }
        Cell::SocketCreate(create) => {
            let _ = write!(
                out,
                ", socket_create{{family={}, type={}, protocol={}, kern={}}}",
                create.family, create.socket_type, create.protocol, create.kern
            );
        }
        Cell::SocketConnect(connect) => {
            out.push_str(", socket_connect{");
            match connect {
                SocketConnectCell::Ipv4 { port, addr } => {
                    let _ = write!(out, "family=2, port={}, addr={}", port, hex::encode(addr));
                }
                SocketConnectCell::Ipv6 {
                    port,
                    addr,
                    flowinfo,
                    scope_id,
                } => {
                    let _ = write!(
                        out,
                        "family=10, port={}, addr={}, flowinfo={}, scope_id={}",
                        port,
                        hex::encode(addr),
                        flowinfo,
                        scope_id
                    );
                }
                SocketConnectCell::Unix { path } => {
                    let _ = write!(out, "family=1, path={}", hex::encode(path));
                }
                SocketConnectCell::Other { family, mapping } => {
                    let _ = write!(out, "family={}, mapping={}", family, mapping);
                }
            }
            out.push('}');
        }
        Cell::SocketAccept(accept) => {
            let _ = write!(
                out,
                ", socket_accept{{family={}, type={}, port={}, ",
                accept.family, accept.socket_type, accept.port
            );
            match &accept.tail {
                AcceptTail::Ipv4(raw) => {
                    let _ = write!(out, "addr={}", hex::encode(raw));
                }
                AcceptTail::Ipv6(addr) => {
                    let _ = write!(out, "addr={}", hex::encode(addr));
                }
                AcceptTail::Unix(path) => {
                    let _ = write!(out, "path={}", hex::encode(path));
                }
                AcceptTail::Other(mapping) => {
                    let _ = write!(out, "mapping={}", mapping);
                }
            }
            out.push('}');
        }
        Cell::TaskKill(kill) => {
            let _ = write!(
                out,
                ", task_kill{{cross_model={}, signal={}, target={}}}",
                kill.cross_model as u8, kill.signal, kill.target
            );
        }
        Cell::Generic(event_type) => {
            let _ = write!(out, ", generic_event{{type={}}}", event_type.name());
        }
        Cell::None => {}
    }
    out.push('}');
}

fn show_file(out: &mut String, file: &FileCell) {
    let _ = write!(
        out,
        "file{{flags={}, uid={}, gid={}, mode={:o}, path={}, name_digest={}, s_magic={:#x}, s_id={}, s_uuid={}, digest={}}}",
        file.flags,
        file.uid,
        file.gid,
        file.mode,
        file.name,
        file.name_digest,
        file.s_magic,
        String::from_utf8_lossy(&file.s_id).trim_end_matches('\0'),
        hex::encode(file.s_uuid),
        file.digest
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::DigestAlgorithm;
    use crate::task::Credentials;

    fn external() -> (Arc<External>, Arc<WorkQueue>) {
        let wq = Arc::new(WorkQueue::new("export-test-wq"));
        (External::new(4, Arc::clone(&wq)), wq)
    }

    #[test]
    fn empty_fifo_returns_no_data() {
        let (ext, _wq) = external();
        assert!(matches!(ext.show_next(), Err(SentinelError::NoData)));
    }

    #[test]
    fn aggregate_record_layout() {
        let (ext, _wq) = external();
        let aggregate = DigestAlgorithm::Sha256.digest(b"hw");
        ext.export_aggregate(aggregate).unwrap();
        let line = ext.show_next().unwrap();
        assert_eq!(
            line,
            format!(
                "{{export{{type=aggregate}}, aggregate{{value={}}}}}\n",
                aggregate.to_hex()
            )
        );
    }

    #[test]
    fn log_record_layout() {
        let (ext, _wq) = external();
        ext.export_action(EventKind::FileOpen, Action::Deny, "bash", false)
            .unwrap();
        let line = ext.show_next().unwrap();
        assert_eq!(
            line,
            "{export{type=log}, log{process=bash, event=file_open, action=DENY}}\n"
        );
    }

    #[test]
    fn async_event_is_fire_and_forget() {
        let (ext, _wq) = external();
        let task = Task::new(5, "async", Credentials::default());
        let ep = Arc::new(Event {
            kind: EventKind::SocketCreate,
            locked: true,
            comm: "async".into(),
            ..Event::default()
        });
        ext.export_event(&ep, &task).unwrap();
        assert!(task.is_trusted());
        let line = ext.show_next().unwrap();
        assert!(line.starts_with("{export{type=async_event}, trajectory{"));
    }

    #[test]
    fn records_pop_in_fifo_order() {
        let (ext, _wq) = external();
        ext.export_aggregate(DigestAlgorithm::Sha256.digest(b"one"))
            .unwrap();
        ext.export_action(EventKind::TaskKill, Action::Log, "p", false)
            .unwrap();
        assert!(ext.show_next().unwrap().contains("type=aggregate"));
        assert!(ext.show_next().unwrap().contains("type=log"));
        assert!(!ext.have_event());
    }
}
