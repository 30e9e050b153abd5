// CLASSIFICATION: COMMUNITY
// Filename: mapper.rs v0.5
// Author: Lukas Bower
// Date Modified: 2026-08-25

//! Coefficient mapping.
//!
//! Reduces an event description to three intermediate digests (context
//! of execution, cell, event) and the final coefficient. Integer fields
//! hash in host-native byte order; models are host-local by design.

use crate::digest::{Digest, DigestAlgorithm};
use crate::event::{AcceptTail, Cell, Event, FileCell, SocketConnectCell};
use crate::task::Coe;

/// Digest the context of execution.
pub(crate) fn coe_mapping(algorithm: DigestAlgorithm, coe: &Coe) -> Digest {
    let mut state = algorithm.new_state();
    state.update(&coe.uid.to_ne_bytes());
    state.update(&coe.euid.to_ne_bytes());
    state.update(&coe.suid.to_ne_bytes());
    state.update(&coe.gid.to_ne_bytes());
    state.update(&coe.egid.to_ne_bytes());
    state.update(&coe.sgid.to_ne_bytes());
    state.update(&coe.fsuid.to_ne_bytes());
    state.update(&coe.fsgid.to_ne_bytes());
    state.update(&coe.capeff.to_ne_bytes());
    state.finish()
}

fn update_file_cell(state: &mut crate::digest::DigestState, file: &FileCell) {
    state.update(&file.flags.to_ne_bytes());
    state.update(&file.uid.to_ne_bytes());
    state.update(&file.gid.to_ne_bytes());
    state.update(&file.mode.to_ne_bytes());
    state.update(&file.name_length.to_ne_bytes());
    state.update(file.name_digest.as_bytes());
    state.update(&file.s_magic.to_ne_bytes());
    state.update(&file.s_id);
    state.update(&file.s_uuid);
    state.update(file.digest.as_bytes());
}

/// Digest the event-kind-specific cell.
pub(crate) fn cell_mapping(
    algorithm: DigestAlgorithm,
    zero_digest: &Digest,
    ep: &Event,
) -> Digest {
    let mut state = algorithm.new_state();

    match &ep.cell {
        Cell::File => {
            if let Some(file) = &ep.file {
                update_file_cell(&mut state, file);
            }
        }
        Cell::Mmap(mmap) => {
            state.update(&mmap.reqprot.to_ne_bytes());
            state.update(&mmap.prot.to_ne_bytes());
            state.update(&mmap.flags.to_ne_bytes());
            if !mmap.anonymous {
                if let Some(file) = &ep.file {
                    update_file_cell(&mut state, file);
                }
            }
        }
        Cell::SocketCreate(create) => {
            state.update(&create.family.to_ne_bytes());
            state.update(&create.socket_type.to_ne_bytes());
            state.update(&create.protocol.to_ne_bytes());
            state.update(&[create.kern]);
        }
        Cell::SocketConnect(connect) => match connect {
            SocketConnectCell::Ipv4 { port, addr } => {
                state.update(&crate::event::AF_INET.to_ne_bytes());
                state.update(&port.to_ne_bytes());
                state.update(addr);
            }
            SocketConnectCell::Ipv6 {
                port,
                addr,
                flowinfo,
                scope_id,
            } => {
                state.update(&crate::event::AF_INET6.to_ne_bytes());
                state.update(&port.to_ne_bytes());
                state.update(addr);
                state.update(&flowinfo.to_ne_bytes());
                state.update(&scope_id.to_ne_bytes());
            }
            SocketConnectCell::Unix { path } => {
                state.update(&crate::event::AF_UNIX.to_ne_bytes());
                state.update(path);
            }
            SocketConnectCell::Other { family, mapping } => {
                state.update(&family.to_ne_bytes());
                state.update(mapping.as_bytes());
            }
        },
        Cell::SocketAccept(accept) => {
            state.update(&accept.family.to_ne_bytes());
            state.update(&accept.socket_type.to_ne_bytes());
            state.update(&accept.port.to_ne_bytes());
            match &accept.tail {
                AcceptTail::Ipv4(raw) => state.update(raw),
                AcceptTail::Ipv6(addr) => state.update(addr),
                AcceptTail::Unix(path) => state.update(path),
                AcceptTail::Other(mapping) => state.update(mapping.as_bytes()),
            }
        }
        Cell::TaskKill(kill) => {
            state.update(&[kill.cross_model as u8]);
            state.update(&kill.signal.to_ne_bytes());
            state.update(&kill.target.to_ne_bytes());
        }
        Cell::Generic(event_type) => {
            state.update(event_type.name().as_bytes());
            state.update(zero_digest.as_bytes());
        }
        Cell::None => {}
    }

    state.finish()
}

/// Compose the final coefficient from the event name, task identity and
/// the two intermediate digests.
pub(crate) fn event_mapping(
    algorithm: DigestAlgorithm,
    ep: &Event,
    task_id: &Digest,
    coe_id: &Digest,
    cell_id: &Digest,
) -> Digest {
    let mut state = algorithm.new_state();
    state.update(ep.kind.name().as_bytes());
    state.update(task_id.as_bytes());
    state.update(coe_id.as_bytes());
    state.update(cell_id.as_bytes());
    state.finish()
}

/// Map an event into its coefficient using the given task identity and
/// install the result in the record.
pub(crate) fn map_event(
    algorithm: DigestAlgorithm,
    zero_digest: &Digest,
    ep: &mut Event,
    task_id: &Digest,
) {
    let coe_id = coe_mapping(algorithm, &ep.coe);
    let cell_id = cell_mapping(algorithm, zero_digest, ep);
    ep.mapping = event_mapping(algorithm, ep, task_id, &coe_id, &cell_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{MmapCell, TaskKillParams};
    use crate::names::EventKind;

    fn sample_event(kind: EventKind, cell: Cell) -> Event {
        Event {
            kind,
            coe: Coe {
                uid: 1000,
                euid: 1000,
                suid: 1000,
                gid: 100,
                egid: 100,
                sgid: 100,
                fsuid: 1000,
                fsgid: 100,
                capeff: 0,
            },
            cell,
            ..Event::default()
        }
    }

    #[test]
    fn equal_fields_give_equal_coefficients() {
        let alg = DigestAlgorithm::Sha256;
        let zero = alg.zero_digest();
        let mut a = sample_event(
            EventKind::TaskKill,
            Cell::TaskKill(TaskKillParams {
                cross_model: false,
                signal: 9,
                target: 42,
            }),
        );
        let mut b = a.clone();
        let task_id = alg.digest(b"task");
        map_event(alg, &zero, &mut a, &task_id);
        map_event(alg, &zero, &mut b, &task_id);
        assert_eq!(a.mapping, b.mapping);
        assert!(!a.mapping.is_zero());
    }

    #[test]
    fn coefficient_depends_on_task_identity() {
        let alg = DigestAlgorithm::Sha256;
        let zero = alg.zero_digest();
        let mut a = sample_event(EventKind::GenericEvent, Cell::Generic(EventKind::Undefined));
        let mut b = a.clone();
        map_event(alg, &zero, &mut a, &alg.digest(b"one"));
        map_event(alg, &zero, &mut b, &alg.digest(b"two"));
        assert_ne!(a.mapping, b.mapping);
    }

    #[test]
    fn coefficient_depends_on_event_kind() {
        let alg = DigestAlgorithm::Sha256;
        let zero = alg.zero_digest();
        let task_id = Digest::zero(32);
        let mut a = sample_event(EventKind::SocketListen, Cell::Generic(EventKind::SocketListen));
        let mut b = sample_event(EventKind::SocketShutdown, Cell::Generic(EventKind::SocketListen));
        map_event(alg, &zero, &mut a, &task_id);
        map_event(alg, &zero, &mut b, &task_id);
        assert_ne!(a.mapping, b.mapping);
    }

    #[test]
    fn anonymous_mmap_ends_at_flags() {
        let alg = DigestAlgorithm::Sha256;
        let zero = alg.zero_digest();
        let anon = sample_event(
            EventKind::MmapFile,
            Cell::Mmap(MmapCell {
                anonymous: true,
                reqprot: 1,
                prot: 1,
                flags: 2,
            }),
        );
        let cell = cell_mapping(alg, &zero, &anon);

        let mut state = alg.new_state();
        state.update(&1u32.to_ne_bytes());
        state.update(&1u32.to_ne_bytes());
        state.update(&2u32.to_ne_bytes());
        assert_eq!(cell, state.finish());
    }
}
