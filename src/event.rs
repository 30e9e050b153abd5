// CLASSIFICATION: COMMUNITY
// Filename: event.rs v0.7
// Author: Lukas Bower
// Date Modified: 2026-08-25

//! Security event descriptions.
//!
//! The builder canonicalizes a heterogeneous hook parameter union into a
//! fixed-layout [`Event`] record suitable for hashing. Events are shared
//! by reference count: the caller, a trajectory or forensics list, and
//! an export record each hold one `Arc` clone.

use std::io::Read;
use std::path::PathBuf;
use std::sync::{Arc, Once};

use log::warn;

use crate::digest::Digest;
use crate::domain::DomainContext;
use crate::errors::{Result, SentinelError};
use crate::inode::{InodeShadow, InodeStatus};
use crate::names::EventKind;
use crate::task::{Coe, Task};

/// Address family constants used by socket cells.
pub const AF_UNIX: u16 = 1;
pub const AF_INET: u16 = 2;
pub const AF_INET6: u16 = 10;

/// Read granularity for file content hashing.
const READ_CHUNK: usize = 4096;

/// Source of a file's content bytes.
///
/// The host VFS is outside the engine; hooks hand in anything that can
/// open a reader over the current content.
pub trait FileContent {
    fn open(&self) -> std::io::Result<Box<dyn Read + '_>>;
}

impl FileContent for [u8] {
    fn open(&self) -> std::io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(self))
    }
}

impl FileContent for Vec<u8> {
    fn open(&self) -> std::io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(self.as_slice()))
    }
}

/// Content read back from the filesystem, opened read-only regardless
/// of the hook's original open mode.
pub struct FsContent(pub PathBuf);

impl FileContent for FsContent {
    fn open(&self) -> std::io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(std::fs::File::open(&self.0)?))
    }
}

/// Description of the file a hook fired on.
pub struct FileParams<'a> {
    /// Absolute path, when resolution succeeded.
    pub path: Option<&'a str>,
    /// Dentry base name, the fallback identity.
    pub base_name: &'a str,
    /// Open flags.
    pub flags: u32,
    /// Raw host owner ids; translated through the domain namespace.
    pub uid: u32,
    pub gid: u32,
    /// Mode bits.
    pub mode: u32,
    /// Superblock magic.
    pub s_magic: u64,
    /// Superblock id string, fixed width.
    pub s_id: [u8; 32],
    /// Superblock uuid.
    pub s_uuid: [u8; 16],
    /// Current file size in bytes.
    pub size: u64,
    /// Inode version counter.
    pub iversion: u64,
    /// The inode's digest shadow.
    pub shadow: &'a Arc<InodeShadow>,
    /// Content source for digest collection.
    pub content: &'a dyn FileContent,
}

/// Memory-map parameters; `file` is absent for anonymous mappings.
pub struct MmapParams<'a> {
    pub file: Option<FileParams<'a>>,
    pub reqprot: u32,
    pub prot: u32,
    pub flags: u32,
}

/// Socket creation parameters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SocketCreateParams {
    pub family: u16,
    pub socket_type: u16,
    pub protocol: u16,
    /// Kernel-origin flag.
    pub kern: u8,
}

/// A socket address as presented to a connect or bind hook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketAddress {
    Ipv4 {
        port: u16,
        addr: [u8; 4],
    },
    Ipv6 {
        port: u16,
        addr: [u8; 16],
        flowinfo: u32,
        scope_id: u32,
    },
    /// `sun_path` bytes of the declared length; abstract names begin
    /// with a null byte.
    Unix {
        path: Vec<u8>,
    },
    /// Any other family: raw `sa_data` bytes.
    Other {
        family: u16,
        data: Vec<u8>,
    },
}

impl SocketAddress {
    pub fn family(&self) -> u16 {
        match self {
            SocketAddress::Ipv4 { .. } => AF_INET,
            SocketAddress::Ipv6 { .. } => AF_INET6,
            SocketAddress::Unix { .. } => AF_UNIX,
            SocketAddress::Other { family, .. } => *family,
        }
    }
}

/// Connect and bind parameters.
#[derive(Clone, Debug)]
pub struct SocketConnectParams {
    pub address: SocketAddress,
}

/// Family-specific tail of an accepted connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketAcceptAddress {
    /// Full `sockaddr_in` bytes.
    Ipv4([u8; 16]),
    /// 16-byte address.
    Ipv6([u8; 16]),
    /// `sun_path` bytes of the declared length.
    Unix(Vec<u8>),
    /// Raw sockaddr bytes for any other family.
    Other(Vec<u8>),
}

/// Accept parameters.
#[derive(Clone, Debug)]
pub struct SocketAcceptParams {
    pub family: u16,
    pub socket_type: u16,
    pub port: u16,
    pub address: SocketAcceptAddress,
}

/// Signal delivery parameters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskKillParams {
    /// Signal crosses modeling domains.
    pub cross_model: bool,
    pub signal: u32,
    /// Target task number.
    pub target: u64,
}

/// Typed parameter union handed in by the host's security hooks.
pub enum EventParams<'a> {
    File(FileParams<'a>),
    Mmap(MmapParams<'a>),
    SocketCreate(SocketCreateParams),
    SocketConnect(SocketConnectParams),
    SocketAccept(SocketAcceptParams),
    TaskKill(TaskKillParams),
    Generic(EventKind),
}

/// Canonicalized file cell.
#[derive(Clone, Debug, Default)]
pub struct FileCell {
    /// Absolute path, or the base name when resolution failed.
    pub name: String,
    pub name_length: u32,
    /// Digest of the path bytes.
    pub name_digest: Digest,
    pub flags: u32,
    /// Owner ids through the domain namespace.
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
    pub s_magic: u64,
    pub s_id: [u8; 32],
    pub s_uuid: [u8; 16],
    /// Content digest, or the domain zero digest when elided.
    pub digest: Digest,
}

/// Memory-map cell; the backing file, if any, lives in [`Event::file`].
#[derive(Clone, Copy, Debug, Default)]
pub struct MmapCell {
    pub anonymous: bool,
    pub reqprot: u32,
    pub prot: u32,
    pub flags: u32,
}

/// Canonicalized connect/bind cell.
#[derive(Clone, Debug)]
pub enum SocketConnectCell {
    Ipv4 {
        port: u16,
        addr: [u8; 4],
    },
    Ipv6 {
        port: u16,
        addr: [u8; 16],
        flowinfo: u32,
        scope_id: u32,
    },
    Unix {
        path: Vec<u8>,
    },
    /// Digest of the raw `sa_data` bytes.
    Other {
        family: u16,
        mapping: Digest,
    },
}

/// Canonicalized accept cell.
#[derive(Clone, Debug)]
pub struct SocketAcceptCell {
    pub family: u16,
    pub socket_type: u16,
    pub port: u16,
    pub tail: AcceptTail,
}

/// Family tail stored for an accept cell.
#[derive(Clone, Debug)]
pub enum AcceptTail {
    Ipv4([u8; 16]),
    Ipv6([u8; 16]),
    Unix(Vec<u8>),
    /// Digest of the raw sockaddr bytes.
    Other(Digest),
}

/// Event-kind-specific payload.
#[derive(Clone, Debug, Default)]
pub enum Cell {
    #[default]
    None,
    /// File cell carried in [`Event::file`].
    File,
    Mmap(MmapCell),
    SocketCreate(SocketCreateParams),
    SocketConnect(SocketConnectCell),
    SocketAccept(SocketAcceptCell),
    TaskKill(TaskKillParams),
    Generic(EventKind),
}

/// A fully described security event.
#[derive(Clone, Debug, Default)]
pub struct Event {
    pub kind: EventKind,
    /// The hook ran in atomic context.
    pub locked: bool,
    pub pid: u32,
    pub comm: String,
    /// Identity of the owning task.
    pub task_id: Digest,
    /// Captured context of execution.
    pub coe: Coe,
    /// File cell for file-backed events.
    pub file: Option<FileCell>,
    pub cell: Cell,
    /// The resulting coefficient; zero until mapped.
    pub mapping: Digest,
}

impl Event {
    /// Build an event description from hook parameters.
    ///
    /// On failure the partially filled record is released and the error
    /// surfaces to the hook; nothing is inserted into the model.
    pub(crate) fn build(
        domain: &DomainContext,
        kind: EventKind,
        params: EventParams<'_>,
        locked: bool,
        task: &Task,
    ) -> Result<Box<Event>> {
        let mut ep = domain
            .event_magazine()
            .acquire(locked)
            .ok_or(SentinelError::OutOfMemory)?;

        ep.kind = kind;
        ep.locked = locked;
        ep.pid = task.pid();
        ep.comm = task.comm().into();
        ep.task_id = task.task_id(domain.algorithm().digest_size());
        ep.coe = domain.capture_coe(task);

        match (kind, params) {
            (EventKind::FileOpen | EventKind::BprmSetCreds, EventParams::File(file)) => {
                ep.file = Some(fill_file_cell(domain, &file)?);
                ep.cell = Cell::File;
            }
            (EventKind::MmapFile, EventParams::Mmap(mmap)) => {
                let anonymous = mmap.file.is_none();
                if let Some(file) = &mmap.file {
                    ep.file = Some(fill_file_cell(domain, file)?);
                }
                ep.cell = Cell::Mmap(MmapCell {
                    anonymous,
                    reqprot: mmap.reqprot,
                    prot: mmap.prot,
                    flags: mmap.flags,
                });
            }
            (EventKind::SocketCreate, EventParams::SocketCreate(create)) => {
                ep.cell = Cell::SocketCreate(create);
            }
            (
                EventKind::SocketConnect | EventKind::SocketBind,
                EventParams::SocketConnect(connect),
            ) => {
                ep.cell = Cell::SocketConnect(canonicalize_connect_addr(
                    domain,
                    &connect.address,
                ));
            }
            (EventKind::SocketAccept, EventParams::SocketAccept(accept)) => {
                ep.cell = Cell::SocketAccept(canonicalize_accept_addr(domain, &accept));
            }
            (EventKind::TaskKill, EventParams::TaskKill(kill)) => {
                ep.cell = Cell::TaskKill(kill);
            }
            (_, EventParams::Generic(event_type)) => {
                if kind != EventKind::GenericEvent {
                    static UNKNOWN: Once = Once::new();
                    UNKNOWN.call_once(|| {
                        warn!("unhandled event kind {:?} treated as generic", kind);
                    });
                }
                ep.cell = Cell::Generic(event_type);
            }
            _ => {
                return Err(SentinelError::InvalidInput(
                    "event parameters do not match event kind",
                ));
            }
        }

        Ok(ep)
    }
}

/// Populate a file cell, computing the content digest under the inode
/// shadow mutex.
fn fill_file_cell(domain: &DomainContext, params: &FileParams<'_>) -> Result<FileCell> {
    let algorithm = domain.algorithm();
    let name = params.path.unwrap_or(params.base_name);
    let name_digest = algorithm.digest(name.as_bytes());
    let name_length = name.len() as u32;

    let digest = collect_file_digest(domain, params, name_length, &name_digest)?;

    Ok(FileCell {
        name: name.into(),
        name_length,
        name_digest,
        flags: params.flags,
        uid: domain.translate_uid(params.uid),
        gid: domain.translate_gid(params.gid),
        mode: params.mode,
        s_magic: params.s_magic,
        s_id: params.s_id,
        s_uuid: params.s_uuid,
        digest,
    })
}

fn collect_file_digest(
    domain: &DomainContext,
    params: &FileParams<'_>,
    name_length: u32,
    name_digest: &Digest,
) -> Result<Digest> {
    let algorithm = domain.algorithm();
    let mut shadow = params.shadow.lock();

    if let Some(model) = domain.model() {
        if model.has_pseudonym(name_length, name_digest) {
            return Ok(domain.zero_digest());
        }
    }

    if params.size == 0 {
        return Ok(domain.zero_digest());
    }

    if shadow.status == InodeStatus::Collected {
        if let Some(cached) = shadow.find(algorithm.name()) {
            if cached.version == params.iversion {
                return Ok(cached.value);
            }
        }
    }

    shadow.status = InodeStatus::Collecting;
    let digest = match stream_digest(params.content, algorithm) {
        Ok(digest) => digest,
        Err(err) => {
            shadow.status = InodeStatus::Absent;
            return Err(err);
        }
    };

    shadow.store(algorithm.name(), params.iversion, digest);
    shadow.status = InodeStatus::Collected;
    Ok(digest)
}

fn stream_digest(
    content: &dyn FileContent,
    algorithm: crate::digest::DigestAlgorithm,
) -> Result<Digest> {
    let mut reader = content.open()?;
    let mut state = algorithm.new_state();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let read = reader.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        state.update(&chunk[..read]);
    }
    Ok(state.finish())
}

/// Reduce a connect/bind address to the exact bytes the mapper hashes.
fn canonicalize_connect_addr(
    domain: &DomainContext,
    address: &SocketAddress,
) -> SocketConnectCell {
    match address {
        SocketAddress::Ipv4 { port, addr } => SocketConnectCell::Ipv4 {
            port: *port,
            addr: *addr,
        },
        SocketAddress::Ipv6 {
            port,
            addr,
            flowinfo,
            scope_id,
        } => SocketConnectCell::Ipv6 {
            port: *port,
            addr: *addr,
            flowinfo: *flowinfo,
            scope_id: *scope_id,
        },
        SocketAddress::Unix { path } => SocketConnectCell::Unix { path: path.clone() },
        SocketAddress::Other { family, data } => SocketConnectCell::Other {
            family: *family,
            mapping: domain.algorithm().digest(data),
        },
    }
}

fn canonicalize_accept_addr(
    domain: &DomainContext,
    accept: &SocketAcceptParams,
) -> SocketAcceptCell {
    let tail = match &accept.address {
        SocketAcceptAddress::Ipv4(raw) => AcceptTail::Ipv4(*raw),
        SocketAcceptAddress::Ipv6(addr) => AcceptTail::Ipv6(*addr),
        SocketAcceptAddress::Unix(path) => AcceptTail::Unix(path.clone()),
        SocketAcceptAddress::Other(raw) => AcceptTail::Other(domain.algorithm().digest(raw)),
    };
    SocketAcceptCell {
        family: accept.family,
        socket_type: accept.socket_type,
        port: accept.port,
        tail,
    }
}
