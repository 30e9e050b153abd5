// CLASSIFICATION: COMMUNITY
// Filename: names.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-08-25

//! Closed set of security event kinds with their ASCII names and the
//! per-kind action policy. The table order is part of the engine's wire
//! contract and must not be rearranged.

/// Security event kinds observed by the engine.
///
/// The first nine kinds carry typed cells; the remainder are generic
/// hooks that map through the name table only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EventKind {
    #[default]
    Undefined = 0,
    BprmSetCreds,
    GenericEvent,
    TaskKill,
    FileOpen,
    MmapFile,
    SocketCreate,
    SocketConnect,
    SocketBind,
    SocketAccept,
    PtraceTraceme,
    TaskSetpgid,
    TaskGetpgid,
    TaskGetsid,
    TaskSetnice,
    TaskSetioprio,
    TaskGetioprio,
    TaskPrlimit,
    TaskSetrlimit,
    TaskSetscheduler,
    TaskGetscheduler,
    TaskPrctl,
    FileIoctl,
    FileLock,
    FileFcntl,
    FileReceive,
    UnixStreamConnect,
    UnixMaySend,
    SocketListen,
    SocketSocketpair,
    SocketSendmsg,
    SocketRecvmsg,
    SocketGetsockname,
    SocketGetpeername,
    SocketSetsockopt,
    SocketShutdown,
    KernelModuleRequest,
    KernelLoadData,
    KernelReadFile,
    SbMount,
    SbUmount,
    SbRemount,
    SbPivotroot,
    SbStatfs,
    MoveMount,
    IpcPermission,
}

const KIND_TABLE: [EventKind; EVENT_KIND_COUNT] = [
    EventKind::Undefined,
    EventKind::BprmSetCreds,
    EventKind::GenericEvent,
    EventKind::TaskKill,
    EventKind::FileOpen,
    EventKind::MmapFile,
    EventKind::SocketCreate,
    EventKind::SocketConnect,
    EventKind::SocketBind,
    EventKind::SocketAccept,
    EventKind::PtraceTraceme,
    EventKind::TaskSetpgid,
    EventKind::TaskGetpgid,
    EventKind::TaskGetsid,
    EventKind::TaskSetnice,
    EventKind::TaskSetioprio,
    EventKind::TaskGetioprio,
    EventKind::TaskPrlimit,
    EventKind::TaskSetrlimit,
    EventKind::TaskSetscheduler,
    EventKind::TaskGetscheduler,
    EventKind::TaskPrctl,
    EventKind::FileIoctl,
    EventKind::FileLock,
    EventKind::FileFcntl,
    EventKind::FileReceive,
    EventKind::UnixStreamConnect,
    EventKind::UnixMaySend,
    EventKind::SocketListen,
    EventKind::SocketSocketpair,
    EventKind::SocketSendmsg,
    EventKind::SocketRecvmsg,
    EventKind::SocketGetsockname,
    EventKind::SocketGetpeername,
    EventKind::SocketSetsockopt,
    EventKind::SocketShutdown,
    EventKind::KernelModuleRequest,
    EventKind::KernelLoadData,
    EventKind::KernelReadFile,
    EventKind::SbMount,
    EventKind::SbUmount,
    EventKind::SbRemount,
    EventKind::SbPivotroot,
    EventKind::SbStatfs,
    EventKind::MoveMount,
    EventKind::IpcPermission,
];

/// Number of event kinds in the table.
pub const EVENT_KIND_COUNT: usize = 46;

/// ASCII names, indexed by kind. Hashed without a trailing null.
pub const EVENT_NAMES: [&str; EVENT_KIND_COUNT] = [
    "undefined",
    "bprm_set_creds",
    "generic_event",
    "task_kill",
    "file_open",
    "mmap_file",
    "socket_create",
    "socket_connect",
    "socket_bind",
    "socket_accept",
    "ptrace_traceme",
    "task_setpgid",
    "task_getpgid",
    "task_getsid",
    "task_setnice",
    "task_setioprio",
    "task_getioprio",
    "task_prlimit",
    "task_setrlimit",
    "task_setscheduler",
    "task_getscheduler",
    "task_prctl",
    "file_ioctl",
    "file_lock",
    "file_fcntl",
    "file_receive",
    "unix_stream_connect",
    "unix_may_send",
    "socket_listen",
    "socket_socketpair",
    "socket_sendmsg",
    "socket_recvmsg",
    "socket_getsockname",
    "socket_getpeername",
    "socket_setsockopt",
    "socket_shutdown",
    "kernel_module_request",
    "kernel_load_data",
    "kernel_read_file",
    "sb_mount",
    "sb_umount",
    "sb_remount",
    "sb_pivotroot",
    "sb_statfs",
    "move_mount",
    "ipc_permission",
];

impl EventKind {
    /// Table index of this kind.
    pub fn index(self) -> usize {
        self as usize
    }

    /// ASCII name taken from the fixed table.
    pub fn name(self) -> &'static str {
        EVENT_NAMES[self.index()]
    }

    /// Resolve a kind from its integer index.
    pub fn from_index(index: u32) -> Option<EventKind> {
        KIND_TABLE.get(index as usize).copied()
    }
}

/// Action applied when an untrusted task triggers an event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Action {
    /// Log the event and permit it.
    #[default]
    Log,
    /// Fail the hook.
    Deny,
}

impl Action {
    /// Name rendered in log export records.
    pub fn name(self) -> &'static str {
        match self {
            Action::Log => "LOG",
            Action::Deny => "DENY",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_and_enum_agree() {
        for (idx, kind) in KIND_TABLE.iter().enumerate() {
            assert_eq!(kind.index(), idx);
            assert_eq!(EventKind::from_index(idx as u32), Some(*kind));
        }
        assert_eq!(EventKind::from_index(EVENT_KIND_COUNT as u32), None);
    }

    #[test]
    fn primary_names() {
        assert_eq!(EventKind::FileOpen.name(), "file_open");
        assert_eq!(EventKind::BprmSetCreds.name(), "bprm_set_creds");
        assert_eq!(EventKind::SocketAccept.name(), "socket_accept");
    }
}
