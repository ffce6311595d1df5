//! Syscall number -> handler descriptor. Built once at startup and
//! static for the container's lifetime.

use std::collections::HashMap;

use super::{identity, inode, nonblocking, passthrough, random, reject, resources, time};
use super::{SyscallHandler, PASSTHROUGH_DEFAULT};

lazy_static::lazy_static! {
    static ref TABLE: HashMap<i64, &'static SyscallHandler> = build_table();
}

fn build_table() -> HashMap<i64, &'static SyscallHandler> {
    let mut t: HashMap<i64, &'static SyscallHandler> = HashMap::new();

    // Virtual time.
    t.insert(libc::SYS_clock_gettime, &time::CLOCK_GETTIME);
    t.insert(libc::SYS_gettimeofday, &time::GETTIMEOFDAY);
    t.insert(libc::SYS_time, &time::TIME);
    t.insert(libc::SYS_getrusage, &time::GETRUSAGE);
    t.insert(libc::SYS_utimensat, &time::UTIMENSAT);

    // Canonical identity.
    t.insert(libc::SYS_uname, &identity::UNAME);

    // Canonical resource stats.
    t.insert(libc::SYS_sysinfo, &resources::SYSINFO);
    t.insert(libc::SYS_getrlimit, &resources::GETRLIMIT);
    t.insert(libc::SYS_prlimit64, &resources::PRLIMIT64);
    t.insert(libc::SYS_statfs, &resources::STATFS);
    t.insert(libc::SYS_fstatfs, &resources::FSTATFS);

    // Deterministic randomness.
    t.insert(libc::SYS_getrandom, &random::GETRANDOM);

    // Inode virtualization.
    t.insert(libc::SYS_stat, &inode::STAT);
    t.insert(libc::SYS_lstat, &inode::LSTAT);
    t.insert(libc::SYS_fstat, &inode::FSTAT);
    t.insert(libc::SYS_newfstatat, &inode::NEWFSTATAT);

    // Non-blocking conversion + replay.
    t.insert(libc::SYS_poll, &nonblocking::POLL);
    t.insert(libc::SYS_wait4, &nonblocking::WAIT4);
    t.insert(libc::SYS_read, &nonblocking::READ);
    t.insert(libc::SYS_pipe, &nonblocking::PIPE);
    t.insert(libc::SYS_nanosleep, &nonblocking::NANOSLEEP);
    t.insert(libc::SYS_clock_nanosleep, &nonblocking::CLOCK_NANOSLEEP);

    // Reject.
    t.insert(libc::SYS_getpeername, &reject::GETPEERNAME);
    t.insert(libc::SYS_ioctl, &reject::IOCTL);

    // Log-only.
    for &(nr, handler) in passthrough::LOG_ONLY_SYSCALLS.iter() {
        t.insert(nr, handler);
    }

    t
}

/// Look up the handler for `syscallno`, falling back to the
/// pass-through default for anything not explicitly registered.
pub fn lookup(syscallno: i64) -> &'static SyscallHandler {
    TABLE.get(&syscallno).copied().unwrap_or(&PASSTHROUGH_DEFAULT)
}

/// The human-readable name for a syscall number, for logging, whether
/// or not it has a registered handler.
pub fn name_of(syscallno: i64) -> &'static str {
    lookup(syscallno).name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_syscalls_resolve_to_their_handler() {
        assert_eq!(name_of(libc::SYS_getrandom), "getrandom");
        assert_eq!(name_of(libc::SYS_uname), "uname");
    }

    #[test]
    fn unknown_syscalls_fall_back_to_passthrough() {
        // A syscall number no handler claims.
        assert_eq!(lookup(9999).name, "<unhandled>");
    }
}
