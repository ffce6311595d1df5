//! Log-only syscalls: allowed straight through to the kernel unchanged,
//! recorded at pre-entry for diagnostics, with no post-hook and no
//! register rewriting.
//!
//! The pre-hook's job is to read and log the relevant pathname(s) and
//! argument values, so the handlers below fall into two shapes: those
//! with one or more pathname arguments (read via `memory::read_string`
//! and logged as text) and those with none (logged by name and number
//! alone).

use super::{HookContext, SyscallHandler};
use crate::error::Result;

/// Shared pre-hook for syscalls that carry no pathname argument worth
/// reading (`tgkill`'s ids, `getcwd`'s output buffer, `write`/`writev`'s
/// data buffer). Looks the name up from `Tracee::in_flight` (set by the
/// tracer before the pre-hook runs) rather than hard-coding it per
/// handler.
pub fn log_pre(ctx: &mut HookContext) -> Result<bool> {
    let name = ctx.tracee.in_flight.map(|f| f.handler.name).unwrap_or("?");
    log!(
        LogDebug,
        "pid {}: passthrough syscall {} (nr {})",
        ctx.pid(),
        name,
        ctx.regs.syscallno()
    );
    Ok(false)
}

/// Read each argument in `indices` as a nul-terminated pathname and log
/// them alongside the syscall name. A read failure is logged rather
/// than propagated: a bad pointer here is the tracee's problem, not
/// grounds for aborting the container over a diagnostic.
fn log_paths_pre(ctx: &mut HookContext, indices: &[usize]) -> Result<bool> {
    let name = ctx.tracee.in_flight.map(|f| f.handler.name).unwrap_or("?");
    let pid = ctx.pid();
    let paths: Vec<String> = indices
        .iter()
        .map(|&i| {
            let addr = ctx.regs.arg(i);
            match crate::memory::read_string(pid, addr) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(_) => format!("<unreadable @ {:#x}>", addr),
            }
        })
        .collect();
    log!(
        LogDebug,
        "pid {}: passthrough syscall {} (nr {}) path(s) = {:?}",
        pid,
        name,
        ctx.regs.syscallno(),
        paths
    );
    Ok(false)
}

macro_rules! log_only_handler {
    ($ident:ident, $name:expr) => {
        pub static $ident: SyscallHandler = SyscallHandler::pre_only($name, log_pre);
    };
}

macro_rules! path_log_only_handler {
    ($ident:ident, $name:expr, [$($index:expr),+]) => {
        fn $ident(ctx: &mut HookContext) -> Result<bool> {
            log_paths_pre(ctx, &[$($index),+])
        }
    };
}

// Single-pathname syscalls: the pathname's argument index varies with
// whether the call takes a `dirfd` ahead of it.
path_log_only_handler!(access_pre, "access", [0]);
path_log_only_handler!(chdir_pre, "chdir", [0]);
path_log_only_handler!(chmod_pre, "chmod", [0]);
path_log_only_handler!(open_pre, "open", [0]);
path_log_only_handler!(openat_pre, "openat", [1]);
path_log_only_handler!(mkdir_pre, "mkdir", [0]);
path_log_only_handler!(mkdirat_pre, "mkdirat", [1]);
path_log_only_handler!(readlink_pre, "readlink", [0]);
path_log_only_handler!(unlink_pre, "unlink", [0]);
path_log_only_handler!(unlinkat_pre, "unlinkat", [1]);
path_log_only_handler!(execve_pre, "execve", [0]);
path_log_only_handler!(faccessat_pre, "faccessat", [1]);
path_log_only_handler!(fchownat_pre, "fchownat", [1]);
// `rename(oldpath, newpath)` carries two pathnames.
path_log_only_handler!(rename_pre, "rename", [0, 1]);

pub static ACCESS: SyscallHandler = SyscallHandler::pre_only("access", access_pre);
pub static CHDIR: SyscallHandler = SyscallHandler::pre_only("chdir", chdir_pre);
pub static CHMOD: SyscallHandler = SyscallHandler::pre_only("chmod", chmod_pre);
pub static OPEN: SyscallHandler = SyscallHandler::pre_only("open", open_pre);
pub static OPENAT: SyscallHandler = SyscallHandler::pre_only("openat", openat_pre);
pub static MKDIR: SyscallHandler = SyscallHandler::pre_only("mkdir", mkdir_pre);
pub static MKDIRAT: SyscallHandler = SyscallHandler::pre_only("mkdirat", mkdirat_pre);
pub static READLINK: SyscallHandler = SyscallHandler::pre_only("readlink", readlink_pre);
pub static RENAME: SyscallHandler = SyscallHandler::pre_only("rename", rename_pre);
pub static UNLINK: SyscallHandler = SyscallHandler::pre_only("unlink", unlink_pre);
pub static UNLINKAT: SyscallHandler = SyscallHandler::pre_only("unlinkat", unlinkat_pre);
pub static EXECVE: SyscallHandler = SyscallHandler::pre_only("execve", execve_pre);
pub static FACCESSAT: SyscallHandler = SyscallHandler::pre_only("faccessat", faccessat_pre);
pub static FCHOWNAT: SyscallHandler = SyscallHandler::pre_only("fchownat", fchownat_pre);

// No pathname argument worth reading.
log_only_handler!(TGKILL, "tgkill");
log_only_handler!(GETCWD, "getcwd");
log_only_handler!(WRITE, "write");
log_only_handler!(WRITEV, "writev");

pub static LOG_ONLY_SYSCALLS: &[(i64, &'static SyscallHandler)] = &[
    (libc::SYS_access, &ACCESS),
    (libc::SYS_chdir, &CHDIR),
    (libc::SYS_chmod, &CHMOD),
    (libc::SYS_open, &OPEN),
    (libc::SYS_openat, &OPENAT),
    (libc::SYS_mkdir, &MKDIR),
    (libc::SYS_mkdirat, &MKDIRAT),
    (libc::SYS_readlink, &READLINK),
    (libc::SYS_rename, &RENAME),
    (libc::SYS_unlink, &UNLINK),
    (libc::SYS_unlinkat, &UNLINKAT),
    (libc::SYS_execve, &EXECVE),
    (libc::SYS_tgkill, &TGKILL),
    (libc::SYS_faccessat, &FACCESSAT),
    (libc::SYS_fchownat, &FCHOWNAT),
    (libc::SYS_getcwd, &GETCWD),
    (libc::SYS_write, &WRITE),
    (libc::SYS_writev, &WRITEV),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_log_only_syscall_has_a_distinct_number() {
        let mut numbers: Vec<i64> = LOG_ONLY_SYSCALLS.iter().map(|&(nr, _)| nr).collect();
        numbers.sort_unstable();
        numbers.dedup();
        assert_eq!(numbers.len(), LOG_ONLY_SYSCALLS.len());
    }
}
