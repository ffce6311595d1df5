//! Syscalls this container refuses to let a tracee actually perform:
//! `getpeername` (no meaningful network identity to report) and
//! `ioctl` outside a small terminal-query allowlist.

use super::{HookContext, SyscallHandler};
use crate::error::{Error, Result};

fn getpeername_post(ctx: &mut HookContext) -> Result<()> {
    if ctx.regs.syscall_result() != 0 {
        return Err(Error::UnsupportedSyscall {
            pid: ctx.pid(),
            syscall: "getpeername",
            detail: format!("returned {}", ctx.regs.syscall_result()),
        });
    }
    Ok(())
}

pub static GETPEERNAME: SyscallHandler = SyscallHandler::post_only("getpeername", getpeername_post);

const ALLOWED_REQUESTS: [u64; 3] = [
    libc::TCGETS as u64,
    libc::TIOCGWINSZ as u64,
    libc::TIOCGPGRP as u64,
];

/// Suppress the real `ioctl` by rewriting its number to an invalid
/// syscall (the kernel's own -ENOSYS result is discarded and replaced
/// in the post-hook), rather than letting it reach the host terminal.
fn ioctl_pre(ctx: &mut HookContext) -> Result<bool> {
    let request = ctx.regs.arg(1);
    if !ALLOWED_REQUESTS.contains(&request) {
        return Err(Error::UnsupportedSyscall {
            pid: ctx.pid(),
            syscall: "ioctl",
            detail: format!("request {:#x} is not in the allowed set", request),
        });
    }
    ctx.regs.set_syscallno(-1);
    Ok(true)
}

fn ioctl_post(ctx: &mut HookContext) -> Result<()> {
    ctx.regs.set_return(-(libc::ENOTTY as i64));
    Ok(())
}

pub static IOCTL: SyscallHandler = SyscallHandler::new("ioctl", ioctl_pre, ioctl_post);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_requests_cover_the_common_terminal_queries() {
        assert!(ALLOWED_REQUESTS.contains(&(libc::TCGETS as u64)));
        assert!(ALLOWED_REQUESTS.contains(&(libc::TIOCGWINSZ as u64)));
        assert!(ALLOWED_REQUESTS.contains(&(libc::TIOCGPGRP as u64)));
    }
}
