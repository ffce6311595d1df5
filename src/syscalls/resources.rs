//! Canonical resource stats: `sysinfo`, `getrlimit`, `prlimit64`,
//! `statfs`, `fstatfs`. Every one of these reports fixed sentinel
//! values instead of whatever the host happens to have.

use libc::{rlimit, statfs, sysinfo};

use super::{HookContext, SyscallHandler};
use crate::error::{Error, Result};

fn sysinfo_post(ctx: &mut HookContext) -> Result<()> {
    if ctx.regs.syscall_result() != 0 {
        return Ok(());
    }
    let mut si: sysinfo = unsafe { std::mem::zeroed() };
    si.uptime = i64::MAX;
    si.loads = [i64::MAX as u64; 3];
    si.totalram = i64::MAX as u64;
    si.freeram = i64::MAX as u64;
    si.sharedram = i64::MAX as u64;
    si.bufferram = i64::MAX as u64;
    si.totalswap = i64::MAX as u64;
    si.freeswap = i64::MAX as u64;
    si.totalhigh = i64::MAX as u64;
    si.freehigh = i64::MAX as u64;
    si.procs = i16::MAX as u16;
    let addr = ctx.regs.arg(0);
    crate::memory::write_record(ctx.pid(), addr, &si)
}

pub static SYSINFO: SyscallHandler = SyscallHandler::post_only("sysinfo", sysinfo_post);

/// Not enumerated alongside `statfs`/`sysinfo`'s canonical values, but
/// covered by the same fixed-sentinel contract: "unlimited" is the
/// natural deterministic sentinel for a resource limit.
fn sentinel_rlimit() -> rlimit {
    rlimit {
        rlim_cur: libc::RLIM_INFINITY,
        rlim_max: libc::RLIM_INFINITY,
    }
}

fn getrlimit_post(ctx: &mut HookContext) -> Result<()> {
    if ctx.regs.syscall_result() != 0 {
        return Ok(());
    }
    let addr = ctx.regs.arg(1);
    crate::memory::write_record(ctx.pid(), addr, &sentinel_rlimit())
}

pub static GETRLIMIT: SyscallHandler = SyscallHandler::post_only("getrlimit", getrlimit_post);

fn prlimit64_pre(ctx: &mut HookContext) -> Result<bool> {
    let target = ctx.regs.arg(0) as i32;
    let self_pid = ctx.pid().as_raw();
    if target != 0 && target != self_pid {
        return Err(Error::UnsupportedSyscall {
            pid: ctx.pid(),
            syscall: "prlimit64",
            detail: format!("target pid {} is not self ({}) or 0", target, self_pid),
        });
    }
    let new_limit = ctx.regs.arg(2);
    if new_limit != 0 {
        ctx.tracee.save_arg(2, new_limit);
        ctx.regs.set_arg(2, 0);
    }
    Ok(true)
}

fn prlimit64_post(ctx: &mut HookContext) -> Result<()> {
    for (index, value) in ctx.tracee.take_saved_args() {
        ctx.regs.set_arg(index, value);
    }
    if ctx.regs.syscall_result() == 0 {
        let old_limit = ctx.regs.arg(3);
        if old_limit != 0 {
            crate::memory::write_record(ctx.pid(), old_limit, &sentinel_rlimit())?;
        }
    }
    Ok(())
}

pub static PRLIMIT64: SyscallHandler = SyscallHandler::new("prlimit64", prlimit64_pre, prlimit64_post);

fn sentinel_statfs() -> statfs {
    let mut s: statfs = unsafe { std::mem::zeroed() };
    s.f_type = 0xEF53;
    s.f_bsize = 100;
    s.f_blocks = 1000;
    s.f_bfree = 10000;
    s.f_bavail = 5000;
    s.f_files = 1000;
    s.f_ffree = 1000;
    s.f_namelen = 200;
    s.f_frsize = 20;
    s.f_flags = 1;
    s
}

fn statfs_post(ctx: &mut HookContext) -> Result<()> {
    if ctx.regs.syscall_result() != 0 {
        return Ok(());
    }
    let addr = ctx.regs.arg(1);
    crate::memory::write_record(ctx.pid(), addr, &sentinel_statfs())
}

pub static STATFS: SyscallHandler = SyscallHandler::post_only("statfs", statfs_post);
pub static FSTATFS: SyscallHandler = SyscallHandler::post_only("fstatfs", statfs_post);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_statfs_matches_canonical_values() {
        let s = sentinel_statfs();
        assert_eq!(s.f_type, 0xEF53);
        assert_eq!(s.f_bsize, 100);
        assert_eq!(s.f_namelen, 200);
    }

    #[test]
    fn sentinel_rlimit_is_unlimited() {
        let r = sentinel_rlimit();
        assert_eq!(r.rlim_cur, libc::RLIM_INFINITY);
        assert_eq!(r.rlim_max, libc::RLIM_INFINITY);
    }
}
