//! Virtual time family: `clock_gettime`, `gettimeofday`, `time`,
//! `getrusage`, and `utimensat` with a null time argument. Every
//! output here is derived from the logical clock, and every successful
//! call ticks it exactly once.

use libc::{rusage, timespec, timeval};

use super::{HookContext, SyscallHandler};
use crate::error::Result;

fn write_timespec_from_clock(ctx: &mut HookContext, addr: u64) -> Result<()> {
    let ts = timespec {
        tv_sec: ctx.tracee.clock.get() as i64,
        tv_nsec: 0,
    };
    crate::memory::write_record(ctx.pid(), addr, &ts)
}

fn clock_gettime_post(ctx: &mut HookContext) -> Result<()> {
    if ctx.regs.syscall_result() == 0 {
        let addr = ctx.regs.arg(1);
        write_timespec_from_clock(ctx, addr)?;
        ctx.tracee.clock.tick();
    }
    Ok(())
}

pub static CLOCK_GETTIME: SyscallHandler = SyscallHandler::post_only("clock_gettime", clock_gettime_post);

fn gettimeofday_post(ctx: &mut HookContext) -> Result<()> {
    if ctx.regs.syscall_result() == 0 {
        let addr = ctx.regs.arg(0);
        if addr != 0 {
            let tv = timeval {
                tv_sec: ctx.tracee.clock.get() as i64,
                tv_usec: 0,
            };
            crate::memory::write_record(ctx.pid(), addr, &tv)?;
        }
        ctx.tracee.clock.tick();
    }
    Ok(())
}

pub static GETTIMEOFDAY: SyscallHandler = SyscallHandler::post_only("gettimeofday", gettimeofday_post);

fn time_post(ctx: &mut HookContext) -> Result<()> {
    if ctx.regs.syscall_result() >= 0 {
        let now = ctx.tracee.clock.get() as i64;
        let addr = ctx.regs.arg(0);
        if addr != 0 {
            crate::memory::write_record(ctx.pid(), addr, &now)?;
        }
        ctx.regs.set_return(now);
        ctx.tracee.clock.tick();
    }
    Ok(())
}

pub static TIME: SyscallHandler = SyscallHandler::post_only("time", time_post);

fn getrusage_post(ctx: &mut HookContext) -> Result<()> {
    if ctx.regs.syscall_result() == 0 {
        let clock = ctx.tracee.clock.get() as i64;
        let mut ru: rusage = unsafe { std::mem::zeroed() };
        ru.ru_utime = timeval {
            tv_sec: clock,
            tv_usec: clock,
        };
        ru.ru_stime = timeval {
            tv_sec: clock,
            tv_usec: clock,
        };
        ru.ru_maxrss = i64::MAX;
        ru.ru_ixrss = i64::MAX;
        ru.ru_idrss = i64::MAX;
        ru.ru_isrss = i64::MAX;
        ru.ru_minflt = i64::MAX;
        ru.ru_majflt = i64::MAX;
        ru.ru_nswap = i64::MAX;
        ru.ru_inblock = i64::MAX;
        ru.ru_oublock = i64::MAX;
        ru.ru_msgsnd = i64::MAX;
        ru.ru_msgrcv = i64::MAX;
        ru.ru_nsignals = i64::MAX;
        ru.ru_nvcsw = i64::MAX;
        ru.ru_nivcsw = i64::MAX;
        let addr = ctx.regs.arg(1);
        crate::memory::write_record(ctx.pid(), addr, &ru)?;
        ctx.tracee.clock.tick();
    }
    Ok(())
}

pub static GETRUSAGE: SyscallHandler = SyscallHandler::post_only("getrusage", getrusage_post);

/// Offset below the stack pointer used as scratch space for the two
/// synthesized `timespec` records, inside the red zone the x86_64 ABI
/// guarantees a leaf function won't have its own data clobbered in.
const RED_ZONE_SCRATCH_OFFSET: u64 = 128;

fn utimensat_pre(ctx: &mut HookContext) -> Result<bool> {
    let times_addr = ctx.regs.arg(2);
    if times_addr != 0 {
        // Caller supplied explicit times; nothing to virtualize.
        return Ok(false);
    }
    let scratch = ctx.regs.sp() - RED_ZONE_SCRATCH_OFFSET;
    let ts = timespec {
        tv_sec: ctx.tracee.clock.get() as i64,
        tv_nsec: 0,
    };
    crate::memory::write_record(ctx.pid(), scratch, &ts)?;
    crate::memory::write_record(
        ctx.pid(),
        scratch + std::mem::size_of::<timespec>() as u64,
        &ts,
    )?;
    ctx.tracee.save_arg(2, times_addr);
    ctx.regs.set_arg(2, scratch);
    Ok(true)
}

fn utimensat_post(ctx: &mut HookContext) -> Result<()> {
    for (index, value) in ctx.tracee.take_saved_args() {
        ctx.regs.set_arg(index, value);
    }
    ctx.tracee.clock.tick();
    Ok(())
}

pub static UTIMENSAT: SyscallHandler = SyscallHandler::new("utimensat", utimensat_pre, utimensat_post);
