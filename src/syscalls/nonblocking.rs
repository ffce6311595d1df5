//! Non-blocking conversion + replay: `poll`, `wait4`, `read`, and `pipe`
//! are rewritten so they can never actually block the tracer, and a
//! call that would have blocked is replayed after the scheduler moves
//! on to another tracee.
//!
//! `nanosleep`/`clock_nanosleep` live here too, treated as zero-duration
//! no-ops rather than genuine blocking-and-replay, using the same
//! saved-arg scratch-write trick as `utimensat` in `time.rs`.

use libc::timespec;

use super::{HookContext, SyscallHandler};
use crate::error::{Error, Result};
use crate::scheduler::PreemptOption;

const OPCODE_INT80: [u8; 2] = [0xCD, 0x80];
const OPCODE_SYSCALL: [u8; 2] = [0x0F, 0x05];
const OPCODE_SYSENTER: [u8; 2] = [0x0F, 0x34];

/// Rewind the instruction pointer back over the two-byte syscall
/// instruction so the kernel re-enters it on resume, after checking
/// that those two bytes really are one of the recognized entry
/// sequences. Restores the syscall number into the return-value
/// register, since by this point the kernel has already overwritten it
/// with the (discarded) result of the non-blocking attempt.
fn rewind_for_replay(ctx: &mut HookContext) -> Result<()> {
    let ip = ctx.regs.ip();
    let bytes = crate::memory::read_bytes(ctx.pid(), ip - 2, 2)
        .map_err(|_| Error::IpInconsistency {
            pid: ctx.pid(),
            bytes: [0, 0],
        })?;
    let opcode = [bytes[0], bytes[1]];
    if opcode != OPCODE_INT80 && opcode != OPCODE_SYSCALL && opcode != OPCODE_SYSENTER {
        return Err(Error::IpInconsistency {
            pid: ctx.pid(),
            bytes: opcode,
        });
    }
    let syscallno = ctx.regs.syscallno();
    ctx.regs.set_ip(ip - 2);
    ctx.regs.set_return(syscallno);
    Ok(())
}

/// The call would have blocked: move this tracee to `blocked` and
/// rewind it for replay once it's runnable again.
fn block_and_replay(ctx: &mut HookContext) -> Result<()> {
    ctx.scheduler
        .preempt_and_schedule_next(PreemptOption::MarkBlocked)?;
    rewind_for_replay(ctx)
}

fn poll_pre(ctx: &mut HookContext) -> Result<bool> {
    ctx.tracee.save_arg(2, ctx.regs.arg(2));
    ctx.regs.set_arg(2, 0);
    Ok(true)
}

fn poll_post(ctx: &mut HookContext) -> Result<()> {
    for (index, value) in ctx.tracee.take_saved_args() {
        ctx.regs.set_arg(index, value);
    }
    if ctx.regs.syscall_result() == 0 {
        block_and_replay(ctx)?;
    }
    Ok(())
}

pub static POLL: SyscallHandler = SyscallHandler::new("poll", poll_pre, poll_post);

fn wait4_pre(ctx: &mut HookContext) -> Result<bool> {
    let options = ctx.regs.arg(2);
    ctx.tracee.save_arg(2, options);
    ctx.regs.set_arg(2, options | libc::WNOHANG as u64);
    Ok(true)
}

fn wait4_post(ctx: &mut HookContext) -> Result<()> {
    for (index, value) in ctx.tracee.take_saved_args() {
        ctx.regs.set_arg(index, value);
    }
    if ctx.regs.syscall_result() == 0 {
        block_and_replay(ctx)?;
    }
    Ok(())
}

pub static WAIT4: SyscallHandler = SyscallHandler::new("wait4", wait4_pre, wait4_post);

/// `read` relies on its file descriptor already being non-blocking
/// (every descriptor this container hands out comes from the `pipe`
/// conversion below), so there's no pre-hook rewrite: only the
/// would-have-blocked result needs handling.
fn read_post(ctx: &mut HookContext) -> Result<()> {
    if ctx.regs.syscall_result() == -(libc::EAGAIN as i64) {
        block_and_replay(ctx)?;
    }
    Ok(())
}

pub static READ: SyscallHandler = SyscallHandler::post_only("read", read_post);

fn pipe_pre(ctx: &mut HookContext) -> Result<bool> {
    ctx.regs.set_syscallno(libc::SYS_pipe2);
    ctx.regs.set_arg(1, libc::O_NONBLOCK as u64);
    Ok(false)
}

pub static PIPE: SyscallHandler = SyscallHandler::pre_only("pipe", pipe_pre);

/// Offset below the stack pointer used as scratch space for the zeroed
/// `timespec`, inside the x86_64 ABI red zone (mirrors `time.rs`'s
/// `utimensat` handling).
const RED_ZONE_SCRATCH_OFFSET: u64 = 128;

fn zero_duration_pre(ctx: &mut HookContext, arg_index: usize) -> Result<bool> {
    let original = ctx.regs.arg(arg_index);
    let scratch = ctx.regs.sp() - RED_ZONE_SCRATCH_OFFSET;
    let zero = timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    crate::memory::write_record(ctx.pid(), scratch, &zero)?;
    ctx.tracee.save_arg(arg_index, original);
    ctx.regs.set_arg(arg_index, scratch);
    Ok(true)
}

fn restore_saved_args_post(ctx: &mut HookContext) -> Result<()> {
    for (index, value) in ctx.tracee.take_saved_args() {
        ctx.regs.set_arg(index, value);
    }
    Ok(())
}

fn nanosleep_pre(ctx: &mut HookContext) -> Result<bool> {
    zero_duration_pre(ctx, 0)
}

pub static NANOSLEEP: SyscallHandler =
    SyscallHandler::new("nanosleep", nanosleep_pre, restore_saved_args_post);

fn clock_nanosleep_pre(ctx: &mut HookContext) -> Result<bool> {
    zero_duration_pre(ctx, 2)
}

pub static CLOCK_NANOSLEEP: SyscallHandler =
    SyscallHandler::new("clock_nanosleep", clock_nanosleep_pre, restore_saved_args_post);

#[cfg(test)]
mod tests {
    #[test]
    fn recognizes_all_three_entry_opcodes() {
        use super::{OPCODE_INT80, OPCODE_SYSCALL, OPCODE_SYSENTER};
        assert_eq!(OPCODE_INT80, [0xCD, 0x80]);
        assert_eq!(OPCODE_SYSCALL, [0x0F, 0x05]);
        assert_eq!(OPCODE_SYSENTER, [0x0F, 0x34]);
    }
}
