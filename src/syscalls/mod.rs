//! The syscall dispatch table and the handler descriptors it
//! dispatches to.
//!
//! Virtual dispatch is unnecessary here: a handler is a value-typed
//! descriptor, a name plus two plain function pointers, rather than a
//! trait object.

pub mod dispatch;
pub mod identity;
pub mod inode;
pub mod nonblocking;
pub mod passthrough;
pub mod random;
pub mod reject;
pub mod resources;
pub mod time;

use crate::determinism::InodeMap;
use crate::error::Result;
use crate::registers::Registers;
use crate::scheduler::Scheduler;
use crate::tracee::Tracee;

use std::cell::RefCell;
use std::rc::Rc;

/// Everything a pre/post hook needs: the tracee's own state, its
/// current registers (mutate in place; the caller flushes them back to
/// the kernel after the hook returns), and the scheduler, which replay
/// hooks drive directly when a call would have blocked.
pub struct HookContext<'a> {
    pub tracee: &'a mut Tracee,
    pub regs: &'a mut Registers,
    pub scheduler: &'a mut Scheduler,
}

impl<'a> HookContext<'a> {
    pub fn pid(&self) -> nix::unistd::Pid {
        self.tracee.pid
    }

    pub fn inodes(&self) -> Rc<RefCell<InodeMap>> {
        self.tracee.inodes.clone()
    }
}

/// `pre` returns whether the post-hook should run when the matching
/// exit stop arrives. The exit stop itself always happens (ptrace's
/// syscall-tracing mode traps at both entry and exit unconditionally),
/// so `Ok(false)` doesn't skip that trap; it just means the exit stop
/// is consumed without invoking `post` or its side effects.
pub type PreHook = fn(&mut HookContext) -> Result<bool>;
pub type PostHook = fn(&mut HookContext) -> Result<()>;

/// Tracks a syscall between its entry and exit stop. Kept as a
/// dedicated type, rather than folding "in flight" and "wants post"
/// into the same `Option`, so the tracer can always tell an exit stop
/// from a fresh entry stop regardless of what the pre-hook asked for.
#[derive(Copy, Clone)]
pub struct InFlightSyscall {
    pub handler: &'static SyscallHandler,
    pub wants_post: bool,
}

fn noop_pre(_ctx: &mut HookContext) -> Result<bool> {
    Ok(false)
}

fn noop_post(_ctx: &mut HookContext) -> Result<()> {
    Ok(())
}

pub struct SyscallHandler {
    pub name: &'static str,
    pub pre: PreHook,
    pub post: PostHook,
}

impl SyscallHandler {
    pub const fn new(name: &'static str, pre: PreHook, post: PostHook) -> SyscallHandler {
        SyscallHandler { name, pre, post }
    }

    pub const fn pre_only(name: &'static str, pre: PreHook) -> SyscallHandler {
        SyscallHandler {
            name,
            pre,
            post: noop_post,
        }
    }

    pub const fn post_only(name: &'static str, post: PostHook) -> SyscallHandler {
        SyscallHandler {
            name,
            pre: default_pre_wants_post,
            post,
        }
    }
}

fn default_pre_wants_post(_ctx: &mut HookContext) -> Result<bool> {
    Ok(true)
}

/// Default handler for syscall numbers with no registered policy: logs
/// at pre-entry only, no post-call stop, no rewrite.
pub static PASSTHROUGH_DEFAULT: SyscallHandler = SyscallHandler {
    name: "<unhandled>",
    pre: passthrough::log_pre,
    post: noop_post,
};
