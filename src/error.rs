//! The error taxonomy this container uses for all fatal conditions. Every
//! variant here is fatal: construction of an `Error` is always followed
//! by `Scheduler::kill_all` and process termination in `tracer`/`main`.
//! Tracee-reported errno values are never represented here — those are
//! either consumed locally by replay (would-have-blocked) or passed
//! through to the tracee unchanged.

use std::fmt;
use nix::unistd::Pid;

#[derive(Debug)]
pub enum Error {
    /// An `ioctl` request outside the allowed set, a non-zero-return
    /// `getpeername`, or a `prlimit64` targeting a PID other than 0 or
    /// self.
    UnsupportedSyscall {
        pid: Pid,
        syscall: &'static str,
        detail: String,
    },
    /// A register or memory operation against the trace facility
    /// failed.
    TraceFacility {
        pid: Pid,
        operation: &'static str,
        detail: String,
    },
    /// The two bytes preceding a replay target's instruction pointer
    /// were not a recognized syscall opcode.
    IpInconsistency { pid: Pid, bytes: [u8; 2] },
    /// No tracee could be made runnable after a full partition swap.
    Deadlock,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedSyscall {
                pid,
                syscall,
                detail,
            } => write!(
                f,
                "unsupported syscall: pid={} syscall={} {}",
                pid, syscall, detail
            ),
            Error::TraceFacility {
                pid,
                operation,
                detail,
            } => write!(
                f,
                "trace facility failure: pid={} op={} {}",
                pid, operation, detail
            ),
            Error::IpInconsistency { pid, bytes } => write!(
                f,
                "instruction pointer inconsistency: pid={} bytes={:#x?}",
                pid, bytes
            ),
            Error::Deadlock => write!(f, "scheduler deadlock: no tracee can be made runnable"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
