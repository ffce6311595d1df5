//! Per-tracee state. One record per live tracee, created when the
//! parent's fork/clone/vfork event is observed and destroyed only after
//! the tracee has been removed from the scheduler.

use std::cell::RefCell;
use std::rc::Rc;

use nix::unistd::Pid;

use crate::determinism::{InodeMap, LogicalClock};
use crate::syscalls::InFlightSyscall;

pub type InodeMapHandle = Rc<RefCell<InodeMap>>;

/// One per live tracee. The inode map is shared by reference across
/// every tracee in the same container: it's per-container state, so
/// the same real inode yields the same virtual inode to sibling
/// processes.
pub struct Tracee {
    pub pid: Pid,
    pub clock: LogicalClock,
    pub inodes: InodeMapHandle,
    /// Pre-rewrite values of every argument the pre-hook overwrote,
    /// restored by the post-hook before the tracee observes post-call
    /// state. Three slots: sufficient to restore rewritten arguments
    /// on post-hook for every handler in this tree.
    saved_args: [Option<(usize, u64)>; 3],
    /// Set before the pre-hook runs on a syscall-entry stop, cleared
    /// after the matching syscall-exit stop is consumed. `None` means
    /// the next stop for this tracee is a fresh entry; `Some` means
    /// it's the exit half of the call named in `InFlightSyscall`.
    pub in_flight: Option<InFlightSyscall>,
}

impl Tracee {
    /// A forked child starts with a fresh clock at 0 rather than
    /// inheriting the parent's: a child's observable time should
    /// depend only on its own syscall history. See DESIGN.md for the
    /// rationale behind resolving this as a reset rather than a copy.
    pub fn new(pid: Pid, inodes: InodeMapHandle) -> Tracee {
        Tracee {
            pid,
            clock: LogicalClock::new(),
            inodes,
            saved_args: [None, None, None],
            in_flight: None,
        }
    }

    /// Save the pre-rewrite value of argument `index` into the next
    /// free slot so the post-hook can restore it.
    pub fn save_arg(&mut self, index: usize, value: u64) {
        for slot in self.saved_args.iter_mut() {
            if slot.is_none() {
                *slot = Some((index, value));
                return;
            }
        }
        panic!("pid {}: more than three saved syscall arguments in flight", self.pid);
    }

    /// Drain every saved argument, in the order they were saved.
    pub fn take_saved_args(&mut self) -> Vec<(usize, u64)> {
        let mut out = Vec::new();
        for slot in self.saved_args.iter_mut() {
            if let Some(pair) = slot.take() {
                out.push(pair);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_args_restore_in_save_order() {
        let inodes: InodeMapHandle = Rc::new(RefCell::new(InodeMap::new()));
        let mut t = Tracee::new(Pid::from_raw(1234), inodes);
        t.save_arg(0, 0xdead);
        t.save_arg(2, 0xbeef);
        assert_eq!(t.take_saved_args(), vec![(0, 0xdead), (2, 0xbeef)]);
        assert_eq!(t.take_saved_args(), vec![]);
    }
}
