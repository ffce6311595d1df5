//! The deterministic cooperative scheduler.
//!
//! Two max-priority partitions over tracee PIDs, `runnable` and
//! `blocked`. Priority key is the PID itself: on Linux, a forked
//! child's PID is strictly larger than its parent's for the lifetime
//! of a container run (PID wrap is assumed not to occur within one
//! run), so running the highest PID first drains a child subtree
//! before returning to its parent, a deterministic depth-first
//! interleaving.

use std::collections::BinaryHeap;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use crate::error::Error;

/// Options for a process being preempted off the top of `runnable`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PreemptOption {
    /// Rotate it back into `runnable` — it's still able to make
    /// progress, just not chosen this round.
    Runnable,
    /// Move it into `blocked` — its syscall would have blocked.
    MarkBlocked,
}

/// A max-heap over PIDs. `nix::unistd::Pid` doesn't implement `Ord`, so
/// this stores the raw `pid_t` and converts at the edges.
#[derive(Default)]
struct PidHeap {
    heap: BinaryHeap<i32>,
}

impl PidHeap {
    fn push(&mut self, pid: Pid) {
        self.heap.push(pid.as_raw());
    }

    fn pop(&mut self) -> Option<Pid> {
        self.heap.pop().map(Pid::from_raw)
    }

    fn peek(&self) -> Option<Pid> {
        self.heap.peek().copied().map(Pid::from_raw)
    }

    fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    fn remove(&mut self, pid: Pid) -> bool {
        let raw = pid.as_raw();
        if !self.heap.iter().any(|&p| p == raw) {
            return false;
        }
        let mut rebuilt: Vec<i32> = self.heap.drain().collect();
        rebuilt.retain(|&p| p != raw);
        self.heap = rebuilt.into_iter().collect();
        true
    }

    fn drain_all(&mut self) -> Vec<Pid> {
        self.heap.drain().map(Pid::from_raw).collect()
    }
}

pub struct Scheduler {
    runnable: PidHeap,
    blocked: PidHeap,
    next: Option<Pid>,
    /// Diagnostic counter: how many times `schedule_next_process` ran.
    pub calls_to_schedule_next_process: u32,
    /// Whether anything transitioned blocked -> runnable, or was newly
    /// added, since the last partition swap. Used for deadlock
    /// detection: if a swap happens and this is still false by the time
    /// the *next* swap would be needed, nothing made progress across a
    /// full sweep.
    progress_since_last_swap: bool,
}

impl Scheduler {
    pub fn new(starting_pid: Pid) -> Scheduler {
        let mut s = Scheduler {
            runnable: PidHeap::default(),
            blocked: PidHeap::default(),
            next: None,
            calls_to_schedule_next_process: 0,
            progress_since_last_swap: true,
        };
        s.runnable.push(starting_pid);
        s.next = Some(starting_pid);
        s
    }

    /// Read-only peek at the next PID to resume. Fails if both
    /// partitions are empty.
    pub fn get_next(&self) -> Result<Pid, Error> {
        self.next.ok_or(Error::Deadlock)
    }

    /// Insert `pid` into `runnable` and schedule it next.
    pub fn add_and_schedule_next(&mut self, pid: Pid) {
        log!(LogDebug, "scheduler: adding pid {}", pid);
        self.runnable.push(pid);
        self.progress_since_last_swap = true;
        self.next = Some(pid);
    }

    /// The process reached syscall-level exit. It can never be resumed
    /// again (the kernel won't deliver further trace stops for it
    /// until its own children are reaped), so it comes off the
    /// runnable heap here; its `Tracee` record, however, stays alive at
    /// the tracer level until the real ptrace exit event arrives for
    /// it, which may not happen until its own children have finished.
    /// That later event is handled by `remove_and_schedule_next`, which
    /// tolerates the pid already being gone from both partitions.
    ///
    /// Returns `None`, rather than a deadlock error, when `pid` had no
    /// pending children and nothing else is left to schedule — that's
    /// ordinary single-tracee completion, not a stuck scheduler.
    pub fn mark_finished_and_schedule_next(&mut self, pid: Pid) -> Result<Option<Pid>, Error> {
        log!(LogDebug, "scheduler: pid {} finished (children pending)", pid);
        ed_assert!(
            self.runnable.peek() == Some(pid),
            "mark_finished_and_schedule_next({}) called but it isn't the running pid",
            pid
        );
        self.runnable.pop();
        // A process finishing is forward progress: a sibling blocked on
        // this one (e.g. a parent's `wait4`, or a reader waiting on data
        // this process just wrote) may now be able to make progress on
        // the next partition swap.
        self.progress_since_last_swap = true;
        if self.runnable.is_empty() && self.blocked.is_empty() {
            self.next = None;
            return Ok(None);
        }
        self.schedule_next_process().map(Some)
    }

    /// Take the currently running PID off the top of `runnable` and
    /// either rotate it back in or move it to `blocked`, then schedule
    /// the next PID.
    pub fn preempt_and_schedule_next(&mut self, option: PreemptOption) -> Result<Pid, Error> {
        let pid = self
            .runnable
            .pop()
            .expect("preempt_and_schedule_next called with an empty runnable partition");
        match option {
            PreemptOption::Runnable => {
                log!(LogDebug, "scheduler: rotating pid {} within runnable", pid);
                self.runnable.push(pid);
            }
            PreemptOption::MarkBlocked => {
                log!(LogDebug, "scheduler: marking pid {} blocked", pid);
                self.blocked.push(pid);
            }
        }
        self.schedule_next_process()
    }

    /// Remove `pid` from whichever partition holds it, if any (expected
    /// to be the top of `runnable` or `blocked` in the common path —
    /// see `remove_not_top` for the rare non-top case). A pid that
    /// already went through `mark_finished_and_schedule_next` is no
    /// longer in either partition by the time its real ptrace exit
    /// event arrives here; that's expected, not an error. Returns
    /// `done = true` if both partitions are empty afterward, signaling
    /// the tracer loop should terminate.
    pub fn remove_and_schedule_next(&mut self, pid: Pid) -> Result<bool, Error> {
        log!(LogDebug, "scheduler: removing pid {}", pid);
        if self.runnable.peek() == Some(pid) {
            self.runnable.pop();
        } else if self.blocked.peek() == Some(pid) {
            self.blocked.pop();
        } else if !self.runnable.remove(pid) {
            self.blocked.remove(pid);
        }
        // A tracee's real ptrace exit is forward progress for the same
        // reason a `mark_finished` is: whatever it was doing right
        // before exiting (e.g. writing data a sibling's replay is
        // waiting on) may have just unblocked that sibling.
        self.progress_since_last_swap = true;
        if self.runnable.is_empty() && self.blocked.is_empty() {
            self.next = None;
            return Ok(true);
        }
        self.schedule_next_process()?;
        Ok(false)
    }

    /// Remove a process that isn't at the top of either heap — used
    /// when a group-kill takes out a non-current tracee.
    pub fn remove_not_top(&mut self, pid: Pid) {
        log!(LogDebug, "scheduler: removing non-top pid {}", pid);
        if !self.runnable.remove(pid) {
            self.blocked.remove(pid);
        }
    }

    /// Terminate every PID held in either partition with SIGKILL, used
    /// during teardown on fatal error.
    pub fn kill_all(&mut self) {
        for pid in self
            .runnable
            .drain_all()
            .into_iter()
            .chain(self.blocked.drain_all())
        {
            log!(LogWarn, "scheduler: killing pid {}", pid);
            let _ = signal::kill(pid, Signal::SIGKILL);
        }
        self.next = None;
    }

    /// Select the next PID to run. If `runnable` is empty, swap the
    /// partitions (processes that were blocked get a fresh chance).
    /// If the heaps are swapped and nothing transitioned
    /// blocked->runnable or was newly added since the previous swap,
    /// no tracee can ever become runnable again: deadlock.
    fn schedule_next_process(&mut self) -> Result<Pid, Error> {
        self.calls_to_schedule_next_process += 1;
        if self.runnable.is_empty() {
            if !self.progress_since_last_swap {
                return Err(Error::Deadlock);
            }
            log!(LogDebug, "scheduler: runnable empty, swapping partitions");
            std::mem::swap(&mut self.runnable, &mut self.blocked);
            self.progress_since_last_swap = false;
            if self.runnable.is_empty() {
                return Err(Error::Deadlock);
            }
        }
        let pid = self.runnable.peek().expect("just checked non-empty");
        self.next = Some(pid);
        Ok(pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: i32) -> Pid {
        Pid::from_raw(raw)
    }

    #[test]
    fn highest_pid_runs_first() {
        // PIDs only grow within a container run, so a fresh child's
        // pid is always the new maximum; `add_and_schedule_next`
        // selecting it directly and the heap's own max-priority
        // ordering therefore agree that it runs first.
        let mut s = Scheduler::new(p(10));
        s.add_and_schedule_next(p(20));
        assert_eq!(s.get_next().unwrap(), p(20));
        // Blocking the child surfaces the older, lower-pid sibling.
        let next = s.preempt_and_schedule_next(PreemptOption::MarkBlocked).unwrap();
        assert_eq!(next, p(10));
    }

    #[test]
    fn preempt_runnable_reselects_the_same_top_pid() {
        // Rotating the current top back into `runnable` without
        // blocking it is a no-op over the heap's max: nothing else
        // outranks it, so it's chosen again.
        let mut s = Scheduler::new(p(10));
        s.add_and_schedule_next(p(20));
        let next = s.preempt_and_schedule_next(PreemptOption::Runnable).unwrap();
        assert_eq!(next, p(20));
    }

    #[test]
    fn blocked_processes_run_after_partition_swap() {
        let mut s = Scheduler::new(p(10));
        s.add_and_schedule_next(p(20));
        // Block 20, leaving 10 runnable.
        let next = s.preempt_and_schedule_next(PreemptOption::MarkBlocked).unwrap();
        assert_eq!(next, p(10));
        // Finish 10: runnable empties, swap brings blocked (20) back.
        let done = s.remove_and_schedule_next(p(10)).unwrap();
        assert!(!done);
        assert_eq!(s.get_next().unwrap(), p(20));
    }

    #[test]
    fn removing_the_last_pid_reports_done() {
        let mut s = Scheduler::new(p(10));
        let done = s.remove_and_schedule_next(p(10)).unwrap();
        assert!(done);
    }

    #[test]
    fn deadlock_detected_when_nothing_can_progress() {
        let mut s = Scheduler::new(p(10));
        // First block-and-swap succeeds: blocked {10} becomes runnable.
        let next = s.preempt_and_schedule_next(PreemptOption::MarkBlocked).unwrap();
        assert_eq!(next, p(10));
        // Nothing new was added and nothing unblocked between swaps, so
        // blocking the sole tracee again must report deadlock rather
        // than swap forever.
        let result = s.preempt_and_schedule_next(PreemptOption::MarkBlocked);
        assert!(matches!(result, Err(Error::Deadlock)));
    }

    #[test]
    fn finishing_a_process_counts_as_progress() {
        // Three runnable siblings: A(30), B(20), C(10). A re-blocks,
        // B finishes (producing the data A was waiting on) rather than
        // re-blocking, then C re-blocks too. Runnable empties, but B's
        // completion is genuine forward progress for A, so this must
        // swap and resume rather than report a false deadlock.
        let mut s = Scheduler::new(p(10));
        s.add_and_schedule_next(p(20));
        s.add_and_schedule_next(p(30));
        let next = s.preempt_and_schedule_next(PreemptOption::MarkBlocked).unwrap();
        assert_eq!(next, p(20));
        let next = s.mark_finished_and_schedule_next(p(20)).unwrap();
        assert_eq!(next, Some(p(10)));
        let next = s.preempt_and_schedule_next(PreemptOption::MarkBlocked).unwrap();
        assert_eq!(next, p(30));
    }

    #[test]
    fn remove_not_top_scans_the_partition() {
        // PIDs only ever grow across a container run, so a freshly
        // added pid is always the new heap maximum; exercise
        // `remove_not_top` against an older sibling instead.
        let mut s = Scheduler::new(p(10));
        s.add_and_schedule_next(p(20));
        s.add_and_schedule_next(p(30));
        // runnable top is 30; remove 20, a non-top sibling.
        s.remove_not_top(p(20));
        assert_eq!(s.get_next().unwrap(), p(30));
    }

    #[test]
    fn mark_finished_then_remove_is_idempotent() {
        // Child (20) is scheduled ahead of its parent by the DFS
        // discipline and finishes first, while the parent (10) is
        // still live underneath it in runnable. The child's pid comes
        // off the heap immediately at mark_finished time, and its
        // later real ptrace-exit removal is a harmless no-op.
        let mut s = Scheduler::new(p(10));
        s.add_and_schedule_next(p(20));
        assert_eq!(s.get_next().unwrap(), p(20));
        let next = s.mark_finished_and_schedule_next(p(20)).unwrap();
        assert_eq!(next, Some(p(10)));
        let done = s.remove_and_schedule_next(p(20)).unwrap();
        assert!(!done);
        assert_eq!(s.get_next().unwrap(), p(10));
        let done = s.remove_and_schedule_next(p(10)).unwrap();
        assert!(done);
    }

    #[test]
    fn mark_finished_with_no_children_reports_no_next() {
        let mut s = Scheduler::new(p(10));
        let next = s.mark_finished_and_schedule_next(p(10)).unwrap();
        assert_eq!(next, None);
    }
}
