//! The tracer loop. Owns the scheduler and the live `Tracee` table,
//! classifies every ptrace stop, dispatches syscall-entry/exit stops
//! through the dispatch table, and resumes exactly the one tracee the
//! scheduler currently names as next.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use nix::sys::ptrace::{self, Event, Options};
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;

use crate::determinism::InodeMap;
use crate::error::{Error, Result};
use crate::registers::Registers;
use crate::scheduler::Scheduler;
use crate::syscalls::{dispatch, HookContext, InFlightSyscall};
use crate::tracee::{InodeMapHandle, Tracee};

fn trace_options() -> Options {
    Options::PTRACE_O_TRACESYSGOOD
        | Options::PTRACE_O_TRACEFORK
        | Options::PTRACE_O_TRACEVFORK
        | Options::PTRACE_O_TRACECLONE
        | Options::PTRACE_O_TRACEEXEC
        | Options::PTRACE_O_TRACEEXIT
        | Options::PTRACE_O_EXITKILL
}

pub struct Tracer {
    scheduler: Scheduler,
    tracees: HashMap<Pid, Tracee>,
    inodes: InodeMapHandle,
    root_pid: Pid,
    root_exit_code: Option<i32>,
}

impl Tracer {
    /// `root_pid` has already been forked and has just called
    /// `PTRACE_TRACEME` followed by `execvp`; its first reported stop is
    /// the post-exec `SIGTRAP`.
    pub fn new(root_pid: Pid) -> Tracer {
        let inodes: InodeMapHandle = Rc::new(RefCell::new(InodeMap::new()));
        let mut tracees = HashMap::new();
        tracees.insert(root_pid, Tracee::new(root_pid, inodes.clone()));
        Tracer {
            scheduler: Scheduler::new(root_pid),
            tracees,
            inodes,
            root_pid,
            root_exit_code: None,
        }
    }

    /// Run until every tracee has exited, returning the root tracee's
    /// exit code: the container's own exit status mirrors the program
    /// it ran. On any fatal error, logs a structured record and kills
    /// every tracee still attached before returning the error.
    pub fn run(mut self) -> Result<i32> {
        match self.run_until_done() {
            Ok(code) => Ok(code),
            Err(e) => {
                log!(LogError, "fatal: {}", e);
                self.scheduler.kill_all();
                Err(e)
            }
        }
    }

    fn run_until_done(&mut self) -> Result<i32> {
        ptrace::setoptions(self.root_pid, trace_options()).map_err(|e| Error::TraceFacility {
            pid: self.root_pid,
            operation: "PTRACE_SETOPTIONS",
            detail: e.to_string(),
        })?;
        self.resume_scheduled()?;

        loop {
            let status = waitpid(None, None).map_err(|e| Error::TraceFacility {
                pid: self.root_pid,
                operation: "waitpid",
                detail: e.to_string(),
            })?;
            if self.handle_status(status)? {
                break;
            }
            self.resume_scheduled()?;
        }

        Ok(self.root_exit_code.unwrap_or(0))
    }

    /// Handle one `waitpid` result. Returns `true` once every tracee is
    /// gone and the loop should stop.
    fn handle_status(&mut self, status: WaitStatus) -> Result<bool> {
        match status {
            WaitStatus::Exited(pid, code) => {
                log!(LogInfo, "pid {}: exited with code {}", pid, code);
                if pid == self.root_pid {
                    self.root_exit_code = Some(code);
                }
                self.tracees.remove(&pid);
                Ok(self.scheduler.remove_and_schedule_next(pid)?)
            }
            WaitStatus::Signaled(pid, signal, _) => {
                log!(LogWarn, "pid {}: killed by signal {:?}", pid, signal);
                if pid == self.root_pid {
                    self.root_exit_code = Some(128 + signal as i32);
                }
                self.tracees.remove(&pid);
                Ok(self.scheduler.remove_and_schedule_next(pid)?)
            }
            WaitStatus::PtraceSyscall(pid) => {
                self.handle_syscall_stop(pid)?;
                Ok(false)
            }
            WaitStatus::PtraceEvent(pid, _signal, event) => {
                self.handle_ptrace_event(pid, event)?;
                Ok(false)
            }
            WaitStatus::Stopped(pid, signal) => {
                self.handle_signal_stop(pid, signal)?;
                Ok(false)
            }
            WaitStatus::Continued(_) | WaitStatus::StillAlive => Ok(false),
        }
    }

    fn tracee_mut(&mut self, pid: Pid) -> &mut Tracee {
        self.tracees
            .entry(pid)
            .or_insert_with(|| Tracee::new(pid, self.inodes.clone()))
    }

    /// A tracee set up for `PTRACE_SYSCALL` tracing always traps at both
    /// entry and exit, regardless of whether a handler's pre-hook wants
    /// the exit trap's result. `Tracee::in_flight` being `None` vs.
    /// `Some` is therefore the only thing that tells entry and exit
    /// stops apart here; whether `post` actually runs on the exit stop
    /// is a separate, independent bit (`InFlightSyscall::wants_post`).
    fn handle_syscall_stop(&mut self, pid: Pid) -> Result<()> {
        let mut regs = Registers::read(pid)?;
        let in_flight = self.tracee_mut(pid).in_flight;
        let wants_post = match in_flight {
            None => {
                let handler = dispatch::lookup(regs.syscallno());
                let tracee = self.tracee_mut(pid);
                // Set before calling `pre` so the handler (and anything
                // it logs, like the passthrough family) can see its own
                // name via `ctx.tracee.in_flight`.
                tracee.in_flight = Some(InFlightSyscall {
                    handler,
                    wants_post: false,
                });
                let mut ctx = HookContext {
                    tracee,
                    regs: &mut regs,
                    scheduler: &mut self.scheduler,
                };
                let wants_post = (handler.pre)(&mut ctx)?;
                ctx.tracee.in_flight = Some(InFlightSyscall {
                    handler,
                    wants_post,
                });
                wants_post
            }
            Some(in_flight) => {
                let tracee = self.tracee_mut(pid);
                if in_flight.wants_post {
                    let mut ctx = HookContext {
                        tracee,
                        regs: &mut regs,
                        scheduler: &mut self.scheduler,
                    };
                    (in_flight.handler.post)(&mut ctx)?;
                }
                tracee.in_flight = None;
                false
            }
        };
        regs.write(pid)?;
        log!(LogDebug, "pid {}: syscall stop (awaiting post = {})", pid, wants_post);
        Ok(())
    }

    fn handle_ptrace_event(&mut self, pid: Pid, event: i32) -> Result<()> {
        if event == Event::PTRACE_EVENT_FORK as i32
            || event == Event::PTRACE_EVENT_VFORK as i32
            || event == Event::PTRACE_EVENT_CLONE as i32
        {
            let child_raw = ptrace::getevent(pid).map_err(|e| Error::TraceFacility {
                pid,
                operation: "PTRACE_GETEVENTMSG",
                detail: e.to_string(),
            })?;
            let child = Pid::from_raw(child_raw as i32);
            log!(LogInfo, "pid {}: spawned child {}", pid, child);
            self.tracees
                .insert(child, Tracee::new(child, self.inodes.clone()));
            self.scheduler.add_and_schedule_next(child);
        } else if event == Event::PTRACE_EVENT_EXEC as i32 {
            log!(LogDebug, "pid {}: exec event", pid);
        } else if event == Event::PTRACE_EVENT_EXIT as i32 {
            log!(LogDebug, "pid {}: exit event", pid);
            self.scheduler.mark_finished_and_schedule_next(pid)?;
        }
        Ok(())
    }

    fn handle_signal_stop(&mut self, pid: Pid, signal: Signal) -> Result<()> {
        log!(LogDebug, "pid {}: signal-delivery stop {:?}", pid, signal);
        ptrace::syscall(pid, Some(signal)).map_err(|e| Error::TraceFacility {
            pid,
            operation: "PTRACE_SYSCALL (signal forward)",
            detail: e.to_string(),
        })
    }

    /// Resume exactly the scheduler's chosen pid, if any tracee remains.
    fn resume_scheduled(&mut self) -> Result<()> {
        let pid = match self.scheduler.get_next() {
            Ok(pid) => pid,
            Err(Error::Deadlock) if self.tracees.is_empty() => return Ok(()),
            Err(e) => return Err(e),
        };
        ptrace::syscall(pid, None).map_err(|e| Error::TraceFacility {
            pid,
            operation: "PTRACE_SYSCALL (resume)",
            detail: e.to_string(),
        })
    }
}
