//! Register surface used by the syscall handlers: six integer
//! arguments, return value, syscall number, instruction pointer.
//!
//! This container only ever targets x86_64 tracees, so `Registers`
//! wraps `libc::user_regs_struct` directly rather than carrying a
//! union of 32/64-bit register layouts.

use libc::user_regs_struct;
use nix::sys::ptrace;
use nix::unistd::Pid;

use crate::error::Error;

#[derive(Copy, Clone, Debug)]
pub struct Registers {
    regs: user_regs_struct,
}

impl Registers {
    pub fn read(pid: Pid) -> Result<Registers, Error> {
        let regs = ptrace::getregs(pid).map_err(|e| Error::TraceFacility {
            pid,
            operation: "PTRACE_GETREGS",
            detail: e.to_string(),
        })?;
        Ok(Registers { regs })
    }

    pub fn write(self, pid: Pid) -> Result<(), Error> {
        ptrace::setregs(pid, self.regs).map_err(|e| Error::TraceFacility {
            pid,
            operation: "PTRACE_SETREGS",
            detail: e.to_string(),
        })
    }

    /// The syscall number the kernel is about to execute (or just
    /// executed). Tracked in `orig_rax`, per the Linux x86_64 ABI.
    pub fn syscallno(&self) -> i64 {
        self.regs.orig_rax as i64
    }

    pub fn set_syscallno(&mut self, no: i64) {
        self.regs.orig_rax = no as u64;
    }

    pub fn syscall_result(&self) -> i64 {
        self.regs.rax as i64
    }

    pub fn set_return(&mut self, value: i64) {
        self.regs.rax = value as u64;
    }

    pub fn arg(&self, i: usize) -> u64 {
        match i {
            0 => self.regs.rdi,
            1 => self.regs.rsi,
            2 => self.regs.rdx,
            3 => self.regs.r10,
            4 => self.regs.r8,
            5 => self.regs.r9,
            _ => panic!("syscall argument index out of range: {}", i),
        }
    }

    pub fn set_arg(&mut self, i: usize, value: u64) {
        match i {
            0 => self.regs.rdi = value,
            1 => self.regs.rsi = value,
            2 => self.regs.rdx = value,
            3 => self.regs.r10 = value,
            4 => self.regs.r8 = value,
            5 => self.regs.r9 = value,
            _ => panic!("syscall argument index out of range: {}", i),
        }
    }

    pub fn ip(&self) -> u64 {
        self.regs.rip
    }

    pub fn set_ip(&mut self, value: u64) {
        self.regs.rip = value;
    }

    pub fn sp(&self) -> u64 {
        self.regs.rsp
    }
}
