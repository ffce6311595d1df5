//! Tracee-memory I/O. Reads and writes arbitrary byte ranges,
//! nul-terminated strings, and fixed-layout records in the traced
//! address space, plus the register accessors that ride alongside it.
//!
//! Small transfers go through `PTRACE_PEEKDATA`/`PTRACE_POKEDATA`;
//! anything larger than a machine word uses `process_vm_readv`/
//! `process_vm_writev` rather than looping one word at a time.

use std::mem::size_of;

use nix::sys::ptrace;
use nix::sys::uio::{process_vm_readv, process_vm_writev, IoVec, RemoteIoVec};
use nix::unistd::Pid;

use crate::error::Error;

const WORD: usize = size_of::<u64>();

fn fatal(pid: Pid, operation: &'static str, detail: impl std::fmt::Display) -> Error {
    Error::TraceFacility {
        pid,
        operation,
        detail: detail.to_string(),
    }
}

/// Read `len` bytes from `addr` in `pid`'s address space.
pub fn read_bytes(pid: Pid, addr: u64, len: usize) -> Result<Vec<u8>, Error> {
    if len == 0 {
        return Ok(Vec::new());
    }
    if len <= WORD {
        let word = ptrace::read(pid, addr as ptrace::AddressType)
            .map_err(|e| fatal(pid, "PTRACE_PEEKDATA", e))?;
        let bytes = word.to_ne_bytes();
        return Ok(bytes[..len].to_vec());
    }
    let mut buf = vec![0u8; len];
    let remote = [RemoteIoVec {
        base: addr as usize,
        len,
    }];
    let local = [IoVec::from_mut_slice(buf.as_mut_slice())];
    let n = process_vm_readv(pid, &local, &remote).map_err(|e| fatal(pid, "process_vm_readv", e))?;
    if n != len {
        return Err(fatal(
            pid,
            "process_vm_readv",
            format!("short read: wanted {} got {}", len, n),
        ));
    }
    Ok(buf)
}

/// Write `buf` to `addr` in `pid`'s address space.
pub fn write_bytes(pid: Pid, addr: u64, buf: &[u8]) -> Result<(), Error> {
    if buf.is_empty() {
        return Ok(());
    }
    if buf.len() <= WORD {
        let mut word_bytes = if buf.len() < WORD {
            let existing = ptrace::read(pid, addr as ptrace::AddressType)
                .map_err(|e| fatal(pid, "PTRACE_PEEKDATA", e))?;
            existing.to_ne_bytes()
        } else {
            [0u8; WORD]
        };
        word_bytes[..buf.len()].copy_from_slice(buf);
        let word = i64::from_ne_bytes(word_bytes);
        unsafe {
            ptrace::write(pid, addr as ptrace::AddressType, word as *mut std::ffi::c_void)
                .map_err(|e| fatal(pid, "PTRACE_POKEDATA", e))?;
        }
        return Ok(());
    }
    let remote = [RemoteIoVec {
        base: addr as usize,
        len: buf.len(),
    }];
    let local = [IoVec::from_slice(buf)];
    let n =
        process_vm_writev(pid, &local, &remote).map_err(|e| fatal(pid, "process_vm_writev", e))?;
    if n != buf.len() {
        return Err(fatal(
            pid,
            "process_vm_writev",
            format!("short write: wanted {} wrote {}", buf.len(), n),
        ));
    }
    Ok(())
}

/// Read a nul-terminated byte string starting at `addr`, not including
/// the terminator. Reads one word at a time so it never over-reads past
/// the mapped region looking for the terminator.
pub fn read_string(pid: Pid, addr: u64) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    let mut cursor = addr;
    'outer: loop {
        let word = ptrace::read(pid, cursor as ptrace::AddressType)
            .map_err(|e| fatal(pid, "PTRACE_PEEKDATA", e))?;
        let bytes = word.to_ne_bytes();
        for &b in bytes.iter() {
            if b == 0 {
                break 'outer;
            }
            out.push(b);
        }
        cursor += WORD as u64;
    }
    Ok(out)
}

/// Typed read of a fixed-layout record (`libc::stat`, `libc::statfs`,
/// `libc::rlimit`, `libc::timespec`, `libc::timeval`, `libc::rusage`,
/// `libc::sysinfo`, `libc::utsname`, ...).
pub fn read_record<T: Copy>(pid: Pid, addr: u64) -> Result<T, Error> {
    let bytes = read_bytes(pid, addr, size_of::<T>())?;
    Ok(unsafe { std::ptr::read_unaligned(bytes.as_ptr() as *const T) })
}

/// Typed write of a fixed-layout record.
pub fn write_record<T: Copy>(pid: Pid, addr: u64, value: &T) -> Result<(), Error> {
    let bytes = unsafe {
        std::slice::from_raw_parts(value as *const T as *const u8, size_of::<T>())
    };
    write_bytes(pid, addr, bytes)
}

#[cfg(test)]
mod tests {
    // Exercising these functions requires a live tracee; see the
    // `nonblocking`/`random` handler tests for coverage that stands in
    // for this without forking a real process.
}
