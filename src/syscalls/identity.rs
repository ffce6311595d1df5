//! Canonical kernel identity: `uname` always reports the same
//! fixed Linux identity, regardless of the host kernel actually running
//! the container.

use libc::utsname;

use super::{HookContext, SyscallHandler};
use crate::error::Result;

fn set_field(field: &mut [i8], value: &str) {
    for b in field.iter_mut() {
        *b = 0;
    }
    for (slot, byte) in field.iter_mut().zip(value.as_bytes()) {
        *slot = *byte as i8;
    }
}

fn uname_post(ctx: &mut HookContext) -> Result<()> {
    if ctx.regs.syscall_result() != 0 {
        return Ok(());
    }
    let mut u: utsname = unsafe { std::mem::zeroed() };
    set_field(&mut u.sysname, "Linux");
    set_field(&mut u.release, "4.0");
    set_field(&mut u.version, "#1");
    set_field(&mut u.machine, "x86_64");
    // nodename and domainname are left zeroed.
    let addr = ctx.regs.arg(0);
    crate::memory::write_record(ctx.pid(), addr, &u)
}

pub static UNAME: SyscallHandler = SyscallHandler::post_only("uname", uname_post);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_field_zero_pads_and_truncates_naturally() {
        let mut field = [1i8; 65];
        set_field(&mut field, "Linux");
        assert_eq!(field[0] as u8 as char, 'L');
        assert_eq!(field[5], 0);
        assert!(field[10..].iter().all(|&b| b == 0));
    }
}
