//! Deterministic randomness: `getrandom` fills the caller's buffer with
//! `i mod 256` for byte index `i`, rather than anything entropic.

use super::{HookContext, SyscallHandler};
use crate::error::Result;

fn getrandom_post(ctx: &mut HookContext) -> Result<()> {
    let n = ctx.regs.syscall_result();
    if n <= 0 {
        return Ok(());
    }
    let n = n as usize;
    let buf: Vec<u8> = (0..n).map(|i| (i % 256) as u8).collect();
    let addr = ctx.regs.arg(0);
    crate::memory::write_bytes(ctx.pid(), addr, &buf)
}

pub static GETRANDOM: SyscallHandler = SyscallHandler::post_only("getrandom", getrandom_post);

#[cfg(test)]
mod tests {
    #[test]
    fn sequence_wraps_at_256() {
        let buf: Vec<u8> = (0..300).map(|i| (i % 256) as u8).collect();
        assert_eq!(buf[0], 0);
        assert_eq!(buf[255], 255);
        assert_eq!(buf[256], 0);
        assert_eq!(buf[299], 43);
    }
}
