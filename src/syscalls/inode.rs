//! Inode virtualization: `stat`/`lstat`/`fstat`/`newfstatat` report a
//! stable per-container virtual inode number instead of the host's real
//! one, and scrub every timestamp field and the host-specific device
//! and link-count fields.

use libc::stat;

use super::{HookContext, SyscallHandler};
use crate::error::Result;

fn virtualize(ctx: &mut HookContext, addr: u64) -> Result<()> {
    let mut st: stat = crate::memory::read_record(ctx.pid(), addr)?;
    let virt = ctx.inodes().borrow_mut().lookup_or_assign(st.st_ino);
    st.st_ino = virt;
    st.st_dev = 1;
    st.st_rdev = 1;
    st.st_nlink = 1;
    st.st_blksize = 512;
    st.st_blocks = 1;
    st.st_atime = 0;
    st.st_atime_nsec = 0;
    st.st_mtime = 0;
    st.st_mtime_nsec = 0;
    st.st_ctime = 0;
    st.st_ctime_nsec = 0;
    // st_mode and st_size carry real, observable file shape through
    // unchanged.
    crate::memory::write_record(ctx.pid(), addr, &st)
}

fn stat_post(ctx: &mut HookContext) -> Result<()> {
    if ctx.regs.syscall_result() == 0 {
        let addr = ctx.regs.arg(1);
        virtualize(ctx, addr)?;
    }
    Ok(())
}

fn newfstatat_post(ctx: &mut HookContext) -> Result<()> {
    if ctx.regs.syscall_result() == 0 {
        let addr = ctx.regs.arg(2);
        virtualize(ctx, addr)?;
    }
    Ok(())
}

pub static STAT: SyscallHandler = SyscallHandler::post_only("stat", stat_post);
pub static LSTAT: SyscallHandler = SyscallHandler::post_only("lstat", stat_post);
pub static FSTAT: SyscallHandler = SyscallHandler::post_only("fstat", stat_post);
pub static NEWFSTATAT: SyscallHandler = SyscallHandler::post_only("newfstatat", newfstatat_post);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::determinism::InodeMap;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn same_real_inode_yields_same_virtual_inode() {
        let map = Rc::new(RefCell::new(InodeMap::new()));
        let a = map.borrow_mut().lookup_or_assign(0xdead);
        let b = map.borrow_mut().lookup_or_assign(0xdead);
        assert_eq!(a, b);
    }
}
