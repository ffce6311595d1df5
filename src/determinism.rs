//! The logical clock and the inode map. Both are container-private
//! state, not per-process, passed explicitly to handlers rather than
//! reached for through ambient/global storage.

use std::collections::HashMap;

/// A monotone, non-negative integer that substitutes for wall-clock
/// time everywhere a tracee can observe time. `tick()` is the only way
/// to advance it; `get()` never mutates it.
#[derive(Clone, Debug, Default)]
pub struct LogicalClock {
    value: u64,
}

impl LogicalClock {
    pub fn new() -> LogicalClock {
        LogicalClock { value: 0 }
    }

    pub fn get(&self) -> u64 {
        self.value
    }

    pub fn tick(&mut self) {
        self.value += 1;
    }
}

/// Stable, dense virtual inode numbers in place of real filesystem
/// inodes. Assignment is first-sight order, densely starting at
/// `BASE_VIRTUAL_INODE`. Shared by reference across every tracee in a
/// container so siblings observing the same real inode see the same
/// virtual one.
pub const BASE_VIRTUAL_INODE: u64 = 1;

#[derive(Clone, Debug, Default)]
pub struct InodeMap {
    real_to_virtual: HashMap<u64, u64>,
    next_virtual: u64,
}

impl InodeMap {
    pub fn new() -> InodeMap {
        InodeMap {
            real_to_virtual: HashMap::new(),
            next_virtual: BASE_VIRTUAL_INODE,
        }
    }

    /// Returns the virtual inode for `real`, assigning the next free
    /// one on first sight. Once assigned, a mapping never changes for
    /// the container's lifetime.
    pub fn lookup_or_assign(&mut self, real: u64) -> u64 {
        if let Some(&virt) = self.real_to_virtual.get(&real) {
            return virt;
        }
        let virt = self.next_virtual;
        self.next_virtual += 1;
        self.real_to_virtual.insert(real, virt);
        virt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_monotone_and_starts_at_zero() {
        let mut c = LogicalClock::new();
        assert_eq!(c.get(), 0);
        c.tick();
        c.tick();
        assert_eq!(c.get(), 2);
    }

    #[test]
    fn inode_map_is_injective_and_stable() {
        let mut m = InodeMap::new();
        let v1 = m.lookup_or_assign(100);
        let v2 = m.lookup_or_assign(200);
        let v1_again = m.lookup_or_assign(100);
        assert_eq!(v1, v1_again);
        assert_ne!(v1, v2);
        assert_eq!(v1, BASE_VIRTUAL_INODE);
        assert_eq!(v2, BASE_VIRTUAL_INODE + 1);
    }

    #[test]
    fn inode_map_assigns_in_first_sight_order() {
        let mut m = InodeMap::new();
        let order = [42u64, 7, 42, 99, 7];
        let assigned: Vec<u64> = order.iter().map(|&r| m.lookup_or_assign(r)).collect();
        assert_eq!(assigned, vec![1, 2, 1, 3, 2]);
    }
}
