//! The FFS (file-frame space) pool: the bounded set of physical frames that
//! back user heap pages.
//!
//! Each slot tracks ownership and, once the owner installs a mapping, the
//! `(virtual page, page directory)` pair the replacement engine needs to
//! reach the PTE. A used slot without a mapping is *reserved*: just
//! allocated, or just reclaimed by an eviction, and owned by the code path
//! that is about to install it.

use crate::process::Pid;
use kernel_machine::layout::{ffs_frame_addr, ffs_index_of, FFS_FRAMES};
use kernel_machine::PhysMemory;
use kernel_memory_addresses::{PhysicalAddress, VirtualPage};

/// Metadata for one FFS frame.
#[derive(Clone, Debug, Default)]
pub struct FfsSlot {
    used: bool,
    owner: Option<Pid>,
    /// Mapped virtual page, once installed. Exactly one PTE references a
    /// frame at a time, so a single pair suffices (no shared mappings).
    mapped_page: Option<VirtualPage>,
    /// Page directory holding that PTE.
    directory: Option<PhysicalAddress>,
}

impl FfsSlot {
    #[inline]
    #[must_use]
    pub fn is_used(&self) -> bool {
        self.used
    }

    #[inline]
    #[must_use]
    pub fn owner(&self) -> Option<Pid> {
        self.owner
    }

    /// The live mapping, when this slot is evictable.
    #[inline]
    #[must_use]
    pub fn mapping(&self) -> Option<(VirtualPage, PhysicalAddress)> {
        match (self.used, self.mapped_page, self.directory) {
            (true, Some(page), Some(directory)) => Some((page, directory)),
            _ => None,
        }
    }
}

/// The pool itself: fixed-address frames indexed `0..FFS_FRAMES`.
pub struct FfsPool {
    slots: Vec<FfsSlot>,
    free: usize,
}

impl FfsPool {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: vec![FfsSlot::default(); FFS_FRAMES],
            free: FFS_FRAMES,
        }
    }

    /// First-fit allocation for `owner`.
    ///
    /// Marks the slot used, zeroes the frame and returns its fixed physical
    /// address. The frame stays in the reserved state until the caller
    /// installs a mapping via [`FfsPool::set_mapping`].
    pub fn allocate(&mut self, ram: &mut PhysMemory, owner: Pid) -> Option<PhysicalAddress> {
        if self.free == 0 {
            return None;
        }
        let index = self.slots.iter().position(|s| !s.used)?;
        self.slots[index] = FfsSlot {
            used: true,
            owner: Some(owner),
            mapped_page: None,
            directory: None,
        };
        self.free -= 1;
        let addr = ffs_frame_addr(index);
        ram.zero_frame(addr);
        Some(addr)
    }

    /// Free by address. Addresses outside the pool or already-free slots are
    /// ignored.
    pub fn release(&mut self, addr: PhysicalAddress) {
        let Some(index) = ffs_index_of(addr) else {
            return;
        };
        if self.slots[index].used {
            self.slots[index] = FfsSlot::default();
            self.free += 1;
        }
    }

    /// Record where the frame is mapped, making it visible to the
    /// replacement engine.
    pub fn set_mapping(&mut self, addr: PhysicalAddress, page: VirtualPage, directory: PhysicalAddress) {
        let index = ffs_index_of(addr).expect("mapping metadata for a non-FFS address");
        let slot = &mut self.slots[index];
        debug_assert!(slot.used, "mapping metadata for a free frame");
        slot.mapped_page = Some(page);
        slot.directory = Some(directory);
    }

    /// Drop the mapping metadata, returning the frame to the reserved state
    /// (the eviction path claims it afterwards).
    pub fn clear_mapping(&mut self, addr: PhysicalAddress) {
        if let Some(index) = ffs_index_of(addr) {
            self.slots[index].mapped_page = None;
            self.slots[index].directory = None;
        }
    }

    /// Transfer ownership of an already-used frame without touching the free
    /// count. Used when an evicted frame is handed straight to the faulting
    /// process.
    pub fn claim(&mut self, addr: PhysicalAddress, new_owner: Pid) {
        let index = ffs_index_of(addr).expect("claim of a non-FFS address");
        let slot = &mut self.slots[index];
        debug_assert!(slot.used, "claim of a free frame");
        slot.owner = Some(new_owner);
    }

    #[inline]
    #[must_use]
    pub fn slot(&self, index: usize) -> &FfsSlot {
        &self.slots[index]
    }

    #[inline]
    #[must_use]
    pub fn free_frames(&self) -> usize {
        self.free
    }

    #[inline]
    #[must_use]
    pub const fn total_frames(&self) -> usize {
        FFS_FRAMES
    }

    /// Frames currently owned by `pid` (reserved or mapped).
    #[must_use]
    pub fn frames_owned_by(&self, pid: Pid) -> usize {
        self.slots
            .iter()
            .filter(|s| s.used && s.owner == Some(pid))
            .count()
    }

    /// Release every frame owned by `pid`; returns how many were freed.
    pub fn release_owned(&mut self, pid: Pid) -> usize {
        let mut freed = 0;
        for slot in &mut self.slots {
            if slot.used && slot.owner == Some(pid) {
                *slot = FfsSlot::default();
                self.free += 1;
                freed += 1;
            }
        }
        freed
    }
}

impl Default for FfsPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_machine::layout::SWAP_BASE;

    #[test]
    fn allocation_is_first_fit_and_zeroing() {
        let mut ram = PhysMemory::new();
        let mut pool = FfsPool::new();

        let a = pool.allocate(&mut ram, Pid::SYSTEM).unwrap();
        assert_eq!(a, ffs_frame_addr(0));

        ram.write_byte(a + 7, 0xEE);
        pool.release(a);
        assert_eq!(pool.free_frames(), FFS_FRAMES);

        // The slot is reused and the stale byte wiped.
        let b = pool.allocate(&mut ram, Pid::SYSTEM).unwrap();
        assert_eq!(b, a);
        assert_eq!(ram.read_byte(b + 7), 0);
    }

    #[test]
    fn conservation_across_alloc_and_release() {
        let mut ram = PhysMemory::new();
        let mut pool = FfsPool::new();
        let pid = Pid::SYSTEM;

        let frames: Vec<_> = (0..10).map(|_| pool.allocate(&mut ram, pid).unwrap()).collect();
        assert_eq!(pool.free_frames() + pool.frames_owned_by(pid), FFS_FRAMES);
        for f in frames {
            pool.release(f);
        }
        assert_eq!(pool.free_frames(), FFS_FRAMES);
    }

    #[test]
    fn claim_transfers_without_freeing() {
        let mut ram = PhysMemory::new();
        let mut pool = FfsPool::new();
        let a = pool.allocate(&mut ram, Pid::SYSTEM).unwrap();
        let before = pool.free_frames();

        let other = {
            // Any distinct pid works; build one via the table in real code.
            use crate::process::ProcessTable;
            let mut t = ProcessTable::new();
            t.spawn("x", 1, crate::process::ProcessVm::new(a)).unwrap()
        };
        pool.claim(a, other);
        assert_eq!(pool.free_frames(), before);
        assert_eq!(pool.frames_owned_by(other), 1);
        assert_eq!(pool.frames_owned_by(Pid::SYSTEM), 0);
    }

    #[test]
    fn foreign_addresses_are_ignored_on_release() {
        let mut pool = FfsPool::new();
        pool.release(PhysicalAddress::new(SWAP_BASE));
        pool.release(PhysicalAddress::new(0));
        assert_eq!(pool.free_frames(), FFS_FRAMES);
    }
}
