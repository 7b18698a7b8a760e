//! Swap-slot accounting.
//!
//! The swap area is a run of 4 KiB slots at fixed physical addresses; this
//! pool only tracks the used bits. Allocation returns a slot *index* (that
//! is what the swapped PTE encoding stores), never a physical address.

use crate::process::Pid;
use kernel_machine::layout::SWAP_FRAMES;

#[derive(Clone, Debug, Default)]
struct SwapSlot {
    used: bool,
    owner: Option<Pid>,
    /// FFS frame the contents came from. Informational only.
    origin: Option<usize>,
}

pub struct SwapPool {
    slots: Vec<SwapSlot>,
    free: usize,
}

impl SwapPool {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: vec![SwapSlot::default(); SWAP_FRAMES],
            free: SWAP_FRAMES,
        }
    }

    /// First-fit slot allocation. `None` when the area is full — the caller
    /// treats that as an invariant violation, not a recoverable error.
    pub fn allocate(&mut self, owner: Pid, origin_ffs_index: usize) -> Option<u32> {
        if self.free == 0 {
            return None;
        }
        let index = self.slots.iter().position(|s| !s.used)?;
        self.slots[index] = SwapSlot {
            used: true,
            owner: Some(owner),
            origin: Some(origin_ffs_index),
        };
        self.free -= 1;
        Some(index as u32)
    }

    /// Clear a slot. Already-free or out-of-range indices are ignored.
    pub fn release(&mut self, index: u32) {
        let Some(slot) = self.slots.get_mut(index as usize) else {
            return;
        };
        if slot.used {
            *slot = SwapSlot::default();
            self.free += 1;
        }
    }

    #[inline]
    #[must_use]
    pub fn free_slots(&self) -> usize {
        self.free
    }

    #[inline]
    #[must_use]
    pub const fn total_slots(&self) -> usize {
        SWAP_FRAMES
    }

    /// Slots currently owned by `pid`.
    #[must_use]
    pub fn slots_owned_by(&self, pid: Pid) -> usize {
        self.slots
            .iter()
            .filter(|s| s.used && s.owner == Some(pid))
            .count()
    }

    /// Release every slot owned by `pid`; returns how many were freed.
    pub fn release_owned(&mut self, pid: Pid) -> usize {
        let mut freed = 0;
        for slot in &mut self.slots {
            if slot.used && slot.owner == Some(pid) {
                *slot = SwapSlot::default();
                self.free += 1;
                freed += 1;
            }
        }
        freed
    }
}

impl Default for SwapPool {
    fn default() -> Self {
        Self::new()
    }
}
