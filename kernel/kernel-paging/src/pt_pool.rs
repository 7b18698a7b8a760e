//! Page-directory/page-table frame pool.
//!
//! A page-aligned run of `MAX_PT_FRAMES` frames inside the kernel region.
//! Allocation bumps a cursor through never-used frames first and falls back
//! to scanning for freed slots; every frame is handed out zeroed. The pool
//! is dimensioned for the workloads the system runs, so running dry at boot
//! is fatal for the caller.

use kernel_machine::layout::{pt_frame_addr, pt_index_of, MAX_PT_FRAMES};
use kernel_machine::PhysMemory;
use kernel_memory_addresses::PhysicalAddress;

pub struct PtPool {
    /// Bump cursor: frames at indices `>= next` have never been handed out.
    next: usize,
    used: Vec<bool>,
    in_use: usize,
}

impl PtPool {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: 0,
            used: vec![false; MAX_PT_FRAMES],
            in_use: 0,
        }
    }

    /// Hand out the next frame, zeroed. `None` when the pool is exhausted.
    pub fn allocate(&mut self, ram: &mut PhysMemory) -> Option<PhysicalAddress> {
        let index = if self.next < MAX_PT_FRAMES {
            let i = self.next;
            self.next += 1;
            i
        } else {
            self.used.iter().position(|u| !u)?
        };
        self.used[index] = true;
        self.in_use += 1;
        let addr = pt_frame_addr(index);
        ram.zero_frame(addr);
        Some(addr)
    }

    /// Return a frame to the pool. Addresses outside the pool are ignored.
    pub fn release(&mut self, addr: PhysicalAddress) {
        let Some(index) = pt_index_of(addr) else {
            return;
        };
        if self.used[index] {
            self.used[index] = false;
            self.in_use -= 1;
        }
    }

    #[inline]
    #[must_use]
    pub fn free_frames(&self) -> usize {
        MAX_PT_FRAMES - self.in_use
    }
}

impl Default for PtPool {
    fn default() -> Self {
        Self::new()
    }
}
