//! Physical and virtual memory map.
//!
//! The physical address space is partitioned into fixed, disjoint ranges; a
//! frame address uniquely determines its pool and index:
//!
//! ```text
//! 0x0000_0000 ┌────────────────────────────┐
//!             │ kernel image + heap        │ 32 MiB, identity-mapped
//! 0x01C0_0000 │  ├ PT/PD frame pool        │ 4 MiB (1024 frames)
//! 0x0200_0000 ├────────────────────────────┤
//!             │ FFS frame pool             │ 64 MiB (16384 frames)
//! 0x0600_0000 ├────────────────────────────┤
//!             │ swap area                  │ 128 MiB (32768 slots)
//! 0x0E00_0000 └────────────────────────────┘
//! ```
//!
//! Every user page directory additionally maps the per-process virtual heap
//! at `[0x1000_0000, 0x2000_0000)`.

use kernel_memory_addresses::{PhysicalAddress, VirtualAddress, PAGE_SIZE};

/// Top of the kernel identity region (exclusive).
pub const KERNEL_SPAN: u32 = 32 * 1024 * 1024;

/// Pages occupied by the kernel image region; charged to every process in
/// the virtual-page accounting.
pub const KERNEL_IMAGE_PAGES: u32 = KERNEL_SPAN / PAGE_SIZE;

/// Base of the page-directory/page-table frame pool (inside the kernel
/// region, so tables are reachable through the identity map).
pub const PT_POOL_BASE: u32 = KERNEL_SPAN - (MAX_PT_FRAMES as u32) * PAGE_SIZE;

/// Size of the PT/PD pool, in frames.
pub const MAX_PT_FRAMES: usize = 1024;

/// Base of the FFS (file-frame space) pool.
pub const FFS_BASE: u32 = KERNEL_SPAN;

/// Size of the FFS pool, in frames.
pub const FFS_FRAMES: usize = 16 * 1024;

/// Base of the swap area.
pub const SWAP_BASE: u32 = FFS_BASE + (FFS_FRAMES as u32) * PAGE_SIZE;

/// Size of the swap area, in slots.
pub const SWAP_FRAMES: usize = 32 * 1024;

/// End of physical memory; the kernel directory identity-maps all of it.
pub const PHYS_END: u32 = SWAP_BASE + (SWAP_FRAMES as u32) * PAGE_SIZE;

/// First byte of the per-process virtual heap.
pub const VHEAP_START: u32 = 0x1000_0000;

/// Last byte of the per-process virtual heap (inclusive, as in the region
/// seed `size = VHEAP_END - VHEAP_START + 1`).
pub const VHEAP_END: u32 = 0x1FFF_FFFF;

/// Pages in the virtual heap.
pub const VHEAP_PAGES: u32 = (VHEAP_END - VHEAP_START + 1) / PAGE_SIZE;

/// Physical address of FFS frame `index`.
#[inline]
#[must_use]
pub const fn ffs_frame_addr(index: usize) -> PhysicalAddress {
    PhysicalAddress::new(FFS_BASE + (index as u32) * PAGE_SIZE)
}

/// FFS index of `addr`, if it lies in the FFS range.
#[inline]
#[must_use]
pub const fn ffs_index_of(addr: PhysicalAddress) -> Option<usize> {
    let a = addr.as_u32();
    if a >= FFS_BASE && a < SWAP_BASE {
        Some(((a - FFS_BASE) / PAGE_SIZE) as usize)
    } else {
        None
    }
}

/// Physical address of swap slot `index`.
#[inline]
#[must_use]
pub const fn swap_slot_addr(index: usize) -> PhysicalAddress {
    PhysicalAddress::new(SWAP_BASE + (index as u32) * PAGE_SIZE)
}

/// Physical address of PT-pool frame `index`.
#[inline]
#[must_use]
pub const fn pt_frame_addr(index: usize) -> PhysicalAddress {
    PhysicalAddress::new(PT_POOL_BASE + (index as u32) * PAGE_SIZE)
}

/// PT-pool index of `addr`, if it lies in the pool.
#[inline]
#[must_use]
pub const fn pt_index_of(addr: PhysicalAddress) -> Option<usize> {
    let a = addr.as_u32();
    if a >= PT_POOL_BASE && a < FFS_BASE {
        Some(((a - PT_POOL_BASE) / PAGE_SIZE) as usize)
    } else {
        None
    }
}

/// Whether `va` lies inside the per-process virtual heap.
#[inline]
#[must_use]
pub const fn in_vheap(va: VirtualAddress) -> bool {
    va.as_u32() >= VHEAP_START && va.as_u32() <= VHEAP_END
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_are_disjoint_and_contiguous() {
        assert_eq!(PT_POOL_BASE, 0x01C0_0000);
        assert_eq!(FFS_BASE, 0x0200_0000);
        assert_eq!(SWAP_BASE, 0x0600_0000);
        assert_eq!(PHYS_END, 0x0E00_0000);
        assert_eq!(KERNEL_IMAGE_PAGES, 8192);
        assert_eq!(VHEAP_PAGES, 65536);
    }

    #[test]
    fn frame_addresses_map_back_to_indices() {
        assert_eq!(ffs_index_of(ffs_frame_addr(0)), Some(0));
        assert_eq!(ffs_index_of(ffs_frame_addr(FFS_FRAMES - 1)), Some(FFS_FRAMES - 1));
        assert_eq!(ffs_index_of(PhysicalAddress::new(SWAP_BASE)), None);
        assert_eq!(pt_index_of(pt_frame_addr(5)), Some(5));
        assert_eq!(pt_index_of(PhysicalAddress::new(0)), None);
    }
}
