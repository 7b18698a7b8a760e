//! # Typed memory addresses for a 32-bit paged machine
//!
//! Thin, zero-cost wrappers that keep physical and virtual addresses apart at
//! the type level. The machine uses two-level paging with a single page size:
//!
//! - 4 KiB pages (`PAGE_SIZE`), so an address splits into a 20-bit page/frame
//!   number and a 12-bit offset;
//! - a virtual address further splits its page number into a 10-bit
//!   page-directory index and a 10-bit page-table index.
//!
//! The split/join helpers here are the only place in the workspace that knows
//! these widths; everything above works with [`VirtualAddress`],
//! [`VirtualPage`], [`PhysicalAddress`] and [`PhysicalFrame`].

mod physical_address;
mod physical_frame;
mod virtual_address;
mod virtual_page;

pub use physical_address::PhysicalAddress;
pub use physical_frame::PhysicalFrame;
pub use virtual_address::VirtualAddress;
pub use virtual_page::VirtualPage;

/// Bytes per page and per frame.
pub const PAGE_SIZE: u32 = 4096;

/// log2(`PAGE_SIZE`): number of low bits used for the in-page offset.
pub const PAGE_SHIFT: u32 = 12;

/// Entries per page directory and per page table (10 index bits each).
pub const TABLE_ENTRIES: usize = 1024;

/// Number of whole pages needed to hold `n` bytes.
#[inline]
#[must_use]
pub const fn pages_for(n: u32) -> u32 {
    n.div_ceil(PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_for_rounds_up() {
        assert_eq!(pages_for(0), 0);
        assert_eq!(pages_for(1), 1);
        assert_eq!(pages_for(PAGE_SIZE), 1);
        assert_eq!(pages_for(PAGE_SIZE + 1), 2);
        assert_eq!(pages_for(8 * PAGE_SIZE), 8);
    }
}
