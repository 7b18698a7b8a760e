//! Two-level page-table walker.
//!
//! [`walk`] resolves a virtual page to its leaf entry inside a given page
//! directory, allocating and linking the intermediate page table when the
//! directory entry is absent. It hands back a [`PteHandle`] rather than a
//! reference, so the caller can keep mutating physical memory (and walk
//! foreign directories from kernel context) without borrow gymnastics.
//!
//! The walker never allocates leaf frames and never touches presence or
//! accessed bits on existing leaf entries.

use crate::pt_pool::PtPool;
use kernel_machine::layout::in_vheap;
use kernel_machine::PhysMemory;
use kernel_memory_addresses::{PhysicalAddress, PhysicalFrame, VirtualAddress, VirtualPage};
use kernel_vmem::{PdEntry, PtEntry};

/// Location of one leaf entry: page-table frame plus index.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PteHandle {
    table: PhysicalAddress,
    index: usize,
}

impl PteHandle {
    #[inline]
    #[must_use]
    pub fn read(&self, ram: &PhysMemory) -> PtEntry {
        PtEntry::from_raw(ram.read_entry(self.table, self.index))
    }

    #[inline]
    pub fn write(&self, ram: &mut PhysMemory, entry: PtEntry) {
        ram.write_entry(self.table, self.index, entry.raw());
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum WalkError {
    #[error("out of page-table frames")]
    OutOfTableFrames,
}

/// Resolve `page` inside `directory`, creating the page table if needed.
///
/// A newly linked directory entry gets the user bit iff the page lies in the
/// user heap; the hardware intersects it with the leaf's own user bit.
pub fn walk(
    ram: &mut PhysMemory,
    pool: &mut PtPool,
    directory: PhysicalAddress,
    page: VirtualPage,
) -> Result<PteHandle, WalkError> {
    let di = page.directory_index();
    let pde = PdEntry::from_raw(ram.read_entry(directory, di));

    let table = match pde.table() {
        Some(frame) => frame.base(),
        None => {
            let table = pool.allocate(ram).ok_or(WalkError::OutOfTableFrames)?;
            let user = in_vheap(page.base());
            ram.write_entry(directory, di, PdEntry::make_table(table.frame(), user).raw());
            table
        }
    };

    Ok(PteHandle {
        table,
        index: page.table_index(),
    })
}

/// Resolve `page` without creating anything. `None` when the directory entry
/// is absent.
#[must_use]
pub fn probe(ram: &PhysMemory, directory: PhysicalAddress, page: VirtualPage) -> Option<PteHandle> {
    let pde = PdEntry::from_raw(ram.read_entry(directory, page.directory_index()));
    Some(PteHandle {
        table: pde.table()?.base(),
        index: page.table_index(),
    })
}

/// Identity-map `[start, end)` into `directory` at page granularity with
/// kernel permissions. Used only while building the kernel directory.
pub fn map_region(
    ram: &mut PhysMemory,
    pool: &mut PtPool,
    directory: PhysicalAddress,
    start: VirtualAddress,
    end: VirtualAddress,
) -> Result<(), WalkError> {
    let mut page = start.page();
    while page.base().as_u32() < end.as_u32() {
        let pte = walk(ram, pool, directory, page)?;
        pte.write(ram, PtEntry::make_kernel(PhysicalFrame::new(page.number())));
        page = page.next();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_machine::layout::{pt_frame_addr, VHEAP_START};
    use kernel_vmem::PteState;

    #[test]
    fn walk_links_a_table_once() {
        let mut ram = PhysMemory::new();
        let mut pool = PtPool::new();
        let pd = pool.allocate(&mut ram).unwrap();

        let page = VirtualAddress::new(VHEAP_START).page();
        let first = walk(&mut ram, &mut pool, pd, page).unwrap();
        let again = walk(&mut ram, &mut pool, pd, page).unwrap();
        assert_eq!(first, again);
        assert_eq!(pool.free_frames(), kernel_machine::layout::MAX_PT_FRAMES - 2);

        // The created directory entry covers user space.
        let pde = PdEntry::from_raw(ram.read_entry(pd, page.directory_index()));
        assert!(pde.is_user());
        assert_eq!(pde.table().unwrap().base(), pt_frame_addr(1));
    }

    #[test]
    fn walk_keeps_existing_leaf_entries_intact() {
        let mut ram = PhysMemory::new();
        let mut pool = PtPool::new();
        let pd = pool.allocate(&mut ram).unwrap();

        let page = VirtualAddress::new(VHEAP_START).page();
        let pte = walk(&mut ram, &mut pool, pd, page).unwrap();
        pte.write(&mut ram, PtEntry::from_state(PteState::Swapped { slot: 42 }));

        let again = walk(&mut ram, &mut pool, pd, page).unwrap();
        assert_eq!(again.read(&ram).state(), PteState::Swapped { slot: 42 });
    }

    #[test]
    fn probe_never_allocates() {
        let mut ram = PhysMemory::new();
        let mut pool = PtPool::new();
        let pd = pool.allocate(&mut ram).unwrap();

        let page = VirtualAddress::new(VHEAP_START).page();
        assert!(probe(&ram, pd, page).is_none());
        assert_eq!(pool.free_frames(), kernel_machine::layout::MAX_PT_FRAMES - 1);
    }

    #[test]
    fn kernel_mappings_are_supervisor_identity() {
        let mut ram = PhysMemory::new();
        let mut pool = PtPool::new();
        let pd = pool.allocate(&mut ram).unwrap();

        let start = VirtualAddress::new(0);
        let end = VirtualAddress::new(8 * 4096);
        map_region(&mut ram, &mut pool, pd, start, end).unwrap();

        let pte = probe(&ram, pd, VirtualAddress::new(3 * 4096).page())
            .unwrap()
            .read(&ram);
        match pte.state() {
            PteState::Mapped { frame, flags } => {
                assert_eq!(frame.number(), 3);
                assert!(!flags.user && flags.writable);
            }
            other => panic!("unexpected state {other:?}"),
        }
        let pde = PdEntry::from_raw(ram.read_entry(pd, 0));
        assert!(!pde.is_user());
    }
}
