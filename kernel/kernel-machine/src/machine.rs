use crate::{PhysMemory, Registers, Tlb, TlbEntry};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress, VirtualPage};
use kernel_sync::IntrLine;
use kernel_vmem::{PdEntry, PtEntry, PteState};

/// Privilege level of a memory access.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AccessMode {
    /// Kernel-mode access; ignores the user/supervisor bits.
    Supervisor,
    /// User-mode access; requires the user bit along the whole walk.
    User,
}

/// What the MMU tripped over.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PageFaultKind {
    /// No usable translation (absent or swapped-out entry).
    NotPresent,
    /// A translation exists but forbids the access (user bit, write bit).
    Protection,
}

/// A page fault, raised by [`Machine::load`] / [`Machine::store`].
///
/// By the time the caller sees this, CR2 already holds the faulting address,
/// so a trap-stub-shaped caller can invoke the parameterless fault handler
/// and retry the access.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("page fault at {address} ({kind:?})")]
pub struct PageFault {
    pub address: VirtualAddress,
    pub kind: PageFaultKind,
}

/// Outcome of a successful page walk, before permission checks.
struct WalkHit {
    table: PhysicalAddress,
    index: usize,
    pte: PtEntry,
    directory_user: bool,
}

/// The simulated single-core machine.
///
/// Owns physical memory, the control registers, the TLB and the interrupt
/// line. [`Machine::load`] and [`Machine::store`] are the MMU: they translate
/// through the TLB and the active page directory, maintain accessed/dirty
/// bits the way the hardware does (on TLB fill, and on the first write
/// through a clean entry), and raise [`PageFault`] with CR2 set.
///
/// Ordering within a critical section is what the paging code relies on:
/// a PTE store through [`PhysMemory::write_entry`] completes before the
/// matching [`Machine::invalidate_page`], and the next translation of that
/// page observes the new entry.
pub struct Machine {
    ram: PhysMemory,
    tlb: Tlb,
    registers: Registers,
    intr: IntrLine,
}

impl Machine {
    /// Fresh machine: zeroed RAM, empty TLB, interrupts enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ram: PhysMemory::new(),
            tlb: Tlb::new(),
            registers: Registers::default(),
            intr: IntrLine::new_enabled(),
        }
    }

    /// Handle to the interrupt line (cheap clone; see [`IntrLine`]).
    #[must_use]
    pub fn intr(&self) -> IntrLine {
        self.intr.clone()
    }

    #[inline]
    #[must_use]
    pub fn ram(&self) -> &PhysMemory {
        &self.ram
    }

    #[inline]
    pub fn ram_mut(&mut self) -> &mut PhysMemory {
        &mut self.ram
    }

    #[inline]
    #[must_use]
    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    /// Load CR3 and flush the TLB, switching the active address space.
    pub fn load_page_directory(&mut self, pd: PhysicalAddress) {
        log::trace!("cr3 <- {pd}");
        self.registers.set_cr3(pd);
        self.tlb.flush();
    }

    /// Drop the cached translation for one page (`invlpg`).
    #[inline]
    pub fn invalidate_page(&mut self, page: VirtualPage) {
        self.tlb.invalidate(page);
    }

    /// TLB introspection for tests.
    #[inline]
    #[must_use]
    pub fn tlb_entries(&self) -> usize {
        self.tlb.len()
    }

    /// Read one byte at `va`.
    pub fn load(&mut self, va: VirtualAddress, mode: AccessMode) -> Result<u8, PageFault> {
        let pa = self.translate(va, mode, false)?;
        Ok(self.ram.read_byte(pa))
    }

    /// Write one byte at `va`.
    pub fn store(
        &mut self,
        va: VirtualAddress,
        value: u8,
        mode: AccessMode,
    ) -> Result<(), PageFault> {
        let pa = self.translate(va, mode, true)?;
        self.ram.write_byte(pa, value);
        Ok(())
    }

    fn translate(
        &mut self,
        va: VirtualAddress,
        mode: AccessMode,
        is_write: bool,
    ) -> Result<PhysicalAddress, PageFault> {
        let (page, offset) = va.split();

        if let Some(entry) = self.tlb.lookup(page) {
            self.check_permissions(va, entry.user, entry.writable, mode, is_write)?;
            if is_write && !entry.dirty {
                // First write through a clean translation: push D to the PTE.
                if let Some(hit) = self.find_pte(page) {
                    self.ram
                        .write_entry(hit.table, hit.index, hit.pte.with_dirty_set().raw());
                }
                self.tlb.mark_dirty(page);
            }
            return Ok(entry.frame.base() + offset);
        }

        let Some(hit) = self.find_pte(page) else {
            return Err(self.fault(va, PageFaultKind::NotPresent));
        };

        match hit.pte.state() {
            PteState::Mapped { frame, flags } => {
                let user_ok = flags.user && hit.directory_user;
                self.check_permissions(va, user_ok, flags.writable, mode, is_write)?;

                let mut updated = hit.pte.with_accessed_set();
                if is_write {
                    updated = updated.with_dirty_set();
                }
                self.ram.write_entry(hit.table, hit.index, updated.raw());
                self.tlb.fill(
                    page,
                    TlbEntry {
                        frame,
                        writable: flags.writable,
                        user: user_ok,
                        dirty: is_write,
                    },
                );
                Ok(frame.base() + offset)
            }
            PteState::Absent | PteState::Swapped { .. } => {
                Err(self.fault(va, PageFaultKind::NotPresent))
            }
        }
    }

    /// Walk the active directory down to the leaf entry for `page`.
    ///
    /// Returns `None` when the directory entry is absent (including the
    /// defensive table-frame-zero case).
    fn find_pte(&self, page: VirtualPage) -> Option<WalkHit> {
        let pde = PdEntry::from_raw(
            self.ram
                .read_entry(self.registers.cr3(), page.directory_index()),
        );
        let table = pde.table()?.base();
        let index = page.table_index();
        let pte = PtEntry::from_raw(self.ram.read_entry(table, index));
        Some(WalkHit {
            table,
            index,
            pte,
            directory_user: pde.is_user(),
        })
    }

    fn check_permissions(
        &mut self,
        va: VirtualAddress,
        user: bool,
        writable: bool,
        mode: AccessMode,
        is_write: bool,
    ) -> Result<(), PageFault> {
        if mode == AccessMode::User && !user {
            return Err(self.fault(va, PageFaultKind::Protection));
        }
        if is_write && !writable {
            return Err(self.fault(va, PageFaultKind::Protection));
        }
        Ok(())
    }

    fn fault(&mut self, va: VirtualAddress, kind: PageFaultKind) -> PageFault {
        log::trace!("page fault at {va} ({kind:?})");
        self.registers.set_cr2(va);
        PageFault { address: va, kind }
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{ffs_frame_addr, pt_frame_addr};
    use kernel_vmem::MappedFlags;

    /// Hand-build a one-page address space: PD at PT frame 0, PT at frame 1,
    /// `va` mapped to FFS frame 0 with the given flags.
    fn build_space(m: &mut Machine, va: VirtualAddress, flags: MappedFlags) {
        let pd = pt_frame_addr(0);
        let pt = pt_frame_addr(1);
        let page = va.page();
        m.ram_mut().write_entry(
            pd,
            page.directory_index(),
            PdEntry::make_table(pt.frame(), flags.user).raw(),
        );
        m.ram_mut().write_entry(
            pt,
            page.table_index(),
            PtEntry::make_mapped(ffs_frame_addr(0).frame(), flags).raw(),
        );
        m.load_page_directory(pd);
    }

    #[test]
    fn store_then_load_round_trips() {
        let mut m = Machine::new();
        let va = VirtualAddress::new(0x1000_0123);
        build_space(&mut m, va, MappedFlags::fresh_user());

        m.store(va, 0x5A, AccessMode::User).unwrap();
        assert_eq!(m.load(va, AccessMode::User).unwrap(), 0x5A);
        // The byte landed in the mapped frame, not at the virtual address.
        assert_eq!(m.ram().read_byte(ffs_frame_addr(0) + 0x123), 0x5A);
    }

    #[test]
    fn walk_sets_accessed_and_dirty_bits() {
        let mut m = Machine::new();
        let va = VirtualAddress::new(0x1000_0000);
        let mut flags = MappedFlags::fresh_user();
        flags.accessed = false;
        build_space(&mut m, va, flags);

        m.store(va, 1, AccessMode::User).unwrap();
        let pte = PtEntry::from_raw(m.ram().read_entry(pt_frame_addr(1), 0));
        match pte.state() {
            PteState::Mapped { flags, .. } => assert!(flags.accessed && flags.dirty),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn unmapped_access_faults_and_sets_cr2() {
        let mut m = Machine::new();
        let va = VirtualAddress::new(0x1000_0000);
        build_space(&mut m, va, MappedFlags::fresh_user());

        let miss = VirtualAddress::new(0x1040_0008);
        let err = m.load(miss, AccessMode::User).unwrap_err();
        assert_eq!(err.kind, PageFaultKind::NotPresent);
        assert_eq!(m.registers().cr2(), miss);
    }

    #[test]
    fn user_access_to_supervisor_page_is_a_protection_fault() {
        let mut m = Machine::new();
        let va = VirtualAddress::new(0x0010_0000);
        let mut flags = MappedFlags::fresh_user();
        flags.user = false;
        build_space(&mut m, va, flags);

        let err = m.load(va, AccessMode::User).unwrap_err();
        assert_eq!(err.kind, PageFaultKind::Protection);
        assert!(m.load(va, AccessMode::Supervisor).is_ok());
    }

    #[test]
    fn stale_tlb_entry_survives_until_invalidated() {
        let mut m = Machine::new();
        let va = VirtualAddress::new(0x1000_0000);
        build_space(&mut m, va, MappedFlags::fresh_user());

        // Prime the TLB, then clear the PTE behind its back.
        m.load(va, AccessMode::User).unwrap();
        m.ram_mut()
            .write_entry(pt_frame_addr(1), 0, PtEntry::zero().raw());

        // Cached translation still works: that is the hazard invlpg exists for.
        assert!(m.load(va, AccessMode::User).is_ok());
        m.invalidate_page(va.page());
        assert!(m.load(va, AccessMode::User).is_err());
    }

    #[test]
    fn cr3_load_flushes_the_tlb() {
        let mut m = Machine::new();
        let va = VirtualAddress::new(0x1000_0000);
        build_space(&mut m, va, MappedFlags::fresh_user());
        m.load(va, AccessMode::User).unwrap();
        assert_eq!(m.tlb_entries(), 1);
        m.load_page_directory(pt_frame_addr(0));
        assert_eq!(m.tlb_entries(), 0);
    }
}
