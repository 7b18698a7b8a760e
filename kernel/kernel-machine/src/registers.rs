use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

/// The paging-relevant control registers.
///
/// - `CR2`: the faulting linear address, written by the MMU when it raises a
///   page fault and read by the fault handler.
/// - `CR3`: physical base of the active page directory.
///
/// CR3 is only written through [`crate::Machine::load_page_directory`], which
/// also flushes the TLB the way a hardware CR3 load does.
#[derive(Debug, Default)]
pub struct Registers {
    cr2: VirtualAddress,
    cr3: PhysicalAddress,
}

impl Registers {
    #[inline]
    #[must_use]
    pub fn cr2(&self) -> VirtualAddress {
        self.cr2
    }

    #[inline]
    pub(crate) fn set_cr2(&mut self, fault_addr: VirtualAddress) {
        self.cr2 = fault_addr;
    }

    #[inline]
    #[must_use]
    pub fn cr3(&self) -> PhysicalAddress {
        self.cr3
    }

    #[inline]
    pub(crate) fn set_cr3(&mut self, pd: PhysicalAddress) {
        self.cr3 = pd;
    }
}
