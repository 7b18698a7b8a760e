//! The page-fault handler.
//!
//! Invoked by the trap path after the MMU stored the faulting address in
//! CR2; takes no parameters and runs with interrupts disabled throughout.
//! First match wins:
//!
//! 1. kernel-context fault → fatal;
//! 2. page outside every allocated region → segfault, kill;
//! 3. swapped PTE → swap the contents back in;
//! 4. absent PTE → lazy fill from FFS, evicting when the pool is dry and
//!    swap is enabled;
//! 5. no frame and no victim → out of memory, kill.
//!
//! Every installed PTE carries `accessed=1`, buying the page one clock tick
//! of protection, and is published with a TLB invalidation before the
//! faulting instruction retries.

use crate::error::{KillReason, ProcessKilled};
use crate::kernel::Kernel;
use crate::process::Pid;
use crate::walker::{self, WalkError};
use kernel_memory_addresses::{PhysicalAddress, VirtualPage};
use kernel_vmem::{MappedFlags, PtEntry, PteState};

impl Kernel {
    /// Handle the fault recorded in CR2 for the current process.
    ///
    /// # Panics
    /// A fault while the system process runs is a kernel page fault and
    /// halts the system.
    pub fn pagefault_handler(&mut self) {
        let _irq = self.intr.disable();

        let fault_addr = self.machine.registers().cr2();
        let page = fault_addr.page();
        let pid = self.current;

        let (directory, in_region) = {
            let proc = self.procs.get(pid).expect("current process not in table");
            if !proc.user {
                panic!("kernel page fault at {fault_addr}");
            }
            let vm = proc.vm.as_ref().expect("user process without VM state");
            (vm.directory, vm.regions.contains_allocated(page))
        };

        if !in_region {
            log::warn!("{pid}:: SEGMENTATION_FAULT at {fault_addr}");
            self.kill_faulting(pid, KillReason::SegmentationFault);
            return;
        }

        let pte = match walker::walk(self.machine.ram_mut(), &mut self.pt_pool, directory, page) {
            Ok(handle) => handle,
            Err(WalkError::OutOfTableFrames) => {
                log::warn!("{pid}:: SEGMENTATION_FAULT at {fault_addr} (no page-table frame)");
                self.kill_faulting(pid, KillReason::SegmentationFault);
                return;
            }
        };

        match pte.read(self.machine.ram()).state() {
            PteState::Swapped { slot } => {
                debug_assert!(self.swap_enabled, "swapped PTE with swapping disabled");
                let Some(frame) = self.replacement.swap_in(
                    &mut self.machine,
                    &mut self.ffs,
                    &mut self.swap,
                    slot,
                    pid,
                ) else {
                    log::warn!("{pid}:: OUT_OF_MEMORY at {fault_addr} (swap-in failed)");
                    self.kill_faulting(pid, KillReason::OutOfMemory);
                    return;
                };
                self.install(pid, page, directory, frame);
            }

            PteState::Absent => {
                let frame = match self.ffs.allocate(self.machine.ram_mut(), pid) {
                    Some(frame) => frame,
                    None if self.swap_enabled => {
                        let Some(victim) =
                            self.replacement.select_victim(&mut self.machine, &self.ffs)
                        else {
                            log::warn!("{pid}:: OUT_OF_MEMORY at {fault_addr} (no victim)");
                            self.kill_faulting(pid, KillReason::OutOfMemory);
                            return;
                        };
                        self.replacement.swap_out(
                            &mut self.machine,
                            &mut self.ffs,
                            &mut self.swap,
                            victim,
                        );
                        self.ffs.claim(victim, pid);
                        self.machine.ram_mut().zero_frame(victim);
                        victim
                    }
                    None => {
                        log::warn!("{pid}:: OUT_OF_MEMORY at {fault_addr}");
                        self.kill_faulting(pid, KillReason::OutOfMemory);
                        return;
                    }
                };
                self.install(pid, page, directory, frame);
            }

            // The PTE became usable before we got here (a protection-style
            // retry). Dropping the stale translation is all that is needed.
            PteState::Mapped { .. } => {
                self.machine.invalidate_page(page);
            }
        }
    }

    /// Record frame metadata, write the mapped PTE (`accessed=1`), and
    /// publish it with a TLB invalidation.
    fn install(&mut self, pid: Pid, page: VirtualPage, directory: PhysicalAddress, frame: PhysicalAddress) {
        self.ffs.set_mapping(frame, page, directory);
        let pte = walker::probe(self.machine.ram(), directory, page)
            .expect("page table vanished during fault handling");
        pte.write(
            self.machine.ram_mut(),
            PtEntry::make_mapped(frame.frame(), MappedFlags::fresh_user()),
        );
        self.machine.invalidate_page(page);
        log::trace!("{pid}:: mapped {page} -> {frame}");
    }

    fn kill_faulting(&mut self, pid: Pid, reason: KillReason) {
        self.last_kill = Some(ProcessKilled { pid, reason });
        self.kill(pid).expect("faulting process vanished before kill");
    }
}
