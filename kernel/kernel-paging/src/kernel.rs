//! The paging subsystem facade.
//!
//! One [`Kernel`] value is the whole subsystem: the simulated machine, the
//! three frame pools, the replacement engine and the process registry,
//! constructed at boot and passed by reference everywhere (the fault handler
//! included). There are no process-wide globals; two kernels in one test
//! binary never share state.

use crate::error::{ProcessKilled, VmError};
use crate::ffs::FfsPool;
use crate::process::{Pid, ProcessTable, ProcessVm};
use crate::pt_pool::PtPool;
use crate::replacement::{ReplacementEngine, SwapEvent};
use crate::swap_pool::SwapPool;
use crate::walker;
use kernel_machine::layout::{KERNEL_IMAGE_PAGES, PHYS_END};
use kernel_machine::{AccessMode, Machine};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress, PAGE_SIZE, TABLE_ENTRIES};
use kernel_sync::IntrLine;
use kernel_vmem::{PdEntry, PtEntry, PteState};

/// Boot-time configuration.
#[derive(Copy, Clone, Debug)]
pub struct BootOptions {
    /// Enable the replacement engine. Off, the system matches the
    /// no-swapping build: FFS exhaustion kills the faulting process.
    pub swap: bool,
    /// How many eviction/swap-in trace lines to print before going quiet.
    pub swap_trace_lines: u32,
}

impl Default for BootOptions {
    fn default() -> Self {
        Self {
            swap: false,
            swap_trace_lines: 0,
        }
    }
}

pub struct Kernel {
    pub(crate) machine: Machine,
    pub(crate) intr: IntrLine,
    pub(crate) pt_pool: PtPool,
    pub(crate) ffs: FfsPool,
    pub(crate) swap: SwapPool,
    pub(crate) replacement: ReplacementEngine,
    pub(crate) procs: ProcessTable,
    pub(crate) kernel_directory: PhysicalAddress,
    pub(crate) current: Pid,
    pub(crate) swap_enabled: bool,
    pub(crate) last_kill: Option<ProcessKilled>,
}

impl Kernel {
    /// Build the subsystem: PT pool, kernel directory, identity map of all
    /// physical memory, CR3 load. Runs with interrupts disabled.
    ///
    /// # Panics
    /// PT-pool exhaustion at boot is fatal.
    #[must_use]
    pub fn boot(options: BootOptions) -> Self {
        let mut machine = Machine::new();
        let intr = machine.intr();
        let mut pt_pool = PtPool::new();

        let kernel_directory = {
            let _irq = intr.disable();
            let directory = pt_pool
                .allocate(machine.ram_mut())
                .expect("PT pool empty at boot");
            walker::map_region(
                machine.ram_mut(),
                &mut pt_pool,
                directory,
                VirtualAddress::zero(),
                VirtualAddress::new(PHYS_END),
            )
            .expect("out of page-table frames while building the kernel directory");
            machine.load_page_directory(directory);
            directory
        };
        log::info!(
            "paging: kernel directory {kernel_directory}, identity map [0x00000000, {:#010X})",
            PHYS_END
        );

        Self {
            machine,
            intr,
            pt_pool,
            ffs: FfsPool::new(),
            swap: SwapPool::new(),
            replacement: ReplacementEngine::new(options.swap_trace_lines),
            procs: ProcessTable::new(),
            kernel_directory,
            current: Pid::SYSTEM,
            swap_enabled: options.swap,
            last_kill: None,
        }
    }

    /// Create a user process: a page directory sharing all kernel mappings,
    /// a region list covering the whole heap, zero pages allocated.
    pub fn vcreate(&mut self, name: &str, priority: u16) -> Result<Pid, VmError> {
        let _irq = self.intr.disable();

        let directory = self
            .pt_pool
            .allocate(self.machine.ram_mut())
            .ok_or(VmError::OutOfMemory)?;
        for i in 0..TABLE_ENTRIES {
            let raw = self.machine.ram().read_entry(self.kernel_directory, i);
            self.machine.ram_mut().write_entry(directory, i, raw);
        }

        match self.procs.spawn(name, priority, ProcessVm::new(directory)) {
            Some(pid) => {
                log::debug!("{pid}:: created ({name}, prio {priority}), directory {directory}");
                Ok(pid)
            }
            None => {
                self.pt_pool.release(directory);
                Err(VmError::ProcessTableFull)
            }
        }
    }

    /// Switch the running process: sets the current pid and loads its
    /// address space (flushing the TLB).
    pub fn switch_to(&mut self, pid: Pid) -> Result<(), VmError> {
        let _irq = self.intr.disable();
        let directory = match self.procs.get(pid) {
            Some(p) => p
                .vm
                .as_ref()
                .map_or(self.kernel_directory, |vm| vm.directory),
            None => return Err(VmError::BadPid),
        };
        self.current = pid;
        self.machine.load_page_directory(directory);
        Ok(())
    }

    /// Reserve `nbytes` (rounded up to pages) of virtual heap for the
    /// current process. No frame is touched; backing happens on first
    /// access.
    pub fn vmalloc(&mut self, nbytes: u32) -> Result<VirtualAddress, VmError> {
        let _irq = self.intr.disable();
        if nbytes == 0 {
            return Err(VmError::InvalidArgument);
        }
        let pages = kernel_memory_addresses::pages_for(nbytes);

        let proc = self
            .procs
            .get_mut(self.current)
            .ok_or(VmError::BadPid)?;
        let Some(vm) = proc.vm.as_mut() else {
            return Err(VmError::NotUserProcess);
        };
        let addr = vm.regions.allocate(pages).ok_or(VmError::OutOfMemory)?;
        vm.total_allocated += pages;
        Ok(addr)
    }

    /// Release a span of virtual heap.
    ///
    /// The span (page-rounded in both directions) must be exactly a union of
    /// whole allocated regions. Mapped pages give their frame back to FFS,
    /// swapped pages give their slot back; each cleared PTE is followed by a
    /// TLB invalidation for that page.
    pub fn vfree(&mut self, ptr: VirtualAddress, nbytes: u32) -> Result<(), VmError> {
        let _irq = self.intr.disable();
        if ptr.as_u32() == 0 || nbytes == 0 {
            return Err(VmError::InvalidArgument);
        }
        let pid = self.current;
        let proc = self.procs.get(pid).ok_or(VmError::BadPid)?;
        let Some(vm) = proc.vm.as_ref() else {
            return Err(VmError::NotUserProcess);
        };

        let start = ptr.page();
        let end = ptr
            .as_u32()
            .checked_add(nbytes)
            .ok_or(VmError::InvalidArgument)?;
        let end_page = u32::try_from((u64::from(end) + u64::from(PAGE_SIZE) - 1) >> 12 << 12)
            .map_err(|_| VmError::InvalidArgument)?;
        let pages = (end_page - start.base().as_u32()) / PAGE_SIZE;

        if !vm.regions.span_is_whole_allocations(start, pages) {
            return Err(VmError::InvalidArgument);
        }
        let directory = vm.directory;

        let mut page = start;
        for _ in 0..pages {
            if let Some(pte) = walker::probe(self.machine.ram(), directory, page) {
                match pte.read(self.machine.ram()).state() {
                    PteState::Mapped { frame, .. } => {
                        self.ffs.release(frame.base());
                        pte.write(self.machine.ram_mut(), PtEntry::zero());
                        self.machine.invalidate_page(page);
                    }
                    PteState::Swapped { slot } => {
                        self.swap.release(slot);
                        pte.write(self.machine.ram_mut(), PtEntry::zero());
                    }
                    PteState::Absent => {}
                }
            }
            page = page.next();
        }

        let vm = self.procs.vm_mut(pid).expect("vm vanished during vfree");
        let freed = vm.regions.free_span(start, pages);
        debug_assert_eq!(freed, pages);
        vm.total_allocated -= pages;
        Ok(())
    }

    /// Read one byte of user memory, handling faults the way the hardware
    /// retry does: fault, run the handler, retry the access. Fails only when
    /// the handler killed the process instead.
    pub fn read_byte(&mut self, va: VirtualAddress) -> Result<u8, ProcessKilled> {
        let pid = self.current;
        loop {
            match self.machine.load(va, AccessMode::User) {
                Ok(byte) => return Ok(byte),
                Err(_fault) => {
                    self.pagefault_handler();
                    if !self.procs.is_alive(pid) {
                        return Err(self.take_kill_verdict(pid));
                    }
                }
            }
        }
    }

    /// Write one byte of user memory; see [`Kernel::read_byte`].
    pub fn write_byte(&mut self, va: VirtualAddress, value: u8) -> Result<(), ProcessKilled> {
        let pid = self.current;
        loop {
            match self.machine.store(va, value, AccessMode::User) {
                Ok(()) => return Ok(()),
                Err(_fault) => {
                    self.pagefault_handler();
                    if !self.procs.is_alive(pid) {
                        return Err(self.take_kill_verdict(pid));
                    }
                }
            }
        }
    }

    /// Touch a page (write a zero byte at `va`).
    pub fn touch(&mut self, va: VirtualAddress) -> Result<(), ProcessKilled> {
        self.write_byte(va, 0)
    }

    fn take_kill_verdict(&mut self, pid: Pid) -> ProcessKilled {
        self.last_kill
            .take()
            .filter(|k| k.pid == pid)
            .expect("process died without a recorded kill reason")
    }

    /// Kill a user process and reclaim everything it owns.
    ///
    /// Teardown is two-phase: [`Kernel::vm_cleanup`] reclaims frames, swap
    /// slots and page tables immediately; the page-directory frame is
    /// released only after the address-space switch when the victim is the
    /// running process, so the directory the CPU is walking never goes away
    /// under it.
    pub fn kill(&mut self, pid: Pid) -> Result<(), VmError> {
        let _irq = self.intr.disable();
        if pid == Pid::SYSTEM || !self.procs.is_alive(pid) {
            return Err(VmError::BadPid);
        }

        self.vm_cleanup(pid);
        if self.current == pid {
            self.current = Pid::SYSTEM;
            self.machine.load_page_directory(self.kernel_directory);
        }
        self.release_page_directory(pid);
        self.procs.remove(pid);
        Ok(())
    }

    /// Teardown phase one: release every FFS frame and swap slot owned by
    /// `pid`, and the page-table frames behind its heap directory entries.
    /// The page directory itself stays.
    pub fn vm_cleanup(&mut self, pid: Pid) {
        let _irq = self.intr.disable();
        let Some(vm) = self.procs.vm(pid) else {
            return;
        };
        let directory = vm.directory;

        let frames = self.ffs.release_owned(pid);
        let slots = self.swap.release_owned(pid);

        // Heap page tables are the user-bit directory entries; the kernel
        // tables copied at vcreate are shared and must survive.
        let mut tables = 0;
        for i in 0..TABLE_ENTRIES {
            let pde = PdEntry::from_raw(self.machine.ram().read_entry(directory, i));
            if pde.is_present() && pde.is_user() {
                if let Some(table) = pde.table() {
                    self.pt_pool.release(table.base());
                    tables += 1;
                }
                self.machine.ram_mut().write_entry(directory, i, 0);
            }
        }
        log::debug!("{pid}:: cleanup: {frames} frames, {slots} swap slots, {tables} page tables");
    }

    /// Teardown phase two: release the page-directory frame.
    pub fn release_page_directory(&mut self, pid: Pid) {
        let _irq = self.intr.disable();
        if let Some(vm) = self.procs.vm(pid) {
            debug_assert!(
                self.current != pid,
                "releasing the page directory of the running process"
            );
            self.pt_pool.release(vm.directory);
        }
    }

    // ----- introspection -------------------------------------------------

    #[must_use]
    pub fn current(&self) -> Pid {
        self.current
    }

    #[must_use]
    pub fn free_ffs_pages(&self) -> usize {
        self.ffs.free_frames()
    }

    #[must_use]
    pub fn free_swap_pages(&self) -> usize {
        self.swap.free_slots()
    }

    #[must_use]
    pub fn free_pt_frames(&self) -> usize {
        self.pt_pool.free_frames()
    }

    /// FFS frames currently owned by `pid`; 0 for a bad pid.
    #[must_use]
    pub fn used_ffs_frames(&self, pid: Pid) -> usize {
        if !self.procs.is_alive(pid) {
            return 0;
        }
        self.ffs.frames_owned_by(pid)
    }

    /// Kernel-image pages plus the pages reserved through `vmalloc`; 0 for a
    /// bad pid.
    #[must_use]
    pub fn allocated_virtual_pages(&self, pid: Pid) -> u32 {
        match self.procs.get(pid) {
            Some(p) => KERNEL_IMAGE_PAGES + p.vm.as_ref().map_or(0, |vm| vm.total_allocated),
            None => 0,
        }
    }

    #[must_use]
    pub fn user_pids(&self) -> Vec<Pid> {
        self.procs.user_pids()
    }

    #[must_use]
    pub fn page_directory(&self, pid: Pid) -> Option<PhysicalAddress> {
        self.procs.vm(pid).map(|vm| vm.directory)
    }

    /// The replacement engine's clock hand.
    #[must_use]
    pub fn clock_hand(&self) -> usize {
        self.replacement.hand()
    }

    /// The swap-event journal (evictions and swap-ins since boot).
    #[must_use]
    pub fn swap_events(&self) -> &[SwapEvent] {
        self.replacement.events()
    }

    pub fn set_swap_trace_budget(&mut self, lines: u32) {
        self.replacement.set_trace_budget(lines);
    }

    /// The simulated machine (read-only; tests inspect RAM and TLB).
    #[must_use]
    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    /// Log a frame-allocator summary.
    pub fn dump_frame_info(&self) {
        log::debug!(
            "FFS frames: {} free / {}",
            self.ffs.free_frames(),
            self.ffs.total_frames()
        );
        log::debug!(
            "swap slots: {} free / {}",
            self.swap.free_slots(),
            self.swap.total_slots()
        );
        log::debug!("PT frames:  {} free", self.pt_pool.free_frames());
        for pid in self.procs.user_pids() {
            log::debug!(
                "{pid}:: {} frames, {} virtual pages",
                self.ffs.frames_owned_by(pid),
                self.allocated_virtual_pages(pid)
            );
        }
    }
}

impl core::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Kernel")
            .field("current", &self.current)
            .field("free_ffs", &self.ffs.free_frames())
            .field("free_swap", &self.swap.free_slots())
            .field("clock_hand", &self.replacement.hand())
            .field("swap_enabled", &self.swap_enabled)
            .finish_non_exhaustive()
    }
}
