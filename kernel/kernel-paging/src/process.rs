//! Minimal process registry.
//!
//! The scheduler and the full process table live outside this subsystem; the
//! paging code only needs a pid, the user/system distinction, and the
//! per-process paging fields it owns (page directory, region list, virtual
//! page accounting). Slot 0 is the system process, which runs on the kernel
//! directory and has no heap.

use crate::regions::RegionList;
use kernel_machine::layout::{VHEAP_PAGES, VHEAP_START};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use core::fmt;

/// Process identifier. Doubles as the process-table slot index.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Pid(u32);

impl Pid {
    /// The system process: kernel address space, never killed.
    pub const SYSTEM: Pid = Pid(0);

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

impl fmt::Debug for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// The per-process paging state this subsystem owns.
pub struct ProcessVm {
    /// Physical base of the process page directory.
    pub directory: PhysicalAddress,
    /// Heap reservations.
    pub regions: RegionList,
    /// Pages currently reserved through `vmalloc` (not frames).
    pub total_allocated: u32,
}

impl ProcessVm {
    /// Fresh VM state: the whole heap as one free region, nothing allocated.
    #[must_use]
    pub fn new(directory: PhysicalAddress) -> Self {
        Self {
            directory,
            regions: RegionList::new(VirtualAddress::new(VHEAP_START), VHEAP_PAGES),
            total_allocated: 0,
        }
    }
}

pub struct Process {
    pub pid: Pid,
    pub name: String,
    pub priority: u16,
    /// User processes have a heap and can be killed; the system process has
    /// neither.
    pub user: bool,
    pub vm: Option<ProcessVm>,
}

/// Fixed-size table of process slots; a dead slot is reused by the next
/// spawn.
pub struct ProcessTable {
    slots: Vec<Option<Process>>,
}

/// Process slots including the system process.
pub const MAX_PROCESSES: usize = 64;

impl ProcessTable {
    #[must_use]
    pub fn new() -> Self {
        let mut slots: Vec<Option<Process>> = (0..MAX_PROCESSES).map(|_| None).collect();
        slots[0] = Some(Process {
            pid: Pid::SYSTEM,
            name: "system".into(),
            priority: 0,
            user: false,
            vm: None,
        });
        Self { slots }
    }

    /// Claim a free slot for a user process. The caller attaches VM state
    /// afterwards.
    pub fn spawn(&mut self, name: &str, priority: u16, vm: ProcessVm) -> Option<Pid> {
        let index = self.slots.iter().position(Option::is_none)?;
        let pid = Pid(index as u32);
        self.slots[index] = Some(Process {
            pid,
            name: name.into(),
            priority,
            user: true,
            vm: Some(vm),
        });
        Some(pid)
    }

    #[must_use]
    pub fn get(&self, pid: Pid) -> Option<&Process> {
        self.slots.get(pid.0 as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Process> {
        self.slots.get_mut(pid.0 as usize)?.as_mut()
    }

    #[must_use]
    pub fn vm(&self, pid: Pid) -> Option<&ProcessVm> {
        self.get(pid)?.vm.as_ref()
    }

    pub fn vm_mut(&mut self, pid: Pid) -> Option<&mut ProcessVm> {
        self.get_mut(pid)?.vm.as_mut()
    }

    #[must_use]
    pub fn is_alive(&self, pid: Pid) -> bool {
        self.get(pid).is_some()
    }

    /// Free the slot. The system process cannot be removed.
    pub fn remove(&mut self, pid: Pid) -> Option<Process> {
        if pid == Pid::SYSTEM {
            return None;
        }
        self.slots.get_mut(pid.0 as usize)?.take()
    }

    /// Pids of all live user processes.
    #[must_use]
    pub fn user_pids(&self) -> Vec<Pid> {
        self.slots
            .iter()
            .flatten()
            .filter(|p| p.user)
            .map(|p| p.pid)
            .collect()
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_reused_after_removal() {
        let mut t = ProcessTable::new();
        let vm = || ProcessVm::new(PhysicalAddress::new(0x01C0_1000));
        let a = t.spawn("a", 1, vm()).unwrap();
        let b = t.spawn("b", 1, vm()).unwrap();
        assert_ne!(a, b);
        t.remove(a).unwrap();
        let c = t.spawn("c", 1, vm()).unwrap();
        assert_eq!(c, a);
        assert_eq!(t.user_pids(), vec![c, b]);
    }

    #[test]
    fn system_process_is_permanent() {
        let mut t = ProcessTable::new();
        assert!(t.remove(Pid::SYSTEM).is_none());
        assert!(!t.get(Pid::SYSTEM).unwrap().user);
    }
}
