//! Clock (second-chance) replacement and the swap-out/swap-in paths.
//!
//! One global hand sweeps the FFS slots. It persists across process births
//! and deaths and is never reset while the kernel lives; eviction order in
//! later workloads depends on where earlier ones left it.

use crate::ffs::FfsPool;
use crate::process::Pid;
use crate::swap_pool::SwapPool;
use crate::walker;
use kernel_machine::layout::{ffs_frame_addr, ffs_index_of, swap_slot_addr, FFS_FRAMES};
use kernel_machine::Machine;
use kernel_memory_addresses::PhysicalAddress;
use kernel_vmem::{PtEntry, PteState};

/// Journal entry for one swap transfer. Indices are relative to the FFS and
/// swap area bases, matching the printed trace lines.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SwapEvent {
    Eviction { ffs_index: usize, swap_index: u32 },
    SwapIn { swap_index: u32, ffs_index: usize },
}

pub struct ReplacementEngine {
    /// The persistent clock hand, in `[0, FFS_FRAMES)`.
    hand: usize,
    /// Remaining trace lines to print; the journal keeps recording after the
    /// budget runs out.
    trace_budget: u32,
    events: Vec<SwapEvent>,
}

impl ReplacementEngine {
    #[must_use]
    pub fn new(trace_budget: u32) -> Self {
        Self {
            hand: 0,
            trace_budget,
            events: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn hand(&self) -> usize {
        self.hand
    }

    #[inline]
    #[must_use]
    pub fn events(&self) -> &[SwapEvent] {
        &self.events
    }

    pub fn set_trace_budget(&mut self, lines: u32) {
        self.trace_budget = lines;
    }

    /// Pick a victim frame, advancing the hand by exactly one per slot
    /// inspected and clearing accessed bits on first encounter.
    ///
    /// Two full passes bound the scan: the first may clear every accessed
    /// bit, the second then finds a victim if any evictable frame exists.
    /// Slots without live mapping metadata (free or reserved frames) are
    /// passed over.
    pub fn select_victim(&mut self, machine: &mut Machine, ffs: &FfsPool) -> Option<PhysicalAddress> {
        for _ in 0..2 * FFS_FRAMES {
            let index = self.hand;
            self.hand = (self.hand + 1) % FFS_FRAMES;

            let Some((page, directory)) = ffs.slot(index).mapping() else {
                continue;
            };
            let Some(pte) = walker::probe(machine.ram(), directory, page) else {
                continue;
            };
            let entry = pte.read(machine.ram());
            if !entry.is_present() {
                continue;
            }
            if entry.accessed() {
                // Second chance: strip the bit, move on.
                pte.write(machine.ram_mut(), entry.with_accessed_cleared());
            } else {
                return Some(ffs_frame_addr(index));
            }
        }
        None
    }

    /// Evict `victim`: copy its contents to a fresh swap slot, rewrite the
    /// owning PTE to the swapped state, and invalidate the stale
    /// translation. The frame stays used — the caller claims it.
    ///
    /// # Panics
    /// Swap exhaustion is an invariant violation (the area is dimensioned so
    /// it cannot fill), as is a victim without mapping metadata.
    pub fn swap_out(
        &mut self,
        machine: &mut Machine,
        ffs: &mut FfsPool,
        swap: &mut SwapPool,
        victim: PhysicalAddress,
    ) {
        let ffs_index = ffs_index_of(victim).expect("eviction victim outside the FFS range");
        let slot = ffs.slot(ffs_index);
        let (page, directory) = slot.mapping().expect("eviction victim without a mapping");
        let owner = slot.owner().expect("eviction victim without an owner");

        let swap_index = swap
            .allocate(owner, ffs_index)
            .unwrap_or_else(|| panic!("swap space exhausted evicting FFS frame {ffs_index}"));

        machine
            .ram_mut()
            .copy_frame(victim, swap_slot_addr(swap_index as usize));

        let pte = walker::probe(machine.ram(), directory, page)
            .expect("eviction victim with an unreachable PTE");
        pte.write(
            machine.ram_mut(),
            PtEntry::from_state(PteState::Swapped { slot: swap_index }),
        );
        machine.invalidate_page(page);

        ffs.clear_mapping(victim);

        self.trace(format_args!(
            "eviction:: FFS frame {ffs_index}, swap frame {swap_index} copy"
        ));
        self.events.push(SwapEvent::Eviction {
            ffs_index,
            swap_index,
        });
    }

    /// Bring the contents of `swap_index` back into a frame owned by `pid`.
    ///
    /// Takes a free frame when one exists; otherwise evicts a victim and
    /// claims it. Returns `None` only when victim selection fails.
    pub fn swap_in(
        &mut self,
        machine: &mut Machine,
        ffs: &mut FfsPool,
        swap: &mut SwapPool,
        swap_index: u32,
        pid: Pid,
    ) -> Option<PhysicalAddress> {
        let frame = match ffs.allocate(machine.ram_mut(), pid) {
            Some(frame) => frame,
            None => {
                let victim = self.select_victim(machine, ffs)?;
                self.swap_out(machine, ffs, swap, victim);
                ffs.claim(victim, pid);
                victim
            }
        };

        machine
            .ram_mut()
            .copy_frame(swap_slot_addr(swap_index as usize), frame);
        swap.release(swap_index);

        let ffs_index = ffs_index_of(frame).expect("swap-in target outside the FFS range");
        self.trace(format_args!(
            "swapping:: swap frame {swap_index}, FFS frame {ffs_index}"
        ));
        self.events.push(SwapEvent::SwapIn {
            swap_index,
            ffs_index,
        });
        Some(frame)
    }

    fn trace(&mut self, line: core::fmt::Arguments<'_>) {
        if self.trace_budget > 0 {
            self.trace_budget -= 1;
            log::info!("{line}");
        }
    }
}
