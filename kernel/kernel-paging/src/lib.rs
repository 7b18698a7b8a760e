//! # Demand-paged virtual memory
//!
//! The core subsystem of the kernel: every user process gets an isolated
//! 256 MiB virtual heap, lazily backed by frames from the bounded FFS pool;
//! when the pool runs dry, a clock (second-chance) replacement engine evicts
//! pages to the swap area.
//!
//! The moving parts, leaves first:
//!
//! - [`FfsPool`] / [`PtPool`] / [`SwapPool`]: fixed-address frame pools with
//!   per-slot metadata and free counts.
//! - [`walker`]: resolves a virtual page to its leaf entry, creating page
//!   tables on demand.
//! - [`RegionList`]: per-process first-fit virtual allocator with
//!   split-on-alloc and coalesce-on-free.
//! - [`ReplacementEngine`]: the persistent clock hand, swap-out and swap-in.
//! - [`Kernel`]: the boot-constructed facade tying it all to the simulated
//!   machine — `vcreate`, `vmalloc`/`vfree`, the page-fault handler, process
//!   teardown and the introspection counters.
//!
//! Concurrency model: single core, interrupt-disabled critical sections.
//! Every public operation takes an `IrqGuard` on entry; the guard restores
//! the prior interrupt state on every exit path.

mod error;
mod fault;
mod ffs;
mod kernel;
mod process;
mod pt_pool;
mod regions;
mod replacement;
mod swap_pool;
pub mod walker;

pub use error::{KillReason, ProcessKilled, VmError};
pub use ffs::{FfsPool, FfsSlot};
pub use kernel::{BootOptions, Kernel};
pub use process::{Pid, Process, ProcessTable, ProcessVm, MAX_PROCESSES};
pub use pt_pool::PtPool;
pub use regions::{Region, RegionList};
pub use replacement::{ReplacementEngine, SwapEvent};
pub use swap_pool::SwapPool;
