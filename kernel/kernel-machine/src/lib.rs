//! # Simulated 32-bit paged machine
//!
//! The hardware half of the memory subsystem: everything the paging code
//! would otherwise reach with privileged instructions lives here as explicit
//! state.
//!
//! - [`layout`]: the fixed physical memory map and the per-process heap
//!   window.
//! - [`PhysMemory`]: flat physical RAM, with entry-granular access for the
//!   paging structures.
//! - [`Registers`]: CR2 (fault address) and CR3 (active directory).
//! - [`Tlb`]: the translation cache; `invlpg` and CR3-load flush semantics.
//! - [`Machine`]: the MMU proper — [`Machine::load`] / [`Machine::store`]
//!   translate, maintain accessed/dirty bits, and raise [`PageFault`].
//!
//! Nothing in this crate knows about processes, pools or replacement; it
//! only executes the architecture.

pub mod layout;
mod machine;
mod ram;
mod registers;
mod tlb;

pub use machine::{AccessMode, Machine, PageFault, PageFaultKind};
pub use ram::PhysMemory;
pub use registers::Registers;
pub use tlb::{Tlb, TlbEntry};
