//! # Interrupt-disable critical sections
//!
//! The concurrency model of the memory subsystem is a single core with
//! interrupt-disabled critical sections, so the only primitive it needs is
//! the machine's interrupt-enable line and the guard that scopes it:
//! [`IntrLine`] / [`IrqGuard`] model the `disable()`/`restore(mask)` pairs —
//! every public paging operation holds an [`IrqGuard`] for its whole
//! duration, and the guard restores the prior state on every exit path.

mod irq;

pub use irq::{IntrLine, IrqGuard};
