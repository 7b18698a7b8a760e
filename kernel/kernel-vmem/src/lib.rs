//! # 32-bit two-level page-table format
//!
//! Bit-exact records for the hardware paging structures:
//!
//! - [`PageEntryBits`]: the raw 32-bit entry superset (explicit widths via
//!   `bitfield-struct`; no reliance on compiler bit-field packing).
//! - [`PdEntry`]: a page-directory entry linking a page-table frame.
//! - [`PtEntry`]: a leaf entry, with [`PteState`] as its tagged view
//!   (`Absent` / `Mapped` / `Swapped`, discriminated by `(present, avail)`).
//!
//! Tables themselves are 4 KiB frames of 1024 entries living in physical
//! memory; this crate only defines the entry formats and leaves frame access
//! to the machine layer.

mod page_entry_bits;
mod pd;
mod pt;
mod state;

pub use page_entry_bits::PageEntryBits;
pub use pd::PdEntry;
pub use pt::PtEntry;
pub use state::{MappedFlags, PteState, AVAIL_SWAPPED};
