//! Page-table entries (the leaf level of the two-level walk).

use crate::{MappedFlags, PageEntryBits, PteState};
use kernel_memory_addresses::PhysicalFrame;

/// A single page-table entry (PTE).
///
/// The wrapper stays raw-representable so it can be read from and written to
/// physical memory as a plain `u32`; [`PtEntry::state`] gives the tagged view.
#[doc(alias = "PTE")]
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct PtEntry(PageEntryBits);

impl Default for PtEntry {
    fn default() -> Self {
        Self::zero()
    }
}

impl PtEntry {
    /// A zero (absent) entry.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(PageEntryBits::new())
    }

    /// Construct from a raw 32-bit value. No validation is performed.
    #[inline]
    #[must_use]
    pub const fn from_raw(v: u32) -> Self {
        Self(PageEntryBits::from_bits(v))
    }

    /// The raw 32-bit value (flags + base).
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0.into_bits()
    }

    /// Decode into the tagged state.
    #[inline]
    #[must_use]
    pub const fn state(self) -> PteState {
        PteState::decode(self.0)
    }

    /// Encode a tagged state into an entry.
    #[inline]
    #[must_use]
    pub const fn from_state(state: PteState) -> Self {
        Self(state.encode())
    }

    /// Map `frame` with the given flags.
    #[inline]
    #[must_use]
    pub const fn make_mapped(frame: PhysicalFrame, flags: MappedFlags) -> Self {
        Self::from_state(PteState::Mapped { frame, flags })
    }

    /// Identity-map `frame` with kernel permissions (present, writable,
    /// supervisor). Used only while building the kernel directory.
    #[inline]
    #[must_use]
    pub const fn make_kernel(frame: PhysicalFrame) -> Self {
        Self(
            PageEntryBits::new()
                .with_present(true)
                .with_writable(true)
                .with_frame(frame),
        )
    }

    #[inline]
    #[must_use]
    pub const fn is_present(self) -> bool {
        self.0.present()
    }

    /// The accessed bit, read without decoding the whole state.
    #[inline]
    #[must_use]
    pub const fn accessed(self) -> bool {
        self.0.accessed()
    }

    /// Clear the accessed bit (the clock's first-chance pass).
    #[inline]
    #[must_use]
    pub const fn with_accessed_cleared(self) -> Self {
        Self(self.0.with_accessed(false))
    }

    /// Set the accessed bit (hardware behavior on a translation).
    #[inline]
    #[must_use]
    pub const fn with_accessed_set(self) -> Self {
        Self(self.0.with_accessed(true))
    }

    /// Set the dirty bit (hardware behavior on a write).
    #[inline]
    #[must_use]
    pub const fn with_dirty_set(self) -> Self {
        Self(self.0.with_dirty(true))
    }

    /// Expose the underlying bitfield for inspection.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> PageEntryBits {
        self.0
    }
}

impl core::fmt::Debug for PtEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "PtEntry({:?})", self.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PteState;

    #[test]
    fn accessed_bit_edits_preserve_the_rest() {
        let e = PtEntry::make_mapped(PhysicalFrame::new(0x3000), MappedFlags::fresh_user());
        let cleared = e.with_accessed_cleared();
        assert!(!cleared.accessed());
        assert_eq!(cleared.with_accessed_set(), e);
        match cleared.state() {
            PteState::Mapped { frame, flags } => {
                assert_eq!(frame, PhysicalFrame::new(0x3000));
                assert!(flags.writable && flags.user && !flags.accessed);
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn kernel_mapping_is_supervisor_only() {
        let e = PtEntry::make_kernel(PhysicalFrame::new(5));
        match e.state() {
            PteState::Mapped { frame, flags } => {
                assert_eq!(frame.number(), 5);
                assert!(flags.writable && !flags.user);
            }
            other => panic!("unexpected state {other:?}"),
        }
    }
}
