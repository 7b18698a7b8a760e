//! Page-directory entries (the upper level of the two-level walk).
//!
//! A present PDE points at a page-table frame; it never maps memory directly
//! (4 MiB pages are not used). A PDE whose decoded table frame is zero is
//! treated as absent, so a partially written entry can never send the walk
//! into frame 0.

use crate::PageEntryBits;
use kernel_memory_addresses::PhysicalFrame;

/// A single page-directory entry (PDE).
#[doc(alias = "PDE")]
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct PdEntry(PageEntryBits);

impl Default for PdEntry {
    fn default() -> Self {
        Self::zero()
    }
}

impl PdEntry {
    /// A zero (non-present) entry.
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

    /// Link a page table: `present=1`, `writable=1`, `user` as given.
    ///
    /// The `user` bit must be set for directory slots covering user space;
    /// the permission check intersects it with the leaf's own user bit.
    #[inline]
    #[must_use]
    pub const fn make_table(frame: PhysicalFrame, user: bool) -> Self {
        Self(
            PageEntryBits::new()
                .with_present(true)
                .with_writable(true)
                .with_user_access(user)
                .with_frame(frame),
        )
    }

    /// The linked page-table frame, if this entry is usable.
    ///
    /// Returns `None` for non-present entries and for the defensive case of
    /// a present entry whose base decodes to frame 0.
    #[inline]
    #[must_use]
    pub const fn table(self) -> Option<PhysicalFrame> {
        if self.0.present() && self.0.base_bits() != 0 {
            Some(self.0.frame())
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_present(self) -> bool {
        self.0.present()
    }

    /// Whether this directory slot covers user-accessible space.
    #[inline]
    #[must_use]
    pub const fn is_user(self) -> bool {
        self.0.user_access()
    }

    /// Expose the underlying bitfield for inspection.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> PageEntryBits {
        self.0
    }
}

impl core::fmt::Debug for PdEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.table() {
            Some(frame) => write!(
                f,
                "PdEntry(table={frame:?}, user={})",
                self.0.user_access()
            ),
            None => write!(f, "PdEntry(absent)"),
        }
    }
}
