//! Tagged view of a leaf entry.
//!
//! Every PTE is in exactly one of three states, discriminated by the
//! `(present, avail)` bit pair:
//!
//! | `present` | `avail` | State | Base field holds |
//! |-----------|---------|---------|------------------|
//! | 1 | — | [`PteState::Mapped`] | frame number |
//! | 0 | 1 | [`PteState::Swapped`] | swap-slot index |
//! | 0 | 0 | [`PteState::Absent`] | nothing |
//!
//! Encode/decode round-trips the hardware layout exactly; the enum exists so
//! the fault handler and the replacement engine can match on intent instead
//! of poking bits.

use crate::PageEntryBits;
use kernel_memory_addresses::PhysicalFrame;

/// Software-available marker value that tags a swapped-out entry.
pub const AVAIL_SWAPPED: u8 = 1;

/// Flags of a mapped (present) leaf entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MappedFlags {
    pub writable: bool,
    pub user: bool,
    pub accessed: bool,
    pub dirty: bool,
}

impl MappedFlags {
    /// The flags the fault handler installs: writable, user-accessible, and
    /// accessed so the page gets one clock tick of protection.
    #[inline]
    #[must_use]
    pub const fn fresh_user() -> Self {
        Self {
            writable: true,
            user: true,
            accessed: true,
            dirty: false,
        }
    }
}

/// The three states of a leaf entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PteState {
    /// Nothing behind this page yet (all-zero entry).
    Absent,
    /// Backed by a physical frame.
    Mapped {
        frame: PhysicalFrame,
        flags: MappedFlags,
    },
    /// Contents saved to a swap slot; the base field is the slot index.
    Swapped { slot: u32 },
}

impl PteState {
    /// Decode the raw bits. Any non-present entry that does not carry the
    /// swapped marker decodes as [`PteState::Absent`].
    #[must_use]
    pub const fn decode(bits: PageEntryBits) -> Self {
        if bits.present() {
            Self::Mapped {
                frame: bits.frame(),
                flags: MappedFlags {
                    writable: bits.writable(),
                    user: bits.user_access(),
                    accessed: bits.accessed(),
                    dirty: bits.dirty(),
                },
            }
        } else if bits.os_available() == AVAIL_SWAPPED {
            Self::Swapped {
                slot: bits.base_bits(),
            }
        } else {
            Self::Absent
        }
    }

    /// Encode into the hardware layout.
    ///
    /// A swapped entry carries only the marker and the slot index: writable,
    /// user, accessed and dirty are all cleared. An absent entry is all
    /// zeros.
    #[must_use]
    pub const fn encode(self) -> PageEntryBits {
        match self {
            Self::Absent => PageEntryBits::new(),
            Self::Mapped { frame, flags } => PageEntryBits::new()
                .with_present(true)
                .with_writable(flags.writable)
                .with_user_access(flags.user)
                .with_accessed(flags.accessed)
                .with_dirty(flags.dirty)
                .with_frame(frame),
            Self::Swapped { slot } => PageEntryBits::new()
                .with_os_available(AVAIL_SWAPPED)
                .with_base_bits(slot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapped_round_trip() {
        let state = PteState::Mapped {
            frame: PhysicalFrame::new(0x2ABC),
            flags: MappedFlags::fresh_user(),
        };
        assert_eq!(PteState::decode(state.encode()), state);
        // P | RW | US | A | base
        assert_eq!(state.encode().into_bits(), 0x02AB_C027);
    }

    #[test]
    fn swapped_round_trip() {
        let state = PteState::Swapped { slot: 0x7FFF };
        let bits = state.encode();
        assert!(!bits.present());
        assert_eq!(bits.os_available(), AVAIL_SWAPPED);
        assert_eq!(bits.into_bits(), 0x07FF_F200);
        assert_eq!(PteState::decode(bits), state);
    }

    #[test]
    fn absent_is_all_zeros() {
        assert_eq!(PteState::Absent.encode().into_bits(), 0);
        assert_eq!(PteState::decode(PageEntryBits::new()), PteState::Absent);
    }

    #[test]
    fn stray_flag_bits_without_marker_decode_absent() {
        // A cleared entry that kept an accessed bit is still absent.
        let bits = PageEntryBits::new().with_accessed(true);
        assert_eq!(PteState::decode(bits), PteState::Absent);
    }
}
