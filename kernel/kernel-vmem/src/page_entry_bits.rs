use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalFrame;

/// A single 32-bit paging entry in its raw bitfield form.
///
/// This models the **common superset** of the two levels (PDE and PTE) of
/// 32-bit non-PAE paging. Each bit corresponds to a hardware-defined flag or
/// the 20-bit base field.
///
/// ### Bit layout
///
/// | Bits   | Name      | Meaning |
/// |--------|-----------|----------|
/// | 0      | `P`       | Present |
/// | 1      | `RW`      | Writable |
/// | 2      | `US`      | User-mode accessible |
/// | 3      | `PWT`     | Write-through caching |
/// | 4      | `PCD`     | Disable caching |
/// | 5      | `A`       | Accessed |
/// | 6      | `D`       | Dirty (PTE only; must be 0 in a PDE) |
/// | 7      | `PS`      | Page size (PDE only; must be 0 in a PTE) |
/// | 8      | `G`       | Global |
/// | 9–11   | avail     | Software-available bits |
/// | 12–31  | base      | Frame number bits [31:12] |
///
/// ### Notes
/// - The subsystem reinterprets one combination: `P=0` with `avail=1` marks a
///   **swapped-out** page, and the base field then carries a swap-slot index
///   instead of a frame number. See [`crate::PteState`].
/// - 4 MiB pages (`PS=1`) are never produced here; the bit exists so the
///   layout stays bit-exact.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PageEntryBits {
    /// Present (P, bit 0). Valid mapping or next-level table if set.
    pub present: bool,

    /// Writable (RW, bit 1).
    pub writable: bool,

    /// User/Supervisor (US, bit 2). Set to allow user-mode access.
    pub user_access: bool,

    /// Page Write-Through (PWT, bit 3).
    pub write_through: bool,

    /// Page Cache Disable (PCD, bit 4).
    pub cache_disabled: bool,

    /// Accessed (A, bit 5). Set by the CPU on first access through this
    /// entry; software clears it to track usage.
    pub accessed: bool,

    /// Dirty (D, bit 6) — leaf only. Set by the CPU on first write.
    pub dirty: bool,

    /// Page Size (PS, bit 7) — PDE only. Must stay clear at the leaf level.
    pub large_page: bool,

    /// Global (G, bit 8).
    pub global_translation: bool,

    /// Software-available bits (9..=11). Hardware ignores these.
    #[bits(3)]
    pub os_available: u8,

    /// Base bits [31:12]: frame number, or swap slot when not present.
    #[bits(20)]
    base: u32,
}

impl PageEntryBits {
    /// Raw 20-bit base field.
    #[inline]
    #[must_use]
    pub const fn base_bits(&self) -> u32 {
        self.base()
    }

    /// Overwrite the raw 20-bit base field.
    #[inline]
    pub fn set_base_bits(&mut self, bits: u32) {
        self.set_base(bits);
    }

    /// Builder form of [`set_base_bits`](Self::set_base_bits).
    #[inline]
    #[must_use]
    pub const fn with_base_bits(self, bits: u32) -> Self {
        self.with_base(bits)
    }

    /// Interpret the base field as a physical frame number.
    #[inline]
    #[must_use]
    pub const fn frame(&self) -> PhysicalFrame {
        PhysicalFrame::new(self.base())
    }

    /// Store a physical frame number in the base field.
    #[inline]
    pub fn set_frame(&mut self, frame: PhysicalFrame) {
        self.set_base(frame.number());
    }

    /// Builder form of [`set_frame`](Self::set_frame).
    #[inline]
    #[must_use]
    pub const fn with_frame(self, frame: PhysicalFrame) -> Self {
        self.with_base(frame.number())
    }
}
