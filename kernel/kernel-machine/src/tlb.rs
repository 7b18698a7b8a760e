use kernel_memory_addresses::{PhysicalFrame, VirtualPage};
use std::collections::HashMap;

/// One cached translation.
///
/// Permissions are snapshotted at fill time, so a PTE rewrite is invisible
/// until the entry is invalidated — which is exactly why the paging code
/// must `invlpg` after every PTE it changes.
#[derive(Copy, Clone, Debug)]
pub struct TlbEntry {
    pub frame: PhysicalFrame,
    pub writable: bool,
    pub user: bool,
    /// Whether the dirty bit has already been pushed to the PTE; a write
    /// through a clean entry walks once to set it.
    pub dirty: bool,
}

/// Software model of the translation lookaside buffer.
///
/// Caches per-page translations for the *active* address space only: a CR3
/// load flushes everything (no global pages), `invlpg` drops one page.
#[derive(Default)]
pub struct Tlb {
    entries: HashMap<VirtualPage, TlbEntry>,
}

impl Tlb {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn lookup(&self, page: VirtualPage) -> Option<TlbEntry> {
        self.entries.get(&page).copied()
    }

    #[inline]
    pub fn fill(&mut self, page: VirtualPage, entry: TlbEntry) {
        self.entries.insert(page, entry);
    }

    #[inline]
    pub fn mark_dirty(&mut self, page: VirtualPage) {
        if let Some(e) = self.entries.get_mut(&page) {
            e.dirty = true;
        }
    }

    /// Drop the cached translation for one page (`invlpg`).
    #[inline]
    pub fn invalidate(&mut self, page: VirtualPage) {
        self.entries.remove(&page);
    }

    /// Drop everything (CR3 load).
    #[inline]
    pub fn flush(&mut self) {
        self.entries.clear();
    }

    /// Number of cached translations (introspection for tests).
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
