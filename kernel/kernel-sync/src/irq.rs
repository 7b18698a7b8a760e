use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The machine's interrupt-enable line.
///
/// A single-core machine has one such line (the IF flag). The paging
/// subsystem never toggles it directly; it takes an [`IrqGuard`] at the top
/// of every public operation and lets the guard restore the prior state on
/// every exit path, including panics.
///
/// The handle is cheaply cloneable so a guard can own its reference to the
/// line without borrowing the machine it belongs to.
///
/// # Examples
///
/// ```rust
/// use kernel_sync::IntrLine;
///
/// let line = IntrLine::new_enabled();
/// {
///     let _guard = line.disable();
///     assert!(!line.enabled());
///     // critical section
/// }
/// assert!(line.enabled()); // prior state restored
/// ```
#[derive(Clone)]
pub struct IntrLine(Arc<AtomicBool>);

impl IntrLine {
    /// A line with interrupts enabled (the state after boot).
    #[must_use]
    pub fn new_enabled() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// Whether interrupts are currently enabled.
    #[inline]
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Disable interrupts, remembering the prior state.
    ///
    /// Nesting works the way `disable()`/`restore(mask)` pairs do: an inner
    /// guard sees interrupts already disabled and restores exactly that.
    #[inline]
    #[must_use]
    pub fn disable(&self) -> IrqGuard {
        let were_enabled = self.0.swap(false, Ordering::AcqRel);
        IrqGuard {
            line: self.clone(),
            were_enabled,
        }
    }
}

impl Default for IntrLine {
    fn default() -> Self {
        Self::new_enabled()
    }
}

/// RAII guard that disables interrupts on creation and restores the prior
/// state on drop.
#[must_use = "dropping the guard re-enables interrupts immediately"]
pub struct IrqGuard {
    line: IntrLine,
    /// Whether interrupts were enabled when the guard was created.
    were_enabled: bool,
}

impl Drop for IrqGuard {
    fn drop(&mut self) {
        if self.were_enabled {
            self.line.0.store(true, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_guards_restore_in_order() {
        let line = IntrLine::new_enabled();
        let outer = line.disable();
        assert!(!line.enabled());
        {
            let _inner = line.disable();
            assert!(!line.enabled());
        }
        // Inner guard restores "disabled"; still off until the outer drops.
        assert!(!line.enabled());
        drop(outer);
        assert!(line.enabled());
    }

    #[test]
    fn guard_restores_on_panic() {
        let line = IntrLine::new_enabled();
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = line.disable();
            panic!("boom");
        }));
        assert!(res.is_err());
        assert!(line.enabled());
    }
}
