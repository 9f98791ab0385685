//! Catches key code that reaches back into the table it is being looked
//! up in.
//!
//! `SlotTable::locate` holds a `Probing` token while it hashes a key and
//! walks the probe sequence, the only points where `TableKey` code runs.
//! A second `locate` on the same table before the first returns means key
//! code re-entered; debug builds panic on it. Release builds keep no flag.

#[cfg(debug_assertions)]
use core::cell::Cell;
use core::marker::PhantomData;

#[derive(Debug, Default)]
pub(crate) struct ProbeGuard {
    #[cfg(debug_assertions)]
    probing: Cell<bool>,
    // One table, one thread.
    _single_thread: PhantomData<*mut ()>,
}

impl ProbeGuard {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            probing: Cell::new(false),
            _single_thread: PhantomData,
        }
    }

    /// Mark a probe as in flight until the token drops.
    #[inline]
    pub(crate) fn begin(&self) -> Probing<'_> {
        #[cfg(debug_assertions)]
        {
            if self.probing.replace(true) {
                panic!("key code re-entered the table during a probe");
            }
        }
        Probing { guard: self }
    }
}

/// Live while a probe is in flight. Dropping it, including during unwind
/// out of a panicking key, ends the probe.
pub(crate) struct Probing<'a> {
    #[cfg_attr(not(debug_assertions), allow(dead_code))]
    guard: &'a ProbeGuard,
}

impl Drop for Probing<'_> {
    #[inline]
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            self.guard.probing.set(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ProbeGuard;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[test]
    fn back_to_back_probes() {
        let g = ProbeGuard::new();
        for _ in 0..3 {
            let _p = g.begin();
        }
    }

    #[cfg(debug_assertions)]
    #[test]
    fn overlapping_probe_panics() {
        let g = ProbeGuard::new();
        let res = catch_unwind(AssertUnwindSafe(|| {
            let _outer = g.begin();
            let _inner = g.begin();
        }));
        assert!(res.is_err());
        // The outer token was dropped while unwinding.
        let _p = g.begin();
    }

    #[test]
    fn panicking_key_code_ends_the_probe() {
        let g = ProbeGuard::default();
        let res = catch_unwind(AssertUnwindSafe(|| {
            let _p = g.begin();
            panic!("hash raised");
        }));
        assert!(res.is_err());
        let _p = g.begin();
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn overlapping_probe_is_unchecked_in_release() {
        let g = ProbeGuard::new();
        let _outer = g.begin();
        let _inner = g.begin();
    }
}
