/*!
 * Read-Copy-Update (RCU) Cell
 * Zero-contention reads for the engine's read-mostly tables
 */

use arc_swap::{ArcSwap, Guard};
use std::sync::Arc;

/// RCU-protected value with lock-free reads
///
/// # Performance
///
/// - **Reads**: one atomic pointer load
/// - **Writes**: clone-modify-swap; the closure may run more than once under contention
///
/// Readers holding a snapshot keep seeing it until they load again, so a
/// writer can never expose a half-built value.
pub struct RcuCell<T> {
    inner: ArcSwap<T>,
}

impl<T> RcuCell<T> {
    #[inline]
    pub fn new(value: T) -> Self {
        Self {
            inner: ArcSwap::from_pointee(value),
        }
    }

    /// Current snapshot
    #[inline(always)]
    pub fn load(&self) -> Arc<T> {
        self.inner.load_full()
    }

    /// Replace the value with `f(current)`, returning what `f` produced alongside
    #[inline]
    pub fn update<F, R>(&self, mut f: F) -> R
    where
        F: FnMut(&T) -> (T, R),
    {
        let mut current = self.inner.load_full();
        loop {
            let (next, out) = f(&current);
            let previous = self.inner.compare_and_swap(&current, Arc::new(next));
            if Arc::ptr_eq(&*previous, &current) {
                return out;
            }
            // Lost the race: retry against the winner's value
            current = Guard::into_inner(previous);
        }
    }

    /// Replace value entirely
    #[inline]
    pub fn store(&self, value: T) {
        self.inner.store(Arc::new(value));
    }
}

impl<T: Default> Default for RcuCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for RcuCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RcuCell").field(&self.load()).finish()
    }
}
