//! [`ComputeOnce`]: an at-most-once cell for cached derived state.
//!
//! Reads take an uncontended fast path through a [`OnceLock`]. On a miss the
//! caller enters a per-cell mutex, checks again, and only then runs the
//! computation. A failed computation stores nothing, so the next caller
//! retries it.

use std::convert::Infallible;
use std::fmt;
use std::sync::{Mutex, OnceLock, PoisonError};

/// A value computed lazily, at most once, and shared thereafter.
pub struct ComputeOnce<T> {
    /// The cached value once computed.
    value: OnceLock<T>,
    /// Serialises computations on a cache miss.
    guard: Mutex<()>,
}

impl<T> ComputeOnce<T> {
    /// Create an empty cell.
    pub const fn new() -> Self {
        Self {
            value: OnceLock::new(),
            guard: Mutex::new(()),
        }
    }

    /// Borrow the cached value, if computed.
    pub fn get(&self) -> Option<&T> {
        self.value.get()
    }

    /// Whether the value has been computed.
    pub fn is_computed(&self) -> bool {
        self.value.get().is_some()
    }

    /// Return the cached value, computing it with `compute` on first use.
    pub fn get_or_init<F>(&self, compute: F) -> &T
    where
        F: FnOnce() -> T,
    {
        match self.get_or_try_init(|| Ok::<T, Infallible>(compute())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Return the cached value, computing it with `compute` on first use.
    ///
    /// Concurrent first callers block on the cell's mutex; exactly one of
    /// them runs `compute` and the others observe its result.
    ///
    /// # Errors
    ///
    /// Returns the error from `compute`. Nothing is cached in that case.
    pub fn get_or_try_init<F, E>(&self, compute: F) -> Result<&T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(value) = self.value.get() {
            return Ok(value);
        }
        let _lock = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = self.value.get() {
            return Ok(value);
        }
        let computed = compute()?;
        Ok(self.value.get_or_init(|| computed))
    }
}

impl<T> Default for ComputeOnce<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for ComputeOnce<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value.get() {
            Some(value) => f.debug_tuple("ComputeOnce").field(value).finish(),
            None => f.write_str("ComputeOnce(<pending>)"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn computes_once_and_caches() {
        let calls = AtomicUsize::new(0);
        let cell = ComputeOnce::new();
        let first = *cell.get_or_init(|| calls.fetch_add(1, Ordering::SeqCst) + 10);
        let second = *cell.get_or_init(|| calls.fetch_add(1, Ordering::SeqCst) + 20);
        assert_eq!(first, 10);
        assert_eq!(second, 10);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cell.is_computed());
    }

    #[test]
    fn failures_are_not_cached() {
        let cell: ComputeOnce<u32> = ComputeOnce::new();
        let failed: Result<&u32, &str> = cell.get_or_try_init(|| Err("not yet"));
        assert_eq!(failed, Err("not yet"));
        assert!(!cell.is_computed());
        let value = cell.get_or_try_init(|| Ok::<_, &str>(7)).unwrap();
        assert_eq!(*value, 7);
    }

    #[test]
    fn concurrent_first_access_computes_once() {
        const THREADS: usize = 16;
        let calls = AtomicUsize::new(0);
        let cell: ComputeOnce<Arc<String>> = ComputeOnce::new();
        let barrier = Barrier::new(THREADS);

        let seen: Vec<Arc<String>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        Arc::clone(cell.get_or_init(|| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(20));
                            Arc::new("timing".to_owned())
                        }))
                    })
                })
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let first = seen.first().unwrap();
        assert!(seen.iter().all(|value| Arc::ptr_eq(value, first)));
    }
}
