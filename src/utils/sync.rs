//! Owner-tracking locks.
//!
//! Reflection clients that cache per-type results (a type's field list, a comparison plan)
//! guard those caches with the locks in this module. They wrap `parking_lot` primitives and
//! additionally record which thread holds them, so code that requires the lock to be held can
//! check it with [`Lock::assert_owner`].
//!
//! # Key Components
//!
//! - [`UnfairLock`] - A non-recursive mutual exclusion lock
//! - [`UnfairRecursiveLock`] - A lock the owning thread may acquire again
//! - [`Lock`] - The interface both share
//!
//! Acquisition returns a guard; the lock is released when the guard is dropped, on every exit
//! path including unwinding. There is no explicit unlock and no explicit deallocation.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::{Mutex, MutexGuard, ReentrantMutex, ReentrantMutexGuard};

use crate::utils::identifier::next_identifier;

const NO_OWNER: u64 = 0;

thread_local! {
    static THREAD_TOKEN: u64 = next_identifier();
}

/// Non-zero token identifying the calling thread
fn current_thread() -> u64 {
    THREAD_TOKEN.with(|token| *token)
}

/// Common interface of the owner-tracking locks
pub trait Lock {
    /// Guard holding the lock until dropped
    type Guard<'a>
    where
        Self: 'a;

    /// Block until the lock is acquired
    fn lock(&self) -> Self::Guard<'_>;

    /// Acquire the lock if it is free (or, for recursive locks, already held by this thread)
    fn try_lock(&self) -> Option<Self::Guard<'_>>;

    /// Returns `true` if the calling thread holds the lock
    fn is_owned_by_current_thread(&self) -> bool;

    /// Panic unless the calling thread holds the lock
    ///
    /// # Panics
    /// Panics if the lock is free or held by another thread.
    fn assert_owner(&self) {
        assert!(
            self.is_owned_by_current_thread(),
            "lock is not held by the current thread"
        );
    }

    /// Run `f` with the lock held
    fn with<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.lock();
        f()
    }
}

/// A non-recursive lock.
///
/// Locking it again from the owning thread deadlocks, as with any plain mutex.
///
/// # Examples
///
/// ```rust
/// use metascope::utils::sync::{Lock, UnfairLock};
///
/// let lock = UnfairLock::new();
/// {
///     let _guard = lock.lock();
///     lock.assert_owner();
/// }
/// assert!(!lock.is_owned_by_current_thread());
/// ```
#[derive(Debug, Default)]
pub struct UnfairLock {
    inner: Mutex<()>,
    owner: AtomicU64,
}

impl UnfairLock {
    /// Create an unlocked lock
    #[must_use]
    pub fn new() -> Self {
        UnfairLock {
            inner: Mutex::new(()),
            owner: AtomicU64::new(NO_OWNER),
        }
    }

    fn acquired<'a>(&'a self, guard: MutexGuard<'a, ()>) -> UnfairLockGuard<'a> {
        self.owner.store(current_thread(), Ordering::Release);
        UnfairLockGuard {
            lock: self,
            _guard: guard,
        }
    }
}

impl Lock for UnfairLock {
    type Guard<'a> = UnfairLockGuard<'a>;

    fn lock(&self) -> UnfairLockGuard<'_> {
        let guard = self.inner.lock();
        self.acquired(guard)
    }

    fn try_lock(&self) -> Option<UnfairLockGuard<'_>> {
        self.inner.try_lock().map(|guard| self.acquired(guard))
    }

    fn is_owned_by_current_thread(&self) -> bool {
        self.owner.load(Ordering::Acquire) == current_thread()
    }
}

/// Guard of an [`UnfairLock`]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct UnfairLockGuard<'a> {
    lock: &'a UnfairLock,
    _guard: MutexGuard<'a, ()>,
}

impl Drop for UnfairLockGuard<'_> {
    fn drop(&mut self) {
        // Runs before the inner guard releases the mutex.
        self.lock.owner.store(NO_OWNER, Ordering::Release);
    }
}

/// A lock the owning thread may acquire repeatedly.
///
/// It is released once every guard taken by the owner has been dropped.
#[derive(Debug, Default)]
pub struct UnfairRecursiveLock {
    inner: ReentrantMutex<()>,
    owner: AtomicU64,
    depth: AtomicUsize,
}

impl UnfairRecursiveLock {
    /// Create an unlocked lock
    #[must_use]
    pub fn new() -> Self {
        UnfairRecursiveLock {
            inner: ReentrantMutex::new(()),
            owner: AtomicU64::new(NO_OWNER),
            depth: AtomicUsize::new(0),
        }
    }

    /// How many guards the owner currently holds
    #[must_use]
    pub fn depth(&self) -> usize {
        if self.is_owned_by_current_thread() {
            self.depth.load(Ordering::Acquire)
        } else {
            0
        }
    }

    fn acquired<'a>(&'a self, guard: ReentrantMutexGuard<'a, ()>) -> UnfairRecursiveLockGuard<'a> {
        self.owner.store(current_thread(), Ordering::Release);
        self.depth.fetch_add(1, Ordering::AcqRel);
        UnfairRecursiveLockGuard {
            lock: self,
            _guard: guard,
        }
    }
}

impl Lock for UnfairRecursiveLock {
    type Guard<'a> = UnfairRecursiveLockGuard<'a>;

    fn lock(&self) -> UnfairRecursiveLockGuard<'_> {
        let guard = self.inner.lock();
        self.acquired(guard)
    }

    fn try_lock(&self) -> Option<UnfairRecursiveLockGuard<'_>> {
        self.inner.try_lock().map(|guard| self.acquired(guard))
    }

    fn is_owned_by_current_thread(&self) -> bool {
        self.owner.load(Ordering::Acquire) == current_thread()
    }
}

/// Guard of an [`UnfairRecursiveLock`]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct UnfairRecursiveLockGuard<'a> {
    lock: &'a UnfairRecursiveLock,
    _guard: ReentrantMutexGuard<'a, ()>,
}

impl Drop for UnfairRecursiveLockGuard<'_> {
    fn drop(&mut self) {
        if self.lock.depth.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.lock.owner.store(NO_OWNER, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::atomic::AtomicBool,
        thread,
    };

    #[test]
    fn unfair_lock_tracks_owner() {
        let lock = UnfairLock::new();
        assert!(!lock.is_owned_by_current_thread());

        let guard = lock.lock();
        lock.assert_owner();
        assert!(lock.try_lock().is_none());

        thread::scope(|scope| {
            scope.spawn(|| {
                assert!(!lock.is_owned_by_current_thread());
                assert!(lock.try_lock().is_none());
            });
        });

        drop(guard);
        assert!(!lock.is_owned_by_current_thread());
        assert!(lock.try_lock().is_some());
    }

    #[test]
    #[should_panic(expected = "lock is not held by the current thread")]
    fn assert_owner_panics_when_free() {
        UnfairLock::new().assert_owner();
    }

    #[test]
    #[should_panic(expected = "lock is not held by the current thread")]
    fn assert_owner_panics_on_other_thread() {
        let lock = UnfairLock::new();
        let _guard = lock.lock();
        let result = thread::scope(|scope| scope.spawn(|| lock.assert_owner()).join());
        if let Err(panic) = result {
            std::panic::resume_unwind(panic);
        }
    }

    #[test]
    fn released_on_unwind() {
        let lock = UnfairLock::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = lock.lock();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert!(!lock.is_owned_by_current_thread());
        assert!(lock.try_lock().is_some());
    }

    #[test]
    fn recursive_lock_nests() {
        let lock = UnfairRecursiveLock::new();
        let outer = lock.lock();
        let inner = lock.try_lock().unwrap();
        assert_eq!(lock.depth(), 2);
        lock.assert_owner();

        drop(inner);
        assert_eq!(lock.depth(), 1);
        lock.assert_owner();

        drop(outer);
        assert_eq!(lock.depth(), 0);
        assert!(!lock.is_owned_by_current_thread());
    }

    #[test]
    fn recursive_lock_excludes_other_threads() {
        let lock = UnfairRecursiveLock::new();
        let _guard = lock.lock();
        thread::scope(|scope| {
            scope.spawn(|| assert!(lock.try_lock().is_none()));
        });
    }

    #[test]
    fn with_serializes_critical_sections() {
        let lock = UnfairLock::new();
        let inside = AtomicBool::new(false);
        let total = AtomicUsize::new(0);

        thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..100 {
                        lock.with(|| {
                            assert!(!inside.swap(true, Ordering::AcqRel));
                            total.fetch_add(1, Ordering::Relaxed);
                            inside.store(false, Ordering::Release);
                        });
                    }
                });
            }
        });

        assert_eq!(total.load(Ordering::Relaxed), 400);
    }
}
