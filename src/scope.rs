//! Scoped execution under a reader-writer lock.
//!
//! See the documentation for the [`RwScope`] type for details.
use crate::{
    loom::sync::atomic::{AtomicBool, Ordering::*},
    raw::{DefaultRawRwLock, RawRwLock},
    util::fmt,
};
use core::marker::PhantomData;

#[cfg(test)]
mod tests;

/// A scope-safe wrapper around a [readers-writer lock].
///
/// Rather than returning RAII guards, an `RwScope` runs a closure while
/// holding the lock, and releases the lock when the closure returns, whether
/// it returned `Ok`, returned `Err`, or panicked. The closure's result is
/// returned to the caller unchanged.
///
/// Any number of read-scoped closures may run at the same time, while a
/// write-scoped closure excludes every other read- or write-scoped closure on
/// the same `RwScope`. The `RwScope` adds no exclusion of its own; all
/// exclusion is provided by the underlying [`RawRwLock`].
///
/// A write-scoped closure may also be given a [`Downgrader`], which allows it
/// to trade its exclusive lock for a shared lock part of the way through,
/// without any gap where no lock is held.
///
/// # Reentrancy
///
/// Whether scopes may be nested on the same `RwScope` is decided by the raw
/// lock. With the [`DefaultRawRwLock`], read scopes may be nested inside read
/// scopes, but the write lock is **not** reentrant: entering a read or write
/// scope from inside a write scope on the same `RwScope` deadlocks. Code which
/// needs to read after writing should use a downgradable write scope instead.
///
/// # Examples
///
/// ```
/// use morel::RwScope;
/// use std::convert::Infallible;
///
/// let scope = RwScope::new();
///
/// let answer = scope.get_with_read_lock(|| Ok::<_, Infallible>(42));
/// assert_eq!(answer, Ok(42));
///
/// let res = scope.run_with_write_lock(|| Err("something went wrong"));
/// assert_eq!(res, Err("something went wrong"));
///
/// // the lock was released even though the closure failed.
/// assert!(!scope.is_locked());
/// ```
///
/// [readers-writer lock]: https://en.wikipedia.org/wiki/Readers%E2%80%93writer_lock
pub struct RwScope<Lock = DefaultRawRwLock> {
    lock: Lock,
}

/// A single-use capability to downgrade the exclusive lock held by a
/// write-scoped closure into a shared lock.
///
/// A `Downgrader` is passed by reference to the closures given to
/// [`RwScope::get_with_downgradable_write_lock`] and
/// [`RwScope::run_with_downgradable_write_lock`]. When the closure returns,
/// whichever lock is held at that point is released: the exclusive lock if
/// [`downgrade`] was never called, or the shared lock if it was.
///
/// A `Downgrader` is only [`Sync`] if the raw lock's
/// [`GuardMarker`](RawRwLock::GuardMarker) is [`Send`]. With the
/// [`DefaultRawRwLock`], it cannot be shared with other threads, so only the
/// thread that acquired the exclusive lock may downgrade it.
///
/// [`downgrade`]: Downgrader::downgrade
pub struct Downgrader<'scope, Lock: RawRwLock = DefaultRawRwLock> {
    lock: &'scope Lock,
    downgraded: AtomicBool,
    _marker: PhantomData<Lock::GuardMarker>,
}

/// Releases a shared lock when dropped.
struct ReadScope<'scope, Lock: RawRwLock> {
    lock: &'scope Lock,
}

/// Releases an exclusive lock when dropped.
struct WriteScope<'scope, Lock: RawRwLock> {
    lock: &'scope Lock,
}

// === impl RwScope ===

impl RwScope {
    /// Returns a new, unlocked `RwScope` using the [`DefaultRawRwLock`].
    ///
    /// # Examples
    ///
    /// ```
    /// use morel::RwScope;
    ///
    /// let scope = RwScope::new();
    /// assert!(!scope.is_locked());
    /// ```
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lock: DefaultRawRwLock::new(),
        }
    }
}

impl Default for RwScope {
    fn default() -> Self {
        Self::new()
    }
}

impl<Lock> RwScope<Lock> {
    /// Returns a new `RwScope` which drives the provided raw `lock`.
    ///
    /// This constructor is used to override the lock implementation. By
    /// default, [`RwScope::new`] uses the [`DefaultRawRwLock`]. Any type
    /// implementing [`lock_api::RawRwLock`] and
    /// [`lock_api::RawRwLockDowngrade`] may be used here.
    ///
    /// The provided lock should be unlocked.
    ///
    /// # Examples
    ///
    /// ```
    /// use morel::RwScope;
    /// use lock_api::RawRwLock;
    ///
    /// let scope = RwScope::with_raw_lock(parking_lot::RawRwLock::INIT);
    /// # drop(scope);
    /// ```
    #[must_use]
    pub const fn with_raw_lock(lock: Lock) -> Self {
        Self { lock }
    }

    /// Returns a reference to the raw lock driven by this `RwScope`.
    #[inline]
    #[must_use]
    pub fn raw_lock(&self) -> &Lock {
        &self.lock
    }
}

impl<Lock: RawRwLock> RwScope<Lock> {
    /// Runs `body` while holding a shared read lock, returning its result.
    ///
    /// The calling thread blocks until no writer holds the lock. The shared
    /// lock is released after `body` returns, whether or not it succeeded.
    #[cfg_attr(test, track_caller)]
    pub fn get_with_read_lock<T, E>(&self, body: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        let _scope = self.read_scope();
        body()
    }

    /// Runs `body` while holding a shared read lock.
    ///
    /// This is equivalent to [`RwScope::get_with_read_lock`] for a `body`
    /// that produces no value.
    #[cfg_attr(test, track_caller)]
    pub fn run_with_read_lock<E>(&self, body: impl FnOnce() -> Result<(), E>) -> Result<(), E> {
        self.get_with_read_lock(body)
    }

    /// Runs `body` while holding the exclusive write lock, returning its
    /// result.
    ///
    /// The calling thread blocks until no readers or writers hold the lock.
    /// The exclusive lock is released after `body` returns, whether or not it
    /// succeeded.
    #[cfg_attr(test, track_caller)]
    pub fn get_with_write_lock<T, E>(&self, body: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        let _scope = self.write_scope();
        body()
    }

    /// Runs `body` while holding the exclusive write lock.
    ///
    /// This is equivalent to [`RwScope::get_with_write_lock`] for a `body`
    /// that produces no value.
    #[cfg_attr(test, track_caller)]
    pub fn run_with_write_lock<E>(&self, body: impl FnOnce() -> Result<(), E>) -> Result<(), E> {
        self.get_with_write_lock(body)
    }

    /// Runs `body` while holding a lock that *starts* as the exclusive write
    /// lock, and may be downgraded to a shared read lock using the provided
    /// [`Downgrader`].
    ///
    /// When `body` returns, the exclusive lock is released if it was never
    /// downgraded, and the shared lock is released otherwise.
    ///
    /// # Examples
    ///
    /// ```
    /// use morel::RwScope;
    /// use std::convert::Infallible;
    ///
    /// let scope = RwScope::new();
    /// let value = scope.get_with_downgradable_write_lock(|downgrader| {
    ///     assert!(scope.is_locked_exclusive());
    ///     // ... write ...
    ///
    ///     downgrader.downgrade();
    ///     assert!(scope.is_locked());
    ///     assert!(!scope.is_locked_exclusive());
    ///     // ... other readers may now enter, but no writer ...
    ///
    ///     Ok::<_, Infallible>("done")
    /// });
    ///
    /// assert_eq!(value, Ok("done"));
    /// assert!(!scope.is_locked());
    /// ```
    #[cfg_attr(test, track_caller)]
    pub fn get_with_downgradable_write_lock<T, E>(
        &self,
        body: impl FnOnce(&Downgrader<'_, Lock>) -> Result<T, E>,
    ) -> Result<T, E> {
        self.lock.lock_exclusive();
        tracing::trace!(scope = ?fmt::ptr(self), "acquired downgradable write lock");
        let downgrader = Downgrader {
            lock: &self.lock,
            downgraded: AtomicBool::new(false),
            _marker: PhantomData,
        };
        body(&downgrader)
    }

    /// Runs `body` while holding a lock that *starts* as the exclusive write
    /// lock, and may be downgraded to a shared read lock using the provided
    /// [`Downgrader`].
    ///
    /// This is equivalent to [`RwScope::get_with_downgradable_write_lock`]
    /// for a `body` that produces no value.
    #[cfg_attr(test, track_caller)]
    pub fn run_with_downgradable_write_lock<E>(
        &self,
        body: impl FnOnce(&Downgrader<'_, Lock>) -> Result<(), E>,
    ) -> Result<(), E> {
        self.get_with_downgradable_write_lock(body)
    }

    /// Returns `true` if the lock is currently held in any way.
    ///
    /// # Note
    ///
    /// This method is not synchronized, and its value may become out of date
    /// as soon as it is read. This is **not** intended to be used for
    /// synchronization purposes! It is intended only for debugging purposes
    /// or for use as a heuristic.
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    /// Returns `true` if a writer currently holds the exclusive lock.
    ///
    /// # Note
    ///
    /// This method is not synchronized, and its value may become out of date
    /// as soon as it is read. This is **not** intended to be used for
    /// synchronization purposes! It is intended only for debugging purposes
    /// or for use as a heuristic.
    #[inline]
    #[must_use]
    pub fn is_locked_exclusive(&self) -> bool {
        self.lock.is_locked_exclusive()
    }

    fn read_scope(&self) -> ReadScope<'_, Lock> {
        self.lock.lock_shared();
        tracing::trace!(scope = ?fmt::ptr(self), "acquired read lock");
        ReadScope { lock: &self.lock }
    }

    fn write_scope(&self) -> WriteScope<'_, Lock> {
        self.lock.lock_exclusive();
        tracing::trace!(scope = ?fmt::ptr(self), "acquired write lock");
        WriteScope { lock: &self.lock }
    }
}

impl<Lock: RawRwLock + fmt::Debug> fmt::Debug for RwScope<Lock> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RwScope")
            .field("lock", &self.lock)
            .finish()
    }
}

// === impl Downgrader ===

impl<Lock: RawRwLock> Downgrader<'_, Lock> {
    /// Downgrades the currently held exclusive lock into a shared lock.
    ///
    /// Once this returns, other readers may enter the lock, but no writer can
    /// acquire it until the shared lock is released at the end of the
    /// enclosing scope. No writer can acquire the lock *during* the
    /// transition, either.
    ///
    /// Only the first call has any effect. Calling `downgrade` on an
    /// already-downgraded lock does nothing.
    ///
    /// # Reentrancy
    ///
    /// If the raw lock is reentrant and the current thread holds more than one
    /// exclusive lock, only the exclusive lock acquired by this scope is
    /// released. Whether the thread may then still write is up to the raw
    /// lock.
    #[cfg_attr(test, track_caller)]
    pub fn downgrade(&self) {
        if test_dbg!(self
            .downgraded
            .compare_exchange(false, true, AcqRel, Acquire))
        .is_err()
        {
            test_debug!("already downgraded");
            return;
        }

        unsafe {
            // Safety: the exclusive lock is acquired when the `Downgrader` is
            // constructed, and `downgraded` was `false` until the CAS above,
            // so this scope still holds it.
            self.lock.downgrade();
        }
        tracing::trace!(lock = ?fmt::ptr(self.lock), "downgraded write lock to read lock");
    }

    /// Returns `true` if [`downgrade`](Self::downgrade) has been called.
    #[inline]
    #[must_use]
    pub fn is_downgraded(&self) -> bool {
        self.downgraded.load(Acquire)
    }
}

impl<Lock: RawRwLock> Drop for Downgrader<'_, Lock> {
    #[cfg_attr(test, track_caller)]
    fn drop(&mut self) {
        if self.downgraded.load(Acquire) {
            tracing::trace!(lock = ?fmt::ptr(self.lock), "releasing downgraded read lock");
            unsafe {
                // Safety: `downgrade` traded the exclusive lock for a shared
                // lock, which this scope now holds.
                self.lock.unlock_shared()
            }
        } else {
            tracing::trace!(lock = ?fmt::ptr(self.lock), "releasing write lock");
            unsafe {
                // Safety: the exclusive lock was never downgraded, so this
                // scope still holds it.
                self.lock.unlock_exclusive()
            }
        }
    }
}

impl<Lock: RawRwLock> fmt::Debug for Downgrader<'_, Lock> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Downgrader")
            .field("lock", &fmt::ptr(self.lock))
            .field("downgraded", &self.is_downgraded())
            .finish()
    }
}

// === impl ReadScope ===

impl<Lock: RawRwLock> Drop for ReadScope<'_, Lock> {
    #[inline]
    #[cfg_attr(test, track_caller)]
    fn drop(&mut self) {
        tracing::trace!(lock = ?fmt::ptr(self.lock), "releasing read lock");
        unsafe { self.lock.unlock_shared() }
    }
}

// === impl WriteScope ===

impl<Lock: RawRwLock> Drop for WriteScope<'_, Lock> {
    #[inline]
    #[cfg_attr(test, track_caller)]
    fn drop(&mut self) {
        tracing::trace!(lock = ?fmt::ptr(self.lock), "releasing write lock");
        unsafe { self.lock.unlock_exclusive() }
    }
}
