//! Raw reader-writer lock implementations.
//!
//! An [`RwScope`](crate::RwScope) does not implement mutual exclusion itself.
//! Instead, it drives a *raw* lock, which is any type implementing the
//! [`RawRwLock`] trait in this module. By default, the [`DefaultRawRwLock`]
//! is used, but any [`lock_api`] raw lock which supports downgrading can be
//! plugged in with [`RwScope::with_raw_lock`](crate::RwScope::with_raw_lock).
use core::fmt;

/// Trait abstracting over raw reader-writer lock implementations (`morel`'s
/// version).
///
/// This trait is essentially a duplicate of the [`lock_api::RawRwLock`]
/// trait, plus the downgrade operation from
/// [`lock_api::RawRwLockDowngrade`]. `morel` defines its own version so that
/// the downgrade operation can have a *provided* implementation, which
/// acquires a shared lock and then releases the exclusive lock. Every type
/// implementing both [`lock_api::RawRwLock`] and
/// [`lock_api::RawRwLockDowngrade`] implements this trait, using the
/// `lock_api` downgrade.
///
/// # Safety
///
/// Implementations of this trait must ensure that the lock is actually
/// exclusive: an exclusive lock can't be acquired while an exclusive or shared
/// lock exists, and a shared lock can't be acquired while an exclusive lock
/// exists.
///
/// Implementations which do not override [`downgrade`] must permit the holder
/// of the exclusive lock to acquire a shared lock without blocking.
///
/// [`downgrade`]: RawRwLock::downgrade
pub unsafe trait RawRwLock {
    /// Marker type which determines whether a lock guard should be [`Send`].
    ///
    /// Implementations should use one of the [`lock_api::GuardSend`] or
    /// [`lock_api::GuardNoSend`] helper types here.
    type GuardMarker;

    /// Acquires a shared lock, blocking the current thread until it is able to
    /// do so.
    fn lock_shared(&self);

    /// Attempts to acquire a shared lock without blocking.
    fn try_lock_shared(&self) -> bool;

    /// Releases a shared lock.
    ///
    /// # Safety
    ///
    /// This method may only be called if a shared lock is held in the current
    /// context.
    unsafe fn unlock_shared(&self);

    /// Acquires an exclusive lock, blocking the current thread until it is able
    /// to do so.
    fn lock_exclusive(&self);

    /// Attempts to acquire an exclusive lock without blocking.
    fn try_lock_exclusive(&self) -> bool;

    /// Releases an exclusive lock.
    ///
    /// # Safety
    ///
    /// This method may only be called if an exclusive lock is held in the
    /// current context.
    unsafe fn unlock_exclusive(&self);

    /// Atomically downgrades an exclusive lock into a shared lock, without
    /// allowing any writer to take exclusive access in between.
    ///
    /// The provided implementation acquires a shared lock *before* releasing
    /// the exclusive lock, so that the lock is never observably unlocked
    /// during the transition.
    ///
    /// # Safety
    ///
    /// This method may only be called if an exclusive lock is held in the
    /// current context.
    unsafe fn downgrade(&self) {
        self.lock_shared();
        self.unlock_exclusive();
    }

    /// Returns `true` if this lock is currently locked in any way.
    fn is_locked(&self) -> bool;

    /// Returns `true` if this lock is currently locked exclusively.
    fn is_locked_exclusive(&self) -> bool;
}

unsafe impl<T> RawRwLock for T
where
    T: lock_api::RawRwLock + lock_api::RawRwLockDowngrade,
{
    type GuardMarker = <T as lock_api::RawRwLock>::GuardMarker;

    #[inline]
    #[track_caller]
    fn lock_shared(&self) {
        lock_api::RawRwLock::lock_shared(self)
    }

    #[inline]
    #[track_caller]
    fn try_lock_shared(&self) -> bool {
        lock_api::RawRwLock::try_lock_shared(self)
    }

    #[inline]
    #[track_caller]
    unsafe fn unlock_shared(&self) {
        lock_api::RawRwLock::unlock_shared(self)
    }

    #[inline]
    #[track_caller]
    fn lock_exclusive(&self) {
        lock_api::RawRwLock::lock_exclusive(self)
    }

    #[inline]
    #[track_caller]
    fn try_lock_exclusive(&self) -> bool {
        lock_api::RawRwLock::try_lock_exclusive(self)
    }

    #[inline]
    #[track_caller]
    unsafe fn unlock_exclusive(&self) {
        lock_api::RawRwLock::unlock_exclusive(self)
    }

    #[inline]
    #[track_caller]
    unsafe fn downgrade(&self) {
        lock_api::RawRwLockDowngrade::downgrade(self)
    }

    #[inline]
    #[track_caller]
    fn is_locked(&self) -> bool {
        lock_api::RawRwLock::is_locked(self)
    }

    #[inline]
    #[track_caller]
    fn is_locked_exclusive(&self) -> bool {
        lock_api::RawRwLock::is_locked_exclusive(self)
    }
}

/// Default [`RawRwLock`] implementation.
///
/// This is the default `Lock` type parameter for [`RwScope`] and
/// [`LockRegistry`]. It is backed by [`parking_lot::RawRwLock`], which parks
/// blocked threads with the OS rather than spinning.
///
/// # Reentrancy
///
/// Shared acquisitions are *recursive*: a thread which already holds a shared
/// lock may acquire it again even if a writer is queued, rather than
/// deadlocking behind that writer. Exclusive acquisitions are **not**
/// reentrant. Acquiring the exclusive lock (or a shared lock) while the same
/// thread holds the exclusive lock will deadlock.
///
/// Downgrading uses [`parking_lot`]'s atomic downgrade, so no other writer can
/// acquire the lock between the exclusive and shared phases.
///
/// [`RwScope`]: crate::RwScope
/// [`LockRegistry`]: crate::LockRegistry
pub struct DefaultRawRwLock(parking_lot::RawRwLock);

impl DefaultRawRwLock {
    /// Returns a new, unlocked `DefaultRawRwLock`.
    #[must_use]
    pub const fn new() -> Self {
        Self(<parking_lot::RawRwLock as lock_api::RawRwLock>::INIT)
    }
}

impl Default for DefaultRawRwLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DefaultRawRwLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_locked_exclusive() {
            "<write locked>"
        } else if self.is_locked() {
            "<read locked>"
        } else {
            "<unlocked>"
        };
        f.debug_tuple("DefaultRawRwLock").field(&state).finish()
    }
}

unsafe impl RawRwLock for DefaultRawRwLock {
    type GuardMarker = <parking_lot::RawRwLock as lock_api::RawRwLock>::GuardMarker;

    #[inline]
    fn lock_shared(&self) {
        lock_api::RawRwLockRecursive::lock_shared_recursive(&self.0)
    }

    #[inline]
    fn try_lock_shared(&self) -> bool {
        lock_api::RawRwLockRecursive::try_lock_shared_recursive(&self.0)
    }

    #[inline]
    unsafe fn unlock_shared(&self) {
        lock_api::RawRwLock::unlock_shared(&self.0)
    }

    #[inline]
    fn lock_exclusive(&self) {
        lock_api::RawRwLock::lock_exclusive(&self.0)
    }

    #[inline]
    fn try_lock_exclusive(&self) -> bool {
        lock_api::RawRwLock::try_lock_exclusive(&self.0)
    }

    #[inline]
    unsafe fn unlock_exclusive(&self) {
        lock_api::RawRwLock::unlock_exclusive(&self.0)
    }

    #[inline]
    unsafe fn downgrade(&self) {
        lock_api::RawRwLockDowngrade::downgrade(&self.0)
    }

    #[inline]
    fn is_locked(&self) -> bool {
        lock_api::RawRwLock::is_locked(&self.0)
    }

    #[inline]
    fn is_locked_exclusive(&self) -> bool {
        lock_api::RawRwLock::is_locked_exclusive(&self.0)
    }
}
