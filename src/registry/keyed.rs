//! Per-key locking operations.
//!
//! Each of these resolves the key's [`RwScope`] and immediately runs the
//! corresponding [`RwScope`] operation on it.
use super::LockRegistry;
use crate::{raw::RawRwLock, scope::Downgrader};
use core::hash::Hash;
use std::sync::Arc;

#[cfg(doc)]
use crate::scope::RwScope;

impl<K, Lock> LockRegistry<K, Lock>
where
    K: ?Sized + Hash + Eq,
    Lock: RawRwLock,
{
    /// Runs `body` while holding a shared read lock on `key`.
    ///
    /// See [`RwScope::run_with_read_lock`].
    pub fn run_with_read_lock_on<E>(
        &self,
        key: &Arc<K>,
        body: impl FnOnce() -> Result<(), E>,
    ) -> Result<(), E> {
        self.run_with_instance(key, |scope| scope.run_with_read_lock(body))
    }

    /// Runs `body` while holding a shared read lock on `key`, returning its
    /// result.
    ///
    /// See [`RwScope::get_with_read_lock`].
    pub fn get_with_read_lock_on<T, E>(
        &self,
        key: &Arc<K>,
        body: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        self.get_with_instance(key, |scope| scope.get_with_read_lock(body))
    }

    /// Runs `body` while holding the exclusive write lock on `key`.
    ///
    /// See [`RwScope::run_with_write_lock`].
    pub fn run_with_write_lock_on<E>(
        &self,
        key: &Arc<K>,
        body: impl FnOnce() -> Result<(), E>,
    ) -> Result<(), E> {
        self.run_with_instance(key, |scope| scope.run_with_write_lock(body))
    }

    /// Runs `body` while holding the exclusive write lock on `key`, returning
    /// its result.
    ///
    /// See [`RwScope::get_with_write_lock`].
    pub fn get_with_write_lock_on<T, E>(
        &self,
        key: &Arc<K>,
        body: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        self.get_with_instance(key, |scope| scope.get_with_write_lock(body))
    }

    /// Runs `body` while holding a downgradable write lock on `key`.
    ///
    /// See [`RwScope::run_with_downgradable_write_lock`].
    pub fn run_with_downgradable_write_lock_on<E>(
        &self,
        key: &Arc<K>,
        body: impl FnOnce(&Downgrader<'_, Lock>) -> Result<(), E>,
    ) -> Result<(), E> {
        self.run_with_instance(key, |scope| scope.run_with_downgradable_write_lock(body))
    }

    /// Runs `body` while holding a downgradable write lock on `key`, returning
    /// its result.
    ///
    /// See [`RwScope::get_with_downgradable_write_lock`].
    ///
    /// # Examples
    ///
    /// ```
    /// use morel::LockRegistry;
    /// use std::{convert::Infallible, sync::Arc};
    ///
    /// #[derive(Hash, PartialEq, Eq)]
    /// struct Table(&'static str);
    ///
    /// let registry = LockRegistry::<Table>::new().unwrap();
    /// let users = Arc::new(Table("users"));
    ///
    /// let rows = registry.get_with_downgradable_write_lock_on(&users, |downgrader| {
    ///     // ... insert rows while holding the write lock ...
    ///     downgrader.downgrade();
    ///     // ... count them while holding a read lock ...
    ///     Ok::<_, Infallible>(3)
    /// });
    /// assert_eq!(rows, Ok(3));
    /// ```
    pub fn get_with_downgradable_write_lock_on<T, E>(
        &self,
        key: &Arc<K>,
        body: impl FnOnce(&Downgrader<'_, Lock>) -> Result<T, E>,
    ) -> Result<T, E> {
        self.get_with_instance(key, |scope| scope.get_with_downgradable_write_lock(body))
    }
}
