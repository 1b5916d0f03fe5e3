//! A registry which hands out one [`RwScope`] per key.
//!
//! See the documentation for the [`LockRegistry`] type for details.
use crate::{
    error::KeyTypeError,
    loom::sync::Mutex,
    raw::{DefaultRawRwLock, RawRwLock},
    scope::RwScope,
    util::fmt,
};
use core::{
    hash::{BuildHasher, Hash},
    marker::PhantomData,
};
use hashbrown::{DefaultHashBuilder, HashTable};
use std::sync::{Arc, Weak};

mod key;
mod keyed;
pub use self::key::KeyType;


/// A registry of [`RwScope`]s, holding exactly one scope per distinct key.
///
/// A `LockRegistry` is used when callers want to lock *a value* rather than
/// a particular lock: every caller asking for the lock associated with an
/// equal key gets the same [`RwScope`], even when many threads ask for a key
/// for the first time concurrently.
///
/// # Weak Keys
///
/// Keys are passed to the registry as [`Arc`]s, and the registry only keeps
/// [`Weak`] references to its keys. Once every other `Arc` pointing to an
/// entry's keys has been dropped, that entry is *dead*: it is never returned
/// again, and it is reclaimed the next time the registry sweeps its entries.
/// The registry sweeps while inserting new entries, once every
/// [`sweep_threshold`](Builder::sweep_threshold) insertions, and whenever
/// [`purge`](Self::purge) is called. There is no way to remove a live entry.
///
/// Keys are compared using their [`Eq`] implementation. An entry remembers
/// every `Arc` it was requested with, so it stays live as long as *any* of the
/// equal keys that received its scope is still alive. Only once all of them
/// have been dropped does the entry die, and a later request with an equal
/// key receive a new [`RwScope`].
///
/// # Key Types
///
/// Primitive and standard library types may not be used as keys. See
/// [`KeyTypeError`] for details. Constructing a registry for such a key type
/// fails immediately.
///
/// # Examples
///
/// ```
/// use morel::LockRegistry;
/// use std::{convert::Infallible, sync::Arc};
///
/// #[derive(Hash, PartialEq, Eq)]
/// struct Account {
///     id: u64,
/// }
///
/// let registry = LockRegistry::<Account>::new().unwrap();
///
/// let account = Arc::new(Account { id: 1 });
/// let balance = registry.get_with_read_lock_on(&account, || Ok::<_, Infallible>(100));
/// assert_eq!(balance, Ok(100));
///
/// // an equal key gets the same lock.
/// let same_account = Arc::new(Account { id: 1 });
/// assert!(Arc::ptr_eq(&registry.get(&account), &registry.get(&same_account)));
/// ```
pub struct LockRegistry<K: ?Sized, Lock = DefaultRawRwLock> {
    entries: Mutex<Entries<K, Lock>>,
    new_lock: Box<dyn Fn() -> Lock + Send + Sync>,
    hasher: DefaultHashBuilder,
    sweep_threshold: usize,
    key_type: KeyType,
}

/// Configures a [`LockRegistry`].
///
/// A `Builder` is returned by [`LockRegistry::builder`].
pub struct Builder<K: ?Sized, Lock = DefaultRawRwLock> {
    new_lock: Box<dyn Fn() -> Lock + Send + Sync>,
    sweep_threshold: usize,
    _key: PhantomData<fn(&K)>,
}

struct Entries<K: ?Sized, Lock> {
    table: HashTable<Entry<K, Lock>>,
    inserted_since_sweep: usize,
}

struct Entry<K: ?Sized, Lock> {
    hash: u64,
    /// Every distinct `Arc` this entry's scope was handed out for.
    keys: Vec<Weak<K>>,
    scope: Arc<RwScope<Lock>>,
}

// === impl LockRegistry ===

impl<K> LockRegistry<K>
where
    K: ?Sized + Hash + Eq,
{
    /// Returns a new, empty `LockRegistry` using the [`DefaultRawRwLock`].
    ///
    /// # Errors
    ///
    /// If `K` is not an admissible key type, a [`KeyTypeError`] is returned.
    pub fn new() -> Result<Self, KeyTypeError> {
        Self::builder().build()
    }

    /// Returns a [`Builder`] for configuring a new `LockRegistry`.
    #[must_use]
    pub fn builder() -> Builder<K> {
        Builder::new()
    }
}

impl<K, Lock> LockRegistry<K, Lock>
where
    K: ?Sized + Hash + Eq,
    Lock: RawRwLock,
{
    /// Returns a new, empty `LockRegistry` whose [`RwScope`]s drive raw
    /// locks created by `new_lock`.
    ///
    /// # Errors
    ///
    /// If `K` is not an admissible key type, a [`KeyTypeError`] is returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use morel::LockRegistry;
    /// use lock_api::RawRwLock;
    ///
    /// #[derive(Hash, PartialEq, Eq)]
    /// struct Document(String);
    ///
    /// let registry = LockRegistry::<Document, _>::with_lock_factory(|| parking_lot::RawRwLock::INIT);
    /// assert!(registry.is_ok());
    /// ```
    pub fn with_lock_factory(
        new_lock: impl Fn() -> Lock + Send + Sync + 'static,
    ) -> Result<Self, KeyTypeError> {
        Builder::<K>::new().lock_factory(new_lock).build()
    }

    /// Returns the [`RwScope`] associated with `key`, creating it if no live
    /// entry for an equal key exists.
    ///
    /// If many threads call `get` with equal keys at the same time, and no
    /// entry exists yet, exactly one [`RwScope`] is created, and every caller
    /// receives that same scope.
    ///
    /// # Note
    ///
    /// Existing keys are compared while the registry's internal lock is held.
    /// If another thread drops the last `Arc` of a key during that
    /// comparison, the key's destructor runs under the registry's lock, so
    /// `K`'s [`Drop`] implementation must not call into the same registry.
    pub fn get(&self, key: &Arc<K>) -> Arc<RwScope<Lock>> {
        let hash = self.hasher.hash_one(&**key);
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.table.find_mut(hash, |entry| entry.matches(key)) {
            entry.track(key);
            return entry.scope.clone();
        }

        if entries.inserted_since_sweep >= self.sweep_threshold {
            entries.sweep();
        }

        let scope = Arc::new(RwScope::with_raw_lock((self.new_lock)()));
        tracing::debug!(
            key_type = %self.key_type,
            scope = ?fmt::ptr(&*scope),
            "created lock scope for new key"
        );
        let entry = Entry {
            hash,
            keys: vec![Arc::downgrade(key)],
            scope: scope.clone(),
        };
        entries.table.insert_unique(hash, entry, |entry| entry.hash);
        entries.inserted_since_sweep += 1;
        scope
    }

    /// Resolves the [`RwScope`] associated with `key`, and passes it to
    /// `handler`, returning `handler`'s result.
    ///
    /// The scope is *not* locked by this method.
    pub fn get_with_instance<T, E>(
        &self,
        key: &Arc<K>,
        handler: impl FnOnce(&RwScope<Lock>) -> Result<T, E>,
    ) -> Result<T, E> {
        let scope = self.get(key);
        handler(&scope)
    }

    /// Resolves the [`RwScope`] associated with `key`, and passes it to
    /// `handler`.
    ///
    /// This is equivalent to [`LockRegistry::get_with_instance`] for a
    /// `handler` that produces no value.
    pub fn run_with_instance<E>(
        &self,
        key: &Arc<K>,
        handler: impl FnOnce(&RwScope<Lock>) -> Result<(), E>,
    ) -> Result<(), E> {
        self.get_with_instance(key, handler)
    }
}

impl<K: ?Sized, Lock> LockRegistry<K, Lock> {
    /// Returns `true` if a live entry in this registry maps to `scope`.
    ///
    /// Scopes are compared by identity. This is intended for testing whether
    /// a scope is still reachable through the registry.
    #[must_use]
    pub fn contains_scope(&self, scope: &Arc<RwScope<Lock>>) -> bool {
        self.entries
            .lock()
            .table
            .iter()
            .any(|entry| entry.is_live() && Arc::ptr_eq(&entry.scope, scope))
    }

    /// Reclaims every dead entry, returning the number of entries removed.
    ///
    /// An entry is dead once every [`Arc`] pointing to its key has been
    /// dropped. Live entries are never removed.
    pub fn purge(&self) -> usize {
        self.entries.lock().sweep()
    }

    /// Returns the number of live entries in this registry.
    ///
    /// # Note
    ///
    /// Keys may be dropped concurrently, so the returned value may be out of
    /// date as soon as it is returned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .table
            .iter()
            .filter(|entry| entry.is_live())
            .count()
    }

    /// Returns `true` if this registry has no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the [`KeyType`] of this registry's keys.
    #[inline]
    #[must_use]
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }
}

impl<K: ?Sized, Lock> fmt::Debug for LockRegistry<K, Lock> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockRegistry")
            .field("key_type", &self.key_type)
            .field("len", &self.len())
            .field("sweep_threshold", &self.sweep_threshold)
            .finish_non_exhaustive()
    }
}

// === impl Builder ===

impl<K: ?Sized> Builder<K> {
    /// The default number of insertions between sweeps of dead entries.
    pub const DEFAULT_SWEEP_THRESHOLD: usize = 64;

    /// Returns a new `Builder` with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            new_lock: Box::new(DefaultRawRwLock::new),
            sweep_threshold: Self::DEFAULT_SWEEP_THRESHOLD,
            _key: PhantomData,
        }
    }
}

impl<K: ?Sized> Default for Builder<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ?Sized, Lock> Builder<K, Lock> {
    /// Sets the function used to create the raw lock for each new
    /// [`RwScope`].
    ///
    /// By default, each scope uses a new [`DefaultRawRwLock`].
    #[must_use]
    pub fn lock_factory<L2>(
        self,
        new_lock: impl Fn() -> L2 + Send + Sync + 'static,
    ) -> Builder<K, L2> {
        Builder {
            new_lock: Box::new(new_lock),
            sweep_threshold: self.sweep_threshold,
            _key: PhantomData,
        }
    }

    /// Sets the number of new entries to insert between sweeps of dead
    /// entries.
    ///
    /// Lower values reclaim dead entries sooner, at the cost of sweeping more
    /// often. A value of 0 sweeps before every insertion. By default, this is
    /// [`Builder::DEFAULT_SWEEP_THRESHOLD`].
    #[must_use]
    pub fn sweep_threshold(self, sweep_threshold: usize) -> Self {
        Self {
            sweep_threshold,
            ..self
        }
    }
}

impl<K, Lock> Builder<K, Lock>
where
    K: ?Sized + Hash + Eq,
    Lock: RawRwLock,
{
    /// Builds a [`LockRegistry`] with this configuration.
    ///
    /// # Errors
    ///
    /// If `K` is not an admissible key type, a [`KeyTypeError`] is returned.
    pub fn build(self) -> Result<LockRegistry<K, Lock>, KeyTypeError> {
        let key_type = KeyType::of::<K>();
        if let Err(error) = key_type.check() {
            tracing::warn!(%key_type, %error, "refusing to build lock registry");
            return Err(error);
        }

        Ok(LockRegistry {
            entries: Mutex::new(Entries {
                table: HashTable::new(),
                inserted_since_sweep: 0,
            }),
            new_lock: self.new_lock,
            hasher: DefaultHashBuilder::default(),
            sweep_threshold: self.sweep_threshold,
            key_type,
        })
    }
}

impl<K: ?Sized, Lock> fmt::Debug for Builder<K, Lock> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("key_type", &KeyType::of::<K>())
            .field("sweep_threshold", &self.sweep_threshold)
            .finish_non_exhaustive()
    }
}

// === impl Entries ===

impl<K: ?Sized, Lock> Entries<K, Lock> {
    fn sweep(&mut self) -> usize {
        let before = self.table.len();
        self.table.retain(|entry| entry.is_live());
        self.inserted_since_sweep = 0;

        let removed = before - self.table.len();
        tracing::debug!(removed, remaining = self.table.len(), "swept dead entries");
        removed
    }
}

// === impl Entry ===

impl<K: ?Sized, Lock> Entry<K, Lock> {
    fn is_live(&self) -> bool {
        self.keys.iter().any(|key| key.strong_count() > 0)
    }

    fn holds(&self, key: &Arc<K>) -> bool {
        // a `Weak` keeps its allocation from being reused, so if it points at
        // `key`'s allocation, it is the same (live) key.
        self.keys
            .iter()
            .any(|weak| Weak::as_ptr(weak).cast::<()>() == Arc::as_ptr(key).cast::<()>())
    }

    /// Records that this entry's scope was handed out for `key`, so that the
    /// entry stays live for as long as `key` does.
    fn track(&mut self, key: &Arc<K>) {
        if self.holds(key) {
            return;
        }
        self.keys.retain(|weak| weak.strong_count() > 0);
        self.keys.push(Arc::downgrade(key));
    }
}

impl<K: ?Sized + Eq, Lock> Entry<K, Lock> {
    fn matches(&self, key: &Arc<K>) -> bool {
        if self.holds(key) {
            return true;
        }

        // every key in the entry is equal, so any live one will do.
        match self.keys.iter().find_map(Weak::upgrade) {
            Some(existing) => *existing == **key,
            None => false,
        }
    }
}
