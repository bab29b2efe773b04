//! Shared pipeline context with heterogeneous type storage.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// Type-safe context key wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextKey(String);

impl ContextKey {
    /// Creates a new ContextKey.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContextKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ContextKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ContextKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for ContextKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

type Slots = HashMap<ContextKey, Box<dyn Any + Send + Sync>>;

struct Inner {
    data: RwLock<Slots>,
    started_at: Instant,
}

/// Key-value store threaded through every stage and step of a pipeline run.
///
/// `Context` is a handle: cloning it is cheap and every clone sees the same
/// entries. Individual operations are atomic, but nothing orders operations
/// issued by concurrently running steps. Steps that run in parallel should
/// write disjoint keys; overlapping writes are last-writer-wins.
///
/// # Examples
///
/// ```
/// use pipelining_core::Context;
///
/// let ctx = Context::new();
///
/// ctx.insert("user_id", 123u64);
/// ctx.insert("name", "Alice".to_string());
///
/// assert_eq!(ctx.get::<u64>("user_id"), Some(123));
/// assert_eq!(ctx.get::<String>("name"), Some("Alice".to_string()));
///
/// // Wrong type reads as absent
/// assert_eq!(ctx.get::<String>("user_id"), None);
///
/// // Clones share storage
/// let handle = ctx.clone();
/// handle.insert("active", true);
/// assert_eq!(ctx.get::<bool>("active"), Some(true));
/// ```
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self.read().keys().map(|k| k.0.clone()).collect();
        keys.sort();
        f.debug_struct("Context")
            .field("keys", &keys)
            .field("started_at", &self.inner.started_at)
            .finish()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Creates a new empty context.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                data: RwLock::new(HashMap::new()),
                started_at: Instant::now(),
            }),
        }
    }

    // A step that panics mid-write poisons the lock; the map itself is still
    // structurally valid, so keep serving it.
    fn read(&self) -> RwLockReadGuard<'_, Slots> {
        self.inner.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Slots> {
        self.inner.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts a value with the given key.
    ///
    /// If the key already exists, the previous value is replaced.
    pub fn insert<T: Any + Send + Sync>(&self, key: impl Into<ContextKey>, value: T) {
        self.write().insert(key.into(), Box::new(value));
    }

    /// Returns a clone of the value for the given key.
    ///
    /// Returns `None` if the key doesn't exist or the type doesn't match.
    pub fn get<T: Any + Clone>(&self, key: &str) -> Option<T> {
        self.read().get(key).and_then(|v| v.downcast_ref::<T>()).cloned()
    }

    /// Reads the value for the given key through a closure without cloning it.
    ///
    /// Returns `None` if the key doesn't exist or the type doesn't match.
    ///
    /// `f` runs while the read lock is held. Calling a writing method on the
    /// same context from inside `f` deadlocks or panics.
    pub fn with<T: Any, R>(&self, key: &str, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.read().get(key).and_then(|v| v.downcast_ref::<T>()).map(f)
    }

    /// Mutates the value for the given key in place.
    ///
    /// Returns `None` if the key doesn't exist or the type doesn't match.
    ///
    /// `f` runs while the write lock is held and must not call back into the
    /// same context.
    pub fn update<T: Any, R>(&self, key: &str, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.write()
            .get_mut(key)
            .and_then(|v| v.downcast_mut::<T>())
            .map(f)
    }

    /// Mutates the value for the given key, inserting `init()` first when the
    /// key is absent or holds a different type.
    ///
    /// The lookup and the mutation happen under one lock acquisition, so `f`
    /// must not call back into the same context.
    ///
    /// ```
    /// use pipelining_core::Context;
    ///
    /// let ctx = Context::new();
    /// ctx.get_or_insert_with("order", Vec::<String>::new, |order| order.push("s1".into()));
    /// ctx.get_or_insert_with("order", Vec::<String>::new, |order| order.push("s2".into()));
    /// assert_eq!(ctx.get::<Vec<String>>("order"), Some(vec!["s1".into(), "s2".into()]));
    /// ```
    pub fn get_or_insert_with<T: Any + Send + Sync, R>(
        &self,
        key: impl Into<ContextKey>,
        init: impl FnOnce() -> T,
        f: impl FnOnce(&mut T) -> R,
    ) -> R {
        let key = key.into();
        let mut data = self.write();
        let mut value = match data.remove(&key).map(|v| v.downcast::<T>()) {
            Some(Ok(value)) => value,
            _ => Box::new(init()),
        };
        let result = f(&mut value);
        data.insert(key, value);
        result
    }

    /// Removes a value by key and returns it.
    ///
    /// Returns `None` if the key doesn't exist or the type doesn't match. A
    /// type mismatch leaves the entry in place.
    pub fn remove<T: Any>(&self, key: &str) -> Option<T> {
        let mut data = self.write();
        if !data.get(key).is_some_and(|v| v.is::<T>()) {
            return None;
        }
        data.remove(key)
            .and_then(|v| v.downcast::<T>().ok())
            .map(|b| *b)
    }

    /// Returns `true` if the context contains a value for the given key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// Returns a snapshot of all keys in the context.
    pub fn keys(&self) -> Vec<ContextKey> {
        self.read().keys().cloned().collect()
    }

    /// Returns the number of entries in the context.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if the context contains no entries.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Removes all entries from the context.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Returns the time elapsed since the context was created.
    pub fn elapsed(&self) -> Duration {
        self.inner.started_at.elapsed()
    }

    /// Returns `true` if both handles refer to the same underlying storage.
    pub fn ptr_eq(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
