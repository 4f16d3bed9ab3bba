//! Keyed state storage shared by the circuit breaker and rate limiter.
//!
//! # Responsibilities
//! - Hold per-key state behind a small `get`/`set`/`delete` interface
//! - Provide an atomic read-modify-write for a single key
//! - Allow registries to be handed an isolated instance in tests
//!
//! # Design Decisions
//! - `MemoryStore` is backed by `DashMap`; shard locks serialize mutations
//!   of one key while leaving unrelated keys uncontended
//! - Closures passed to `update` and `retain` run under the shard lock and
//!   must not block or await

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Storage for per-key registry state.
pub trait KeyedStore<V>: Send + Sync {
    /// Clone out the value for `key`, if any.
    fn get(&self, key: &str) -> Option<V>;

    /// Insert or replace the value for `key`.
    fn set(&self, key: &str, value: V);

    /// Remove `key`. Returns true if it was present.
    fn delete(&self, key: &str) -> bool;

    /// Apply `f` to the value for `key` atomically with respect to other
    /// operations on the same key. `f` receives `None` when the key is absent
    /// and may create the entry by writing `Some`.
    fn update(&self, key: &str, f: &mut dyn FnMut(&mut Option<V>));

    /// Keep only the entries for which `keep` returns true.
    fn retain(&self, keep: &mut dyn FnMut(&str, &V) -> bool);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process store backed by a concurrent hash map.
#[derive(Debug)]
pub struct MemoryStore<V> {
    inner: DashMap<String, V>,
}

impl<V> MemoryStore<V> {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> KeyedStore<V> for MemoryStore<V>
where
    V: Clone + Send + Sync,
{
    fn get(&self, key: &str) -> Option<V> {
        self.inner.get(key).map(|r| r.value().clone())
    }

    fn set(&self, key: &str, value: V) {
        self.inner.insert(key.to_string(), value);
    }

    fn delete(&self, key: &str) -> bool {
        self.inner.remove(key).is_some()
    }

    fn update(&self, key: &str, f: &mut dyn FnMut(&mut Option<V>)) {
        match self.inner.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let mut slot = Some(occupied.get().clone());
                f(&mut slot);
                match slot {
                    Some(value) => {
                        occupied.insert(value);
                    }
                    None => {
                        occupied.remove();
                    }
                }
            }
            Entry::Vacant(vacant) => {
                let mut slot = None;
                f(&mut slot);
                if let Some(value) = slot {
                    vacant.insert(value);
                }
            }
        }
    }

    fn retain(&self, keep: &mut dyn FnMut(&str, &V) -> bool) {
        self.inner.retain(|k, v| keep(k, v));
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}
