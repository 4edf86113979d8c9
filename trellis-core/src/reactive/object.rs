//! Reactive maps.
//!
//! [`Reactive`] wraps a string-keyed map so that every entry is its own
//! reactive location. Reading `get("a")` inside an effect subscribes to entry
//! `a` only; reading the key set (`keys`, `len`, `to_map`) subscribes to the
//! map's shape, which changes on insert and remove.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use indexmap::IndexMap;

use super::runtime::Runtime;
use super::subscriber::{LocationKey, OwnerId};

struct ReactiveInner<V> {
    id: OwnerId,
    entries: RefCell<IndexMap<String, V>>,
}

impl<V> Drop for ReactiveInner<V> {
    fn drop(&mut self) {
        Runtime::purge_owner(self.id);
    }
}

/// A map whose entries are individually tracked.
pub struct Reactive<V> {
    inner: Rc<ReactiveInner<V>>,
}

impl<V: Clone + PartialEq + 'static> Reactive<V> {
    /// Create an empty reactive map.
    pub fn new() -> Self {
        Self::from_map(IndexMap::new())
    }

    /// Wrap an existing map.
    pub fn from_map(entries: IndexMap<String, V>) -> Self {
        Self {
            inner: Rc::new(ReactiveInner {
                id: OwnerId::new(),
                entries: RefCell::new(entries),
            }),
        }
    }

    /// Identity of the map.
    pub fn id(&self) -> OwnerId {
        self.inner.id
    }

    /// Read an entry, tracking it.
    pub fn get(&self, key: &str) -> Option<V> {
        Runtime::track(LocationKey::key(self.inner.id, key));
        self.inner.entries.borrow().get(key).cloned()
    }

    /// Read an entry without tracking.
    pub fn get_untracked(&self, key: &str) -> Option<V> {
        self.inner.entries.borrow().get(key).cloned()
    }

    /// Whether the entry exists. Tracks the entry.
    pub fn contains_key(&self, key: &str) -> bool {
        Runtime::track(LocationKey::key(self.inner.id, key));
        self.inner.entries.borrow().contains_key(key)
    }

    /// Write an entry. Equal values notify nobody; new keys also notify
    /// readers of the key set.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let added = {
            let mut entries = self.inner.entries.borrow_mut();
            match entries.get_mut(&key) {
                Some(current) if *current == value => return,
                Some(current) => {
                    *current = value;
                    false
                }
                None => {
                    entries.insert(key.clone(), value);
                    true
                }
            }
        };

        Runtime::batch(|| {
            Runtime::trigger(&LocationKey::key(self.inner.id, &key));
            if added {
                Runtime::trigger(&LocationKey::iterate(self.inner.id));
            }
        });
    }

    /// Replace an entry with a value derived from the current one.
    pub fn update(&self, key: &str, f: impl FnOnce(Option<&V>) -> V) {
        let next = f(self.inner.entries.borrow().get(key));
        self.set(key, next);
    }

    /// Remove an entry, returning its value.
    pub fn remove(&self, key: &str) -> Option<V> {
        let removed = self.inner.entries.borrow_mut().shift_remove(key);
        if removed.is_some() {
            Runtime::batch(|| {
                Runtime::trigger(&LocationKey::key(self.inner.id, key));
                Runtime::trigger(&LocationKey::iterate(self.inner.id));
            });
        }
        removed
    }

    /// Current keys in insertion order. Tracks the key set.
    pub fn keys(&self) -> Vec<String> {
        Runtime::track(LocationKey::iterate(self.inner.id));
        self.inner.entries.borrow().keys().cloned().collect()
    }

    /// Number of entries. Tracks the key set.
    pub fn len(&self) -> usize {
        Runtime::track(LocationKey::iterate(self.inner.id));
        self.inner.entries.borrow().len()
    }

    /// Whether the map is empty. Tracks the key set.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every entry. Tracks the key set and each entry.
    pub fn to_map(&self) -> IndexMap<String, V> {
        Runtime::track(LocationKey::iterate(self.inner.id));
        let entries = self.inner.entries.borrow().clone();
        for key in entries.keys() {
            Runtime::track(LocationKey::key(self.inner.id, key));
        }
        entries
    }
}

impl<V: Clone + PartialEq + 'static> Default for Reactive<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + PartialEq + 'static, K: Into<String>> FromIterator<(K, V)> for Reactive<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_map(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl<V> Clone for Reactive<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<V> PartialEq for Reactive<V> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<V: Debug> Debug for Reactive<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.inner.entries.borrow().iter()).finish()
    }
}
