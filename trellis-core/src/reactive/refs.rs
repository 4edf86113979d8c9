//! Ref Implementation
//!
//! A Ref is a single-slot reactive location. It holds a value and tracks
//! which effects read it.
//!
//! # How Refs Work
//!
//! 1. When a ref is read inside a running effect, the effect is registered as
//!    a subscriber of the ref's slot.
//!
//! 2. When the ref is set to a value that differs from the current one, every
//!    subscriber is notified. Setting an equal value notifies nobody.
//!
//! 3. Clones share the slot: a `Ref` is a handle, never unwrapped implicitly.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::runtime::Runtime;
use super::subscriber::{LocationKey, OwnerId};

struct RefInner<T> {
    id: OwnerId,
    value: RefCell<T>,
}

impl<T> Drop for RefInner<T> {
    fn drop(&mut self) {
        Runtime::purge_owner(self.id);
    }
}

/// A reactive single-value slot.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::Ref;
///
/// let count = Ref::new(0);
/// count.set(5);
/// count.update(|n| *n += 1);
/// assert_eq!(count.get(), 6);
/// ```
pub struct Ref<T> {
    inner: Rc<RefInner<T>>,
}

impl<T: 'static> Ref<T> {
    /// Create a new ref with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefInner {
                id: OwnerId::new(),
                value: RefCell::new(value),
            }),
        }
    }

    /// Identity of the ref's slot.
    pub fn id(&self) -> OwnerId {
        self.inner.id
    }

    fn location(&self) -> LocationKey {
        LocationKey::value(self.inner.id)
    }

    /// Borrow the value, tracking the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        Runtime::track(self.location());
        f(&self.inner.value.borrow())
    }

    /// Mutate the value in place and notify subscribers unconditionally.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.inner.value.borrow_mut());
        Runtime::trigger(&self.location());
    }

    /// Notify subscribers without changing the value.
    pub fn notify(&self) {
        Runtime::trigger(&self.location());
    }
}

impl<T: Clone + 'static> Ref<T> {
    /// Get the current value, tracking the read.
    pub fn get(&self) -> T {
        Runtime::track(self.location());
        self.inner.value.borrow().clone()
    }

    /// Get the current value without establishing a dependency.
    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }
}

impl<T: PartialEq + 'static> Ref<T> {
    /// Replace the value. Subscribers are notified only if it changed.
    pub fn set(&self, value: T) {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return;
            }
            *current = value;
        }
        Runtime::trigger(&self.location());
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for Ref<T> {
    /// Refs compare by identity.
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Debug> Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Effect;
    use std::cell::Cell;

    #[test]
    fn ref_get_and_set() {
        let count = Ref::new(0);
        assert_eq!(count.get(), 0);
        count.set(42);
        assert_eq!(count.get(), 42);
    }

    #[test]
    fn equal_value_does_not_notify() {
        let count = Ref::new(3);
        let runs = Rc::new(Cell::new(0));
        let c = count.clone();
        let r = Rc::clone(&runs);
        let _effect = Effect::new(move || {
            c.get();
            r.set(r.get() + 1);
        });

        count.set(3);
        assert_eq!(runs.get(), 1);
        count.set(4);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn update_always_notifies() {
        let items = Ref::new(vec![1, 2]);
        let seen = Rc::new(Cell::new(0));
        let i = items.clone();
        let s = Rc::clone(&seen);
        let _effect = Effect::new(move || s.set(i.with(Vec::len)));

        items.update(|v| v.push(3));
        assert_eq!(seen.get(), 3);
    }

    #[test]
    fn untracked_read_does_not_subscribe() {
        let count = Ref::new(0);
        let runs = Rc::new(Cell::new(0));
        let c = count.clone();
        let r = Rc::clone(&runs);
        let _effect = Effect::new(move || {
            c.get_untracked();
            r.set(r.get() + 1);
        });
        count.set(1);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn clones_share_the_slot() {
        let a = Ref::new(String::from("a"));
        let b = a.clone();
        b.set("b".into());
        assert_eq!(a.get(), "b");
        assert_eq!(a, b);
        assert_ne!(a, Ref::new(String::from("b")));
    }
}
