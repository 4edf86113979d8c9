//! Computed Implementation
//!
//! A Computed is a cached derived value backed by a lazy effect.
//!
//! # How Computed Values Work
//!
//! 1. Nothing runs at creation. The first read runs the derivation inside the
//!    backing effect, which records the derivation's dependencies.
//!
//! 2. Later reads return the cached value while the computed is clean.
//!
//! 3. When a dependency changes, the backing effect's scheduler flips the
//!    `dirty` flag and notifies the computed's own subscribers. It does not
//!    recompute: an effect reading the computed will pull the new value, and a
//!    computed nobody reads stays dirty. The backing effect is eager, so the
//!    flag flips inside the trigger, before any batched effect reruns.
//!
//! Laziness is transitive: a computed reading another computed is itself only
//! marked dirty by the notification.

use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};

use super::context::untrack;
use super::effect::{Effect, EffectOptions};
use super::runtime::Runtime;
use super::subscriber::{LocationKey, OwnerId};

struct ComputedInner<T> {
    id: OwnerId,
    getter: Box<dyn Fn() -> T>,
    value: RefCell<Option<T>>,
    dirty: Cell<bool>,
    effect: Effect,
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        self.effect.stop();
        Runtime::purge_owner(self.id);
    }
}

/// A lazily recomputed, cached derived value.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::{Computed, Ref};
///
/// let count = Ref::new(2);
/// let c = count.clone();
/// let doubled = Computed::new(move || c.get() * 2);
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5);
/// assert!(doubled.is_dirty());
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T: Clone + 'static> Computed<T> {
    /// Create a computed value. The derivation runs on first read.
    pub fn new(getter: impl Fn() -> T + 'static) -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<ComputedInner<T>>| {
            let compute = weak.clone();
            let invalidate = weak.clone();
            let effect = Effect::with_options(
                move || {
                    if let Some(computed) = compute.upgrade() {
                        let value = (computed.getter)();
                        *computed.value.borrow_mut() = Some(value);
                    }
                },
                EffectOptions::lazy().eager().with_scheduler(move |_| {
                    if let Some(computed) = invalidate.upgrade() {
                        if !computed.dirty.replace(true) {
                            Runtime::trigger(&LocationKey::value(computed.id));
                        }
                    }
                }),
            );

            ComputedInner {
                id: OwnerId::new(),
                getter: Box::new(getter),
                value: RefCell::new(None),
                dirty: Cell::new(true),
                effect,
            }
        });
        Self { inner }
    }

    /// Read the value, recomputing first if a dependency changed.
    pub fn get(&self) -> T {
        self.refresh();
        Runtime::track(LocationKey::value(self.inner.id));
        self.cached()
    }

    /// Read the value without subscribing to it.
    pub fn get_untracked(&self) -> T {
        self.refresh();
        self.cached()
    }

    fn refresh(&self) {
        if self.inner.dirty.replace(false) {
            self.inner.effect.run();
        }
    }

    fn cached(&self) -> T {
        let cached = self.inner.value.borrow().clone();
        match cached {
            Some(value) => value,
            // Only reachable when the derivation reads itself.
            None => untrack(|| (self.inner.getter)()),
        }
    }
}

impl<T> Computed<T> {
    /// Identity of the computed's slot.
    pub fn id(&self) -> OwnerId {
        self.inner.id
    }

    /// Whether the next read will recompute.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// The lazy effect backing the derivation.
    pub fn effect(&self) -> Effect {
        self.inner.effect.clone()
    }
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug> Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id)
            .field("dirty", &self.inner.dirty.get())
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

/// Create a computed value.
pub fn computed<T: Clone + 'static>(getter: impl Fn() -> T + 'static) -> Computed<T> {
    Computed::new(getter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Ref;

    fn counted<T: Clone + 'static>(
        f: impl Fn() -> T + 'static,
    ) -> (Computed<T>, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let c = Rc::clone(&calls);
        let computed = Computed::new(move || {
            c.set(c.get() + 1);
            f()
        });
        (computed, calls)
    }

    #[test]
    fn nothing_runs_before_first_read() {
        let (doubled, calls) = counted(|| 42);
        assert!(doubled.is_dirty());
        assert_eq!(calls.get(), 0);
        assert_eq!(doubled.get(), 42);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn clean_reads_use_the_cache() {
        let base = Ref::new(3);
        let b = base.clone();
        let (tripled, calls) = counted(move || b.get() * 3);

        assert_eq!(tripled.get(), 9);
        assert_eq!(tripled.get(), 9);
        assert_eq!(calls.get(), 1);

        base.set(4);
        assert_eq!(calls.get(), 1);
        assert_eq!(tripled.get(), 12);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn chained_computed_stays_lazy() {
        let base = Ref::new(1);
        let b = base.clone();
        let (inner, inner_calls) = counted(move || b.get() + 1);
        let i = inner.clone();
        let (outer, outer_calls) = counted(move || i.get() * 10);

        assert_eq!(outer.get(), 20);
        base.set(5);
        assert!(inner.is_dirty());
        assert!(outer.is_dirty());
        assert_eq!(inner_calls.get(), 1);
        assert_eq!(outer_calls.get(), 1);

        assert_eq!(outer.get(), 60);
        assert_eq!(inner_calls.get(), 2);
        assert_eq!(outer_calls.get(), 2);
    }

    #[test]
    fn dropping_computed_stops_its_effect() {
        let base = Ref::new(1);
        let b = base.clone();
        let doubled = Computed::new(move || b.get() * 2);
        doubled.get();
        let effect = doubled.effect();
        assert!(effect.is_active());

        drop(doubled);
        assert!(!effect.is_active());
        assert_eq!(Runtime::tracked_locations(base.id()), 0);
    }
}
