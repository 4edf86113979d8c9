//! Watchers.
//!
//! A watcher pairs a tracked source with an untracked callback. The source is
//! re-evaluated whenever one of its dependencies changes; the callback only
//! fires when the produced value actually differs.

use std::cell::RefCell;
use std::rc::Rc;

use super::context::untrack;
use super::effect::{Effect, EffectOptions};

/// Options accepted by [`watch`].
#[derive(Debug, Default, Clone, Copy)]
pub struct WatchOptions {
    /// Call the callback once at creation with no previous value.
    pub immediate: bool,
}

/// Watch `source` and call `callback(new, old)` when its value changes.
///
/// The returned effect owns the watcher; stopping it stops the watcher.
pub fn watch<T, S, C>(source: S, callback: C, options: WatchOptions) -> Effect
where
    T: Clone + PartialEq + 'static,
    S: Fn() -> T + 'static,
    C: FnMut(&T, Option<&T>) + 'static,
{
    let latest: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));
    let callback = Rc::new(RefCell::new(callback));

    let slot = Rc::clone(&latest);
    let job_slot = Rc::clone(&latest);
    let job_callback = Rc::clone(&callback);
    let effect = Effect::with_options(
        move || {
            let value = source();
            *slot.borrow_mut() = Some(value);
        },
        EffectOptions::lazy().with_scheduler(move |effect| {
            let previous = job_slot.borrow().clone();
            effect.run();
            let current = job_slot.borrow().clone();
            if let Some(current) = current {
                if previous.as_ref() != Some(&current) {
                    untrack(|| (job_callback.borrow_mut())(&current, previous.as_ref()));
                }
            }
        }),
    );

    effect.run();
    if options.immediate {
        let initial = latest.borrow().clone();
        if let Some(initial) = initial {
            untrack(|| (callback.borrow_mut())(&initial, None));
        }
    }
    effect
}
