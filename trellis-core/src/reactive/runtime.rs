//! Reactive Runtime
//!
//! The runtime owns the dependency graph: for every reactive location, the
//! ordered set of effects currently subscribed to it.
//!
//! # How It Works
//!
//! 1. When a location is read inside a running effect, [`Runtime::track`]
//!    adds the effect to the location's subscriber set and records the
//!    location on the effect, so the effect can unsubscribe before its next
//!    run.
//!
//! 2. When a location changes, [`Runtime::trigger`] notifies every subscriber
//!    in subscription order. Effects with a scheduler get their scheduler
//!    called instead of running directly.
//!
//! 3. Notifications are batched. Eager effects (the ones behind computed
//!    values) are notified inside the trigger; every other subscriber is
//!    queued once and notified when the outermost trigger or
//!    [`Runtime::batch`] returns. A mutation touching several locations
//!    therefore reruns each dependent effect once, and sees consistent state.
//!
//! 4. When the last handle of a reactive object is dropped, its locations are
//!    purged from the graph.
//!
//! # Threading
//!
//! The graph is thread-local. The model is single-threaded and re-entrant:
//! an effect run may trigger other effects, so no borrow of the graph or of
//! the batch queue is ever held while user code runs.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use super::context::ReactiveContext;
use super::effect::EffectInner;
use super::subscriber::{EffectId, LocationKey, OwnerId, Slot};

type SubscriberSet = IndexMap<EffectId, Rc<EffectInner>>;

/// How often one effect may be notified while a single batch drains.
const MAX_BATCH_RUNS: usize = 100;

thread_local! {
    static GRAPH: RefCell<HashMap<OwnerId, HashMap<Slot, SubscriberSet>>> =
        RefCell::new(HashMap::new());
    static BATCH: RefCell<Batch> = RefCell::new(Batch::default());
}

#[derive(Default)]
struct Batch {
    depth: usize,
    epoch: u64,
    pending: SubscriberSet,
}

struct BatchGuard;

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let _ = BATCH.try_with(|batch| {
            let mut batch = batch.borrow_mut();
            batch.depth -= 1;
            // A panicking effect abandons the rest of the batch.
            if batch.depth == 0 && std::thread::panicking() {
                batch.pending.clear();
            }
        });
    }
}

/// Entry points into the thread's dependency graph.
pub struct Runtime;

impl Runtime {
    /// Record that the running effect depends on `location`.
    ///
    /// No-op outside a tracking context.
    pub fn track(location: LocationKey) {
        let Some(effect) = ReactiveContext::current_effect() else {
            return;
        };
        if !effect.is_active() {
            return;
        }

        let inserted = GRAPH.with(|graph| {
            let mut graph = graph.borrow_mut();
            let set = graph
                .entry(location.owner)
                .or_default()
                .entry(location.slot.clone())
                .or_default();
            if set.contains_key(&effect.id()) {
                false
            } else {
                set.insert(effect.id(), Rc::clone(&effect));
                true
            }
        });

        if inserted {
            tracing::trace!(effect = ?effect.id(), ?location, "track");
            effect.record_dependency(location);
        }
    }

    /// Notify every subscriber of `location`.
    pub fn trigger(location: &LocationKey) {
        let subscribers: Vec<Rc<EffectInner>> = GRAPH.with(|graph| {
            graph
                .borrow()
                .get(&location.owner)
                .and_then(|slots| slots.get(&location.slot))
                .map(|set| set.values().cloned().collect())
                .unwrap_or_default()
        });
        if subscribers.is_empty() {
            return;
        }

        tracing::trace!(?location, count = subscribers.len(), "trigger");
        let active = ReactiveContext::active_effect();
        Self::batch(|| {
            for effect in subscribers {
                if Some(effect.id()) == active || !effect.is_active() {
                    continue;
                }
                if effect.is_eager() {
                    effect.notify();
                } else {
                    BATCH.with(|batch| {
                        batch
                            .borrow_mut()
                            .pending
                            .entry(effect.id())
                            .or_insert(effect);
                    });
                }
            }
        });
    }

    /// Run `f`, holding back effect notifications until it returns.
    ///
    /// Effects triggered several times inside the batch run once, after `f`,
    /// in the order they were first triggered. Batches nest; only the
    /// outermost one flushes.
    pub fn batch<T>(f: impl FnOnce() -> T) -> T {
        let outermost = BATCH.with(|batch| {
            let mut batch = batch.borrow_mut();
            batch.depth += 1;
            if batch.depth == 1 {
                batch.epoch += 1;
            }
            batch.depth == 1
        });
        let _guard = BatchGuard;
        let output = f();
        if outermost {
            Self::flush_pending();
        }
        output
    }

    /// Whether notifications are currently held back.
    pub fn is_batching() -> bool {
        BATCH.with(|batch| batch.borrow().depth > 0)
    }

    /// Identifies the current outermost batch. Changes every time a new
    /// outermost batch opens.
    pub fn batch_epoch() -> u64 {
        BATCH.with(|batch| batch.borrow().epoch)
    }

    // Runs with the batch still open, so effects triggered by a flushed
    // effect join the queue instead of running inside it.
    fn flush_pending() {
        let mut runs: HashMap<EffectId, usize> = HashMap::new();
        loop {
            let next = BATCH.with(|batch| batch.borrow_mut().pending.shift_remove_index(0));
            let Some((id, effect)) = next else {
                break;
            };
            let count = runs.entry(id).or_insert(0);
            *count += 1;
            if *count > MAX_BATCH_RUNS {
                tracing::warn!(effect = ?id, limit = MAX_BATCH_RUNS, "effect keeps retriggering itself");
                continue;
            }
            if effect.is_active() {
                effect.notify();
            }
        }
    }

    /// Remove an effect from the given locations' subscriber sets.
    pub(crate) fn unsubscribe(effect: EffectId, locations: impl IntoIterator<Item = LocationKey>) {
        // Effects can be stopped from destructors during thread teardown.
        let removed = GRAPH.try_with(|graph| {
            let mut graph = graph.borrow_mut();
            let mut removed = Vec::new();
            for location in locations {
                let Some(slots) = graph.get_mut(&location.owner) else {
                    continue;
                };
                if let Some(set) = slots.get_mut(&location.slot) {
                    removed.extend(set.shift_remove(&effect));
                    if set.is_empty() {
                        slots.remove(&location.slot);
                    }
                }
                if slots.is_empty() {
                    graph.remove(&location.owner);
                }
            }
            removed
        });
        let removed: Vec<Rc<EffectInner>> = removed.unwrap_or_default();
        drop(removed);
    }

    /// Drop every subscriber set keyed by `owner`.
    pub(crate) fn purge_owner(owner: OwnerId) {
        // The graph may already be gone during thread teardown.
        let removed = GRAPH.try_with(|graph| graph.borrow_mut().remove(&owner));
        drop(removed);
    }

    /// Number of effects subscribed to `location`.
    pub fn subscriber_count(location: &LocationKey) -> usize {
        GRAPH.with(|graph| {
            graph
                .borrow()
                .get(&location.owner)
                .and_then(|slots| slots.get(&location.slot))
                .map_or(0, IndexMap::len)
        })
    }

    /// Number of locations of `owner` that currently have subscribers.
    pub fn tracked_locations(owner: OwnerId) -> usize {
        GRAPH.with(|graph| graph.borrow().get(&owner).map_or(0, HashMap::len))
    }

    /// Whether a read right now would be recorded.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_tracking()
    }
}
