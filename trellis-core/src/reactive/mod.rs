//! Reactive Primitives
//!
//! This module implements the reactive system: refs, reactive maps, computed
//! values, effects and the dependency graph connecting them.
//!
//! # Concepts
//!
//! ## Refs and reactive maps
//!
//! A [`Ref`] is a single observable slot; a [`Reactive`] map exposes one slot
//! per key. Reading a slot inside a running effect subscribes the effect to
//! it. Writing a different value notifies the subscribers; writing an equal
//! value notifies nobody.
//!
//! ## Computed values
//!
//! A [`Computed`] caches a derivation. It is backed by a lazy effect whose
//! scheduler only marks the value dirty, so nothing is recomputed until
//! somebody reads it.
//!
//! ## Effects
//!
//! An [`Effect`] reruns whenever a location it read during its latest run
//! changes. Before every rerun it drops all of its previous subscriptions, so
//! branches it no longer reads stop waking it up.
//!
//! ## Batching
//!
//! Effects triggered by a write run after the write has finished notifying,
//! once each, before the write returns. [`Runtime::batch`] widens that window
//! to several writes.
//!
//! # Implementation Notes
//!
//! Tracking uses a thread-local stack of running effects ([`ReactiveContext`])
//! and a thread-local graph of subscriber sets ([`Runtime`]). The model is
//! single-threaded; handles are `Rc`-based.

mod computed;
mod context;
mod effect;
mod object;
mod refs;
mod runtime;
mod scope;
mod subscriber;
mod watch;

pub use computed::{computed, Computed};
pub use context::{untrack, ReactiveContext};
pub use effect::{effect, stop, Effect, EffectOptions, Scheduler};
pub use object::Reactive;
pub use refs::Ref;
pub use runtime::Runtime;
pub use scope::EffectScope;
pub use subscriber::{EffectId, LocationKey, OwnerId, Slot};
pub use watch::{watch, WatchOptions};
