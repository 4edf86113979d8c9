//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies (unless it is lazy).
//!
//! 2. When any dependency changes, the effect runs again, or, if it has a
//!    scheduler, the scheduler decides when it runs.
//!
//! 3. Before every run, the effect removes itself from every subscriber set it
//!    joined during the previous run, then tracks afresh. A branch that is no
//!    longer read stops notifying the effect.
//!
//! # Termination
//!
//! [`Effect::stop`] marks the effect inactive and drops its subscriptions.
//! An inactive effect never runs or tracks again. Stopping is idempotent.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::runtime::Runtime;
use super::scope;
use super::subscriber::{EffectId, LocationKey};

/// Replacement for "run me" requests coming from the dependency graph.
pub type Scheduler = Rc<dyn Fn(&Effect)>;

/// Options accepted by [`Effect::with_options`].
#[derive(Default, Clone)]
pub struct EffectOptions {
    /// Skip the initial run.
    pub lazy: bool,
    /// Called instead of running the effect when a dependency changes.
    pub scheduler: Option<Scheduler>,
    /// Notify inside the trigger instead of after the outermost batch.
    pub eager: bool,
}

impl EffectOptions {
    /// Options for an effect that does not run on creation.
    pub fn lazy() -> Self {
        Self {
            lazy: true,
            ..Self::default()
        }
    }

    /// Notify this effect as soon as a dependency changes, even inside a
    /// batch. Meant for cheap schedulers that only invalidate.
    pub fn eager(mut self) -> Self {
        self.eager = true;
        self
    }

    /// Route dependency notifications through `scheduler`.
    pub fn with_scheduler(mut self, scheduler: impl Fn(&Effect) + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }
}

/// Shared state of an effect. Subscriber sets hold strong references to it.
pub struct EffectInner {
    id: EffectId,
    run: RefCell<Box<dyn FnMut()>>,
    dependencies: RefCell<SmallVec<[LocationKey; 4]>>,
    scheduler: Option<Scheduler>,
    eager: bool,
    active: Cell<bool>,
    run_count: Cell<usize>,
}

impl EffectInner {
    pub(crate) fn id(&self) -> EffectId {
        self.id
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.get()
    }

    pub(crate) fn is_eager(&self) -> bool {
        self.eager
    }

    pub(crate) fn record_dependency(&self, location: LocationKey) {
        self.dependencies.borrow_mut().push(location);
    }

    /// A dependency changed.
    pub(crate) fn notify(self: &Rc<Self>) {
        match &self.scheduler {
            Some(scheduler) => scheduler(&Effect {
                inner: Rc::clone(self),
            }),
            None => self.execute(),
        }
    }

    fn cleanup(&self) {
        let dependencies = std::mem::take(&mut *self.dependencies.borrow_mut());
        Runtime::unsubscribe(self.id, dependencies);
    }

    fn execute(self: &Rc<Self>) {
        if !self.active.get() {
            return;
        }
        if ReactiveContext::is_running(self.id) {
            tracing::trace!(effect = ?self.id, "skipped recursive run");
            return;
        }

        self.cleanup();
        let _ctx = ReactiveContext::enter(Rc::clone(self));
        self.run_count.set(self.run_count.get() + 1);
        let mut run = self.run.borrow_mut();
        (run)();
    }
}

/// A side-effecting computation that reruns when its dependencies change.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::{Effect, Ref};
///
/// let count = Ref::new(0);
/// let c = count.clone();
/// let effect = Effect::new(move || println!("count is {}", c.get()));
///
/// count.set(5); // prints "count is 5"
/// effect.stop();
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Effect {
    /// Create an effect and run it immediately.
    pub fn new(run: impl FnMut() + 'static) -> Self {
        Self::with_options(run, EffectOptions::default())
    }

    /// Create an effect with explicit options.
    pub fn with_options(run: impl FnMut() + 'static, options: EffectOptions) -> Self {
        let effect = Self {
            inner: Rc::new(EffectInner {
                id: EffectId::new(),
                run: RefCell::new(Box::new(run)),
                dependencies: RefCell::new(SmallVec::new()),
                scheduler: options.scheduler,
                eager: options.eager,
                active: Cell::new(true),
                run_count: Cell::new(0),
            }),
        };
        scope::record_effect(&effect);

        if !options.lazy {
            effect.run();
        }
        effect
    }

    /// Run the effect now, re-collecting its dependencies.
    pub fn run(&self) {
        self.inner.execute();
    }

    /// Deactivate the effect and drop all of its subscriptions.
    pub fn stop(&self) {
        if !self.inner.active.replace(false) {
            return;
        }
        self.inner.cleanup();
        // Release captured state unless the effect is stopping itself mid-run.
        if let Ok(mut run) = self.inner.run.try_borrow_mut() {
            *run = Box::new(|| {});
        }
        tracing::trace!(effect = ?self.inner.id, "stopped");
    }

    /// Whether the effect can still run.
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// The effect's unique ID.
    pub fn id(&self) -> EffectId {
        self.inner.id
    }

    /// Number of times the effect body has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Number of locations recorded during the latest run.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.borrow().len()
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("active", &self.is_active())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

/// Create and run an effect.
pub fn effect(run: impl FnMut() + 'static) -> Effect {
    Effect::new(run)
}

/// Stop an effect.
pub fn stop(effect: &Effect) {
    effect.stop();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Ref;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
        let count = Rc::new(Cell::new(0));
        (Rc::clone(&count), count)
    }

    #[test]
    fn effect_runs_on_creation() {
        let (runs, r) = counter();
        let _effect = Effect::new(move || r.set(r.get() + 1));
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn lazy_effect_waits_for_run() {
        let (runs, r) = counter();
        let effect = Effect::with_options(move || r.set(r.get() + 1), EffectOptions::lazy());
        assert_eq!(runs.get(), 0);
        effect.run();
        assert_eq!(runs.get(), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn scheduler_replaces_direct_rerun() {
        let source = Ref::new(1);
        let (runs, r) = counter();
        let (scheduled, s) = counter();
        let src = source.clone();
        let _effect = Effect::with_options(
            move || {
                src.get();
                r.set(r.get() + 1);
            },
            EffectOptions::default().with_scheduler(move |_| s.set(s.get() + 1)),
        );

        source.set(2);
        assert_eq!(runs.get(), 1);
        assert_eq!(scheduled.get(), 1);
    }

    #[test]
    fn stopped_effect_never_runs_again() {
        let source = Ref::new(0);
        let (runs, r) = counter();
        let src = source.clone();
        let effect = Effect::new(move || {
            src.get();
            r.set(r.get() + 1);
        });

        effect.stop();
        effect.stop();
        source.set(1);
        effect.run();
        assert_eq!(runs.get(), 1);
        assert!(!effect.is_active());
        assert_eq!(effect.dependency_count(), 0);
    }

    #[test]
    fn self_mutation_does_not_recurse() {
        let source = Ref::new(0);
        let src = source.clone();
        let effect = Effect::new(move || {
            let next = src.get() + 1;
            src.set(next);
        });
        assert_eq!(effect.run_count(), 1);
        assert_eq!(source.get_untracked(), 1);
    }

    #[test]
    fn panicking_effect_restores_stack() {
        let source = Ref::new(false);
        let src = source.clone();
        let _effect = Effect::new(move || {
            if src.get() {
                panic!("render failed");
            }
        });

        let result = catch_unwind(AssertUnwindSafe(|| source.set(true)));
        assert!(result.is_err());
        assert_eq!(ReactiveContext::depth(), 0);
        assert!(!ReactiveContext::is_tracking());
    }

    #[test]
    fn stop_inside_own_run_is_safe() {
        let holder: Rc<RefCell<Option<Effect>>> = Rc::new(RefCell::new(None));
        let h = Rc::clone(&holder);
        let source = Ref::new(0);
        let src = source.clone();
        let effect = Effect::new(move || {
            if src.get() > 0 {
                if let Some(me) = h.borrow().as_ref() {
                    me.stop();
                }
            }
        });
        *holder.borrow_mut() = Some(effect.clone());

        source.set(1);
        assert!(!effect.is_active());
        source.set(2);
        assert_eq!(effect.run_count(), 2);
        holder.borrow_mut().take();
    }
}
