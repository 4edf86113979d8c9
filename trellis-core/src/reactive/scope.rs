//! Effect scopes.
//!
//! A scope collects every effect created while it is running, including the
//! lazy effects behind computed values and watchers, so they can be stopped
//! together. Component instances run their setup inside a scope and stop it
//! when they unmount.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::effect::Effect;

thread_local! {
    static ACTIVE_SCOPES: RefCell<Vec<Rc<ScopeInner>>> = const { RefCell::new(Vec::new()) };
}

struct ScopeInner {
    effects: RefCell<Vec<Effect>>,
    active: Cell<bool>,
}

/// A group of effects stopped together.
#[derive(Clone)]
pub struct EffectScope {
    inner: Rc<ScopeInner>,
}

struct ScopeGuard;

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let popped = ACTIVE_SCOPES.try_with(|scopes| scopes.borrow_mut().pop());
        drop(popped);
    }
}

impl EffectScope {
    /// Create an empty, active scope.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                effects: RefCell::new(Vec::new()),
                active: Cell::new(true),
            }),
        }
    }

    /// Run `f`, collecting the effects it creates.
    ///
    /// Returns `None` without running `f` once the scope has been stopped.
    pub fn run<T>(&self, f: impl FnOnce() -> T) -> Option<T> {
        if !self.inner.active.get() {
            tracing::warn!("cannot run an inactive effect scope");
            return None;
        }
        ACTIVE_SCOPES.with(|scopes| scopes.borrow_mut().push(Rc::clone(&self.inner)));
        let _guard = ScopeGuard;
        Some(f())
    }

    /// Stop every collected effect. Idempotent.
    pub fn stop(&self) {
        if !self.inner.active.replace(false) {
            return;
        }
        let effects = std::mem::take(&mut *self.inner.effects.borrow_mut());
        for effect in &effects {
            effect.stop();
        }
    }

    /// Whether the scope still accepts work.
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Number of collected effects. Stopped effects are dropped from the
    /// count as new ones are collected.
    pub fn len(&self) -> usize {
        self.inner.effects.borrow().len()
    }

    /// Whether no effect has been collected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EffectScope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EffectScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectScope")
            .field("active", &self.is_active())
            .field("effects", &self.len())
            .finish()
    }
}

/// Attach a newly created effect to the innermost running scope.
pub(crate) fn record_effect(effect: &Effect) {
    let scope = ACTIVE_SCOPES.with(|scopes| scopes.borrow().last().cloned());
    if let Some(scope) = scope {
        let mut effects = scope.effects.borrow_mut();
        effects.retain(Effect::is_active);
        effects.push(effect.clone());
    }
}
