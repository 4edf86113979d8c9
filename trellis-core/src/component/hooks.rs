//! Lifecycle hooks and composition helpers.
//!
//! While a component's setup runs, it is the *current instance*. The free
//! functions here register hooks on it and read or write its provide/inject
//! scope. Called at any other time they log a usage warning and do nothing.
//!
//! ```rust
//! use trellis_core::component::{on_mounted, render, Component};
//! use trellis_core::render::text;
//!
//! let widget = Component::from_setup("Widget", |_| {
//!     on_mounted(|ctx| tracing::info!(uid = ctx.uid(), "widget is live"));
//!     Ok(render(|_| text("widget")))
//! });
//! # let _ = widget;
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::context::ComponentContext;
use super::definition::HookFn;
use crate::error::{warn_usage, Error};

thread_local! {
    static CURRENT_INSTANCE: RefCell<Vec<ComponentContext>> = const { RefCell::new(Vec::new()) };
}

/// Lifecycle phases a hook can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleHook {
    Created,
    BeforeMount,
    Mounted,
    BeforeUpdate,
    Updated,
    BeforeUnmount,
    Unmounted,
}

/// Hooks registered on one instance, in registration order per phase.
#[derive(Default)]
pub(crate) struct HookTable {
    hooks: HashMap<LifecycleHook, Vec<HookFn>>,
}

impl HookTable {
    pub(crate) fn register(&mut self, hook: LifecycleHook, f: HookFn) {
        self.hooks.entry(hook).or_default().push(f);
    }

    pub(crate) fn get(&self, hook: LifecycleHook) -> Vec<HookFn> {
        self.hooks.get(&hook).cloned().unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn len(&self, hook: LifecycleHook) -> usize {
        self.hooks.get(&hook).map_or(0, Vec::len)
    }

    pub(crate) fn clear(&mut self) {
        self.hooks.clear();
    }
}

/// Marks an instance as current for the guard's lifetime.
pub(crate) struct CurrentInstance;

impl CurrentInstance {
    pub(crate) fn enter(ctx: ComponentContext) -> Self {
        CURRENT_INSTANCE.with(|stack| stack.borrow_mut().push(ctx));
        Self
    }
}

impl Drop for CurrentInstance {
    fn drop(&mut self) {
        let popped = CURRENT_INSTANCE.try_with(|stack| stack.borrow_mut().pop());
        drop(popped);
    }
}

/// The component whose setup is running, if any.
pub fn current_instance() -> Option<ComponentContext> {
    CURRENT_INSTANCE.with(|stack| stack.borrow().last().cloned())
}

fn with_current<T>(helper: &'static str, f: impl FnOnce(&ComponentContext) -> T) -> Option<T> {
    match current_instance() {
        Some(ctx) => Some(f(&ctx)),
        None => {
            warn_usage(Error::OutsideSetup(helper));
            None
        }
    }
}

fn register(helper: &'static str, hook: LifecycleHook, f: impl Fn(&ComponentContext) + 'static) {
    let f: HookFn = Rc::new(f);
    with_current(helper, |ctx| ctx.core().register_hook(hook, f));
}

/// Run `f` before the first render.
pub fn on_before_mount(f: impl Fn(&ComponentContext) + 'static) {
    register("on_before_mount", LifecycleHook::BeforeMount, f);
}

/// Run `f` once the component's tree is attached.
pub fn on_mounted(f: impl Fn(&ComponentContext) + 'static) {
    register("on_mounted", LifecycleHook::Mounted, f);
}

/// Run `f` before every re-render.
pub fn on_before_update(f: impl Fn(&ComponentContext) + 'static) {
    register("on_before_update", LifecycleHook::BeforeUpdate, f);
}

/// Run `f` after every re-render has been patched.
pub fn on_updated(f: impl Fn(&ComponentContext) + 'static) {
    register("on_updated", LifecycleHook::Updated, f);
}

/// Run `f` before teardown starts.
pub fn on_before_unmount(f: impl Fn(&ComponentContext) + 'static) {
    register("on_before_unmount", LifecycleHook::BeforeUnmount, f);
}

/// Run `f` after the component's tree has been detached.
pub fn on_unmounted(f: impl Fn(&ComponentContext) + 'static) {
    register("on_unmounted", LifecycleHook::Unmounted, f);
}

/// Make `value` injectable under `key` by every descendant.
pub fn provide<T: 'static>(key: impl Into<String>, value: T) {
    let key = key.into();
    with_current("provide", move |ctx| ctx.provide(key, value));
}

/// Look up the nearest value provided under `key` by an ancestor or the app.
pub fn inject<T: Clone + 'static>(key: &str) -> Option<T> {
    with_current("inject", |ctx| ctx.inject(key)).flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_outside_setup_are_noops() {
        assert!(current_instance().is_none());
        on_mounted(|_| {});
        provide("theme", "dark".to_string());
        assert_eq!(inject::<String>("theme"), None);
    }

    #[test]
    fn table_keeps_registration_order() {
        let first: HookFn = Rc::new(|_: &ComponentContext| {});
        let second: HookFn = Rc::new(|_: &ComponentContext| {});
        let mut table = HookTable::default();
        table.register(LifecycleHook::Mounted, Rc::clone(&first));
        table.register(LifecycleHook::Mounted, Rc::clone(&second));

        let hooks = table.get(LifecycleHook::Mounted);
        assert!(Rc::ptr_eq(&hooks[0], &first));
        assert!(Rc::ptr_eq(&hooks[1], &second));
        assert_eq!(table.len(LifecycleHook::Updated), 0);
        table.clear();
        assert_eq!(table.len(LifecycleHook::Mounted), 0);
    }

    #[test]
    fn hook_names_serialize_in_camel_case() {
        let name = serde_json::to_string(&LifecycleHook::BeforeUnmount).unwrap();
        assert_eq!(name, "\"beforeUnmount\"");
    }
}
