//! Instance state shared by setup, render, hooks and methods.
//!
//! [`InstanceCore`] holds everything about a component instance that does not
//! depend on the host: props, slots, the state bag, computed properties,
//! methods, hooks and the provide scope. User code reaches it through
//! [`ComponentContext`].

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use super::definition::{ComponentOptions, HookFn, MethodFn, RenderFn};
use super::hooks::{CurrentInstance, HookTable, LifecycleHook};
use crate::app::AppContext;
use crate::error::{warn_usage, Error, Result};
use crate::reactive::{untrack, Computed, EffectScope, Reactive, Ref, Runtime};
use crate::render::{event_key, text, AttrValue, Attrs, Event, Listener, VNode};

static NEXT_UID: AtomicUsize = AtomicUsize::new(0);

/// Where an instance is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    /// Setup has run; the tree is not attached yet.
    Created,
    /// Attached and idle.
    Mounted,
    /// Re-rendering.
    Updating,
    /// Torn down. Updates are rejected.
    Unmounted,
}

pub(crate) struct InstanceCore {
    uid: usize,
    name: String,
    app: Rc<AppContext>,
    parent: Option<Rc<InstanceCore>>,
    props: Reactive<AttrValue>,
    slots: Ref<Vec<VNode>>,
    data: Reactive<Value>,
    computed: RefCell<IndexMap<String, Computed<Value>>>,
    methods: RefCell<IndexMap<String, MethodFn>>,
    hooks: RefCell<HookTable>,
    provides: RefCell<HashMap<String, Rc<dyn Any>>>,
    scope: EffectScope,
    state: Cell<InstanceState>,
}

impl InstanceCore {
    pub(crate) fn new(
        app: Rc<AppContext>,
        parent: Option<Rc<InstanceCore>>,
        name: &str,
        props: &Attrs,
        slots: &[VNode],
    ) -> Rc<Self> {
        Rc::new(Self {
            uid: NEXT_UID.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            app,
            parent,
            props: props
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            slots: Ref::new(slots.to_vec()),
            data: Reactive::new(),
            computed: RefCell::new(IndexMap::new()),
            methods: RefCell::new(IndexMap::new()),
            hooks: RefCell::new(HookTable::default()),
            provides: RefCell::new(HashMap::new()),
            scope: EffectScope::new(),
            state: Cell::new(InstanceState::Created),
        })
    }

    pub(crate) fn uid(&self) -> usize {
        self.uid
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn app(&self) -> &Rc<AppContext> {
        &self.app
    }

    pub(crate) fn state(&self) -> InstanceState {
        self.state.get()
    }

    pub(crate) fn set_state(&self, state: InstanceState) {
        self.state.set(state);
    }

    pub(crate) fn scope(&self) -> &EffectScope {
        &self.scope
    }

    pub(crate) fn register_hook(&self, hook: LifecycleHook, f: HookFn) {
        self.hooks.borrow_mut().register(hook, f);
    }

    /// Run every hook registered for `hook`, untracked.
    pub(crate) fn call_hooks(self: &Rc<Self>, hook: LifecycleHook) {
        let hooks = self.hooks.borrow().get(hook);
        if hooks.is_empty() {
            return;
        }
        tracing::debug!(component = %self.name, uid = self.uid, ?hook, count = hooks.len(), "running lifecycle hooks");
        let ctx = ComponentContext::new(Rc::clone(self));
        untrack(|| {
            for f in &hooks {
                f(&ctx);
            }
        });
    }

    /// Run setup, bind methods, initialize state and computed properties, then
    /// fire `created`. Returns the render function to use.
    pub(crate) fn setup(self: &Rc<Self>, options: &ComponentOptions) -> Result<RenderFn> {
        let ctx = ComponentContext::new(Rc::clone(self));
        let outcome = {
            let _current = CurrentInstance::enter(ctx.clone());
            untrack(|| self.scope.run(|| self.initialize(&ctx, options)))
        };
        let render = match outcome {
            Some(result) => result?,
            None => None,
        };

        {
            let mut hooks = self.hooks.borrow_mut();
            for (hook, f) in &options.hooks {
                hooks.register(*hook, Rc::clone(f));
            }
        }
        tracing::debug!(component = %self.name, uid = self.uid, "created");
        self.call_hooks(LifecycleHook::Created);

        match render.or_else(|| options.render.clone()) {
            Some(render) => Ok(render),
            None => {
                warn_usage(Error::MissingRender(self.name.clone()));
                Ok(Rc::new(|_: &ComponentContext| text("")))
            }
        }
    }

    fn initialize(
        self: &Rc<Self>,
        ctx: &ComponentContext,
        options: &ComponentOptions,
    ) -> Result<Option<RenderFn>> {
        let render = match &options.setup {
            Some(setup) => setup(ctx)?,
            None => None,
        };

        self.methods
            .borrow_mut()
            .extend(options.methods.iter().map(|(name, f)| (name.clone(), Rc::clone(f))));

        if let Some(data) = &options.data {
            match data(ctx) {
                Value::Object(entries) => {
                    for (key, value) in entries {
                        self.data.set(key, value);
                    }
                }
                Value::Null => {}
                other => {
                    tracing::warn!(component = %self.name, value = %other, "data must return an object; ignored");
                }
            }
        }

        for (name, getter) in &options.computed {
            let core = Rc::downgrade(self);
            let getter = Rc::clone(getter);
            let computed = Computed::new(move || match core.upgrade() {
                Some(core) => getter(&ComponentContext::new(core)),
                None => Value::Null,
            });
            self.computed.borrow_mut().insert(name.clone(), computed);
        }

        Ok(render)
    }

    /// Reconcile the props bag against new props, then replace the slots.
    pub(crate) fn update_props(&self, props: &Attrs, slots: &[VNode]) {
        // The render effect reruns once, after every prop is in place.
        Runtime::batch(|| {
            untrack(|| {
                for key in self.props.keys() {
                    if !props.contains_key(&key) {
                        self.props.remove(&key);
                    }
                }
                for (key, value) in props.iter() {
                    self.props.set(key.clone(), value.clone());
                }
                self.slots.set(slots.to_vec());
            })
        });
    }

    /// Complete a deferred mount: mark the instance mounted and fire `mounted`.
    pub(crate) fn finish_mount(self: &Rc<Self>) {
        if self.state.get() != InstanceState::Created {
            return;
        }
        self.state.set(InstanceState::Mounted);
        tracing::debug!(component = %self.name, uid = self.uid, "mounted");
        self.call_hooks(LifecycleHook::Mounted);
    }

    /// Drop hooks and provided values after unmount.
    pub(crate) fn clear(&self) {
        self.hooks.borrow_mut().clear();
        self.provides.borrow_mut().clear();
    }

    fn provided(&self, key: &str) -> Option<Rc<dyn Any>> {
        self.provides.borrow().get(key).cloned()
    }
}

fn downcast<T: Clone + 'static>(key: &str, value: Rc<dyn Any>) -> Option<T> {
    match value.downcast_ref::<T>() {
        Some(value) => Some(value.clone()),
        None => {
            warn_usage(Error::InjectionTypeMismatch(key.to_string()));
            None
        }
    }
}

/// Handle to a component instance, passed to setup, render, hooks, methods
/// and computed getters.
#[derive(Clone)]
pub struct ComponentContext {
    core: Rc<InstanceCore>,
}

impl ComponentContext {
    pub(crate) fn new(core: Rc<InstanceCore>) -> Self {
        Self { core }
    }

    pub(crate) fn core(&self) -> &Rc<InstanceCore> {
        &self.core
    }

    /// Unique instance id. Parents have smaller ids than their children.
    pub fn uid(&self) -> usize {
        self.core.uid
    }

    /// Component name.
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Lifecycle state.
    pub fn state(&self) -> InstanceState {
        self.core.state.get()
    }

    /// The parent instance, if any.
    pub fn parent(&self) -> Option<ComponentContext> {
        self.core.parent.clone().map(Self::new)
    }

    /// The app this instance belongs to.
    pub fn app(&self) -> Rc<AppContext> {
        Rc::clone(&self.core.app)
    }

    /// The reactive props bag.
    pub fn props(&self) -> Reactive<AttrValue> {
        self.core.props.clone()
    }

    /// A data prop. Tracked.
    pub fn prop(&self, key: &str) -> Option<Value> {
        self.core.props.get(key).and_then(|value| value.as_value().cloned())
    }

    /// A listener prop, e.g. `onClick`. Tracked.
    pub fn listener(&self, key: &str) -> Option<Listener> {
        self.core
            .props
            .get(key)
            .and_then(|value| value.as_listener().cloned())
    }

    /// Slot children passed by the parent. Tracked.
    pub fn slots(&self) -> Vec<VNode> {
        self.core.slots.get()
    }

    /// The reactive state bag.
    pub fn data(&self) -> Reactive<Value> {
        self.core.data.clone()
    }

    /// Read `key` from state, then computed properties, then props, then app
    /// globals.
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.core.data.get(key) {
            return Some(value);
        }
        if let Some(value) = self.computed(key) {
            return Some(value);
        }
        if let Some(value) = self.prop(key) {
            return Some(value);
        }
        self.core.app.global(key)
    }

    /// Write `key` in the state bag.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.core.data.set(key, value.into());
    }

    /// Read a computed property.
    pub fn computed(&self, name: &str) -> Option<Value> {
        let computed = self.core.computed.borrow().get(name).cloned();
        computed.map(|computed| computed.get())
    }

    /// Call a method. Unknown methods log a warning and return `None`.
    pub fn call(&self, method: &str, args: &[Value]) -> Option<Value> {
        let found = self.core.methods.borrow().get(method).cloned();
        match found {
            Some(f) => Some(f(self, args)),
            None => {
                warn_usage(Error::UnknownMethod {
                    component: self.core.name.clone(),
                    method: method.to_string(),
                });
                None
            }
        }
    }

    /// Invoke the parent's `on<Event>` listener. Returns whether one ran.
    pub fn emit(&self, event: &str, payload: Value) -> bool {
        let key = event_key(event);
        match self.core.props.get_untracked(&key) {
            Some(AttrValue::Listener(listener)) => {
                listener.call(&Event::new(event, payload));
                true
            }
            _ => {
                tracing::debug!(component = %self.core.name, event, "emitted event has no listener");
                false
            }
        }
    }

    /// Make `value` injectable under `key` by descendants.
    pub fn provide<T: 'static>(&self, key: impl Into<String>, value: T) {
        let value: Rc<dyn Any> = Rc::new(value);
        self.core.provides.borrow_mut().insert(key.into(), value);
    }

    /// Look up the nearest value provided under `key`, searching ancestors
    /// first and the app last.
    pub fn inject<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        let mut cursor = self.core.parent.clone();
        while let Some(core) = cursor {
            if let Some(value) = core.provided(key) {
                return downcast(key, value);
            }
            cursor = core.parent.clone();
        }
        match self.core.app.provided(key) {
            Some(value) => downcast(key, value),
            None => {
                warn_usage(Error::InjectionNotFound(key.to_string()));
                None
            }
        }
    }

    /// An app-level global property.
    pub fn global(&self, key: &str) -> Option<Value> {
        self.core.app.global(key)
    }
}

impl fmt::Debug for ComponentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentContext")
            .field("uid", &self.core.uid)
            .field("name", &self.core.name)
            .field("state", &self.core.state.get())
            .finish()
    }
}
