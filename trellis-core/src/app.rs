//! Applications.
//!
//! An [`App`] pairs a root component with a host. Before mounting, it collects
//! app-wide state in an [`AppContext`]: the named component registry, provided
//! values, global properties, runtime configuration and the update scheduler.
//! Plugins receive the context and can register any of these.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::component::{Component, ComponentInstance, UpdateScheduler};
use crate::config::RuntimeConfig;
use crate::error::{warn_usage, Error, Result};
use crate::reactive::untrack;
use crate::render::{component, Attrs, Host, Mounted, Reconciler};

/// App-wide state shared by every instance of one app.
#[derive(Default)]
pub struct AppContext {
    components: RefCell<HashMap<String, Component>>,
    provides: RefCell<HashMap<String, Rc<dyn Any>>>,
    globals: RefCell<IndexMap<String, Value>>,
    scheduler: UpdateScheduler,
}

impl AppContext {
    /// An empty context with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `definition` for [`component_named`](crate::render::component_named)
    /// references.
    pub fn component(&self, name: impl Into<String>, definition: Component) {
        let name = name.into();
        tracing::debug!(component = %name, "registered component");
        self.components.borrow_mut().insert(name, definition);
    }

    /// Look up a registered component.
    pub fn resolve_component(&self, name: &str) -> Option<Component> {
        self.components.borrow().get(name).cloned()
    }

    /// Provide a value to every component of the app.
    pub fn provide<T: 'static>(&self, key: impl Into<String>, value: T) {
        let value: Rc<dyn Any> = Rc::new(value);
        self.provides.borrow_mut().insert(key.into(), value);
    }

    pub(crate) fn provided(&self, key: &str) -> Option<Rc<dyn Any>> {
        self.provides.borrow().get(key).cloned()
    }

    /// Set a global property readable from every component.
    pub fn global_property(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.globals.borrow_mut().insert(key.into(), value.into());
    }

    /// Read a global property.
    pub fn global(&self, key: &str) -> Option<Value> {
        self.globals.borrow().get(key).cloned()
    }

    /// Current runtime configuration.
    pub fn config(&self) -> RuntimeConfig {
        self.scheduler.config()
    }

    /// Replace the runtime configuration.
    pub fn set_config(&self, config: RuntimeConfig) {
        self.scheduler.set_config(config);
    }

    /// The scheduler running component updates.
    pub fn scheduler(&self) -> &UpdateScheduler {
        &self.scheduler
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("components", &self.components.borrow().keys().collect::<Vec<_>>())
            .field("globals", &*self.globals.borrow())
            .field("config", &self.config())
            .finish()
    }
}

/// Extends an app at setup time.
pub trait Plugin {
    /// Register components, provided values or globals on `app`.
    fn install(&self, app: &AppContext);
}

impl<F: Fn(&AppContext)> Plugin for F {
    fn install(&self, app: &AppContext) {
        self(app)
    }
}

/// Where to mount an app.
#[derive(Debug, Clone, PartialEq)]
pub enum MountTarget<N> {
    /// A selector resolved with [`Host::query_selector`].
    Selector(String),
    /// A node already in hand.
    Node(N),
}

impl<N> From<&str> for MountTarget<N> {
    fn from(selector: &str) -> Self {
        Self::Selector(selector.to_string())
    }
}

impl<N> From<String> for MountTarget<N> {
    fn from(selector: String) -> Self {
        Self::Selector(selector)
    }
}

struct MountedApp<H: Host> {
    container: H::Node,
    tree: Mounted<H>,
}

/// A root component bound to a host.
///
/// Dropping the app unmounts it: every effect of the tree is stopped and the
/// root node is detached. Keep the app alive for as long as the UI should
/// stay reactive.
///
/// # Example
///
/// ```rust
/// use std::rc::Rc;
/// use trellis_core::app::create_app;
/// use trellis_core::component::{render, Component};
/// use trellis_core::reactive::Ref;
/// use trellis_core::render::{h, Attrs, MemoryDocument};
///
/// let doc = Rc::new(MemoryDocument::new());
/// let root = doc.create_root("div", "app");
/// let count = Ref::new(0);
/// let c = count.clone();
/// let counter = Component::from_setup("Counter", move |_| {
///     let c = c.clone();
///     Ok(render(move |_| h("p", Attrs::new(), c.get().to_string())))
/// });
///
/// let app = create_app(Rc::clone(&doc), counter);
/// app.mount("#app").unwrap();
/// assert_eq!(doc.inner_html(root), "<p>0</p>");
///
/// count.set(3);
/// assert_eq!(doc.inner_html(root), "<p>3</p>");
/// ```
pub struct App<H: Host> {
    host: Rc<H>,
    root: Component,
    props: Attrs,
    context: Rc<AppContext>,
    mounted: RefCell<Option<MountedApp<H>>>,
}

/// Create an app rendering `root` into `host`.
pub fn create_app<H: Host>(host: Rc<H>, root: Component) -> App<H> {
    App {
        host,
        root,
        props: Attrs::new(),
        context: Rc::new(AppContext::new()),
        mounted: RefCell::new(None),
    }
}

impl<H: Host> App<H> {
    /// Use `config` for this app.
    pub fn with_config(self, config: RuntimeConfig) -> Self {
        self.context.set_config(config);
        self
    }

    /// Props passed to the root component.
    pub fn with_props(mut self, props: impl Into<Attrs>) -> Self {
        self.props = props.into();
        self
    }

    /// Register a named component.
    pub fn component(&self, name: impl Into<String>, definition: Component) -> &Self {
        self.context.component(name, definition);
        self
    }

    /// Install a plugin.
    pub fn use_plugin(&self, plugin: impl Plugin) -> &Self {
        plugin.install(&self.context);
        self
    }

    /// Provide a value to every component.
    pub fn provide<T: 'static>(&self, key: impl Into<String>, value: T) -> &Self {
        self.context.provide(key, value);
        self
    }

    /// Set a global property.
    pub fn global_property(&self, key: impl Into<String>, value: impl Into<Value>) -> &Self {
        self.context.global_property(key, value);
        self
    }

    /// The app-wide context.
    pub fn context(&self) -> &Rc<AppContext> {
        &self.context
    }

    /// Mount the root component under `target`.
    ///
    /// A selector that matches nothing logs a warning and returns `Ok(None)`.
    /// Setup errors are returned; render panics propagate.
    pub fn mount(
        &self,
        target: impl Into<MountTarget<H::Node>>,
    ) -> Result<Option<Rc<ComponentInstance<H>>>> {
        if self.mounted.borrow().is_some() {
            tracing::warn!(component = %self.root.name(), "app is already mounted");
            return Ok(None);
        }
        let container = match target.into() {
            MountTarget::Node(node) => node,
            MountTarget::Selector(selector) => match self.host.query_selector(&selector) {
                Some(node) => node,
                None => {
                    warn_usage(Error::MountTargetNotFound(selector));
                    return Ok(None);
                }
            },
        };

        tracing::debug!(component = %self.root.name(), "mounting app");
        let vnode = component(&self.root, self.props.clone(), ());
        let mut reconciler = Reconciler::new(Rc::clone(&self.host), Rc::clone(&self.context));
        let tree = untrack(|| reconciler.materialize(&vnode, &container))?;
        if let Some(node) = tree.node() {
            self.host.append_child(&container, &node);
        }
        reconciler.flush_mounted();

        let instance = tree.instance().cloned();
        *self.mounted.borrow_mut() = Some(MountedApp { container, tree });
        Ok(instance)
    }

    /// The mounted root instance.
    pub fn instance(&self) -> Option<Rc<ComponentInstance<H>>> {
        self.mounted
            .borrow()
            .as_ref()
            .and_then(|mounted| mounted.tree.instance().cloned())
    }

    /// Unmount the root component and detach its tree. Idempotent.
    pub fn unmount(&self) {
        let Some(MountedApp { container, tree }) = self.mounted.borrow_mut().take() else {
            return;
        };
        tracing::debug!(component = %self.root.name(), "unmounting app");
        let reconciler = Reconciler::new(Rc::clone(&self.host), Rc::clone(&self.context));
        reconciler.unmount(tree, Some(&container));
    }

    /// Run queued updates. Only needed with [`FlushMode::Batched`](crate::config::FlushMode).
    pub fn flush(&self) -> Result<()> {
        self.context.scheduler().flush_jobs()
    }

    /// Drain errors raised by updates that ran inside a mutation.
    pub fn take_update_errors(&self) -> Vec<Error> {
        self.context.scheduler().take_errors()
    }
}

impl<H: Host> Drop for App<H> {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::render;
    use crate::render::{text, MemoryDocument};

    fn leaf() -> Component {
        Component::from_setup("Leaf", |_| Ok(render(|_| text("leaf"))))
    }

    #[test]
    fn missing_target_is_a_noop() {
        let doc = Rc::new(MemoryDocument::new());
        let app = create_app(Rc::clone(&doc), leaf());
        assert!(app.mount("#nowhere").unwrap().is_none());
        assert!(app.instance().is_none());
        assert!(doc.ops().is_empty());
    }

    #[test]
    fn plugins_see_the_context() {
        let doc = Rc::new(MemoryDocument::new());
        let app = create_app(doc, leaf());
        app.use_plugin(|ctx: &AppContext| {
            ctx.global_property("version", "1.0");
            ctx.component("Leaf", Component::from_setup("Leaf", |_| Ok(render(|_| text("")))));
        });

        assert_eq!(app.context().global("version"), Some(Value::from("1.0")));
        assert!(app.context().resolve_component("Leaf").is_some());
    }

    #[test]
    fn mount_twice_is_ignored_and_unmount_detaches() {
        let doc = Rc::new(MemoryDocument::new());
        let root = doc.create_root("div", "app");
        let app = create_app(Rc::clone(&doc), leaf());

        let instance = app.mount("#app").unwrap().unwrap();
        assert_eq!(doc.inner_html(root), "leaf");
        assert!(app.mount("#app").unwrap().is_none());

        app.unmount();
        app.unmount();
        assert_eq!(doc.inner_html(root), "");
        assert_eq!(instance.state(), crate::component::InstanceState::Unmounted);
    }

    #[test]
    fn dropping_the_app_unmounts_it() {
        use crate::reactive::{LocationKey, Ref, Runtime};

        let doc = Rc::new(MemoryDocument::new());
        let root = doc.create_root("div", "app");
        let count = Ref::new(0);
        let c = count.clone();
        let view = Component::from_setup("Counter", move |_| {
            let c = c.clone();
            Ok(render(move |_| text(c.get().to_string())))
        });

        let app = create_app(Rc::clone(&doc), view);
        let instance = app.mount("#app").unwrap().unwrap();
        assert_eq!(Runtime::subscriber_count(&LocationKey::value(count.id())), 1);

        drop(app);
        assert_eq!(instance.state(), crate::component::InstanceState::Unmounted);
        assert_eq!(Runtime::subscriber_count(&LocationKey::value(count.id())), 0);
        assert_eq!(doc.inner_html(root), "");
        count.set(1);
        assert_eq!(instance.render_count(), 1);
    }

    #[test]
    fn config_is_shared_with_the_scheduler() {
        let doc = Rc::new(MemoryDocument::new());
        let app = create_app(doc, leaf())
            .with_config(RuntimeConfig::default().with_flush(crate::config::FlushMode::Batched));
        assert_eq!(
            app.context().scheduler().config().flush,
            crate::config::FlushMode::Batched
        );
    }
}
