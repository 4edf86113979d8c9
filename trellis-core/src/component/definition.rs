//! Component definitions.
//!
//! A component is either a bare setup function ([`SetupComponent`]) or an
//! options object ([`ComponentOptions`]). Both are normalized to options before
//! an instance is created, so the lifecycle only ever sees one shape.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;

use super::context::ComponentContext;
use super::hooks::LifecycleHook;
use crate::error::Result;
use crate::render::VNode;

/// Produces the component's VNode tree. Runs inside the render effect.
pub type RenderFn = Rc<dyn Fn(&ComponentContext) -> VNode>;

/// Runs once per instance. May return the render function.
pub type SetupFn = Rc<dyn Fn(&ComponentContext) -> Result<Option<RenderFn>>>;

/// Builds the initial state bag. Must return a JSON object.
pub type DataFn = Rc<dyn Fn(&ComponentContext) -> Value>;

/// Derives a computed property.
pub type ComputedFn = Rc<dyn Fn(&ComponentContext) -> Value>;

/// A named method callable through [`ComponentContext::call`].
pub type MethodFn = Rc<dyn Fn(&ComponentContext, &[Value]) -> Value>;

/// A lifecycle hook.
pub type HookFn = Rc<dyn Fn(&ComponentContext)>;

/// Wrap a closure as a [`RenderFn`].
pub fn render(f: impl Fn(&ComponentContext) -> VNode + 'static) -> RenderFn {
    Rc::new(f)
}

/// A component defined by its setup function alone.
pub struct SetupComponent {
    name: String,
    setup: Rc<dyn Fn(&ComponentContext) -> Result<RenderFn>>,
}

impl SetupComponent {
    /// Component name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A component defined by options.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use trellis_core::component::ComponentOptions;
/// use trellis_core::render::{h, Attrs};
///
/// let counter = ComponentOptions::new("Counter")
///     .data(|_| json!({ "count": 0 }))
///     .computed("double", |ctx| json!(ctx.get("count").and_then(|v| v.as_i64()).unwrap_or(0) * 2))
///     .render(|ctx| h("p", Attrs::new(), ctx.get("double").unwrap_or_default().to_string()))
///     .build();
/// assert_eq!(counter.name(), "Counter");
/// ```
#[derive(Clone, Default)]
pub struct ComponentOptions {
    pub(crate) name: String,
    pub(crate) setup: Option<SetupFn>,
    pub(crate) data: Option<DataFn>,
    pub(crate) computed: IndexMap<String, ComputedFn>,
    pub(crate) methods: IndexMap<String, MethodFn>,
    pub(crate) hooks: Vec<(LifecycleHook, HookFn)>,
    pub(crate) render: Option<RenderFn>,
}

impl ComponentOptions {
    /// Empty options for a component called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the setup function. A render function it returns takes precedence
    /// over [`ComponentOptions::render`].
    pub fn setup(
        mut self,
        setup: impl Fn(&ComponentContext) -> Result<Option<RenderFn>> + 'static,
    ) -> Self {
        self.setup = Some(Rc::new(setup));
        self
    }

    /// Set the state initializer.
    pub fn data(mut self, data: impl Fn(&ComponentContext) -> Value + 'static) -> Self {
        self.data = Some(Rc::new(data));
        self
    }

    /// Add a computed property.
    pub fn computed(
        mut self,
        name: impl Into<String>,
        getter: impl Fn(&ComponentContext) -> Value + 'static,
    ) -> Self {
        self.computed.insert(name.into(), Rc::new(getter));
        self
    }

    /// Add a method.
    pub fn method(
        mut self,
        name: impl Into<String>,
        method: impl Fn(&ComponentContext, &[Value]) -> Value + 'static,
    ) -> Self {
        self.methods.insert(name.into(), Rc::new(method));
        self
    }

    /// Register a lifecycle hook.
    pub fn hook(mut self, hook: LifecycleHook, f: impl Fn(&ComponentContext) + 'static) -> Self {
        let f: HookFn = Rc::new(f);
        self.hooks.push((hook, f));
        self
    }

    /// Set the render function.
    pub fn render(mut self, render: impl Fn(&ComponentContext) -> VNode + 'static) -> Self {
        self.render = Some(Rc::new(render));
        self
    }

    /// Finish into a [`Component`].
    pub fn build(self) -> Component {
        Component::Options(Rc::new(self))
    }

    /// Component name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A component definition. Clones share the definition and compare equal.
#[derive(Clone)]
pub enum Component {
    /// Defined by a setup function.
    Setup(Rc<SetupComponent>),
    /// Defined by options.
    Options(Rc<ComponentOptions>),
}

impl Component {
    /// Define a component by its setup function.
    ///
    /// ```rust
    /// use trellis_core::component::{render, Component};
    /// use trellis_core::reactive::Ref;
    /// use trellis_core::render::{h, Attrs};
    ///
    /// let counter = Component::from_setup("Counter", |_| {
    ///     let count = Ref::new(0);
    ///     Ok(render(move |_| h("p", Attrs::new(), count.get().to_string())))
    /// });
    /// assert_eq!(counter.name(), "Counter");
    /// ```
    pub fn from_setup(
        name: impl Into<String>,
        setup: impl Fn(&ComponentContext) -> Result<RenderFn> + 'static,
    ) -> Self {
        Self::Setup(Rc::new(SetupComponent {
            name: name.into(),
            setup: Rc::new(setup),
        }))
    }

    /// Define a component by options.
    pub fn from_options(options: ComponentOptions) -> Self {
        options.build()
    }

    /// Component name.
    pub fn name(&self) -> &str {
        match self {
            Self::Setup(setup) => &setup.name,
            Self::Options(options) => &options.name,
        }
    }

    /// The definition as options.
    pub fn normalize(&self) -> Rc<ComponentOptions> {
        match self {
            Self::Options(options) => Rc::clone(options),
            Self::Setup(definition) => {
                let setup = Rc::clone(&definition.setup);
                let normalized: SetupFn = Rc::new(move |ctx: &ComponentContext| setup(ctx).map(Some));
                Rc::new(ComponentOptions {
                    name: definition.name.clone(),
                    setup: Some(normalized),
                    ..ComponentOptions::default()
                })
            }
        }
    }

    /// Whether both handles refer to the same definition.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Setup(a), Self::Setup(b)) => Rc::ptr_eq(a, b),
            (Self::Options(a), Self::Options(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup(_) => write!(f, "Component::Setup({:?})", self.name()),
            Self::Options(_) => write!(f, "Component::Options({:?})", self.name()),
        }
    }
}

impl From<ComponentOptions> for Component {
    fn from(options: ComponentOptions) -> Self {
        options.build()
    }
}

/// How a VNode refers to a component.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentRef {
    /// A definition held directly.
    Definition(Component),
    /// A name resolved through the app's component registry at mount time.
    Named(String),
}

impl ComponentRef {
    /// Name of the referenced component.
    pub fn name(&self) -> &str {
        match self {
            Self::Definition(definition) => definition.name(),
            Self::Named(name) => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::text;

    #[test]
    fn identity_not_name_decides_equality() {
        let a = Component::from_setup("Same", |_| Ok(render(|_| text(""))));
        let b = Component::from_setup("Same", |_| Ok(render(|_| text(""))));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(
            ComponentRef::Named("Same".into()),
            ComponentRef::Named("Same".into())
        );
    }

    #[test]
    fn setup_components_normalize_to_options() {
        let component = Component::from_setup("Leaf", |_| Ok(render(|_| text("leaf"))));
        let options = component.normalize();
        assert_eq!(options.name(), "Leaf");
        assert!(options.setup.is_some());
        assert!(options.render.is_none());
        assert!(options.methods.is_empty());
    }

    #[test]
    fn options_keep_declaration_order() {
        let options = ComponentOptions::new("Form")
            .method("submit", |_, _| Value::Null)
            .method("reset", |_, _| Value::Null)
            .hook(LifecycleHook::Mounted, |_| {})
            .hook(LifecycleHook::Created, |_| {});
        let methods: Vec<_> = options.methods.keys().cloned().collect();
        assert_eq!(methods, vec!["submit", "reset"]);
        assert_eq!(options.hooks[0].0, LifecycleHook::Mounted);
    }
}
