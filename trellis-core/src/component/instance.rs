//! Component instances.
//!
//! A [`ComponentInstance`] ties an [`InstanceCore`] to a host: it owns the
//! render effect and the live tree the effect's output was patched into.
//!
//! # Lifecycle
//!
//! ```text
//! Created --mount--> Mounted --update--> Updating --> Mounted
//!                       |                                |
//!                       +-------------unmount------------+--> Unmounted
//! ```
//!
//! The render effect is lazy. Its first run happens during mount; after that
//! every dependency change is routed to the app's [`UpdateScheduler`], which
//! decides when [`ComponentInstance::update`] runs.
//!
//! Each render runs in a fresh [`EffectScope`]. Effects created by one render
//! are stopped before the next one starts, and the last scope is stopped on
//! unmount.
//!
//! [`UpdateScheduler`]: super::UpdateScheduler

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::context::{ComponentContext, InstanceCore, InstanceState};
use super::definition::{Component, RenderFn};
use super::hooks::LifecycleHook;
use super::scheduler::Job;
use crate::app::AppContext;
use crate::error::Result;
use crate::reactive::{untrack, Effect, EffectOptions, EffectScope};
use crate::render::{text, Attrs, Host, Mounted, Reconciler, VNode};

/// A live component bound to a host.
pub struct ComponentInstance<H: Host> {
    core: Rc<InstanceCore>,
    host: Rc<H>,
    render_effect: Effect,
    render_scope: Rc<RefCell<EffectScope>>,
    rendered: Rc<RefCell<Option<VNode>>>,
    tree: RefCell<Option<Mounted<H>>>,
    container: RefCell<Option<H::Node>>,
}

impl<H: Host> ComponentInstance<H> {
    /// Create an instance of `definition` and run its setup. Nothing is
    /// rendered yet.
    pub(crate) fn create(
        host: Rc<H>,
        app: Rc<AppContext>,
        parent: Option<Rc<InstanceCore>>,
        definition: &Component,
        props: &Attrs,
        slots: &[VNode],
    ) -> Result<Rc<Self>> {
        let options = definition.normalize();
        let core = InstanceCore::new(app, parent, options.name(), props, slots);
        let render = core.setup(&options)?;

        Ok(Rc::new_cyclic(|this: &Weak<Self>| {
            let rendered = Rc::new(RefCell::new(None));
            let render_scope = Rc::new(RefCell::new(EffectScope::new()));
            let render_effect =
                Self::build_render_effect(this.clone(), &core, render, &rendered, &render_scope);
            Self {
                core,
                host,
                render_effect,
                render_scope,
                rendered,
                tree: RefCell::new(None),
                container: RefCell::new(None),
            }
        }))
    }

    fn build_render_effect(
        this: Weak<Self>,
        core: &Rc<InstanceCore>,
        render: RenderFn,
        rendered: &Rc<RefCell<Option<VNode>>>,
        render_scope: &Rc<RefCell<EffectScope>>,
    ) -> Effect {
        let core = Rc::downgrade(core);
        let output = Rc::clone(rendered);
        let render_scope = Rc::clone(render_scope);
        Effect::with_options(
            move || {
                if let Some(core) = core.upgrade() {
                    let scope = EffectScope::new();
                    render_scope.replace(scope.clone()).stop();
                    let vnode = scope.run(|| render(&ComponentContext::new(core)));
                    *output.borrow_mut() = vnode;
                }
            },
            EffectOptions::lazy().with_scheduler(move |_| {
                if let Some(instance) = this.upgrade() {
                    let app = Rc::clone(instance.core.app());
                    app.scheduler().queue(instance);
                }
            }),
        )
    }

    /// Render for the first time and build the live tree under `container`,
    /// detached. The caller attaches the root node. The `mounted` hooks are
    /// deferred into `pending`, after those of any children.
    pub(crate) fn mount(&self, container: &H::Node, pending: &mut Vec<Rc<InstanceCore>>) -> Result<()> {
        untrack(|| {
            tracing::debug!(component = %self.core.name(), uid = self.core.uid(), "mounting");
            self.core.call_hooks(LifecycleHook::BeforeMount);

            let vnode = self.render();
            let mut reconciler = self.reconciler();
            let tree = reconciler.materialize(&vnode, container)?;
            *self.tree.borrow_mut() = Some(tree);
            *self.container.borrow_mut() = Some(container.clone());

            pending.extend(reconciler.take_pending());
            pending.push(Rc::clone(&self.core));
            Ok(())
        })
    }

    /// Re-render and patch the live tree. Rejected once unmounted.
    pub fn update(&self) -> Result<()> {
        let previous = self.core.state();
        if previous == InstanceState::Unmounted {
            tracing::debug!(component = %self.core.name(), uid = self.core.uid(), "update after unmount rejected");
            return Ok(());
        }
        let Some(container) = self.container.borrow().clone() else {
            return Ok(());
        };

        untrack(|| {
            tracing::debug!(component = %self.core.name(), uid = self.core.uid(), "updating");
            self.core.set_state(InstanceState::Updating);
            self.core.call_hooks(LifecycleHook::BeforeUpdate);

            let vnode = self.render();
            let mut reconciler = self.reconciler();
            let patched = {
                let mut tree = self.tree.borrow_mut();
                reconciler.patch(&container, &mut tree, &vnode)
            };
            reconciler.flush_mounted();

            let settled = match previous {
                InstanceState::Created => InstanceState::Created,
                _ => InstanceState::Mounted,
            };
            if self.core.state() == InstanceState::Updating {
                self.core.set_state(settled);
            }
            patched?;
            self.core.call_hooks(LifecycleHook::Updated);
            Ok(())
        })
    }

    /// Tear the instance down. With a `container`, the root node is removed
    /// from it. Idempotent.
    pub(crate) fn unmount(&self, container: Option<&H::Node>) {
        if self.core.state() == InstanceState::Unmounted {
            return;
        }
        untrack(|| {
            tracing::debug!(component = %self.core.name(), uid = self.core.uid(), "unmounting");
            self.core.call_hooks(LifecycleHook::BeforeUnmount);
            self.render_effect.stop();
            self.render_scope.borrow().stop();
            self.core.scope().stop();

            let tree = self.tree.borrow_mut().take();
            if let Some(tree) = tree {
                if let (Some(container), Some(node)) = (container, tree.node()) {
                    self.host.remove_child(container, &node);
                }
                self.reconciler().unmount(tree, None);
            }
            self.container.borrow_mut().take();
            self.rendered.borrow_mut().take();

            self.core.set_state(InstanceState::Unmounted);
            self.core.call_hooks(LifecycleHook::Unmounted);
            self.core.clear();
        });
    }

    /// Hand new props and slot children from the parent's render.
    pub(crate) fn update_props(&self, props: &Attrs, slots: &[VNode]) {
        self.core.update_props(props, slots);
    }

    /// The host node at the top of this instance's tree.
    pub fn root_node(&self) -> Option<H::Node> {
        self.tree.try_borrow().ok()?.as_ref()?.node()
    }

    /// The context handed to setup, render and hooks.
    pub fn context(&self) -> ComponentContext {
        ComponentContext::new(Rc::clone(&self.core))
    }

    /// Unique instance id.
    pub fn uid(&self) -> usize {
        self.core.uid()
    }

    /// Component name.
    pub fn name(&self) -> &str {
        self.core.name()
    }

    /// Lifecycle state.
    pub fn state(&self) -> InstanceState {
        self.core.state()
    }

    /// The effect that runs the render function.
    pub fn render_effect(&self) -> &Effect {
        &self.render_effect
    }

    /// Number of times the render function has run.
    pub fn render_count(&self) -> usize {
        self.render_effect.run_count()
    }

    fn render(&self) -> VNode {
        self.render_effect.run();
        self.rendered
            .borrow_mut()
            .take()
            .unwrap_or_else(|| text(""))
    }

    fn reconciler(&self) -> Reconciler<H> {
        Reconciler::for_instance(
            Rc::clone(&self.host),
            Rc::clone(self.core.app()),
            Rc::clone(&self.core),
        )
    }
}

impl<H: Host> Job for ComponentInstance<H> {
    fn id(&self) -> usize {
        self.core.uid()
    }

    fn run(&self) -> Result<()> {
        self.update()
    }
}

impl<H: Host> fmt::Debug for ComponentInstance<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("uid", &self.core.uid())
            .field("name", &self.core.name())
            .field("state", &self.core.state())
            .field("render_count", &self.render_count())
            .finish()
    }
}
