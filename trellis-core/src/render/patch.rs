//! Reconciler
//!
//! The reconciler brings a live tree in line with a freshly rendered VNode
//! tree while touching as few host nodes as possible.
//!
//! # Algorithm
//!
//! For one position:
//!
//! 1. Nothing mounted yet: materialize the new node and append it.
//! 2. Different kind (tag, text vs element, component): materialize the new
//!    subtree detached, swap it in with `replace_child`, then unmount the old
//!    subtree. Its host nodes are already detached, so only component hooks run.
//! 3. Same tag: reconcile attributes over the union of old and new keys, then
//!    children by position. Overlapping children are patched, extra ones
//!    appended, the surplus tail unmounted and removed.
//! 4. Text: rewrite the content when it differs.
//! 5. Same component: hand the new props and slot children to the child
//!    instance. It re-renders only if it read something that changed.
//!
//! There is no keyed matching and no rollback. When a child fails midway, the
//! mutations already applied stay applied and the live tree records them.

use std::rc::Rc;

use super::host::{attribute_text, Host};
use super::vnode::{event_name, AttrValue, Attrs, ComponentNode, Element, VNode};
use crate::app::AppContext;
use crate::component::{Component, ComponentInstance, ComponentRef, InstanceCore};
use crate::error::{warn_usage, Error, Result};

/// A committed VNode paired with the host nodes it produced.
pub enum Mounted<H: Host> {
    /// A live element and its live children.
    Element {
        vnode: Rc<Element>,
        node: H::Node,
        children: Vec<Mounted<H>>,
    },
    /// A live text node.
    Text { text: Rc<str>, node: H::Node },
    /// A mounted component instance. Its host node is the root of its own tree.
    Component {
        vnode: Rc<ComponentNode>,
        instance: Rc<ComponentInstance<H>>,
    },
    /// Empty text standing in for a component that could not be resolved.
    Placeholder {
        vnode: Rc<ComponentNode>,
        node: H::Node,
    },
}

impl<H: Host> Mounted<H> {
    /// The host node at the top of this subtree.
    pub fn node(&self) -> Option<H::Node> {
        match self {
            Self::Element { node, .. } | Self::Text { node, .. } | Self::Placeholder { node, .. } => {
                Some(node.clone())
            }
            Self::Component { instance, .. } => instance.root_node(),
        }
    }

    /// The VNode this subtree was last patched to.
    pub fn vnode(&self) -> VNode {
        match self {
            Self::Element { vnode, .. } => VNode::Element(Rc::clone(vnode)),
            Self::Text { text, .. } => VNode::Text(Rc::clone(text)),
            Self::Component { vnode, .. } | Self::Placeholder { vnode, .. } => {
                VNode::Component(Rc::clone(vnode))
            }
        }
    }

    /// Live children of an element. Empty for every other kind.
    pub fn children(&self) -> &[Mounted<H>] {
        match self {
            Self::Element { children, .. } => children,
            _ => &[],
        }
    }

    /// The component instance, if this is a mounted component.
    pub fn instance(&self) -> Option<&Rc<ComponentInstance<H>>> {
        match self {
            Self::Component { instance, .. } => Some(instance),
            _ => None,
        }
    }
}

/// Applies VNode trees to a [`Host`].
///
/// A reconciler is created per patch. Components created while patching have
/// their `mounted` hooks deferred until [`Reconciler::flush_mounted`], which
/// the caller runs once the patched subtree is attached.
pub struct Reconciler<H: Host> {
    host: Rc<H>,
    app: Rc<AppContext>,
    parent: Option<Rc<InstanceCore>>,
    pending_mounted: Vec<Rc<InstanceCore>>,
}

impl<H: Host> Reconciler<H> {
    /// A reconciler for top-level trees of `app`.
    pub fn new(host: Rc<H>, app: Rc<AppContext>) -> Self {
        Self {
            host,
            app,
            parent: None,
            pending_mounted: Vec::new(),
        }
    }

    /// A reconciler for the tree rendered by `parent`.
    pub(crate) fn for_instance(host: Rc<H>, app: Rc<AppContext>, parent: Rc<InstanceCore>) -> Self {
        Self {
            host,
            app,
            parent: Some(parent),
            pending_mounted: Vec::new(),
        }
    }

    /// The host being patched.
    pub fn host(&self) -> &Rc<H> {
        &self.host
    }

    /// Patch the subtree in `slot`, a child position of `container`, to match
    /// `next`.
    pub fn patch(
        &mut self,
        container: &H::Node,
        slot: &mut Option<Mounted<H>>,
        next: &VNode,
    ) -> Result<()> {
        if let Some(current) = slot.as_mut() {
            return self.patch_one(container, current, next);
        }

        let mounted = self.materialize(next, container)?;
        if let Some(node) = mounted.node() {
            self.host.append_child(container, &node);
        }
        *slot = Some(mounted);
        Ok(())
    }

    /// Run the deferred `mounted` hooks, children before parents.
    pub fn flush_mounted(&mut self) {
        for core in std::mem::take(&mut self.pending_mounted) {
            core.finish_mount();
        }
    }

    /// Tear down a live subtree. When `container` is given, the subtree's
    /// root is also removed from it.
    pub fn unmount(&self, live: Mounted<H>, container: Option<&H::Node>) {
        match live {
            Mounted::Element { node, children, .. } => {
                for child in children {
                    self.unmount(child, None);
                }
                if let Some(container) = container {
                    self.host.remove_child(container, &node);
                }
            }
            Mounted::Text { node, .. } | Mounted::Placeholder { node, .. } => {
                if let Some(container) = container {
                    self.host.remove_child(container, &node);
                }
            }
            Mounted::Component { instance, .. } => instance.unmount(container),
        }
    }

    /// Build the live subtree for `vnode`, detached. `container` is the node
    /// the subtree will be attached under.
    pub(crate) fn materialize(&mut self, vnode: &VNode, container: &H::Node) -> Result<Mounted<H>> {
        match vnode {
            VNode::Text(text) => Ok(Mounted::Text {
                text: Rc::clone(text),
                node: self.host.create_text(text),
            }),
            VNode::Element(element) => {
                let node = self.host.create_element(element.tag());
                self.apply_attrs(&node, element.attrs());

                let mut children = Vec::with_capacity(element.children().len());
                for child in element.children() {
                    let mounted = match self.materialize(child, &node) {
                        Ok(mounted) => mounted,
                        Err(error) => {
                            for built in children {
                                self.unmount(built, None);
                            }
                            return Err(error);
                        }
                    };
                    if let Some(child_node) = mounted.node() {
                        self.host.append_child(&node, &child_node);
                    }
                    children.push(mounted);
                }

                Ok(Mounted::Element {
                    vnode: Rc::clone(element),
                    node,
                    children,
                })
            }
            VNode::Component(reference) => self.materialize_component(reference, container),
        }
    }

    /// Deferred `mounted` hooks, handed over to an enclosing reconciler.
    pub(crate) fn take_pending(&mut self) -> Vec<Rc<InstanceCore>> {
        std::mem::take(&mut self.pending_mounted)
    }

    fn materialize_component(
        &mut self,
        reference: &Rc<ComponentNode>,
        container: &H::Node,
    ) -> Result<Mounted<H>> {
        let Some(definition) = self.resolve(reference.component()) else {
            warn_usage(Error::UnknownComponent(reference.component().name().to_string()));
            return Ok(Mounted::Placeholder {
                vnode: Rc::clone(reference),
                node: self.host.create_text(""),
            });
        };

        let instance = ComponentInstance::create(
            Rc::clone(&self.host),
            Rc::clone(&self.app),
            self.parent.clone(),
            &definition,
            reference.props(),
            reference.children(),
        )?;
        if let Err(error) = instance.mount(container, &mut self.pending_mounted) {
            instance.unmount(None);
            return Err(error);
        }

        Ok(Mounted::Component {
            vnode: Rc::clone(reference),
            instance,
        })
    }

    fn resolve(&self, reference: &ComponentRef) -> Option<Component> {
        match reference {
            ComponentRef::Definition(definition) => Some(definition.clone()),
            ComponentRef::Named(name) => self.app.resolve_component(name),
        }
    }

    fn is_same(&self, current: &Mounted<H>, next: &VNode) -> bool {
        match (current, next) {
            (Mounted::Text { .. }, VNode::Text(_)) => true,
            (Mounted::Element { vnode, .. }, VNode::Element(next)) => vnode.tag() == next.tag(),
            (Mounted::Component { vnode, .. }, VNode::Component(next)) => {
                vnode.component() == next.component()
            }
            // A placeholder is swapped out once its component becomes resolvable.
            (Mounted::Placeholder { vnode, .. }, VNode::Component(next)) => {
                vnode.component() == next.component() && self.resolve(next.component()).is_none()
            }
            _ => false,
        }
    }

    fn patch_one(&mut self, container: &H::Node, current: &mut Mounted<H>, next: &VNode) -> Result<()> {
        if !self.is_same(current, next) {
            return self.replace(container, current, next);
        }

        match (current, next) {
            (Mounted::Text { text, node }, VNode::Text(next_text)) => {
                if text != next_text {
                    self.host.set_text(node, next_text);
                    *text = Rc::clone(next_text);
                }
                Ok(())
            }
            (Mounted::Element { vnode, node, children }, VNode::Element(next_element)) => {
                if Rc::ptr_eq(vnode, next_element) {
                    return Ok(());
                }
                self.patch_attrs(node, vnode.attrs(), next_element.attrs());
                *vnode = Rc::clone(next_element);
                self.patch_children(node, children, next_element.children())
            }
            (Mounted::Component { vnode, instance }, VNode::Component(next_component)) => {
                *vnode = Rc::clone(next_component);
                instance.update_props(next_component.props(), next_component.children());
                Ok(())
            }
            (Mounted::Placeholder { vnode, .. }, VNode::Component(next_component)) => {
                *vnode = Rc::clone(next_component);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn replace(&mut self, container: &H::Node, current: &mut Mounted<H>, next: &VNode) -> Result<()> {
        let fresh = self.materialize(next, container)?;
        match (fresh.node(), current.node()) {
            (Some(new), Some(old)) => self.host.replace_child(container, &new, &old),
            (Some(new), None) => self.host.append_child(container, &new),
            _ => {}
        }
        let old = std::mem::replace(current, fresh);
        self.unmount(old, None);
        Ok(())
    }

    fn patch_children(
        &mut self,
        parent: &H::Node,
        live: &mut Vec<Mounted<H>>,
        next: &[VNode],
    ) -> Result<()> {
        let common = live.len().min(next.len());
        for (current, child) in live.iter_mut().zip(&next[..common]) {
            self.patch_one(parent, current, child)?;
        }

        for child in &next[common..] {
            let mounted = self.materialize(child, parent)?;
            if let Some(node) = mounted.node() {
                self.host.append_child(parent, &node);
            }
            live.push(mounted);
        }

        if live.len() > next.len() {
            for surplus in live.split_off(next.len()) {
                self.unmount(surplus, Some(parent));
            }
        }
        Ok(())
    }

    fn apply_attrs(&self, node: &H::Node, attrs: &Attrs) {
        for (key, value) in attrs.iter() {
            match value {
                AttrValue::Listener(listener) => {
                    if let Some(event) = event_name(key) {
                        self.host.add_event_listener(node, &event, listener);
                    }
                }
                AttrValue::Value(value) => {
                    if attribute_text(value).is_some() {
                        self.host.set_attribute(node, key, value);
                    }
                }
            }
        }
    }

    fn patch_attrs(&self, node: &H::Node, prev: &Attrs, next: &Attrs) {
        for (key, value) in prev.iter() {
            if !next.contains_key(key) {
                self.remove_attr(node, key, value);
            }
        }

        for (key, value) in next.iter() {
            let previous = prev.get(key);
            match value {
                AttrValue::Listener(listener) => {
                    let Some(event) = event_name(key) else {
                        continue;
                    };
                    match previous {
                        Some(AttrValue::Listener(old)) => {
                            self.host.remove_event_listener(node, &event, old);
                        }
                        Some(old @ AttrValue::Value(_)) => self.remove_attr(node, key, old),
                        None => {}
                    }
                    self.host.add_event_listener(node, &event, listener);
                }
                AttrValue::Value(value) => {
                    let old_value = match previous {
                        Some(old @ AttrValue::Listener(_)) => {
                            self.remove_attr(node, key, old);
                            None
                        }
                        Some(AttrValue::Value(old)) => Some(old),
                        None => None,
                    };
                    if old_value == Some(value) {
                        continue;
                    }
                    let was_present = old_value.and_then(attribute_text).is_some();
                    if attribute_text(value).is_some() {
                        self.host.set_attribute(node, key, value);
                    } else if was_present {
                        self.host.remove_attribute(node, key);
                    }
                }
            }
        }
    }

    fn remove_attr(&self, node: &H::Node, key: &str, value: &AttrValue) {
        match value {
            AttrValue::Listener(listener) => {
                if let Some(event) = event_name(key) {
                    self.host.remove_event_listener(node, &event, listener);
                }
            }
            AttrValue::Value(value) => {
                if attribute_text(value).is_some() {
                    self.host.remove_attribute(node, key);
                }
            }
        }
    }
}
