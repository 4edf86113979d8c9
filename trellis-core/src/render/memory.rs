//! In-memory document.
//!
//! [`MemoryDocument`] is an arena-backed [`Host`] for headless rendering and
//! tests. Every mutation is appended to an operation log so callers can check
//! exactly what a patch did to the live tree.

use std::cell::RefCell;
use std::fmt::Write as _;

use indexmap::IndexMap;
use serde_json::Value;

use super::host::{attribute_text, Host};
use super::vnode::{Event, Listener};

/// Handle to a node in a [`MemoryDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Arena index of the node.
    pub fn index(self) -> usize {
        self.0
    }
}

/// One recorded host mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum HostOp {
    CreateElement { node: NodeId, tag: String },
    CreateText { node: NodeId, text: String },
    SetText { node: NodeId, text: String },
    SetAttribute { node: NodeId, name: String, value: Value },
    RemoveAttribute { node: NodeId, name: String },
    AddListener { node: NodeId, event: String },
    RemoveListener { node: NodeId, event: String },
    AppendChild { parent: NodeId, child: NodeId },
    RemoveChild { parent: NodeId, child: NodeId },
    ReplaceChild { parent: NodeId, new: NodeId, old: NodeId },
}

impl HostOp {
    /// Whether the operation created a node.
    pub fn is_create(&self) -> bool {
        matches!(self, Self::CreateElement { .. } | Self::CreateText { .. })
    }

    /// Whether the operation changed an attribute.
    pub fn is_attribute(&self) -> bool {
        matches!(self, Self::SetAttribute { .. } | Self::RemoveAttribute { .. })
    }
}

#[derive(Debug)]
enum NodeKind {
    Element {
        tag: String,
        attrs: IndexMap<String, String>,
        listeners: IndexMap<String, Vec<Listener>>,
    },
    Text(String),
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Default)]
struct Arena {
    nodes: Vec<NodeData>,
    roots: Vec<NodeId>,
}

impl Arena {
    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|child| *child != node);
        }
    }

    fn matches(&self, node: NodeId, selector: &str) -> bool {
        let NodeKind::Element { tag, attrs, .. } = &self.nodes[node.0].kind else {
            return false;
        };
        match selector.strip_prefix('#') {
            Some(id) => attrs.get("id").map(String::as_str) == Some(id),
            None => tag == selector,
        }
    }

    fn find(&self, node: NodeId, selector: &str) -> Option<NodeId> {
        if self.matches(node, selector) {
            return Some(node);
        }
        self.nodes[node.0]
            .children
            .iter()
            .find_map(|child| self.find(*child, selector))
    }
}

/// An arena-backed output tree.
///
/// # Example
///
/// ```rust
/// use trellis_core::render::{Host, MemoryDocument};
///
/// let doc = MemoryDocument::new();
/// let root = doc.create_root("div", "app");
/// let p = doc.create_element("p");
/// let hello = doc.create_text("hello");
/// doc.append_child(&p, &hello);
/// doc.append_child(&root, &p);
///
/// assert_eq!(doc.query_selector("#app"), Some(root));
/// assert_eq!(doc.to_html(root), r#"<div id="app"><p>hello</p></div>"#);
/// ```
#[derive(Debug, Default)]
pub struct MemoryDocument {
    arena: RefCell<Arena>,
    ops: RefCell<Vec<HostOp>>,
}

impl MemoryDocument {
    /// An empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document-level element with the given `id` attribute.
    ///
    /// Roots are what [`Host::query_selector`] searches. Creating a root is
    /// not recorded in the operation log.
    pub fn create_root(&self, tag: &str, id: &str) -> NodeId {
        let mut arena = self.arena.borrow_mut();
        let mut attrs = IndexMap::new();
        attrs.insert("id".to_string(), id.to_string());
        let node = arena.push(NodeKind::Element {
            tag: tag.to_string(),
            attrs,
            listeners: IndexMap::new(),
        });
        arena.roots.push(node);
        node
    }

    /// Recorded operations, oldest first.
    pub fn ops(&self) -> Vec<HostOp> {
        self.ops.borrow().clone()
    }

    /// Drain the operation log.
    pub fn take_ops(&self) -> Vec<HostOp> {
        std::mem::take(&mut *self.ops.borrow_mut())
    }

    /// Number of nodes ever created.
    pub fn node_count(&self) -> usize {
        self.arena.borrow().nodes.len()
    }

    /// Tag name of an element.
    pub fn tag(&self, node: NodeId) -> Option<String> {
        match &self.arena.borrow().nodes[node.0].kind {
            NodeKind::Element { tag, .. } => Some(tag.clone()),
            NodeKind::Text(_) => None,
        }
    }

    /// Content of a text node.
    pub fn text(&self, node: NodeId) -> Option<String> {
        match &self.arena.borrow().nodes[node.0].kind {
            NodeKind::Text(text) => Some(text.clone()),
            NodeKind::Element { .. } => None,
        }
    }

    /// Current value of an attribute.
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        match &self.arena.borrow().nodes[node.0].kind {
            NodeKind::Element { attrs, .. } => attrs.get(name).cloned(),
            NodeKind::Text(_) => None,
        }
    }

    /// Children of a node in order.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.arena.borrow().nodes[node.0].children.clone()
    }

    /// Parent of a node, if attached.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.arena.borrow().nodes[node.0].parent
    }

    /// Number of listeners bound for `event`.
    pub fn listener_count(&self, node: NodeId, event: &str) -> usize {
        match &self.arena.borrow().nodes[node.0].kind {
            NodeKind::Element { listeners, .. } => listeners.get(event).map_or(0, Vec::len),
            NodeKind::Text(_) => 0,
        }
    }

    /// Deliver an event to the node's listeners. Returns how many ran.
    pub fn dispatch(&self, node: NodeId, event: &str, payload: Value) -> usize {
        let listeners = match &self.arena.borrow().nodes[node.0].kind {
            NodeKind::Element { listeners, .. } => listeners.get(event).cloned().unwrap_or_default(),
            NodeKind::Text(_) => Vec::new(),
        };
        let event = Event::new(event, payload);
        for listener in &listeners {
            listener.call(&event);
        }
        listeners.len()
    }

    /// Serialize a subtree as HTML.
    pub fn to_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(&self.arena.borrow(), node, &mut out);
        out
    }

    /// Serialize the children of a node, without the node itself.
    pub fn inner_html(&self, node: NodeId) -> String {
        let arena = self.arena.borrow();
        let mut out = String::new();
        for child in &arena.nodes[node.0].children {
            self.write_html(&arena, *child, &mut out);
        }
        out
    }

    fn write_html(&self, arena: &Arena, node: NodeId, out: &mut String) {
        let data = &arena.nodes[node.0];
        match &data.kind {
            NodeKind::Text(text) => out.push_str(&escape(text)),
            NodeKind::Element { tag, attrs, .. } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    if value.is_empty() {
                        let _ = write!(out, " {name}");
                    } else {
                        let _ = write!(out, " {name}=\"{}\"", escape(value));
                    }
                }
                out.push('>');
                for child in &data.children {
                    self.write_html(arena, *child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    fn record(&self, op: HostOp) {
        tracing::trace!(?op, "host mutation");
        self.ops.borrow_mut().push(op);
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl Host for MemoryDocument {
    type Node = NodeId;

    fn create_element(&self, tag: &str) -> NodeId {
        let node = self.arena.borrow_mut().push(NodeKind::Element {
            tag: tag.to_string(),
            attrs: IndexMap::new(),
            listeners: IndexMap::new(),
        });
        self.record(HostOp::CreateElement {
            node,
            tag: tag.to_string(),
        });
        node
    }

    fn create_text(&self, text: &str) -> NodeId {
        let node = self
            .arena
            .borrow_mut()
            .push(NodeKind::Text(text.to_string()));
        self.record(HostOp::CreateText {
            node,
            text: text.to_string(),
        });
        node
    }

    fn set_text(&self, node: &NodeId, text: &str) {
        if let NodeKind::Text(content) = &mut self.arena.borrow_mut().nodes[node.0].kind {
            *content = text.to_string();
        }
        self.record(HostOp::SetText {
            node: *node,
            text: text.to_string(),
        });
    }

    fn set_attribute(&self, node: &NodeId, name: &str, value: &Value) {
        if let NodeKind::Element { attrs, .. } = &mut self.arena.borrow_mut().nodes[node.0].kind {
            match attribute_text(value) {
                Some(text) => {
                    attrs.insert(name.to_string(), text);
                }
                None => {
                    attrs.shift_remove(name);
                }
            }
        }
        self.record(HostOp::SetAttribute {
            node: *node,
            name: name.to_string(),
            value: value.clone(),
        });
    }

    fn remove_attribute(&self, node: &NodeId, name: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.arena.borrow_mut().nodes[node.0].kind {
            attrs.shift_remove(name);
        }
        self.record(HostOp::RemoveAttribute {
            node: *node,
            name: name.to_string(),
        });
    }

    fn add_event_listener(&self, node: &NodeId, event: &str, listener: &Listener) {
        if let NodeKind::Element { listeners, .. } = &mut self.arena.borrow_mut().nodes[node.0].kind
        {
            listeners
                .entry(event.to_string())
                .or_default()
                .push(listener.clone());
        }
        self.record(HostOp::AddListener {
            node: *node,
            event: event.to_string(),
        });
    }

    fn remove_event_listener(&self, node: &NodeId, event: &str, listener: &Listener) {
        if let NodeKind::Element { listeners, .. } = &mut self.arena.borrow_mut().nodes[node.0].kind
        {
            if let Some(bound) = listeners.get_mut(event) {
                if let Some(index) = bound.iter().position(|l| l == listener) {
                    bound.remove(index);
                }
                if bound.is_empty() {
                    listeners.shift_remove(event);
                }
            }
        }
        self.record(HostOp::RemoveListener {
            node: *node,
            event: event.to_string(),
        });
    }

    fn append_child(&self, parent: &NodeId, child: &NodeId) {
        {
            let mut arena = self.arena.borrow_mut();
            arena.detach(*child);
            arena.nodes[parent.0].children.push(*child);
            arena.nodes[child.0].parent = Some(*parent);
        }
        self.record(HostOp::AppendChild {
            parent: *parent,
            child: *child,
        });
    }

    fn remove_child(&self, parent: &NodeId, child: &NodeId) {
        {
            let mut arena = self.arena.borrow_mut();
            if arena.nodes[child.0].parent == Some(*parent) {
                arena.detach(*child);
            }
        }
        self.record(HostOp::RemoveChild {
            parent: *parent,
            child: *child,
        });
    }

    fn replace_child(&self, parent: &NodeId, new: &NodeId, old: &NodeId) {
        {
            let mut arena = self.arena.borrow_mut();
            arena.detach(*new);
            let position = arena.nodes[parent.0]
                .children
                .iter()
                .position(|child| child == old);
            match position {
                Some(index) => {
                    arena.nodes[parent.0].children[index] = *new;
                    arena.nodes[old.0].parent = None;
                }
                None => arena.nodes[parent.0].children.push(*new),
            }
            arena.nodes[new.0].parent = Some(*parent);
        }
        self.record(HostOp::ReplaceChild {
            parent: *parent,
            new: *new,
            old: *old,
        });
    }

    fn query_selector(&self, selector: &str) -> Option<NodeId> {
        let arena = self.arena.borrow();
        arena
            .roots
            .iter()
            .find_map(|root| arena.find(*root, selector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn selectors_find_ids_and_tags() {
        let doc = MemoryDocument::new();
        let root = doc.create_root("main", "app");
        let span = doc.create_element("span");
        doc.append_child(&root, &span);

        assert_eq!(doc.query_selector("#app"), Some(root));
        assert_eq!(doc.query_selector("span"), Some(span));
        assert_eq!(doc.query_selector("#missing"), None);
    }

    #[test]
    fn detached_nodes_are_not_queryable() {
        let doc = MemoryDocument::new();
        doc.create_root("div", "app");
        doc.create_element("aside");
        assert_eq!(doc.query_selector("aside"), None);
    }

    #[test]
    fn replace_keeps_position() {
        let doc = MemoryDocument::new();
        let root = doc.create_root("div", "app");
        let a = doc.create_text("a");
        let b = doc.create_text("b");
        let c = doc.create_text("c");
        doc.append_child(&root, &a);
        doc.append_child(&root, &b);
        doc.replace_child(&root, &c, &a);

        assert_eq!(doc.children(root), vec![c, b]);
        assert_eq!(doc.parent(a), None);
        assert_eq!(doc.inner_html(root), "cb");
    }

    #[test]
    fn false_and_null_attributes_are_absent() {
        let doc = MemoryDocument::new();
        let input = doc.create_element("input");
        doc.set_attribute(&input, "disabled", &json!(true));
        assert_eq!(doc.to_html(input), "<input disabled></input>");
        doc.set_attribute(&input, "disabled", &json!(false));
        assert_eq!(doc.attribute(input, "disabled"), None);
    }

    #[test]
    fn dispatch_reaches_bound_listeners_only() {
        let doc = MemoryDocument::new();
        let button = doc.create_element("button");
        let clicks = Rc::new(Cell::new(0));
        let c = Rc::clone(&clicks);
        let listener = Listener::new(move |_| c.set(c.get() + 1));

        doc.add_event_listener(&button, "click", &listener);
        assert_eq!(doc.dispatch(button, "click", Value::Null), 1);
        doc.remove_event_listener(&button, "click", &listener);
        assert_eq!(doc.dispatch(button, "click", Value::Null), 0);
        assert_eq!(clicks.get(), 1);
        assert_eq!(doc.listener_count(button, "click"), 0);
    }

    #[test]
    fn operations_are_logged_in_order() {
        let doc = MemoryDocument::new();
        let root = doc.create_root("div", "app");
        let p = doc.create_element("p");
        doc.append_child(&root, &p);

        assert_eq!(
            doc.take_ops(),
            vec![
                HostOp::CreateElement {
                    node: p,
                    tag: "p".into()
                },
                HostOp::AppendChild {
                    parent: root,
                    child: p
                },
            ]
        );
        assert!(doc.ops().is_empty());
    }
}
