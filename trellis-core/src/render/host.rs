//! The live output surface.
//!
//! The reconciler never touches an output tree directly. Every mutation goes
//! through a [`Host`], which a browser binding, a terminal renderer or the
//! in-memory [`MemoryDocument`](super::MemoryDocument) implements.

use std::fmt::Debug;

use serde_json::Value;

use super::vnode::Listener;

/// Primitive operations on a live output tree.
///
/// Node handles are cheap to clone and compare by identity.
pub trait Host: 'static {
    /// Handle to a live node.
    type Node: Clone + PartialEq + Debug + 'static;

    /// Create a detached element.
    fn create_element(&self, tag: &str) -> Self::Node;

    /// Create a detached text node.
    fn create_text(&self, text: &str) -> Self::Node;

    /// Replace a text node's content.
    fn set_text(&self, node: &Self::Node, text: &str);

    /// Set an attribute.
    fn set_attribute(&self, node: &Self::Node, name: &str, value: &Value);

    /// Remove an attribute.
    fn remove_attribute(&self, node: &Self::Node, name: &str);

    /// Attach an event listener.
    fn add_event_listener(&self, node: &Self::Node, event: &str, listener: &Listener);

    /// Detach an event listener previously attached with the same handle.
    fn remove_event_listener(&self, node: &Self::Node, event: &str, listener: &Listener);

    /// Append `child` as the last child of `parent`.
    fn append_child(&self, parent: &Self::Node, child: &Self::Node);

    /// Remove `child` from `parent`.
    fn remove_child(&self, parent: &Self::Node, child: &Self::Node);

    /// Put `new` in the position `old` occupies under `parent`.
    fn replace_child(&self, parent: &Self::Node, new: &Self::Node, old: &Self::Node);

    /// Find a node by selector, used to resolve mount targets.
    fn query_selector(&self, selector: &str) -> Option<Self::Node>;
}

/// How `value` is written as an attribute, or `None` if the attribute should
/// be absent.
pub fn attribute_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::Bool(true) => Some(String::new()),
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
