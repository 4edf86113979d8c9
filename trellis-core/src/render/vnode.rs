//! Virtual nodes.
//!
//! A [`VNode`] describes one node of intended output. Trees are immutable once
//! built: every render produces a fresh tree that the reconciler compares with
//! the previous one. Nodes share their payload through `Rc`, so cloning a tree
//! is cheap.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::component::{Component, ComponentRef};

/// An event delivered to a listener.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event name without the `on` prefix, e.g. `click`.
    pub name: String,
    /// Event payload.
    pub payload: Value,
}

impl Event {
    /// Create an event.
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// An event handler. Listeners compare by identity.
#[derive(Clone)]
pub struct Listener(Rc<dyn Fn(&Event)>);

impl Listener {
    /// Wrap a closure.
    pub fn new(f: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Invoke the handler.
    pub fn call(&self, event: &Event) {
        (self.0)(event);
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", Rc::as_ptr(&self.0))
    }
}

/// Value of an attribute or prop.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Plain data.
    Value(Value),
    /// An event handler, bound under an `on`-prefixed key.
    Listener(Listener),
}

impl AttrValue {
    /// The data value, if this is not a listener.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Listener(_) => None,
        }
    }

    /// The listener, if this is one.
    pub fn as_listener(&self) -> Option<&Listener> {
        match self {
            Self::Listener(listener) => Some(listener),
            Self::Value(_) => None,
        }
    }
}

macro_rules! attr_value_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for AttrValue {
                fn from(value: $ty) -> Self {
                    Self::Value(Value::from(value))
                }
            }
        )*
    };
}

attr_value_from!(Value, &str, String, bool, i32, i64, u32, u64, usize, f64);

impl From<Listener> for AttrValue {
    fn from(listener: Listener) -> Self {
        Self::Listener(listener)
    }
}

/// The event name for an event-style key: `onClick` -> `click`.
///
/// Returns `None` for keys that are not event-style.
pub fn event_name(key: &str) -> Option<String> {
    let rest = key.strip_prefix("on")?;
    let mut chars = rest.chars();
    let first = chars.next()?;
    if first.is_ascii_lowercase() {
        return None;
    }
    Some(first.to_ascii_lowercase().to_string() + chars.as_str())
}

/// The event-style key for an event name: `click` -> `onClick`.
pub fn event_key(event: &str) -> String {
    let mut chars = event.chars();
    match chars.next() {
        Some(first) => format!("on{}{}", first.to_ascii_uppercase(), chars.as_str()),
        None => "on".to_string(),
    }
}

/// Insertion-ordered attribute map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attrs(IndexMap<String, AttrValue>);

impl Attrs {
    /// Empty attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a data attribute.
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), AttrValue::Value(value.into()));
        self
    }

    /// Add an event listener for `event` under its `on`-prefixed key.
    pub fn on(mut self, event: &str, handler: impl Fn(&Event) + 'static) -> Self {
        self.0
            .insert(event_key(event), AttrValue::Listener(Listener::new(handler)));
        self
    }

    /// Insert an entry.
    pub fn insert(&mut self, key: impl Into<String>, value: AttrValue) {
        self.0.insert(key.into(), value);
    }

    /// Look up an entry.
    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.0.get(key)
    }

    /// Whether the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.0.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<AttrValue>> FromIterator<(K, V)> for Attrs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<AttrValue>, const N: usize> From<[(K, V); N]> for Attrs {
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

/// A primitive output element.
#[derive(Debug, PartialEq)]
pub struct Element {
    tag: String,
    attrs: Attrs,
    children: Vec<VNode>,
}

impl Element {
    /// Tag name.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Attributes.
    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    /// Children.
    pub fn children(&self) -> &[VNode] {
        &self.children
    }
}

/// A reference to a component with its props and slot children.
#[derive(Debug, PartialEq)]
pub struct ComponentNode {
    component: ComponentRef,
    props: Attrs,
    children: Vec<VNode>,
}

impl ComponentNode {
    /// The referenced component.
    pub fn component(&self) -> &ComponentRef {
        &self.component
    }

    /// Props passed to the component.
    pub fn props(&self) -> &Attrs {
        &self.props
    }

    /// Slot children passed to the component.
    pub fn children(&self) -> &[VNode] {
        &self.children
    }
}

/// One node of a render tree.
#[derive(Debug, Clone)]
pub enum VNode {
    /// A primitive element.
    Element(Rc<Element>),
    /// A text leaf.
    Text(Rc<str>),
    /// A component reference.
    Component(Rc<ComponentNode>),
}

impl VNode {
    /// Whether `self` and `other` can be patched into each other.
    ///
    /// Elements match on tag, components on the referenced component, and
    /// text matches text.
    pub fn same_kind(&self, other: &VNode) -> bool {
        match (self, other) {
            (Self::Element(a), Self::Element(b)) => a.tag == b.tag,
            (Self::Text(_), Self::Text(_)) => true,
            (Self::Component(a), Self::Component(b)) => a.component == b.component,
            _ => false,
        }
    }

    /// The element payload, if this is an element.
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(element) => Some(element),
            _ => None,
        }
    }

    /// The text, if this is a text leaf.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl PartialEq for VNode {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Element(a), Self::Element(b)) => Rc::ptr_eq(a, b) || a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Component(a), Self::Component(b)) => Rc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

impl From<&str> for VNode {
    fn from(text: &str) -> Self {
        Self::Text(Rc::from(text))
    }
}

impl From<String> for VNode {
    fn from(text: String) -> Self {
        Self::Text(Rc::from(text))
    }
}

/// A flat, ordered child list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Children(Vec<VNode>);

impl Children {
    /// No children.
    pub fn none() -> Self {
        Self::default()
    }

    /// Unwrap into the flat vector.
    pub fn into_vec(self) -> Vec<VNode> {
        self.0
    }
}

impl From<VNode> for Children {
    fn from(node: VNode) -> Self {
        Self(vec![node])
    }
}

impl From<&str> for Children {
    fn from(text: &str) -> Self {
        Self(vec![VNode::from(text)])
    }
}

impl From<String> for Children {
    fn from(text: String) -> Self {
        Self(vec![VNode::from(text)])
    }
}

impl From<()> for Children {
    fn from(_: ()) -> Self {
        Self::none()
    }
}

impl<T: Into<Children>> From<Option<T>> for Children {
    fn from(child: Option<T>) -> Self {
        child.map(Into::into).unwrap_or_default()
    }
}

impl<T: Into<Children>> From<Vec<T>> for Children {
    fn from(children: Vec<T>) -> Self {
        children.into_iter().collect()
    }
}

impl<T: Into<Children>, const N: usize> From<[T; N]> for Children {
    fn from(children: [T; N]) -> Self {
        children.into_iter().collect()
    }
}

impl<T: Into<Children>> FromIterator<T> for Children {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().flat_map(|child| child.into().0).collect())
    }
}

/// Build an element node.
///
/// ```rust
/// use trellis_core::render::{h, Attrs};
///
/// let node = h("ul", Attrs::new().attr("class", "list"), ["a", "b"].map(|t| h("li", Attrs::new(), t)));
/// assert_eq!(node.as_element().map(|e| e.children().len()), Some(2));
/// ```
pub fn h(tag: impl Into<String>, attrs: impl Into<Attrs>, children: impl Into<Children>) -> VNode {
    VNode::Element(Rc::new(Element {
        tag: tag.into(),
        attrs: attrs.into(),
        children: children.into().0,
    }))
}

/// Build a text leaf.
pub fn text(value: impl Into<String>) -> VNode {
    VNode::Text(Rc::from(value.into()))
}

/// Build a reference to a component definition.
pub fn component(
    definition: &Component,
    props: impl Into<Attrs>,
    children: impl Into<Children>,
) -> VNode {
    VNode::Component(Rc::new(ComponentNode {
        component: ComponentRef::Definition(definition.clone()),
        props: props.into(),
        children: children.into().0,
    }))
}

/// Build a reference to a component registered on the app under `name`.
pub fn component_named(
    name: impl Into<String>,
    props: impl Into<Attrs>,
    children: impl Into<Children>,
) -> VNode {
    VNode::Component(Rc::new(ComponentNode {
        component: ComponentRef::Named(name.into()),
        props: props.into(),
        children: children.into().0,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_child_is_wrapped() {
        let node = h("p", Attrs::new(), "hello");
        let element = node.as_element().unwrap();
        assert_eq!(element.children().len(), 1);
        assert_eq!(element.children()[0].as_text(), Some("hello"));
    }

    #[test]
    fn nested_children_are_flattened() {
        let groups = vec![vec![text("a"), text("b")], vec![], vec![text("c")]];
        let node = h("div", Attrs::new(), groups);
        let texts: Vec<_> = node
            .as_element()
            .unwrap()
            .children()
            .iter()
            .filter_map(VNode::as_text)
            .collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn optional_child_may_be_absent() {
        let node = h("div", Attrs::new(), None::<VNode>);
        assert!(node.as_element().unwrap().children().is_empty());
    }

    #[test]
    fn kind_compares_tags_not_attrs() {
        let a = h("div", Attrs::new().attr("class", "a"), ());
        let b = h("div", Attrs::new().attr("class", "b"), ());
        assert!(a.same_kind(&b));
        assert_ne!(a, b);
        assert!(!a.same_kind(&h("span", Attrs::new(), ())));
        assert!(!a.same_kind(&text("div")));
    }

    #[test]
    fn event_keys_round_trip() {
        assert_eq!(event_key("click"), "onClick");
        assert_eq!(event_name("onClick").as_deref(), Some("click"));
        assert_eq!(event_name("once"), None);
        assert_eq!(event_name("on"), None);
    }

    #[test]
    fn attrs_keep_insertion_order() {
        let attrs: Attrs = [("id", json!("x")), ("class", json!("y"))].into();
        let keys: Vec<_> = attrs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["id", "class"]);
        assert_eq!(attrs.get("id").and_then(AttrValue::as_value), Some(&json!("x")));
    }
}
