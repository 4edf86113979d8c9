//! Rendering
//!
//! This module turns component output into live nodes:
//!
//! - [`vnode`](VNode): the immutable render-tree model and its builders
//! - [`Host`]: the primitive operations every live output surface provides
//! - [`Reconciler`]: the diff/patch engine applying VNode trees to a host
//! - [`MemoryDocument`]: an in-memory host for headless use and tests

mod host;
mod memory;
mod patch;
mod vnode;

pub use host::{attribute_text, Host};
pub use memory::{HostOp, MemoryDocument, NodeId};
pub use patch::{Mounted, Reconciler};
pub use vnode::{
    component, component_named, event_key, event_name, h, text, AttrValue, Attrs, Children,
    ComponentNode, Element, Event, Listener, VNode,
};
