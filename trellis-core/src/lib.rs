//! Trellis Core
//!
//! This crate provides the core runtime for the Trellis reactive UI framework.
//! It implements:
//!
//! - Reactive primitives (refs, reactive maps, computed values, effects)
//! - A virtual node model and an index-based diff/patch reconciler
//! - Component instances with lifecycle hooks and provide/inject
//! - An update scheduler with synchronous and batched flushing
//!
//! The runtime is single-threaded. Live output goes through the [`Host`]
//! trait; [`MemoryDocument`] is an in-memory host for headless use and tests.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Reactive primitives and dependency tracking
//! - `render`: Virtual nodes, the host surface and the reconciler
//! - `component`: Component definitions, instances, hooks and scheduling
//! - `app`: Application bootstrap, plugins and the component registry
//! - `config` / `error`: Runtime configuration and the error taxonomy
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use trellis_core::prelude::*;
//!
//! let doc = Rc::new(MemoryDocument::new());
//! let root = doc.create_root("div", "app");
//!
//! let counter = Component::from_setup("Counter", |_| {
//!     let count = Ref::new(0);
//!     let doubled = {
//!         let count = count.clone();
//!         Computed::new(move || count.get() * 2)
//!     };
//!     Ok(render(move |_| {
//!         let count = count.clone();
//!         h(
//!             "button",
//!             Attrs::new().on("click", move |_| count.update(|n| *n += 1)),
//!             format!("doubled: {}", doubled.get()),
//!         )
//!     }))
//! });
//!
//! let app = create_app(Rc::clone(&doc), counter);
//! app.mount("#app").unwrap();
//!
//! let button = doc.children(root)[0];
//! doc.dispatch(button, "click", serde_json::Value::Null);
//! assert_eq!(doc.inner_html(root), "<button>doubled: 2</button>");
//! ```

pub mod app;
pub mod component;
pub mod config;
pub mod error;
pub mod reactive;
pub mod render;

pub use app::{create_app, App, AppContext, MountTarget, Plugin};
pub use config::{FlushMode, RuntimeConfig};
pub use error::{Error, Result};
pub use render::{Host, MemoryDocument};

/// The names most applications need.
pub mod prelude {
    pub use crate::app::{create_app, App, AppContext, MountTarget, Plugin};
    pub use crate::component::{
        current_instance, inject, on_before_mount, on_before_unmount, on_before_update,
        on_mounted, on_unmounted, on_updated, provide, render, Component, ComponentContext,
        ComponentOptions, LifecycleHook,
    };
    pub use crate::config::{FlushMode, RuntimeConfig};
    pub use crate::error::{Error, Result};
    pub use crate::reactive::{
        computed, effect, stop, untrack, watch, Computed, Effect, EffectScope, Reactive, Ref,
        WatchOptions,
    };
    pub use crate::render::{
        component, component_named, h, text, AttrValue, Attrs, Event, Host, MemoryDocument,
        VNode,
    };
}
