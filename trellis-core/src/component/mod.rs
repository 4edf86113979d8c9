//! Components
//!
//! A component turns props and state into a VNode tree. This module holds the
//! definition types, the per-instance state and lifecycle, the composition
//! helpers available during setup, and the scheduler that decides when an
//! instance re-renders.
//!
//! # Lifecycle
//!
//! 1. **created**: props and slots are captured, setup runs with the instance
//!    as current, methods, state and computed properties are bound, then the
//!    `created` hooks fire.
//! 2. **mount**: `beforeMount` hooks, first render, live tree built and
//!    attached, then `mounted` hooks (children before parents).
//! 3. **update**: a dependency of the render changed. `beforeUpdate`, render,
//!    patch, `updated`.
//! 4. **unmount**: `beforeUnmount`, every effect of the instance stopped,
//!    children unmounted, root detached, `unmounted`.

mod context;
mod definition;
mod hooks;
mod instance;
mod scheduler;

pub(crate) use context::InstanceCore;
pub use context::{ComponentContext, InstanceState};
pub use definition::{
    render, Component, ComponentOptions, ComponentRef, ComputedFn, DataFn, HookFn, MethodFn,
    RenderFn, SetupComponent, SetupFn,
};
pub use hooks::{
    current_instance, inject, on_before_mount, on_before_unmount, on_before_update, on_mounted,
    on_unmounted, on_updated, provide, LifecycleHook,
};
pub use instance::ComponentInstance;
pub use scheduler::{Job, UpdateScheduler};
