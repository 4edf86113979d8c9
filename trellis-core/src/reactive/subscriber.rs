//! Identifiers for the reactive system.
//!
//! An [`EffectId`] names a subscriber (an effect, the lazy effect behind a
//! computed value, or a component's render effect). A [`LocationKey`] names a
//! single observable slot: the pair of the owning reactive object and the slot
//! inside it.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    /// Generate a new unique effect ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity of a reactive object (ref, reactive map or computed value).
///
/// Clones of a handle share the same owner ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(u64);

impl OwnerId {
    /// Generate a new unique owner ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

/// A slot inside a reactive owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Slot {
    /// The single value of a ref or computed value.
    Value,
    /// A named entry of a reactive map.
    Key(Rc<str>),
    /// The key set of a reactive map. Invalidated by inserts and removals.
    Iterate,
}

/// An addressable reactive location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocationKey {
    /// The object owning the slot.
    pub owner: OwnerId,
    /// The slot within the owner.
    pub slot: Slot,
}

impl LocationKey {
    /// Location of a single-slot owner.
    pub fn value(owner: OwnerId) -> Self {
        Self {
            owner,
            slot: Slot::Value,
        }
    }

    /// Location of a named entry.
    pub fn key(owner: OwnerId, key: &str) -> Self {
        Self {
            owner,
            slot: Slot::Key(Rc::from(key)),
        }
    }

    /// Location of an owner's key set.
    pub fn iterate(owner: OwnerId) -> Self {
        Self {
            owner,
            slot: Slot::Iterate,
        }
    }
}
