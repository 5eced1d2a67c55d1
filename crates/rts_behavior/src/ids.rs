//! Typed indices.
//!
//! Blueprints are stored in per-category tables inside the
//! [`GameSet`](crate::gameset::GameSet) and referenced by these stable
//! integer indices, resolved by name when the ruleset is compiled.
//! Runtime records keep indices rather than pointers into the ruleset.

use serde::{Deserialize, Serialize};

/// An index into one of the gameset's per-category tables.
pub trait TableIndex: Copy {
    /// Wrap a raw table position.
    fn from_raw(raw: u32) -> Self;
    /// The raw table position.
    fn raw(self) -> u32;
}

macro_rules! define_index {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            /// Create an index from its raw value.
            #[must_use]
            pub const fn new(id: u32) -> Self {
                Self(id)
            }

            /// Position in the owning table.
            #[must_use]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl TableIndex for $name {
            fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            fn raw(self) -> u32 {
                self.0
            }
        }
    };
}

define_index!(
    /// Named numeric property of an object ("item").
    ItemId
);
define_index!(
    /// Named, separately stored numeric expression.
    EquationId
);
define_index!(
    /// Named action sequence.
    SequenceId
);
define_index!(
    /// Animation tag.
    AnimationId
);
define_index!(
    /// Event tag delivered through `send_event`.
    EventId
);
define_index!(
    /// Object blueprint (unit, building, player, ...).
    ObjectBlueprintId
);
define_index!(
    /// Order blueprint.
    OrderBlueprintId
);
define_index!(
    /// Task blueprint.
    TaskBlueprintId
);
define_index!(
    /// Order assignment blueprint.
    OrderAssignmentId
);
define_index!(
    /// Command blueprint.
    CommandId
);
define_index!(
    /// Reaction blueprint.
    ReactionId
);
define_index!(
    /// Package receipt trigger blueprint.
    PackageTriggerId
);

/// Identifier of a simulation object.
///
/// Identifiers are never reused within one world, so a stale id resolves to
/// "gone" instead of aliasing a newer object. Zero is reserved for "none".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// The reserved null identifier.
    pub const NONE: Self = Self(0);

    /// Create an object ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw identifier value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of an order, unique within one object's order configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub u32);

/// Identifier of a task, unique within its order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub u32);
