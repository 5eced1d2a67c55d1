//! Replicable state-change notifications.
//!
//! Every mutation a remote observer can see is recorded as a
//! [`Notification`]. Each variant carries absolute values (never deltas), so
//! replaying a notification twice leaves the observer in the same state as
//! replaying it once.

use serde::{Deserialize, Serialize};

use crate::ids::{AnimationId, EventId, ItemId, ObjectBlueprintId, ObjectId, OrderBlueprintId};
use crate::math::{fixed_serde, GameTime, Vec3};
use crate::orders::AssignMode;
use crate::world::ObjectClass;

/// One observable state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    /// An object came into existence.
    ObjectCreated {
        /// New object.
        object: ObjectId,
        /// Blueprint it was created from, if any.
        blueprint: Option<ObjectBlueprintId>,
        /// Object class.
        class: ObjectClass,
        /// Initial parent.
        parent: Option<ObjectId>,
        /// Initial position.
        position: Vec3,
    },
    /// An object was removed from the world.
    ObjectRemoved {
        /// Removed object.
        object: ObjectId,
    },
    /// An item was set to a value.
    ItemSet {
        /// Object whose item changed.
        object: ObjectId,
        /// Item index.
        item: ItemId,
        /// New value.
        value: f32,
    },
    /// An object was reparented.
    ParentSet {
        /// Reparented object.
        object: ObjectId,
        /// New parent.
        parent: Option<ObjectId>,
    },
    /// An object was placed at a position.
    PositionSet {
        /// Moved object.
        object: ObjectId,
        /// New position.
        position: Vec3,
    },
    /// An object's orientation changed.
    OrientationSet {
        /// Rotated object.
        object: ObjectId,
        /// New orientation.
        orientation: Vec3,
    },
    /// An object started playing an animation.
    AnimationSet {
        /// Animated object.
        object: ObjectId,
        /// Animation tag; `None` is the default pose.
        animation: Option<AnimationId>,
        /// Play once instead of looping.
        once: bool,
        /// Simulation time the animation started.
        #[serde(with = "fixed_serde")]
        start_time: GameTime,
    },
    /// An object started moving in a straight line.
    MovementStarted {
        /// Moving object.
        object: ObjectId,
        /// Start point.
        from: Vec3,
        /// Destination actually used.
        destination: Vec3,
        /// Simulation time the movement began.
        #[serde(with = "fixed_serde")]
        start_time: GameTime,
        /// Speed in units per second.
        speed: f32,
    },
    /// An object stopped moving.
    MovementStopped {
        /// Object that stopped.
        object: ObjectId,
        /// Where it stopped.
        position: Vec3,
    },
    /// Terminated/disabled flags changed.
    FlagsSet {
        /// Affected object.
        object: ObjectId,
        /// Terminated flag.
        terminated: bool,
        /// Disabled flag.
        disabled: bool,
    },
    /// An event was delivered to an object.
    EventSent {
        /// Receiver.
        object: ObjectId,
        /// Event tag.
        event: EventId,
        /// Sender, if any.
        sender: Option<ObjectId>,
    },
    /// An order was queued on an object.
    OrderAssigned {
        /// Assignee.
        object: ObjectId,
        /// Order blueprint.
        order: OrderBlueprintId,
        /// Assignment mode used.
        mode: AssignMode,
    },
    /// An object ran out of orders.
    Idle {
        /// Object that went idle.
        object: ObjectId,
    },
}

impl Notification {
    /// The object this notification is about.
    #[must_use]
    pub fn object(&self) -> ObjectId {
        match self {
            Self::ObjectCreated { object, .. }
            | Self::ObjectRemoved { object }
            | Self::ItemSet { object, .. }
            | Self::ParentSet { object, .. }
            | Self::PositionSet { object, .. }
            | Self::OrientationSet { object, .. }
            | Self::AnimationSet { object, .. }
            | Self::MovementStarted { object, .. }
            | Self::MovementStopped { object, .. }
            | Self::FlagsSet { object, .. }
            | Self::EventSent { object, .. }
            | Self::OrderAssigned { object, .. }
            | Self::Idle { object } => *object,
        }
    }

    /// Short tag naming the notification kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ObjectCreated { .. } => "object_created",
            Self::ObjectRemoved { .. } => "object_removed",
            Self::ItemSet { .. } => "item_set",
            Self::ParentSet { .. } => "parent_set",
            Self::PositionSet { .. } => "position_set",
            Self::OrientationSet { .. } => "orientation_set",
            Self::AnimationSet { .. } => "animation_set",
            Self::MovementStarted { .. } => "movement_started",
            Self::MovementStopped { .. } => "movement_stopped",
            Self::FlagsSet { .. } => "flags_set",
            Self::EventSent { .. } => "event_sent",
            Self::OrderAssigned { .. } => "order_assigned",
            Self::Idle { .. } => "idle",
        }
    }
}
