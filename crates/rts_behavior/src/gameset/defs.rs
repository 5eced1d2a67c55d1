//! Serializable ruleset definitions.
//!
//! A [`GameSetDef`] is what a ruleset file deserializes into. Expression
//! bodies stay as raw [`Arg`] trees until the loader compiles them, so a
//! definition can be authored, diffed and round-tripped without knowing
//! any node kinds.
//!
//! ```ron
//! (
//!     items: ["Health"],
//!     objects: [(name: "Peasant", class: Character, speed: 4.0)],
//! )
//! ```

use serde::{Deserialize, Serialize};

use crate::orders::AssignMode;
use crate::script::Arg;
use crate::world::ObjectClass;

/// A whole ruleset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSetDef {
    /// Item names.
    pub items: Vec<String>,
    /// Named constants, folded into expressions at load time.
    pub defined_values: Vec<(String, f32)>,
    /// Animation tags.
    pub animations: Vec<String>,
    /// Event tags. `ON_IDLE` always exists.
    pub events: Vec<String>,
    /// Named numeric expressions.
    pub equations: Vec<EquationDef>,
    /// Named action sequences.
    pub sequences: Vec<SequenceDef>,
    /// Object blueprints.
    pub objects: Vec<ObjectDef>,
    /// Order blueprints.
    pub orders: Vec<OrderDef>,
    /// Task blueprints.
    pub tasks: Vec<TaskDef>,
    /// Order assignment recipes.
    pub order_assignments: Vec<OrderAssignmentDef>,
    /// Player commands.
    pub commands: Vec<CommandDef>,
    /// Event reactions.
    pub reactions: Vec<ReactionDef>,
    /// Conditional event filters.
    pub package_triggers: Vec<PackageTriggerDef>,
}

/// A named numeric expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquationDef {
    /// Equation name.
    pub name: String,
    /// Expression.
    pub body: Arg,
}

/// A named action sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceDef {
    /// Sequence name.
    pub name: String,
    /// Action nodes.
    pub actions: Vec<Arg>,
}

/// An attachment point on a model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentPointDef {
    /// Tag.
    pub tag: String,
    /// Offset in model space.
    pub offset: (f32, f32, f32),
    /// `(start, end)` seconds within the cycle when the point is on.
    pub on: Vec<(f32, f32)>,
}

/// Timing data for one animation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDef {
    /// Cycle length in seconds.
    pub duration: f32,
    /// Attachment points.
    pub attachment_points: Vec<AttachmentPointDef>,
}

/// An object blueprint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectDef {
    /// Blueprint name.
    pub name: String,
    /// Object class.
    pub class: ObjectClass,
    /// Initial item values by item name.
    pub start_items: Vec<(String, f32)>,
    /// Movement speed.
    pub speed: f32,
    /// Tile footprint.
    pub footprint: Option<(u32, u32)>,
    /// Model used when no animation-specific one exists.
    pub default_model: Option<ModelDef>,
    /// Models by animation tag.
    pub models: Vec<(String, ModelDef)>,
    /// Reactions by name.
    pub reactions: Vec<String>,
}

/// An order blueprint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderDef {
    /// Order name.
    pub name: String,
    /// Category.
    pub class_name: String,
    /// Task names, in order.
    pub tasks: Vec<String>,
    /// Restart after the last task.
    pub cycle: bool,
    /// Refuse do-first and forget-everything-else while active.
    pub uninterruptible: bool,
    /// Run on start.
    pub start_sequence: Vec<Arg>,
    /// Run on termination.
    pub termination_sequence: Vec<Arg>,
    /// Run on cancellation.
    pub cancellation_sequence: Vec<Arg>,
}

/// Kind-specific task parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum TaskKindDef {
    /// Follow a target.
    #[default]
    ObjectReference,
    /// Walk to a point.
    Move {
        /// Destination position node.
        #[serde(default)]
        destination: Option<Arg>,
    },
    /// Ballistic projectile.
    Missile {
        /// Launch speed.
        #[serde(default)]
        speed: Option<Arg>,
    },
    /// Turn to the target.
    FaceTowards,
    /// Create an object when a condition holds.
    Spawn {
        /// Blueprint name.
        blueprint: String,
        /// Completion condition.
        condition: Arg,
        /// Spawn position node.
        #[serde(default)]
        position: Option<Arg>,
        /// Actions run as the created object.
        #[serde(default)]
        post_creation_sequence: Vec<Arg>,
    },
}

/// Trigger firing condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TriggerKindDef {
    /// Fixed period.
    Timer {
        /// Period expression.
        period: Arg,
    },
    /// Once per animation cycle.
    AnimationLoop,
    /// Attachment point switching on.
    AttachmentPoint {
        /// Attachment tag.
        tag: String,
    },
    /// Missile hit an object.
    Collision,
    /// Missile hit the ground.
    StruckFloor,
}

/// A trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerDef {
    /// Firing condition.
    pub kind: TriggerKindDef,
    /// Actions run on firing.
    #[serde(default)]
    pub actions: Vec<Arg>,
}

/// A task blueprint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskDef {
    /// Task name.
    pub name: String,
    /// Category.
    pub class_name: String,
    /// Kind.
    pub kind: TaskKindDef,
    /// Target finder.
    pub target: Option<Arg>,
    /// Take over the previous task's target.
    pub use_previous_target: bool,
    /// Re-run the finder every update.
    pub identify_target_each_cycle: bool,
    /// Treat terminated targets as missing.
    pub reject_terminated_target: bool,
    /// Proximity requirement.
    pub proximity: Option<Arg>,
    /// Run on start and on new targets.
    pub start_sequence: Vec<Arg>,
    /// Run when proximity is first satisfied.
    pub proximity_satisfied_sequence: Vec<Arg>,
    /// Run when movement starts.
    pub movement_started_sequence: Vec<Arg>,
    /// Run on resumption.
    pub resumption_sequence: Vec<Arg>,
    /// Run on termination.
    pub termination_sequence: Vec<Arg>,
    /// Run on cancellation.
    pub cancellation_sequence: Vec<Arg>,
    /// `(animation, condition)` pairs; first match wins.
    pub proximity_animations: Vec<(String, Arg)>,
    /// Fallback animation.
    pub default_animation: Option<String>,
    /// Keep facing the target.
    pub face_target: bool,
    /// Completion fraction for animation-loop triggers.
    pub sync_fraction: Option<Arg>,
    /// Triggers.
    pub triggers: Vec<TriggerDef>,
}

/// An order assignment recipe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderAssignmentDef {
    /// Recipe name.
    pub name: String,
    /// Order name.
    pub order: String,
    /// Queue placement.
    pub mode: AssignMode,
    /// Target finder.
    pub target: Option<Arg>,
    /// Spread targets round-robin.
    pub distribute: bool,
}

/// A player command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandDef {
    /// Command name.
    pub name: String,
    /// Run when executed.
    pub start_sequence: Vec<Arg>,
    /// Order to assign.
    pub order: Option<String>,
}

/// An event reaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactionDef {
    /// Reaction name.
    pub name: String,
    /// Events that trigger it directly.
    pub events: Vec<String>,
    /// Package receipt triggers that can also trigger it.
    pub package_triggers: Vec<String>,
    /// Actions to run.
    pub actions: Vec<Arg>,
}

/// A conditional event filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageTriggerDef {
    /// Trigger name.
    pub name: String,
    /// Events it listens for.
    pub events: Vec<String>,
    /// Equation names that must all be > 0.
    pub assessments: Vec<String>,
}
