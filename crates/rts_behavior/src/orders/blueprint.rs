//! Immutable order, task and trigger templates.
//!
//! These are shared by every object running them; per-object progress
//! lives in [`Order`](super::Order), [`Task`](super::Task) and
//! [`Trigger`](super::Trigger).

use crate::ids::{AnimationId, ObjectBlueprintId, TaskBlueprintId};
use crate::script::{ActionSequence, FinderNode, NumericNode, PositionNode};

/// Template for an order: a list of tasks plus order-level sequences.
#[derive(Debug, Clone, Default)]
pub struct OrderBlueprint {
    /// Order name.
    pub name: String,
    /// Designer-facing category ("Move", "Attack", ...).
    pub class_name: String,
    /// Tasks, run in order.
    pub tasks: Vec<TaskBlueprintId>,
    /// Restart from the first task instead of terminating after the last.
    pub cycle: bool,
    /// Refuse do-first and forget-everything-else assignments while active.
    pub uninterruptible: bool,
    /// Run when the order starts.
    pub start_sequence: ActionSequence,
    /// Run when the order terminates.
    pub termination_sequence: ActionSequence,
    /// Run when the order is cancelled.
    pub cancellation_sequence: ActionSequence,
}

/// One entry of a task's proximity animation list.
#[derive(Debug, Clone)]
pub struct AnimationChoice {
    /// Animation to play.
    pub animation: AnimationId,
    /// Chosen when this is the first entry whose condition is > 0.
    pub condition: NumericNode,
}

/// Kind-specific parameters of a task.
#[derive(Debug, Clone, Default)]
pub enum TaskKind {
    /// Follow a target until within proximity, then run triggers there.
    #[default]
    ObjectReference,
    /// Walk to a fixed point and terminate on arrival.
    Move {
        /// Where to go when no destination was supplied with the order.
        destination: Option<PositionNode>,
    },
    /// Fly a ballistic arc at the target.
    Missile {
        /// Launch speed; the configured default when absent.
        speed: Option<NumericNode>,
    },
    /// Turn towards the target and terminate at once.
    FaceTowards,
    /// Create an object once a condition holds.
    Spawn {
        /// What to create.
        blueprint: ObjectBlueprintId,
        /// Spawn happens on the first update where this is > 0.
        condition: NumericNode,
        /// Where to put it; the owner's location when absent.
        position: Option<PositionNode>,
        /// Run as the created object, with the owner as creator.
        post_creation: ActionSequence,
    },
}

/// Condition that fires a trigger.
#[derive(Debug, Clone)]
pub enum TriggerKind {
    /// Every `period` seconds.
    Timer {
        /// Period in seconds.
        period: NumericNode,
    },
    /// Once per animation cycle.
    AnimationLoop,
    /// When an attachment point switches on.
    AttachmentPoint {
        /// Attachment point tag.
        tag: String,
    },
    /// When a missile hits an object.
    Collision,
    /// When a missile hits the ground.
    StruckFloor,
}

/// Template for a trigger.
#[derive(Debug, Clone)]
pub struct TriggerBlueprint {
    /// Firing condition.
    pub kind: TriggerKind,
    /// Run each time the trigger fires.
    pub actions: ActionSequence,
}

/// Template for a task.
#[derive(Debug, Clone, Default)]
pub struct TaskBlueprint {
    /// Task name.
    pub name: String,
    /// Designer-facing category.
    pub class_name: String,
    /// Kind-specific behaviour.
    pub kind: TaskKind,
    /// Finder for the target; first result wins.
    pub target: Option<FinderNode>,
    /// Take over the previous task's target on start.
    pub use_previous_target: bool,
    /// Re-run the target finder on every update.
    pub identify_target_each_cycle: bool,
    /// Treat a terminated target as no target.
    pub reject_terminated_target: bool,
    /// Distance within which the target counts as reached.
    pub proximity: Option<NumericNode>,
    /// Run on start and whenever a new target is acquired.
    pub start_sequence: ActionSequence,
    /// Run when the proximity requirement becomes satisfied.
    pub proximity_satisfied_sequence: ActionSequence,
    /// Run when the task starts moving its owner.
    pub movement_started_sequence: ActionSequence,
    /// Run when a suspended task resumes.
    pub resumption_sequence: ActionSequence,
    /// Run when the task terminates.
    pub termination_sequence: ActionSequence,
    /// Run when the task is cancelled.
    pub cancellation_sequence: ActionSequence,
    /// Animations played once in proximity; first matching entry wins.
    pub proximity_animations: Vec<AnimationChoice>,
    /// Animation played when no proximity entry matches.
    pub default_animation: Option<AnimationId>,
    /// Keep the owner facing its target.
    pub face_target: bool,
    /// Completion fraction driving animation-loop triggers.
    pub sync_fraction: Option<NumericNode>,
    /// Triggers, initialised when the task's work begins.
    pub triggers: Vec<TriggerBlueprint>,
}

impl TaskBlueprint {
    /// Whether triggers start with the task rather than on reaching the
    /// target.
    #[must_use]
    pub const fn triggers_start_immediately(&self) -> bool {
        !matches!(self.kind, TaskKind::ObjectReference)
    }
}
