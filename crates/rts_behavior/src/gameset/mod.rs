//! The ruleset ("gameset"): immutable blueprints shared by every object.
//!
//! A [`GameSet`] is compiled once from a [`GameSetDef`](defs::GameSetDef)
//! by the [`loader`] and never mutated afterwards. Every category is a
//! table indexed by a typed id from [`crate::ids`]; names are resolved to
//! ids at load time, case-insensitively.

pub mod defs;
pub mod loader;

use std::collections::HashMap;
use std::marker::PhantomData;

use crate::error::{GameError, Result};
use crate::ids::{
    AnimationId, CommandId, EquationId, EventId, ItemId, ObjectBlueprintId, OrderAssignmentId,
    OrderBlueprintId, PackageTriggerId, ReactionId, SequenceId, TableIndex, TaskBlueprintId,
};
use crate::math::Vec3;
use crate::orders::{AssignMode, OrderBlueprint, TaskBlueprint};
use crate::script::{ActionSequence, FinderNode, NumericNode};
use crate::world::{Footprint, ObjectClass, ObjectSpawn};

/// Event sent to an object when it runs out of orders.
pub const ON_IDLE: EventId = EventId(0);

/// Name of [`ON_IDLE`] in gameset content.
pub const ON_IDLE_NAME: &str = "ON_IDLE";

/// Case-insensitive name to index table for one category.
#[derive(Debug, Clone)]
pub struct NameTable<I> {
    category: &'static str,
    names: Vec<String>,
    lookup: HashMap<String, u32>,
    _index: PhantomData<I>,
}

impl<I: TableIndex> NameTable<I> {
    /// Empty table for `category` (used in error messages).
    #[must_use]
    pub fn new(category: &'static str) -> Self {
        Self {
            category,
            names: Vec::new(),
            lookup: HashMap::new(),
            _index: PhantomData,
        }
    }

    /// Register a new name.
    pub fn declare(&mut self, name: &str) -> Result<I> {
        let key = name.to_ascii_lowercase();
        if self.lookup.contains_key(&key) {
            return Err(GameError::DuplicateDeclaration {
                category: self.category,
                name: name.to_string(),
            });
        }
        let raw = self.names.len() as u32;
        self.names.push(name.to_string());
        self.lookup.insert(key, raw);
        Ok(I::from_raw(raw))
    }

    /// Look a name up.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<I> {
        self.lookup
            .get(&name.to_ascii_lowercase())
            .map(|raw| I::from_raw(*raw))
    }

    /// Look a name up, failing with a content error.
    pub fn resolve(&self, name: &str) -> Result<I> {
        self.get(name).ok_or_else(|| GameError::UnresolvedReference {
            category: self.category,
            name: name.to_string(),
        })
    }

    /// Declared name of an index.
    #[must_use]
    pub fn name(&self, id: I) -> &str {
        self.names
            .get(id.raw() as usize)
            .map_or("<invalid>", String::as_str)
    }

    /// Number of declared names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether nothing is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Every name declared by a gameset, grouped by category.
#[derive(Debug, Clone)]
pub struct Symbols {
    /// Item names.
    pub items: NameTable<ItemId>,
    /// Animation tags.
    pub animations: NameTable<AnimationId>,
    /// Event tags.
    pub events: NameTable<EventId>,
    /// Equation names.
    pub equations: NameTable<EquationId>,
    /// Action sequence names.
    pub sequences: NameTable<SequenceId>,
    /// Object blueprint names.
    pub objects: NameTable<ObjectBlueprintId>,
    /// Order blueprint names.
    pub orders: NameTable<OrderBlueprintId>,
    /// Task blueprint names.
    pub tasks: NameTable<TaskBlueprintId>,
    /// Order assignment names.
    pub assignments: NameTable<OrderAssignmentId>,
    /// Command names.
    pub commands: NameTable<CommandId>,
    /// Reaction names.
    pub reactions: NameTable<ReactionId>,
    /// Package receipt trigger names.
    pub package_triggers: NameTable<PackageTriggerId>,
    defined_values: HashMap<String, f32>,
}

impl Default for Symbols {
    fn default() -> Self {
        let mut events = NameTable::new("event");
        // The first event is always ON_IDLE.
        let _ = events.declare(ON_IDLE_NAME);
        Self {
            items: NameTable::new("item"),
            animations: NameTable::new("animation"),
            events,
            equations: NameTable::new("equation"),
            sequences: NameTable::new("action sequence"),
            objects: NameTable::new("object blueprint"),
            orders: NameTable::new("order"),
            tasks: NameTable::new("task"),
            assignments: NameTable::new("order assignment"),
            commands: NameTable::new("command"),
            reactions: NameTable::new("reaction"),
            package_triggers: NameTable::new("package receipt trigger"),
            defined_values: HashMap::new(),
        }
    }
}

impl Symbols {
    /// Register a defined value.
    pub fn define_value(&mut self, name: &str, value: f32) -> Result<()> {
        let key = name.to_ascii_lowercase();
        if self.defined_values.insert(key, value).is_some() {
            return Err(GameError::DuplicateDeclaration {
                category: "defined value",
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Value of a defined constant.
    #[must_use]
    pub fn defined_value(&self, name: &str) -> Option<f32> {
        self.defined_values.get(&name.to_ascii_lowercase()).copied()
    }
}

/// Named point on a model, switched on during parts of the cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentPoint {
    /// Tag used to find the point.
    pub tag: String,
    /// Offset from the object origin in model space.
    pub offset: Vec3,
    /// `(start, end)` times within one cycle, in seconds, when the point is on.
    pub on_intervals: Vec<(f32, f32)>,
}

impl AttachmentPoint {
    /// Whether an "on" interval begins in the animation-time window
    /// `(from, to]` of a cycle lasting `duration` seconds.
    #[must_use]
    pub fn turns_on_within(&self, from: f32, to: f32, duration: f32) -> bool {
        if self.on_intervals.is_empty() || to <= from {
            return false;
        }
        if duration <= 0.0 {
            return self
                .on_intervals
                .iter()
                .any(|(start, _)| from < *start && *start <= to);
        }
        if to - from >= duration {
            return true;
        }
        let a = from.rem_euclid(duration);
        let b = a + (to - from);
        self.on_intervals.iter().any(|(start, _)| {
            let s = start.rem_euclid(duration);
            (a < s && s <= b) || (a < s + duration && s + duration <= b)
        })
    }

    /// Whether the point is on at `time` seconds into the animation.
    #[must_use]
    pub fn is_on_at(&self, time: f32, duration: f32) -> bool {
        let t = if duration > 0.0 {
            time.rem_euclid(duration)
        } else {
            time
        };
        self.on_intervals.iter().any(|(s, e)| *s <= t && t < *e)
    }
}

/// Timing data for one animation of an object blueprint.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Model {
    /// Length of one cycle in seconds.
    pub duration: f32,
    /// Attachment points.
    pub attachment_points: Vec<AttachmentPoint>,
}

impl Model {
    /// Find an attachment point by tag, ignoring case.
    #[must_use]
    pub fn attachment(&self, tag: &str) -> Option<&AttachmentPoint> {
        self.attachment_points
            .iter()
            .find(|p| p.tag.eq_ignore_ascii_case(tag))
    }
}

/// Template for creating objects.
#[derive(Debug, Clone, Default)]
pub struct ObjectBlueprint {
    /// Blueprint name.
    pub name: String,
    /// Class of created objects.
    pub class: ObjectClass,
    /// Initial item values.
    pub start_items: Vec<(ItemId, f32)>,
    /// Movement speed.
    pub speed: f32,
    /// Tile footprint.
    pub footprint: Option<Footprint>,
    /// Model used when no animation-specific model exists.
    pub default_model: Option<Model>,
    /// Models per animation.
    pub models: HashMap<AnimationId, Model>,
    /// Reactions attached to objects of this blueprint.
    pub reactions: Vec<ReactionId>,
}

impl ObjectBlueprint {
    /// Model for an animation, falling back to the default model.
    #[must_use]
    pub fn model(&self, animation: Option<AnimationId>) -> Option<&Model> {
        animation
            .and_then(|a| self.models.get(&a))
            .or(self.default_model.as_ref())
    }

    /// Spawn description for an object of this blueprint.
    #[must_use]
    pub fn spawn(&self, id: ObjectBlueprintId) -> ObjectSpawn {
        ObjectSpawn {
            class: self.class,
            blueprint: Some(id),
            items: self.start_items.clone(),
            speed: self.speed,
            footprint: self.footprint,
            ..Default::default()
        }
    }
}

/// Sequence run when an object receives a matching event.
#[derive(Debug, Clone, Default)]
pub struct Reaction {
    /// Reaction name.
    pub name: String,
    /// Events that trigger the reaction directly.
    pub events: Vec<EventId>,
    /// Package receipt triggers that can also trigger it.
    pub package_triggers: Vec<PackageTriggerId>,
    /// What to run.
    pub sequence: ActionSequence,
}

/// Conditional event filter: matches an event only if every assessment
/// equation is positive.
#[derive(Debug, Clone, Default)]
pub struct PackageReceiptTrigger {
    /// Trigger name.
    pub name: String,
    /// Events the trigger listens for.
    pub events: Vec<EventId>,
    /// Equations that must all evaluate to > 0.
    pub assessments: Vec<EquationId>,
}

/// Player command: a start sequence plus an optional order.
#[derive(Debug, Clone, Default)]
pub struct CommandBlueprint {
    /// Command name.
    pub name: String,
    /// Run when the command is executed.
    pub start_sequence: ActionSequence,
    /// Order assigned by the command.
    pub order: Option<OrderBlueprintId>,
}

/// Named recipe for assigning an order from an action.
#[derive(Debug, Clone)]
pub struct OrderAssignmentBlueprint {
    /// Assignment name.
    pub name: String,
    /// Order to assign.
    pub order: OrderBlueprintId,
    /// How to queue it.
    pub mode: AssignMode,
    /// Targets for the order's first task.
    pub target: Option<FinderNode>,
    /// Spread targets across assignees round-robin instead of giving every
    /// assignee the first target.
    pub distribute: bool,
}

/// A compiled ruleset.
#[derive(Debug, Clone, Default)]
pub struct GameSet {
    pub(crate) symbols: Symbols,
    pub(crate) equations: Vec<NumericNode>,
    pub(crate) sequences: Vec<ActionSequence>,
    pub(crate) object_blueprints: Vec<ObjectBlueprint>,
    pub(crate) orders: Vec<OrderBlueprint>,
    pub(crate) tasks: Vec<TaskBlueprint>,
    pub(crate) assignments: Vec<OrderAssignmentBlueprint>,
    pub(crate) commands: Vec<CommandBlueprint>,
    pub(crate) reactions: Vec<Reaction>,
    pub(crate) package_triggers: Vec<PackageReceiptTrigger>,
}

impl GameSet {
    /// Declared names.
    #[must_use]
    pub const fn symbols(&self) -> &Symbols {
        &self.symbols
    }

    /// Equation body.
    #[must_use]
    pub fn equation(&self, id: EquationId) -> Option<&NumericNode> {
        self.equations.get(id.index())
    }

    /// Named action sequence.
    #[must_use]
    pub fn sequence(&self, id: SequenceId) -> Option<&ActionSequence> {
        self.sequences.get(id.index())
    }

    /// Object blueprint.
    #[must_use]
    pub fn object_blueprint(&self, id: ObjectBlueprintId) -> Option<&ObjectBlueprint> {
        self.object_blueprints.get(id.index())
    }

    /// Order blueprint.
    #[must_use]
    pub fn order(&self, id: OrderBlueprintId) -> Option<&OrderBlueprint> {
        self.orders.get(id.index())
    }

    /// Task blueprint.
    #[must_use]
    pub fn task(&self, id: TaskBlueprintId) -> Option<&TaskBlueprint> {
        self.tasks.get(id.index())
    }

    /// Order assignment blueprint.
    #[must_use]
    pub fn assignment(&self, id: OrderAssignmentId) -> Option<&OrderAssignmentBlueprint> {
        self.assignments.get(id.index())
    }

    /// Command blueprint.
    #[must_use]
    pub fn command(&self, id: CommandId) -> Option<&CommandBlueprint> {
        self.commands.get(id.index())
    }

    /// Reaction.
    #[must_use]
    pub fn reaction(&self, id: ReactionId) -> Option<&Reaction> {
        self.reactions.get(id.index())
    }

    /// Package receipt trigger.
    #[must_use]
    pub fn package_trigger(&self, id: PackageTriggerId) -> Option<&PackageReceiptTrigger> {
        self.package_triggers.get(id.index())
    }

    /// Object blueprint by name.
    #[must_use]
    pub fn object_blueprint_named(&self, name: &str) -> Option<ObjectBlueprintId> {
        self.symbols.objects.get(name)
    }

    /// Order blueprint by name.
    #[must_use]
    pub fn order_named(&self, name: &str) -> Option<OrderBlueprintId> {
        self.symbols.orders.get(name)
    }

    /// Command by name.
    #[must_use]
    pub fn command_named(&self, name: &str) -> Option<CommandId> {
        self.symbols.commands.get(name)
    }

    /// Item by name.
    #[must_use]
    pub fn item_named(&self, name: &str) -> Option<ItemId> {
        self.symbols.items.get(name)
    }

    /// Event by name.
    #[must_use]
    pub fn event_named(&self, name: &str) -> Option<EventId> {
        self.symbols.events.get(name)
    }

    /// Reactions attached to an object blueprint.
    #[must_use]
    pub fn reactions_of(&self, blueprint: ObjectBlueprintId) -> &[ReactionId] {
        self.object_blueprint(blueprint)
            .map_or(&[][..], |bp| bp.reactions.as_slice())
    }
}
