//! Compiling a [`GameSetDef`] into a [`GameSet`].
//!
//! Loading runs in two passes. The first declares every name in every
//! category so bodies may refer to anything regardless of declaration
//! order; the second compiles the bodies. Any name that fails to resolve
//! aborts the load with [`GameError::UnresolvedReference`].

use std::path::Path;

use crate::error::{GameError, Result};
use crate::math::Vec3;
use crate::orders::{
    AnimationChoice, OrderBlueprint, TaskBlueprint, TaskKind, TriggerBlueprint, TriggerKind,
};
use crate::script::{ActionSequence, Arg, FinderNode, NumericNode, PositionNode};

use super::defs::{
    GameSetDef, ModelDef, ObjectDef, OrderDef, TaskDef, TaskKindDef, TriggerDef, TriggerKindDef,
};
use super::{
    AttachmentPoint, CommandBlueprint, GameSet, Model, ObjectBlueprint, OrderAssignmentBlueprint,
    PackageReceiptTrigger, Reaction, Symbols, ON_IDLE_NAME,
};

impl GameSet {
    /// Parse and compile a ruleset from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let def: GameSetDef = ron::from_str(text).map_err(|e| GameError::DataParseError {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })?;
        Self::from_def(&def)
    }

    /// Load and compile a ruleset file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| GameError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let def: GameSetDef = ron::from_str(&text).map_err(|e| GameError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let gameset = Self::from_def(&def)?;
        tracing::info!(
            path = %path.display(),
            objects = gameset.object_blueprints.len(),
            orders = gameset.orders.len(),
            tasks = gameset.tasks.len(),
            "gameset loaded"
        );
        Ok(gameset)
    }

    /// Compile a parsed ruleset.
    pub fn from_def(def: &GameSetDef) -> Result<Self> {
        let symbols = declare(def)?;
        let s = &symbols;

        let equations = def
            .equations
            .iter()
            .map(|e| NumericNode::compile(&e.body, s))
            .collect::<Result<Vec<_>>>()?;
        let sequences = def
            .sequences
            .iter()
            .map(|q| ActionSequence::compile(&q.actions, s))
            .collect::<Result<Vec<_>>>()?;
        let tasks = def
            .tasks
            .iter()
            .map(|t| compile_task(t, s))
            .collect::<Result<Vec<_>>>()?;
        let orders = def
            .orders
            .iter()
            .map(|o| compile_order(o, s))
            .collect::<Result<Vec<_>>>()?;
        let object_blueprints = def
            .objects
            .iter()
            .map(|o| compile_object(o, s))
            .collect::<Result<Vec<_>>>()?;

        let mut assignments = Vec::with_capacity(def.order_assignments.len());
        for a in &def.order_assignments {
            assignments.push(OrderAssignmentBlueprint {
                name: a.name.clone(),
                order: s.orders.resolve(&a.order)?,
                mode: a.mode,
                target: a
                    .target
                    .as_ref()
                    .map(|t| FinderNode::compile(t, s))
                    .transpose()?,
                distribute: a.distribute,
            });
        }

        let mut commands = Vec::with_capacity(def.commands.len());
        for c in &def.commands {
            commands.push(CommandBlueprint {
                name: c.name.clone(),
                start_sequence: ActionSequence::compile(&c.start_sequence, s)?,
                order: c.order.as_deref().map(|o| s.orders.resolve(o)).transpose()?,
            });
        }

        let mut reactions = Vec::with_capacity(def.reactions.len());
        for r in &def.reactions {
            reactions.push(Reaction {
                name: r.name.clone(),
                events: r
                    .events
                    .iter()
                    .map(|e| s.events.resolve(e))
                    .collect::<Result<_>>()?,
                package_triggers: r
                    .package_triggers
                    .iter()
                    .map(|p| s.package_triggers.resolve(p))
                    .collect::<Result<_>>()?,
                sequence: ActionSequence::compile(&r.actions, s)?,
            });
        }

        let mut package_triggers = Vec::with_capacity(def.package_triggers.len());
        for p in &def.package_triggers {
            package_triggers.push(PackageReceiptTrigger {
                name: p.name.clone(),
                events: p
                    .events
                    .iter()
                    .map(|e| s.events.resolve(e))
                    .collect::<Result<_>>()?,
                assessments: p
                    .assessments
                    .iter()
                    .map(|e| s.equations.resolve(e))
                    .collect::<Result<_>>()?,
            });
        }

        Ok(Self {
            symbols,
            equations,
            sequences,
            object_blueprints,
            orders,
            tasks,
            assignments,
            commands,
            reactions,
            package_triggers,
        })
    }
}

fn declare(def: &GameSetDef) -> Result<Symbols> {
    let mut s = Symbols::default();
    for (name, value) in &def.defined_values {
        s.define_value(name, *value)?;
    }
    for name in &def.items {
        s.items.declare(name)?;
    }
    for name in &def.animations {
        s.animations.declare(name)?;
    }
    for name in &def.events {
        // ON_IDLE is built in; listing it is allowed.
        if name.eq_ignore_ascii_case(ON_IDLE_NAME) {
            continue;
        }
        s.events.declare(name)?;
    }
    for e in &def.equations {
        s.equations.declare(&e.name)?;
    }
    for q in &def.sequences {
        s.sequences.declare(&q.name)?;
    }
    for o in &def.objects {
        s.objects.declare(&o.name)?;
    }
    for o in &def.orders {
        s.orders.declare(&o.name)?;
    }
    for t in &def.tasks {
        s.tasks.declare(&t.name)?;
    }
    for a in &def.order_assignments {
        s.assignments.declare(&a.name)?;
    }
    for c in &def.commands {
        s.commands.declare(&c.name)?;
    }
    for r in &def.reactions {
        s.reactions.declare(&r.name)?;
    }
    for p in &def.package_triggers {
        s.package_triggers.declare(&p.name)?;
    }
    Ok(s)
}

fn numeric(arg: Option<&Arg>, s: &Symbols) -> Result<Option<NumericNode>> {
    arg.map(|a| NumericNode::compile(a, s)).transpose()
}

fn position(arg: Option<&Arg>, s: &Symbols) -> Result<Option<PositionNode>> {
    arg.map(|a| PositionNode::compile(a, s)).transpose()
}

fn compile_order(def: &OrderDef, s: &Symbols) -> Result<OrderBlueprint> {
    Ok(OrderBlueprint {
        name: def.name.clone(),
        class_name: def.class_name.clone(),
        tasks: def
            .tasks
            .iter()
            .map(|t| s.tasks.resolve(t))
            .collect::<Result<_>>()?,
        cycle: def.cycle,
        uninterruptible: def.uninterruptible,
        start_sequence: ActionSequence::compile(&def.start_sequence, s)?,
        termination_sequence: ActionSequence::compile(&def.termination_sequence, s)?,
        cancellation_sequence: ActionSequence::compile(&def.cancellation_sequence, s)?,
    })
}

fn compile_kind(def: &TaskKindDef, s: &Symbols) -> Result<TaskKind> {
    Ok(match def {
        TaskKindDef::ObjectReference => TaskKind::ObjectReference,
        TaskKindDef::Move { destination } => TaskKind::Move {
            destination: position(destination.as_ref(), s)?,
        },
        TaskKindDef::Missile { speed } => TaskKind::Missile {
            speed: numeric(speed.as_ref(), s)?,
        },
        TaskKindDef::FaceTowards => TaskKind::FaceTowards,
        TaskKindDef::Spawn {
            blueprint,
            condition,
            position: at,
            post_creation_sequence,
        } => TaskKind::Spawn {
            blueprint: s.objects.resolve(blueprint)?,
            condition: NumericNode::compile(condition, s)?,
            position: position(at.as_ref(), s)?,
            post_creation: ActionSequence::compile(post_creation_sequence, s)?,
        },
    })
}

fn compile_trigger(def: &TriggerDef, s: &Symbols) -> Result<TriggerBlueprint> {
    let kind = match &def.kind {
        TriggerKindDef::Timer { period } => TriggerKind::Timer {
            period: NumericNode::compile(period, s)?,
        },
        TriggerKindDef::AnimationLoop => TriggerKind::AnimationLoop,
        TriggerKindDef::AttachmentPoint { tag } => TriggerKind::AttachmentPoint { tag: tag.clone() },
        TriggerKindDef::Collision => TriggerKind::Collision,
        TriggerKindDef::StruckFloor => TriggerKind::StruckFloor,
    };
    Ok(TriggerBlueprint {
        kind,
        actions: ActionSequence::compile(&def.actions, s)?,
    })
}

fn compile_task(def: &TaskDef, s: &Symbols) -> Result<TaskBlueprint> {
    let mut proximity_animations = Vec::with_capacity(def.proximity_animations.len());
    for (animation, condition) in &def.proximity_animations {
        proximity_animations.push(AnimationChoice {
            animation: s.animations.resolve(animation)?,
            condition: NumericNode::compile(condition, s)?,
        });
    }
    Ok(TaskBlueprint {
        name: def.name.clone(),
        class_name: def.class_name.clone(),
        kind: compile_kind(&def.kind, s)?,
        target: def
            .target
            .as_ref()
            .map(|t| FinderNode::compile(t, s))
            .transpose()?,
        use_previous_target: def.use_previous_target,
        identify_target_each_cycle: def.identify_target_each_cycle,
        reject_terminated_target: def.reject_terminated_target,
        proximity: numeric(def.proximity.as_ref(), s)?,
        start_sequence: ActionSequence::compile(&def.start_sequence, s)?,
        proximity_satisfied_sequence: ActionSequence::compile(
            &def.proximity_satisfied_sequence,
            s,
        )?,
        movement_started_sequence: ActionSequence::compile(&def.movement_started_sequence, s)?,
        resumption_sequence: ActionSequence::compile(&def.resumption_sequence, s)?,
        termination_sequence: ActionSequence::compile(&def.termination_sequence, s)?,
        cancellation_sequence: ActionSequence::compile(&def.cancellation_sequence, s)?,
        proximity_animations,
        default_animation: def
            .default_animation
            .as_deref()
            .map(|a| s.animations.resolve(a))
            .transpose()?,
        face_target: def.face_target,
        sync_fraction: numeric(def.sync_fraction.as_ref(), s)?,
        triggers: def
            .triggers
            .iter()
            .map(|t| compile_trigger(t, s))
            .collect::<Result<_>>()?,
    })
}

fn compile_model(def: &ModelDef) -> Model {
    Model {
        duration: def.duration,
        attachment_points: def
            .attachment_points
            .iter()
            .map(|p| AttachmentPoint {
                tag: p.tag.clone(),
                offset: Vec3::new(p.offset.0, p.offset.1, p.offset.2),
                on_intervals: p.on.clone(),
            })
            .collect(),
    }
}

fn compile_object(def: &ObjectDef, s: &Symbols) -> Result<ObjectBlueprint> {
    let mut models = std::collections::HashMap::with_capacity(def.models.len());
    for (animation, model) in &def.models {
        models.insert(s.animations.resolve(animation)?, compile_model(model));
    }
    Ok(ObjectBlueprint {
        name: def.name.clone(),
        class: def.class,
        start_items: def
            .start_items
            .iter()
            .map(|(item, value)| Ok((s.items.resolve(item)?, *value)))
            .collect::<Result<_>>()?,
        speed: def.speed,
        footprint: def.footprint,
        default_model: def.default_model.as_ref().map(compile_model),
        models,
        reactions: def
            .reactions
            .iter()
            .map(|r| s.reactions.resolve(r))
            .collect::<Result<_>>()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gameset::ON_IDLE;

    const SMALL: &str = r#"(
        items: ["Health"],
        defined_values: [("MaxHealth", 100.0)],
        animations: ["Walk"],
        events: ["ON_IDLE", "Hit"],
        equations: [(name: "Alive", body: Node("GREATER_THAN", [Node("ITEM_VALUE", [Name("Health"), Node("SELF", [])]), Num(0.0)]))],
        objects: [(
            name: "Peasant",
            class: Character,
            speed: 4.0,
            start_items: [("Health", 100.0)],
            models: [("Walk", (duration: 1.0))],
            reactions: ["Idle"],
        )],
        tasks: [(name: "Turn", kind: FaceTowards, target: Some(Node("SELF", [])))],
        orders: [(name: "Look", tasks: ["Turn"])],
        commands: [(name: "LookCmd", order: Some("Look"))],
        reactions: [(name: "Idle", events: ["on_idle"], actions: [Node("TRACE", [Name("idle")])])],
    )"#;

    #[test]
    fn test_load_small_gameset() {
        let gs = GameSet::from_ron_str(SMALL).unwrap();
        let peasant = gs.object_blueprint_named("peasant").unwrap();
        let bp = gs.object_blueprint(peasant).unwrap();
        assert_eq!(bp.speed, 4.0);
        assert_eq!(bp.start_items.len(), 1);
        assert_eq!(bp.models.len(), 1);
        let look = gs.order_named("Look").unwrap();
        assert_eq!(gs.order(look).unwrap().tasks.len(), 1);
        let cmd = gs.command_named("LookCmd").unwrap();
        assert_eq!(gs.command(cmd).unwrap().order, Some(look));
        let reaction = gs.reaction(gs.reactions_of(peasant)[0]).unwrap();
        assert_eq!(reaction.events, vec![ON_IDLE]);
        assert_eq!(gs.symbols().defined_value("maxhealth"), Some(100.0));
    }

    #[test]
    fn test_unresolved_task_reference() {
        let err = GameSet::from_ron_str(r#"(orders: [(name: "Look", tasks: ["Missing"])])"#)
            .unwrap_err();
        assert_eq!(
            err,
            GameError::UnresolvedReference {
                category: "task",
                name: "Missing".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_declaration() {
        let err = GameSet::from_ron_str(r#"(items: ["Gold", "gold"])"#).unwrap_err();
        assert!(matches!(
            err,
            GameError::DuplicateDeclaration { category: "item", .. }
        ));
    }

    #[test]
    fn test_forward_references_resolve() {
        let text = r#"(
            sequences: [(name: "First", actions: [Node("EXECUTE_SEQUENCE", [Name("Second"), Node("SELF", [])])]), (name: "Second", actions: [])],
        )"#;
        let gs = GameSet::from_ron_str(text).unwrap();
        assert_eq!(gs.sequences.len(), 2);
    }

    #[test]
    fn test_parse_error_reports_path() {
        let err = GameSet::from_ron_str("(items: [").unwrap_err();
        assert!(matches!(err, GameError::DataParseError { .. }));
    }
}
