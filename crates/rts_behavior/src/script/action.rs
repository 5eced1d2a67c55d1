//! Actions: the only nodes that change the world.
//!
//! An [`ActionSequence`] runs its actions in order within the current tick.
//! An action whose finder comes back empty does nothing; a missing
//! recipient where one is required is logged and skipped. Only content
//! errors (an unknown action evaluated, a broken equation) abort the run.

use rand::Rng;

use crate::error::{GameError, Result};
use crate::gameset::Symbols;
use crate::ids::{
    AnimationId, EventId, ItemId, ObjectBlueprintId, ObjectId, OrderAssignmentId, SequenceId,
};
use crate::math::{time_from_f32, OrientedPosition};
use crate::orders::{self, OrderOp, OrderRequest};
use crate::scheduler::DelayedSequence;
use crate::world::World;

use super::args::{Arg, ArgCursor};
use super::context::{ExecutionContext, Slot};
use super::event::send_event;
use super::finder::FinderNode;
use super::numeric::NumericNode;
use super::position::PositionNode;

const FAMILY: &str = "action";

/// How an item action combines its value with the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOp {
    /// Replace.
    Set,
    /// Add.
    Increase,
    /// Subtract.
    Decrease,
}

/// Which order operation an order action performs on its objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    /// Cancel the current order.
    Cancel,
    /// Terminate the current order.
    Terminate,
}

/// A compiled action.
#[derive(Debug, Clone)]
pub enum ActionNode {
    /// Log a message.
    Trace(String),
    /// Log a message with a value.
    TraceValue(String, NumericNode),
    /// Change an item on every object found. The value is evaluated once per
    /// object, in the caller's context.
    Item {
        /// Combination rule.
        op: ItemOp,
        /// Item to change.
        item: ItemId,
        /// Objects to change.
        objects: FinderNode,
        /// Operand.
        value: NumericNode,
    },
    /// Run one of two sequences depending on a condition.
    UponCondition {
        /// Condition; `> 0` runs `then`.
        condition: NumericNode,
        /// Run when true.
        then: ActionSequence,
        /// Run when false.
        otherwise: ActionSequence,
    },
    /// Run one action picked at random.
    OneAtRandom(Vec<ActionNode>),
    /// Run a named sequence as each object found.
    ExecuteSequence {
        /// Sequence to run.
        sequence: SequenceId,
        /// Objects to run it as.
        objects: FinderNode,
    },
    /// Run a named sequence as each object found, after a delay.
    ExecuteSequenceAfterDelay {
        /// Sequence to run.
        sequence: SequenceId,
        /// Objects to run it as.
        objects: FinderNode,
        /// Delay in seconds.
        delay: NumericNode,
    },
    /// Run a named sequence as each object found, spread evenly over a
    /// period.
    ExecuteSequenceOverPeriod {
        /// Sequence to run.
        sequence: SequenceId,
        /// Objects to run it as.
        objects: FinderNode,
        /// Period in seconds.
        period: NumericNode,
    },
    /// Send an event to every object found, with self as sender.
    SendEvent {
        /// Event to send.
        event: EventId,
        /// Receivers.
        objects: FinderNode,
    },
    /// Assign orders through an order assignment.
    AssignOrderVia {
        /// Assignment blueprint.
        assignment: OrderAssignmentId,
        /// Assignees.
        objects: FinderNode,
    },
    /// Cancel or terminate the current order of every object found.
    Order(OrderAction, FinderNode),
    /// Terminate self's current task.
    TerminateThisTask,
    /// Terminate self's current order.
    TerminateThisOrder,
    /// Create an object.
    CreateObject {
        /// Blueprint to instantiate.
        blueprint: ObjectBlueprintId,
        /// Parent; the first object found.
        parent: FinderNode,
        /// Where to put it.
        position: PositionNode,
        /// Run as the new object, with the executing self as creator.
        post_creation: ActionSequence,
    },
    /// Remove every object found, with its children.
    Remove(FinderNode),
    /// Mark every object found as terminated.
    Terminate(FinderNode),
    /// Reparent every object found to the first recipient.
    TransferControl {
        /// Objects to move.
        objects: FinderNode,
        /// New parent.
        recipient: FinderNode,
    },
    /// Move every object found to a position instantly.
    Teleport {
        /// Objects to move.
        objects: FinderNode,
        /// Destination.
        position: PositionNode,
    },
    /// Start an animation on every object found.
    PlayAnimation {
        /// Animation to play.
        animation: AnimationId,
        /// Objects to animate.
        objects: FinderNode,
        /// Play once instead of looping.
        once: bool,
    },
    /// Stop every object found.
    StopMovement(FinderNode),
    /// Set or clear the disabled flag of every object found.
    SetDisabled(FinderNode, bool),
    /// Placeholder for an unrecognised kind. Running it is an error.
    Unknown(String),
}

/// An ordered list of actions.
#[derive(Debug, Clone, Default)]
pub struct ActionSequence {
    /// Actions, run in order.
    pub actions: Vec<ActionNode>,
}

impl ActionSequence {
    /// Compile a list of action nodes.
    pub fn compile(args: &[Arg], symbols: &Symbols) -> Result<Self> {
        let actions = args
            .iter()
            .map(|arg| ActionNode::compile(arg, symbols))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { actions })
    }

    /// No actions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run every action in order.
    pub fn run(&self, ctx: &ExecutionContext<'_>, world: &mut World) -> Result<()> {
        for action in &self.actions {
            action.run(ctx, world)?;
        }
        Ok(())
    }
}

/// Run `sequence` as a freshly created object, with `creator` in the
/// creator slot.
pub fn run_post_creation(
    ctx: &ExecutionContext<'_>,
    world: &mut World,
    sequence: &ActionSequence,
    created: ObjectId,
    creator: Option<ObjectId>,
) -> Result<()> {
    if sequence.is_empty() {
        return Ok(());
    }
    let _self = ctx.bind(Slot::SelfObject, Some(created));
    let _creator = ctx.bind(Slot::Creator, creator);
    sequence.run(ctx, world)
}

impl ActionNode {
    /// Compile an argument into an action.
    pub fn compile(arg: &Arg, symbols: &Symbols) -> Result<Self> {
        let Arg::Node(kind, args) = arg else {
            return Err(GameError::malformed(
                FAMILY,
                "<value>",
                format!("expected an action node, found {}", arg.describe()),
            ));
        };
        let mut cur = ArgCursor::new(FAMILY, kind, args);
        let find = |cur: &mut ArgCursor<'_>| -> Result<FinderNode> {
            FinderNode::compile(cur.next()?, symbols)
        };
        let num = |cur: &mut ArgCursor<'_>| -> Result<NumericNode> {
            NumericNode::compile(cur.next()?, symbols)
        };
        let item = |cur: &mut ArgCursor<'_>, op: ItemOp| -> Result<ActionNode> {
            Ok(ActionNode::Item {
                op,
                item: symbols.items.resolve(cur.name()?)?,
                objects: FinderNode::compile(cur.next()?, symbols)?,
                value: NumericNode::compile(cur.next()?, symbols)?,
            })
        };

        let node = match kind.to_ascii_uppercase().as_str() {
            "TRACE" => Self::Trace(cur.name()?.to_string()),
            "TRACE_VALUE" => {
                let message = cur.name()?.to_string();
                Self::TraceValue(message, num(&mut cur)?)
            }
            "SET_ITEM" => item(&mut cur, ItemOp::Set)?,
            "INCREASE_ITEM" => item(&mut cur, ItemOp::Increase)?,
            "DECREASE_ITEM" => item(&mut cur, ItemOp::Decrease)?,
            "UPON_CONDITION" => {
                let condition = num(&mut cur)?;
                let then = ActionSequence::compile(cur.list()?, symbols)?;
                let otherwise = match cur.next_opt() {
                    Some(Arg::List(items)) => ActionSequence::compile(items, symbols)?,
                    Some(other) => {
                        return Err(cur.error(format!(
                            "expected an else list, found {}",
                            other.describe()
                        )))
                    }
                    None => ActionSequence::default(),
                };
                Self::UponCondition {
                    condition,
                    then,
                    otherwise,
                }
            }
            "EXECUTE_ONE_AT_RANDOM" => Self::OneAtRandom(ActionSequence::compile(cur.list()?, symbols)?.actions),
            "EXECUTE_SEQUENCE" => Self::ExecuteSequence {
                sequence: symbols.sequences.resolve(cur.name()?)?,
                objects: find(&mut cur)?,
            },
            "EXECUTE_SEQUENCE_AFTER_DELAY" => Self::ExecuteSequenceAfterDelay {
                sequence: symbols.sequences.resolve(cur.name()?)?,
                objects: find(&mut cur)?,
                delay: num(&mut cur)?,
            },
            "EXECUTE_SEQUENCE_OVER_PERIOD" => Self::ExecuteSequenceOverPeriod {
                sequence: symbols.sequences.resolve(cur.name()?)?,
                objects: find(&mut cur)?,
                period: num(&mut cur)?,
            },
            "SEND_EVENT" => Self::SendEvent {
                event: symbols.events.resolve(cur.name()?)?,
                objects: find(&mut cur)?,
            },
            "ASSIGN_ORDER_VIA" => Self::AssignOrderVia {
                assignment: symbols.assignments.resolve(cur.name()?)?,
                objects: find(&mut cur)?,
            },
            "CANCEL_ORDER" => Self::Order(OrderAction::Cancel, find(&mut cur)?),
            "TERMINATE_ORDER" => Self::Order(OrderAction::Terminate, find(&mut cur)?),
            "TERMINATE_THIS_TASK" => Self::TerminateThisTask,
            "TERMINATE_THIS_ORDER" => Self::TerminateThisOrder,
            "CREATE_OBJECT" => {
                let blueprint = symbols.objects.resolve(cur.name()?)?;
                let parent = find(&mut cur)?;
                let position = PositionNode::compile(cur.next()?, symbols)?;
                let post_creation = match cur.next_opt() {
                    Some(Arg::List(items)) => ActionSequence::compile(items, symbols)?,
                    Some(other) => {
                        return Err(cur.error(format!(
                            "expected a post-creation list, found {}",
                            other.describe()
                        )))
                    }
                    None => ActionSequence::default(),
                };
                Self::CreateObject {
                    blueprint,
                    parent,
                    position,
                    post_creation,
                }
            }
            "REMOVE" => Self::Remove(find(&mut cur)?),
            "TERMINATE" => Self::Terminate(find(&mut cur)?),
            "TRANSFER_CONTROL" => Self::TransferControl {
                objects: find(&mut cur)?,
                recipient: find(&mut cur)?,
            },
            "TELEPORT" => Self::Teleport {
                objects: find(&mut cur)?,
                position: PositionNode::compile(cur.next()?, symbols)?,
            },
            tag @ ("PLAY_ANIMATION" | "PLAY_ANIMATION_ONCE") => Self::PlayAnimation {
                animation: symbols.animations.resolve(cur.name()?)?,
                objects: find(&mut cur)?,
                once: tag == "PLAY_ANIMATION_ONCE",
            },
            "STOP_MOVEMENT" => Self::StopMovement(find(&mut cur)?),
            "DISABLE" => Self::SetDisabled(find(&mut cur)?, true),
            "ENABLE" => Self::SetDisabled(find(&mut cur)?, false),
            _ => {
                tracing::warn!(kind = %kind, "unknown action, compiled as placeholder");
                return Ok(Self::Unknown(kind.clone()));
            }
        };
        cur.finish()?;
        Ok(node)
    }

    /// Run the action.
    pub fn run(&self, ctx: &ExecutionContext<'_>, world: &mut World) -> Result<()> {
        match self {
            Self::Trace(message) => {
                tracing::info!(self_object = ?ctx.self_object(world), "{message}");
            }
            Self::TraceValue(message, value) => {
                let value = value.eval(ctx, world)?;
                tracing::info!(self_object = ?ctx.self_object(world), value, "{message}");
            }
            Self::Item {
                op,
                item,
                objects,
                value,
            } => {
                for id in objects.eval(ctx, world)? {
                    let v = value.eval(ctx, world)?;
                    let new = match op {
                        ItemOp::Set => v,
                        ItemOp::Increase => world.get_item(id, *item) + v,
                        ItemOp::Decrease => world.get_item(id, *item) - v,
                    };
                    world.set_item(id, *item, new);
                }
            }
            Self::UponCondition {
                condition,
                then,
                otherwise,
            } => {
                if condition.eval(ctx, world)? > 0.0 {
                    then.run(ctx, world)?;
                } else {
                    otherwise.run(ctx, world)?;
                }
            }
            Self::OneAtRandom(actions) => {
                if !actions.is_empty() {
                    let pick = world.with_rng(|rng| rng.gen_range(0..actions.len()));
                    actions[pick].run(ctx, world)?;
                }
            }
            Self::ExecuteSequence { sequence, objects } => {
                let body = sequence_body(ctx, *sequence)?;
                let executor = ctx.raw(Slot::SelfObject);
                for id in objects.eval(ctx, world)? {
                    if !world.contains(id) {
                        continue;
                    }
                    let _executor = ctx.bind(Slot::SequenceExecutor, executor);
                    let _self = ctx.bind(Slot::SelfObject, Some(id));
                    body.run(ctx, world)?;
                }
            }
            Self::ExecuteSequenceAfterDelay {
                sequence,
                objects,
                delay,
            } => {
                let selves = objects.eval(ctx, world)?;
                let due = world
                    .now()
                    .saturating_add(time_from_f32(delay.eval(ctx, world)?.max(0.0)));
                let executor = ctx.self_object(world);
                world.scheduler_mut().schedule(
                    due,
                    DelayedSequence {
                        sequence: *sequence,
                        executor,
                        selves,
                    },
                );
            }
            Self::ExecuteSequenceOverPeriod {
                sequence,
                objects,
                period,
            } => {
                let selves = objects.eval(ctx, world)?;
                let period = period.eval(ctx, world)?.max(0.0);
                let executor = ctx.self_object(world);
                let now = world.now();
                let n = selves.len();
                for (i, id) in selves.into_iter().enumerate() {
                    let offset = period * i as f32 / n as f32;
                    world.scheduler_mut().schedule(
                        now.saturating_add(time_from_f32(offset)),
                        DelayedSequence {
                            sequence: *sequence,
                            executor,
                            selves: vec![id],
                        },
                    );
                }
            }
            Self::SendEvent { event, objects } => {
                let sender = ctx.self_object(world);
                for id in objects.eval(ctx, world)? {
                    send_event(ctx, world, id, *event, sender)?;
                }
            }
            Self::AssignOrderVia { assignment, objects } => {
                assign_order_via(ctx, world, *assignment, objects)?;
            }
            Self::Order(action, objects) => {
                let op = match action {
                    OrderAction::Cancel => OrderOp::CancelCurrentOrder,
                    OrderAction::Terminate => OrderOp::TerminateCurrentOrder,
                };
                for id in objects.eval(ctx, world)? {
                    orders::apply(ctx, world, id, op.clone())?;
                }
            }
            Self::TerminateThisTask => {
                if let Some(id) = ctx.self_object(world) {
                    orders::apply(ctx, world, id, OrderOp::TerminateCurrentTask)?;
                }
            }
            Self::TerminateThisOrder => {
                if let Some(id) = ctx.self_object(world) {
                    orders::apply(ctx, world, id, OrderOp::TerminateCurrentOrder)?;
                }
            }
            Self::CreateObject {
                blueprint,
                parent,
                position,
                post_creation,
            } => {
                let bp = ctx.gameset().object_blueprint(*blueprint).ok_or_else(|| {
                    GameError::InvalidState(format!("missing object blueprint {}", blueprint.0))
                })?;
                let parent = parent.eval(ctx, world)?.first().copied();
                if parent.is_none() {
                    tracing::warn!(blueprint = %bp.name, "CREATE_OBJECT without a parent");
                }
                let at = position.eval(ctx, world)?;
                let mut spawn = bp.spawn(*blueprint);
                spawn.parent = parent;
                spawn.position = at.position;
                spawn.orientation = at.rotation;
                let creator = ctx.self_object(world);
                spawn.creator = creator;
                let created = world.create_object(spawn);
                run_post_creation(ctx, world, post_creation, created, creator)?;
            }
            Self::Remove(objects) => {
                for id in objects.eval(ctx, world)? {
                    world.remove_object(id);
                }
            }
            Self::Terminate(objects) => {
                for id in objects.eval(ctx, world)? {
                    world.set_terminated(id, true);
                }
            }
            Self::TransferControl { objects, recipient } => {
                let Some(recipient) = recipient.eval(ctx, world)?.first().copied() else {
                    tracing::warn!("TRANSFER_CONTROL with no recipient, skipped");
                    return Ok(());
                };
                for id in objects.eval(ctx, world)? {
                    world.set_parent(id, recipient);
                }
            }
            Self::Teleport { objects, position } => {
                let OrientedPosition { position, rotation } = position.eval(ctx, world)?;
                for id in objects.eval(ctx, world)? {
                    world.stop_movement(id);
                    world.set_position(id, position);
                    world.set_orientation(id, rotation);
                }
            }
            Self::PlayAnimation {
                animation,
                objects,
                once,
            } => {
                for id in objects.eval(ctx, world)? {
                    world.set_animation(id, Some(*animation), *once, None);
                }
            }
            Self::StopMovement(objects) => {
                for id in objects.eval(ctx, world)? {
                    world.stop_movement(id);
                }
            }
            Self::SetDisabled(objects, disabled) => {
                for id in objects.eval(ctx, world)? {
                    world.set_disabled(id, *disabled);
                }
            }
            Self::Unknown(kind) => {
                tracing::error!(kind = %kind, "unknown action run");
                return Err(GameError::UnknownNode {
                    family: FAMILY,
                    kind: kind.clone(),
                });
            }
        }
        Ok(())
    }
}

fn sequence_body<'g>(ctx: &ExecutionContext<'g>, id: SequenceId) -> Result<&'g ActionSequence> {
    ctx.gameset().sequence(id).ok_or_else(|| GameError::UnresolvedReference {
        category: "action sequence",
        name: format!("#{}", id.0),
    })
}

/// Give each assignee the assignment's order.
///
/// Targets are evaluated once. Without distribution every assignee gets the
/// first target; with it, assignees and targets are both taken in ascending
/// id order and assignee `i` gets target `i mod n`.
pub(crate) fn assign_order_via(
    ctx: &ExecutionContext<'_>,
    world: &mut World,
    assignment: OrderAssignmentId,
    objects: &FinderNode,
) -> Result<()> {
    let bp = ctx.gameset().assignment(assignment).ok_or_else(|| {
        GameError::InvalidState(format!("missing order assignment {}", assignment.0))
    })?;
    let mut assignees = objects.eval(ctx, world)?;
    let mut targets = match &bp.target {
        Some(finder) => finder.eval(ctx, world)?,
        None => Vec::new(),
    };
    if bp.distribute {
        assignees.sort_unstable();
        targets.sort_unstable();
    }
    let giver = ctx.self_object(world);
    for (i, id) in assignees.into_iter().enumerate() {
        let target = if bp.distribute && !targets.is_empty() {
            Some(targets[i % targets.len()])
        } else {
            targets.first().copied()
        };
        let request = OrderRequest::new(bp.order, bp.mode)
            .with_target(target)
            .given_by(giver);
        orders::assign(ctx, world, id, request)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::gameset::GameSet;
    use crate::world::{ObjectClass, ObjectSpawn};

    fn gameset() -> GameSet {
        let mut gs = GameSet::default();
        gs.symbols.items.declare("Gold").unwrap();
        gs
    }

    fn compile(gs: &GameSet, arg: Arg) -> ActionNode {
        ActionNode::compile(&arg, gs.symbols()).unwrap()
    }

    fn me() -> Arg {
        Arg::node("SELF", vec![])
    }

    #[test]
    fn test_item_actions() {
        let gs = gameset();
        let gold = gs.item_named("Gold").unwrap();
        let mut world = World::new(&SimulationConfig::default());
        let id = world.spawn_bare(ObjectClass::Character);
        let ctx = ExecutionContext::new(&gs);
        let _self = ctx.bind(Slot::SelfObject, Some(id));
        let seq = ActionSequence {
            actions: vec![
                compile(&gs, Arg::node("SET_ITEM", vec![Arg::name("Gold"), me(), Arg::Num(10.0)])),
                compile(&gs, Arg::node("INCREASE_ITEM", vec![Arg::name("Gold"), me(), Arg::Num(5.0)])),
                compile(&gs, Arg::node("DECREASE_ITEM", vec![Arg::name("Gold"), me(), Arg::Num(3.0)])),
            ],
        };
        seq.run(&ctx, &mut world).unwrap();
        assert_eq!(world.get_item(id, gold), 12.0);
    }

    #[test]
    fn test_upon_condition_branches() {
        let gs = gameset();
        let gold = gs.item_named("Gold").unwrap();
        let mut world = World::new(&SimulationConfig::default());
        let id = world.spawn_bare(ObjectClass::Character);
        let ctx = ExecutionContext::new(&gs);
        let _self = ctx.bind(Slot::SelfObject, Some(id));
        let set = |v: f32| Arg::node("SET_ITEM", vec![Arg::name("Gold"), me(), Arg::Num(v)]);
        let action = compile(
            &gs,
            Arg::node(
                "UPON_CONDITION",
                vec![Arg::Num(0.0), Arg::List(vec![set(1.0)]), Arg::List(vec![set(2.0)])],
            ),
        );
        action.run(&ctx, &mut world).unwrap();
        assert_eq!(world.get_item(id, gold), 2.0);
    }

    #[test]
    fn test_empty_finder_is_noop() {
        let gs = gameset();
        let mut world = World::new(&SimulationConfig::default());
        let ctx = ExecutionContext::new(&gs);
        let action = compile(
            &gs,
            Arg::node("SET_ITEM", vec![Arg::name("Gold"), Arg::node("NOTHING", vec![]), Arg::Num(1.0)]),
        );
        action.run(&ctx, &mut world).unwrap();
        assert!(world.notifications().is_empty());
    }

    #[test]
    fn test_transfer_without_recipient_is_skipped() {
        let gs = gameset();
        let mut world = World::new(&SimulationConfig::default());
        let id = world.spawn_bare(ObjectClass::Character);
        let ctx = ExecutionContext::new(&gs);
        let _self = ctx.bind(Slot::SelfObject, Some(id));
        let action = compile(
            &gs,
            Arg::node("TRANSFER_CONTROL", vec![me(), Arg::node("NOTHING", vec![])]),
        );
        assert!(action.run(&ctx, &mut world).is_ok());
        assert_eq!(world.get(id).unwrap().parent, None);
    }

    #[test]
    fn test_unknown_action_fails_when_run() {
        let gs = gameset();
        let mut world = World::new(&SimulationConfig::default());
        let ctx = ExecutionContext::new(&gs);
        let action = compile(&gs, Arg::node("SUMMON_DRAGON", vec![]));
        let err = action.run(&ctx, &mut world).unwrap_err();
        assert!(matches!(err, GameError::UnknownNode { family: "action", .. }));
    }

    #[test]
    fn test_unresolved_item_is_load_error() {
        let gs = gameset();
        let err = ActionNode::compile(
            &Arg::node("SET_ITEM", vec![Arg::name("Silver"), me(), Arg::Num(1.0)]),
            gs.symbols(),
        )
        .unwrap_err();
        assert!(matches!(err, GameError::UnresolvedReference { category: "item", .. }));
    }

    #[test]
    fn test_disable_and_remove() {
        let gs = gameset();
        let mut world = World::new(&SimulationConfig::default());
        let id = world.create_object(ObjectSpawn::of_class(ObjectClass::Character));
        let ctx = ExecutionContext::new(&gs);
        let _self = ctx.bind(Slot::SelfObject, Some(id));
        compile(&gs, Arg::node("DISABLE", vec![me()])).run(&ctx, &mut world).unwrap();
        assert!(world.get(id).unwrap().disabled);
        compile(&gs, Arg::node("REMOVE", vec![me()])).run(&ctx, &mut world).unwrap();
        assert!(!world.contains(id));
    }
}
