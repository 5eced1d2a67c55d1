//! Core simulation loop.
//!
//! A [`Simulation`] owns the shared [`GameSet`] and the [`World`] and
//! advances both at a fixed tick rate. Each tick runs the same steps in the
//! same order, so two simulations fed identical inputs stay identical.
//!
//! # Tick order
//!
//! 1. **Clock** - advance simulation time by one tick
//! 2. **Movement** - move every moving object to its position at the new time
//! 3. **Delayed sequences** - run every scheduled sequence now due
//! 4. **Orders** - process each object's order queue in ascending id order,
//!    sending `ON_IDLE` to objects that just ran out of work
//! 5. **Notifications** - collect every state change into [`TickEvents`]
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use rts_behavior::prelude::*;
//!
//! let gameset = Arc::new(GameSet::default());
//! let mut sim = Simulation::new(gameset, SimulationConfig::default());
//! let events = sim.tick().unwrap();
//! assert_eq!(sim.get_tick(), 1);
//! assert_eq!(events.tick, 1);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::config::SimulationConfig;
use crate::error::{GameError, Result};
use crate::gameset::{GameSet, ON_IDLE};
use crate::ids::{CommandId, EventId, ObjectBlueprintId, ObjectId, OrderId};
use crate::math::{GameTime, Vec3};
use crate::orders::{self, AssignMode, OrderOp, OrderRequest};
use crate::script::{send_event, ExecutionContext, Slot};
use crate::world::{Notification, ObjectClass, ObjectSpawn, World};

/// Everything observable that happened during one tick.
#[derive(Debug, Clone, Default)]
pub struct TickEvents {
    /// Tick number this batch belongs to.
    pub tick: u64,
    /// Simulation time at the end of the tick.
    pub time: GameTime,
    /// State changes in the order they happened.
    pub notifications: Vec<Notification>,
    /// Objects that went idle this tick.
    pub went_idle: Vec<ObjectId>,
    /// Delayed sequences run this tick.
    pub delayed_sequences_run: usize,
}

/// The behavior simulation.
///
/// The gameset is shared read-only; everything mutable lives in the world.
#[derive(Debug)]
pub struct Simulation {
    gameset: Arc<GameSet>,
    world: World,
    tick: u64,
}

impl Simulation {
    /// Create a simulation containing only the level object.
    #[must_use]
    pub fn new(gameset: Arc<GameSet>, config: SimulationConfig) -> Self {
        let mut world = World::new(&config);
        world.spawn_bare(ObjectClass::Level);
        Self {
            gameset,
            world,
            tick: 0,
        }
    }

    /// Current tick number.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Current simulation time.
    #[must_use]
    pub const fn now(&self) -> GameTime {
        self.world.now()
    }

    /// The ruleset.
    #[must_use]
    pub fn gameset(&self) -> &GameSet {
        &self.gameset
    }

    /// Shared handle to the ruleset.
    #[must_use]
    pub fn gameset_arc(&self) -> Arc<GameSet> {
        Arc::clone(&self.gameset)
    }

    /// The world.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// The world, mutably.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The level object.
    #[must_use]
    pub fn level(&self) -> Option<ObjectId> {
        self.world.level()
    }

    /// An execution context over this simulation's gameset, together with
    /// the world it evaluates against.
    pub fn split(&mut self) -> (ExecutionContext<'_>, &mut World) {
        let depth = self.world.config().max_equation_depth;
        (
            ExecutionContext::with_equation_limit(&self.gameset, depth),
            &mut self.world,
        )
    }

    /// Create a player under the level.
    pub fn create_player(&mut self) -> ObjectId {
        let mut spawn = ObjectSpawn::of_class(ObjectClass::Player);
        spawn.parent = self.world.level();
        self.world.create_object(spawn)
    }

    /// Create an object from a blueprint.
    pub fn spawn(
        &mut self,
        blueprint: ObjectBlueprintId,
        parent: Option<ObjectId>,
        position: Vec3,
    ) -> Result<ObjectId> {
        let bp = self
            .gameset
            .object_blueprint(blueprint)
            .ok_or_else(|| GameError::UnresolvedReference {
                category: "object blueprint",
                name: format!("#{}", blueprint.0),
            })?;
        let mut spawn = bp.spawn(blueprint).at(position);
        spawn.parent = parent.or_else(|| self.world.level());
        Ok(self.world.create_object(spawn))
    }

    /// Queue an order on an object.
    pub fn assign_order(
        &mut self,
        object: ObjectId,
        request: OrderRequest,
    ) -> Result<Option<OrderId>> {
        let (ctx, world) = self.split();
        orders::assign(&ctx, world, object, request)
    }

    /// Cancel, terminate or otherwise act on an object's current order.
    pub fn apply_order_op(&mut self, object: ObjectId, op: OrderOp) -> Result<Option<OrderId>> {
        let (ctx, world) = self.split();
        orders::apply(&ctx, world, object, op)
    }

    /// Execute a player command on `object`.
    ///
    /// The command's start sequence runs with self bound to `object` and
    /// both the selected-object and target slots bound to `target`; then
    /// its order, if any, is assigned with `mode` and `target`.
    pub fn execute_command(
        &mut self,
        command: CommandId,
        object: ObjectId,
        target: Option<ObjectId>,
        mode: AssignMode,
    ) -> Result<Option<OrderId>> {
        let gameset = Arc::clone(&self.gameset);
        let Some(blueprint) = gameset.command(command) else {
            return Err(GameError::UnresolvedReference {
                category: "command",
                name: format!("#{}", command.0),
            });
        };
        if !self.world.contains(object) {
            tracing::warn!(object = %object, command = %blueprint.name, "command for missing object");
            return Ok(None);
        }
        tracing::debug!(object = %object, command = %blueprint.name, ?target, "executing command");

        let (ctx, world) = self.split();
        let _self = ctx.bind(Slot::SelfObject, Some(object));
        let _selected = ctx.bind(Slot::SelectedObject, target);
        let _target = ctx.bind(Slot::Target, target);
        blueprint.start_sequence.run(&ctx, world)?;
        let Some(order) = blueprint.order else {
            return Ok(None);
        };
        let request = OrderRequest::new(order, mode)
            .with_target(target)
            .given_by(Some(object));
        orders::assign(&ctx, world, object, request)
    }

    /// Deliver an event to an object.
    pub fn send_event(
        &mut self,
        object: ObjectId,
        event: EventId,
        sender: Option<ObjectId>,
    ) -> Result<()> {
        let (ctx, world) = self.split();
        send_event(&ctx, world, object, event, sender)
    }

    /// Advance the simulation by one tick.
    ///
    /// A fatal content error aborts the tick and is returned; the world is
    /// left as it was at the point of failure.
    pub fn tick(&mut self) -> Result<TickEvents> {
        let dt = self.world.config().tick_duration();
        self.world.advance_clock(dt);
        self.world.update_movements();

        let mut events = TickEvents::default();
        if let Err(err) = self.run_tick_systems(&mut events) {
            tracing::error!(tick = self.tick + 1, error = %err, "tick aborted");
            return Err(err);
        }

        self.tick += 1;
        events.tick = self.tick;
        events.time = self.world.now();
        events.notifications = self.world.drain_notifications();

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        Ok(events)
    }

    /// Run `count` ticks, returning each tick's events.
    pub fn run(&mut self, count: u64) -> Result<Vec<TickEvents>> {
        (0..count).map(|_| self.tick()).collect()
    }

    fn run_tick_systems(&mut self, events: &mut TickEvents) -> Result<()> {
        events.delayed_sequences_run = self.run_delayed_sequences()?;
        events.went_idle = self.run_order_system()?;
        Ok(())
    }

    fn run_delayed_sequences(&mut self) -> Result<usize> {
        let cap = self.world.config().max_delayed_per_tick as usize;
        let (ctx, world) = self.split();
        let now = world.now();
        let mut ran = 0;
        while ran < cap {
            let Some((_, record)) = world.scheduler_mut().pop_due(now) else {
                return Ok(ran);
            };
            ran += 1;
            let Some(sequence) = ctx.gameset().sequence(record.sequence) else {
                return Err(GameError::UnresolvedReference {
                    category: "action sequence",
                    name: format!("#{}", record.sequence.0),
                });
            };
            let _executor = ctx.bind(Slot::SequenceExecutor, record.executor);
            for object in record.selves {
                if !world.contains(object) {
                    continue;
                }
                let _self = ctx.bind(Slot::SelfObject, Some(object));
                sequence.run(&ctx, world)?;
            }
        }
        if world.scheduler().has_due(now) {
            tracing::debug!(cap, "delayed sequence cap reached, rest run next tick");
        }
        Ok(ran)
    }

    fn run_order_system(&mut self) -> Result<Vec<ObjectId>> {
        let (ctx, world) = self.split();
        let mut went_idle = Vec::new();
        for id in world.sorted_ids() {
            if !world.contains(id) {
                continue;
            }
            orders::with_orders(&ctx, world, id, |orders, world| {
                orders.process(&ctx, world, id)
            })?;
            let idle = world.get_mut(id).is_some_and(|o| o.orders.idle_edge());
            if idle {
                tracing::debug!(object = %id, "object went idle");
                world.notify(Notification::Idle { object: id });
                send_event(&ctx, world, id, ON_IDLE, None)?;
                went_idle.push(id);
            }
        }
        Ok(went_idle)
    }

    /// Hash of simulation-visible state, for desync detection.
    ///
    /// Two simulations with identical state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);
        self.world.state_hash().hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gameset::defs::{
        CommandDef, GameSetDef, ObjectDef, OrderDef, SequenceDef, TaskDef, TaskKindDef,
    };
    use crate::math::Fixed;
    use crate::script::Arg;

    fn node(kind: &str, args: Vec<Arg>) -> Arg {
        Arg::node(kind, args)
    }

    fn gameset() -> Arc<GameSet> {
        let def = GameSetDef {
            items: vec!["Count".into()],
            objects: vec![ObjectDef {
                name: "Peasant".into(),
                class: ObjectClass::Character,
                speed: 2.0,
                ..Default::default()
            }],
            sequences: vec![SequenceDef {
                name: "Bump".into(),
                actions: vec![node(
                    "INCREASE_ITEM",
                    vec![Arg::name("Count"), node("SELF", vec![]), Arg::Num(1.0)],
                )],
            }],
            tasks: vec![TaskDef {
                name: "Turn".into(),
                kind: TaskKindDef::FaceTowards,
                ..Default::default()
            }],
            orders: vec![OrderDef {
                name: "Look".into(),
                tasks: vec!["Turn".into()],
                ..Default::default()
            }],
            commands: vec![CommandDef {
                name: "LookAt".into(),
                start_sequence: vec![node(
                    "EXECUTE_SEQUENCE",
                    vec![Arg::name("Bump"), node("SELF", vec![])],
                )],
                order: Some("Look".into()),
            }],
            ..Default::default()
        };
        Arc::new(GameSet::from_def(&def).unwrap())
    }

    #[test]
    fn test_new_has_level() {
        let sim = Simulation::new(gameset(), SimulationConfig::default());
        assert_eq!(sim.get_tick(), 0);
        let level = sim.level().unwrap();
        assert_eq!(sim.world().get(level).unwrap().class, ObjectClass::Level);
    }

    #[test]
    fn test_tick_advances_time() {
        let config = SimulationConfig {
            tick_rate: 4,
            ..Default::default()
        };
        let mut sim = Simulation::new(gameset(), config);
        sim.run(2).unwrap();
        assert_eq!(sim.get_tick(), 2);
        assert_eq!(sim.now(), Fixed::from_num(0.5));
    }

    #[test]
    fn test_execute_command_runs_sequence_and_assigns_order() {
        let gs = gameset();
        let mut sim = Simulation::new(Arc::clone(&gs), SimulationConfig::default());
        let peasant = sim
            .spawn(gs.object_blueprint_named("Peasant").unwrap(), None, Vec3::ZERO)
            .unwrap();
        let count = gs.item_named("Count").unwrap();
        let command = gs.command_named("LookAt").unwrap();

        let order = sim
            .execute_command(command, peasant, None, AssignMode::DoLast)
            .unwrap();
        assert!(order.is_some());
        assert_eq!(sim.world().get_item(peasant, count), 1.0);
        assert_eq!(sim.world().order_count(peasant), 1);

        // The single face-towards task finishes on its first update.
        let events = sim.tick().unwrap();
        assert_eq!(events.went_idle, vec![peasant]);
        assert!(events
            .notifications
            .contains(&Notification::Idle { object: peasant }));
        let events = sim.tick().unwrap();
        assert!(events.went_idle.is_empty());
    }

    #[test]
    fn test_command_on_missing_object_is_skipped() {
        let gs = gameset();
        let mut sim = Simulation::new(Arc::clone(&gs), SimulationConfig::default());
        let command = gs.command_named("LookAt").unwrap();
        let result = sim
            .execute_command(command, ObjectId(999), None, AssignMode::DoLast)
            .unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_identical_inputs_hash_identically() {
        let gs = gameset();
        let run = || {
            let mut sim = Simulation::new(Arc::clone(&gs), SimulationConfig::default());
            let bp = gs.object_blueprint_named("Peasant").unwrap();
            let a = sim.spawn(bp, None, Vec3::ZERO).unwrap();
            let _ = sim.world_mut().start_movement(a, Vec3::new(10.0, 0.0, 0.0));
            sim.run(10).unwrap();
            sim.state_hash()
        };
        assert_eq!(run(), run());
    }
}
