//! Test fixtures and helpers.
//!
//! Expression builders, a programmatic gameset builder, and the bundled
//! "gather" gameset and scenario used by determinism tests, benchmarks and
//! the CLI tests.

use std::sync::Arc;

use fixed::types::I32F32;
use rts_behavior::gameset::defs::{
    CommandDef, EquationDef, GameSetDef, ObjectDef, OrderAssignmentDef, OrderDef, ReactionDef,
    SequenceDef, TaskDef,
};
use rts_behavior::prelude::*;

/// Gameset in which peasants mine gold and carry it to a depot.
pub const GATHER_GAMESET: &str = include_str!("../data/gather.gameset.ron");

/// Scenario for [`GATHER_GAMESET`]: one mine, one depot, two peasants.
pub const GATHER_SCENARIO: &str = include_str!("../data/gather.scenario.ron");

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// `Node(kind, args)`.
#[must_use]
pub fn node(kind: &str, args: Vec<Arg>) -> Arg {
    Arg::node(kind, args)
}

/// `Name(name)`.
#[must_use]
pub fn name(name: &str) -> Arg {
    Arg::name(name)
}

/// `Num(value)`.
#[must_use]
pub fn num(value: f32) -> Arg {
    Arg::Num(value)
}

/// A slot finder such as `SELF` or `TARGET`.
#[must_use]
pub fn slot(tag: &str) -> Arg {
    Arg::node(tag, vec![])
}

/// `ITEM_VALUE(item, of)`.
#[must_use]
pub fn item_of(item: &str, of: Arg) -> Arg {
    node("ITEM_VALUE", vec![name(item), of])
}

/// `SET_ITEM(item, SELF, value)`.
#[must_use]
pub fn set_own_item(item: &str, value: f32) -> Arg {
    node("SET_ITEM", vec![name(item), slot("SELF"), num(value)])
}

/// `INCREASE_ITEM(item, SELF, value)`.
#[must_use]
pub fn bump_own_item(item: &str, value: f32) -> Arg {
    node("INCREASE_ITEM", vec![name(item), slot("SELF"), num(value)])
}

/// Fluent builder over [`GameSetDef`].
///
/// ```
/// use rts_test_utils::fixtures::{bump_own_item, GameSetBuilder};
///
/// let gs = GameSetBuilder::new()
///     .items(&["Count"])
///     .character("Peasant", 2.0)
///     .sequence("Bump", vec![bump_own_item("Count", 1.0)])
///     .build();
/// assert!(gs.item_named("count").is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct GameSetBuilder {
    def: GameSetDef,
}

impl GameSetBuilder {
    /// Empty ruleset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare items.
    #[must_use]
    pub fn items(mut self, names: &[&str]) -> Self {
        self.def.items.extend(names.iter().map(|n| (*n).to_string()));
        self
    }

    /// Declare events.
    #[must_use]
    pub fn events(mut self, names: &[&str]) -> Self {
        self.def.events.extend(names.iter().map(|n| (*n).to_string()));
        self
    }

    /// Declare animations.
    #[must_use]
    pub fn animations(mut self, names: &[&str]) -> Self {
        self.def
            .animations
            .extend(names.iter().map(|n| (*n).to_string()));
        self
    }

    /// Add an equation.
    #[must_use]
    pub fn equation(mut self, name: &str, body: Arg) -> Self {
        self.def.equations.push(EquationDef {
            name: name.to_string(),
            body,
        });
        self
    }

    /// Add a named sequence.
    #[must_use]
    pub fn sequence(mut self, name: &str, actions: Vec<Arg>) -> Self {
        self.def.sequences.push(SequenceDef {
            name: name.to_string(),
            actions,
        });
        self
    }

    /// Add an object blueprint.
    #[must_use]
    pub fn object(mut self, object: ObjectDef) -> Self {
        self.def.objects.push(object);
        self
    }

    /// Add a character blueprint with a speed and nothing else.
    #[must_use]
    pub fn character(self, name: &str, speed: f32) -> Self {
        self.object(ObjectDef {
            name: name.to_string(),
            class: ObjectClass::Character,
            speed,
            ..Default::default()
        })
    }

    /// Add a task blueprint.
    #[must_use]
    pub fn task(mut self, task: TaskDef) -> Self {
        self.def.tasks.push(task);
        self
    }

    /// Add an order blueprint.
    #[must_use]
    pub fn order(mut self, order: OrderDef) -> Self {
        self.def.orders.push(order);
        self
    }

    /// Add a plain linear order over named tasks.
    #[must_use]
    pub fn simple_order(self, name: &str, tasks: &[&str]) -> Self {
        self.order(OrderDef {
            name: name.to_string(),
            tasks: tasks.iter().map(|t| (*t).to_string()).collect(),
            ..Default::default()
        })
    }

    /// Add an order assignment.
    #[must_use]
    pub fn assignment(mut self, assignment: OrderAssignmentDef) -> Self {
        self.def.order_assignments.push(assignment);
        self
    }

    /// Add a command.
    #[must_use]
    pub fn command(mut self, command: CommandDef) -> Self {
        self.def.commands.push(command);
        self
    }

    /// Add a reaction.
    #[must_use]
    pub fn reaction(mut self, reaction: ReactionDef) -> Self {
        self.def.reactions.push(reaction);
        self
    }

    /// The definition built so far.
    #[must_use]
    pub fn def(&self) -> &GameSetDef {
        &self.def
    }

    /// Compile, returning content errors.
    pub fn try_build(&self) -> Result<GameSet> {
        GameSet::from_def(&self.def)
    }

    /// Compile, panicking on content errors.
    ///
    /// # Panics
    ///
    /// Panics if the ruleset does not compile.
    #[must_use]
    pub fn build(&self) -> Arc<GameSet> {
        match self.try_build() {
            Ok(gs) => Arc::new(gs),
            Err(err) => panic!("fixture gameset failed to compile: {err}"),
        }
    }
}

/// A simulation with the default config and seed 42.
#[must_use]
pub fn new_simulation(gameset: Arc<GameSet>) -> Simulation {
    let config = SimulationConfig {
        seed: 42,
        ..Default::default()
    };
    Simulation::new(gameset, config)
}

/// Spawn an object of a named blueprint under the level.
///
/// # Panics
///
/// Panics if the blueprint does not exist.
pub fn spawn_named(sim: &mut Simulation, blueprint: &str, x: f32, z: f32) -> ObjectId {
    let Some(bp) = sim.gameset().object_blueprint_named(blueprint) else {
        panic!("no object blueprint named {blueprint}");
    };
    match sim.spawn(bp, None, Vec3::new(x, 0.0, z)) {
        Ok(id) => id,
        Err(err) => panic!("spawn of {blueprint} failed: {err}"),
    }
}

/// The compiled gather gameset.
///
/// # Panics
///
/// Panics if the bundled gameset does not compile.
#[must_use]
pub fn gather_gameset() -> Arc<GameSet> {
    match GameSet::from_ron_str(GATHER_GAMESET) {
        Ok(gs) => Arc::new(gs),
        Err(err) => panic!("bundled gather gameset failed to compile: {err}"),
    }
}

/// The gather scenario installed into a fresh simulation.
///
/// # Panics
///
/// Panics if the bundled scenario does not install.
#[must_use]
pub fn gather_simulation() -> (Simulation, Scenario) {
    let mut sim = new_simulation(gather_gameset());
    let def = match ScenarioDef::from_ron_str(GATHER_SCENARIO) {
        Ok(def) => def,
        Err(err) => panic!("bundled gather scenario failed to parse: {err}"),
    };
    match Scenario::install(&def, &mut sim) {
        Ok(scenario) => (sim, scenario),
        Err(err) => panic!("bundled gather scenario failed to install: {err}"),
    }
}

/// A larger gather world: one mine and depot per player, `peasants`
/// peasants each, all told to gather.
///
/// # Panics
///
/// Panics if the bundled gameset does not compile.
#[must_use]
pub fn crowded_gather_simulation(players: usize, peasants: usize) -> Simulation {
    let gs = gather_gameset();
    let gather = gs.order_named("Gather");
    let mut sim = new_simulation(Arc::clone(&gs));
    for p in 0..players {
        let player = sim.create_player();
        let base_x = 60.0 * p as f32 + 20.0;
        let spawn = |sim: &mut Simulation, name: &str, x: f32, z: f32| {
            let bp = gs.object_blueprint_named(name);
            bp.and_then(|bp| sim.spawn(bp, Some(player), Vec3::new(x, 0.0, z)).ok())
        };
        spawn(&mut sim, "Mine", base_x + 20.0, 40.0);
        spawn(&mut sim, "Depot", base_x, 20.0);
        for i in 0..peasants {
            let Some(unit) = spawn(&mut sim, "Peasant", base_x + (i % 8) as f32, 25.0 + (i / 8) as f32)
            else {
                continue;
            };
            if let Some(order) = gather {
                let _ = sim.assign_order(unit, OrderRequest::new(order, AssignMode::DoLast));
            }
        }
    }
    sim
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_gameset_compiles() {
        let gs = gather_gameset();
        assert!(gs.order_named("gather").is_some());
        assert!(gs.command_named("rest").is_some());
    }

    #[test]
    fn test_bundled_scenario_installs() {
        let (sim, scenario) = gather_simulation();
        let alice = scenario.object("alice").unwrap();
        assert_eq!(sim.world().order_count(alice), 1);
        assert!(scenario.object("bob").is_some());
    }

    #[test]
    fn test_builder_reports_unresolved() {
        let err = GameSetBuilder::new()
            .simple_order("Go", &["Nowhere"])
            .try_build()
            .unwrap_err();
        assert!(matches!(err, GameError::UnresolvedReference { .. }));
    }
}
