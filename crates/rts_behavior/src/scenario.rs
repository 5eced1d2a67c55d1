//! Scenario files: initial objects, their orders, and scripted commands.
//!
//! ```ron
//! (
//!     objects: [
//!         (key: "red", class: Some(Player)),
//!         (key: "guard", blueprint: Some("Peasant"), parent: Some("red"), position: (10.0, 0.0, 4.0)),
//!     ],
//!     commands: [(tick: 5, command: "Patrol", object: "guard")],
//! )
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::ids::{CommandId, ObjectId};
use crate::math::Vec3;
use crate::orders::{AssignMode, OrderRequest};
use crate::simulation::Simulation;
use crate::world::{ObjectClass, ObjectSpawn};

/// One object placed by a scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioObject {
    /// Name other entries use to refer to this object.
    pub key: String,
    /// Blueprint name; a bare object of `class` when absent.
    pub blueprint: Option<String>,
    /// Class for bare objects.
    pub class: Option<ObjectClass>,
    /// Key of an earlier object; the level when absent.
    pub parent: Option<String>,
    /// Initial position.
    pub position: (f32, f32, f32),
    /// Item overrides.
    pub items: Vec<(String, f32)>,
    /// Orders queued at start.
    pub orders: Vec<ScenarioOrder>,
}

/// An order queued when the scenario is installed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioOrder {
    /// Order name.
    pub order: String,
    /// Queue placement.
    pub mode: AssignMode,
    /// Key of the target object.
    pub target: Option<String>,
}

/// A command executed just before a given tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioCommand {
    /// Simulation tick count at which the command runs.
    pub tick: u64,
    /// Command name.
    pub command: String,
    /// Key of the commanded object.
    pub object: String,
    /// Key of the selected target.
    pub target: Option<String>,
    /// Queue placement of the command's order.
    pub mode: AssignMode,
}

/// A whole scenario file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioDef {
    /// Objects, created in order.
    pub objects: Vec<ScenarioObject>,
    /// Scripted commands.
    pub commands: Vec<ScenarioCommand>,
}

impl ScenarioDef {
    /// Parse a scenario from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| GameError::DataParseError {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    /// Load a scenario file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| GameError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        ron::from_str(&text).map_err(|e| GameError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingCommand {
    tick: u64,
    command: CommandId,
    object: ObjectId,
    target: Option<ObjectId>,
    mode: AssignMode,
}

/// A scenario installed into a simulation.
#[derive(Debug, Clone, Default)]
pub struct Scenario {
    objects: BTreeMap<String, ObjectId>,
    commands: Vec<PendingCommand>,
}

impl Scenario {
    /// Create the scenario's objects in `sim`, queue their orders and
    /// resolve the command script.
    pub fn install(def: &ScenarioDef, sim: &mut Simulation) -> Result<Self> {
        let gameset = sim.gameset_arc();
        let mut scenario = Self::default();

        for entry in &def.objects {
            let parent = match &entry.parent {
                Some(key) => Some(scenario.resolve(key)?),
                None => sim.level(),
            };
            let position = Vec3::new(entry.position.0, entry.position.1, entry.position.2);
            let id = match &entry.blueprint {
                Some(name) => {
                    let bp = gameset.symbols().objects.resolve(name)?;
                    sim.spawn(bp, parent, position)?
                }
                None => {
                    let mut spawn =
                        ObjectSpawn::of_class(entry.class.unwrap_or_default()).at(position);
                    spawn.parent = parent;
                    sim.world_mut().create_object(spawn)
                }
            };
            for (item, value) in &entry.items {
                let item = gameset.symbols().items.resolve(item)?;
                sim.world_mut().set_item(id, item, *value);
            }
            if scenario.objects.insert(entry.key.clone(), id).is_some() {
                return Err(GameError::DuplicateDeclaration {
                    category: "scenario object",
                    name: entry.key.clone(),
                });
            }
        }

        for entry in &def.objects {
            let id = scenario.resolve(&entry.key)?;
            for order in &entry.orders {
                let blueprint = gameset.symbols().orders.resolve(&order.order)?;
                let target = order
                    .target
                    .as_deref()
                    .map(|key| scenario.resolve(key))
                    .transpose()?;
                sim.assign_order(id, OrderRequest::new(blueprint, order.mode).with_target(target))?;
            }
        }

        for command in &def.commands {
            scenario.commands.push(PendingCommand {
                tick: command.tick,
                command: gameset.symbols().commands.resolve(&command.command)?,
                object: scenario.resolve(&command.object)?,
                target: command
                    .target
                    .as_deref()
                    .map(|key| scenario.resolve(key))
                    .transpose()?,
                mode: command.mode,
            });
        }
        scenario.commands.sort_by_key(|c| c.tick);

        tracing::info!(
            objects = scenario.objects.len(),
            commands = scenario.commands.len(),
            "scenario installed"
        );
        Ok(scenario)
    }

    fn resolve(&self, key: &str) -> Result<ObjectId> {
        self.objects
            .get(key)
            .copied()
            .ok_or_else(|| GameError::UnresolvedReference {
                category: "scenario object",
                name: key.to_string(),
            })
    }

    /// Object created for `key`.
    #[must_use]
    pub fn object(&self, key: &str) -> Option<ObjectId> {
        self.objects.get(key).copied()
    }

    /// Execute the commands scheduled for the simulation's current tick
    /// count. Call before [`Simulation::tick`].
    pub fn run_commands(&self, sim: &mut Simulation) -> Result<usize> {
        let now = sim.get_tick();
        let mut ran = 0;
        for c in self.commands.iter().filter(|c| c.tick == now) {
            sim.execute_command(c.command, c.object, c.target, c.mode)?;
            ran += 1;
        }
        Ok(ran)
    }

    /// Run `ticks` ticks, executing scripted commands along the way.
    pub fn play(
        &self,
        sim: &mut Simulation,
        ticks: u64,
    ) -> Result<Vec<crate::simulation::TickEvents>> {
        let mut out = Vec::with_capacity(ticks as usize);
        for _ in 0..ticks {
            self.run_commands(sim)?;
            out.push(sim.tick()?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::SimulationConfig;
    use crate::gameset::GameSet;

    const GAMESET: &str = r#"(
        items: ["Gold"],
        objects: [(name: "Peasant", class: Character, speed: 2.0)],
        sequences: [(name: "Pay", actions: [Node("INCREASE_ITEM", [Name("Gold"), Node("SELF", []), Num(5.0)])])],
        commands: [(name: "Pay", start_sequence: [Node("EXECUTE_SEQUENCE", [Name("Pay"), Node("SELF", [])])])],
    )"#;

    fn sim() -> Simulation {
        let gs = GameSet::from_ron_str(GAMESET).unwrap();
        Simulation::new(Arc::new(gs), SimulationConfig::default())
    }

    #[test]
    fn test_install_and_play() {
        let def = ScenarioDef::from_ron_str(
            r#"(
                objects: [
                    (key: "red", class: Some(Player)),
                    (key: "bob", blueprint: Some("Peasant"), parent: Some("red"), items: [("Gold", 1.0)]),
                ],
                commands: [(tick: 2, command: "Pay", object: "bob")],
            )"#,
        )
        .unwrap();
        let mut sim = sim();
        let scenario = Scenario::install(&def, &mut sim).unwrap();
        let bob = scenario.object("bob").unwrap();
        let red = scenario.object("red").unwrap();
        assert_eq!(sim.world().player_of(bob), Some(red));

        let gold = sim.gameset().item_named("Gold").unwrap();
        scenario.play(&mut sim, 2).unwrap();
        assert_eq!(sim.world().get_item(bob, gold), 1.0);
        scenario.play(&mut sim, 1).unwrap();
        assert_eq!(sim.world().get_item(bob, gold), 6.0);
    }

    #[test]
    fn test_unknown_parent_key() {
        let def = ScenarioDef::from_ron_str(r#"(objects: [(key: "a", parent: Some("nobody"))])"#)
            .unwrap();
        let err = Scenario::install(&def, &mut sim()).unwrap_err();
        assert!(matches!(
            err,
            GameError::UnresolvedReference { category: "scenario object", .. }
        ));
    }
}
