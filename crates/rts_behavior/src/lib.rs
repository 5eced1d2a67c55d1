//! # RTS Behavior
//!
//! Deterministic behavior runtime for a data-driven RTS simulation.
//!
//! Designers describe units in a ruleset ("gameset"): expression trees
//! that query the world, action sequences that change it, and orders made
//! of tasks that run across many ticks. This crate compiles a ruleset once
//! into immutable blueprints and runs them against live objects.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No network IO
//! - Randomness only from the world's seeded generator
//! - Fixed-point simulation time
//!
//! ## Crate Structure
//!
//! - [`gameset`] - Ruleset definitions, loader and compiled blueprints
//! - [`script`] - Evaluators, actions, execution context and events
//! - [`orders`] - The order/task/trigger state machine
//! - [`world`] - Simulation objects, spatial index, tiles and notifications
//! - [`simulation`] - Core simulation loop
//! - [`replay`] - Replay logs and notification observers

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod config;
pub mod error;
pub mod gameset;
pub mod ids;
pub mod math;
pub mod orders;
pub mod replay;
pub mod scenario;
pub mod scheduler;
pub mod script;
pub mod simulation;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::SimulationConfig;
    pub use crate::error::{GameError, Result};
    pub use crate::gameset::defs::GameSetDef;
    pub use crate::gameset::{GameSet, ON_IDLE};
    pub use crate::ids::{
        CommandId, EventId, ItemId, ObjectBlueprintId, ObjectId, OrderBlueprintId, OrderId,
    };
    pub use crate::math::{Fixed, GameTime, OrientedPosition, Vec3};
    pub use crate::orders::{AssignMode, OrderOp, OrderRequest};
    pub use crate::replay::{ObserverState, ReplayLog};
    pub use crate::scenario::{Scenario, ScenarioDef};
    pub use crate::script::{Arg, ExecutionContext, Slot};
    pub use crate::simulation::{Simulation, TickEvents};
    pub use crate::world::{Notification, ObjectClass, ObjectSpawn, World};
}
