//! Simulation configuration.
//!
//! Loaded from RON alongside the gameset. Every field has a default so a
//! config file only needs to list what it overrides.
//!
//! # Example RON
//!
//! ```ron
//! SimulationConfig(
//!     tick_rate: 20,
//!     seed: 42,
//!     map_tiles: (64, 64),
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::{Fixed, GameTime};

/// Runtime tuning for one simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Ticks per simulated second.
    pub tick_rate: u32,
    /// Seed for the world's random number generator.
    pub seed: u64,
    /// Edge length of a spatial index cell, in world units.
    pub spatial_cell_size: f32,
    /// Tile map dimensions (width, height) in tiles.
    pub map_tiles: (u32, u32),
    /// Edge length of one tile in world units.
    pub tile_size: f32,
    /// Downward acceleration applied to ballistic tasks.
    pub gravity: f32,
    /// Launch speed used when a missile task does not specify one.
    pub default_missile_speed: f32,
    /// Radius within which a missile counts as having hit an object.
    pub missile_hit_radius: f32,
    /// Maximum nesting of equation references before evaluation aborts.
    pub max_equation_depth: u32,
    /// Upper bound on order operations re-queued while one object is processed.
    pub max_deferred_order_passes: u32,
    /// Upper bound on delayed sequences run in one tick; the rest wait.
    pub max_delayed_per_tick: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate: 20,
            seed: 0,
            spatial_cell_size: 16.0,
            map_tiles: (128, 128),
            tile_size: 5.0,
            gravity: 9.81,
            default_missile_speed: 30.0,
            missile_hit_radius: 1.0,
            max_equation_depth: 64,
            max_deferred_order_passes: 8,
            max_delayed_per_tick: 4096,
        }
    }
}

impl SimulationConfig {
    /// Duration of one tick.
    #[must_use]
    pub fn tick_duration(&self) -> GameTime {
        Fixed::ONE / Fixed::from_num(self.tick_rate.max(1))
    }

    /// Playable extent of the map in world units (x, z).
    #[must_use]
    pub fn map_extent(&self) -> (f32, f32) {
        (
            self.map_tiles.0 as f32 * self.tile_size,
            self.map_tiles.1 as f32 * self.tile_size,
        )
    }

    /// Parse a config from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| GameError::DataParseError {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    /// Load a config from a RON file.
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
