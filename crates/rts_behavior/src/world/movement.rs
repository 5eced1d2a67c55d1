//! Straight-line movement.
//!
//! Movement is described by its start point, destination, start time and
//! speed, so any observer can compute the position at any time without
//! per-tick position updates crossing the wire.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, time_to_f32, GameTime, Vec3};

/// Movement state of one object.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Movement {
    moving: bool,
    start: Vec3,
    destination: Vec3,
    #[serde(with = "fixed_serde")]
    start_time: GameTime,
    speed: f32,
}

impl Movement {
    /// Begin moving from `start` to `destination`.
    pub fn start(&mut self, start: Vec3, destination: Vec3, now: GameTime, speed: f32) {
        *self = Self {
            moving: true,
            start,
            destination,
            start_time: now,
            speed,
        };
    }

    /// Stop wherever the object currently is.
    pub fn stop(&mut self) {
        self.moving = false;
    }

    /// Whether a movement is in progress.
    #[must_use]
    pub const fn is_moving(&self) -> bool {
        self.moving
    }

    /// Destination of the current (or last) movement.
    #[must_use]
    pub const fn destination(&self) -> Vec3 {
        self.destination
    }

    /// Unit direction of travel on the ground plane.
    #[must_use]
    pub fn direction(&self) -> Vec3 {
        (self.destination - self.start).normalize_xz()
    }

    /// Velocity vector, zero when not moving.
    #[must_use]
    pub fn velocity(&self) -> Vec3 {
        if self.moving {
            self.direction() * self.speed
        } else {
            Vec3::ZERO
        }
    }

    /// Position along the path at time `now`, and whether it has arrived.
    #[must_use]
    pub fn position_at(&self, now: GameTime) -> (Vec3, bool) {
        let total = self.start.distance_xz(self.destination);
        let elapsed = time_to_f32(now - self.start_time).max(0.0);
        let travelled = self.speed * elapsed;
        if travelled >= total || total == 0.0 {
            return (self.destination, true);
        }
        (self.start + self.direction() * travelled, false)
    }
}
