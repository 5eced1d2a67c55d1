//! Ballistic arc math for missile tasks.

use crate::math::Vec3;

/// In-flight state of a missile task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MissileFlight {
    /// Launch point.
    pub origin: Vec3,
    /// Initial velocity.
    pub velocity: Vec3,
    /// Simulation time of launch, in seconds.
    pub launch_time: crate::math::GameTime,
}

/// Initial velocity for a projectile launched at `speed` from `origin` so
/// that its arc passes through `target`.
///
/// Uses the lower of the two solutions of
/// `tan θ = (v² ± √(v⁴ − g(g·d² + 2·h·v²))) / (g·d)`. When the target is out
/// of range the missile is fired at 45°, which is the furthest it can go.
#[must_use]
pub fn launch_velocity(origin: Vec3, target: Vec3, speed: f32, gravity: f32) -> Vec3 {
    let offset = target - origin;
    let flat = Vec3::new(offset.x, 0.0, offset.z);
    let d = flat.length();
    let h = offset.y;
    if d <= f32::EPSILON {
        return Vec3::new(0.0, speed.copysign(h), 0.0);
    }
    let dir = flat / d;
    if gravity <= 0.0 {
        return offset.normalize() * speed;
    }

    let v2 = speed * speed;
    let disc = v2 * v2 - gravity * (gravity * d * d + 2.0 * h * v2);
    let angle = if disc >= 0.0 {
        ((v2 - disc.sqrt()) / (gravity * d)).atan()
    } else {
        std::f32::consts::FRAC_PI_4
    };
    let (sin, cos) = angle.sin_cos();
    dir * (speed * cos) + Vec3::new(0.0, speed * sin, 0.0)
}

/// Position along the arc `t` seconds after launch.
#[must_use]
pub fn position_at(origin: Vec3, velocity: Vec3, gravity: f32, t: f32) -> Vec3 {
    origin + velocity * t - Vec3::new(0.0, 0.5 * gravity * t * t, 0.0)
}

/// Estimated time for a projectile at `speed` to cover the ground distance
/// between two points.
#[must_use]
pub fn flight_time(origin: Vec3, target: Vec3, speed: f32) -> f32 {
    if speed <= 0.0 {
        return 0.0;
    }
    origin.distance_xz(target) / speed
}
