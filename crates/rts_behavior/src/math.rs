//! Math utilities for the behavior runtime.
//!
//! Simulation time is fixed-point so that periodic triggers and delayed
//! sequences accumulate exactly, tick after tick. Spatial values produced by
//! gameset evaluators are `f32`, matching the precision designers author
//! them in.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for simulation time.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Simulation time in seconds.
pub type GameTime = Fixed;

/// Convert an evaluator result into simulation time.
///
/// Values outside the representable range saturate, so an oversized
/// delay or period never comes due. NaN reads as zero.
#[must_use]
pub fn time_from_f32(value: f32) -> GameTime {
    if value.is_nan() {
        return GameTime::ZERO;
    }
    GameTime::saturating_from_num(value)
}

/// Convert simulation time into an evaluator value.
#[must_use]
pub fn time_to_f32(time: GameTime) -> f32 {
    time.to_num::<f32>()
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// 3D vector in world space. Y is up; the ground plane is XZ.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    /// X coordinate.
    pub x: f32,
    /// Y coordinate (height).
    pub y: f32,
    /// Z coordinate.
    pub z: f32,
}

impl Vec3 {
    /// Zero vector.
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Create a new vector.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Squared length.
    #[must_use]
    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Length.
    #[must_use]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }

    /// Distance on the ground plane, ignoring height.
    #[must_use]
    pub fn distance_xz(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        (dx * dx + dz * dz).sqrt()
    }

    /// Unit vector in the same direction, or zero for a zero vector.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == 0.0 {
            return Self::ZERO;
        }
        self * (1.0 / len)
    }

    /// Unit vector on the ground plane (Y dropped), or zero.
    #[must_use]
    pub fn normalize_xz(self) -> Self {
        Self::new(self.x, 0.0, self.z).normalize()
    }

    /// Heading angle (radians around Y) of this direction.
    ///
    /// Zero faces -Z, matching the rotation used by [`Vec3::from_heading`].
    #[must_use]
    pub fn heading(self) -> f32 {
        self.x.atan2(-self.z)
    }

    /// Unit vector on the ground plane for a heading angle.
    #[must_use]
    pub fn from_heading(angle: f32) -> Self {
        Self::new(angle.sin(), 0.0, -angle.cos())
    }

    /// Rotate around the Y axis by `angle` radians.
    #[must_use]
    pub fn rotate_y(self, angle: f32) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(
            self.x * cos - self.z * sin,
            self.y,
            self.x * sin + self.z * cos,
        )
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl std::ops::Div<f32> for Vec3 {
    type Output = Self;

    fn div(self, rhs: f32) -> Self::Output {
        Self::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

/// A position together with an orientation, the result type of position
/// evaluators.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OrientedPosition {
    /// World position.
    pub position: Vec3,
    /// Euler rotation in radians; `y` is the heading.
    pub rotation: Vec3,
}

impl OrientedPosition {
    /// Identity: origin, no rotation. The fallback for empty anchors.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Vec3::ZERO,
    };

    /// Position without rotation.
    #[must_use]
    pub const fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: Vec3::ZERO,
        }
    }

    /// Position facing a heading.
    #[must_use]
    pub const fn facing(position: Vec3, heading: f32) -> Self {
        Self {
            position,
            rotation: Vec3::new(0.0, heading, 0.0),
        }
    }

    /// Heading angle.
    #[must_use]
    pub const fn heading(&self) -> f32 {
        self.rotation.y
    }
}
