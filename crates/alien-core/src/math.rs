//! 2D vector math.
//!
//! The engine works in a mirrored (screen) coordinate system: `y` grows
//! downwards, angles are measured in degrees with 0° pointing up (−y) and
//! growing clockwise. Every angle crossing the API is in degrees; conversion
//! to radians happens right before a trigonometric call and back right after.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// Values with an absolute value at or below this are treated as zero.
pub const ALIEN_PRECISION: f64 = 0.000_000_1;

pub const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;
pub const RAD_TO_DEG: f64 = 180.0 / std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn dot(&self, other: &Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Third component of the 3D cross product `self × other`.
    pub fn cross(&self, other: &Vec2) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn length_squared(&self) -> f64 {
        self.dot(self)
    }

    pub fn length(&self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Unit vector in the same direction, or the zero vector if the length is
    /// within `ALIEN_PRECISION`.
    pub fn normalized(&self) -> Vec2 {
        let len = self.length();
        if len <= ALIEN_PRECISION {
            Vec2::ZERO
        } else {
            *self / len
        }
    }

    /// Quarter turn used to turn a lever arm into a tangential direction:
    /// `(x, y) -> (y, -x)`.
    pub fn rotate_quarter_ccw(&self) -> Vec2 {
        Vec2::new(self.y, -self.x)
    }

    /// Rotate by `angle` degrees (clockwise on screen).
    pub fn rotated(&self, angle: f64) -> Vec2 {
        let (sin, cos) = (angle * DEG_TO_RAD).sin_cos();
        Vec2::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    pub fn is_near_zero(&self) -> bool {
        self.length_squared() <= ALIEN_PRECISION * ALIEN_PRECISION
    }
}

/// Angle of `v` in degrees within [0, 360). The zero vector maps to 0°.
pub fn angle_of_vector(v: Vec2) -> f64 {
    let len = v.length();
    if len <= ALIEN_PRECISION {
        return 0.0;
    }
    let angle_sin = (-v.y / len).clamp(-1.0, 1.0).asin() * RAD_TO_DEG;
    let angle = if v.x >= 0.0 {
        90.0 - angle_sin
    } else {
        angle_sin + 270.0
    };
    if angle >= 360.0 {
        angle - 360.0
    } else {
        angle
    }
}

/// Unit vector pointing at `angle` degrees.
pub fn unit_vector_of_angle(angle: f64) -> Vec2 {
    let rad = angle * DEG_TO_RAD;
    Vec2::new(rad.sin(), -rad.cos())
}

/// Map an angle onto (-180, 180].
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % 360.0;
    if a <= -180.0 {
        a += 360.0;
    }
    if a > 180.0 {
        a -= 360.0;
    }
    a
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Vec2) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Mul<Vec2> for f64 {
    type Output = Vec2;

    fn mul(self, rhs: Vec2) -> Vec2 {
        rhs * self
    }
}

impl Div<f64> for Vec2 {
    type Output = Vec2;

    fn div(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;

    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_normalize() {
        let v = Vec2::new(3.0, 4.0).normalized();
        assert_close(v.length(), 1.0);
        assert_eq!(Vec2::new(1e-9, 0.0).normalized(), Vec2::ZERO);
    }

    #[test]
    fn test_quarter_rotation() {
        assert_eq!(Vec2::new(1.0, 2.0).rotate_quarter_ccw(), Vec2::new(2.0, -1.0));
    }

    #[test]
    fn test_angle_of_vector() {
        assert_close(angle_of_vector(Vec2::new(0.0, -1.0)), 0.0);
        assert_close(angle_of_vector(Vec2::new(1.0, 0.0)), 90.0);
        assert_close(angle_of_vector(Vec2::new(0.0, 1.0)), 180.0);
        assert_close(angle_of_vector(Vec2::new(-1.0, 0.0)), 270.0);
        assert_close(angle_of_vector(Vec2::ZERO), 0.0);
    }

    #[test]
    fn test_angle_vector_inverse() {
        for angle in [0.0, 30.0, 90.0, 135.0, 200.0, 359.0] {
            assert_close(angle_of_vector(unit_vector_of_angle(angle)), angle);
        }
    }

    #[test]
    fn test_rotated_matches_angle_convention() {
        let up = unit_vector_of_angle(0.0);
        let v = up.rotated(90.0);
        assert_close(v.x, 1.0);
        assert_close(v.y, 0.0);
    }

    #[test]
    fn test_normalize_angle() {
        assert_close(normalize_angle(270.0), -90.0);
        assert_close(normalize_angle(-190.0), 170.0);
        assert_close(normalize_angle(180.0), 180.0);
    }
}
