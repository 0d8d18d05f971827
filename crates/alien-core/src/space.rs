//! Toroidal world metric.

use crate::math::Vec2;
use serde::{Deserialize, Serialize};

/// Positions live on a torus of `width` x `height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpaceMetric {
    pub width: f64,
    pub height: f64,
}

impl SpaceMetric {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Apply toroidal wrapping
    pub fn correct_position(&self, pos: Vec2) -> Vec2 {
        Vec2::new(pos.x.rem_euclid(self.width), pos.y.rem_euclid(self.height))
    }

    /// Shortest vector leading from `from` to `to`.
    pub fn displacement(&self, from: Vec2, to: Vec2) -> Vec2 {
        Vec2::new(
            Self::wrap_delta(to.x - from.x, self.width),
            Self::wrap_delta(to.y - from.y, self.height),
        )
    }

    pub fn distance(&self, a: Vec2, b: Vec2) -> f64 {
        self.displacement(a, b).length()
    }

    fn wrap_delta(delta: f64, size: f64) -> f64 {
        let mut d = delta.rem_euclid(size);
        if d > size / 2.0 {
            d -= size;
        }
        d
    }
}
