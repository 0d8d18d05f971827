//! Core types and utilities for the ALIEN artificial-life engine.

pub mod config;
pub mod error;
pub mod math;
pub mod monitor;
pub mod physics;
pub mod space;
pub mod types;

pub use config::*;
pub use error::{ConnectionError, Error, Result};
pub use math::{Vec2, ALIEN_PRECISION, DEG_TO_RAD, RAD_TO_DEG};
pub use monitor::*;
pub use space::SpaceMetric;
pub use types::*;
