//! Simulation world: the phase pipeline that advances cells, bonds, tokens
//! and energy particles, plus scene helpers working on descriptions.
//!
//! A step runs Integrate, DetectCollisions, ResolvePhysics, RunTokens and
//! ApplyDecayAndRadiation behind full barriers and then commits.

pub mod collisions;
pub mod context;
pub mod decay;
pub mod description_helper;
pub mod integrate;
pub mod state;
pub mod stepper;

pub use collisions::{ContactCandidate, PhysicsReport};
pub use context::EngineContext;
pub use decay::DecayReport;
pub use integrate::IntegrationReport;
pub use state::WorldState;
pub use stepper::{SimulationStepper, StepObserver, StepPhase, StepReport, StepperControl};
