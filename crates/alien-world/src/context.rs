//! Engine-wide services shared by all phases of a step.

use alien_core::{IdGenerator, Result, Settings, SimulationParameters, SpaceMetric};
use alien_model::GraphLimits;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

/// Settings, random source and id generator of one engine.
///
/// Every random decision of a step draws from `rng`, so two engines built
/// from the same settings and content evolve identically.
#[derive(Debug, Clone)]
pub struct EngineContext {
    pub settings: Settings,
    pub rng: ChaCha8Rng,
    pub ids: IdGenerator,
}

impl EngineContext {
    /// Clamp the settings into range and reject fatal configurations.
    pub fn new(mut settings: Settings) -> Result<Self> {
        settings.validate_and_correct();
        settings.validate()?;
        let rng = ChaCha8Rng::seed_from_u64(settings.general.seed);
        info!(
            event = "engine_context_created",
            world_width = settings.general.world_width,
            world_height = settings.general.world_height,
            seed = settings.general.seed,
        );
        Ok(Self {
            settings,
            rng,
            ids: IdGenerator::new(),
        })
    }

    pub fn space(&self) -> SpaceMetric {
        self.settings.space()
    }

    pub fn parameters(&self) -> &SimulationParameters {
        &self.settings.parameters
    }

    pub fn graph_limits(&self) -> GraphLimits {
        GraphLimits::from_parameters(&self.settings.parameters)
    }

    /// Replace the simulation parameters. Values are clamped like on
    /// construction.
    pub fn set_parameters(&mut self, parameters: SimulationParameters) -> Result<()> {
        let mut settings = self.settings.clone();
        settings.parameters = parameters;
        settings.validate_and_correct();
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alien_core::Error;
    use rand::Rng;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = EngineContext::new(Settings::default()).unwrap();
        let mut b = EngineContext::new(Settings::default()).unwrap();
        let xs: Vec<u64> = (0..4).map(|_| a.rng.gen()).collect();
        let ys: Vec<u64> = (0..4).map(|_| b.rng.gen()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_rejects_fatal_settings() {
        let mut settings = Settings::default();
        settings.general.world_width = 0;
        assert!(matches!(EngineContext::new(settings), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_set_parameters_clamps() {
        let mut ctx = EngineContext::new(Settings::default()).unwrap();
        let mut parameters = SimulationParameters::default();
        parameters.spot_values.friction = 4.0;
        parameters.cell_max_bonds = 9;
        ctx.set_parameters(parameters).unwrap();
        assert_eq!(ctx.parameters().spot_values.friction, 1.0);
        assert_eq!(ctx.graph_limits().max_bonds, 6);
    }
}
