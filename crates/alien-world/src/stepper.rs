//! Simulation stepper: runs the phase pipeline and publishes statistics.

use crate::collisions::{self, PhysicsReport};
use crate::context::EngineContext;
use crate::decay::{self, DecayReport};
use crate::integrate;
use crate::state::WorldState;
use alien_core::{
    Error, MonitorData, Result, Settings, SimulationParameters, StatisticsHistory, TimestepData,
};
use alien_model::{ClusteredDataDescription, DataDescription};
use alien_runtime::{FunctionContext, TokenEngine, TokenStepReport};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, event, info, instrument, warn, Level};

/// Steps between two gauge snapshots in the log.
const GAUGE_INTERVAL: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    Integrate,
    DetectCollisions,
    ResolvePhysics,
    RunTokens,
    ApplyDecayAndRadiation,
    Commit,
}

impl fmt::Display for StepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepPhase::Integrate => "integrate",
            StepPhase::DetectCollisions => "detect_collisions",
            StepPhase::ResolvePhysics => "resolve_physics",
            StepPhase::RunTokens => "run_tokens",
            StepPhase::ApplyDecayAndRadiation => "apply_decay_and_radiation",
            StepPhase::Commit => "commit",
        };
        f.write_str(name)
    }
}

/// Pause switch shared between the stepper and whoever drives it.
///
/// The flag is only looked at between steps, so a running step always
/// completes.
#[derive(Debug, Clone, Default)]
pub struct StepperControl {
    paused: Arc<AtomicBool>,
}

impl StepperControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

/// Notified synchronously after every committed step.
pub trait StepObserver: Send {
    fn on_step(&mut self, data: &MonitorData);
}

impl<F> StepObserver for F
where
    F: FnMut(&MonitorData) + Send,
{
    fn on_step(&mut self, data: &MonitorData) {
        self(data)
    }
}

/// What happened during one step.
#[derive(Debug, Clone, Default)]
pub struct StepReport {
    pub timestep: u64,
    pub overstressed_bonds: usize,
    pub contact_candidates: usize,
    pub physics: PhysicsReport,
    pub tokens: TokenStepReport,
    pub decay: DecayReport,
    pub timestep_data: TimestepData,
}

pub struct SimulationStepper {
    context: EngineContext,
    state: WorldState,
    engine: TokenEngine,
    control: StepperControl,
    observers: Vec<Box<dyn StepObserver>>,
    monitor: Arc<RwLock<MonitorData>>,
    history: StatisticsHistory,
}

impl SimulationStepper {
    /// Empty world.
    pub fn new(settings: Settings) -> Result<Self> {
        Self::from_description(settings, &DataDescription::default())
    }

    pub fn from_description(settings: Settings, description: &DataDescription) -> Result<Self> {
        let mut context = EngineContext::new(settings)?;
        let state = WorldState::from_description(
            context.space(),
            context.graph_limits(),
            description,
            &mut context.ids,
        )?;
        let monitor = MonitorData {
            timestep: 0,
            timestep_data: state.timestep_data(),
            time_interval_data: Default::default(),
        };
        info!(
            event = "stepper_created",
            cells = state.graph.len(),
            particles = state.particles.len(),
        );
        Ok(Self {
            context,
            state,
            engine: TokenEngine::new(),
            control: StepperControl::new(),
            observers: Vec::new(),
            monitor: Arc::new(RwLock::new(monitor)),
            history: StatisticsHistory::default(),
        })
    }

    pub fn timestep(&self) -> u64 {
        self.state.timestep
    }

    pub fn settings(&self) -> &Settings {
        &self.context.settings
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    pub fn control(&self) -> StepperControl {
        self.control.clone()
    }

    /// Latest published statistics.
    pub fn monitor(&self) -> Arc<RwLock<MonitorData>> {
        Arc::clone(&self.monitor)
    }

    pub fn history(&self) -> &StatisticsHistory {
        &self.history
    }

    pub fn add_observer(&mut self, observer: impl StepObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn to_description(&self) -> DataDescription {
        self.state.to_description()
    }

    pub fn to_clustered_description(&self) -> ClusteredDataDescription {
        self.state.to_clustered_description()
    }

    /// Add content between steps. Ids must not be in use yet.
    pub fn insert(&mut self, description: &DataDescription) -> Result<()> {
        self.state.insert(description, &mut self.context.ids)?;
        debug!(event = "content_inserted", cells = description.cells.len(), particles = description.particles.len());
        Ok(())
    }

    /// Swap the parameters between steps.
    pub fn set_parameters(&mut self, parameters: SimulationParameters) -> Result<()> {
        self.context.set_parameters(parameters)?;
        self.state.graph.set_limits(self.context.graph_limits());
        info!(event = "parameters_changed", timestep = self.state.timestep);
        Ok(())
    }

    /// Run up to `steps` steps. Stops early, without error, when paused.
    /// Returns the number of steps executed.
    #[instrument(skip(self), fields(start = self.state.timestep))]
    pub fn run(&mut self, steps: u64) -> Result<u64> {
        info!("Running {} steps", steps);
        let mut executed = 0;
        for _ in 0..steps {
            if self.control.is_paused() {
                info!(event = "run_paused", timestep = self.state.timestep);
                break;
            }
            self.step()?;
            executed += 1;
        }
        Ok(executed)
    }

    /// Advance the world by one timestep.
    ///
    /// A step either commits completely or leaves the world, the random
    /// source and the id generator exactly as they were.
    #[instrument(skip(self), fields(timestep = self.state.timestep))]
    pub fn step(&mut self) -> Result<StepReport> {
        let snapshot = (
            self.state.clone(),
            self.context.rng.clone(),
            self.context.ids.clone(),
        );
        match self.run_phases() {
            Ok(report) => Ok(report),
            Err((phase, err)) => {
                let (state, rng, ids) = snapshot;
                self.state = state;
                self.context.rng = rng;
                self.context.ids = ids;
                warn!(
                    event = "step_aborted",
                    timestep = self.state.timestep,
                    %phase,
                    error = %err,
                );
                Err(Error::StepAborted(format!("{} failed: {}", phase, err)))
            }
        }
    }

    fn run_phases(&mut self) -> std::result::Result<StepReport, (StepPhase, Error)> {
        let settings = &self.context.settings;

        let integration = integrate::integrate(&mut self.state, settings);

        let candidates = collisions::detect_collisions(&self.state.graph, settings);

        let physics = collisions::resolve_physics(
            &mut self.state,
            settings,
            &candidates,
            &integration.overstressed_bonds,
            &mut self.context.rng,
        );
        self.check(StepPhase::ResolvePhysics)?;

        let tokens = {
            let mut ctx = FunctionContext::new(
                &settings.parameters,
                &settings.spots,
                &mut self.context.rng,
                &mut self.context.ids,
                &mut self.state.particles,
                &self.state.graph,
            );
            self.engine.run_step(&mut self.state.graph, &mut ctx)
        };
        self.check(StepPhase::RunTokens)?;

        let decay = decay::apply_decay_and_radiation(
            &mut self.state,
            settings,
            &mut self.context.rng,
            &mut self.context.ids,
        );
        self.check(StepPhase::ApplyDecayAndRadiation)?;

        self.state.timestep += 1;
        let data = MonitorData {
            timestep: self.state.timestep,
            timestep_data: self.state.timestep_data(),
            time_interval_data: tokens.time_interval.clone(),
        };
        self.commit(&data);

        Ok(StepReport {
            timestep: self.state.timestep,
            overstressed_bonds: integration.overstressed_bonds.len(),
            contact_candidates: candidates.len(),
            physics,
            tokens,
            decay,
            timestep_data: data.timestep_data,
        })
    }

    fn check(&self, phase: StepPhase) -> std::result::Result<(), (StepPhase, Error)> {
        self.state.check_invariants().map_err(|err| (phase, err))
    }

    fn commit(&mut self, data: &MonitorData) {
        *self.monitor.write() = data.clone();
        self.history.add(data);
        for observer in self.observers.iter_mut() {
            observer.on_step(data);
        }

        let created = data.time_interval_data.num_created_cells;
        if created > 0 {
            event!(
                Level::DEBUG,
                counter_name = "cells_created",
                counter_value = created,
                timestep = data.timestep,
                "Cells created"
            );
        }
        if data.timestep % GAUGE_INTERVAL == 0 {
            self.emit_gauges(data);
        }
    }

    fn emit_gauges(&self, data: &MonitorData) {
        info!(
            event = "monitor_snapshot",
            timestep = data.timestep,
            cells = data.timestep_data.num_cells(),
            connections = data.timestep_data.num_connections,
            particles = data.timestep_data.num_particles,
            tokens = data.timestep_data.num_tokens,
            total_energy = data.timestep_data.total_energy,
            "Monitor snapshot"
        );

        event!(
            Level::INFO,
            gauge_name = "num_cells",
            gauge_value = data.timestep_data.num_cells(),
            timestep = data.timestep,
            "Cell count"
        );

        event!(
            Level::INFO,
            gauge_name = "num_particles",
            gauge_value = data.timestep_data.num_particles,
            timestep = data.timestep,
            "Particle count"
        );

        event!(
            Level::INFO,
            gauge_name = "total_energy",
            gauge_value = data.timestep_data.total_energy,
            timestep = data.timestep,
            "Total energy"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alien_core::{CellId, Vec2};
    use alien_model::CellDescription;

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.general.world_width = 100;
        settings.general.world_height = 100;
        settings
    }

    fn single_cell() -> DataDescription {
        DataDescription {
            cells: vec![CellDescription::new(CellId(1), Vec2::new(10.0, 10.0)).with_vel(Vec2::new(0.5, 0.0))],
            particles: Vec::new(),
        }
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(StepPhase::Integrate.to_string(), "integrate");
        assert_eq!(StepPhase::ApplyDecayAndRadiation.to_string(), "apply_decay_and_radiation");
    }

    #[test]
    fn test_step_advances_and_publishes() {
        let mut stepper = SimulationStepper::from_description(settings(), &single_cell()).unwrap();
        let monitor = stepper.monitor();
        let report = stepper.step().unwrap();
        assert_eq!(report.timestep, 1);
        assert_eq!(stepper.timestep(), 1);
        assert_eq!(monitor.read().timestep, 1);
        assert_eq!(monitor.read().timestep_data.num_cells(), 1);
        assert_eq!(stepper.history().samples().len(), 1);
    }

    #[test]
    fn test_observers_see_every_step() {
        let mut stepper = SimulationStepper::from_description(settings(), &single_cell()).unwrap();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        stepper.add_observer(move |data: &MonitorData| sink.lock().push(data.timestep));
        stepper.run(3).unwrap();
        assert_eq!(*seen.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn test_pause_stops_run() {
        let mut stepper = SimulationStepper::new(settings()).unwrap();
        let control = stepper.control();
        control.pause();
        assert_eq!(stepper.run(5).unwrap(), 0);
        assert_eq!(stepper.timestep(), 0);
        control.resume();
        assert_eq!(stepper.run(5).unwrap(), 5);
    }

    #[test]
    fn test_aborted_step_restores_world() {
        let description = DataDescription {
            cells: vec![CellDescription::new(CellId(1), Vec2::new(10.0, 10.0)).with_vel(Vec2::new(f64::NAN, 0.0))],
            particles: Vec::new(),
        };
        let mut stepper = SimulationStepper::from_description(settings(), &description).unwrap();
        let before = stepper.to_description().to_bytes().unwrap();

        let result = stepper.step();
        assert!(matches!(result, Err(Error::StepAborted(_))));
        assert_eq!(stepper.timestep(), 0);
        assert_eq!(stepper.to_description().to_bytes().unwrap(), before);
        assert_eq!(stepper.monitor().read().timestep, 0);
    }

    #[test]
    fn test_set_parameters_between_steps() {
        let mut stepper = SimulationStepper::new(settings()).unwrap();
        let mut parameters = stepper.settings().parameters.clone();
        parameters.cell_max_bonds = 2;
        stepper.set_parameters(parameters).unwrap();
        assert_eq!(stepper.state().graph.limits().max_bonds, 2);
    }
}
