use alien_core::{IdGenerator, MonitorData, Settings, Vec2};
use alien_model::{CellDescription, CellFunctionData, DataDescription, TokenDescription};
use alien_runtime::registers::{constructor, ConstructorInput, ConstructorOption};
use alien_world::description_helper::{
    create_rect, random_multiply, CreateRectParameters, RandomMultiplyParameters,
};
use alien_world::SimulationStepper;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.general.world_width = 100;
    settings.general.world_height = 100;
    settings.general.seed = 7;
    settings
}

fn construct_token(energy: f64) -> TokenDescription {
    let mut memory = vec![0u8; 256];
    memory[constructor::INPUT] = ConstructorInput::Construct.to_byte();
    memory[constructor::IN_OPTION] = ConstructorOption::Standard.to_byte();
    TokenDescription {
        energy,
        memory,
        origin: None,
    }
}

/// A few rectangles scattered by a seeded generator, one of them carrying
/// a constructor with a token.
fn scene() -> DataDescription {
    let mut ids = IdGenerator::new();
    let rect = create_rect(&CreateRectParameters::default().with_size(3, 3), &mut ids);
    let parameters = RandomMultiplyParameters {
        number: 6,
        max_vel_x: 0.3,
        min_vel_x: -0.3,
        max_vel_y: 0.3,
        min_vel_y: -0.3,
        max_angular_vel: 2.0,
        overlapping_check: true,
        ..RandomMultiplyParameters::default()
    };
    let space = settings().space();
    let mut scene = random_multiply(
        &rect,
        &parameters,
        &space,
        &DataDescription::new(),
        &mut ChaCha8Rng::seed_from_u64(11),
        &mut ids,
    )
    .expect("world is large enough for six rectangles");
    scene.cells[4].function = CellFunctionData::Constructor;
    scene.cells[4].tokens.push(construct_token(300.0));
    scene
}

#[test]
fn test_rect_scene_runs() {
    let mut stepper = SimulationStepper::from_description(settings(), &scene()).unwrap();
    let executed = stepper.run(50).unwrap();
    assert_eq!(executed, 50);
    assert_eq!(stepper.timestep(), 50);
    assert!(stepper.state().check_invariants().is_ok());
    assert_eq!(stepper.monitor().read().timestep, 50);
    assert!(stepper.monitor().read().timestep_data.num_cells() > 0);
}

#[test]
fn test_same_seed_same_world() {
    let mut a = SimulationStepper::from_description(settings(), &scene()).unwrap();
    let mut b = SimulationStepper::from_description(settings(), &scene()).unwrap();
    a.run(40).unwrap();
    b.run(40).unwrap();
    assert_eq!(
        a.to_description().to_bytes().unwrap(),
        b.to_description().to_bytes().unwrap()
    );
}

/// Two rectangles on a collision course and a lone constructor.
fn busy_scene() -> DataDescription {
    let mut ids = IdGenerator::new();
    let mut left = create_rect(
        &CreateRectParameters::default()
            .with_size(3, 3)
            .with_center(Vec2::new(30.0, 50.0)),
        &mut ids,
    );
    let mut right = create_rect(
        &CreateRectParameters::default()
            .with_size(3, 3)
            .with_center(Vec2::new(36.0, 50.5)),
        &mut ids,
    );
    for cell in left.cells.iter_mut() {
        cell.vel = Vec2::new(0.2, 0.0);
    }
    for cell in right.cells.iter_mut() {
        cell.vel = Vec2::new(-0.2, 0.0);
    }
    left.add(right);
    left.cells.push(
        CellDescription::new(ids.next_cell_id(), Vec2::new(80.0, 80.0))
            .with_function(CellFunctionData::Constructor)
            .with_token(construct_token(300.0)),
    );
    left
}

#[test]
fn test_energy_is_conserved() {
    let mut stepper = SimulationStepper::from_description(settings(), &busy_scene()).unwrap();
    let before = stepper.state().total_energy();
    let mut external = 0.0;
    let mut created = 0;
    for _ in 0..30 {
        let report = stepper.step().unwrap();
        external += report.tokens.external_energy;
        created += report.tokens.time_interval.num_created_cells;
    }
    let after = stepper.state().total_energy();
    assert!(created >= 1);
    assert!(
        (after - before - external).abs() < 1e-6 * before,
        "energy drifted from {} to {}",
        before,
        after
    );
}

#[test]
fn test_approaching_rectangles_fuse() {
    let mut ids = IdGenerator::new();
    let mut left = create_rect(
        &CreateRectParameters::default()
            .with_size(3, 3)
            .with_center(Vec2::new(40.0, 50.0)),
        &mut ids,
    );
    let mut right = create_rect(
        &CreateRectParameters::default()
            .with_size(3, 3)
            .with_center(Vec2::new(44.0, 50.0)),
        &mut ids,
    );
    for cell in left.cells.iter_mut() {
        cell.vel = Vec2::new(0.5, 0.0);
    }
    for cell in right.cells.iter_mut() {
        cell.vel = Vec2::new(-0.5, 0.0);
    }
    left.add(right);

    let mut settings = settings();
    settings.parameters.radiation_prob = 0.0;
    let mut stepper = SimulationStepper::from_description(settings, &left).unwrap();
    let report = stepper.step().unwrap();
    assert_eq!(report.physics.fusions, 1);
    stepper.run(4).unwrap();

    let clustered = stepper.to_clustered_description();
    assert_eq!(clustered.clusters.len(), 1);
    let momentum: f64 = stepper.state().graph.cells().iter().map(|c| c.vel.x).sum();
    assert!(momentum.abs() < 1e-6);
}

#[test]
fn test_observer_can_pause() {
    let mut stepper = SimulationStepper::from_description(settings(), &scene()).unwrap();
    let control = stepper.control();
    stepper.add_observer(move |data: &MonitorData| {
        if data.timestep == 3 {
            control.pause();
        }
    });
    assert_eq!(stepper.run(10).unwrap(), 3);
    assert_eq!(stepper.timestep(), 3);
    assert!(stepper.control().is_paused());
}

#[test]
fn test_insert_between_steps() {
    let mut stepper = SimulationStepper::new(settings()).unwrap();
    stepper.run(2).unwrap();
    let mut ids = IdGenerator::new();
    ids.reserve_up_to(10_000);
    let rect = create_rect(
        &CreateRectParameters::default()
            .with_size(2, 2)
            .with_center(Vec2::new(20.0, 20.0)),
        &mut ids,
    );
    stepper.insert(&rect).unwrap();
    assert_eq!(stepper.timestep(), 2);
    assert_eq!(stepper.state().graph.len(), 4);
    stepper.run(2).unwrap();
    assert_eq!(stepper.timestep(), 4);
}
