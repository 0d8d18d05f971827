//! Headless driver for the simulation engine.

mod config;
mod telemetry;

use alien_core::{IdGenerator, MonitorData, Settings, Vec2};
use alien_model::DataDescription;
use alien_world::description_helper::{
    create_rect, random_multiply, CreateRectParameters, RandomMultiplyParameters,
};
use alien_world::SimulationStepper;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Overrides;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "alien")]
#[command(author, version, about = "Artificial life simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation
    Run {
        /// Number of steps
        #[arg(short, long, default_value = "1000")]
        steps: u64,

        /// Settings file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Initial content (JSON); an empty world when omitted
        #[arg(long)]
        scene: Option<PathBuf>,

        /// Write the final content here (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        seed: Option<u64>,

        #[arg(long)]
        width: Option<u32>,

        #[arg(long)]
        height: Option<u32>,

        /// Log statistics every this many steps
        #[arg(long, default_value = "100")]
        report_every: u64,
    },

    /// Generate a scene of randomly placed rectangular clusters
    Generate {
        /// Output file (JSON)
        output: PathBuf,

        /// Number of clusters
        #[arg(short, long, default_value = "20")]
        count: usize,

        /// Cluster width in cells
        #[arg(long, default_value = "5")]
        rect_width: usize,

        /// Cluster height in cells
        #[arg(long, default_value = "5")]
        rect_height: usize,

        /// Largest velocity component of a cluster
        #[arg(long, default_value = "0.2")]
        max_vel: f64,

        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the default settings as JSON
    Params,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_telemetry(cli.json_logs)?;

    match cli.command {
        Commands::Run {
            steps,
            config,
            scene,
            output,
            seed,
            width,
            height,
            report_every,
        } => {
            let overrides = Overrides {
                seed,
                world_width: width,
                world_height: height,
            };
            let settings = config::load_settings(config.as_deref(), &overrides)?;
            let scene = match scene {
                Some(path) => config::load_scene(&path)?,
                None => DataDescription::new(),
            };
            run(settings, &scene, steps, report_every, output)
        }
        Commands::Generate {
            output,
            count,
            rect_width,
            rect_height,
            max_vel,
            config,
            seed,
        } => {
            let overrides = Overrides {
                seed,
                ..Overrides::default()
            };
            let settings = config::load_settings(config.as_deref(), &overrides)?;
            let scene = generate(&settings, count, rect_width, rect_height, max_vel)?;
            config::write_json(&output, &scene)?;
            info!(path = %output.display(), cells = scene.cells.len(), "Scene written");
            Ok(())
        }
        Commands::Params => {
            println!("{}", serde_json::to_string_pretty(&Settings::default())?);
            Ok(())
        }
    }
}

fn run(
    settings: Settings,
    scene: &DataDescription,
    steps: u64,
    report_every: u64,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut stepper = SimulationStepper::from_description(settings, scene)?;
    let report_every = report_every.max(1);
    stepper.add_observer(move |data: &MonitorData| {
        if data.timestep % report_every == 0 {
            info!(
                timestep = data.timestep,
                cells = data.timestep_data.num_cells(),
                connections = data.timestep_data.num_connections,
                particles = data.timestep_data.num_particles,
                tokens = data.timestep_data.num_tokens,
                total_energy = data.timestep_data.total_energy,
                created_cells = data.time_interval_data.num_created_cells,
                "Step statistics"
            );
        }
    });

    let executed = stepper.run(steps)?;
    if executed < steps {
        warn!(executed, requested = steps, "Run stopped early");
    }
    info!(
        timestep = stepper.timestep(),
        history_samples = stepper.history().samples().len(),
        "Run finished"
    );

    if let Some(path) = output {
        config::write_json(&path, &stepper.to_description())?;
        info!(path = %path.display(), "Final content written");
    }
    Ok(())
}

fn generate(
    settings: &Settings,
    count: usize,
    rect_width: usize,
    rect_height: usize,
    max_vel: f64,
) -> Result<DataDescription> {
    let mut ids = IdGenerator::new();
    let mut rng = ChaCha8Rng::seed_from_u64(settings.general.seed);
    let rect = create_rect(
        &CreateRectParameters::default()
            .with_size(rect_width, rect_height)
            .with_center(Vec2::ZERO)
            .with_energy(settings.parameters.cell_normal_energy),
        &mut ids,
    );
    let parameters = RandomMultiplyParameters {
        number: count,
        min_vel_x: -max_vel,
        max_vel_x: max_vel,
        min_vel_y: -max_vel,
        max_vel_y: max_vel,
        overlapping_check: true,
        ..RandomMultiplyParameters::default()
    };
    random_multiply(
        &rect,
        &parameters,
        &settings.space(),
        &DataDescription::new(),
        &mut rng,
        &mut ids,
    )
    .context("could not place all clusters without overlap, try a larger world or fewer clusters")
}
