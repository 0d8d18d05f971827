//! Configuration types for the simulation.

use crate::error::{Error, Result};
use crate::math::Vec2;
use crate::space::SpaceMetric;
use crate::types::{MAX_CELL_BONDS, MAX_COLORS};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Smallest token memory that still holds every register used by the cell
/// functions (neural net block at 110..118).
pub const MIN_TOKEN_MEMORY_SIZE: usize = 118;

/// Maximum number of parameter spots and flow centers.
pub const MAX_SPOTS: usize = 2;

/// Parameters that can be overridden locally by a spot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotValues {
    /// Fraction of velocity lost per timestep (0.0 to 1.0)
    pub friction: f64,
    /// Blend of cell velocity towards its cluster's rigid motion (0.0 to 1.0)
    pub rigidity: f64,
    /// Fraction of cell energy radiated per timestep
    pub radiation_factor: f64,
    /// Bond force above which a bond may break
    pub cell_max_force: f64,
    /// Cells below this energy are destroyed
    pub cell_min_energy: f64,
    /// Minimum relative normal speed for two colliding clusters to fuse
    pub cell_fusion_velocity: f64,
    /// Cells with more energy cannot keep or form bonds
    pub cell_max_binding_energy: f64,
    /// Timesteps a cell keeps its color, per color (0 = forever)
    pub cell_color_transition_duration: [u32; MAX_COLORS],
    pub cell_color_transition_target_color: [u8; MAX_COLORS],
    /// Energy an attacker pays per activation
    pub cell_function_attacker_energy_cost: f64,
    /// Row: attacker color, column: victim color (0.0 to 1.0)
    pub cell_function_attacker_food_chain_color_matrix: [[f64; MAX_COLORS]; MAX_COLORS],
    pub cell_function_attacker_geometry_deviation_exponent: f64,
    pub cell_function_attacker_connections_mismatch_penalty: f64,
    pub mutation_neuron_data_probability: f64,
    pub mutation_data_probability: f64,
    pub mutation_cell_function_probability: f64,
    pub mutation_insertion_probability: f64,
    pub mutation_deletion_probability: f64,
}

impl Default for SpotValues {
    fn default() -> Self {
        let mut target_colors = [0u8; MAX_COLORS];
        for (color, target) in target_colors.iter_mut().enumerate() {
            *target = color as u8;
        }
        Self {
            friction: 0.001,
            rigidity: 0.0,
            radiation_factor: 0.0002,
            cell_max_force: 0.8,
            cell_min_energy: 50.0,
            cell_fusion_velocity: 0.4,
            cell_max_binding_energy: 500_000.0,
            cell_color_transition_duration: [0; MAX_COLORS],
            cell_color_transition_target_color: target_colors,
            cell_function_attacker_energy_cost: 0.0,
            cell_function_attacker_food_chain_color_matrix: [[1.0; MAX_COLORS]; MAX_COLORS],
            cell_function_attacker_geometry_deviation_exponent: 0.0,
            cell_function_attacker_connections_mismatch_penalty: 0.33,
            mutation_neuron_data_probability: 0.0,
            mutation_data_probability: 0.0,
            mutation_cell_function_probability: 0.0,
            mutation_insertion_probability: 0.0,
            mutation_deletion_probability: 0.0,
        }
    }
}

impl SpotValues {
    fn correct(&mut self) {
        self.friction = self.friction.clamp(0.0, 1.0);
        self.rigidity = self.rigidity.clamp(0.0, 1.0);
        self.radiation_factor = self.radiation_factor.clamp(0.0, 0.01);
        self.cell_max_force = self.cell_max_force.clamp(0.0, 3.0);
        self.cell_min_energy = self.cell_min_energy.clamp(10.0, 200.0);
        self.cell_fusion_velocity = self.cell_fusion_velocity.clamp(0.0, 1.0);
        self.cell_max_binding_energy = self.cell_max_binding_energy.clamp(50.0, 1_000_000.0);
        for target in self.cell_color_transition_target_color.iter_mut() {
            *target = (*target).min(MAX_COLORS as u8 - 1);
        }
        self.cell_function_attacker_energy_cost =
            self.cell_function_attacker_energy_cost.clamp(0.0, 1.0);
        for row in self.cell_function_attacker_food_chain_color_matrix.iter_mut() {
            for entry in row.iter_mut() {
                *entry = entry.clamp(0.0, 1.0);
            }
        }
        self.cell_function_attacker_geometry_deviation_exponent =
            self.cell_function_attacker_geometry_deviation_exponent.clamp(0.0, 5.0);
        self.cell_function_attacker_connections_mismatch_penalty =
            self.cell_function_attacker_connections_mismatch_penalty.clamp(0.0, 1.0);
        for probability in [
            &mut self.mutation_neuron_data_probability,
            &mut self.mutation_data_probability,
            &mut self.mutation_cell_function_probability,
            &mut self.mutation_insertion_probability,
            &mut self.mutation_deletion_probability,
        ] {
            *probability = probability.clamp(0.0, 1.0);
        }
    }

    /// Move every value a fraction `factor` towards `other`. Continuous values
    /// are interpolated, discrete ones switch over at half weight.
    fn blend_towards(&mut self, base: &SpotValues, other: &SpotValues, factor: f64) {
        let lerp = |b: f64, o: f64| factor * (o - b);
        self.friction += lerp(base.friction, other.friction);
        self.rigidity += lerp(base.rigidity, other.rigidity);
        self.radiation_factor += lerp(base.radiation_factor, other.radiation_factor);
        self.cell_max_force += lerp(base.cell_max_force, other.cell_max_force);
        self.cell_min_energy += lerp(base.cell_min_energy, other.cell_min_energy);
        self.cell_fusion_velocity += lerp(base.cell_fusion_velocity, other.cell_fusion_velocity);
        self.cell_max_binding_energy +=
            lerp(base.cell_max_binding_energy, other.cell_max_binding_energy);
        self.cell_function_attacker_energy_cost += lerp(
            base.cell_function_attacker_energy_cost,
            other.cell_function_attacker_energy_cost,
        );
        for i in 0..MAX_COLORS {
            for j in 0..MAX_COLORS {
                self.cell_function_attacker_food_chain_color_matrix[i][j] += lerp(
                    base.cell_function_attacker_food_chain_color_matrix[i][j],
                    other.cell_function_attacker_food_chain_color_matrix[i][j],
                );
            }
        }
        self.cell_function_attacker_geometry_deviation_exponent += lerp(
            base.cell_function_attacker_geometry_deviation_exponent,
            other.cell_function_attacker_geometry_deviation_exponent,
        );
        self.cell_function_attacker_connections_mismatch_penalty += lerp(
            base.cell_function_attacker_connections_mismatch_penalty,
            other.cell_function_attacker_connections_mismatch_penalty,
        );
        self.mutation_neuron_data_probability +=
            lerp(base.mutation_neuron_data_probability, other.mutation_neuron_data_probability);
        self.mutation_data_probability +=
            lerp(base.mutation_data_probability, other.mutation_data_probability);
        self.mutation_cell_function_probability += lerp(
            base.mutation_cell_function_probability,
            other.mutation_cell_function_probability,
        );
        self.mutation_insertion_probability +=
            lerp(base.mutation_insertion_probability, other.mutation_insertion_probability);
        self.mutation_deletion_probability +=
            lerp(base.mutation_deletion_probability, other.mutation_deletion_probability);

        if factor >= 0.5 {
            self.cell_color_transition_duration = other.cell_color_transition_duration;
            self.cell_color_transition_target_color = other.cell_color_transition_target_color;
        }
    }
}

/// Global simulation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParameters {
    /// Values used outside of any spot
    pub spot_values: SpotValues,

    pub timestep_size: f64,
    pub cell_max_velocity: f64,
    pub cell_max_binding_distance: f64,
    pub cell_repulsion_strength: f64,
    pub cell_normal_energy: f64,
    pub cell_min_distance: f64,
    pub cell_max_collision_distance: f64,
    pub cell_max_force_decay_prob: f64,
    /// Upper bound for `Cell::max_connections` (at most 6)
    pub cell_max_bonds: usize,
    pub cell_max_execution_order_numbers: u8,
    pub cell_max_token_access_numbers: u8,
    /// Access number given to cells created outside of a constructor
    pub cell_creation_token_access_number: u8,
    /// Maximum number of tokens a cell can hold
    pub cell_max_tokens: usize,
    /// Size of the cell-local memory used by computation functions
    pub cell_memory_size: usize,
    pub computation_max_instructions: usize,

    pub token_memory_size: usize,
    /// Tokens below this energy are consumed
    pub token_min_energy: f64,

    pub radiation_prob: f64,
    pub radiation_velocity_multiplier: f64,
    pub radiation_velocity_perturbation: f64,
    pub radiation_min_cell_age: u32,
    pub radiation_min_cell_energy: f64,
    pub radiation_absorption_by_cell_color: [f64; MAX_COLORS],

    pub cluster_decay: bool,
    pub cluster_decay_prob: f64,

    pub cell_function_constructor_offspring_distance: f64,
    pub cell_function_constructor_connecting_cell_max_distance: f64,
    pub cell_function_construction_inherit_color: bool,
    /// Constructors draw no energy from their token. Injects energy.
    pub cell_function_construction_unlimited_energy: bool,
    /// Energy of tokens created on an offspring cell
    pub cell_function_constructor_offspring_token_energy: f64,

    pub cell_function_attacker_radius: f64,
    pub cell_function_attacker_strength: f64,
    pub cell_function_attacker_energy_distribution_radius: f64,
    pub cell_function_attacker_energy_distribution_value: f64,
    pub cell_function_attacker_energy_distribution_same_color: bool,
    pub cell_function_attacker_color_inhomogeneity_factor: f64,

    pub cell_function_sensor_range: f64,

    pub cell_function_muscle_contraction_expansion_delta: f64,
    pub cell_function_muscle_movement_acceleration: f64,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            spot_values: SpotValues::default(),
            timestep_size: 1.0,
            cell_max_velocity: 2.0,
            cell_max_binding_distance: 2.6,
            cell_repulsion_strength: 0.08,
            cell_normal_energy: 100.0,
            cell_min_distance: 0.3,
            cell_max_collision_distance: 1.3,
            cell_max_force_decay_prob: 0.2,
            cell_max_bonds: MAX_CELL_BONDS,
            cell_max_execution_order_numbers: 6,
            cell_max_token_access_numbers: 6,
            cell_creation_token_access_number: 0,
            cell_max_tokens: 3,
            cell_memory_size: 8,
            computation_max_instructions: 15,
            token_memory_size: 256,
            token_min_energy: 3.0,
            radiation_prob: 0.03,
            radiation_velocity_multiplier: 1.0,
            radiation_velocity_perturbation: 0.5,
            radiation_min_cell_age: 0,
            radiation_min_cell_energy: 500.0,
            radiation_absorption_by_cell_color: [1.0; MAX_COLORS],
            cluster_decay: false,
            cluster_decay_prob: 0.1,
            cell_function_constructor_offspring_distance: 1.6,
            cell_function_constructor_connecting_cell_max_distance: 1.8,
            cell_function_construction_inherit_color: true,
            cell_function_construction_unlimited_energy: false,
            cell_function_constructor_offspring_token_energy: 60.0,
            cell_function_attacker_radius: 1.6,
            cell_function_attacker_strength: 0.05,
            cell_function_attacker_energy_distribution_radius: 3.6,
            cell_function_attacker_energy_distribution_value: 10.0,
            cell_function_attacker_energy_distribution_same_color: true,
            cell_function_attacker_color_inhomogeneity_factor: 1.0,
            cell_function_sensor_range: 255.0,
            cell_function_muscle_contraction_expansion_delta: 0.05,
            cell_function_muscle_movement_acceleration: 0.02,
        }
    }
}

impl SimulationParameters {
    /// Clamp every value into the range the parameter editor allows.
    pub fn validate_and_correct(&mut self) {
        self.spot_values.correct();
        self.timestep_size = self.timestep_size.clamp(0.0, 1.0);
        self.cell_max_velocity = self.cell_max_velocity.clamp(0.0, 6.0);
        self.cell_min_distance = self.cell_min_distance.clamp(0.0, 1.0);
        self.cell_repulsion_strength = self.cell_repulsion_strength.clamp(0.0, 0.3);
        self.cell_max_collision_distance = self.cell_max_collision_distance.clamp(0.0, 3.0);
        self.cell_max_binding_distance = self.cell_max_binding_distance.clamp(0.0, 5.0);
        self.cell_normal_energy = self.cell_normal_energy.clamp(10.0, 200.0);
        self.cell_max_force_decay_prob = self.cell_max_force_decay_prob.clamp(0.0, 1.0);
        self.cell_max_bonds = self.cell_max_bonds.min(MAX_CELL_BONDS);
        self.radiation_prob = self.radiation_prob.clamp(0.0, 1.0);
        self.radiation_min_cell_energy = self.radiation_min_cell_energy.clamp(0.0, 100_000.0);
        self.radiation_min_cell_age = self.radiation_min_cell_age.min(1_000_000);
        for absorption in self.radiation_absorption_by_cell_color.iter_mut() {
            *absorption = absorption.clamp(0.0, 1.0);
        }
        self.cluster_decay_prob = self.cluster_decay_prob.clamp(0.0, 1.0);
        self.cell_function_constructor_offspring_distance =
            self.cell_function_constructor_offspring_distance.clamp(0.1, 3.0);
        self.cell_function_constructor_connecting_cell_max_distance =
            self.cell_function_constructor_connecting_cell_max_distance.clamp(0.1, 3.0);
        self.cell_function_attacker_radius = self.cell_function_attacker_radius.clamp(0.0, 2.5);
        self.cell_function_attacker_strength = self.cell_function_attacker_strength.clamp(0.0, 0.1);
        self.cell_function_attacker_energy_distribution_radius =
            self.cell_function_attacker_energy_distribution_radius.clamp(0.0, 5.0);
        self.cell_function_attacker_energy_distribution_value =
            self.cell_function_attacker_energy_distribution_value.clamp(0.0, 20.0);
        self.cell_function_attacker_color_inhomogeneity_factor =
            self.cell_function_attacker_color_inhomogeneity_factor.clamp(0.0, 1.0);
        self.cell_function_muscle_contraction_expansion_delta =
            self.cell_function_muscle_contraction_expansion_delta.clamp(0.0, 0.1);
        self.cell_function_muscle_movement_acceleration =
            self.cell_function_muscle_movement_acceleration.clamp(0.0, 0.15);
        self.cell_function_sensor_range = self.cell_function_sensor_range.clamp(10.0, 512.0);
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(self.timestep_size > 0.0) {
            return Err(Error::Configuration(format!(
                "timestep size must be positive, got {}",
                self.timestep_size
            )));
        }
        if self.token_memory_size < MIN_TOKEN_MEMORY_SIZE {
            return Err(Error::Configuration(format!(
                "token memory size {} is smaller than the register map ({} bytes)",
                self.token_memory_size, MIN_TOKEN_MEMORY_SIZE
            )));
        }
        if self.cell_max_execution_order_numbers == 0 {
            return Err(Error::Configuration(
                "at least one execution order number is required".to_string(),
            ));
        }
        if self.cell_max_token_access_numbers == 0 {
            return Err(Error::Configuration(
                "at least one token access number is required".to_string(),
            ));
        }
        if self.cell_max_bonds > MAX_CELL_BONDS {
            return Err(Error::Configuration(format!(
                "cell_max_bonds {} exceeds {}",
                self.cell_max_bonds, MAX_CELL_BONDS
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SpotShape {
    Circular { core_radius: f64 },
    Rectangular { width: f64, height: f64 },
}

/// A region of the world with its own parameter values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParametersSpot {
    /// Background color, only used for display
    pub color: u32,
    pub pos: Vec2,
    pub fadeout_radius: f64,
    pub shape: SpotShape,
    pub values: SpotValues,
}

impl Default for SimulationParametersSpot {
    fn default() -> Self {
        Self {
            color: 0,
            pos: Vec2::ZERO,
            fadeout_radius: 100.0,
            shape: SpotShape::Circular { core_radius: 100.0 },
            values: SpotValues::default(),
        }
    }
}

impl SimulationParametersSpot {
    /// Spot centered in the world, covering a third of its smaller extent.
    pub fn centered(space: &SpaceMetric, values: SpotValues) -> Self {
        let max_radius = space.width.min(space.height) / 2.0;
        Self {
            color: 0,
            pos: Vec2::new(space.width / 2.0, space.height / 2.0),
            fadeout_radius: max_radius / 3.0,
            shape: SpotShape::Circular {
                core_radius: max_radius / 3.0,
            },
            values,
        }
    }

    /// Weight of this spot at `pos`: 1 inside the core, falling linearly to
    /// 0 across the fade-out zone.
    pub fn weight_at(&self, space: &SpaceMetric, pos: Vec2) -> f64 {
        let delta = space.displacement(self.pos, pos);
        let outside = match self.shape {
            SpotShape::Circular { core_radius } => delta.length() - core_radius,
            SpotShape::Rectangular { width, height } => {
                let dx = (delta.x.abs() - width / 2.0).max(0.0);
                let dy = (delta.y.abs() - height / 2.0).max(0.0);
                Vec2::new(dx, dy).length()
            }
        };
        if outside <= 0.0 {
            1.0
        } else if outside >= self.fadeout_radius {
            0.0
        } else {
            1.0 - outside / self.fadeout_radius
        }
    }

    fn correct(&mut self, space: &SpaceMetric) {
        let max_radius = space.width.min(space.height) / 2.0;
        self.pos = space.correct_position(self.pos);
        self.fadeout_radius = self.fadeout_radius.clamp(0.0, max_radius);
        self.shape = match self.shape {
            SpotShape::Circular { core_radius } => SpotShape::Circular {
                core_radius: core_radius.clamp(0.0, max_radius),
            },
            SpotShape::Rectangular { width, height } => SpotShape::Rectangular {
                width: width.clamp(0.0, space.width),
                height: height.clamp(0.0, space.height),
            },
        };
        self.values.correct();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationParametersSpots {
    pub spots: Vec<SimulationParametersSpot>,
}

impl SimulationParametersSpots {
    pub fn validate_and_correct(&mut self, space: &SpaceMetric) {
        for spot in self.spots.iter_mut() {
            spot.correct(space);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.spots.len() > MAX_SPOTS {
            return Err(Error::Configuration(format!(
                "at most {} spots are supported, got {}",
                MAX_SPOTS,
                self.spots.len()
            )));
        }
        Ok(())
    }
}

/// Parameter values in effect at `pos`.
///
/// Every spot contributes `weight * (spot - base)`; when the weights add up
/// to more than 1 the contributions are normalized by their sum.
pub fn effective_parameters_at(
    parameters: &SimulationParameters,
    spots: &SimulationParametersSpots,
    space: &SpaceMetric,
    pos: Vec2,
) -> SpotValues {
    let base = &parameters.spot_values;
    let weights: Vec<f64> = spots
        .spots
        .iter()
        .map(|spot| spot.weight_at(space, pos))
        .collect();
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return base.clone();
    }
    let norm = total.max(1.0);
    let mut result = base.clone();
    for (spot, weight) in spots.spots.iter().zip(&weights) {
        if *weight > 0.0 {
            result.blend_towards(base, &spot.values, weight / norm);
        }
    }
    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Clockwise,
    CounterClockwise,
}

/// Radial flow center pushing cells around it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowCenter {
    pub pos: Vec2,
    pub radius: f64,
    pub strength: f64,
    pub orientation: Orientation,
}

impl Default for FlowCenter {
    fn default() -> Self {
        Self {
            pos: Vec2::ZERO,
            radius: 200.0,
            strength: 0.01,
            orientation: Orientation::Clockwise,
        }
    }
}

impl FlowCenter {
    /// Tangential acceleration at `pos`, fading to zero at `radius`.
    pub fn acceleration_at(&self, space: &SpaceMetric, pos: Vec2) -> Vec2 {
        let delta = space.displacement(self.pos, pos);
        let distance = delta.length();
        if distance >= self.radius || self.radius <= 0.0 {
            return Vec2::ZERO;
        }
        let falloff = 1.0 - distance / self.radius;
        let tangent = match self.orientation {
            Orientation::Clockwise => -delta.normalized().rotate_quarter_ccw(),
            Orientation::CounterClockwise => delta.normalized().rotate_quarter_ccw(),
        };
        tangent * (self.strength * falloff)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowFieldSettings {
    pub active: bool,
    pub centers: Vec<FlowCenter>,
}

impl FlowFieldSettings {
    pub fn acceleration_at(&self, space: &SpaceMetric, pos: Vec2) -> Vec2 {
        if !self.active {
            return Vec2::ZERO;
        }
        self.centers
            .iter()
            .fold(Vec2::ZERO, |acc, center| acc + center.acceleration_at(space, pos))
    }
}

/// World size and seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralSettings {
    pub world_width: u32,
    pub world_height: u32,
    /// Random seed for reproducibility
    pub seed: u64,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            world_width: 400,
            world_height: 200,
            seed: 0,
        }
    }
}

/// Everything needed to construct an engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub parameters: SimulationParameters,
    pub spots: SimulationParametersSpots,
    pub flow_field: FlowFieldSettings,
}

impl Settings {
    pub fn space(&self) -> SpaceMetric {
        SpaceMetric::new(
            f64::from(self.general.world_width),
            f64::from(self.general.world_height),
        )
    }

    pub fn validate_and_correct(&mut self) {
        let before = self.clone();
        self.parameters.validate_and_correct();
        let space = self.space();
        if space.width > 0.0 && space.height > 0.0 {
            self.spots.validate_and_correct(&space);
        }
        if *self != before {
            debug!(event = "settings_corrected", "Out-of-range settings were clamped");
        }
    }

    /// Fatal configuration errors, checked before a stepper is built.
    pub fn validate(&self) -> Result<()> {
        if self.general.world_width == 0 || self.general.world_height == 0 {
            return Err(Error::Configuration(format!(
                "world size must be positive, got {}x{}",
                self.general.world_width, self.general.world_height
            )));
        }
        self.parameters.validate()?;
        self.spots.validate()?;
        if self.flow_field.centers.len() > MAX_SPOTS {
            return Err(Error::Configuration(format!(
                "at most {} flow centers are supported, got {}",
                MAX_SPOTS,
                self.flow_field.centers.len()
            )));
        }
        Ok(())
    }
}
