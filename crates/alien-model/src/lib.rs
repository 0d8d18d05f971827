//! World data model: cells, bonds, tokens, energy particles and the
//! description format used to move data in and out of a simulation.
//!
//! Bonds form an undirected graph over cells. The graph is the only place
//! where bonds are created or removed, so both endpoints always agree.

pub mod cell;
pub mod cell_function;
pub mod description;
pub mod graph;
pub mod particle;
pub mod spatial;
pub mod token;
pub mod validation;

pub use cell::{Cell, CellMetadata, Connection};
pub use cell_function::{
    CellFunctionData, CellFunctionType, ComputationData, ComputationInstruction,
    ComputationOperation, NeuralNetData, Operand, OperandType, INSTRUCTION_SIZE,
    NEURAL_NET_DATA_SIZE, NEURON_COUNT,
};
pub use description::{
    CellDescription, CellOrParticleDescription, ClusterDescription, ClusteredDataDescription,
    ConnectionDescription, DataDescription, ParticleDescription, TokenDescription,
};
pub use graph::{CellGraph, ClusterGeometry, ClusterIndex, ClusterIter, GraphLimits};
pub use particle::EnergyParticle;
pub use spatial::SpatialGrid;
pub use token::{Token, BRANCH_NUMBER};
pub use validation::validate_description;
