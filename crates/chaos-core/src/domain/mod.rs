//! Domain model for the lifecycle engine.

pub mod error;
pub mod experiment;

pub use error::{RegistryError, Result};
pub use experiment::{Experiment, ExperimentDefinition, ExperimentStatus};
