//! Error types for CLR matching.
use thiserror::Error;

use crate::types::ProjectId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("total_pot must be positive and finite, got {0}")] NonPositivePot(f64),
    #[error("v_threshold must be positive and finite, got {0}")] NonPositiveVThreshold(f64),
    #[error("uv_threshold must be positive and finite, got {0}")] NonPositiveUvThreshold(f64),
    #[error("round_decay must be finite and non-negative, got {0}")] InvalidRoundDecay(f64),
    #[error("donation ladder must start at zero")] LadderNotAnchored,
    #[error("donation ladder needs at least {min} points, got {got}")] LadderTooShort { min: usize, got: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalcError {
    #[error(transparent)] Config(#[from] ConfigError),
    #[error("calculation cancelled")] Cancelled,
    #[error("computation budget exceeded after {projects_done} projects")] BudgetExceeded { projects_done: usize },
    #[error("simulation for project {project} failed: {reason}")] Simulation { project: ProjectId, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("round data unavailable: {0}")] Unavailable(String),
    #[error("malformed round data: {0}")] Malformed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("failed to store curve for project {project}: {reason}")] Curve { project: ProjectId, reason: String },
    #[error("failed to store saturation metric: {0}")] Saturation(String),
    #[error("serialization: {0}")] Serialization(String),
    #[error("i/o: {0}")] Io(String),
}

#[derive(Error, Debug)]
pub enum ClrError {
    #[error(transparent)] Config(#[from] ConfigError),
    #[error(transparent)] Calc(#[from] CalcError),
    #[error(transparent)] Source(#[from] SourceError),
    #[error(transparent)] Persistence(#[from] PersistenceError),
}
