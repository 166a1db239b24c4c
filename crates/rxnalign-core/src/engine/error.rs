use super::config::ConfigError;
use super::objectives::ScoringError;
use crate::core::models::side::ModelError;
use thiserror::Error;

/// Failures of the geometric alignment scorer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AlignmentError {
    #[error("Invalid alignment configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Shape mismatch for {what}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Invalid {side} rigid groups: {source}")]
    InvalidGroups {
        side: &'static str,
        #[source]
        source: ModelError,
    },

    #[error("The {side} side has no atoms")]
    EmptySide { side: &'static str },

    #[error("Match weight at ({row}, {col}) is {value}; weights must be finite and non-negative")]
    InvalidWeight { row: usize, col: usize, value: f64 },

    #[error(
        "Reactant group {reactant_group} and product group {product_group} have total match weight {total_weight}, too small to define an alignment"
    )]
    IllPosedBlock {
        reactant_group: usize,
        product_group: usize,
        total_weight: f64,
    },

    #[error(
        "Alignment system for reactant group {reactant_group} and product group {product_group} is not symmetric (asymmetry {asymmetry:e})"
    )]
    AsymmetricSystem {
        reactant_group: usize,
        product_group: usize,
        asymmetry: f64,
    },

    #[error(
        "Rotation between reactant group {reactant_group} and product group {product_group} is ambiguous (relative eigenvalue gap {gap:e})"
    )]
    DegenerateRotation {
        reactant_group: usize,
        product_group: usize,
        gap: f64,
    },

    #[error(
        "Constrained alignment did not converge after {iterations} iterations (objective {objective}, max constraint residual {max_constraint_violation:e})"
    )]
    NotConverged {
        iterations: usize,
        objective: f64,
        max_constraint_violation: f64,
    },

    #[error("Alignment produced a non-finite squared distance at ({row}, {col})")]
    NonFinite { row: usize, col: usize },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Invalid reaction model: {source}")]
    Model {
        #[from]
        source: ModelError,
    },

    #[error("Alignment failed: {source}")]
    Alignment {
        #[from]
        source: AlignmentError,
    },

    #[error("Scoring failed: {source}")]
    Scoring {
        #[from]
        source: ScoringError,
    },
}
