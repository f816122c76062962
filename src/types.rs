// src/types.rs
//
// Shared primitive types for the decision engine.
// - StateId / ActionId: integer handles into the state arena / action set.
// - EngineError: the error surface of the whole crate.

use std::fmt;

/// Integer handle for a discretized state in the arena.
pub type StateId = usize;

/// Integer handle into the fixed, ordered action set.
pub type ActionId = usize;

/// Tolerance used when checking that a transition distribution sums to 1.
pub const PROB_EPSILON: f64 = 1e-6;

/// Tolerance used when deciding whether a feature value sits exactly on
/// a grid point (exact lookup vs. nearest-state fallback).
pub const GRID_EPSILON: f64 = 1e-9;

/// Errors raised by the decision engine.
///
/// Non-convergence is deliberately NOT an error: a solve that hits its
/// iteration cap reports `SolveStatus::MaxIterationsReached` and still
/// yields a usable (if possibly suboptimal) policy.
#[derive(Debug, Clone)]
pub enum EngineError {
    /// `resolution^dimensions` exceeds the configured state-count ceiling.
    StateSpaceTooLarge { states: u128, ceiling: usize },
    /// An action id outside the configured action set was supplied.
    InvalidAction { action: ActionId, num_actions: usize },
    /// A feature vector of the wrong dimensionality was supplied.
    InvalidFeatureVector { expected: usize, got: usize },
    /// A snapshot was solved against a different engine configuration.
    IncompatiblePolicy { expected: String, got: String },
    /// A configuration field failed validation.
    InvalidConfig { field: String, message: String },
    /// Snapshot file I/O or (de)serialization failure.
    Io { path: String, source: String },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::StateSpaceTooLarge { states, ceiling } => {
                write!(
                    f,
                    "state space of {} states exceeds configured ceiling of {}",
                    states, ceiling
                )
            }
            EngineError::InvalidAction {
                action,
                num_actions,
            } => {
                write!(
                    f,
                    "action id {} outside configured action set (0..{})",
                    action, num_actions
                )
            }
            EngineError::InvalidFeatureVector { expected, got } => {
                write!(
                    f,
                    "feature vector has {} dimensions, engine configured for {}",
                    got, expected
                )
            }
            EngineError::IncompatiblePolicy { expected, got } => {
                write!(
                    f,
                    "snapshot config hash {} does not match engine config hash {}",
                    got, expected
                )
            }
            EngineError::InvalidConfig { field, message } => {
                write!(f, "invalid config field '{}': {}", field, message)
            }
            EngineError::Io { path, source } => {
                write!(f, "snapshot I/O failed for '{}': {}", path, source)
            }
        }
    }
}

impl std::error::Error for EngineError {}
