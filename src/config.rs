// src/config.rs
//
// Central configuration for the decision engine.
// This is the single source of truth for the feature schema, grid
// resolution, the action set with its effect rules, reward shaping,
// terminal predicate, and solver hyperparameters.
//
// Feature references throughout the config are indices into `features`;
// the names themselves only appear in telemetry and the CLI header.

use serde::{Deserialize, Serialize};

use crate::types::EngineError;

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Human-readable config / release version.
    pub version: &'static str,
    /// Ordered feature names. Dimensionality is fixed at construction.
    pub features: Vec<String>,
    /// Grid points per dimension (`R`). Feature values snap to
    /// `i / (R - 1)` for `i` in `0..R`. Must be >= 2.
    pub resolution: usize,
    /// Hard ceiling on `resolution^dimensions`; building the state space
    /// fails with `StateSpaceTooLarge` beyond it.
    pub max_states: usize,
    /// Fixed, ordered action set. No dynamic actions at runtime.
    pub actions: Vec<ActionConfig>,
    /// Two-outcome transition kernel parameters.
    pub transition: TransitionConfig,
    /// Reward shaping weights and bonuses.
    pub reward: RewardConfig,
    /// Terminal predicate: every clause must hold (conjunction).
    pub terminal: Vec<TerminalClause>,
    /// Solver hyperparameters.
    pub solver: SolverConfig,
}

/// One action and its declarative domain effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionConfig {
    /// Stable identifier used in logs (e.g. "verify").
    pub id: String,
    /// Feature deltas applied on success: (feature index, delta).
    /// The resulting vector is clamped to [0,1] and snapped to the grid.
    pub deltas: Vec<(usize, f64)>,
    /// Prerequisites: (feature index, minimum value). The action's effect
    /// lands with `p_success` only if the source state satisfies all of
    /// these, else with `p_fail`.
    pub prerequisites: Vec<(usize, f64)>,
    /// Fixed per-action cost subtracted from the reward.
    pub cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionConfig {
    /// Probability the effect is applied when prerequisites are met.
    pub p_success: f64,
    /// Probability the effect is applied when prerequisites are NOT met.
    /// Complement mass self-loops back to the source state in both cases.
    pub p_fail: f64,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            p_success: 0.9,
            p_fail: 0.1,
        }
    }
}

/// Reward shaping configuration.
///
/// The per-step reward is
/// `sum_k weights[k] * (next[k] - state[k]) - actions[a].cost
///  - error_penalty * max(0, next[err] - state[err]) + terminal_bonus(next)`.
///
/// Weight normalization is the caller's business: the engine does not
/// enforce that weights sum to any particular value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardConfig {
    /// Per-feature weight on the feature delta, same order as `features`.
    pub weights: Vec<f64>,
    /// Index of the error-rate feature, if any.
    pub error_feature: Option<usize>,
    /// Penalty weight on *increases* of the error feature.
    pub error_penalty: f64,
    /// Goodness bonuses granted when the next state is terminal and the
    /// named feature meets its threshold.
    pub terminal_bonuses: Vec<BonusClause>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalClause {
    pub feature: usize,
    pub min_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BonusClause {
    pub feature: usize,
    pub min_value: f64,
    pub bonus: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Discount factor, in [0, 1).
    pub gamma: f64,
    /// Convergence threshold on the max per-state value change.
    pub epsilon: f64,
    /// Outer iteration cap for value iteration / policy iteration.
    pub max_iterations: usize,
    /// Sub-iteration cap for policy evaluation inside policy iteration.
    pub eval_max_iterations: usize,
    /// Worker threads for the Bellman sweep. 1 = serial.
    pub num_threads: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            gamma: 0.95,
            epsilon: 1e-6,
            max_iterations: 500,
            eval_max_iterations: 200,
            num_threads: 1,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        // Default five-stage analysis workflow. One grid step is
        // 1/(resolution-1); action deltas are expressed in those steps.
        let step = 1.0 / 3.0;

        Self {
            version: "praxis-0.1.0",
            features: vec![
                "completeness".to_string(),
                "accuracy".to_string(),
                "compliance".to_string(),
                "error_rate".to_string(),
                "progress".to_string(),
            ],
            resolution: 4,
            max_states: 100_000,
            actions: vec![
                ActionConfig {
                    id: "collect".to_string(),
                    deltas: vec![(0, step)],
                    prerequisites: vec![],
                    cost: 0.05,
                },
                ActionConfig {
                    id: "verify".to_string(),
                    deltas: vec![(1, step)],
                    prerequisites: vec![(0, step)],
                    cost: 0.05,
                },
                ActionConfig {
                    id: "remediate".to_string(),
                    deltas: vec![(2, step), (3, -step)],
                    prerequisites: vec![(1, step)],
                    cost: 0.08,
                },
                ActionConfig {
                    id: "finalize".to_string(),
                    deltas: vec![(4, step)],
                    prerequisites: vec![(0, 2.0 * step), (1, 2.0 * step)],
                    cost: 0.02,
                },
            ],
            transition: TransitionConfig::default(),
            reward: RewardConfig {
                weights: vec![0.2, 0.25, 0.25, -0.1, 0.2],
                error_feature: Some(3),
                error_penalty: 0.5,
                terminal_bonuses: vec![
                    BonusClause {
                        feature: 2,
                        min_value: 0.9,
                        bonus: 1.0,
                    },
                    BonusClause {
                        feature: 1,
                        min_value: 0.9,
                        bonus: 0.8,
                    },
                ],
            },
            terminal: vec![TerminalClause {
                feature: 4,
                min_value: 1.0,
            }],
            solver: SolverConfig::default(),
        }
    }
}

impl Config {
    /// Number of feature dimensions.
    pub fn dims(&self) -> usize {
        self.features.len()
    }

    /// Number of configured actions.
    pub fn num_actions(&self) -> usize {
        self.actions.len()
    }

    /// Validate internal consistency. Called by `StateSpace::build`;
    /// callers assembling configs by hand can also call it directly.
    pub fn validate(&self) -> Result<(), EngineError> {
        let dims = self.dims();

        if dims == 0 {
            return Err(EngineError::InvalidConfig {
                field: "features".to_string(),
                message: "at least one feature is required".to_string(),
            });
        }
        if self.resolution < 2 {
            return Err(EngineError::InvalidConfig {
                field: "resolution".to_string(),
                message: "grid resolution must be >= 2".to_string(),
            });
        }
        if self.actions.is_empty() {
            return Err(EngineError::InvalidConfig {
                field: "actions".to_string(),
                message: "at least one action is required".to_string(),
            });
        }
        if self.reward.weights.len() != dims {
            return Err(EngineError::InvalidConfig {
                field: "reward.weights".to_string(),
                message: format!(
                    "expected {} weights (one per feature), got {}",
                    dims,
                    self.reward.weights.len()
                ),
            });
        }

        for (i, action) in self.actions.iter().enumerate() {
            for &(feature, _) in action.deltas.iter().chain(action.prerequisites.iter()) {
                if feature >= dims {
                    return Err(EngineError::InvalidConfig {
                        field: format!("actions[{}]", i),
                        message: format!(
                            "feature index {} out of range for {} dimensions",
                            feature, dims
                        ),
                    });
                }
            }
        }

        for clause in &self.terminal {
            if clause.feature >= dims {
                return Err(EngineError::InvalidConfig {
                    field: "terminal".to_string(),
                    message: format!(
                        "feature index {} out of range for {} dimensions",
                        clause.feature, dims
                    ),
                });
            }
        }
        for clause in &self.reward.terminal_bonuses {
            if clause.feature >= dims {
                return Err(EngineError::InvalidConfig {
                    field: "reward.terminal_bonuses".to_string(),
                    message: format!(
                        "feature index {} out of range for {} dimensions",
                        clause.feature, dims
                    ),
                });
            }
        }
        if let Some(err) = self.reward.error_feature {
            if err >= dims {
                return Err(EngineError::InvalidConfig {
                    field: "reward.error_feature".to_string(),
                    message: format!(
                        "feature index {} out of range for {} dimensions",
                        err, dims
                    ),
                });
            }
        }

        for (field, p) in [
            ("transition.p_success", self.transition.p_success),
            ("transition.p_fail", self.transition.p_fail),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(EngineError::InvalidConfig {
                    field: field.to_string(),
                    message: format!("probability {} outside [0, 1]", p),
                });
            }
        }

        if !(0.0..1.0).contains(&self.solver.gamma) {
            return Err(EngineError::InvalidConfig {
                field: "solver.gamma".to_string(),
                message: format!("discount factor {} outside [0, 1)", self.solver.gamma),
            });
        }
        if self.solver.epsilon <= 0.0 {
            return Err(EngineError::InvalidConfig {
                field: "solver.epsilon".to_string(),
                message: "convergence threshold must be positive".to_string(),
            });
        }
        if self.solver.max_iterations == 0 || self.solver.eval_max_iterations == 0 {
            return Err(EngineError::InvalidConfig {
                field: "solver.max_iterations".to_string(),
                message: "iteration caps must be >= 1".to_string(),
            });
        }
        if self.solver.num_threads == 0 {
            return Err(EngineError::InvalidConfig {
                field: "solver.num_threads".to_string(),
                message: "num_threads must be >= 1".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        Config::default().validate().expect("default config");
    }

    #[test]
    fn bad_weight_count_rejected() {
        let mut cfg = Config::default();
        cfg.reward.weights.pop();
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig { .. }));
    }

    #[test]
    fn out_of_range_action_feature_rejected() {
        let mut cfg = Config::default();
        cfg.actions[0].deltas.push((99, 0.1));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn gamma_must_be_below_one() {
        let mut cfg = Config::default();
        cfg.solver.gamma = 1.0;
        assert!(cfg.validate().is_err());
    }
}
