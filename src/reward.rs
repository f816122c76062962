// src/reward.rs
//
// Pure reward function over (state, action, next state).
//
// r = sum_k w_k * (next_k - state_k)
//     - cost(action)
//     - error_penalty * max(0, next_err - state_err)
//     + terminal_bonus(next)
//
// Rewards are always recomputed from feature vectors, never cached.

use crate::config::{BonusClause, Config, TerminalClause};
use crate::types::{ActionId, EngineError, GRID_EPSILON};

pub struct RewardFunction {
    weights: Vec<f64>,
    costs: Vec<f64>,
    error_feature: Option<usize>,
    error_penalty: f64,
    terminal_bonuses: Vec<BonusClause>,
    terminal_clauses: Vec<TerminalClause>,
}

impl RewardFunction {
    pub fn new(cfg: &Config) -> Result<Self, EngineError> {
        cfg.validate()?;
        Ok(Self {
            weights: cfg.reward.weights.clone(),
            costs: cfg.actions.iter().map(|a| a.cost).collect(),
            error_feature: cfg.reward.error_feature,
            error_penalty: cfg.reward.error_penalty,
            terminal_bonuses: cfg.reward.terminal_bonuses.clone(),
            terminal_clauses: cfg.terminal.clone(),
        })
    }

    /// Scalar reward for one transition. Feature vectors are assumed to
    /// have the configured dimensionality (they come from the arena).
    pub fn reward(&self, state: &[f64], action: ActionId, next: &[f64]) -> f64 {
        let mut r = 0.0;
        for (k, w) in self.weights.iter().enumerate() {
            r += w * (next[k] - state[k]);
        }

        r -= self.costs[action];

        if let Some(err) = self.error_feature {
            let increase = (next[err] - state[err]).max(0.0);
            r -= self.error_penalty * increase;
        }

        if self.is_terminal(next) {
            for clause in &self.terminal_bonuses {
                if next[clause.feature] >= clause.min_value - GRID_EPSILON {
                    r += clause.bonus;
                }
            }
        }

        r
    }

    /// Action-validated variant for external callers.
    pub fn try_reward(
        &self,
        state: &[f64],
        action: ActionId,
        next: &[f64],
    ) -> Result<f64, EngineError> {
        if action >= self.costs.len() {
            return Err(EngineError::InvalidAction {
                action,
                num_actions: self.costs.len(),
            });
        }
        if state.len() != self.weights.len() || next.len() != self.weights.len() {
            return Err(EngineError::InvalidFeatureVector {
                expected: self.weights.len(),
                got: if state.len() != self.weights.len() {
                    state.len()
                } else {
                    next.len()
                },
            });
        }
        Ok(self.reward(state, action, next))
    }

    fn is_terminal(&self, values: &[f64]) -> bool {
        self.terminal_clauses
            .iter()
            .all(|c| values[c.feature] >= c.min_value - GRID_EPSILON)
    }
}
