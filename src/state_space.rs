// src/state_space.rs
//
// Discretized state space: the full Cartesian grid over all features.
//
// Every state is a feature vector whose coordinates sit on one of `R`
// equally spaced grid values in [0,1]. States live in a flat arena indexed
// by sequential StateId; a reverse map from a canonical grid key supports
// exact lookup, and off-grid vectors resolve through `nearest`.

use std::collections::HashMap;

use crate::config::{Config, TerminalClause};
use crate::types::{EngineError, StateId, GRID_EPSILON};

#[derive(Debug)]
pub struct StateSpace {
    dims: usize,
    resolution: usize,
    /// Grid spacing, `1 / (resolution - 1)`.
    step: f64,
    /// Flat arena: `dims` values per state, row for state `id` at
    /// `id * dims .. (id + 1) * dims`.
    features: Vec<f64>,
    /// Canonical grid key -> state id.
    index: HashMap<String, StateId>,
    /// Terminal flag per state, precomputed at build time.
    terminal: Vec<bool>,
    terminal_clauses: Vec<TerminalClause>,
}

impl StateSpace {
    /// Enumerate the full grid. Fails with `StateSpaceTooLarge` if
    /// `resolution^dimensions` exceeds `cfg.max_states`.
    pub fn build(cfg: &Config) -> Result<Self, EngineError> {
        cfg.validate()?;

        let dims = cfg.dims();
        let resolution = cfg.resolution;

        let count = (resolution as u128)
            .checked_pow(dims as u32)
            .ok_or(EngineError::StateSpaceTooLarge {
                states: u128::MAX,
                ceiling: cfg.max_states,
            })?;
        if count > cfg.max_states as u128 {
            return Err(EngineError::StateSpaceTooLarge {
                states: count,
                ceiling: cfg.max_states,
            });
        }
        let n_states = count as usize;

        let step = 1.0 / (resolution - 1) as f64;

        let mut features = Vec::with_capacity(n_states * dims);
        let mut index = HashMap::with_capacity(n_states);
        let mut terminal = Vec::with_capacity(n_states);

        // Mixed-radix counter over per-dimension grid indices; the last
        // dimension varies fastest, so ids are lexicographic in the
        // index tuple.
        let mut indices = vec![0usize; dims];
        for id in 0..n_states {
            let row_start = features.len();
            for &i in &indices {
                features.push(i as f64 * step);
            }
            let row = &features[row_start..row_start + dims];

            index.insert(grid_key(&indices), id);
            terminal.push(clauses_hold(&cfg.terminal, row));

            // Advance the counter.
            for d in (0..dims).rev() {
                indices[d] += 1;
                if indices[d] < resolution {
                    break;
                }
                indices[d] = 0;
            }
        }

        Ok(Self {
            dims,
            resolution,
            step,
            features,
            index,
            terminal,
            terminal_clauses: cfg.terminal.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.terminal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terminal.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Feature vector of a state in the arena.
    pub fn features(&self, id: StateId) -> &[f64] {
        let start = id * self.dims;
        &self.features[start..start + self.dims]
    }

    pub fn is_terminal(&self, id: StateId) -> bool {
        self.terminal[id]
    }

    /// Terminal predicate over an arbitrary feature vector.
    pub fn is_terminal_features(&self, values: &[f64]) -> bool {
        clauses_hold(&self.terminal_clauses, values)
    }

    /// Exact lookup: `Some(id)` only if every coordinate sits on a grid
    /// point (within `GRID_EPSILON`). Off-grid vectors return `None`;
    /// callers fall back to `nearest`.
    pub fn lookup(&self, values: &[f64]) -> Result<Option<StateId>, EngineError> {
        self.check_dims(values)?;

        let mut indices = Vec::with_capacity(self.dims);
        for &v in values {
            let i = (v / self.step).round();
            if i < 0.0 || i >= self.resolution as f64 {
                return Ok(None);
            }
            if (v - i * self.step).abs() > GRID_EPSILON {
                return Ok(None);
            }
            indices.push(i as usize);
        }

        Ok(self.index.get(&grid_key(&indices)).copied())
    }

    /// Euclidean-nearest enumerated state for an arbitrary vector.
    ///
    /// On a uniform grid this reduces to clamping each coordinate to
    /// [0,1] and rounding it to the closest grid index independently.
    /// Exact halfway ties resolve to the lower index, which is also the
    /// lower state id.
    pub fn nearest(&self, values: &[f64]) -> Result<StateId, EngineError> {
        self.check_dims(values)?;
        Ok(self.snap_to_id(values))
    }

    /// Clamp + snap a vector onto the grid and return the state id.
    /// Assumes dimensionality was already checked.
    pub(crate) fn snap_to_id(&self, values: &[f64]) -> StateId {
        let mut id = 0usize;
        for &v in values {
            let clamped = v.clamp(0.0, 1.0);
            // ceil(x - 0.5) rounds halfway cases down, keeping the
            // lower-id state on ties.
            let i = ((clamped / self.step) - 0.5).ceil().max(0.0) as usize;
            let i = i.min(self.resolution - 1);
            id = id * self.resolution + i;
        }
        id
    }

    fn check_dims(&self, values: &[f64]) -> Result<(), EngineError> {
        if values.len() != self.dims {
            return Err(EngineError::InvalidFeatureVector {
                expected: self.dims,
                got: values.len(),
            });
        }
        Ok(())
    }
}

fn clauses_hold(clauses: &[TerminalClause], values: &[f64]) -> bool {
    clauses
        .iter()
        .all(|c| values[c.feature] >= c.min_value - GRID_EPSILON)
}

fn grid_key(indices: &[usize]) -> String {
    let mut key = String::with_capacity(indices.len() * 3);
    for (d, i) in indices.iter().enumerate() {
        if d > 0 {
            key.push(':');
        }
        key.push_str(&i.to_string());
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TerminalClause;

    fn two_by_three() -> Config {
        let mut cfg = Config::default();
        cfg.features = vec!["x".to_string(), "y".to_string()];
        cfg.resolution = 3;
        cfg.reward.weights = vec![1.0, 1.0];
        cfg.reward.error_feature = None;
        cfg.reward.terminal_bonuses.clear();
        cfg.actions.truncate(1);
        cfg.actions[0].deltas = vec![(0, 0.5)];
        cfg.actions[0].prerequisites.clear();
        cfg.terminal = vec![TerminalClause {
            feature: 0,
            min_value: 1.0,
        }];
        cfg
    }

    #[test]
    fn enumerates_full_cartesian_product() {
        let space = StateSpace::build(&two_by_three()).unwrap();
        assert_eq!(space.len(), 9);
        assert_eq!(space.features(0), &[0.0, 0.0]);
        // Last dimension varies fastest.
        assert_eq!(space.features(1), &[0.0, 0.5]);
        assert_eq!(space.features(3), &[0.5, 0.0]);
        assert_eq!(space.features(8), &[1.0, 1.0]);
    }

    #[test]
    fn ceiling_is_enforced() {
        let mut cfg = two_by_three();
        cfg.max_states = 8;
        let err = StateSpace::build(&cfg).unwrap_err();
        match err {
            EngineError::StateSpaceTooLarge { states, ceiling } => {
                assert_eq!(states, 9);
                assert_eq!(ceiling, 8);
            }
            other => panic!("expected StateSpaceTooLarge, got {other}"),
        }
    }

    #[test]
    fn exact_lookup_and_off_grid_miss() {
        let space = StateSpace::build(&two_by_three()).unwrap();
        assert_eq!(space.lookup(&[0.5, 1.0]).unwrap(), Some(5));
        assert_eq!(space.lookup(&[0.4, 1.0]).unwrap(), None);
    }

    #[test]
    fn lookup_rejects_wrong_dimensionality() {
        let space = StateSpace::build(&two_by_three()).unwrap();
        let err = space.lookup(&[0.5]).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidFeatureVector {
                expected: 2,
                got: 1
            }
        ));
    }

    #[test]
    fn nearest_snaps_and_clamps() {
        let space = StateSpace::build(&two_by_three()).unwrap();
        // 0.4 -> 0.5, 1.3 -> 1.0
        assert_eq!(space.nearest(&[0.4, 1.3]).unwrap(), 5);
        // Halfway ties go to the lower grid index.
        assert_eq!(space.nearest(&[0.25, 0.0]).unwrap(), 0);
        // Negative values clamp to 0.
        assert_eq!(space.nearest(&[-0.2, -0.2]).unwrap(), 0);
    }

    #[test]
    fn terminal_flags_follow_clauses() {
        let space = StateSpace::build(&two_by_three()).unwrap();
        assert!(space.is_terminal(6)); // [1.0, 0.0]
        assert!(space.is_terminal(8)); // [1.0, 1.0]
        assert!(!space.is_terminal(0));
        assert!(space.is_terminal_features(&[1.0, 0.3]));
        assert!(!space.is_terminal_features(&[0.5, 0.3]));
    }
}
