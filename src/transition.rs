// src/transition.rs
//
// Sparse two-outcome transition model built from declarative action
// effects.
//
// For each non-terminal (state, action) pair the model stores the
// distribution over next states: the "ideal" next state (effect deltas
// applied, clamped, snapped back onto the grid) with probability
// p_success when prerequisites hold (p_fail otherwise), and the
// complement mass self-looping on the source state.
//
// Pairs with no stored distribution - terminal states, or effects that
// land exactly back on the source - read as a guaranteed self-loop.

use std::borrow::Cow;
use std::collections::HashMap;

use crate::config::Config;
use crate::state_space::StateSpace;
use crate::types::{ActionId, EngineError, StateId, GRID_EPSILON, PROB_EPSILON};

pub struct TransitionModel {
    num_actions: usize,
    /// Sparse storage keyed by (state, action). Keeps memory near
    /// O(states x actions) instead of a dense next-state tensor.
    map: HashMap<(StateId, ActionId), Vec<(StateId, f64)>>,
}

impl TransitionModel {
    /// Materialize the kernel for every non-terminal (state, action) pair.
    pub fn build(space: &StateSpace, cfg: &Config) -> Result<Self, EngineError> {
        let num_actions = cfg.num_actions();
        let mut map = HashMap::new();

        let mut next = vec![0.0; space.dims()];

        for s in 0..space.len() {
            if space.is_terminal(s) {
                continue;
            }
            let src = space.features(s);

            for (a, action) in cfg.actions.iter().enumerate() {
                next.copy_from_slice(src);
                for &(feature, delta) in &action.deltas {
                    next[feature] = (next[feature] + delta).clamp(0.0, 1.0);
                }
                let ideal = space.snap_to_id(&next);

                let satisfied = action
                    .prerequisites
                    .iter()
                    .all(|&(feature, min)| src[feature] >= min - GRID_EPSILON);
                let p = if satisfied {
                    cfg.transition.p_success
                } else {
                    cfg.transition.p_fail
                };

                let dist = if ideal == s || p >= 1.0 - PROB_EPSILON {
                    vec![(ideal, 1.0)]
                } else if p <= PROB_EPSILON {
                    vec![(s, 1.0)]
                } else {
                    vec![(ideal, p), (s, 1.0 - p)]
                };

                map.insert((s, a), dist);
            }
        }

        let model = Self { num_actions, map };
        model.validate()?;
        Ok(model)
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    /// Stored distribution for a pair, if one was registered.
    pub fn get(&self, state: StateId, action: ActionId) -> Option<&[(StateId, f64)]> {
        self.map.get(&(state, action)).map(Vec::as_slice)
    }

    /// Distribution for a pair; unregistered pairs read as a guaranteed
    /// self-loop, never an error.
    pub fn distribution(&self, state: StateId, action: ActionId) -> Cow<'_, [(StateId, f64)]> {
        match self.get(state, action) {
            Some(dist) => Cow::Borrowed(dist),
            None => Cow::Owned(vec![(state, 1.0)]),
        }
    }

    /// Probability conservation: every registered distribution must sum
    /// to 1 within PROB_EPSILON.
    pub fn validate(&self) -> Result<(), EngineError> {
        for (&(s, a), dist) in &self.map {
            let mass: f64 = dist.iter().map(|&(_, p)| p).sum();
            if (mass - 1.0).abs() > PROB_EPSILON {
                return Err(EngineError::InvalidConfig {
                    field: "transition".to_string(),
                    message: format!(
                        "distribution for state {} action {} sums to {}",
                        s, a, mass
                    ),
                });
            }
        }
        Ok(())
    }

    /// Number of registered (state, action) pairs.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
