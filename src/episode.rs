// src/episode.rs
//
// Sequential trajectory execution against a solved policy.
//
// Each step resolves the current state, takes the greedy action, samples
// the next state from the transition model, and records the transition.
// The runner never mutates solver output; the trajectory it produces is
// caller-owned. Steps within one trajectory are inherently sequential;
// independent trajectories can run concurrently against the same shared
// policy slice.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::logging::{EventSink, NoopSink};
use crate::metrics::OnlineStats;
use crate::reward::RewardFunction;
use crate::state_space::StateSpace;
use crate::transition::TransitionModel;
use crate::types::{ActionId, EngineError, StateId};

/// A single recorded transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step index within the episode.
    pub step: usize,
    pub state: StateId,
    pub action: ActionId,
    /// Undiscounted reward for this transition.
    pub reward: f64,
    pub next_state: StateId,
    /// True when the state was resolved through the nearest-state
    /// fallback rather than an exact grid lookup.
    pub approximated: bool,
}

/// One completed (or truncated) trajectory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub steps: Vec<StepRecord>,
    /// Discounted return realized along the trajectory.
    pub total_reward: f64,
    /// False when the run was truncated by the step budget before
    /// reaching a terminal state. A soft failure, not an error.
    pub terminated: bool,
}

/// Summary of a batch of independent episodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub episodes: usize,
    pub terminated: usize,
    pub mean_reward: f64,
    pub stddev_reward: f64,
    pub min_reward: f64,
    pub max_reward: f64,
    pub mean_length: f64,
}

pub struct EpisodeRunner<'a> {
    space: &'a StateSpace,
    model: &'a TransitionModel,
    reward: &'a RewardFunction,
    policy: &'a [ActionId],
    gamma: f64,
    /// Deterministic mode picks the highest-probability outcome instead
    /// of sampling (ties to the lowest next-state id). For tests.
    deterministic: bool,
    rng: ChaCha8Rng,
}

impl<'a> EpisodeRunner<'a> {
    pub fn new(
        space: &'a StateSpace,
        model: &'a TransitionModel,
        reward: &'a RewardFunction,
        policy: &'a [ActionId],
        gamma: f64,
    ) -> Self {
        Self {
            space,
            model,
            reward,
            policy,
            gamma,
            deterministic: false,
            rng: ChaCha8Rng::seed_from_u64(0),
        }
    }

    /// Reseed the sampling RNG. Identical seeds replay identical
    /// trajectories.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    pub fn set_deterministic(&mut self, deterministic: bool) {
        self.deterministic = deterministic;
    }

    /// Run one trajectory from `initial` for at most `max_steps` steps.
    pub fn run(&mut self, initial: &[f64], max_steps: usize) -> Result<Episode, EngineError> {
        self.run_with(initial, max_steps, &mut NoopSink)
    }

    pub fn run_with(
        &mut self,
        initial: &[f64],
        max_steps: usize,
        sink: &mut dyn EventSink,
    ) -> Result<Episode, EngineError> {
        let num_actions = self.model.num_actions();

        // Resolve the entry point: exact lookup, then nearest fallback
        // with a logged approximation notice.
        let (mut state, mut approximated) = match self.space.lookup(initial)? {
            Some(id) => (id, false),
            None => {
                let id = self.space.nearest(initial)?;
                sink.log_approximation(initial, id);
                (id, true)
            }
        };

        let mut steps = Vec::new();
        let mut total_reward = 0.0;
        let mut discount = 1.0;
        let mut terminated = false;

        for step in 0..max_steps {
            // No action is ever taken from a terminal state.
            if self.space.is_terminal(state) {
                terminated = true;
                break;
            }

            let action = self.policy[state];
            if action >= num_actions {
                return Err(EngineError::InvalidAction {
                    action,
                    num_actions,
                });
            }

            let next_state = self.pick_next(state, action);
            let reward = self
                .reward
                .reward(self.space.features(state), action, self.space.features(next_state));

            total_reward += discount * reward;
            discount *= self.gamma;

            let record = StepRecord {
                step,
                state,
                action,
                reward,
                next_state,
                approximated,
            };
            sink.log_step(&record);
            steps.push(record);

            state = next_state;
            // Only the entry point can be off-grid; every sampled next
            // state is an exact arena state.
            approximated = false;
        }

        // The loop can exhaust the budget exactly when entering a
        // terminal state.
        if !terminated && self.space.is_terminal(state) {
            terminated = true;
        }

        Ok(Episode {
            steps,
            total_reward,
            terminated,
        })
    }

    /// Run `episodes` independent trajectories, seeding run `i` with
    /// `base_seed + i`, and summarize the returns.
    pub fn run_batch(
        &mut self,
        initial: &[f64],
        max_steps: usize,
        episodes: usize,
        base_seed: u64,
    ) -> Result<BatchSummary, EngineError> {
        let mut reward_stats = OnlineStats::default();
        let mut length_sum = 0usize;
        let mut terminated = 0usize;

        for i in 0..episodes {
            self.set_seed(base_seed.wrapping_add(i as u64));
            let episode = self.run(initial, max_steps)?;
            reward_stats.add(episode.total_reward);
            length_sum += episode.steps.len();
            if episode.terminated {
                terminated += 1;
            }
        }

        Ok(BatchSummary {
            episodes,
            terminated,
            mean_reward: reward_stats.mean(),
            stddev_reward: reward_stats.stddev_population(),
            min_reward: reward_stats.min(),
            max_reward: reward_stats.max(),
            mean_length: if episodes == 0 {
                0.0
            } else {
                length_sum as f64 / episodes as f64
            },
        })
    }

    /// Sample (or deterministically pick) a next state from the
    /// transition distribution for (state, action).
    fn pick_next(&mut self, state: StateId, action: ActionId) -> StateId {
        let dist = self.model.distribution(state, action);
        let outcomes = dist.as_ref();

        if self.deterministic {
            let mut best = 0;
            for (i, &(ns, p)) in outcomes.iter().enumerate().skip(1) {
                let (bns, bp) = outcomes[best];
                if p > bp || (p == bp && ns < bns) {
                    best = i;
                }
            }
            return outcomes[best].0;
        }

        let draw: f64 = self.rng.gen();
        let mut cumulative = 0.0;
        for &(ns, p) in outcomes {
            cumulative += p;
            if draw < cumulative {
                return ns;
            }
        }
        // Guard against cumulative rounding just below 1.0.
        outcomes[outcomes.len() - 1].0
    }
}
