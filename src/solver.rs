// src/solver.rs
//
// Dynamic-programming solver over the discretized state space.
// - Value iteration: double-buffered Bellman sweeps until the max
//   per-state change drops below epsilon or the iteration cap is hit.
// - Policy iteration: iterative policy evaluation alternating with
//   greedy improvement until the policy is stable.
//
// Both paths publish results only after the sweep loop finishes
// (swap-on-completion), so concurrent readers of a previous solve never
// observe a half-updated value function. Sweeps read exclusively from
// the previous buffer and write disjoint chunks of the next one, which
// is what makes the optional multi-threaded sweep safe and bit-identical
// to the serial one.
//
// Non-convergence is a normal terminal state (MaxIterationsReached),
// not an error; callers must check the report.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use serde::{Deserialize, Serialize};

use crate::config::SolverConfig;
use crate::logging::{EventSink, NoopSink};
use crate::reward::RewardFunction;
use crate::state_space::StateSpace;
use crate::transition::TransitionModel;
use crate::types::{ActionId, EngineError, StateId};

/// Lifecycle of the solver itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    Uninitialized,
    Iterating,
    Converged,
    MaxIterationsReached,
}

/// Diagnostics for one solve.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SolveReport {
    pub status: SolveStatus,
    /// Outer iterations performed (sweeps for value iteration,
    /// evaluation/improvement rounds for policy iteration).
    pub iterations: usize,
    /// Max per-state value change in the last completed sweep. 0.0 when
    /// the solve was cancelled before any sweep ran (the report is JSON
    /// telemetry, so no non-finite sentinel).
    pub max_delta: f64,
    /// True when the solve stopped at a cooperative cancellation check.
    /// The published arrays are the partial result and remain usable.
    pub cancelled: bool,
}

impl SolveReport {
    pub fn converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }
}

pub struct ValueSolver<'a> {
    space: &'a StateSpace,
    model: &'a TransitionModel,
    reward: &'a RewardFunction,
    cfg: SolverConfig,
    /// V[s], len = n_states.
    v: Vec<f64>,
    /// Q[s][a], flat row-major, len = n_states * n_actions.
    q: Vec<f64>,
    /// pi[s], len = n_states.
    policy: Vec<ActionId>,
    status: SolveStatus,
}

impl<'a> ValueSolver<'a> {
    pub fn new(
        space: &'a StateSpace,
        model: &'a TransitionModel,
        reward: &'a RewardFunction,
        cfg: SolverConfig,
    ) -> Self {
        Self {
            space,
            model,
            reward,
            cfg,
            v: Vec::new(),
            q: Vec::new(),
            policy: Vec::new(),
            status: SolveStatus::Uninitialized,
        }
    }

    pub fn num_states(&self) -> usize {
        self.space.len()
    }

    pub fn num_actions(&self) -> usize {
        self.model.num_actions()
    }

    pub fn status(&self) -> SolveStatus {
        self.status
    }

    /// Converged value function. Empty before the first solve.
    pub fn value_function(&self) -> &[f64] {
        &self.v
    }

    /// Flat row-major Q-function, `n_actions` entries per state.
    pub fn q_function(&self) -> &[f64] {
        &self.q
    }

    pub fn q(&self, state: StateId, action: ActionId) -> f64 {
        self.q[state * self.num_actions() + action]
    }

    /// Greedy policy. Empty before the first solve.
    pub fn policy(&self) -> &[ActionId] {
        &self.policy
    }

    /// Greedy action for an arbitrary feature vector: exact grid lookup
    /// with nearest-state fallback.
    pub fn action_for(&self, features: &[f64]) -> Result<ActionId, EngineError> {
        let id = match self.space.lookup(features)? {
            Some(id) => id,
            None => self.space.nearest(features)?,
        };
        Ok(self.policy[id])
    }

    /// Value iteration with default hooks.
    pub fn value_iteration(&mut self) -> SolveReport {
        self.value_iteration_with(None, &mut NoopSink)
    }

    /// Value iteration with a cooperative cancellation flag (checked at
    /// sweep boundaries) and a telemetry sink.
    pub fn value_iteration_with(
        &mut self,
        cancel: Option<&AtomicBool>,
        sink: &mut dyn EventSink,
    ) -> SolveReport {
        let n = self.space.len();
        let na = self.model.num_actions();
        self.status = SolveStatus::Iterating;

        let mut v_prev = vec![0.0; n];
        let mut v_new = vec![0.0; n];
        let mut q = vec![0.0; n * na];

        let mut iterations = 0;
        let mut max_delta = 0.0;
        let mut cancelled = false;
        let mut status = SolveStatus::MaxIterationsReached;

        for iter in 1..=self.cfg.max_iterations {
            if let Some(flag) = cancel {
                if flag.load(Ordering::Relaxed) {
                    cancelled = true;
                    break;
                }
            }

            self.sweep(&v_prev, &mut v_new, &mut q);

            max_delta = buffer_delta(&v_prev, &v_new);
            iterations = iter;
            sink.log_sweep(iter, max_delta);

            std::mem::swap(&mut v_prev, &mut v_new);

            if max_delta <= self.cfg.epsilon {
                status = SolveStatus::Converged;
                break;
            }
        }

        // One extra backup against the final values gives a Q-function
        // consistent with V; the greedy policy falls out of it.
        self.sweep(&v_prev, &mut v_new, &mut q);
        let policy = extract_policy(&q, n, na);

        // Publish atomically from the caller's point of view.
        self.v = v_prev;
        self.q = q;
        self.policy = policy;
        self.status = status;

        SolveReport {
            status,
            iterations,
            max_delta,
            cancelled,
        }
    }

    /// Policy iteration with default hooks.
    pub fn policy_iteration(&mut self) -> SolveReport {
        self.policy_iteration_with(None, &mut NoopSink)
    }

    /// Policy iteration: alternate fixed-policy evaluation and greedy
    /// improvement until no state changes its action. Every full round
    /// yields a policy at least as good as the previous one.
    pub fn policy_iteration_with(
        &mut self,
        cancel: Option<&AtomicBool>,
        sink: &mut dyn EventSink,
    ) -> SolveReport {
        let n = self.space.len();
        let na = self.model.num_actions();
        self.status = SolveStatus::Iterating;

        let mut policy: Vec<ActionId> = vec![0; n];
        let mut v = vec![0.0; n];
        let mut q = vec![0.0; n * na];

        let mut iterations = 0;
        let mut max_delta = 0.0;
        let mut cancelled = false;
        let mut status = SolveStatus::MaxIterationsReached;

        for iter in 1..=self.cfg.max_iterations {
            if let Some(flag) = cancel {
                if flag.load(Ordering::Relaxed) {
                    cancelled = true;
                    break;
                }
            }

            // (a) Policy evaluation for the fixed current policy,
            // warm-started from the previous round's values.
            max_delta = self.evaluate_into(&policy, &mut v);
            iterations = iter;
            sink.log_sweep(iter, max_delta);

            // (b) Greedy improvement from the evaluated values.
            self.backup_all(&v, &mut q);
            let improved = extract_policy(&q, n, na);

            if improved == policy {
                status = SolveStatus::Converged;
                break;
            }
            policy = improved;
        }

        self.v = v;
        self.q = q;
        self.policy = policy;
        self.status = status;

        SolveReport {
            status,
            iterations,
            max_delta,
            cancelled,
        }
    }

    /// Evaluate an arbitrary policy to convergence (or the evaluation
    /// cap) and return its value function. The solver's own arrays are
    /// untouched.
    pub fn evaluate_policy(&self, policy: &[ActionId]) -> Result<Vec<f64>, EngineError> {
        let n = self.space.len();
        let na = self.model.num_actions();
        if policy.len() != n {
            return Err(EngineError::InvalidConfig {
                field: "policy".to_string(),
                message: format!("expected {} entries, got {}", n, policy.len()),
            });
        }
        if let Some(&bad) = policy.iter().find(|&&a| a >= na) {
            return Err(EngineError::InvalidAction {
                action: bad,
                num_actions: na,
            });
        }

        let mut v = vec![0.0; n];
        self.evaluate_into(policy, &mut v);
        Ok(v)
    }

    /// Iterate the fixed-policy Bellman backup on `v` in place (double
    /// buffered internally). Returns the max delta of the last sweep.
    fn evaluate_into(&self, policy: &[ActionId], v: &mut Vec<f64>) -> f64 {
        let mut v_new = vec![0.0; v.len()];
        let mut max_delta = f64::INFINITY;

        for _ in 0..self.cfg.eval_max_iterations {
            self.eval_sweep(policy, v, &mut v_new);
            max_delta = buffer_delta(v, &v_new);
            std::mem::swap(v, &mut v_new);
            if max_delta <= self.cfg.epsilon {
                break;
            }
        }

        max_delta
    }

    /// One full Bellman sweep: reads `v_prev`, writes `v_new` and `q`.
    /// Distributed across worker threads when configured; chunking does
    /// not change the arithmetic, so results match the serial sweep.
    fn sweep(&self, v_prev: &[f64], v_new: &mut [f64], q: &mut [f64]) {
        let na = self.model.num_actions();
        let threads = self.cfg.num_threads;
        let n = v_new.len();

        if threads <= 1 || n < 2 * threads {
            self.sweep_chunk(v_prev, 0, v_new, q);
            return;
        }

        let chunk = n.div_ceil(threads);
        thread::scope(|scope| {
            let mut start = 0;
            for (v_c, q_c) in v_new.chunks_mut(chunk).zip(q.chunks_mut(chunk * na)) {
                let s0 = start;
                start += v_c.len();
                scope.spawn(move || self.sweep_chunk(v_prev, s0, v_c, q_c));
            }
        });
    }

    /// Bellman backup for states `start .. start + v_out.len()`.
    fn sweep_chunk(&self, v_prev: &[f64], start: StateId, v_out: &mut [f64], q_out: &mut [f64]) {
        let na = self.model.num_actions();
        for (i, v_s) in v_out.iter_mut().enumerate() {
            let s = start + i;
            let q_row = &mut q_out[i * na..(i + 1) * na];

            // Terminal states are pinned at V = 0 with all-zero Q rows.
            if self.space.is_terminal(s) {
                *v_s = 0.0;
                q_row.fill(0.0);
                continue;
            }

            self.backup_state(s, v_prev, q_row);
            *v_s = q_row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        }
    }

    /// Q row for every state against a fixed value function.
    fn backup_all(&self, v: &[f64], q: &mut [f64]) {
        let na = self.model.num_actions();
        for s in 0..self.space.len() {
            let q_row = &mut q[s * na..(s + 1) * na];
            if self.space.is_terminal(s) {
                q_row.fill(0.0);
            } else {
                self.backup_state(s, v, q_row);
            }
        }
    }

    /// Q[s][a] = sum_{(s', p)} p * (r(s, a, s') + gamma * V[s']).
    fn backup_state(&self, s: StateId, v: &[f64], q_row: &mut [f64]) {
        let src = self.space.features(s);
        let gamma = self.cfg.gamma;
        for (a, q_sa) in q_row.iter_mut().enumerate() {
            let mut acc = 0.0;
            for &(ns, p) in self.model.distribution(s, a).iter() {
                let r = self.reward.reward(src, a, self.space.features(ns));
                acc += p * (r + gamma * v[ns]);
            }
            *q_sa = acc;
        }
    }

    /// Fixed-policy sweep for policy evaluation.
    fn eval_sweep(&self, policy: &[ActionId], v_prev: &[f64], v_new: &mut [f64]) {
        let gamma = self.cfg.gamma;
        for (s, v_s) in v_new.iter_mut().enumerate() {
            if self.space.is_terminal(s) {
                *v_s = 0.0;
                continue;
            }
            let src = self.space.features(s);
            let a = policy[s];
            let mut acc = 0.0;
            for &(ns, p) in self.model.distribution(s, a).iter() {
                let r = self.reward.reward(src, a, self.space.features(ns));
                acc += p * (r + gamma * v_prev[ns]);
            }
            *v_s = acc;
        }
    }

    /// Install arrays restored from a snapshot. Lengths were validated
    /// by the store against the config fingerprint.
    pub(crate) fn install(&mut self, policy: Vec<ActionId>, v: Vec<f64>, q: Vec<f64>) {
        self.policy = policy;
        self.v = v;
        self.q = q;
        self.status = SolveStatus::Converged;
    }
}

/// Greedy argmax per state; ties break to the lowest action id.
fn extract_policy(q: &[f64], n_states: usize, n_actions: usize) -> Vec<ActionId> {
    let mut policy = Vec::with_capacity(n_states);
    for s in 0..n_states {
        let row = &q[s * n_actions..(s + 1) * n_actions];
        let mut best = 0;
        for (a, &q_sa) in row.iter().enumerate().skip(1) {
            if q_sa > row[best] {
                best = a;
            }
        }
        policy.push(best);
    }
    policy
}

fn buffer_delta(v_prev: &[f64], v_new: &[f64]) -> f64 {
    v_prev
        .iter()
        .zip(v_new.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ActionConfig, Config, TerminalClause};

    /// The 1-feature, resolution-5 chain: states 0.0 .. 1.0, a single
    /// deterministic +0.25 action, +1 reward on entering the terminal
    /// state, gamma 0.9.
    fn chain() -> Config {
        let mut cfg = Config::default();
        cfg.features = vec!["progress".to_string()];
        cfg.resolution = 5;
        cfg.reward.weights = vec![0.0];
        cfg.reward.error_feature = None;
        cfg.reward.terminal_bonuses = vec![crate::config::BonusClause {
            feature: 0,
            min_value: 1.0,
            bonus: 1.0,
        }];
        cfg.actions = vec![ActionConfig {
            id: "advance".to_string(),
            deltas: vec![(0, 0.25)],
            prerequisites: vec![(0, 0.0)],
            cost: 0.0,
        }];
        cfg.transition.p_success = 1.0;
        cfg.terminal = vec![TerminalClause {
            feature: 0,
            min_value: 1.0,
        }];
        cfg.solver.gamma = 0.9;
        cfg.solver.epsilon = 1e-9;
        cfg
    }

    struct Parts {
        space: StateSpace,
        model: TransitionModel,
        reward: RewardFunction,
        solver_cfg: SolverConfig,
    }

    fn build(cfg: &Config) -> Parts {
        let space = StateSpace::build(cfg).unwrap();
        let model = TransitionModel::build(&space, cfg).unwrap();
        let reward = RewardFunction::new(cfg).unwrap();
        Parts {
            space,
            model,
            reward,
            solver_cfg: cfg.solver.clone(),
        }
    }

    #[test]
    fn chain_values_match_discounted_returns() {
        let cfg = chain();
        let p = build(&cfg);
        let mut solver = ValueSolver::new(&p.space, &p.model, &p.reward, p.solver_cfg);

        let report = solver.value_iteration();
        assert!(report.converged());
        assert!(!report.cancelled);

        let v = solver.value_function();
        assert!((v[3] - 1.0).abs() < 1e-9);
        assert!((v[2] - 0.9).abs() < 1e-9);
        assert!((v[1] - 0.81).abs() < 1e-9);
        assert!((v[0] - 0.729).abs() < 1e-9);
        // Terminal value pinned at zero.
        assert_eq!(v[4], 0.0);

        // Single action everywhere.
        assert!(solver.policy().iter().all(|&a| a == 0));
    }

    #[test]
    fn action_for_uses_nearest_fallback() {
        let cfg = chain();
        let p = build(&cfg);
        let mut solver = ValueSolver::new(&p.space, &p.model, &p.reward, p.solver_cfg);
        solver.value_iteration();

        assert_eq!(solver.action_for(&[0.26]).unwrap(), 0);
        assert!(matches!(
            solver.action_for(&[0.1, 0.2]),
            Err(EngineError::InvalidFeatureVector { .. })
        ));
    }

    #[test]
    fn cancellation_returns_partial_state() {
        let cfg = chain();
        let p = build(&cfg);
        let mut solver = ValueSolver::new(&p.space, &p.model, &p.reward, p.solver_cfg);

        let cancel = AtomicBool::new(true);
        let report = solver.value_iteration_with(Some(&cancel), &mut NoopSink);

        assert!(report.cancelled);
        assert_eq!(report.status, SolveStatus::MaxIterationsReached);
        assert_eq!(report.iterations, 0);
        // No sweep ran, so the reported delta is the JSON-safe zero,
        // not a non-finite sentinel.
        assert_eq!(report.max_delta, 0.0);
        assert!(serde_json::to_string(&report).unwrap().contains("0.0"));
        // Arrays are published and sized even for a cancelled solve.
        assert_eq!(solver.value_function().len(), p.space.len());
        assert_eq!(solver.policy().len(), p.space.len());
    }

    #[test]
    fn iteration_cap_is_not_an_error() {
        let mut cfg = chain();
        cfg.solver.max_iterations = 1;
        let p = build(&cfg);
        let mut solver = ValueSolver::new(&p.space, &p.model, &p.reward, p.solver_cfg);

        let report = solver.value_iteration();
        assert_eq!(report.status, SolveStatus::MaxIterationsReached);
        assert_eq!(report.iterations, 1);
        assert_eq!(solver.status(), SolveStatus::MaxIterationsReached);
        // Policy is still usable.
        assert_eq!(solver.policy().len(), p.space.len());
    }

    #[test]
    fn evaluate_policy_validates_actions() {
        let cfg = chain();
        let p = build(&cfg);
        let solver = ValueSolver::new(&p.space, &p.model, &p.reward, p.solver_cfg);

        let bad = vec![7; p.space.len()];
        assert!(matches!(
            solver.evaluate_policy(&bad),
            Err(EngineError::InvalidAction { action: 7, .. })
        ));
    }

    #[test]
    fn parallel_sweep_matches_serial() {
        let cfg = Config::default();
        let p = build(&cfg);

        let mut serial_cfg = p.solver_cfg.clone();
        serial_cfg.num_threads = 1;
        let mut serial = ValueSolver::new(&p.space, &p.model, &p.reward, serial_cfg);
        serial.value_iteration();

        let mut par_cfg = p.solver_cfg.clone();
        par_cfg.num_threads = 4;
        let mut parallel = ValueSolver::new(&p.space, &p.model, &p.reward, par_cfg);
        parallel.value_iteration();

        assert_eq!(serial.value_function(), parallel.value_function());
        assert_eq!(serial.q_function(), parallel.q_function());
        assert_eq!(serial.policy(), parallel.policy());
    }
}
