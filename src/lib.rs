//! Praxis core library.
//!
//! A finite Markov Decision Process solver that picks the next best
//! action in a multi-stage analysis workflow under uncertainty. The
//! binary (`src/main.rs`) is just a thin research harness around these
//! components.
//!
//! # Architecture
//!
//! The pipeline runs leaf-first:
//!
//! - **StateSpace** (`state_space`): discretized grid over a fixed set
//!   of continuous features, arena-indexed by integer state id.
//!
//! - **TransitionModel** (`transition`): sparse two-outcome kernel built
//!   from declarative action-effect rules (effect applied vs. withheld).
//!
//! - **RewardFunction** (`reward`): pure scalar reward over
//!   (state, action, next state); always recomputed, never cached.
//!
//! - **ValueSolver** (`solver`): value iteration and policy iteration
//!   with double-buffered Bellman sweeps, producing V, Q, and the
//!   greedy policy.
//!
//! - **EpisodeRunner** (`episode`): sequential trajectory execution
//!   against a solved policy, with seeded sampling.
//!
//! - **Policy store** (`store`): fingerprint-checked snapshots of
//!   (policy, V, Q) for reuse across runs.
//!
//! Feature extraction, document ingestion, persistence backends, and
//! any network or UI surface live with external collaborators: they
//! hand this engine already-extracted feature vectors and receive an
//! action id plus diagnostics back.

pub mod config;
pub mod episode;
pub mod logging;
pub mod metrics;
pub mod reward;
pub mod solver;
pub mod state_space;
pub mod store;
pub mod transition;
pub mod types;

// --- Re-exports for ergonomic external use ---------------------------------

pub use config::{
    ActionConfig, BonusClause, Config, RewardConfig, SolverConfig, TerminalClause,
    TransitionConfig,
};

pub use episode::{BatchSummary, Episode, EpisodeRunner, StepRecord};

pub use logging::{EventSink, FileSink, NoopSink};

pub use metrics::OnlineStats;

pub use reward::RewardFunction;

pub use solver::{SolveReport, SolveStatus, ValueSolver};

pub use state_space::StateSpace;

pub use store::{
    config_fingerprint, load_from_file, restore, save_to_file, snapshot, PolicySnapshot,
    SNAPSHOT_VERSION,
};

pub use transition::TransitionModel;

pub use types::{ActionId, EngineError, StateId, GRID_EPSILON, PROB_EPSILON};

// --- End-to-end smoke tests -------------------------------------------------
