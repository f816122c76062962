// src/store.rs
//
// Policy persistence: serializable snapshots of (policy, V, Q) tagged
// with a config fingerprint.
//
// The fingerprint is a sha256 over the canonical JSON of every config
// field that shapes the solution (feature schema, grid, actions, reward,
// terminal predicate, discount). Restoring a snapshot against a config
// with a different fingerprint fails with IncompatiblePolicy; a policy
// solved for a different state-space shape must never load silently.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::solver::ValueSolver;
use crate::types::{ActionId, EngineError};

/// Snapshot schema version. Increment on layout changes.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub schema_version: u32,
    /// Fingerprint of the config this policy was solved against.
    pub config_hash: String,
    pub policy: Vec<ActionId>,
    pub value_function: Vec<f64>,
    /// One row of `num_actions` Q-values per state.
    pub q_function: Vec<Vec<f64>>,
}

/// Fingerprint of the shape-relevant config, as `sha256:<hex>`.
pub fn config_fingerprint(cfg: &Config) -> String {
    let canonical = serde_json::json!({
        "features": cfg.features,
        "resolution": cfg.resolution,
        "max_states": cfg.max_states,
        "actions": cfg.actions,
        "transition": cfg.transition,
        "reward": cfg.reward,
        "terminal": cfg.terminal,
        "gamma": cfg.solver.gamma,
    });

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    format!("sha256:{}", hex_encode(&hasher.finalize()))
}

/// Capture the solver's current arrays.
pub fn snapshot(solver: &ValueSolver<'_>, cfg: &Config) -> PolicySnapshot {
    let num_actions = solver.num_actions();
    let q_function = solver
        .q_function()
        .chunks(num_actions)
        .map(|row| row.to_vec())
        .collect();

    PolicySnapshot {
        schema_version: SNAPSHOT_VERSION,
        config_hash: config_fingerprint(cfg),
        policy: solver.policy().to_vec(),
        value_function: solver.value_function().to_vec(),
        q_function,
    }
}

/// Restore a snapshot into the solver. In-memory state is untouched on
/// any failure.
pub fn restore(
    solver: &mut ValueSolver<'_>,
    snapshot: &PolicySnapshot,
    cfg: &Config,
) -> Result<(), EngineError> {
    let expected = config_fingerprint(cfg);
    if snapshot.config_hash != expected {
        return Err(EngineError::IncompatiblePolicy {
            expected,
            got: snapshot.config_hash.clone(),
        });
    }
    if snapshot.schema_version != SNAPSHOT_VERSION {
        return Err(EngineError::IncompatiblePolicy {
            expected: format!("schema v{}", SNAPSHOT_VERSION),
            got: format!("schema v{}", snapshot.schema_version),
        });
    }

    let n = solver.num_states();
    let na = solver.num_actions();
    let shape_ok = snapshot.policy.len() == n
        && snapshot.value_function.len() == n
        && snapshot.q_function.len() == n
        && snapshot.q_function.iter().all(|row| row.len() == na)
        && snapshot.policy.iter().all(|&a| a < na);
    if !shape_ok {
        return Err(EngineError::IncompatiblePolicy {
            expected: format!("{} states x {} actions", n, na),
            got: format!(
                "{} states x {} actions",
                snapshot.policy.len(),
                snapshot.q_function.first().map_or(0, Vec::len)
            ),
        });
    }

    let mut q = Vec::with_capacity(n * na);
    for row in &snapshot.q_function {
        q.extend_from_slice(row);
    }

    solver.install(
        snapshot.policy.clone(),
        snapshot.value_function.clone(),
        q,
    );
    Ok(())
}

/// Write a snapshot as pretty JSON.
pub fn save_to_file(snapshot: &PolicySnapshot, path: &Path) -> Result<(), EngineError> {
    let json = serde_json::to_string_pretty(snapshot).map_err(|e| EngineError::Io {
        path: path.display().to_string(),
        source: e.to_string(),
    })?;
    fs::write(path, json).map_err(|e| EngineError::Io {
        path: path.display().to_string(),
        source: e.to_string(),
    })
}

/// Read a snapshot written by `save_to_file`.
pub fn load_from_file(path: &Path) -> Result<PolicySnapshot, EngineError> {
    let json = fs::read_to_string(path).map_err(|e| EngineError::Io {
        path: path.display().to_string(),
        source: e.to_string(),
    })?;
    serde_json::from_str(&json).map_err(|e| EngineError::Io {
        path: path.display().to_string(),
        source: e.to_string(),
    })
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}
