// src/logging.rs
//
// Telemetry sinks for the decision engine.
// - EventSink: trait consumed by the solver and the episode runner
// - NoopSink:  discards all events
// - FileSink:  writes one JSON line per event for offline analysis
//
// Sinks must never take the engine down: FileSink swallows I/O errors.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::episode::StepRecord;
use crate::types::StateId;

/// Abstract sink for solver and episode telemetry. All hooks default to
/// no-ops so implementations only override what they care about.
pub trait EventSink {
    /// One value-iteration or policy-evaluation sweep finished.
    fn log_sweep(&mut self, iteration: usize, max_delta: f64) {
        let _ = (iteration, max_delta);
    }

    /// One episode step was taken.
    fn log_step(&mut self, record: &StepRecord) {
        let _ = record;
    }

    /// An off-grid feature vector was resolved to its nearest state.
    fn log_approximation(&mut self, requested: &[f64], resolved: StateId) {
        let _ = (requested, resolved);
    }
}

/// Sink that discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {}

/// JSONL file sink. Each event is a single tagged JSON object per line.
pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    /// Create a new sink writing to `path`.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    fn write_line(&mut self, value: serde_json::Value) {
        // Telemetry failures must not crash a solve or an episode,
        // so I/O errors are deliberately ignored.
        if let Ok(line) = serde_json::to_string(&value) {
            let _ = self.writer.write_all(line.as_bytes());
            let _ = self.writer.write_all(b"\n");
            let _ = self.writer.flush();
        }
    }
}

impl EventSink for FileSink {
    fn log_sweep(&mut self, iteration: usize, max_delta: f64) {
        self.write_line(serde_json::json!({
            "kind": "sweep",
            "iteration": iteration,
            "max_delta": max_delta,
        }));
    }

    fn log_step(&mut self, record: &StepRecord) {
        self.write_line(serde_json::json!({
            "kind": "step",
            "step": record.step,
            "state": record.state,
            "action": record.action,
            "reward": record.reward,
            "next_state": record.next_state,
            "approximated": record.approximated,
        }));
    }

    fn log_approximation(&mut self, requested: &[f64], resolved: StateId) {
        self.write_line(serde_json::json!({
            "kind": "approximation",
            "requested": requested,
            "resolved": resolved,
        }));
    }
}
