// src/main.rs
//
// Research-harness CLI entrypoint for Praxis.
//
// Solves the default analysis-workflow MDP, runs a batch of seeded
// episodes from the initial workflow state, and prints a summary.
// Optionally checkpoints or reloads the solved policy as JSON.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::Parser;

use praxis::{
    config_fingerprint, load_from_file, restore, save_to_file, snapshot, Config, EpisodeRunner,
    EventSink, FileSink, NoopSink, RewardFunction, SolveStatus, StateSpace, TransitionModel,
    ValueSolver,
};

#[derive(Debug, Parser)]
#[command(
    name = "praxis",
    about = "Finite-MDP sequential decision engine (research harness)",
    version
)]
struct Args {
    /// Number of evaluation episodes to run after solving.
    #[arg(long, default_value_t = 100)]
    episodes: usize,

    /// Step budget per episode.
    #[arg(long, default_value_t = 200)]
    max_steps: usize,

    /// Base seed; episode i uses seed + i.
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Worker threads for Bellman sweeps (1 = serial).
    #[arg(long, default_value_t = 1)]
    threads: usize,

    /// Use policy iteration instead of value iteration.
    #[arg(long)]
    policy_iteration: bool,

    /// Write the solved policy snapshot to this path.
    #[arg(long)]
    snapshot_out: Option<PathBuf>,

    /// Load a policy snapshot instead of solving.
    #[arg(long)]
    snapshot_in: Option<PathBuf>,

    /// Write per-sweep solver telemetry as JSONL to this path.
    #[arg(long)]
    log_jsonl: Option<PathBuf>,
}

/// Telemetry sink from the CLI flag. An unwritable path downgrades to
/// NoopSink with a warning; telemetry never blocks a run.
fn build_sink(path: Option<&Path>) -> Box<dyn EventSink> {
    match path {
        Some(path) => match FileSink::create(path) {
            Ok(sink) => Box::new(sink),
            Err(err) => {
                eprintln!(
                    "warning: cannot open telemetry sink {}: {err}; continuing without",
                    path.display()
                );
                Box::new(NoopSink)
            }
        },
        None => Box::new(NoopSink),
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut cfg = Config::default();
    cfg.solver.num_threads = args.threads.max(1);
    let cfg_hash = config_fingerprint(&cfg);

    println!(
        "praxis | cfg={} | cfg_hash={} | episodes={} | seed={}",
        cfg.version, cfg_hash, args.episodes, args.seed
    );

    let space = StateSpace::build(&cfg).context("building state space")?;
    let model = TransitionModel::build(&space, &cfg).context("building transition model")?;
    let reward = RewardFunction::new(&cfg).context("building reward function")?;
    let mut solver = ValueSolver::new(&space, &model, &reward, cfg.solver.clone());

    if let Some(path) = &args.snapshot_in {
        let snap = load_from_file(path).context("loading snapshot")?;
        restore(&mut solver, &snap, &cfg).context("restoring snapshot")?;
        println!("restored policy from {}", path.display());
    } else {
        let mut sink = build_sink(args.log_jsonl.as_deref());
        let started = Instant::now();
        let report = if args.policy_iteration {
            solver.policy_iteration_with(None, sink.as_mut())
        } else {
            solver.value_iteration_with(None, sink.as_mut())
        };
        println!(
            "solve | status={:?} | iterations={} | max_delta={:.3e} | elapsed={:?}",
            report.status,
            report.iterations,
            report.max_delta,
            started.elapsed()
        );
        if report.status == SolveStatus::MaxIterationsReached {
            println!("warning: solve hit the iteration cap; policy may be suboptimal");
        }
    }

    if let Some(path) = &args.snapshot_out {
        let snap = snapshot(&solver, &cfg);
        save_to_file(&snap, path).context("writing snapshot")?;
        println!("wrote policy snapshot to {}", path.display());
    }

    let initial = vec![0.0; cfg.dims()];
    let mut runner = EpisodeRunner::new(
        &space,
        &model,
        &reward,
        solver.policy(),
        cfg.solver.gamma,
    );
    let summary = runner
        .run_batch(&initial, args.max_steps, args.episodes, args.seed)
        .context("running evaluation batch")?;

    println!(
        "episodes | n={} | terminated={} | reward mean={:.4} sd={:.4} min={:.4} max={:.4} | mean_len={:.1}",
        summary.episodes,
        summary.terminated,
        summary.mean_reward,
        summary.stddev_reward,
        summary.min_reward,
        summary.max_reward,
        summary.mean_length
    );

    Ok(())
}
