// tests/telemetry_sink_tests.rs
//
// JSONL telemetry: sweeps, episode steps, and nearest-state
// approximations written through a FileSink must come back as one
// parseable tagged JSON object per line.

use praxis::{
    ActionConfig, BonusClause, Config, EpisodeRunner, FileSink, RewardFunction, StateSpace,
    TerminalClause, TransitionModel, ValueSolver,
};

fn chain_config() -> Config {
    let mut cfg = Config::default();
    cfg.features = vec!["progress".to_string()];
    cfg.resolution = 5;
    cfg.reward.weights = vec![0.0];
    cfg.reward.error_feature = None;
    cfg.reward.terminal_bonuses = vec![BonusClause {
        feature: 0,
        min_value: 1.0,
        bonus: 1.0,
    }];
    cfg.actions = vec![ActionConfig {
        id: "advance".to_string(),
        deltas: vec![(0, 0.25)],
        prerequisites: vec![],
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
}

fn build(cfg: &Config) -> Parts {
    let space = StateSpace::build(cfg).unwrap();
    let model = TransitionModel::build(&space, cfg).unwrap();
    let reward = RewardFunction::new(cfg).unwrap();
    Parts {
        space,
        model,
        reward,
    }
}

fn read_lines(path: &std::path::Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn solve_writes_one_sweep_line_per_iteration() {
    let cfg = chain_config();
    let p = build(&cfg);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sweeps.jsonl");
    let mut sink = FileSink::create(&path).unwrap();

    let mut solver = ValueSolver::new(&p.space, &p.model, &p.reward, cfg.solver.clone());
    let report = solver.value_iteration_with(None, &mut sink);
    assert!(report.converged());
    drop(sink);

    let lines = read_lines(&path);
    assert_eq!(lines.len(), report.iterations);
    for (i, line) in lines.iter().enumerate() {
        assert_eq!(line["kind"], "sweep");
        assert_eq!(line["iteration"], (i + 1) as u64);
        assert!(line["max_delta"].is_number());
    }
}

#[test]
fn episode_steps_and_approximations_are_logged() {
    let cfg = chain_config();
    let p = build(&cfg);
    let policy = vec![0; p.space.len()];
    let mut runner =
        EpisodeRunner::new(&p.space, &p.model, &p.reward, &policy, cfg.solver.gamma);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("episode.jsonl");
    let mut sink = FileSink::create(&path).unwrap();

    // Off-grid entry at 0.3: one approximation line, then one step line
    // per recorded step.
    let episode = runner.run_with(&[0.3], 50, &mut sink).unwrap();
    assert!(episode.terminated);
    drop(sink);

    let lines = read_lines(&path);
    assert_eq!(lines[0]["kind"], "approximation");
    assert_eq!(lines[0]["resolved"], 1u64);

    let steps: Vec<&serde_json::Value> =
        lines.iter().filter(|l| l["kind"] == "step").collect();
    assert_eq!(steps.len(), episode.steps.len());
    assert_eq!(steps[0]["state"], 1u64);
    assert_eq!(steps[0]["approximated"], true);
    assert_eq!(steps.last().unwrap()["next_state"], 4u64);
}

#[test]
fn unwritable_sink_path_is_an_error_the_caller_can_downgrade() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing-dir").join("sweeps.jsonl");
    assert!(FileSink::create(&path).is_err());
}
