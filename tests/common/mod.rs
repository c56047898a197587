#![allow(dead_code)]

use prio_simulator::{
    ExitKind, HorizonPolicy, ResumePolicy, Scenario, ScenarioBuilder, SimFormat,
    SimulationResult, Simulator, Task, TieBreak,
};

/// Initialize tracing from `RUST_LOG`.
///
/// `try_init()` is idempotent: first call in the process succeeds,
/// subsequent calls are silently ignored.
pub fn setup_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .event_format(SimFormat)
        .with_test_writer()
        .try_init();
}

/// Build and run a scenario, panicking on any error.
pub fn run(builder: ScenarioBuilder) -> SimulationResult {
    let scenario = builder.build().expect("scenario should build");
    Simulator::new(scenario)
        .and_then(Simulator::run)
        .expect("simulation should succeed")
}

/// Builder with integer nanosecond time units, so scripted durations are
/// exact tick counts.
pub fn ns_builder() -> ScenarioBuilder {
    Scenario::builder().time_unit_ns(1)
}

/// Check the properties every run must satisfy.
pub fn assert_run_invariants(result: &SimulationResult) {
    assert!(result.trace.is_monotonic(), "trace timestamps went backwards");
    assert!(
        result.trace.max_concurrent_running() <= 1,
        "more than one task held the server"
    );
    for task in &result.completed {
        assert_conserved(task);
    }
    assert!(result.completed.len() as u64 <= result.arrived_count);
    if result.exit == ExitKind::Horizon && result.horizon_policy == HorizonPolicy::Inclusive {
        assert!(result.clock <= result.horizon_ns);
    }
}

/// `wait + run == completion - arrival`.
pub fn assert_conserved(task: &Task) {
    let turnaround = task.turnaround().expect("completed task has a turnaround");
    assert_eq!(
        task.wait_time() + task.run_time(),
        turnaround,
        "time not conserved for task {}",
        task.id()
    );
}

pub const ALL_TIE_BREAKS: [TieBreak; 3] =
    [TieBreak::LongerQueue, TieBreak::LowestKey, TieBreak::OldestHead];

pub const ALL_RESUME_POLICIES: [ResumePolicy; 2] = [ResumePolicy::Resample, ResumePolicy::Continue];
