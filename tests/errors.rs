//! Configuration and generator errors.

mod common;

use prio_simulator::*;

fn run_err(builder: ScenarioBuilder) -> SimError {
    builder
        .build()
        .and_then(Simulator::new)
        .and_then(Simulator::run)
        .expect_err("run should fail")
}

#[test]
fn test_negative_service_draw() {
    common::setup_test();
    let err = run_err(
        common::ns_builder()
            .stream(3, 1.0)
            .arrivals(3, Fixed(1.0))
            .service(3, Scripted::new([2.0, -0.5])),
    );
    assert_eq!(
        err,
        SimError::InvalidGeneratorOutput {
            stream: StreamId(3),
            role: GeneratorRole::Service,
            value: -0.5,
        }
    );
    assert!(!err.is_internal());
}

#[test]
fn test_non_finite_arrival_draw() {
    common::setup_test();
    let err = run_err(
        common::ns_builder()
            .stream(1, 1.0)
            .arrivals(1, from_fn(|| f64::NAN))
            .service(1, Fixed(1.0)),
    );
    assert!(matches!(
        err,
        SimError::InvalidGeneratorOutput {
            stream: StreamId(1),
            role: GeneratorRole::Arrival,
            ..
        }
    ));
}

#[test]
fn test_service_exhaustion() {
    common::setup_test();
    let err = run_err(
        common::ns_builder()
            .stream(1, 1.0)
            .arrivals(1, Fixed(5.0))
            .service(1, Scripted::new([1.0, 1.0])),
    );
    assert_eq!(err, SimError::GeneratorExhausted { stream: StreamId(1) });
}

#[test]
fn test_exhausted_arrivals_close_only_their_stream() {
    common::setup_test();
    let result = common::run(
        common::ns_builder()
            .stream(1, 1.0)
            .stream(2, 1.0)
            .arrivals(1, Scripted::arrivals_at(&[1.0, 2.0]))
            .service(1, Fixed(1.0))
            .arrivals(2, Fixed(10.0))
            .service(2, Fixed(1.0))
            .horizon_ns(100),
    );
    assert_eq!(result.exit, ExitKind::Horizon);
    assert_eq!(result.stream(StreamId(1)).unwrap().arrived_count(), 2);
    assert_eq!(result.stream(StreamId(2)).unwrap().arrived_count(), 10);
}

#[test]
fn test_service_running_past_end_of_time() {
    common::setup_test();
    // Starts at 1e18ns; a 1.8e19ns service is representable on its own but
    // its completion instant is not.
    let err = run_err(
        Scenario::builder()
            .stream(1, 1.0)
            .arrivals(1, Scripted::arrivals_at(&[1e9]))
            .service(1, Fixed(1.8e10))
            .horizon_units(1e10),
    );
    assert!(
        matches!(
            err,
            SimError::TimeOverflow {
                stream: StreamId(1),
                role: GeneratorRole::Service,
                at: 1_000_000_000_000_000_000,
                ..
            }
        ),
        "{err}"
    );
    assert!(!err.is_internal());
}

#[test]
fn test_arrival_past_end_of_time() {
    common::setup_test();
    let err = run_err(
        common::ns_builder()
            .stream(1, 1.0)
            .arrivals(1, Fixed(1.5e19))
            .service(1, Fixed(1.0))
            .horizon_ns(TimeNs::MAX),
    );
    assert_eq!(
        err,
        SimError::TimeOverflow {
            stream: StreamId(1),
            role: GeneratorRole::Arrival,
            at: 15_000_000_000_000_000_000,
            duration: 15_000_000_000_000_000_000,
        }
    );
}

#[test]
fn test_generator_for_unknown_stream() {
    common::setup_test();
    let err = run_err(
        Scenario::builder()
            .stream(1, 1.0)
            .arrivals(1, Fixed(1.0))
            .service(1, Fixed(1.0))
            .service(9, Fixed(1.0)),
    );
    match err {
        SimError::Config(msg) => assert!(msg.contains("unknown stream 9"), "{msg}"),
        other => panic!("expected config error, got {other}"),
    }
}

#[test]
fn test_invalid_law_parameters() {
    common::setup_test();
    let err = run_err(
        Scenario::builder()
            .stream(1, 1.0)
            .arrival_law(1, Law::Exponential { mean: -2.0 })
            .service(1, Fixed(1.0)),
    );
    assert!(matches!(err, SimError::Config(_)), "{err}");
}

#[test]
fn test_zero_horizon_processes_only_time_zero() {
    common::setup_test();
    let result = common::run(
        common::ns_builder()
            .stream(1, 1.0)
            .arrivals(1, Scripted::arrivals_at(&[0.0, 0.0, 1.0]))
            .service(1, Fixed(0.0))
            .horizon_ns(0),
    );
    assert_eq!(result.arrived_count, 2);
    assert_eq!(result.completed_count(), 2);
    assert_eq!(result.exit, ExitKind::Horizon);
}
