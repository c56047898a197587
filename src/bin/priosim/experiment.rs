//! The reference experiment: three streams with equal seed priority and a
//! different arrival/service law each.

use prio_simulator::{Law, Scenario, ScenarioBuilder};

/// Seed priority of every stream.
const SEED_PRIORITY: f64 = 1.0;

/// `(stream, arrival law, service law)`.
pub const STREAMS: [(u32, Law, Law); 3] = [
    (
        1,
        Law::LogisticPositive {
            loc: 0.0,
            scale: 1.0,
        },
        Law::StudentTAbs { dof: 1.0 },
    ),
    (
        2,
        Law::Rayleigh { scale: 1.0 },
        // Beta needs both shapes positive; (1, 1) is uniform on (0, 1).
        Law::Beta {
            alpha: 1.0,
            beta: 1.0,
        },
    ),
    (
        3,
        Law::Gamma {
            shape: 2.0,
            scale: 1.0,
        },
        Law::Weibull {
            shape: 1.0,
            scale: 1.0,
        },
    ),
];

/// Builder preloaded with the reference streams; callers add policies and
/// the horizon.
pub fn builder(seed: u64) -> ScenarioBuilder {
    STREAMS.iter().fold(
        Scenario::builder().seed(seed),
        |b, &(id, arrival, service)| {
            b.stream(id, SEED_PRIORITY)
                .arrival_law(id, arrival)
                .service_law(id, service)
        },
    )
}
