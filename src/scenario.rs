//! Simulation configuration.
//!
//! A [`Scenario`] is built once with [`Scenario::builder`] and consumed by
//! [`Simulator::new`](crate::engine::Simulator::new). All validation happens
//! in [`ScenarioBuilder::build`], so a scenario that exists can be run.

use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;
use tracing::warn;

use crate::distributions::Law;
use crate::error::{GeneratorRole, SimError};
use crate::generator::{DurationSource, SourceTable, StreamSources};
use crate::policy::{HorizonPolicy, ResumePolicy, TieBreak};
use crate::types::{units_to_ns, StreamId, TimeNs, NS_PER_UNIT};

/// Default PRNG seed used when no seed is specified.
pub const DEFAULT_SEED: u64 = 42;

/// Environment variable consulted by [`seed_from_env`].
pub const SEED_ENV: &str = "PRIOSIM_SEED";

/// Parse a seed string: a `u64` integer or `"entropy"` for OS randomness.
///
/// Returns `DEFAULT_SEED` (42) for `None` or empty strings.
pub fn parse_seed(s: Option<&str>) -> Result<u64, String> {
    match s.map(str::trim) {
        None | Some("") => Ok(DEFAULT_SEED),
        Some(s) if s.eq_ignore_ascii_case("entropy") => {
            let seed: u64 = rand::thread_rng().gen();
            warn!(
                seed,
                "seed=entropy: seeding PRNG with OS randomness \
                 (set seed={seed} to reproduce this run)"
            );
            Ok(seed)
        }
        Some(s) => s
            .parse::<u64>()
            .map_err(|_| format!("seed={s:?}: expected a u64 integer or \"entropy\"")),
    }
}

/// Resolve the PRNG seed from the `PRIOSIM_SEED` environment variable.
///
/// - Unset or empty: returns `DEFAULT_SEED` (42).
/// - `"entropy"` (case-insensitive): seeds from OS randomness and logs the
///   chosen value so the run can be reproduced later.
/// - Any decimal integer: parsed as a `u64` seed.
pub fn seed_from_env() -> Result<u64, String> {
    parse_seed(std::env::var(SEED_ENV).ok().as_deref())
}

/// Where a generator comes from: a caller-supplied source, or a law that is
/// seeded at build time.
enum SourceSpec {
    Source(Box<dyn DurationSource>),
    Law(Law),
}

impl SourceSpec {
    fn resolve(
        self,
        seed: u64,
        stream: StreamId,
        role: GeneratorRole,
    ) -> Result<Box<dyn DurationSource>, SimError> {
        match self {
            SourceSpec::Source(src) => Ok(src),
            SourceSpec::Law(law) => Ok(Box::new(law.sampler_for(seed, stream, role)?)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Horizon {
    Units(f64),
    Ns(TimeNs),
}

/// A complete, validated simulation configuration.
pub struct Scenario {
    /// Configured (seed) priority per stream.
    pub priorities: BTreeMap<StreamId, f64>,
    /// Time after which no new events are accepted.
    pub horizon_ns: TimeNs,
    /// Nanoseconds per generator time unit.
    pub time_unit_ns: TimeNs,
    pub tie_break: TieBreak,
    pub resume_policy: ResumePolicy,
    pub horizon_policy: HorizonPolicy,
    /// Cap on processed events, if any.
    pub event_limit: Option<u64>,
    /// Base seed the law-backed generators were derived from.
    pub seed: u64,
    pub(crate) sources: SourceTable,
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("priorities", &self.priorities)
            .field("horizon_ns", &self.horizon_ns)
            .field("time_unit_ns", &self.time_unit_ns)
            .field("tie_break", &self.tie_break)
            .field("resume_policy", &self.resume_policy)
            .field("horizon_policy", &self.horizon_policy)
            .field("event_limit", &self.event_limit)
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

/// Builder for constructing scenarios.
pub struct ScenarioBuilder {
    priorities: Vec<(StreamId, f64)>,
    arrivals: Vec<(StreamId, SourceSpec)>,
    services: Vec<(StreamId, SourceSpec)>,
    horizon: Horizon,
    time_unit_ns: TimeNs,
    tie_break: TieBreak,
    resume_policy: ResumePolicy,
    horizon_policy: HorizonPolicy,
    event_limit: Option<u64>,
    seed: u64,
}

impl Scenario {
    pub fn builder() -> ScenarioBuilder {
        ScenarioBuilder {
            priorities: Vec::new(),
            arrivals: Vec::new(),
            services: Vec::new(),
            horizon: Horizon::Units(1000.0),
            time_unit_ns: NS_PER_UNIT,
            tie_break: TieBreak::default(),
            resume_policy: ResumePolicy::default(),
            horizon_policy: HorizonPolicy::default(),
            event_limit: None,
            seed: DEFAULT_SEED,
        }
    }

    /// Horizon in time units.
    pub fn horizon_units(&self) -> f64 {
        self.horizon_ns as f64 / self.time_unit_ns as f64
    }
}

impl ScenarioBuilder {
    /// Declare a stream with its configured (seed) priority.
    pub fn stream(mut self, id: u32, priority: f64) -> Self {
        self.priorities.push((StreamId(id), priority));
        self
    }

    /// Inter-arrival time generator for stream `id`.
    pub fn arrivals(mut self, id: u32, source: impl DurationSource + 'static) -> Self {
        self.arrivals
            .push((StreamId(id), SourceSpec::Source(Box::new(source))));
        self
    }

    /// Service time generator for stream `id`.
    pub fn service(mut self, id: u32, source: impl DurationSource + 'static) -> Self {
        self.services
            .push((StreamId(id), SourceSpec::Source(Box::new(source))));
        self
    }

    /// Inter-arrival law for stream `id`, seeded from the scenario seed.
    pub fn arrival_law(mut self, id: u32, law: Law) -> Self {
        self.arrivals.push((StreamId(id), SourceSpec::Law(law)));
        self
    }

    /// Service law for stream `id`, seeded from the scenario seed.
    pub fn service_law(mut self, id: u32, law: Law) -> Self {
        self.services.push((StreamId(id), SourceSpec::Law(law)));
        self
    }

    pub fn horizon_units(mut self, units: f64) -> Self {
        self.horizon = Horizon::Units(units);
        self
    }

    pub fn horizon_ns(mut self, ns: TimeNs) -> Self {
        self.horizon = Horizon::Ns(ns);
        self
    }

    /// Nanoseconds per generator time unit (default: one second).
    pub fn time_unit_ns(mut self, ns: TimeNs) -> Self {
        self.time_unit_ns = ns;
        self
    }

    pub fn tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn resume_policy(mut self, policy: ResumePolicy) -> Self {
        self.resume_policy = policy;
        self
    }

    pub fn horizon_policy(mut self, policy: HorizonPolicy) -> Self {
        self.horizon_policy = policy;
        self
    }

    /// Stop after this many processed events. `None` means no limit.
    pub fn event_limit(mut self, limit: Option<u64>) -> Self {
        self.event_limit = limit;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Validate and build the scenario.
    pub fn build(self) -> Result<Scenario, SimError> {
        if self.priorities.is_empty() {
            return Err(SimError::Config("scenario must have at least one stream".into()));
        }
        if self.time_unit_ns == 0 {
            return Err(SimError::Config("time_unit_ns must be positive".into()));
        }

        let mut priorities = BTreeMap::new();
        for (id, priority) in self.priorities {
            if !priority.is_finite() {
                return Err(SimError::Config(format!(
                    "stream {id}: priority must be finite, got {priority}"
                )));
            }
            if priorities.insert(id, priority).is_some() {
                return Err(SimError::Config(format!("stream {id} declared twice")));
            }
        }

        let horizon_ns = match self.horizon {
            Horizon::Ns(ns) => ns,
            Horizon::Units(units) => units_to_ns(units, self.time_unit_ns).ok_or_else(|| {
                SimError::Config(format!(
                    "horizon must be a non-negative finite duration, got {units}"
                ))
            })?,
        };

        let mut arrivals = keyed(self.arrivals, &priorities, GeneratorRole::Arrival)?;
        let mut services = keyed(self.services, &priorities, GeneratorRole::Service)?;

        let mut sources = BTreeMap::new();
        for &id in priorities.keys() {
            let (Some(arrival), Some(service)) = (arrivals.remove(&id), services.remove(&id))
            else {
                return Err(SimError::Config(format!(
                    "stream {id} needs both an arrival and a service generator"
                )));
            };
            sources.insert(
                id,
                StreamSources {
                    arrival: arrival.resolve(self.seed, id, GeneratorRole::Arrival)?,
                    service: service.resolve(self.seed, id, GeneratorRole::Service)?,
                },
            );
        }

        Ok(Scenario {
            priorities,
            horizon_ns,
            time_unit_ns: self.time_unit_ns,
            tie_break: self.tie_break,
            resume_policy: self.resume_policy,
            horizon_policy: self.horizon_policy,
            event_limit: self.event_limit,
            seed: self.seed,
            sources: SourceTable::new(self.time_unit_ns, sources),
        })
    }
}

/// Index generator specs by stream, rejecting unknown and duplicate keys.
fn keyed(
    specs: Vec<(StreamId, SourceSpec)>,
    priorities: &BTreeMap<StreamId, f64>,
    role: GeneratorRole,
) -> Result<BTreeMap<StreamId, SourceSpec>, SimError> {
    let mut out = BTreeMap::new();
    for (id, spec) in specs {
        if !priorities.contains_key(&id) {
            return Err(SimError::Config(format!(
                "{role} generator given for unknown stream {id}"
            )));
        }
        if out.insert(id, spec).is_some() {
            return Err(SimError::Config(format!(
                "stream {id} has more than one {role} generator"
            )));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::Fixed;

    fn config_error(result: Result<Scenario, SimError>) -> String {
        match result {
            Err(SimError::Config(msg)) => msg,
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_seed() {
        assert_eq!(parse_seed(None), Ok(DEFAULT_SEED));
        assert_eq!(parse_seed(Some("")), Ok(DEFAULT_SEED));
        assert_eq!(parse_seed(Some("7")), Ok(7));
        assert_eq!(parse_seed(Some(" 18446744073709551615 ")), Ok(u64::MAX));
        assert!(parse_seed(Some("ENTROPY")).is_ok());
        assert!(parse_seed(Some("abc")).unwrap_err().contains("abc"));
    }

    #[test]
    fn test_build_defaults() {
        let s = Scenario::builder()
            .stream(1, 1.0)
            .arrivals(1, Fixed(1.0))
            .service(1, Fixed(0.5))
            .build()
            .unwrap();
        assert_eq!(s.horizon_ns, 1000 * NS_PER_UNIT);
        assert_eq!(s.horizon_units(), 1000.0);
        assert_eq!(s.tie_break, TieBreak::LongerQueue);
        assert_eq!(s.resume_policy, ResumePolicy::Resample);
        assert_eq!(s.horizon_policy, HorizonPolicy::Inclusive);
        assert_eq!(s.event_limit, None);
        assert_eq!(s.priorities[&StreamId(1)], 1.0);
    }

    #[test]
    fn test_unknown_stream_in_generator_mapping() {
        let msg = config_error(
            Scenario::builder()
                .stream(1, 1.0)
                .arrivals(1, Fixed(1.0))
                .service(1, Fixed(1.0))
                .arrivals(2, Fixed(1.0))
                .build(),
        );
        assert!(msg.contains("unknown stream 2"), "{msg}");
    }

    #[test]
    fn test_missing_generator() {
        let msg = config_error(
            Scenario::builder()
                .stream(1, 1.0)
                .arrivals(1, Fixed(1.0))
                .build(),
        );
        assert!(msg.contains("stream 1 needs both"), "{msg}");
    }

    #[test]
    fn test_duplicate_stream_and_generator() {
        let msg = config_error(Scenario::builder().stream(1, 1.0).stream(1, 2.0).build());
        assert!(msg.contains("declared twice"), "{msg}");

        let msg = config_error(
            Scenario::builder()
                .stream(1, 1.0)
                .service(1, Fixed(1.0))
                .service(1, Fixed(2.0))
                .build(),
        );
        assert!(msg.contains("more than one service"), "{msg}");
    }

    #[test]
    fn test_invalid_scalars() {
        let base = || {
            Scenario::builder()
                .stream(1, 1.0)
                .arrivals(1, Fixed(1.0))
                .service(1, Fixed(1.0))
        };
        assert!(config_error(base().horizon_units(-1.0).build()).contains("horizon"));
        assert!(config_error(base().time_unit_ns(0).build()).contains("time_unit_ns"));
        assert!(config_error(Scenario::builder().build()).contains("at least one stream"));
        assert!(config_error(
            Scenario::builder()
                .stream(1, f64::NAN)
                .arrivals(1, Fixed(1.0))
                .service(1, Fixed(1.0))
                .build()
        )
        .contains("finite"));
    }

    #[test]
    fn test_invalid_law_fails_at_build() {
        let msg = config_error(
            Scenario::builder()
                .stream(2, 1.0)
                .arrival_law(2, Law::Rayleigh { scale: 1.0 })
                .service_law(2, Law::Beta { alpha: 0.0, beta: 1.0 })
                .build(),
        );
        assert!(msg.contains("alpha"), "{msg}");
    }
}
