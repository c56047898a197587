//! prio_simulator - Deterministic event-driven simulator of a single
//! preemptive server shared by competing task streams.
//!
//! Each stream has its own arrival and service-time generators and an
//! adaptive priority: after a warm-up of ten completions, a stream's
//! effective priority becomes the running mean of its completed tasks'
//! total processing time. An arrival into a stream of strictly higher
//! priority preempts the running task, which goes back to the tail of its
//! own queue.
//!
//! # Architecture
//!
//! - **Task**: lifecycle state machine with exact wait/run accounting
//! - **Stream**: FIFO queue plus the completion statistics behind its priority
//! - **Server**: dispatch rule, preemption, completion hand-off
//! - **Engine**: event loop jumping between arrivals and completions
//! - **Generators**: the only interface to randomness (`DurationSource`)
//!
//! # Usage
//!
//! ```rust,no_run
//! use prio_simulator::*;
//!
//! let scenario = Scenario::builder()
//!     .stream(1, 1.0)
//!     .arrival_law(1, Law::Exponential { mean: 5.0 })
//!     .service(1, Fixed(3.0))
//!     .horizon_units(100.0)
//!     .build()
//!     .unwrap();
//!
//! let result = Simulator::new(scenario).and_then(Simulator::run).unwrap();
//! print!("{}", result.report());
//! ```

pub mod distributions;
pub mod engine;
pub mod error;
pub mod fmt;
pub mod generator;
pub mod policy;
pub mod scenario;
pub mod server;
pub mod stats;
pub mod stream;
pub mod sweep;
pub mod task;
pub mod trace;
pub mod types;

// Re-export the main public types for convenience.
pub use distributions::{derive_run_seed, derive_seed, Law, Sampler};
pub use engine::{ExitKind, SimulationResult, Simulator};
pub use error::{GeneratorRole, InvariantViolation, SimError};
pub use fmt::{sim_clock, FmtN, FmtTs, SimFormat};
pub use generator::{from_fn, Cycle, DurationSource, Fixed, Scripted, SourceTable, StreamSources};
pub use policy::{HorizonPolicy, ResumePolicy, TieBreak};
pub use scenario::{parse_seed, seed_from_env, Scenario, ScenarioBuilder, DEFAULT_SEED};
pub use server::{Server, ServiceSampler, Streams};
pub use stats::{DistributionStats, Report, StreamReport};
pub use stream::{Stream, WARMUP_COMPLETIONS};
pub use sweep::{run_sweep, SweepPoint};
pub use task::{Task, TaskState};
pub use trace::{Trace, TraceEvent, TraceKind};
pub use types::{ns_to_units, units_to_ns, StreamId, TaskId, TimeNs, NS_PER_UNIT};
