//! Parallel sweeps over horizons.
//!
//! Every point of a sweep is an independent run: its own scenario, its own
//! generators seeded from a per-run seed, and its own simulator. Nothing is
//! shared between threads except the read-only scenario factory.

use std::thread;

use tracing::info;

use crate::distributions::derive_run_seed;
use crate::engine::Simulator;
use crate::error::SimError;
use crate::scenario::Scenario;
use crate::stats::Report;

/// Result of one sweep point.
#[derive(Debug)]
pub struct SweepPoint {
    /// Horizon in time units.
    pub horizon: f64,
    /// Seed the point's scenario was built from.
    pub seed: u64,
    pub report: Result<Report, SimError>,
}

/// Run one simulation per horizon, each on its own thread.
///
/// `make` builds the scenario for a `(horizon, seed)` pair; it is called on
/// the worker thread. Results come back in the order of `horizons`.
pub fn run_sweep<F>(horizons: &[f64], base_seed: u64, make: F) -> Vec<SweepPoint>
where
    F: Fn(f64, u64) -> Result<Scenario, SimError> + Sync,
{
    let make = &make;
    thread::scope(|s| {
        let handles: Vec<_> = horizons
            .iter()
            .enumerate()
            .map(|(i, &horizon)| {
                let seed = derive_run_seed(base_seed, i as u64);
                let handle = s.spawn(move || {
                    let report = make(horizon, seed)
                        .and_then(Simulator::new)
                        .and_then(Simulator::run)
                        .map(|result| result.report());
                    info!(horizon, seed, ok = report.is_ok(), "sweep point finished");
                    report
                });
                (horizon, seed, handle)
            })
            .collect();

        handles
            .into_iter()
            .map(|(horizon, seed, handle)| SweepPoint {
                horizon,
                seed,
                report: handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic)),
            })
            .collect()
    })
}
