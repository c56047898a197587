//! Reporting output.
//!
//! A [`Report`] is the externally consumed summary of a run: total tasks
//! arrived and completed and, per stream, its counts and effective priority.
//! It also carries wait/run time distributions and preemption counts per
//! stream. Rendered as plain text via `Display` or as JSON via serde.

use std::fmt;

use serde::Serialize;

use crate::engine::{ExitKind, SimulationResult};
use crate::types::{ns_to_units, StreamId, TimeNs};

/// Summary statistics for a distribution of values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DistributionStats {
    /// Number of samples.
    pub count: usize,
    /// Minimum value (or 0 if empty).
    pub min: TimeNs,
    /// Maximum value (or 0 if empty).
    pub max: TimeNs,
    /// Sum of all values.
    pub sum: TimeNs,
    /// Sum of squares (for variance calculation).
    #[serde(skip)]
    sum_sq: u128,
}

impl DistributionStats {
    /// Create new empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sample value.
    pub fn add(&mut self, value: TimeNs) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
        self.sum_sq += (value as u128) * (value as u128);
    }

    /// Mean value (or 0 if empty).
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }

    /// Standard deviation (or 0 if empty or single sample).
    pub fn stddev(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            let mean = self.mean();
            let variance = (self.sum_sq as f64 / self.count as f64) - (mean * mean);
            variance.max(0.0).sqrt()
        }
    }

    /// Coefficient of variation (stddev / mean), as a percentage.
    /// Returns 0 if mean is 0.
    pub fn cv_percent(&self) -> f64 {
        let mean = self.mean();
        if mean == 0.0 {
            0.0
        } else {
            100.0 * self.stddev() / mean
        }
    }
}

impl FromIterator<TimeNs> for DistributionStats {
    fn from_iter<I: IntoIterator<Item = TimeNs>>(iter: I) -> Self {
        let mut stats = DistributionStats::new();
        for v in iter {
            stats.add(v);
        }
        stats
    }
}

/// Per-stream reporting output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamReport {
    pub stream: StreamId,
    pub configured_priority: f64,
    pub effective_priority: f64,
    pub arrived_count: u64,
    pub completed_count: u64,
    /// Times a task of this stream was preempted.
    pub preempted_count: u64,
    /// Tasks still waiting at termination.
    pub queue_len: usize,
    /// Wait times of completed tasks, in nanoseconds.
    pub wait_ns: DistributionStats,
    /// Total run times of completed tasks, in nanoseconds.
    pub run_ns: DistributionStats,
}

/// Reporting output of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub exit: ExitKind,
    pub seed: u64,
    /// Horizon in time units.
    pub horizon: f64,
    /// Time of the last processed event, in time units.
    pub clock: f64,
    pub time_unit_ns: TimeNs,
    pub arrived_count: u64,
    pub completed_count: u64,
    pub preemptions: u64,
    pub streams: Vec<StreamReport>,
}

impl Report {
    pub fn from_result(result: &SimulationResult) -> Self {
        let streams = result
            .streams
            .iter()
            .map(|s| StreamReport {
                stream: s.id(),
                configured_priority: s.configured_priority(),
                effective_priority: s.effective_priority(),
                arrived_count: s.arrived_count(),
                completed_count: s.completed_count(),
                preempted_count: s.preempted_count(),
                queue_len: s.queue_len(),
                wait_ns: result.completed_of(s.id()).map(|t| t.wait_time()).collect(),
                run_ns: result.completed_of(s.id()).map(|t| t.run_time()).collect(),
            })
            .collect::<Vec<_>>();

        Report {
            exit: result.exit,
            seed: result.seed,
            horizon: ns_to_units(result.horizon_ns, result.time_unit_ns),
            clock: ns_to_units(result.clock, result.time_unit_ns),
            time_unit_ns: result.time_unit_ns,
            arrived_count: result.arrived_count,
            completed_count: result.completed.len() as u64,
            preemptions: streams.iter().map(|s| s.preempted_count).sum(),
            streams,
        }
    }

    pub fn stream(&self, id: StreamId) -> Option<&StreamReport> {
        self.streams.iter().find(|s| s.stream == id)
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = self.time_unit_ns as f64;
        writeln!(
            f,
            "enter {}; completed {}",
            self.arrived_count, self.completed_count
        )?;
        writeln!(
            f,
            "horizon {} clock {:.6} exit {:?} preemptions {}",
            self.horizon, self.clock, self.exit, self.preemptions
        )?;
        for s in &self.streams {
            writeln!(f, "  Stream {}:", s.stream)?;
            writeln!(
                f,
                "    Priority:    {:.6} (configured {})",
                s.effective_priority, s.configured_priority
            )?;
            writeln!(
                f,
                "    Arrived:     {}  Completed: {}  Queued: {}  Preempted: {}",
                s.arrived_count, s.completed_count, s.queue_len, s.preempted_count
            )?;
            writeln!(
                f,
                "    Wait:        {:.6} mean, {:.6} stddev, {:.6} max",
                s.wait_ns.mean() / unit,
                s.wait_ns.stddev() / unit,
                s.wait_ns.max as f64 / unit
            )?;
            writeln!(
                f,
                "    Run:         {:.6} mean, {:.6} stddev, CV={:.1}%",
                s.run_ns.mean() / unit,
                s.run_ns.stddev() / unit,
                s.run_ns.cv_percent()
            )?;
        }
        Ok(())
    }
}
