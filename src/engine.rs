//! The event loop.
//!
//! Time advances by jumping to the next instant something happens: the
//! earliest pending arrival across all streams, or the completion of the
//! running task. Arrivals at an instant are processed before a completion
//! at the same instant, so a higher-priority arrival can preempt a task
//! that would otherwise finish on that tick.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{GeneratorRole, InvariantViolation, SimError};
use crate::fmt::{set_sim_clock, FmtN};
use crate::generator::SourceTable;
use crate::policy::HorizonPolicy;
use crate::scenario::Scenario;
use crate::server::{Server, Streams};
use crate::stats::Report;
use crate::stream::Stream;
use crate::task::Task;
use crate::trace::Trace;
use crate::types::{StreamId, TaskId, TimeNs};

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExitKind {
    /// The run reached its horizon, as decided by its [`HorizonPolicy`].
    Horizon,
    /// No arrival is pending and the server is idle.
    Drained,
    /// The configured event limit was reached.
    EventLimit,
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct SimulationResult {
    pub exit: ExitKind,
    /// Timestamp of the last processed event.
    pub clock: TimeNs,
    pub horizon_ns: TimeNs,
    pub horizon_policy: HorizonPolicy,
    pub time_unit_ns: TimeNs,
    pub seed: u64,
    /// Total tasks created by the run.
    pub arrived_count: u64,
    /// Arrival batches plus completions processed.
    pub events_processed: u64,
    /// Final state of every stream, ordered by key. Tasks still waiting at
    /// termination remain in their queues.
    pub streams: Vec<Stream>,
    /// Finished tasks in completion order.
    pub completed: Vec<Task>,
    /// Task holding the server at termination, if any.
    pub running: Option<Task>,
    pub trace: Trace,
}

impl SimulationResult {
    pub fn stream(&self, id: StreamId) -> Option<&Stream> {
        self.streams.iter().find(|s| s.id() == id)
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// Completed tasks of one stream, in completion order.
    pub fn completed_of(&self, id: StreamId) -> impl Iterator<Item = &Task> + '_ {
        self.completed.iter().filter(move |t| t.stream() == id)
    }

    /// Reporting output for this run.
    pub fn report(&self) -> Report {
        Report::from_result(self)
    }
}

/// One simulation run: owns the server, the streams, the generators and the
/// next scheduled arrival of every stream.
#[derive(Debug)]
pub struct Simulator {
    server: Server,
    streams: Streams,
    sources: SourceTable,
    /// `None` once a stream's arrival source is exhausted.
    next_arrival: BTreeMap<StreamId, Option<TimeNs>>,
    clock: TimeNs,
    arrived_count: u64,
    events_processed: u64,
    horizon_ns: TimeNs,
    horizon_policy: HorizonPolicy,
    event_limit: Option<u64>,
    seed: u64,
}

impl Simulator {
    /// Set up a run. Samples each stream's first arrival from `t = 0`.
    pub fn new(scenario: Scenario) -> Result<Self, SimError> {
        let Scenario {
            priorities,
            horizon_ns,
            time_unit_ns,
            tie_break,
            resume_policy,
            horizon_policy,
            event_limit,
            seed,
            mut sources,
        } = scenario;

        let streams: Streams = priorities
            .iter()
            .map(|(&id, &priority)| (id, Stream::new(id, priority, time_unit_ns)))
            .collect();

        let mut next_arrival = BTreeMap::new();
        for &id in streams.keys() {
            next_arrival.insert(id, sources.next_interarrival(id)?);
        }

        Ok(Simulator {
            server: Server::new(tie_break, resume_policy),
            streams,
            sources,
            next_arrival,
            clock: 0,
            arrived_count: 0,
            events_processed: 0,
            horizon_ns,
            horizon_policy,
            event_limit,
            seed,
        })
    }

    pub fn clock(&self) -> TimeNs {
        self.clock
    }

    pub fn arrived_count(&self) -> u64 {
        self.arrived_count
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    pub fn streams(&self) -> &Streams {
        &self.streams
    }

    /// Earliest pending arrival across all streams.
    pub fn next_arrival_time(&self) -> Option<TimeNs> {
        self.next_arrival.values().flatten().min().copied()
    }

    /// Process the next event. Returns the exit reason once the run is over.
    pub fn step(&mut self) -> Result<Option<ExitKind>, SimError> {
        let next_arrival = self.next_arrival_time();
        let next_completion = self.server.completion_time();

        let (now, is_arrival) = match (next_arrival, next_completion) {
            (None, None) => return Ok(Some(ExitKind::Drained)),
            (Some(a), Some(c)) => (a.min(c), a <= c),
            (Some(a), None) => (a, true),
            (None, Some(c)) => (c, false),
        };
        if self
            .horizon_policy
            .is_past(self.clock, now, self.horizon_ns)
        {
            return Ok(Some(ExitKind::Horizon));
        }
        if self
            .event_limit
            .is_some_and(|limit| self.events_processed >= limit)
        {
            return Ok(Some(ExitKind::EventLimit));
        }

        if now < self.clock {
            return Err(InvariantViolation::ClockRegression {
                from: self.clock,
                to: now,
            }
            .into());
        }
        self.clock = now;
        set_sim_clock(now);
        self.events_processed += 1;

        if is_arrival {
            self.process_arrivals(now)?;
        } else {
            self.server
                .advance_to_completion(now, &mut self.streams, &mut self.sources)?;
        }

        debug_assert!(self.server.check_invariants(), "busy/running mismatch");
        Ok(None)
    }

    /// Create a task for every stream whose next arrival is `now`, in
    /// ascending stream key order, and schedule each stream's next arrival.
    fn process_arrivals(&mut self, now: TimeNs) -> Result<(), SimError> {
        let due: Vec<StreamId> = self
            .next_arrival
            .iter()
            .filter(|&(_, at)| *at == Some(now))
            .map(|(&id, _)| id)
            .collect();

        for id in due {
            let task = Task::new(TaskId(self.arrived_count), id, now);
            self.arrived_count += 1;
            debug!(task = task.id().0, stream = id.0, "arrive");
            self.server
                .offer(task, now, &mut self.streams, &mut self.sources)?;

            // Renewal from the scheduled time, not from the server clock.
            let next = self
                .sources
                .next_interarrival(id)?
                .map(|gap| {
                    now.checked_add(gap).ok_or(SimError::TimeOverflow {
                        stream: id,
                        role: GeneratorRole::Arrival,
                        at: now,
                        duration: gap,
                    })
                })
                .transpose()?;
            if next.is_none() {
                debug!(stream = id.0, "arrivals exhausted");
            }
            self.next_arrival.insert(id, next);
        }
        Ok(())
    }

    /// Run until the horizon, drain, or event limit.
    pub fn run(mut self) -> Result<SimulationResult, SimError> {
        set_sim_clock(0);
        info!(
            streams = self.streams.len(),
            horizon_ns = %FmtN(self.horizon_ns),
            tie_break = ?self.server.tie_break(),
            resume = ?self.server.resume_policy(),
            horizon_policy = ?self.horizon_policy,
            seed = self.seed,
            "simulation start"
        );

        let exit = loop {
            if let Some(exit) = self.step()? {
                break exit;
            }
        };

        let completed_count = self.server.completed().len();
        info!(
            exit = ?exit,
            arrived = self.arrived_count,
            completed = completed_count,
            events = self.events_processed,
            "simulation finished"
        );

        let time_unit_ns = self.sources.unit_ns();
        let (completed, trace, running) = self.server.into_parts();
        Ok(SimulationResult {
            exit,
            clock: self.clock,
            horizon_ns: self.horizon_ns,
            horizon_policy: self.horizon_policy,
            time_unit_ns,
            seed: self.seed,
            arrived_count: self.arrived_count,
            events_processed: self.events_processed,
            streams: self.streams.into_values().collect(),
            completed,
            running,
            trace,
        })
    }
}
