//! Trace event recording for the simulator.
//!
//! Every scheduling action (arrival, dispatch, preemption, completion, idle,
//! priority update) is recorded as a `TraceEvent` with its simulated
//! timestamp, in processing order.

use serde::Serialize;

use crate::fmt::FmtTs;
use crate::types::{StreamId, TaskId, TimeNs};

/// A single trace event produced by the simulator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEvent {
    /// Simulated time in nanoseconds when this event occurred.
    pub time_ns: TimeNs,
    /// The kind of event.
    pub kind: TraceKind,
}

/// The type of scheduling event recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceKind {
    /// A task arrived and joined its stream's queue.
    Arrived { task: TaskId, stream: StreamId },
    /// A task started (or resumed) on the server.
    Dispatched {
        task: TaskId,
        stream: StreamId,
        service_ns: TimeNs,
        resumed: bool,
    },
    /// The running task was paused by a higher-priority arrival.
    Preempted {
        task: TaskId,
        stream: StreamId,
        remaining_ns: TimeNs,
    },
    /// A task finished.
    Completed {
        task: TaskId,
        stream: StreamId,
        run_ns: TimeNs,
        wait_ns: TimeNs,
    },
    /// A stream's effective priority was recomputed.
    PriorityUpdated { stream: StreamId, priority: f64 },
    /// The server went idle (no ready task after a completion).
    Idle,
}

/// A complete simulation trace, containing all events in processing order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Trace {
    events: Vec<TraceEvent>,
}

impl Trace {
    pub(crate) fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub(crate) fn record(&mut self, time_ns: TimeNs, kind: TraceKind) {
        self.events.push(TraceEvent { time_ns, kind });
    }

    /// Get all events in processing order.
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Count the number of times a task of `stream` was dispatched.
    pub fn dispatch_count(&self, stream: StreamId) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, TraceKind::Dispatched { stream: s, .. } if s == stream))
            .count()
    }

    /// Count the number of preemptions suffered by tasks of `stream`.
    pub fn preempt_count(&self, stream: StreamId) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, TraceKind::Preempted { stream: s, .. } if s == stream))
            .count()
    }

    /// Total number of preemptions.
    pub fn total_preemptions(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, TraceKind::Preempted { .. }))
            .count()
    }

    /// Order in which tasks of `stream` were first dispatched.
    pub fn first_dispatch_order(&self, stream: StreamId) -> Vec<TaskId> {
        self.events
            .iter()
            .filter_map(|e| match e.kind {
                TraceKind::Dispatched {
                    task,
                    stream: s,
                    resumed: false,
                    ..
                } if s == stream => Some(task),
                _ => None,
            })
            .collect()
    }

    /// Effective priority of `stream` over time: one `(time, priority)`
    /// sample per recomputation. This is the series a priority plot is
    /// drawn from.
    pub fn priority_series(&self, stream: StreamId) -> Vec<(TimeNs, f64)> {
        self.events
            .iter()
            .filter_map(|e| match e.kind {
                TraceKind::PriorityUpdated {
                    stream: s,
                    priority,
                } if s == stream => Some((e.time_ns, priority)),
                _ => None,
            })
            .collect()
    }

    /// Maximum number of tasks holding the server at once, reconstructed
    /// from dispatch/preempt/complete events.
    pub fn max_concurrent_running(&self) -> usize {
        let mut running: usize = 0;
        let mut max = 0;
        for event in &self.events {
            match event.kind {
                TraceKind::Dispatched { .. } => {
                    running += 1;
                    max = max.max(running);
                }
                TraceKind::Preempted { .. } | TraceKind::Completed { .. } => {
                    running = running.saturating_sub(1);
                }
                _ => {}
            }
        }
        max
    }

    /// Whether event timestamps never decrease.
    pub fn is_monotonic(&self) -> bool {
        self.events.windows(2).all(|w| w[0].time_ns <= w[1].time_ns)
    }

    /// Pretty-print the trace for debugging.
    pub fn dump(&self) {
        for event in &self.events {
            let desc = match &event.kind {
                TraceKind::Arrived { task, stream } => {
                    format!("ARRIVE   task={task} stream={stream}")
                }
                TraceKind::Dispatched {
                    task,
                    stream,
                    service_ns,
                    resumed,
                } => format!(
                    "{} task={task} stream={stream} service={service_ns}",
                    if *resumed { "RESUME  " } else { "DISPATCH" }
                ),
                TraceKind::Preempted {
                    task,
                    stream,
                    remaining_ns,
                } => format!("PREEMPT  task={task} stream={stream} remaining={remaining_ns}"),
                TraceKind::Completed {
                    task,
                    stream,
                    run_ns,
                    wait_ns,
                } => format!("COMPLETE task={task} stream={stream} run={run_ns} wait={wait_ns}"),
                TraceKind::PriorityUpdated { stream, priority } => {
                    format!("PRIORITY stream={stream} priority={priority:.6}")
                }
                TraceKind::Idle => "IDLE".to_string(),
            };
            eprintln!("[{}] {}", FmtTs(event.time_ns), desc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatched(task: u64, stream: u32, resumed: bool) -> TraceKind {
        TraceKind::Dispatched {
            task: TaskId(task),
            stream: StreamId(stream),
            service_ns: 1,
            resumed,
        }
    }

    #[test]
    fn test_queries() {
        let mut trace = Trace::new();
        trace.record(0, dispatched(1, 1, false));
        trace.record(
            5,
            TraceKind::Preempted {
                task: TaskId(1),
                stream: StreamId(1),
                remaining_ns: 3,
            },
        );
        trace.record(5, dispatched(2, 2, false));
        trace.record(
            9,
            TraceKind::Completed {
                task: TaskId(2),
                stream: StreamId(2),
                run_ns: 4,
                wait_ns: 0,
            },
        );
        trace.record(
            9,
            TraceKind::PriorityUpdated {
                stream: StreamId(2),
                priority: 4.0,
            },
        );
        trace.record(9, dispatched(1, 1, true));

        assert_eq!(trace.dispatch_count(StreamId(1)), 2);
        assert_eq!(trace.preempt_count(StreamId(1)), 1);
        assert_eq!(trace.total_preemptions(), 1);
        assert_eq!(trace.first_dispatch_order(StreamId(1)), vec![TaskId(1)]);
        assert_eq!(trace.priority_series(StreamId(2)), vec![(9, 4.0)]);
        assert_eq!(trace.max_concurrent_running(), 1);
        assert!(trace.is_monotonic());
    }

    #[test]
    fn test_overlapping_dispatch_detected() {
        let mut trace = Trace::new();
        trace.record(0, dispatched(1, 1, false));
        trace.record(1, dispatched(2, 1, false));
        assert_eq!(trace.max_concurrent_running(), 2);
    }
}
