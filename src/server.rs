//! The single shared server: dispatch, preemption and completion.
//!
//! A task is owned by exactly one of its stream's queue, the server's
//! running slot, or the completed-output list. Every transition below moves
//! it between those by value.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{GeneratorRole, InvariantViolation, SimError};
use crate::policy::{ResumePolicy, TieBreak};
use crate::stream::Stream;
use crate::task::{Task, TaskState};
use crate::trace::{Trace, TraceKind};
use crate::types::{StreamId, TimeNs};

/// Streams keyed by id. Ordered so iteration (and thus tie-breaking) is
/// deterministic.
pub type Streams = BTreeMap<StreamId, Stream>;

/// Source of service times for the dispatch rule.
pub trait ServiceSampler {
    /// Draw a service time for a task of `stream` that is about to start.
    fn sample_service(&mut self, stream: StreamId) -> Result<TimeNs, SimError>;
}

/// The task currently holding the server.
#[derive(Debug)]
struct Running {
    task: Task,
    completes_at: TimeNs,
}

/// The single shared resource.
#[derive(Debug)]
pub struct Server {
    clock: TimeNs,
    running: Option<Running>,
    /// Kept alongside `running` as an explicit invariant: `busy <=> running`.
    busy: bool,
    completed: Vec<Task>,
    tie_break: TieBreak,
    resume: ResumePolicy,
    trace: Trace,
}

impl Server {
    pub fn new(tie_break: TieBreak, resume: ResumePolicy) -> Self {
        Server {
            clock: 0,
            running: None,
            busy: false,
            completed: Vec::new(),
            tie_break,
            resume,
            trace: Trace::new(),
        }
    }

    /// Server time of the last transition.
    pub fn clock(&self) -> TimeNs {
        self.clock
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn running(&self) -> Option<&Task> {
        self.running.as_ref().map(|r| &r.task)
    }

    /// Stream owning the running task.
    pub fn running_stream(&self) -> Option<StreamId> {
        self.running().map(Task::stream)
    }

    /// Completion instant of the running task, or `None` when idle.
    pub fn completion_time(&self) -> Option<TimeNs> {
        self.running.as_ref().map(|r| r.completes_at)
    }

    /// Finished tasks in completion order.
    pub fn completed(&self) -> &[Task] {
        &self.completed
    }

    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    pub fn resume_policy(&self) -> ResumePolicy {
        self.resume
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Take the completed tasks, the trace, and the still-running task.
    pub(crate) fn into_parts(self) -> (Vec<Task>, Trace, Option<Task>) {
        (self.completed, self.trace, self.running.map(|r| r.task))
    }

    /// Check `busy <=> running task present`.
    pub fn check_invariants(&self) -> bool {
        self.busy == self.running.is_some()
            && self
                .running
                .as_ref()
                .is_none_or(|r| r.task.state() == TaskState::Running)
    }

    fn advance_clock(&mut self, now: TimeNs) -> Result<(), InvariantViolation> {
        if now < self.clock {
            return Err(InvariantViolation::ClockRegression {
                from: self.clock,
                to: now,
            });
        }
        self.clock = now;
        Ok(())
    }

    /// Handle a newly arrived task.
    ///
    /// The task is queued on its stream. An idle server dispatches at once;
    /// a busy server is preempted iff the arriving stream's effective
    /// priority is strictly higher than that of the running task's stream.
    pub fn offer(
        &mut self,
        task: Task,
        now: TimeNs,
        streams: &mut Streams,
        sampler: &mut dyn ServiceSampler,
    ) -> Result<(), SimError> {
        self.advance_clock(now)?;
        let key = task.stream();
        let stream = streams
            .get_mut(&key)
            .ok_or_else(|| SimError::Config(format!("task for unknown stream {key}")))?;
        self.trace.record(
            now,
            TraceKind::Arrived {
                task: task.id(),
                stream: key,
            },
        );
        stream.enqueue(task);
        let arriving_priority = stream.effective_priority();

        let Some(running_stream) = self.running_stream() else {
            return self.dispatch_required(now, streams, sampler);
        };

        let running_priority = streams
            .get(&running_stream)
            .map(Stream::effective_priority)
            .ok_or_else(|| SimError::Config(format!("running task of unknown stream {running_stream}")))?;

        if arriving_priority > running_priority {
            self.preempt(now, streams)?;
            self.dispatch_required(now, streams, sampler)?;
        }
        Ok(())
    }

    /// Pause the running task and put it back at the tail of its queue.
    fn preempt(&mut self, now: TimeNs, streams: &mut Streams) -> Result<(), SimError> {
        let Some(Running { mut task, .. }) = self.running.take() else {
            return Ok(());
        };
        self.busy = false;
        task.pause(now)?;
        let key = task.stream();
        debug!(
            task = task.id().0,
            stream = key.0,
            remaining_ns = task.remaining_service(),
            "preempt"
        );
        self.trace.record(
            now,
            TraceKind::Preempted {
                task: task.id(),
                stream: key,
                remaining_ns: task.remaining_service(),
            },
        );
        streams
            .get_mut(&key)
            .ok_or_else(|| SimError::Config(format!("preempted task of unknown stream {key}")))?
            .requeue(task);
        Ok(())
    }

    /// Complete the running task at its scheduled instant and pick the next
    /// ready task, if any.
    pub fn advance_to_completion(
        &mut self,
        now: TimeNs,
        streams: &mut Streams,
        sampler: &mut dyn ServiceSampler,
    ) -> Result<(), SimError> {
        self.advance_clock(now)?;
        let Some(Running { mut task, completes_at }) = self.running.take() else {
            return Err(InvariantViolation::CompletionWhileIdle.into());
        };
        self.busy = false;
        debug_assert_eq!(now, completes_at, "completion off schedule");
        task.complete(now);

        let key = task.stream();
        let stream = streams
            .get_mut(&key)
            .ok_or_else(|| SimError::Config(format!("completed task of unknown stream {key}")))?;
        let updated = stream.record_completion(task.run_time());
        debug!(task = task.id().0, stream = key.0, run_ns = task.run_time(), "complete");
        self.trace.record(
            now,
            TraceKind::Completed {
                task: task.id(),
                stream: key,
                run_ns: task.run_time(),
                wait_ns: task.wait_time(),
            },
        );
        if let Some(priority) = updated {
            debug!(stream = key.0, priority, "priority update");
            self.trace
                .record(now, TraceKind::PriorityUpdated { stream: key, priority });
        }
        self.completed.push(task);

        if !self.dispatch(now, streams, sampler)? {
            debug!("idle");
            self.trace.record(now, TraceKind::Idle);
        }
        Ok(())
    }

    /// Dispatch rule. Returns `false` if every queue was empty.
    pub fn dispatch(
        &mut self,
        now: TimeNs,
        streams: &mut Streams,
        sampler: &mut dyn ServiceSampler,
    ) -> Result<bool, SimError> {
        debug_assert!(!self.busy, "dispatch on a busy server");
        let Some(key) = self.tie_break.select(streams.values()).map(Stream::id) else {
            return Ok(false);
        };
        let Some(mut task) = streams.get_mut(&key).and_then(Stream::dequeue) else {
            return Err(InvariantViolation::EmptyDispatch.into());
        };

        let service = match (self.resume, task.state()) {
            (ResumePolicy::Continue, TaskState::Paused) => task.remaining_service(),
            _ => sampler.sample_service(key)?,
        };
        let completes_at = now.checked_add(service).ok_or(SimError::TimeOverflow {
            stream: key,
            role: GeneratorRole::Service,
            at: now,
            duration: service,
        })?;
        let resumed = task.was_started();
        task.start(now, service);
        debug!(
            task = task.id().0,
            stream = key.0,
            service_ns = service,
            resumed,
            "dispatch"
        );
        self.trace.record(
            now,
            TraceKind::Dispatched {
                task: task.id(),
                stream: key,
                service_ns: service,
                resumed,
            },
        );
        debug_assert_eq!(task.scheduled_completion(), Some(completes_at));
        self.running = Some(Running { task, completes_at });
        self.busy = true;
        Ok(true)
    }

    /// Dispatch at a call site where at least one queue is known non-empty.
    fn dispatch_required(
        &mut self,
        now: TimeNs,
        streams: &mut Streams,
        sampler: &mut dyn ServiceSampler,
    ) -> Result<(), SimError> {
        if self.dispatch(now, streams, sampler)? {
            Ok(())
        } else {
            Err(InvariantViolation::EmptyDispatch.into())
        }
    }
}
