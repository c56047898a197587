//! Task model for the simulator.
//!
//! A task is one unit of work from a stream. It only knows its own time
//! accounting; the server decides when it starts, pauses and completes.

use serde::Serialize;

use crate::error::InvariantViolation;
use crate::types::{StreamId, TaskId, TimeNs};

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting in its stream's queue, never started.
    Queued,
    /// Holding the server.
    Running,
    /// Preempted; waiting in its stream's queue to resume.
    Paused,
    /// Finished. Terminal: the task is never mutated again.
    Completed,
}

/// A unit of work with its time accounting.
///
/// Invariant: `wait_time + run_time == last_timestamp - arrival_time`
/// after every transition.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    id: TaskId,
    stream: StreamId,
    arrival_time: TimeNs,
    wait_time: TimeNs,
    run_time: TimeNs,
    remaining_service: TimeNs,
    last_timestamp: TimeNs,
    state: TaskState,
    /// Number of times the task was started (first start plus resumes).
    starts: u32,
    completed_at: Option<TimeNs>,
}

impl Task {
    /// Create a freshly arrived task.
    pub fn new(id: TaskId, stream: StreamId, arrival_time: TimeNs) -> Self {
        Task {
            id,
            stream,
            arrival_time,
            wait_time: 0,
            run_time: 0,
            remaining_service: 0,
            last_timestamp: arrival_time,
            state: TaskState::Queued,
            starts: 0,
            completed_at: None,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn stream(&self) -> StreamId {
        self.stream
    }

    pub fn arrival_time(&self) -> TimeNs {
        self.arrival_time
    }

    pub fn wait_time(&self) -> TimeNs {
        self.wait_time
    }

    pub fn run_time(&self) -> TimeNs {
        self.run_time
    }

    pub fn remaining_service(&self) -> TimeNs {
        self.remaining_service
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn starts(&self) -> u32 {
        self.starts
    }

    /// Whether the task has been started before (i.e. this start is a resume).
    pub fn was_started(&self) -> bool {
        self.starts > 0
    }

    /// Completion instant, once completed.
    pub fn completed_at(&self) -> Option<TimeNs> {
        self.completed_at
    }

    /// Total processing time: arrival to completion, waiting included.
    pub fn turnaround(&self) -> Option<TimeNs> {
        self.completed_at.map(|t| t - self.arrival_time)
    }

    /// Start (or resume) the task at `now` with `service` nanoseconds of work.
    ///
    /// The time since the task was last touched (arrival or pause) is waiting.
    pub fn start(&mut self, now: TimeNs, service: TimeNs) {
        debug_assert!(
            matches!(self.state, TaskState::Queued | TaskState::Paused),
            "start from {:?}",
            self.state
        );
        debug_assert!(now >= self.last_timestamp, "start before last timestamp");
        self.wait_time += now.saturating_sub(self.last_timestamp);
        self.remaining_service = service;
        self.last_timestamp = now;
        self.starts += 1;
        self.state = TaskState::Running;
    }

    /// Pause a running task at `now`, charging the elapsed time as run time.
    pub fn pause(&mut self, now: TimeNs) -> Result<(), InvariantViolation> {
        debug_assert_eq!(self.state, TaskState::Running, "pause while not running");
        let elapsed = now.saturating_sub(self.last_timestamp);
        if elapsed > self.remaining_service {
            return Err(InvariantViolation::NegativeRemainingService {
                task: self.id,
                elapsed,
                remaining: self.remaining_service,
            });
        }
        self.run_time += elapsed;
        self.remaining_service -= elapsed;
        self.last_timestamp = now;
        self.state = TaskState::Paused;
        Ok(())
    }

    /// Complete a running task at `now`. The remaining service is charged
    /// as run time; `now` is expected to be the scheduled completion instant.
    pub fn complete(&mut self, now: TimeNs) {
        debug_assert_eq!(self.state, TaskState::Running, "complete while not running");
        debug_assert_eq!(
            Some(now),
            self.scheduled_completion(),
            "completion off its scheduled instant"
        );
        self.run_time += self.remaining_service;
        self.remaining_service = 0;
        self.last_timestamp = now;
        self.completed_at = Some(now);
        self.state = TaskState::Completed;
    }

    /// Instant at which a running task finishes if not preempted, or `None`
    /// if that instant is past `TimeNs::MAX`.
    pub fn scheduled_completion(&self) -> Option<TimeNs> {
        self.last_timestamp.checked_add(self.remaining_service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(arrival: TimeNs) -> Task {
        Task::new(TaskId(1), StreamId(1), arrival)
    }

    #[test]
    fn test_run_to_completion() {
        let mut t = task(10);
        t.start(15, 100);
        assert_eq!(t.state(), TaskState::Running);
        assert_eq!(t.wait_time(), 5);
        assert_eq!(t.scheduled_completion(), Some(115));

        t.complete(115);
        assert_eq!(t.state(), TaskState::Completed);
        assert_eq!(t.run_time(), 100);
        assert_eq!(t.remaining_service(), 0);
        assert_eq!(t.turnaround(), Some(105));
        assert_eq!(t.wait_time() + t.run_time(), 105);
    }

    #[test]
    fn test_pause_and_resume() {
        let mut t = task(0);
        t.start(0, 50);
        t.pause(20).unwrap();
        assert_eq!(t.state(), TaskState::Paused);
        assert_eq!(t.run_time(), 20);
        assert_eq!(t.remaining_service(), 30);

        // Resume 10ns later with a fresh 40ns of service.
        t.start(30, 40);
        assert!(t.was_started());
        assert_eq!(t.starts(), 2);
        assert_eq!(t.wait_time(), 10);
        t.complete(70);
        assert_eq!(t.run_time(), 60);
        assert_eq!(t.wait_time() + t.run_time(), 70);
    }

    #[test]
    fn test_pause_at_completion_instant() {
        let mut t = task(0);
        t.start(0, 50);
        t.pause(50).unwrap();
        assert_eq!(t.remaining_service(), 0);
        assert_eq!(t.run_time(), 50);
    }

    #[test]
    fn test_pause_past_completion_is_rejected() {
        let mut t = task(0);
        t.start(0, 50);
        let err = t.pause(51).unwrap_err();
        assert_eq!(
            err,
            InvariantViolation::NegativeRemainingService {
                task: TaskId(1),
                elapsed: 51,
                remaining: 50,
            }
        );
        // Rejected pause leaves the task untouched.
        assert_eq!(t.state(), TaskState::Running);
        assert_eq!(t.run_time(), 0);
    }

    #[test]
    fn test_scheduled_completion_past_end_of_time() {
        let mut t = task(0);
        t.start(TimeNs::MAX - 3, 3);
        assert_eq!(t.scheduled_completion(), Some(TimeNs::MAX));

        let mut t = task(0);
        t.start(TimeNs::MAX - 3, 4);
        assert_eq!(t.scheduled_completion(), None);
    }

    #[test]
    fn test_zero_service() {
        let mut t = task(5);
        t.start(5, 0);
        t.complete(5);
        assert_eq!(t.run_time(), 0);
        assert_eq!(t.wait_time(), 0);
        assert_eq!(t.completed_at(), Some(5));
    }
}
