//! Streams: named task classes competing for the server.
//!
//! Each stream owns a FIFO queue of tasks that are waiting (never started or
//! preempted) and the completion statistics its adaptive priority is derived
//! from.

use std::collections::VecDeque;

use crate::task::{Task, TaskState};
use crate::types::{StreamId, TaskId, TimeNs};

/// Number of completions a stream needs before its priority adapts.
///
/// While `completed_count <= WARMUP_COMPLETIONS` the configured seed is used.
pub const WARMUP_COMPLETIONS: u64 = 10;

/// A class of competing work with its own queue and priority.
#[derive(Debug, Clone)]
pub struct Stream {
    id: StreamId,
    configured_priority: f64,
    effective_priority: f64,
    /// Scale used to express the adaptive priority in generator time units.
    unit_ns: TimeNs,
    queue: VecDeque<Task>,
    last_arrival_time: Option<TimeNs>,
    arrived_count: u64,
    completed_count: u64,
    sum_completed_service_time: TimeNs,
    preempted_count: u64,
}

impl Stream {
    /// # Panics
    ///
    /// Panics if `unit_ns` is zero. [`ScenarioBuilder::build`] rejects such
    /// scenarios before any stream is created.
    ///
    /// [`ScenarioBuilder::build`]: crate::scenario::ScenarioBuilder::build
    pub fn new(id: StreamId, configured_priority: f64, unit_ns: TimeNs) -> Self {
        assert!(unit_ns > 0, "unit_ns must be positive");
        Stream {
            id,
            configured_priority,
            effective_priority: configured_priority,
            unit_ns,
            queue: VecDeque::new(),
            last_arrival_time: None,
            arrived_count: 0,
            completed_count: 0,
            sum_completed_service_time: 0,
            preempted_count: 0,
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn configured_priority(&self) -> f64 {
        self.configured_priority
    }

    pub fn effective_priority(&self) -> f64 {
        self.effective_priority
    }

    pub fn arrived_count(&self) -> u64 {
        self.arrived_count
    }

    pub fn completed_count(&self) -> u64 {
        self.completed_count
    }

    pub fn sum_completed_service_time(&self) -> TimeNs {
        self.sum_completed_service_time
    }

    /// Number of times a task of this stream was preempted.
    pub fn preempted_count(&self) -> u64 {
        self.preempted_count
    }

    pub fn last_arrival_time(&self) -> Option<TimeNs> {
        self.last_arrival_time
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Arrival time of the task at the head of the queue.
    pub fn head_arrival_time(&self) -> Option<TimeNs> {
        self.queue.front().map(|t| t.arrival_time())
    }

    /// IDs of queued tasks, head first.
    pub fn queued_ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.queue.iter().map(|t| t.id())
    }

    /// Append a newly arrived task to the tail of the queue.
    pub fn enqueue(&mut self, task: Task) {
        debug_assert_eq!(task.stream(), self.id, "task enqueued on foreign stream");
        debug_assert_eq!(task.state(), TaskState::Queued, "enqueue of a started task");
        self.last_arrival_time = Some(task.arrival_time());
        self.arrived_count += 1;
        self.queue.push_back(task);
    }

    /// Return a preempted task to the tail of the queue. Not counted as an
    /// arrival.
    pub fn requeue(&mut self, task: Task) {
        debug_assert_eq!(task.stream(), self.id, "task requeued on foreign stream");
        debug_assert_eq!(task.state(), TaskState::Paused, "requeue of a non-paused task");
        self.preempted_count += 1;
        self.queue.push_back(task);
    }

    /// Pop the head of the queue.
    pub fn dequeue(&mut self) -> Option<Task> {
        self.queue.pop_front()
    }

    /// Account a completed task and recompute the adaptive priority.
    ///
    /// Returns the new effective priority if it was recomputed.
    pub fn record_completion(&mut self, total_processing_time: TimeNs) -> Option<f64> {
        self.completed_count += 1;
        self.sum_completed_service_time += total_processing_time;
        if self.completed_count > WARMUP_COMPLETIONS {
            let mean_ns =
                self.sum_completed_service_time as f64 / self.completed_count as f64;
            self.effective_priority = mean_ns / self.unit_ns as f64;
            Some(self.effective_priority)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arrival(id: u64, at: TimeNs) -> Task {
        Task::new(TaskId(id), StreamId(1), at)
    }

    #[test]
    fn test_fifo() {
        let mut s = Stream::new(StreamId(1), 1.0, 1);
        s.enqueue(arrival(1, 0));
        s.enqueue(arrival(2, 5));
        s.enqueue(arrival(3, 9));
        assert_eq!(s.arrived_count(), 3);
        assert_eq!(s.last_arrival_time(), Some(9));
        assert_eq!(s.head_arrival_time(), Some(0));

        let ids: Vec<u64> = std::iter::from_fn(|| s.dequeue()).map(|t| t.id().0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(s.dequeue().is_none());
    }

    #[test]
    fn test_requeue_goes_to_tail_and_is_not_an_arrival() {
        let mut s = Stream::new(StreamId(1), 1.0, 1);
        s.enqueue(arrival(1, 0));
        s.enqueue(arrival(2, 1));

        let mut head = s.dequeue().unwrap();
        head.start(2, 10);
        head.pause(4).unwrap();
        s.requeue(head);

        assert_eq!(s.arrived_count(), 2);
        assert_eq!(s.preempted_count(), 1);
        assert_eq!(s.queued_ids().map(|id| id.0).collect::<Vec<_>>(), vec![2, 1]);
    }

    #[test]
    fn test_priority_warmup() {
        let mut s = Stream::new(StreamId(1), 7.0, 1);
        for i in 1..=WARMUP_COMPLETIONS {
            assert_eq!(s.record_completion(2), None);
            assert_eq!(s.completed_count(), i);
            assert_eq!(s.effective_priority(), 7.0);
        }
        // 11th completion: mean of ten 2s and one 13 = 33 / 11 = 3.
        assert_eq!(s.record_completion(13), Some(3.0));
        assert_eq!(s.effective_priority(), 3.0);
        assert_eq!(s.configured_priority(), 7.0);

        // Tracks the sample mean in both directions.
        s.record_completion(99);
        assert_eq!(s.effective_priority(), 132.0 / 12.0);
    }

    #[test]
    #[should_panic(expected = "unit_ns must be positive")]
    fn test_zero_unit_panics() {
        Stream::new(StreamId(1), 1.0, 0);
    }

    #[test]
    fn test_priority_in_time_units() {
        let mut s = Stream::new(StreamId(1), 1.0, 1_000);
        for _ in 0..=WARMUP_COMPLETIONS {
            s.record_completion(2_500);
        }
        assert_eq!(s.effective_priority(), 2.5);
    }
}
