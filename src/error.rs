//! Error types for the simulator.

use std::fmt;

use thiserror::Error;

use crate::types::{StreamId, TaskId, TimeNs};

/// Which of a stream's two generators produced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorRole {
    /// Inter-arrival time generator.
    Arrival,
    /// Service time generator.
    Service,
}

impl fmt::Display for GeneratorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorRole::Arrival => f.write_str("arrival"),
            GeneratorRole::Service => f.write_str("service"),
        }
    }
}

/// Scheduler bookkeeping found in a state that correct code never reaches.
///
/// These are defects in the simulator itself, not recoverable conditions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// A task had to be started but every stream queue was empty.
    #[error("dispatch required but every stream queue is empty")]
    EmptyDispatch,

    /// Pausing a task would drive its remaining service time below zero.
    #[error("pausing task {task} after {elapsed}ns exceeds its remaining service of {remaining}ns")]
    NegativeRemainingService {
        task: TaskId,
        elapsed: TimeNs,
        remaining: TimeNs,
    },

    /// A completion was processed while the server had no running task.
    #[error("completion processed while the server is idle")]
    CompletionWhileIdle,

    /// The event loop tried to move the clock backwards.
    #[error("clock moved backwards from {from}ns to {to}ns")]
    ClockRegression { from: TimeNs, to: TimeNs },
}

/// Errors that can occur when configuring or running a simulation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// Invalid or unsupported configuration, detected before the run starts.
    #[error("configuration error: {0}")]
    Config(String),

    /// A generator produced a negative or non-finite duration.
    #[error("stream {stream}: {role} generator produced invalid duration {value}")]
    InvalidGeneratorOutput {
        stream: StreamId,
        role: GeneratorRole,
        value: f64,
    },

    /// A draw scheduled from `at` lands past the last representable instant.
    #[error("stream {stream}: {role} duration of {duration}ns from {at}ns overflows the clock")]
    TimeOverflow {
        stream: StreamId,
        role: GeneratorRole,
        at: TimeNs,
        duration: TimeNs,
    },

    /// A service generator ran out of values while a task needed one.
    #[error("stream {stream}: service generator exhausted")]
    GeneratorExhausted { stream: StreamId },

    /// Internal scheduler defect.
    #[error("internal invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),
}

impl SimError {
    /// Whether this error indicates a simulator defect rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(self, SimError::Invariant(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let e = SimError::InvalidGeneratorOutput {
            stream: StreamId(2),
            role: GeneratorRole::Service,
            value: -1.5,
        };
        assert_eq!(
            e.to_string(),
            "stream 2: service generator produced invalid duration -1.5"
        );
        assert!(!e.is_internal());

        let e = SimError::TimeOverflow {
            stream: StreamId(1),
            role: GeneratorRole::Arrival,
            at: 10,
            duration: 5,
        };
        assert_eq!(
            e.to_string(),
            "stream 1: arrival duration of 5ns from 10ns overflows the clock"
        );
        assert!(!e.is_internal());

        let e: SimError = InvariantViolation::EmptyDispatch.into();
        assert!(e.is_internal());
        assert!(e.to_string().contains("every stream queue is empty"));
    }
}
