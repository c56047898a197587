//! Newtype wrappers and type aliases for domain concepts.
//!
//! Newtypes for identifiers (stream keys, task sequence numbers) prevent
//! silent type confusion. Simulated time is a plain `u64` nanosecond count
//! so that time accounting under preemption stays exact.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stream identifier. Assigned at configuration time and never changed.
///
/// Ordering is used as the final, deterministic tie-break between streams.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct StreamId(pub u32);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task identifier: global arrival sequence number within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Simulated time in nanoseconds.
pub type TimeNs = u64;

/// Default scale between generator time units and simulated nanoseconds:
/// one unit is one simulated second.
pub const NS_PER_UNIT: TimeNs = 1_000_000_000;

/// Convert a duration in time units to nanoseconds, rounding to the nearest
/// nanosecond. Returns `None` for negative, non-finite or overflowing input.
pub fn units_to_ns(units: f64, unit_ns: TimeNs) -> Option<TimeNs> {
    if !units.is_finite() || units < 0.0 {
        return None;
    }
    let ns = (units * unit_ns as f64).round();
    if ns >= u64::MAX as f64 {
        return None;
    }
    Some(ns as TimeNs)
}

/// Convert nanoseconds back to time units (for reporting).
pub fn ns_to_units(ns: TimeNs, unit_ns: TimeNs) -> f64 {
    ns as f64 / unit_ns as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units_to_ns() {
        assert_eq!(units_to_ns(0.0, NS_PER_UNIT), Some(0));
        assert_eq!(units_to_ns(0.5, NS_PER_UNIT), Some(500_000_000));
        assert_eq!(units_to_ns(3.0, 1_000), Some(3_000));
        assert_eq!(units_to_ns(1.0004, 1_000), Some(1_000));
        assert_eq!(units_to_ns(-0.1, NS_PER_UNIT), None);
        assert_eq!(units_to_ns(f64::NAN, NS_PER_UNIT), None);
        assert_eq!(units_to_ns(f64::INFINITY, NS_PER_UNIT), None);
        assert_eq!(units_to_ns(1e30, NS_PER_UNIT), None);
    }

    #[test]
    fn test_ns_to_units() {
        assert_eq!(ns_to_units(2_500_000_000, NS_PER_UNIT), 2.5);
        assert_eq!(ns_to_units(0, NS_PER_UNIT), 0.0);
    }

    #[test]
    fn test_stream_id_order() {
        let mut ids = vec![StreamId(3), StreamId(1), StreamId(2)];
        ids.sort();
        assert_eq!(ids, vec![StreamId(1), StreamId(2), StreamId(3)]);
        assert_eq!(StreamId(7).to_string(), "7");
        assert_eq!(TaskId(12).to_string(), "#12");
    }
}
