//! Swappable scheduling policies.
//!
//! The dispatch rule always prefers the stream with the strictly highest
//! effective priority. [`TieBreak`] decides between streams of equal
//! priority, [`ResumePolicy`] decides how much work a preempted task still
//! has when it runs again. [`HorizonPolicy`] decides where a run stops.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::stream::Stream;
use crate::types::TimeNs;

/// How to choose between non-empty streams of equal effective priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// Longer queue wins, then the lowest stream key.
    #[default]
    LongerQueue,
    /// Lowest stream key wins.
    LowestKey,
    /// Earliest-arrived head task wins, then the lowest stream key.
    OldestHead,
}

impl TieBreak {
    /// Order two candidate streams; `Greater` means `a` should be dispatched
    /// in preference to `b`.
    pub fn compare(self, a: &Stream, b: &Stream) -> Ordering {
        let by_priority = a.effective_priority().total_cmp(&b.effective_priority());
        let by_policy = match self {
            TieBreak::LongerQueue => a.queue_len().cmp(&b.queue_len()),
            TieBreak::LowestKey => Ordering::Equal,
            // Earlier head arrival is preferred, so compare reversed.
            TieBreak::OldestHead => b.head_arrival_time().cmp(&a.head_arrival_time()),
        };
        by_priority
            .then(by_policy)
            .then_with(|| b.id().cmp(&a.id()))
    }

    /// Pick the preferred non-empty stream, if any.
    pub fn select<'a>(self, streams: impl IntoIterator<Item = &'a Stream>) -> Option<&'a Stream> {
        streams
            .into_iter()
            .filter(|s| !s.is_empty())
            .max_by(|a, b| self.compare(a, b))
    }
}

/// Service time given to a task that resumes after preemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResumePolicy {
    /// Draw a fresh service time from the stream's generator on every start.
    #[default]
    Resample,
    /// Continue with the service time left at the pause.
    Continue,
}

/// Where a run stops relative to its horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HorizonPolicy {
    /// Only events at or before the horizon are processed.
    #[default]
    Inclusive,
    /// Keep processing while the clock is at or before the horizon. The
    /// last event processed may land past it.
    Overshoot,
}

impl HorizonPolicy {
    /// Whether the run is over, given the clock of the last processed event
    /// and the timestamp of the next pending one.
    pub fn is_past(self, clock: TimeNs, next: TimeNs, horizon: TimeNs) -> bool {
        match self {
            HorizonPolicy::Inclusive => next > horizon,
            HorizonPolicy::Overshoot => clock > horizon,
        }
    }
}
