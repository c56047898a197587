//! Duration generators.
//!
//! The simulator never inspects a distribution family. It only needs a
//! source of non-negative durations per stream and role, expressed in time
//! units. Draws are validated and converted to nanoseconds here, before
//! they reach the scheduler.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use crate::error::{GeneratorRole, SimError};
use crate::server::ServiceSampler;
use crate::types::{units_to_ns, StreamId, TimeNs};

/// A source of durations in time units.
///
/// `None` means the source is exhausted. An exhausted arrival source closes
/// its stream; an exhausted service source is an error.
pub trait DurationSource: Send {
    fn produce_duration(&mut self) -> Option<f64>;
}

impl<T: DurationSource + ?Sized> DurationSource for Box<T> {
    fn produce_duration(&mut self) -> Option<f64> {
        (**self).produce_duration()
    }
}

/// Always the same duration.
#[derive(Debug, Clone, Copy)]
pub struct Fixed(pub f64);

impl DurationSource for Fixed {
    fn produce_duration(&mut self) -> Option<f64> {
        Some(self.0)
    }
}

/// A scripted sequence of durations, exhausted after the last one.
#[derive(Debug, Clone, Default)]
pub struct Scripted {
    values: VecDeque<f64>,
}

impl Scripted {
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        Scripted {
            values: values.into_iter().collect(),
        }
    }

    /// Inter-arrival gaps that produce arrivals at the given absolute times.
    ///
    /// `times` must be non-decreasing; the first gap is measured from zero.
    pub fn arrivals_at(times: &[f64]) -> Self {
        let mut prev = 0.0;
        let gaps = times.iter().map(|&t| {
            let gap = t - prev;
            prev = t;
            gap
        });
        Scripted::new(gaps.collect::<Vec<_>>())
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

impl DurationSource for Scripted {
    fn produce_duration(&mut self) -> Option<f64> {
        self.values.pop_front()
    }
}

/// Repeats a fixed pattern of durations forever.
#[derive(Debug, Clone)]
pub struct Cycle {
    values: Vec<f64>,
    idx: usize,
}

impl Cycle {
    /// # Panics
    ///
    /// Panics if `values` is empty.
    pub fn new(values: Vec<f64>) -> Self {
        assert!(!values.is_empty(), "cycle needs at least one value");
        Cycle { values, idx: 0 }
    }
}

impl DurationSource for Cycle {
    fn produce_duration(&mut self) -> Option<f64> {
        let v = self.values[self.idx];
        self.idx = (self.idx + 1) % self.values.len();
        Some(v)
    }
}

/// Adapter for a plain closure.
pub struct FromFn<F>(F);

/// Wrap a closure as a never-exhausted [`DurationSource`].
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: FnMut() -> f64 + Send,
{
    FromFn(f)
}

impl<F> DurationSource for FromFn<F>
where
    F: FnMut() -> f64 + Send,
{
    fn produce_duration(&mut self) -> Option<f64> {
        Some((self.0)())
    }
}

/// Validate a raw draw and convert it to nanoseconds.
pub fn checked_duration(
    raw: f64,
    unit_ns: TimeNs,
    stream: StreamId,
    role: GeneratorRole,
) -> Result<TimeNs, SimError> {
    units_to_ns(raw, unit_ns).ok_or(SimError::InvalidGeneratorOutput {
        stream,
        role,
        value: raw,
    })
}

/// The arrival and service generators of one stream.
pub struct StreamSources {
    pub arrival: Box<dyn DurationSource>,
    pub service: Box<dyn DurationSource>,
}

impl fmt::Debug for StreamSources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSources").finish_non_exhaustive()
    }
}

/// Generator pairs keyed by stream, plus the time scale draws are in.
#[derive(Debug)]
pub struct SourceTable {
    unit_ns: TimeNs,
    sources: BTreeMap<StreamId, StreamSources>,
}

impl SourceTable {
    pub fn new(unit_ns: TimeNs, sources: BTreeMap<StreamId, StreamSources>) -> Self {
        SourceTable { unit_ns, sources }
    }

    pub fn unit_ns(&self) -> TimeNs {
        self.unit_ns
    }

    /// Draw the next inter-arrival gap. `Ok(None)` once the stream is closed.
    pub fn next_interarrival(&mut self, stream: StreamId) -> Result<Option<TimeNs>, SimError> {
        let unit_ns = self.unit_ns;
        let src = self.get_mut(stream)?;
        match src.arrival.produce_duration() {
            Some(raw) => checked_duration(raw, unit_ns, stream, GeneratorRole::Arrival).map(Some),
            None => Ok(None),
        }
    }

    fn get_mut(&mut self, stream: StreamId) -> Result<&mut StreamSources, SimError> {
        self.sources
            .get_mut(&stream)
            .ok_or_else(|| SimError::Config(format!("no generators for stream {stream}")))
    }
}

impl ServiceSampler for SourceTable {
    fn sample_service(&mut self, stream: StreamId) -> Result<TimeNs, SimError> {
        let unit_ns = self.unit_ns;
        let src = self.get_mut(stream)?;
        let raw = src
            .service
            .produce_duration()
            .ok_or(SimError::GeneratorExhausted { stream })?;
        checked_duration(raw, unit_ns, stream, GeneratorRole::Service)
    }
}
