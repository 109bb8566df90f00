//! Observation hooks.
//!
//! A link reports three kinds of events to its [`Telemetry`] sink: packet arrivals, delivery
//! opportunities and packet departures. Sinks only observe; nothing they do feeds back into the
//! link. [`NoopTelemetry`] is the default and compiles down to nothing.

use std::sync::Arc;

use ratelink_common::Timestamp;

use crate::LinkStats;

/// Static facts about a link, handed to a sink when it is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkInfo {
    /// The link name.
    pub name: String,
    /// Description of the control source, e.g. the control file path.
    pub control: String,
    /// Description of the packet queue.
    pub queue: String,
    /// Bytes per delivery opportunity.
    pub cell_size: usize,
    /// The link's base timestamp at attach time.
    pub base: Timestamp,
}

/// Receiver of link events. All methods default to doing nothing.
pub trait Telemetry {
    /// Called once when the sink is attached to a link.
    fn on_attach(&mut self, _info: &LinkInfo) {}

    /// A packet of `size` bytes arrived at the link.
    fn on_arrival(&mut self, _at: Timestamp, _size: usize) {}

    /// A delivery opportunity able to carry `budget` bytes was granted.
    fn on_opportunity(&mut self, _at: Timestamp, _budget: usize) {}

    /// A packet of `size` bytes left the link after waiting `delay_ms` milliseconds.
    fn on_departure(&mut self, _at: Timestamp, _size: usize, _delay_ms: u64) {}
}

/// A sink that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {}

/// A sink that emits every event as a `tracing` event at TRACE level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn on_attach(&mut self, info: &LinkInfo) {
        tracing::debug!(
            name = %info.name,
            control = %info.control,
            queue = %info.queue,
            cell_size = info.cell_size,
            base = %info.base,
            "link attached"
        );
    }

    fn on_arrival(&mut self, at: Timestamp, size: usize) {
        tracing::trace!(%at, size, "arrival");
    }

    fn on_opportunity(&mut self, at: Timestamp, budget: usize) {
        tracing::trace!(%at, budget, "delivery opportunity");
    }

    fn on_departure(&mut self, at: Timestamp, size: usize, delay_ms: u64) {
        tracing::trace!(%at, size, delay_ms, "departure");
    }
}

impl<T: Telemetry> Telemetry for Option<T> {
    fn on_attach(&mut self, info: &LinkInfo) {
        if let Some(sink) = self {
            sink.on_attach(info);
        }
    }

    fn on_arrival(&mut self, at: Timestamp, size: usize) {
        if let Some(sink) = self {
            sink.on_arrival(at, size);
        }
    }

    fn on_opportunity(&mut self, at: Timestamp, budget: usize) {
        if let Some(sink) = self {
            sink.on_opportunity(at, budget);
        }
    }

    fn on_departure(&mut self, at: Timestamp, size: usize, delay_ms: u64) {
        if let Some(sink) = self {
            sink.on_departure(at, size, delay_ms);
        }
    }
}

impl<A: Telemetry, B: Telemetry> Telemetry for (A, B) {
    fn on_attach(&mut self, info: &LinkInfo) {
        self.0.on_attach(info);
        self.1.on_attach(info);
    }

    fn on_arrival(&mut self, at: Timestamp, size: usize) {
        self.0.on_arrival(at, size);
        self.1.on_arrival(at, size);
    }

    fn on_opportunity(&mut self, at: Timestamp, budget: usize) {
        self.0.on_opportunity(at, budget);
        self.1.on_opportunity(at, budget);
    }

    fn on_departure(&mut self, at: Timestamp, size: usize, delay_ms: u64) {
        self.0.on_departure(at, size, delay_ms);
        self.1.on_departure(at, size, delay_ms);
    }
}

impl Telemetry for Arc<LinkStats> {
    fn on_arrival(&mut self, _at: Timestamp, size: usize) {
        self.record_arrival(size);
    }

    fn on_opportunity(&mut self, _at: Timestamp, budget: usize) {
        self.record_opportunity(budget);
    }

    fn on_departure(&mut self, _at: Timestamp, size: usize, delay_ms: u64) {
        self.record_departure(size, delay_ms);
    }
}
