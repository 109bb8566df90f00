use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters of a link. Shared through an `Arc` between the link, which updates them
/// via its [`Telemetry`](crate::Telemetry) hooks, and any number of readers.
#[derive(Debug, Default)]
pub struct LinkStats {
    /// Packets that arrived, admitted or not.
    arrivals: AtomicU64,
    bytes_in: AtomicU64,
    /// Delivery opportunities granted.
    opportunities: AtomicU64,
    /// Bytes the granted opportunities could have carried.
    capacity: AtomicU64,
    departures: AtomicU64,
    bytes_out: AtomicU64,
    /// Sum of queueing delays of departed packets, in ms.
    total_delay_ms: AtomicU64,
    max_delay_ms: AtomicU64,
}

impl LinkStats {
    #[inline]
    pub(crate) fn record_arrival(&self, size: usize) {
        self.arrivals.fetch_add(1, Ordering::Relaxed);
        self.bytes_in.fetch_add(size as u64, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_opportunity(&self, budget: usize) {
        self.opportunities.fetch_add(1, Ordering::Relaxed);
        self.capacity.fetch_add(budget as u64, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_departure(&self, size: usize, delay_ms: u64) {
        self.departures.fetch_add(1, Ordering::Relaxed);
        self.bytes_out.fetch_add(size as u64, Ordering::Relaxed);
        self.total_delay_ms.fetch_add(delay_ms, Ordering::Relaxed);
        self.max_delay_ms.fetch_max(delay_ms, Ordering::Relaxed);
    }

    /// Packets offered to the link.
    #[inline]
    pub fn arrivals(&self) -> u64 {
        self.arrivals.load(Ordering::Relaxed)
    }

    /// Payload bytes offered to the link.
    #[inline]
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in.load(Ordering::Relaxed)
    }

    /// Delivery opportunities granted.
    #[inline]
    pub fn opportunities(&self) -> u64 {
        self.opportunities.load(Ordering::Relaxed)
    }

    /// Bytes the granted opportunities could have carried.
    #[inline]
    pub fn capacity(&self) -> u64 {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Packets delivered.
    #[inline]
    pub fn departures(&self) -> u64 {
        self.departures.load(Ordering::Relaxed)
    }

    /// Payload bytes delivered.
    #[inline]
    pub fn bytes_out(&self) -> u64 {
        self.bytes_out.load(Ordering::Relaxed)
    }

    /// Largest queueing delay seen, in milliseconds.
    #[inline]
    pub fn max_delay_ms(&self) -> u64 {
        self.max_delay_ms.load(Ordering::Relaxed)
    }

    /// Mean queueing delay of departed packets, if any departed.
    pub fn mean_delay_ms(&self) -> Option<f64> {
        let departures = self.departures();
        (departures > 0)
            .then(|| self.total_delay_ms.load(Ordering::Relaxed) as f64 / departures as f64)
    }

    /// Fraction of granted capacity that carried payload, between 0 and 1.
    ///
    /// Departures are counted when a packet's last byte leaves, so this is approximate while a
    /// large packet is mid-transmission.
    pub fn utilization(&self) -> f64 {
        let capacity = self.capacity();
        if capacity == 0 {
            return 0.0;
        }

        (self.bytes_out() as f64 / capacity as f64).min(1.0)
    }
}
