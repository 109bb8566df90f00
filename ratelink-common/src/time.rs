use std::{
    fmt,
    ops::Add,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

/// A point in time, in milliseconds since an arbitrary monotonic origin.
///
/// All link scheduling happens on integer millisecond ticks, so this is the only time type the
/// engine deals with. The origin is whatever the [`Clock`] that produced it chose.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The clock origin.
    pub const ZERO: Self = Self(0);

    /// A timestamp `millis` milliseconds after the clock origin.
    #[inline]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Milliseconds since the clock origin.
    #[inline]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Milliseconds elapsed from `earlier` to `self`, or `0` if `earlier` is later.
    #[inline]
    pub const fn millis_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// The [`Duration`] elapsed from `earlier` to `self`, saturating at zero.
    #[inline]
    pub const fn duration_since(self, earlier: Self) -> Duration {
        Duration::from_millis(self.millis_since(earlier))
    }
}

impl Add<u64> for Timestamp {
    type Output = Self;

    /// Adds milliseconds, saturating at `u64::MAX`.
    #[inline]
    fn add(self, millis: u64) -> Self {
        Self(self.0.saturating_add(millis))
    }
}

impl From<u64> for Timestamp {
    fn from(millis: u64) -> Self {
        Self(millis)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A source of [`Timestamp`]s.
pub trait Clock {
    /// The current time.
    fn now(&self) -> Timestamp;
}

/// A [`Clock`] backed by [`Instant`], with its origin at construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// A clock reading zero now.
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Timestamp {
        Timestamp(self.origin.elapsed().as_millis() as u64)
    }
}

/// A [`Clock`] that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
}

impl ManualClock {
    /// A clock stopped at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self { millis: Arc::new(AtomicU64::new(start.0)) }
    }

    /// Moves the clock forward by `millis` and returns the new time.
    pub fn advance(&self, millis: u64) -> Timestamp {
        Timestamp(self.millis.fetch_add(millis, Ordering::Relaxed) + millis)
    }

    /// Sets the clock to `ts`. Going backwards is allowed but the engine never expects it.
    pub fn set(&self, ts: Timestamp) {
        self.millis.store(ts.0, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> Timestamp {
        Timestamp(self.millis.load(Ordering::Relaxed))
    }
}
