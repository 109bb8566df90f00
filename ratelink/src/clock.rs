use ratelink_common::{Clock, Timestamp};
use tokio::time::Instant;

/// A [`Clock`] on tokio's time source, with its origin at construction.
///
/// Follows tokio's paused test clock, so driver runs under `start_paused` are deterministic.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: Instant,
}

impl TokioClock {
    /// A clock reading zero now.
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }

    /// The tokio instant that corresponds to `ts`.
    pub fn instant(&self, ts: Timestamp) -> Instant {
        self.origin + ts.duration_since(Timestamp::ZERO)
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    #[inline]
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.origin.elapsed().as_millis() as u64)
    }
}
