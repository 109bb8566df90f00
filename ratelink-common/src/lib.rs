#![doc(issue_tracker_base_url = "https://github.com/ratelink/ratelink/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Common types shared by the ratelink crates: millisecond timestamps, clocks and unit helpers.

mod time;
pub use time::{Clock, ManualClock, MonotonicClock, Timestamp};

/// Converts a rate in megabits per second into bits per second, rounding down.
///
/// Negative and non-finite inputs map to `0`.
#[inline]
pub fn mbps_to_bps(mbps: f64) -> u64 {
    if !mbps.is_finite() || mbps <= 0.0 {
        return 0;
    }

    (mbps * constants::BITS_PER_MBIT as f64) as u64
}

/// Converts a rate in bits per second into megabits per second.
#[inline]
pub fn bps_to_mbps(bps: u64) -> f64 {
    bps as f64 / constants::BITS_PER_MBIT as f64
}

/// Unit conversion factors.
pub mod constants {
    /// Bits in one byte.
    pub const BITS_PER_BYTE: u64 = 8;
    /// Bits in one megabit, decimal.
    pub const BITS_PER_MBIT: u64 = 1_000_000;
    /// Milliseconds in one second.
    pub const MILLIS_PER_SEC: u64 = 1_000;
}
