#![doc(issue_tracker_base_url = "https://github.com/ratelink/ratelink/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Emulation of a single directional link whose rate is set from outside the process.
//!
//! The link delivers bytes in *delivery opportunities*: discrete instants, on integer
//! millisecond ticks, at which up to one cell (by default 1500 bytes) may leave the link. The
//! spacing between opportunities follows the rate published on a
//! [control channel](ratelink_control), with fractional intervals spread over a shuffled cycle of
//! [`INTERPOLATION_SLOTS`] opportunities so the long-run rate is exact.
//!
//! A [`LinkQueue`] is driven by its caller: feed arrivals with [`LinkQueue::read_packet`], ask
//! [`LinkQueue::wait_time`] how long it may sleep, and drain delivered packets with
//! [`LinkQueue::flush_output`]. Each of these first replays every opportunity that elapsed since
//! the previous call.
//!
//! ```
//! use bytes::Bytes;
//! use ratelink_common::Timestamp;
//! use ratelink_control::{ControlSnapshot, SharedControl};
//! use ratelink_link::{InfiniteQueue, LinkOptions, LinkQueue};
//!
//! // 12 Mbit/s is one 1500-byte cell per millisecond.
//! let control = SharedControl::new(ControlSnapshot::new(12_000_000, true));
//! let mut link =
//!     LinkQueue::new(control, InfiniteQueue::new(), LinkOptions::default(), Timestamp::ZERO)
//!         .unwrap();
//!
//! link.read_packet(Bytes::from_static(b"hello"), Timestamp::ZERO).unwrap();
//! assert_eq!(link.wait_time(Timestamp::ZERO).unwrap(), Some(std::time::Duration::from_millis(1)));
//!
//! link.wait_time(Timestamp::from_millis(1)).unwrap();
//! assert_eq!(link.flush_output().collect::<Vec<_>>(), vec![Bytes::from_static(b"hello")]);
//! ```

use ratelink_control::ControlError;
use thiserror::Error;

mod link;
pub use link::{Admission, LinkOptions, LinkQueue, LinkState};

pub mod log;
pub use log::LogTelemetry;

mod packet;
pub use packet::QueuedPacket;

pub mod queue;
pub use queue::{DropHeadQueue, DropTailQueue, InfiniteQueue, PacketQueue, QueueLimits};

pub mod schedule;
pub use schedule::{DeliverySchedule, DeliveryTime, DitherTable, Interval};

mod stats;
pub use stats::LinkStats;

pub mod telemetry;
pub use telemetry::{LinkInfo, NoopTelemetry, Telemetry, TracingTelemetry};

/// Default number of bytes one delivery opportunity can carry.
pub const DEFAULT_CELL_SIZE: usize = 1500;

/// Default largest payload a link accepts.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1500;

/// Length of the dithering cycle. Fractional intervals are exact over every aligned run of this
/// many opportunities.
pub const INTERPOLATION_SLOTS: usize = 16;

/// Errors raised by a link. Apart from [`OversizedPacket`](Self::OversizedPacket), they all
/// stop the link.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The control channel reported a rate of zero when an opportunity had to be scheduled.
    #[error("Link rate is zero")]
    ZeroRate,
    /// The rate is so high that a whole dithering cycle would not advance time.
    #[error("Link rate of {rate_bps} bit/s is out of range for {cell_size}-byte cells")]
    InvalidRate {
        /// The rejected rate.
        rate_bps: u64,
        /// The cell size it was paired with.
        cell_size: usize,
    },
    /// An arriving packet is larger than the link accepts. Only that packet is affected.
    #[error("Packet of {size} bytes exceeds the maximum of {max} bytes")]
    OversizedPacket {
        /// Size of the packet.
        size: usize,
        /// The link's maximum packet size.
        max: usize,
    },
    /// Link options that cannot work, e.g. a zero cell size.
    #[error("Invalid link options: {0}")]
    InvalidOptions(&'static str),
    /// The control region could not be opened.
    #[error("Control channel error: {0}")]
    Control(#[from] ControlError),
}

impl LinkError {
    /// Returns `true` for errors caused by a broken controller or bad options. These are never
    /// worth retrying.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::ZeroRate | Self::InvalidRate { .. } | Self::InvalidOptions(_))
    }
}
