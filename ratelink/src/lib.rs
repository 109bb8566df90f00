#![doc(issue_tracker_base_url = "https://github.com/ratelink/ratelink/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Rate-controlled link emulation.
//!
//! A [`LinkQueue`] carries packets at whatever rate an external controller writes into a
//! shared control region, one cell per delivery opportunity. [`LinkDriver`] runs a link on
//! tokio between two channels.

mod clock;
pub use clock::TokioClock;

mod driver;
pub use driver::{DriverError, LinkDriver};

pub use ratelink_common::{bps_to_mbps, mbps_to_bps, Clock, ManualClock, MonotonicClock, Timestamp};
pub use ratelink_control::*;
pub use ratelink_link::*;
