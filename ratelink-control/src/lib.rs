#![doc(issue_tracker_base_url = "https://github.com/ratelink/ratelink/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! The control channel of a ratelink link.
//!
//! A link reads its target rate and its on/off switch from a small shared region that some
//! other process (a controller) keeps updating. The region is a regular file, typically under
//! `/tmp` or `/dev/shm`, which both sides map with `MAP_SHARED`.
//!
//! # Wire format
//!
//! The region is exactly two native-endian `u64` words:
//!
//! | offset | field          | meaning                                         |
//! |--------|----------------|-------------------------------------------------|
//! | 0      | `rate`         | link rate in **bits per second**, must be `> 0` |
//! | 8      | `link_enabled` | `1` when the link is on, anything else is off   |
//!
//! Readers never write the region. Each word is read with a single aligned 64-bit load, so a
//! reader may observe a value that is a few milliseconds stale, but never a torn one.
//!
//! # Example
//!
//! ```no_run
//! use ratelink_control::{ControlChannel, ControlSnapshot, ControlSource, ControlWriter};
//!
//! // Controller side.
//! let writer =
//!     ControlWriter::create("/tmp/ratelink-ctl", ControlSnapshot::new(12_000_000, true)).unwrap();
//!
//! // Link side.
//! let channel = ControlChannel::open("/tmp/ratelink-ctl").unwrap();
//! assert_eq!(channel.rate_bps(), 12_000_000);
//!
//! writer.set_enabled(false);
//! assert!(!channel.link_enabled());
//! ```

use std::{io, path::PathBuf};

use thiserror::Error;

mod region;

mod reader;
pub use reader::ControlChannel;

mod writer;
pub use writer::ControlWriter;

mod shared;
pub use shared::SharedControl;

/// Size of the control region in bytes.
pub const CONTROL_REGION_SIZE: usize = FIELD_COUNT * std::mem::size_of::<u64>();

/// Number of `u64` words in the control region.
pub(crate) const FIELD_COUNT: usize = 2;

/// Index of the rate word.
pub(crate) const RATE_FIELD: usize = 0;

/// Index of the link-enabled word.
pub(crate) const ENABLED_FIELD: usize = 1;

/// Errors raised while acquiring a control region. All of them are fatal for whoever needed the
/// region.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The control file could not be opened or created.
    #[error("Failed to open control region {path:?}: {source}")]
    Open {
        /// The control file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
    /// A new region was requested where a file already exists.
    #[error("Control region {0:?} already exists")]
    AlreadyExists(PathBuf),
    /// The control file cannot hold both words.
    #[error("Control region {path:?} is {len} bytes long, expected at least 16")]
    TooSmall {
        /// The control file.
        path: PathBuf,
        /// Its actual length in bytes.
        len: u64,
    },
    /// `mmap` or `msync` failed.
    #[error("Failed to map control region {path:?}: {source}")]
    Map {
        /// The control file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: nix::Error,
    },
    /// Any other IO failure.
    #[error("IO error: {0:?}")]
    Io(#[from] io::Error),
}

/// A point-in-time copy of the control region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlSnapshot {
    /// Link rate in bits per second. Zero is stored as-is; it is the reader's job to reject it.
    pub rate_bps: u64,
    /// Whether arriving packets are admitted to the link.
    pub link_enabled: bool,
}

impl ControlSnapshot {
    /// A snapshot with the given fields.
    pub const fn new(rate_bps: u64, link_enabled: bool) -> Self {
        Self { rate_bps, link_enabled }
    }

    /// Decodes the raw region words.
    #[inline]
    pub const fn from_words(words: [u64; FIELD_COUNT]) -> Self {
        Self { rate_bps: words[RATE_FIELD], link_enabled: words[ENABLED_FIELD] == 1 }
    }

    /// Encodes the snapshot into raw region words.
    #[inline]
    pub const fn to_words(self) -> [u64; FIELD_COUNT] {
        [self.rate_bps, self.link_enabled as u64]
    }
}

/// Anything a link can read its rate and on/off switch from.
///
/// Implementations must read the live value on every call: the link relies on picking up
/// changes made by the controller between two calls.
pub trait ControlSource {
    /// The current link rate in bits per second.
    fn rate_bps(&self) -> u64;

    /// Whether the link currently admits packets.
    fn link_enabled(&self) -> bool;

    /// Both fields at once. The two reads are not atomic with respect to each other.
    fn snapshot(&self) -> ControlSnapshot {
        ControlSnapshot { rate_bps: self.rate_bps(), link_enabled: self.link_enabled() }
    }

    /// A short human-readable description, used in log headers.
    fn describe(&self) -> String;
}

impl<C: ControlSource + ?Sized> ControlSource for &C {
    fn rate_bps(&self) -> u64 {
        (**self).rate_bps()
    }

    fn link_enabled(&self) -> bool {
        (**self).link_enabled()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl<C: ControlSource + ?Sized> ControlSource for Box<C> {
    fn rate_bps(&self) -> u64 {
        (**self).rate_bps()
    }

    fn link_enabled(&self) -> bool {
        (**self).link_enabled()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
