use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use crate::{ControlSnapshot, ControlSource, ENABLED_FIELD, FIELD_COUNT, RATE_FIELD};

/// An in-process control region.
///
/// Same semantics as a mapped [`ControlChannel`](crate::ControlChannel), without the file: clones
/// share the same two words, so one clone can drive a link while another one adjusts it.
#[derive(Debug, Clone)]
pub struct SharedControl {
    words: Arc<[AtomicU64; FIELD_COUNT]>,
}

impl SharedControl {
    /// A region holding `initial`.
    pub fn new(initial: ControlSnapshot) -> Self {
        let [rate, enabled] = initial.to_words();
        Self { words: Arc::new([AtomicU64::new(rate), AtomicU64::new(enabled)]) }
    }

    /// Stores a new rate, in bits per second.
    pub fn set_rate_bps(&self, rate_bps: u64) {
        self.words[RATE_FIELD].store(rate_bps, Ordering::Relaxed);
    }

    /// Turns admission on or off.
    pub fn set_enabled(&self, enabled: bool) {
        self.words[ENABLED_FIELD].store(enabled as u64, Ordering::Relaxed);
    }
}

impl ControlSource for SharedControl {
    #[inline]
    fn rate_bps(&self) -> u64 {
        self.words[RATE_FIELD].load(Ordering::Relaxed)
    }

    #[inline]
    fn link_enabled(&self) -> bool {
        self.words[ENABLED_FIELD].load(Ordering::Relaxed) == 1
    }

    fn describe(&self) -> String {
        "shared".to_string()
    }
}
