use bytes::Bytes;
use ratelink_common::Timestamp;

/// A packet waiting in (or leaving) the link, stamped with the time it arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedPacket {
    /// The packet contents, delivered unchanged.
    pub payload: Bytes,
    /// When the packet reached the link.
    pub arrival: Timestamp,
}

impl QueuedPacket {
    /// A packet that arrived at `arrival`.
    pub const fn new(payload: Bytes, arrival: Timestamp) -> Self {
        Self { payload, arrival }
    }

    /// Payload length in bytes.
    #[inline]
    pub const fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns `true` for an empty payload.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Drops the arrival stamp.
    #[inline]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}
