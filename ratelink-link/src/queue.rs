//! Packet queues a link can hold its backlog in.
//!
//! The link itself only ever calls the four [`PacketQueue`] operations. Which packets get
//! admitted, evicted or reordered under congestion is entirely up to the queue.
//!
//! Three stock disciplines are provided:
//! - [`InfiniteQueue`]: unbounded FIFO, never drops.
//! - [`DropTailQueue`]: bounded FIFO, arrivals that don't fit are dropped.
//! - [`DropHeadQueue`]: bounded FIFO, the oldest packets are evicted to make room.

use std::{collections::VecDeque, fmt};

use crate::QueuedPacket;

/// A pluggable packet store, exclusively owned by one link.
pub trait PacketQueue {
    /// Offers a packet to the queue. The queue may drop it, or drop others, according to its
    /// policy.
    fn enqueue(&mut self, packet: QueuedPacket);

    /// Takes the next packet to transmit.
    fn dequeue(&mut self) -> Option<QueuedPacket>;

    /// Returns `true` if nothing is queued.
    fn is_empty(&self) -> bool;

    /// A short description of the discipline and its limits, for logs.
    fn describe(&self) -> String;
}

impl<Q: PacketQueue + ?Sized> PacketQueue for Box<Q> {
    fn enqueue(&mut self, packet: QueuedPacket) {
        (**self).enqueue(packet)
    }

    fn dequeue(&mut self) -> Option<QueuedPacket> {
        (**self).dequeue()
    }

    fn is_empty(&self) -> bool {
        (**self).is_empty()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Limits of a bounded queue. A limit of `None` is unbounded along that dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueLimits {
    packets: Option<usize>,
    bytes: Option<usize>,
}

impl QueueLimits {
    /// Sets the maximum number of queued packets.
    pub fn packets(mut self, packets: usize) -> Self {
        self.packets = Some(packets);
        self
    }

    /// Sets the maximum number of queued payload bytes.
    pub fn bytes(mut self, bytes: usize) -> Self {
        self.bytes = Some(bytes);
        self
    }

    /// The packet limit, if any.
    pub const fn max_packets(&self) -> Option<usize> {
        self.packets
    }

    /// The byte limit, if any.
    pub const fn max_bytes(&self) -> Option<usize> {
        self.bytes
    }

    /// Whether a queue holding `packets` packets and `bytes` bytes is within the limits.
    #[inline]
    pub fn allows(&self, packets: usize, bytes: usize) -> bool {
        self.packets.map_or(true, |max| packets <= max) && self.bytes.map_or(true, |max| bytes <= max)
    }
}

impl fmt::Display for QueueLimits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.packets, self.bytes) {
            (Some(packets), Some(bytes)) => write!(f, "packets={packets}, bytes={bytes}"),
            (Some(packets), None) => write!(f, "packets={packets}"),
            (None, Some(bytes)) => write!(f, "bytes={bytes}"),
            (None, None) => write!(f, "unbounded"),
        }
    }
}

/// FIFO storage with byte accounting, shared by the stock queues.
#[derive(Debug, Default)]
struct Fifo {
    packets: VecDeque<QueuedPacket>,
    bytes: usize,
}

impl Fifo {
    fn push(&mut self, packet: QueuedPacket) {
        self.bytes += packet.len();
        self.packets.push_back(packet);
    }

    fn pop(&mut self) -> Option<QueuedPacket> {
        let packet = self.packets.pop_front()?;
        self.bytes -= packet.len();
        Some(packet)
    }
}

/// An unbounded FIFO queue.
#[derive(Debug, Default)]
pub struct InfiniteQueue {
    fifo: Fifo,
}

impl InfiniteQueue {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued packets.
    pub fn len(&self) -> usize {
        self.fifo.packets.len()
    }

    /// Total payload bytes currently queued.
    pub fn bytes(&self) -> usize {
        self.fifo.bytes
    }
}

impl PacketQueue for InfiniteQueue {
    fn enqueue(&mut self, packet: QueuedPacket) {
        self.fifo.push(packet);
    }

    fn dequeue(&mut self) -> Option<QueuedPacket> {
        self.fifo.pop()
    }

    fn is_empty(&self) -> bool {
        self.fifo.packets.is_empty()
    }

    fn describe(&self) -> String {
        "infinite".to_string()
    }
}

/// A bounded FIFO queue that drops arrivals which would exceed its limits.
#[derive(Debug)]
pub struct DropTailQueue {
    fifo: Fifo,
    limits: QueueLimits,
    dropped: u64,
}

impl DropTailQueue {
    /// An empty queue bounded by `limits`.
    pub fn new(limits: QueueLimits) -> Self {
        Self { fifo: Fifo::default(), limits, dropped: 0 }
    }

    /// Number of queued packets.
    pub fn len(&self) -> usize {
        self.fifo.packets.len()
    }

    /// Number of queued payload bytes.
    pub const fn bytes(&self) -> usize {
        self.fifo.bytes
    }

    /// Number of packets dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl PacketQueue for DropTailQueue {
    fn enqueue(&mut self, packet: QueuedPacket) {
        if self.limits.allows(self.len() + 1, self.fifo.bytes + packet.len()) {
            self.fifo.push(packet);
        } else {
            self.dropped += 1;
            tracing::trace!(size = packet.len(), arrival = %packet.arrival, "droptail: dropped arrival");
        }
    }

    fn dequeue(&mut self) -> Option<QueuedPacket> {
        self.fifo.pop()
    }

    fn is_empty(&self) -> bool {
        self.fifo.packets.is_empty()
    }

    fn describe(&self) -> String {
        format!("droptail [{}]", self.limits)
    }
}

/// A bounded FIFO queue that evicts its oldest packets to admit new arrivals.
///
/// An arrival that could not fit even in an empty queue is dropped itself.
#[derive(Debug)]
pub struct DropHeadQueue {
    fifo: Fifo,
    limits: QueueLimits,
    dropped: u64,
}

impl DropHeadQueue {
    /// An empty queue bounded by `limits`.
    pub fn new(limits: QueueLimits) -> Self {
        Self { fifo: Fifo::default(), limits, dropped: 0 }
    }

    /// Number of queued packets.
    pub fn len(&self) -> usize {
        self.fifo.packets.len()
    }

    /// Number of queued payload bytes.
    pub const fn bytes(&self) -> usize {
        self.fifo.bytes
    }

    /// Number of packets dropped so far, evicted or refused.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl PacketQueue for DropHeadQueue {
    fn enqueue(&mut self, packet: QueuedPacket) {
        if !self.limits.allows(1, packet.len()) {
            self.dropped += 1;
            tracing::trace!(size = packet.len(), "drophead: arrival larger than the queue");
            return;
        }

        self.fifo.push(packet);

        while !self.limits.allows(self.fifo.packets.len(), self.fifo.bytes) {
            let Some(evicted) = self.fifo.pop() else { break };
            self.dropped += 1;
            tracing::trace!(size = evicted.len(), arrival = %evicted.arrival, "drophead: evicted");
        }
    }

    fn dequeue(&mut self) -> Option<QueuedPacket> {
        self.fifo.pop()
    }

    fn is_empty(&self) -> bool {
        self.fifo.packets.is_empty()
    }

    fn describe(&self) -> String {
        format!("drophead [{}]", self.limits)
    }
}
