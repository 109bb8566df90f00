use std::{
    collections::{vec_deque::Drain, VecDeque},
    io::{self, Write},
    path::Path,
    time::Duration,
};

use bytes::Bytes;
use ratelink_common::Timestamp;
use ratelink_control::{ControlChannel, ControlSource};

use crate::{
    DeliverySchedule, DeliveryTime, DitherTable, LinkError, LinkInfo, NoopTelemetry, PacketQueue,
    QueuedPacket, Telemetry, DEFAULT_CELL_SIZE, DEFAULT_MAX_PACKET_SIZE,
};

/// Options of a [`LinkQueue`].
#[derive(Debug, Clone)]
pub struct LinkOptions {
    /// Name of the link, used in logs.
    name: String,
    /// Bytes one delivery opportunity can carry.
    cell_size: usize,
    /// Largest payload [`LinkQueue::read_packet`] accepts. May exceed `cell_size`, in which
    /// case large packets span several opportunities.
    max_packet_size: usize,
    /// Seed for the dithering table. `None` seeds from OS entropy.
    dither_seed: Option<u64>,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            name: "link".to_string(),
            cell_size: DEFAULT_CELL_SIZE,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            dither_seed: None,
        }
    }
}

impl LinkOptions {
    /// Sets the link name shown in logs.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the number of bytes one delivery opportunity can carry.
    pub fn cell_size(mut self, cell_size: usize) -> Self {
        self.cell_size = cell_size;
        self
    }

    /// Sets the largest accepted payload size.
    pub fn max_packet_size(mut self, max_packet_size: usize) -> Self {
        self.max_packet_size = max_packet_size;
        self
    }

    /// Seeds the dithering table, making opportunity timing reproducible across runs.
    pub fn dither_seed(mut self, seed: u64) -> Self {
        self.dither_seed = Some(seed);
        self
    }

    fn validate(&self) -> Result<(), LinkError> {
        if self.cell_size == 0 {
            return Err(LinkError::InvalidOptions("cell size must be positive"));
        }

        if self.max_packet_size == 0 {
            return Err(LinkError::InvalidOptions("max packet size must be positive"));
        }

        Ok(())
    }
}

/// Lifecycle of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Granting opportunities and admitting packets.
    Active,
    /// Terminal. No more opportunities are granted and arrivals are discarded.
    Finished,
}

/// What happened to a packet handed to [`LinkQueue::read_packet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Handed to the packet queue. The queue may still drop it.
    Queued,
    /// Discarded because the control channel has the link switched off.
    LinkDisabled,
    /// Discarded because the link is finished.
    Finished,
}

/// The packet currently being transmitted across one or more opportunities.
#[derive(Debug)]
struct InTransit {
    packet: QueuedPacket,
    /// Bytes not yet sent. Only zero for an empty payload, which departs right away.
    bytes_left: usize,
}

impl InTransit {
    fn new(packet: QueuedPacket) -> Self {
        Self { bytes_left: packet.len(), packet }
    }
}

/// A single directional link with an externally controlled rate.
///
/// The link never sleeps and never reads a clock: every operation takes `now` from the caller
/// and first replays all delivery opportunities up to `now`. A driver typically loops on
/// [`read_packet`](Self::read_packet) for arrivals, sleeps for [`wait_time`](Self::wait_time),
/// and forwards [`flush_output`](Self::flush_output).
///
/// # Delivery
///
/// Each opportunity carries up to one cell of bytes. Packets are pulled from the queue in its
/// dequeue order. A packet larger than what is left of an opportunity continues in the next
/// one, and several small packets can share an opportunity. A packet departs at the opportunity
/// that carries its last byte. Capacity that finds the queue empty is lost.
#[derive(Debug)]
pub struct LinkQueue<C, Q, T = NoopTelemetry> {
    options: LinkOptions,
    control: C,
    queue: Q,
    telemetry: T,
    schedule: DeliverySchedule,
    in_transit: Option<InTransit>,
    /// Delivered payloads waiting to be written out.
    output: VecDeque<Bytes>,
    state: LinkState,
}

impl<Q: PacketQueue> LinkQueue<ControlChannel, Q> {
    /// Creates a link controlled by the control region at `path`.
    pub fn open(
        path: impl AsRef<Path>,
        queue: Q,
        options: LinkOptions,
        now: Timestamp,
    ) -> Result<Self, LinkError> {
        let control = ControlChannel::open(path)?;
        Self::new(control, queue, options, now)
    }
}

impl<C, Q> LinkQueue<C, Q>
where
    C: ControlSource,
    Q: PacketQueue,
{
    /// Creates a link reading its rate from `control` and buffering packets in `queue`. The
    /// first opportunity is scheduled relative to `now`.
    pub fn new(control: C, queue: Q, options: LinkOptions, now: Timestamp) -> Result<Self, LinkError> {
        options.validate()?;

        let dither = match options.dither_seed {
            Some(seed) => DitherTable::seeded(seed),
            None => DitherTable::from_entropy(),
        };

        tracing::debug!(
            name = %options.name,
            control = %control.describe(),
            queue = %queue.describe(),
            cell_size = options.cell_size,
            max_packet_size = options.max_packet_size,
            base = %now,
            "created link"
        );

        Ok(Self {
            schedule: DeliverySchedule::new(dither, options.cell_size, now),
            options,
            control,
            queue,
            telemetry: NoopTelemetry,
            in_transit: None,
            output: VecDeque::new(),
            state: LinkState::Active,
        })
    }
}

impl<C, Q, T> LinkQueue<C, Q, T>
where
    C: ControlSource,
    Q: PacketQueue,
    T: Telemetry,
{
    /// Replaces the telemetry sink. The new sink is told about the link before any event.
    pub fn with_telemetry<U: Telemetry>(self, mut telemetry: U) -> LinkQueue<C, Q, U> {
        telemetry.on_attach(&self.info());

        LinkQueue {
            options: self.options,
            control: self.control,
            queue: self.queue,
            telemetry,
            schedule: self.schedule,
            in_transit: self.in_transit,
            output: self.output,
            state: self.state,
        }
    }

    /// Offers a packet that arrived at `now` to the link.
    ///
    /// Payloads larger than the maximum packet size are rejected before anything else happens.
    /// Otherwise the link catches up to `now`, reports the arrival, and enqueues the packet if
    /// the control channel has the link enabled. Packets arriving while the link is disabled or
    /// finished are discarded without reaching the queue.
    pub fn read_packet(&mut self, payload: Bytes, now: Timestamp) -> Result<Admission, LinkError> {
        let size = payload.len();
        if size > self.options.max_packet_size {
            return Err(LinkError::OversizedPacket { size, max: self.options.max_packet_size });
        }

        self.rationalize(now)?;

        self.telemetry.on_arrival(now, size);

        if self.is_finished() {
            tracing::trace!(link = %self.options.name, size, "link finished, discarding arrival");
            return Ok(Admission::Finished);
        }

        if !self.control.link_enabled() {
            tracing::trace!(link = %self.options.name, size, "link disabled, discarding arrival");
            return Ok(Admission::LinkDisabled);
        }

        self.queue.enqueue(QueuedPacket::new(payload, now));
        Ok(Admission::Queued)
    }

    /// Catches up to `now`, then returns how long until the next opportunity: zero if one is
    /// already due, `None` if the link is finished.
    pub fn wait_time(&mut self, now: Timestamp) -> Result<Option<Duration>, LinkError> {
        self.rationalize(now)?;

        Ok(match self.next_delivery_time(now)? {
            DeliveryTime::At(at) => Some(at.duration_since(now)),
            DeliveryTime::Never => None,
        })
    }

    /// The time of the next delivery opportunity as seen at `now`.
    ///
    /// Reads the live rate. Fails if the rate is zero or out of range.
    pub fn next_delivery_time(&self, now: Timestamp) -> Result<DeliveryTime, LinkError> {
        Ok(match self.scheduled_delivery_time()? {
            DeliveryTime::At(at) => DeliveryTime::At(at.max(now)),
            DeliveryTime::Never => DeliveryTime::Never,
        })
    }

    /// The nominal time of the next opportunity, one interval after the last one.
    fn scheduled_delivery_time(&self) -> Result<DeliveryTime, LinkError> {
        if self.is_finished() {
            return Ok(DeliveryTime::Never);
        }

        let rate_bps = self.control.rate_bps();
        match self.schedule.next_scheduled(rate_bps) {
            Ok(at) => Ok(DeliveryTime::At(at)),
            Err(e) => {
                tracing::error!(link = %self.options.name, rate_bps, error = %e, "cannot schedule delivery");
                Err(e)
            }
        }
    }

    /// Replays every delivery opportunity due at or before `now`.
    ///
    /// Opportunities are granted one by one at their nominal times, so a caller that comes
    /// back late still gets every opportunity that elapsed in between, each carrying whatever
    /// was queued by then. Either catches up completely or fails before consuming the
    /// opportunity it could not schedule, so transit accounting is never left half-updated.
    pub fn rationalize(&mut self, now: Timestamp) -> Result<(), LinkError> {
        loop {
            let delivery_time = match self.scheduled_delivery_time()? {
                DeliveryTime::At(at) if at <= now => at,
                _ => return Ok(()),
            };

            self.use_opportunity(delivery_time);
            let mut budget = self.options.cell_size;

            while budget > 0 {
                let mut transit = match self.in_transit.take() {
                    Some(transit) => transit,
                    None => match self.queue.dequeue() {
                        Some(packet) => InTransit::new(packet),
                        // The rest of this opportunity is lost.
                        None => break,
                    },
                };

                debug_assert!(transit.packet.arrival <= delivery_time);
                debug_assert!(transit.bytes_left <= transit.packet.len());

                let sent = budget.min(transit.bytes_left);
                transit.bytes_left -= sent;
                budget -= sent;

                if transit.bytes_left == 0 {
                    self.depart(delivery_time, transit.packet);
                } else {
                    self.in_transit = Some(transit);
                }
            }
        }
    }

    fn use_opportunity(&mut self, delivery_time: Timestamp) {
        self.telemetry.on_opportunity(delivery_time, self.options.cell_size);
        self.schedule.use_opportunity(delivery_time);
    }

    fn depart(&mut self, delivery_time: Timestamp, packet: QueuedPacket) {
        let delay_ms = delivery_time.millis_since(packet.arrival);
        self.telemetry.on_departure(delivery_time, packet.len(), delay_ms);
        self.output.push_back(packet.into_payload());
    }

    /// Stops the link for good. No further opportunities are granted and new arrivals are
    /// discarded. Packets already delivered stay in the output buffer. Calling this again has
    /// no effect.
    pub fn mark_finished(&mut self) {
        if self.state == LinkState::Finished {
            return;
        }

        self.state = LinkState::Finished;
        tracing::info!(
            link = %self.options.name,
            opportunities = self.schedule.used(),
            pending_output = self.output.len(),
            queue_empty = self.queue.is_empty(),
            "link finished"
        );
    }

    /// Whether delivered packets are waiting to be written out.
    #[inline]
    pub fn pending_output(&self) -> bool {
        !self.output.is_empty()
    }

    /// Drains the delivered packets, oldest first.
    pub fn flush_output(&mut self) -> Drain<'_, Bytes> {
        self.output.drain(..)
    }

    /// Takes the oldest delivered packet.
    pub fn pop_output(&mut self) -> Option<Bytes> {
        self.output.pop_front()
    }

    /// Writes delivered packets to `writer`, one `write_all` per packet, and returns how many
    /// were written. On error the failed packet and the ones after it stay buffered.
    pub fn write_output<W: Write + ?Sized>(&mut self, writer: &mut W) -> io::Result<usize> {
        let mut written = 0;
        while let Some(payload) = self.output.front() {
            writer.write_all(payload)?;
            self.output.pop_front();
            written += 1;
        }

        Ok(written)
    }

    /// Static facts about this link, as handed to telemetry sinks.
    pub fn info(&self) -> LinkInfo {
        LinkInfo {
            name: self.options.name.clone(),
            control: self.control.describe(),
            queue: self.queue.describe(),
            cell_size: self.options.cell_size,
            base: self.schedule.base(),
        }
    }

    /// The link name, as used in logs.
    pub fn name(&self) -> &str {
        &self.options.name
    }

    /// The current lifecycle state.
    #[inline]
    pub const fn state(&self) -> LinkState {
        self.state
    }

    /// Returns `true` once [`finish`](Self::finish) was called.
    #[inline]
    pub const fn is_finished(&self) -> bool {
        matches!(self.state, LinkState::Finished)
    }

    /// Number of delivery opportunities granted so far.
    pub fn opportunities_used(&self) -> u64 {
        self.schedule.used()
    }

    /// Time of the most recent opportunity, or the creation time.
    pub fn base_timestamp(&self) -> Timestamp {
        self.schedule.base()
    }

    /// Bytes of the in-transit packet still to be sent, if a packet is mid-transmission.
    pub fn bytes_in_transit(&self) -> Option<usize> {
        self.in_transit.as_ref().map(|transit| transit.bytes_left)
    }

    /// The options this link was built with.
    pub const fn options(&self) -> &LinkOptions {
        &self.options
    }

    /// The control source.
    pub const fn control(&self) -> &C {
        &self.control
    }

    /// The packet queue holding the backlog.
    pub const fn queue(&self) -> &Q {
        &self.queue
    }

    /// The attached telemetry sink.
    pub const fn telemetry(&self) -> &T {
        &self.telemetry
    }

    /// Mutable access to the telemetry sink, e.g. to flush a log.
    pub fn telemetry_mut(&mut self) -> &mut T {
        &mut self.telemetry
    }
}
