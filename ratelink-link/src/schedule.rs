//! Turning a bit rate into delivery opportunities on a millisecond grid.
//!
//! One opportunity carries one cell, so a rate of `R` bit/s calls for an opportunity every
//! `1000 * 8 * cell_size / R` milliseconds. That interval is rarely a whole number of
//! milliseconds. It is split into a whole part and a fraction, and the fraction is expressed as
//! a number of *round-up slots* out of [`INTERPOLATION_SLOTS`]. Each opportunity looks up its
//! position in the cycle in a [`DitherTable`] (a shuffled permutation of the slot indices) and
//! waits one extra millisecond if the table entry is below the round-up count.
//!
//! Every aligned cycle therefore contains exactly `round_up_slots` long intervals, which keeps
//! the long-run rate exact, while the shuffle keeps the long intervals from recurring with a
//! fixed period.
//!
//! All arithmetic is done in integers. The fraction is rounded to the nearest slot.

use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use ratelink_common::{
    constants::{BITS_PER_BYTE, MILLIS_PER_SEC},
    Timestamp,
};

use crate::{LinkError, INTERPOLATION_SLOTS};

/// When the next delivery opportunity happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryTime {
    /// At this time, or right away if it already passed.
    At(Timestamp),
    /// The link is finished and will never deliver again.
    Never,
}

impl DeliveryTime {
    /// Whether the opportunity is due at `now`.
    #[inline]
    pub fn is_due(self, now: Timestamp) -> bool {
        matches!(self, Self::At(at) if at <= now)
    }
}

/// The nominal spacing of delivery opportunities for one rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    /// Whole milliseconds between two opportunities.
    pub whole_ms: u64,
    /// How many opportunities out of every [`INTERPOLATION_SLOTS`] wait one extra millisecond.
    /// Ranges from `0` to `INTERPOLATION_SLOTS` inclusive.
    pub round_up_slots: usize,
}

impl Interval {
    /// Computes the interval for `rate_bps` with `cell_size`-byte opportunities.
    ///
    /// Fails with [`LinkError::ZeroRate`] for a zero rate, and with [`LinkError::InvalidRate`]
    /// when the interval rounds to zero for every slot, as time would never advance.
    pub fn for_rate(rate_bps: u64, cell_size: usize) -> Result<Self, LinkError> {
        if rate_bps == 0 {
            return Err(LinkError::ZeroRate);
        }

        let bits_ms = u128::from(MILLIS_PER_SEC) * u128::from(BITS_PER_BYTE) * cell_size as u128;
        let rate = u128::from(rate_bps);
        let slots = INTERPOLATION_SLOTS as u128;

        let whole = bits_ms / rate;
        let remainder = bits_ms % rate;
        // round(remainder / rate * slots), half up
        let round_up_slots = (2 * remainder * slots + rate) / (2 * rate);

        if whole == 0 && round_up_slots == 0 {
            return Err(LinkError::InvalidRate { rate_bps, cell_size });
        }

        Ok(Self {
            whole_ms: u64::try_from(whole).unwrap_or(u64::MAX),
            round_up_slots: round_up_slots as usize,
        })
    }
}

/// A fixed permutation of the slot indices `0..INTERPOLATION_SLOTS`, shuffled once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DitherTable {
    permutation: [u8; INTERPOLATION_SLOTS],
}

impl DitherTable {
    /// Shuffles a new table with `rng`.
    pub fn shuffled<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut table = Self::identity();
        table.permutation.shuffle(rng);
        table
    }

    /// A reproducible table for `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self::shuffled(&mut StdRng::seed_from_u64(seed))
    }

    /// A table shuffled from OS entropy.
    pub fn from_entropy() -> Self {
        Self::shuffled(&mut StdRng::from_entropy())
    }

    /// The unshuffled table. Long intervals bunch up at the start of every cycle.
    pub fn identity() -> Self {
        let mut permutation = [0u8; INTERPOLATION_SLOTS];
        for (slot, entry) in permutation.iter_mut().enumerate() {
            *entry = slot as u8;
        }

        Self { permutation }
    }

    /// Whether the `opportunity`-th opportunity waits an extra millisecond.
    #[inline]
    pub fn rounds_up(&self, opportunity: u64, round_up_slots: usize) -> bool {
        let index = (opportunity % INTERPOLATION_SLOTS as u64) as usize;
        (self.permutation[index] as usize) < round_up_slots
    }

    /// The permutation, one slot index per entry.
    pub const fn as_slice(&self) -> &[u8] {
        &self.permutation
    }
}

/// Scheduling state of a link: where the last opportunity was and how many were used.
#[derive(Debug, Clone)]
pub struct DeliverySchedule {
    dither: DitherTable,
    cell_size: usize,
    /// Time of the last granted opportunity, or creation time.
    base: Timestamp,
    used: u64,
}

impl DeliverySchedule {
    /// A schedule with no opportunity used yet, anchored at `base`.
    pub const fn new(dither: DitherTable, cell_size: usize, base: Timestamp) -> Self {
        Self { dither, cell_size, base, used: 0 }
    }

    /// The length of the next interval, in whole milliseconds, at `rate_bps`.
    pub fn next_interval(&self, rate_bps: u64) -> Result<u64, LinkError> {
        let interval = Interval::for_rate(rate_bps, self.cell_size)?;
        let extra = self.dither.rounds_up(self.used, interval.round_up_slots) as u64;

        Ok(interval.whole_ms.saturating_add(extra))
    }

    /// The nominal time of the next opportunity at `rate_bps`: one interval after the base.
    pub fn next_scheduled(&self, rate_bps: u64) -> Result<Timestamp, LinkError> {
        Ok(self.base + self.next_interval(rate_bps)?)
    }

    /// Marks the opportunity at `at` as used. Must be called exactly once per granted
    /// opportunity.
    #[inline]
    pub fn use_opportunity(&mut self, at: Timestamp) {
        debug_assert!(at >= self.base, "opportunity at {at} before base {}", self.base);
        self.base = at;
        self.used += 1;
    }

    /// Time of the last granted opportunity, or creation time.
    pub const fn base(&self) -> Timestamp {
        self.base
    }

    /// Number of opportunities used so far.
    pub const fn used(&self) -> u64 {
        self.used
    }

    /// Bytes per opportunity.
    pub const fn cell_size(&self) -> usize {
        self.cell_size
    }

    /// The dithering table.
    pub const fn dither(&self) -> &DitherTable {
        &self.dither
    }
}
