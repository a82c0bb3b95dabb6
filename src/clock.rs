//! Fixed-point logical time.
//!
//! Time is an opaque, caller-driven counter. Callers hand in fractional unit
//! amounts (usually milliseconds) as `f64`; internally the clock is an exact
//! `u64` count of sub-units plus the fraction of a sub-unit not yet committed.
//!
//! Rounding rules:
//! - delays round **up** to the next sub-unit, so a requested delay is never
//!   shortened and due times always sit on the sub-unit grid;
//! - elapsed amounts are never rounded away. Whole sub-units are committed to
//!   the counter and the remainder carries into the next advance, so many
//!   small advances add up to the same time as one large one;
//! - due checks compare against the true (uncommitted) time: with any
//!   remainder present the clock is strictly past its committed value.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

/// Number of sub-units per logical unit.
///
/// With a `u64` backing store this covers ~1.8e16 units, roughly 584,000 years
/// of milliseconds.
pub const SUBUNITS_PER_UNIT: u64 = 1_000;

// u64::MAX is not representable; 2^64 is the first value that overflows.
#[allow(clippy::cast_precision_loss)]
const TICKS_LIMIT: f64 = u64::MAX as f64;

/// Validate a caller-supplied duration and scale it to sub-units.
#[allow(clippy::cast_precision_loss)]
fn scaled_subunits(value: f64, what: &str) -> Result<f64> {
    if !value.is_finite() {
        return Err(Error::invalid_argument(format!(
            "{what} must be finite, got {value}"
        )));
    }
    if value < 0.0 {
        return Err(Error::invalid_argument(format!(
            "{what} must be >= 0, got {value}"
        )));
    }
    // -0.0 passes the check above; adding 0.0 folds it to +0.0.
    Ok(value * SUBUNITS_PER_UNIT as f64 + 0.0)
}

/// A point in (or span of) logical time, in sub-units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ticks(u64);

impl Ticks {
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(u64::MAX);

    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw sub-unit count.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Whole units, or `None` if the value does not fit.
    #[must_use]
    pub const fn from_units(units: u64) -> Option<Self> {
        match units.checked_mul(SUBUNITS_PER_UNIT) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    /// Convert a submission delay, rounding up.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_delay(value: f64) -> Result<Self> {
        let scaled = scaled_subunits(value, "delay")?.ceil();
        if scaled >= TICKS_LIMIT {
            return Err(Error::ClockOverflow);
        }
        Ok(Self(scaled as u64))
    }

    #[must_use]
    pub const fn whole_units(self) -> u64 {
        self.0 / SUBUNITS_PER_UNIT
    }

    /// Fractional part, in sub-units.
    #[must_use]
    pub const fn subunits(self) -> u64 {
        self.0 % SUBUNITS_PER_UNIT
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_units_f64(self) -> f64 {
        self.whole_units() as f64 + self.subunits() as f64 / SUBUNITS_PER_UNIT as f64
    }

    /// Round up to the next whole unit (identity on whole values).
    #[must_use]
    pub const fn ceil_units(self) -> Option<Self> {
        let rem = self.subunits();
        if rem == 0 {
            return Some(self);
        }
        match self.0.checked_add(SUBUNITS_PER_UNIT - rem) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    #[must_use]
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        match self.0.checked_add(rhs.0) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    #[must_use]
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for Ticks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.whole_units(), self.subunits())
    }
}

impl Serialize for Ticks {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_units_f64())
    }
}

/// Monotonic, caller-advanced clock. Starts at zero.
///
/// `now` is the committed sub-unit count; `carry` is the part of a sub-unit
/// that has elapsed on top of it, always in `[0, 1)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogicalClock {
    now: Ticks,
    carry: f64,
}

impl LogicalClock {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: Ticks::ZERO,
            carry: 0.0,
        }
    }

    /// Committed time: the true time rounded down to the sub-unit grid.
    #[must_use]
    pub const fn now(&self) -> Ticks {
        self.now
    }

    /// True time in units, including the uncommitted remainder.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn now_units(&self) -> f64 {
        self.now.as_units_f64() + self.carry / SUBUNITS_PER_UNIT as f64
    }

    /// Whether time has moved past the committed sub-unit.
    #[must_use]
    pub fn has_carry(&self) -> bool {
        self.carry > 0.0
    }

    /// Entries due strictly before this point have strictly passed.
    ///
    /// Due times sit on the sub-unit grid, so `due < now + carry` is
    /// `due < now` without a carry and `due <= now` with one.
    #[must_use]
    pub fn due_horizon(&self) -> Ticks {
        if self.has_carry() {
            Ticks(self.now.0.saturating_add(1))
        } else {
            self.now
        }
    }

    /// The true time rounded up to a whole unit: the base new delays are
    /// measured from.
    #[must_use]
    pub fn submission_base(&self) -> Option<Ticks> {
        if self.has_carry() {
            Ticks(self.now.0.checked_add(1)?).ceil_units()
        } else {
            self.now.ceil_units()
        }
    }

    /// Move the clock forward by `elapsed` units. Never wraps or rounds.
    ///
    /// On error the clock is left unchanged.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn advance(&mut self, elapsed: f64) -> Result<Ticks> {
        let total = self.carry + scaled_subunits(elapsed, "elapsed")?;
        let whole = total.floor();
        if whole >= TICKS_LIMIT {
            return Err(Error::ClockOverflow);
        }
        let now = self
            .now
            .checked_add(Ticks(whole as u64))
            .ok_or(Error::ClockOverflow)?;
        self.now = now;
        self.carry = total - whole;
        Ok(now)
    }
}
