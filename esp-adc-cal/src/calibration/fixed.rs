//! Fixed-point coefficients.
//!
//! Gains and offsets are stored as integers pre-multiplied by a constant
//! scale. Carrying the scale in the type keeps a gain scaled by 65536 from
//! being mixed up with an offset scaled by 1024.

use core::fmt;

/// A fixed-point number whose raw value is `value * SCALE`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Scaled<const SCALE: i64>(i64);

/// Scale of [`Gain`].
pub const GAIN_SCALE: i64 = 1 << 16;

/// Scale of [`Offset`].
pub const OFFSET_SCALE: i64 = 1 << 10;

/// Slope of a raw-to-millivolt line, in mV per LSB.
pub type Gain = Scaled<GAIN_SCALE>;

/// Offset of a raw-to-millivolt line, in mV.
pub type Offset = Scaled<OFFSET_SCALE>;

impl<const SCALE: i64> Scaled<SCALE> {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Wrap an already-scaled value.
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// The scaled value.
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// The whole number `value`.
    pub const fn from_int(value: i64) -> Self {
        Self(value * SCALE)
    }

    /// `num / den`, truncated toward zero.
    pub const fn ratio(num: i64, den: i64) -> Self {
        Self(num * SCALE / den)
    }

    /// `value * self`, truncated toward zero.
    pub const fn mul_trunc(self, value: i64) -> i64 {
        value * self.0 / SCALE
    }

    /// `value * self`, rounded half up.
    pub const fn mul_round(self, value: i64) -> i64 {
        (value * self.0 + SCALE / 2) / SCALE
    }

    /// The value truncated toward zero.
    pub const fn to_int(self) -> i64 {
        self.0 / SCALE
    }
}

impl<const SCALE: i64> fmt::Debug for Scaled<SCALE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0, SCALE)
    }
}

#[cfg(feature = "defmt")]
impl<const SCALE: i64> defmt::Format for Scaled<SCALE> {
    fn format(&self, f: defmt::Formatter<'_>) {
        defmt::write!(f, "{}/{}", self.0, SCALE)
    }
}
