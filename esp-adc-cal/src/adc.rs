//! # ADC unit, attenuation and resolution
//!
//! ## Overview
//!
//! The types in this module describe *what* was sampled: which converter,
//! at which input attenuation, and with which bit width. Calibration is
//! characterized per (unit, attenuation) pair and converts readings of a
//! given resolution.
//!
//! Sampling itself belongs to the platform's ADC driver. The [`AdcDriver`]
//! trait is the seam through which [`crate::get_voltage`] obtains a raw
//! sample.

use crate::calibration::Error;

/// A physical ADC converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcUnit {
    /// ADC1, always available to the application.
    Adc1,
    /// ADC2, shared with the radio on chips that have one.
    Adc2,
}

impl AdcUnit {
    pub(crate) const fn index(self) -> usize {
        match self {
            AdcUnit::Adc1 => 0,
            AdcUnit::Adc2 => 1,
        }
    }
}

/// The attenuation of the ADC input.
///
/// Higher attenuation allows higher input voltages at the cost of accuracy.
#[allow(clippy::enum_variant_names)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::FromRepr)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Attenuation {
    /// 0dB attenuation
    _0dB   = 0b00,
    /// 2.5dB attenuation
    _2p5dB = 0b01,
    /// 6dB attenuation
    _6dB   = 0b10,
    /// 11dB attenuation
    _11dB  = 0b11,
}

impl Attenuation {
    /// Index of this attenuation into per-attenuation calibration tables.
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// The sampling/readout resolution of the ADC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::EnumIter)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resolution {
    /// 9-bit resolution
    Resolution9Bit,
    /// 10-bit resolution
    Resolution10Bit,
    /// 11-bit resolution
    Resolution11Bit,
    /// 12-bit resolution
    Resolution12Bit,
    /// 13-bit resolution
    Resolution13Bit,
}

impl Resolution {
    /// Number of bits in a reading.
    pub const fn bits(self) -> u32 {
        match self {
            Resolution::Resolution9Bit => 9,
            Resolution::Resolution10Bit => 10,
            Resolution::Resolution11Bit => 11,
            Resolution::Resolution12Bit => 12,
            Resolution::Resolution13Bit => 13,
        }
    }

    /// Largest reading representable at this resolution.
    pub const fn max_value(self) -> u32 {
        (1 << self.bits()) - 1
    }
}

/// One-shot sampling, as provided by the platform's ADC driver.
///
/// Implementations return [`nb::Error::WouldBlock`] while a conversion is in
/// progress. A read from [`AdcUnit::Adc2`] while another owner (e.g. the
/// Wi-Fi PHY) holds the converter must fail with [`Error::Timeout`] instead
/// of blocking.
pub trait AdcDriver {
    /// Sample `channel` of `unit` at `resolution`, returning the raw code.
    fn read_oneshot(
        &mut self,
        unit: AdcUnit,
        channel: u8,
        resolution: Resolution,
    ) -> nb::Result<u16, Error>;
}

impl<T: AdcDriver + ?Sized> AdcDriver for &mut T {
    fn read_oneshot(
        &mut self,
        unit: AdcUnit,
        channel: u8,
        resolution: Resolution,
    ) -> nb::Result<u16, Error> {
        (**self).read_oneshot(unit, channel, resolution)
    }
}
