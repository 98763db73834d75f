//! # ADC calibration
//!
//! ## Overview
//!
//! The raw code returned by the ADC depends on the chip's internal reference
//! voltage, which varies from chip to chip. Espressif measures every chip at
//! the factory and burns the results into eFuse. This module turns those
//! measurements into [`Characteristics`] for one (unit, attenuation) pair,
//! which then convert raw readings to millivolts.
//!
//! Calibration sources, in order of preference:
//!
//!   * [`CalibrationSource::EfuseTwoPoint`]: readings taken at two (or on
//!     newer chips, one) known input voltages,
//!   * [`CalibrationSource::EfuseVref`]: the measured reference voltage
//!     (ESP32 only),
//!   * [`CalibrationSource::DefaultVref`]: a reference voltage supplied by the
//!     caller (ESP32 only).
//!
//! How the readings are stored and turned into a conversion differs between
//! chips; [`ChipVariant`] selects the scheme. On the ESP32 the non-linear top
//! of the 11dB range goes through a lookup table, on the ESP32-C3 and
//! ESP32-S3 a polynomial error estimate is subtracted from the linear result.
//!
//! ## Example
//!
//! ```rust
//! use esp_adc_cal::{
//!     characterize,
//!     efuse::{Efuse, EfuseImage},
//!     AdcUnit,
//!     Attenuation,
//!     CalibrationConfig,
//!     CalibrationSource,
//!     ChipVariant,
//!     Resolution,
//! };
//!
//! // a chip without any factory calibration
//! let efuse = Efuse::new(EfuseImage::new());
//!
//! let chars = characterize(
//!     ChipVariant::Esp32,
//!     &efuse,
//!     AdcUnit::Adc1,
//!     Attenuation::_11dB,
//!     Resolution::Resolution12Bit,
//!     1100,
//!     &CalibrationConfig::default(),
//! )
//! .unwrap();
//!
//! assert_eq!(chars.source(), CalibrationSource::DefaultVref);
//! assert!(chars.raw_to_voltage(2048) > 1000);
//! ```

use core::fmt::Display;

use enumset::{EnumSet, EnumSetType};

pub use self::{
    curve::{CurveTerm, ErrorCurve, Esp32c3Scheme, Esp32s3Scheme},
    esp32::{Esp32Scheme, LookupTable},
    esp32s2::Esp32s2Scheme,
    fixed::{Gain, Offset, Scaled},
};
use crate::{
    adc::{AdcDriver, AdcUnit, Attenuation, Resolution},
    chip::ChipVariant,
    efuse::{Efuse, EfuseStore},
};

mod curve;
mod esp32;
mod esp32s2;
pub mod fixed;

macro_rules! dispatch {
    ($chip:expr, $scheme:ident => $body:expr) => {
        match $chip {
            ChipVariant::Esp32 => {
                let $scheme = Esp32Scheme;
                $body
            }
            ChipVariant::Esp32s2 => {
                let $scheme = Esp32s2Scheme;
                $body
            }
            ChipVariant::Esp32c3 => {
                let $scheme = Esp32c3Scheme;
                $body
            }
            ChipVariant::Esp32s3 => {
                let $scheme = Esp32s3Scheme;
                $body
            }
        }
    };
}

/// Where the calibration coefficients came from.
#[derive(Debug, EnumSetType)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationSource {
    /// Factory readings at known input voltages.
    EfuseTwoPoint,
    /// Factory measurement of the reference voltage.
    EfuseVref,
    /// Reference voltage supplied by the caller.
    DefaultVref,
}

/// Calibration errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// An argument is outside what the chip supports, e.g. a channel that
    /// does not exist or an unsupported resolution.
    InvalidArgument,
    /// The calibration source is not burned into this chip, or the chip has
    /// no such source at all.
    NotSupported,
    /// The chip carries calibration data in a format this crate does not
    /// know.
    InvalidVersion,
    /// ADC2 is in use by another owner.
    Timeout,
    /// No enabled calibration source is available.
    NoCalibrationSource,
}

impl Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::InvalidArgument => write!(f, "Invalid argument"),
            Error::NotSupported => write!(f, "Calibration source not supported"),
            Error::InvalidVersion => write!(f, "Unknown eFuse calibration version"),
            Error::Timeout => write!(f, "ADC2 is in use by another owner"),
            Error::NoCalibrationSource => write!(f, "No calibration source available"),
        }
    }
}

impl core::error::Error for Error {}

/// Which calibration sources and corrections may be used.
///
/// The default follows the crate's Cargo features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationConfig {
    /// Sources characterization may pick from.
    pub sources: EnumSet<CalibrationSource>,
    /// Use the lookup table for the non-linear region at 11dB (ESP32).
    pub lut: bool,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        let mut sources = EnumSet::new();
        if cfg!(feature = "efuse-tp") {
            sources.insert(CalibrationSource::EfuseTwoPoint);
        }
        if cfg!(feature = "efuse-vref") {
            sources.insert(CalibrationSource::EfuseVref);
        }
        if cfg!(feature = "default-vref") {
            sources.insert(CalibrationSource::DefaultVref);
        }

        Self {
            sources,
            lut: cfg!(feature = "lut"),
        }
    }
}

impl CalibrationConfig {
    /// Every source and the lookup table enabled.
    pub fn all() -> Self {
        Self {
            sources: EnumSet::all(),
            lut: true,
        }
    }

    /// This configuration with `source` disabled.
    pub fn without(mut self, source: CalibrationSource) -> Self {
        self.sources.remove(source);
        self
    }

    /// Whether `source` may be used.
    pub fn allows(&self, source: CalibrationSource) -> bool {
        self.sources.contains(source)
    }
}

/// Correction applied on top of the linear coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    /// The linear coefficients alone.
    None,
    /// Bilinear interpolation in a lookup table above a raw threshold.
    Lut(&'static LookupTable),
    /// Subtract a polynomial estimate of the linear result's error.
    Curve(&'static ErrorCurve),
}

/// Calibration of one ADC unit at one attenuation.
///
/// Created by [`characterize`]; read-only afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Characteristics {
    chip: ChipVariant,
    unit: AdcUnit,
    atten: Attenuation,
    resolution: Resolution,
    source: CalibrationSource,
    coeff_a: Gain,
    coeff_b: Offset,
    vref: u32,
    correction: Correction,
}

impl Characteristics {
    pub(crate) fn new(
        chip: ChipVariant,
        unit: AdcUnit,
        atten: Attenuation,
        resolution: Resolution,
        source: CalibrationSource,
        coeff_a: Gain,
        coeff_b: Offset,
    ) -> Self {
        Self {
            chip,
            unit,
            atten,
            resolution,
            source,
            coeff_a,
            coeff_b,
            vref: 0,
            correction: Correction::None,
        }
    }

    pub(crate) fn with_vref(mut self, vref: u32) -> Self {
        self.vref = vref;
        self
    }

    pub(crate) fn with_correction(mut self, correction: Correction) -> Self {
        self.correction = correction;
        self
    }

    /// The chip this calibration belongs to.
    pub fn chip(&self) -> ChipVariant {
        self.chip
    }

    /// The ADC unit.
    pub fn unit(&self) -> AdcUnit {
        self.unit
    }

    /// The attenuation.
    pub fn attenuation(&self) -> Attenuation {
        self.atten
    }

    /// Resolution of the readings passed to [`Self::raw_to_voltage`].
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// The calibration source used.
    pub fn source(&self) -> CalibrationSource {
        self.source
    }

    /// Gain of the linear conversion.
    pub fn coeff_a(&self) -> Gain {
        self.coeff_a
    }

    /// Offset of the linear conversion.
    pub fn coeff_b(&self) -> Offset {
        self.coeff_b
    }

    /// Reference voltage in mV used for lookup table interpolation (ESP32),
    /// 0 on other chips.
    pub fn vref(&self) -> u32 {
        self.vref
    }

    /// Correction applied on top of the linear coefficients.
    pub fn correction(&self) -> Correction {
        self.correction
    }

    /// Scale `raw` to the chip's canonical resolution, saturating at its
    /// maximum.
    fn normalize(&self, raw: u32) -> u32 {
        let canonical = self.chip.canonical_resolution();
        let shift = canonical.bits().saturating_sub(self.resolution.bits());
        let reading = (raw as u64) << shift;

        reading.min(canonical.max_value() as u64) as u32
    }

    /// Convert a raw reading taken at [`Self::resolution`] to millivolts.
    pub fn raw_to_voltage(&self, raw: u32) -> u32 {
        let reading = self.normalize(raw);
        dispatch!(self.chip, scheme => scheme.raw_to_voltage(self, reading))
    }
}

/// A chip's calibration scheme.
pub trait CalibrationScheme {
    /// Whether `source` is available on the chip behind `efuse`.
    fn check_efuse<S: EfuseStore>(
        &self,
        efuse: &Efuse<S>,
        source: CalibrationSource,
    ) -> Result<(), Error>;

    /// Derive the characteristics of `unit` at `atten`.
    fn characterize<S: EfuseStore>(
        &self,
        efuse: &Efuse<S>,
        unit: AdcUnit,
        atten: Attenuation,
        resolution: Resolution,
        default_vref: u32,
        config: &CalibrationConfig,
    ) -> Result<Characteristics, Error>;

    /// Convert a reading already normalized to the canonical resolution.
    fn raw_to_voltage(&self, chars: &Characteristics, reading: u32) -> u32;

    /// The ADC init (offset) code burned for `unit` at `atten`, if any.
    fn init_code<S: EfuseStore>(
        &self,
        efuse: &Efuse<S>,
        unit: AdcUnit,
        atten: Attenuation,
    ) -> Option<u16>;
}

/// Check whether `source` is available on `chip`.
///
/// Returns [`Error::NotSupported`] if the source is not burned (or does not
/// exist on this chip) and [`Error::InvalidVersion`] if the calibration data
/// is in an unknown format.
pub fn check_efuse<S: EfuseStore>(
    chip: ChipVariant,
    efuse: &Efuse<S>,
    source: CalibrationSource,
) -> Result<(), Error> {
    dispatch!(chip, scheme => scheme.check_efuse(efuse, source))
}

/// Characterize `unit` of `chip` at `atten` for readings of `resolution`.
///
/// The first source enabled in `config` and available on the chip is used;
/// `default_vref` (mV) is only used by chips with a Vref model when neither
/// eFuse source is. If nothing is available, [`Error::NoCalibrationSource`]
/// is returned.
pub fn characterize<S: EfuseStore>(
    chip: ChipVariant,
    efuse: &Efuse<S>,
    unit: AdcUnit,
    atten: Attenuation,
    resolution: Resolution,
    default_vref: u32,
    config: &CalibrationConfig,
) -> Result<Characteristics, Error> {
    if !chip.supports(resolution) {
        warn!("{:?} cannot be calibrated at {:?}", chip, resolution);
        return Err(Error::InvalidArgument);
    }

    let chars = dispatch!(chip, scheme => {
        scheme.characterize(efuse, unit, atten, resolution, default_vref, config)
    })?;

    debug!(
        "{:?} {:?} {:?}: {:?}, coeff_a {}, coeff_b {}",
        chip,
        unit,
        atten,
        chars.source,
        chars.coeff_a.raw(),
        chars.coeff_b.raw()
    );

    Ok(chars)
}

/// Convert `raw` to millivolts with `chars`.
pub fn raw_to_voltage(raw: u32, chars: &Characteristics) -> u32 {
    chars.raw_to_voltage(raw)
}

/// Sample `channel` with `adc` and convert the result with `chars`.
///
/// A busy ADC2 is reported as [`Error::Timeout`] and not retried.
pub fn get_voltage<A: AdcDriver + ?Sized>(
    adc: &mut A,
    channel: u8,
    chars: &Characteristics,
) -> Result<u32, Error> {
    if channel >= chars.chip.channel_count(chars.unit) {
        warn!("{:?} has no channel {}", chars.unit, channel);
        return Err(Error::InvalidArgument);
    }

    let raw = nb::block!(adc.read_oneshot(chars.unit, channel, chars.resolution))?;
    trace!("{:?} channel {}: raw {}", chars.unit, channel, raw);

    Ok(chars.raw_to_voltage(raw as u32))
}

/// The ADC init (offset) code burned for `unit` at `atten`, if the chip has
/// one.
pub fn init_code<S: EfuseStore>(
    chip: ChipVariant,
    efuse: &Efuse<S>,
    unit: AdcUnit,
    atten: Attenuation,
) -> Option<u16> {
    dispatch!(chip, scheme => scheme.init_code(efuse, unit, atten))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::efuse::EfuseImage;

    fn linear(gain: i64, offset: i64, resolution: Resolution) -> Characteristics {
        Characteristics::new(
            ChipVariant::Esp32,
            AdcUnit::Adc1,
            Attenuation::_0dB,
            resolution,
            CalibrationSource::DefaultVref,
            Gain::from_raw(gain),
            Offset::from_int(offset),
        )
    }

    #[test]
    fn unit_gain_is_identity() {
        let chars = linear(65536, 0, Resolution::Resolution12Bit);

        assert_eq!(chars.raw_to_voltage(1000), 1000);
        assert_eq!(raw_to_voltage(0, &chars), 0);
    }

    #[test]
    fn readings_are_normalized_to_12_bits() {
        let chars = linear(65536, 0, Resolution::Resolution10Bit);

        assert_eq!(chars.raw_to_voltage(250), 1000);
        assert_eq!(chars.raw_to_voltage(1023), 4092);
    }

    #[test]
    fn out_of_range_readings_saturate() {
        let chars = linear(65536, 0, Resolution::Resolution9Bit);

        assert_eq!(chars.raw_to_voltage(511), 4088);
        assert_eq!(chars.raw_to_voltage(512), 4095);
        assert_eq!(chars.raw_to_voltage(u32::MAX), 4095);

        let chars = linear(65536, 0, Resolution::Resolution12Bit);
        assert_eq!(chars.raw_to_voltage(70_000), chars.raw_to_voltage(4095));
    }

    #[test]
    fn negative_results_clamp_to_zero() {
        let chars = linear(65536, -50, Resolution::Resolution12Bit);

        assert_eq!(chars.raw_to_voltage(10), 0);
        assert_eq!(chars.raw_to_voltage(60), 10);
    }

    #[test]
    fn default_config_follows_features() {
        let config = CalibrationConfig::default();

        assert_eq!(config.allows(CalibrationSource::EfuseTwoPoint), cfg!(feature = "efuse-tp"));
        assert_eq!(config.lut, cfg!(feature = "lut"));
        assert!(!CalibrationConfig::all()
            .without(CalibrationSource::EfuseVref)
            .allows(CalibrationSource::EfuseVref));
    }

    #[test]
    fn rejects_unsupported_resolution() {
        let efuse = Efuse::new(EfuseImage::new());

        for (chip, resolution) in [
            (ChipVariant::Esp32, Resolution::Resolution13Bit),
            (ChipVariant::Esp32s2, Resolution::Resolution12Bit),
            (ChipVariant::Esp32c3, Resolution::Resolution9Bit),
        ] {
            assert_eq!(
                characterize(
                    chip,
                    &efuse,
                    AdcUnit::Adc1,
                    Attenuation::_0dB,
                    resolution,
                    1100,
                    &CalibrationConfig::all(),
                ),
                Err(Error::InvalidArgument)
            );
        }
    }

    #[test]
    fn errors_display() {
        assert_eq!(Error::Timeout.to_string(), "ADC2 is in use by another owner");
    }
}
