//! Single reference point calibration with polynomial error correction, as
//! used by the ESP32-C3 and ESP32-S3.
//!
//! The chip stores the raw reading at one known voltage per attenuation. The
//! line through the origin and that point is corrected by subtracting
//!
//! ```text
//! error(v) = sum(sign[i] * v^i * numerator[i] / denominator[i])
//! ```
//!
//! where `v` is the uncorrected voltage in mV and each term is truncated on
//! its own.

use super::{
    CalibrationConfig,
    CalibrationScheme,
    CalibrationSource,
    Characteristics,
    Correction,
    Error,
    Gain,
    Offset,
};
use crate::{
    adc::{AdcUnit, Attenuation, Resolution},
    chip::ChipVariant,
    efuse::{esp32c3, esp32s3, Efuse, EfuseStore},
};

const E15: u64 = 1_000_000_000_000_000;
const E16: u64 = 10_000_000_000_000_000;
const E17: u64 = 100_000_000_000_000_000;

/// One `sign * v^i * numerator / denominator` term of an [`ErrorCurve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CurveTerm {
    /// Whether the term is subtracted from the error.
    pub negative: bool,
    /// Numerator of the coefficient.
    pub numerator: u64,
    /// Denominator of the coefficient.
    pub denominator: u64,
}

const fn pos(numerator: u64, denominator: u64) -> CurveTerm {
    CurveTerm {
        negative: false,
        numerator,
        denominator,
    }
}

const fn neg(numerator: u64, denominator: u64) -> CurveTerm {
    CurveTerm {
        negative: true,
        numerator,
        denominator,
    }
}

/// Polynomial estimate of the error of the linear conversion. Term `i` is
/// multiplied by `v^i`.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorCurve {
    /// Terms in ascending power.
    pub terms: &'static [CurveTerm],
}

impl ErrorCurve {
    /// Estimated error in mV at the uncorrected voltage `v`.
    pub fn error(&self, v: u32) -> i64 {
        if v == 0 {
            return 0;
        }

        let mut power: u128 = 1;
        let mut error = 0;
        for term in self.terms {
            let magnitude = power * term.numerator as u128 / term.denominator as u128;
            let magnitude = magnitude as i64;

            if term.negative {
                error -= magnitude;
            } else {
                error += magnitude;
            }

            power *= v as u128;
        }

        error
    }
}

static ESP32C3_CURVES: [ErrorCurve; 4] = [
    ErrorCurve {
        terms: &[
            neg(225966470500043, E15),
            neg(7265418501948, E16),
            pos(109410402681, E16),
        ],
    },
    ErrorCurve {
        terms: &[
            pos(4229623392600516, E16),
            neg(731527490903, E16),
            pos(88166562521, E16),
        ],
    },
    ErrorCurve {
        terms: &[
            neg(1017859239236435, E15),
            neg(97159265299153, E16),
            pos(149794028038, E16),
        ],
    },
    ErrorCurve {
        terms: &[
            neg(14912262772850453, E16),
            neg(228549975564099, E16),
            pos(356391935717, E16),
            neg(179964582, E16),
            pos(42046, E16),
        ],
    },
];

static ESP32S3_CURVES: [[ErrorCurve; 4]; 2] = [
    [
        ErrorCurve {
            terms: &[
                neg(27856531419538344, E16),
                neg(50871540569528, E16),
                pos(9798249589, E15),
            ],
        },
        ErrorCurve {
            terms: &[
                neg(29831022915028695, E16),
                neg(49393185868806, E16),
                pos(101379430548, E16),
            ],
        },
        ErrorCurve {
            terms: &[
                neg(23285545746296417, E16),
                neg(147640181047414, E16),
                pos(208385525314, E16),
            ],
        },
        ErrorCurve {
            terms: &[
                neg(644403418269478, E15),
                neg(644334888647536, E16),
                pos(1297891447611, E16),
                neg(70769718, E15),
                pos(13515, E15),
            ],
        },
    ],
    [
        ErrorCurve {
            terms: &[
                neg(25668651654328927, E16),
                pos(1353548869615, E16),
                pos(36615265189, E16),
            ],
        },
        ErrorCurve {
            terms: &[
                neg(23690184690298404, E16),
                neg(66319894226185, E16),
                pos(118964995959, E16),
            ],
        },
        ErrorCurve {
            terms: &[
                neg(9452499397020617, E16),
                neg(200996773954387, E16),
                pos(259011467956, E17),
            ],
        },
        ErrorCurve {
            terms: &[
                pos(12247719764336924, E16),
                neg(755717904943462, E16),
                pos(1478791187119, E16),
                neg(79672528, E15),
                pos(15038, E15),
            ],
        },
    ],
];

/// Where a curve-corrected chip keeps its calibration data.
trait CurveChip {
    const CHIP: ChipVariant;
    const SUPPORTED_VERSION: u8;

    fn version<S: EfuseStore>(efuse: &Efuse<S>) -> u8;

    /// The (digital output, voltage in mV) reference pair.
    fn reference<S: EfuseStore>(efuse: &Efuse<S>, unit: AdcUnit, atten: Attenuation)
        -> (u32, u32);

    fn curve(unit: AdcUnit, atten: Attenuation) -> &'static ErrorCurve;

    fn init_code<S: EfuseStore>(efuse: &Efuse<S>, unit: AdcUnit, atten: Attenuation)
        -> Option<u32>;
}

impl CurveChip for Esp32c3Scheme {
    const CHIP: ChipVariant = ChipVariant::Esp32c3;
    const SUPPORTED_VERSION: u8 = esp32c3::SUPPORTED_VERSION;

    fn version<S: EfuseStore>(efuse: &Efuse<S>) -> u8 {
        esp32c3::calibration_version(efuse)
    }

    // ADC2 was never calibrated separately and shares ADC1's data
    fn reference<S: EfuseStore>(
        efuse: &Efuse<S>,
        _unit: AdcUnit,
        atten: Attenuation,
    ) -> (u32, u32) {
        esp32c3::read_cal_voltage(efuse, atten)
    }

    fn curve(_unit: AdcUnit, atten: Attenuation) -> &'static ErrorCurve {
        &ESP32C3_CURVES[atten.index()]
    }

    fn init_code<S: EfuseStore>(
        efuse: &Efuse<S>,
        unit: AdcUnit,
        atten: Attenuation,
    ) -> Option<u32> {
        match unit {
            AdcUnit::Adc1 => Some(esp32c3::read_init_code(efuse, atten)),
            AdcUnit::Adc2 => None,
        }
    }
}

impl CurveChip for Esp32s3Scheme {
    const CHIP: ChipVariant = ChipVariant::Esp32s3;
    const SUPPORTED_VERSION: u8 = esp32s3::SUPPORTED_VERSION;

    fn version<S: EfuseStore>(efuse: &Efuse<S>) -> u8 {
        esp32s3::calibration_version(efuse)
    }

    fn reference<S: EfuseStore>(
        efuse: &Efuse<S>,
        unit: AdcUnit,
        atten: Attenuation,
    ) -> (u32, u32) {
        esp32s3::read_cal_voltage(efuse, unit, atten)
    }

    fn curve(unit: AdcUnit, atten: Attenuation) -> &'static ErrorCurve {
        &ESP32S3_CURVES[unit.index()][atten.index()]
    }

    fn init_code<S: EfuseStore>(
        efuse: &Efuse<S>,
        unit: AdcUnit,
        atten: Attenuation,
    ) -> Option<u32> {
        Some(esp32s3::read_init_code(efuse, unit, atten))
    }
}

fn check_version<C: CurveChip, S: EfuseStore>(efuse: &Efuse<S>) -> Result<(), Error> {
    match C::version(efuse) {
        0 => Err(Error::NotSupported),
        version if version == C::SUPPORTED_VERSION => Ok(()),
        version => {
            warn!("unknown {:?} calibration version {}", C::CHIP, version);
            Err(Error::InvalidVersion)
        }
    }
}

fn check_efuse<C: CurveChip, S: EfuseStore>(
    efuse: &Efuse<S>,
    source: CalibrationSource,
) -> Result<(), Error> {
    match source {
        CalibrationSource::EfuseTwoPoint => check_version::<C, S>(efuse),
        CalibrationSource::EfuseVref | CalibrationSource::DefaultVref => Err(Error::NotSupported),
    }
}

fn characterize<C: CurveChip, S: EfuseStore>(
    efuse: &Efuse<S>,
    unit: AdcUnit,
    atten: Attenuation,
    resolution: Resolution,
    config: &CalibrationConfig,
) -> Result<Characteristics, Error> {
    if !config.allows(CalibrationSource::EfuseTwoPoint) {
        error!("eFuse calibration disabled, nothing else on {:?}", C::CHIP);
        return Err(Error::NoCalibrationSource);
    }

    match check_version::<C, S>(efuse) {
        Err(Error::NotSupported) => {
            error!("no calibration burned into this {:?}", C::CHIP);
            return Err(Error::NoCalibrationSource);
        }
        other => other?,
    }

    let (digi, mv) = C::reference(efuse, unit, atten);
    debug!("reference reading {} at {} mV", digi, mv);

    if digi == 0 {
        warn!("{:?} reference reading is zero", unit);
        return Err(Error::NotSupported);
    }

    Ok(Characteristics::new(
        C::CHIP,
        unit,
        atten,
        resolution,
        CalibrationSource::EfuseTwoPoint,
        Gain::ratio(mv as i64, digi as i64),
        Offset::ZERO,
    )
    .with_correction(Correction::Curve(C::curve(unit, atten))))
}

fn raw_to_voltage(chars: &Characteristics, reading: u32) -> u32 {
    let voltage = chars.coeff_a.mul_trunc(reading as i64);
    let error = match chars.correction {
        Correction::Curve(curve) => curve.error(voltage as u32),
        _ => 0,
    };

    (voltage - error).max(0) as u32
}

macro_rules! curve_scheme {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl CalibrationScheme for $name {
            fn check_efuse<S: EfuseStore>(
                &self,
                efuse: &Efuse<S>,
                source: CalibrationSource,
            ) -> Result<(), Error> {
                check_efuse::<Self, S>(efuse, source)
            }

            fn characterize<S: EfuseStore>(
                &self,
                efuse: &Efuse<S>,
                unit: AdcUnit,
                atten: Attenuation,
                resolution: Resolution,
                _default_vref: u32,
                config: &CalibrationConfig,
            ) -> Result<Characteristics, Error> {
                characterize::<Self, S>(efuse, unit, atten, resolution, config)
            }

            fn raw_to_voltage(&self, chars: &Characteristics, reading: u32) -> u32 {
                raw_to_voltage(chars, reading)
            }

            fn init_code<S: EfuseStore>(
                &self,
                efuse: &Efuse<S>,
                unit: AdcUnit,
                atten: Attenuation,
            ) -> Option<u16> {
                if check_version::<Self, S>(efuse).is_err() {
                    return None;
                }

                <Self as CurveChip>::init_code(efuse, unit, atten)
                    .and_then(|code| u16::try_from(code).ok())
            }
        }
    };
}

curve_scheme!(
    /// Curve-corrected calibration of the ESP32-C3.
    Esp32c3Scheme
);

curve_scheme!(
    /// Curve-corrected calibration of the ESP32-S3.
    Esp32s3Scheme
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::efuse::{EfuseImage, Encoding};

    fn versioned(field: crate::efuse::EfuseField) -> EfuseImage {
        let mut image = EfuseImage::new();
        image.write_field(field, 1);
        image
    }

    fn c3(image: &EfuseImage, unit: AdcUnit, atten: Attenuation) -> Result<Characteristics, Error> {
        Esp32c3Scheme.characterize(
            &Efuse::new(image),
            unit,
            atten,
            Resolution::Resolution12Bit,
            0,
            &CalibrationConfig::all(),
        )
    }

    fn s3(image: &EfuseImage, unit: AdcUnit, atten: Attenuation) -> Result<Characteristics, Error> {
        Esp32s3Scheme.characterize(
            &Efuse::new(image),
            unit,
            atten,
            Resolution::Resolution12Bit,
            0,
            &CalibrationConfig::all(),
        )
    }

    #[test]
    fn error_terms_truncate_individually() {
        let curve = &ESP32C3_CURVES[0];

        assert_eq!(curve.error(0), 0);
        // 0 - 399 * 7265418501948 / 1e16 + 399^2 * 109410402681 / 1e16
        assert_eq!(curve.error(399), 1);
        assert_eq!(curve.error(818), 7);
    }

    #[test]
    fn error_with_negative_sum() {
        assert_eq!(ESP32S3_CURVES[1][2].error(849), -16);
        assert_eq!(ESP32S3_CURVES[1][2].error(2023), -30);
    }

    #[test]
    fn c3_reference_points() {
        let image = versioned(esp32c3::BLK_VERSION_MAJOR);

        let chars = c3(&image, AdcUnit::Adc1, Attenuation::_0dB).unwrap();
        assert_eq!(chars.coeff_a().raw(), 13107);
        assert_eq!(chars.correction(), Correction::Curve(&ESP32C3_CURVES[0]));
        assert_eq!(chars.raw_to_voltage(2000), 398);
        assert_eq!(chars.raw_to_voltage(4095), 811);
        assert_eq!(chars.raw_to_voltage(0), 0);

        let chars = c3(&image, AdcUnit::Adc1, Attenuation::_11dB).unwrap();
        assert_eq!(chars.coeff_a().raw(), 44892);
        assert_eq!(chars.raw_to_voltage(2000), 1367);
        assert_eq!(chars.raw_to_voltage(4095), 2727);
    }

    #[test]
    fn c3_adc2_shares_adc1_data() {
        let mut image = versioned(esp32c3::BLK_VERSION_MAJOR);
        image.write_signed(esp32c3::ADC1_CAL_VOL_ATTEN1, 25, Encoding::SignMagnitude);

        let adc1 = c3(&image, AdcUnit::Adc1, Attenuation::_2p5dB).unwrap();
        let adc2 = c3(&image, AdcUnit::Adc2, Attenuation::_2p5dB).unwrap();

        assert_eq!(adc1.coeff_a(), adc2.coeff_a());
        assert_eq!(adc1.coeff_a().raw(), 65536 * 550 / 2025);

        let efuse = Efuse::new(&image);
        assert_eq!(
            Esp32c3Scheme.init_code(&efuse, AdcUnit::Adc1, Attenuation::_0dB),
            Some(1000)
        );
        assert_eq!(
            Esp32c3Scheme.init_code(&efuse, AdcUnit::Adc2, Attenuation::_0dB),
            None
        );
    }

    #[test]
    fn s3_units_use_their_own_curves() {
        let image = versioned(esp32s3::BLK_VERSION_MAJOR);

        let adc1 = s3(&image, AdcUnit::Adc1, Attenuation::_11dB).unwrap();
        let adc2 = s3(&image, AdcUnit::Adc2, Attenuation::_11dB).unwrap();

        // 850 mV read as 900 and 915
        assert_eq!(adc1.coeff_a().raw(), 61895);
        assert_eq!(adc2.coeff_a().raw(), 60880);
        assert_eq!(adc1.raw_to_voltage(900), 846);
        assert_eq!(adc2.raw_to_voltage(915), 847);
        assert_eq!(adc1.raw_to_voltage(4095), 3246);
        assert_eq!(adc2.raw_to_voltage(4095), 3188);

        let adc2 = s3(&image, AdcUnit::Adc2, Attenuation::_6dB).unwrap();
        assert_eq!(adc2.raw_to_voltage(1720), 865);
    }

    #[test]
    fn monotonic_below_11db() {
        let c3_image = versioned(esp32c3::BLK_VERSION_MAJOR);
        let s3_image = versioned(esp32s3::BLK_VERSION_MAJOR);

        for atten in [Attenuation::_0dB, Attenuation::_2p5dB, Attenuation::_6dB] {
            for chars in [
                c3(&c3_image, AdcUnit::Adc1, atten).unwrap(),
                s3(&s3_image, AdcUnit::Adc1, atten).unwrap(),
                s3(&s3_image, AdcUnit::Adc2, atten).unwrap(),
            ] {
                let mut previous = 0;
                for raw in 0..=4095 {
                    let mv = chars.raw_to_voltage(raw);
                    assert!(mv >= previous, "{:?}: {} mV at {}", chars, mv, raw);
                    previous = mv;
                }
            }
        }
    }

    #[test]
    fn version_handling() {
        let blank = EfuseImage::new();
        assert_eq!(
            s3(&blank, AdcUnit::Adc1, Attenuation::_0dB),
            Err(Error::NoCalibrationSource)
        );
        assert_eq!(
            Esp32s3Scheme.check_efuse(&Efuse::new(&blank), CalibrationSource::EfuseTwoPoint),
            Err(Error::NotSupported)
        );
        assert_eq!(
            Esp32s3Scheme.init_code(&Efuse::new(&blank), AdcUnit::Adc1, Attenuation::_0dB),
            None
        );

        let mut unknown = EfuseImage::new();
        unknown.write_field(esp32c3::BLK_VERSION_MAJOR, 2);
        assert_eq!(
            c3(&unknown, AdcUnit::Adc1, Attenuation::_0dB),
            Err(Error::InvalidVersion)
        );
        assert_eq!(
            Esp32c3Scheme.check_efuse(&Efuse::new(&unknown), CalibrationSource::EfuseVref),
            Err(Error::NotSupported)
        );
    }

    #[test]
    fn disabled_source() {
        let image = versioned(esp32s3::BLK_VERSION_MAJOR);
        let config = CalibrationConfig::all().without(CalibrationSource::EfuseTwoPoint);

        assert_eq!(
            Esp32s3Scheme.characterize(
                &Efuse::new(&image),
                AdcUnit::Adc1,
                Attenuation::_0dB,
                Resolution::Resolution12Bit,
                0,
                &config,
            ),
            Err(Error::NoCalibrationSource)
        );
    }
}
