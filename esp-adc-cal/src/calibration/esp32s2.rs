use super::{
    CalibrationConfig,
    CalibrationScheme,
    CalibrationSource,
    Characteristics,
    Error,
    Gain,
    Offset,
};
use crate::{
    adc::{AdcUnit, Attenuation, Resolution},
    chip::ChipVariant,
    efuse::{
        esp32s2::{self as fuses, CalibParam},
        Efuse,
        EfuseStore,
    },
};

const V1_LOW_MV: i64 = 250;
const HIGH_MV: [i64; 4] = [600, 800, 1000, 2000];

/// Versioned two-point calibration of the ESP32-S2.
///
/// Version 1 chips carry readings at 250 mV and at a per-attenuation high
/// voltage; version 2 chips only carry the high reading and an ADC init code.
#[derive(Debug, Clone, Copy, Default)]
pub struct Esp32s2Scheme;

impl Esp32s2Scheme {
    fn version<S: EfuseStore>(efuse: &Efuse<S>) -> Result<u8, Error> {
        match fuses::calibration_version(efuse) {
            0 => Err(Error::NotSupported),
            version if fuses::version_supported(version) => Ok(version),
            version => {
                warn!("unknown ESP32-S2 calibration version {}", version);
                Err(Error::InvalidVersion)
            }
        }
    }

    fn param<S: EfuseStore>(
        efuse: &Efuse<S>,
        unit: AdcUnit,
        atten: Attenuation,
        param: CalibParam,
    ) -> Result<i64, Error> {
        fuses::read_param(efuse, unit, atten, param)
            .map(i64::from)
            .ok_or(Error::InvalidVersion)
    }

    fn coefficients<S: EfuseStore>(
        efuse: &Efuse<S>,
        version: u8,
        unit: AdcUnit,
        atten: Attenuation,
    ) -> Result<(Gain, Offset), Error> {
        let high_mv = HIGH_MV[atten.index()];

        if version == 1 {
            let low = Self::param(efuse, unit, atten, CalibParam::V1Low)?;
            let high = Self::param(efuse, unit, atten, CalibParam::V1High)?;
            debug!("v1 readings {} / {}", low, high);

            if high <= low {
                warn!("{:?} two-point readings out of order", unit);
                return Err(Error::NotSupported);
            }

            Ok((
                Gain::ratio(high_mv - V1_LOW_MV, high - low),
                Offset::ratio(V1_LOW_MV * high - high_mv * low, high - low),
            ))
        } else {
            let high = Self::param(efuse, unit, atten, CalibParam::V2High)?;
            debug!("v2 reading {}", high);

            if high <= 0 {
                warn!("{:?} reading at {} mV is not positive", unit, high_mv);
                return Err(Error::NotSupported);
            }

            Ok((Gain::ratio(high_mv, high), Offset::ZERO))
        }
    }
}

impl CalibrationScheme for Esp32s2Scheme {
    fn check_efuse<S: EfuseStore>(
        &self,
        efuse: &Efuse<S>,
        source: CalibrationSource,
    ) -> Result<(), Error> {
        match source {
            CalibrationSource::EfuseTwoPoint => Self::version(efuse).map(|_| ()),
            CalibrationSource::EfuseVref | CalibrationSource::DefaultVref => {
                Err(Error::NotSupported)
            }
        }
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
        if !config.allows(CalibrationSource::EfuseTwoPoint) {
            error!("two-point calibration disabled, nothing else on ESP32-S2");
            return Err(Error::NoCalibrationSource);
        }

        let version = match Self::version(efuse) {
            Err(Error::NotSupported) => {
                error!("no calibration burned into this ESP32-S2");
                return Err(Error::NoCalibrationSource);
            }
            other => other?,
        };

        let (coeff_a, coeff_b) = Self::coefficients(efuse, version, unit, atten)?;

        Ok(Characteristics::new(
            ChipVariant::Esp32s2,
            unit,
            atten,
            resolution,
            CalibrationSource::EfuseTwoPoint,
            coeff_a,
            coeff_b,
        ))
    }

    fn raw_to_voltage(&self, chars: &Characteristics, reading: u32) -> u32 {
        let voltage = chars.coeff_a.mul_trunc(reading as i64) + chars.coeff_b.to_int();
        voltage.max(0) as u32
    }

    fn init_code<S: EfuseStore>(
        &self,
        efuse: &Efuse<S>,
        unit: AdcUnit,
        atten: Attenuation,
    ) -> Option<u16> {
        let code = fuses::read_param(efuse, unit, atten, CalibParam::V2Init)?;
        u16::try_from(code).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::efuse::{esp32s2::BLK_VERSION_MINOR, EfuseImage};

    fn image(version: u64) -> EfuseImage {
        let mut image = EfuseImage::new();
        image.write_field(BLK_VERSION_MINOR, version);
        image
    }

    fn characterize(
        image: &EfuseImage,
        unit: AdcUnit,
        atten: Attenuation,
    ) -> Result<Characteristics, Error> {
        Esp32s2Scheme.characterize(
            &Efuse::new(image),
            unit,
            atten,
            Resolution::Resolution13Bit,
            1100,
            &CalibrationConfig::all(),
        )
    }

    #[test]
    fn version_1_two_point() {
        // readings 2231 at 250 mV and 5775 at 600 mV
        let chars = characterize(&image(1), AdcUnit::Adc1, Attenuation::_0dB).unwrap();

        assert_eq!(chars.source(), CalibrationSource::EfuseTwoPoint);
        assert_eq!(chars.coeff_a().raw(), 6472);
        assert_eq!(chars.coeff_b().raw(), 30381);
        assert_eq!(chars.raw_to_voltage(2231), 249);
        assert_eq!(chars.raw_to_voltage(5775), 599);
    }

    #[test]
    fn version_1_at_11db() {
        // readings 701 at 250 mV and 6209 at 2000 mV
        let chars = characterize(&image(1), AdcUnit::Adc1, Attenuation::_11dB).unwrap();

        assert_eq!(chars.coeff_a().raw(), 20822);
        assert_eq!(chars.coeff_b().raw(), 27933);
        assert_eq!(chars.raw_to_voltage(6209), 1999);
    }

    #[test]
    fn version_2_single_point() {
        // 169 + 126 + 5815 through the dependency chain
        let chars = characterize(&image(2), AdcUnit::Adc1, Attenuation::_0dB).unwrap();

        assert_eq!(chars.coeff_a().raw(), 65536 * 600 / 6110);
        assert_eq!(chars.coeff_b(), Offset::ZERO);
        assert_eq!(chars.raw_to_voltage(6110), 599);
        assert_eq!(chars.raw_to_voltage(0), 0);
    }

    #[test]
    fn missing_or_unknown_version() {
        assert_eq!(
            characterize(&image(0), AdcUnit::Adc1, Attenuation::_0dB),
            Err(Error::NoCalibrationSource)
        );
        assert_eq!(
            characterize(&image(5), AdcUnit::Adc2, Attenuation::_0dB),
            Err(Error::InvalidVersion)
        );

        let efuse = Efuse::new(image(5));
        assert_eq!(
            Esp32s2Scheme.check_efuse(&efuse, CalibrationSource::EfuseTwoPoint),
            Err(Error::InvalidVersion)
        );
    }

    #[test]
    fn two_point_disabled() {
        let config = CalibrationConfig::all().without(CalibrationSource::EfuseTwoPoint);

        assert_eq!(
            Esp32s2Scheme.characterize(
                &Efuse::new(image(2)),
                AdcUnit::Adc1,
                Attenuation::_0dB,
                Resolution::Resolution13Bit,
                1100,
                &config,
            ),
            Err(Error::NoCalibrationSource)
        );
    }

    #[test]
    fn check_efuse_only_knows_two_point() {
        let efuse = Efuse::new(image(1));

        assert_eq!(
            Esp32s2Scheme.check_efuse(&efuse, CalibrationSource::EfuseTwoPoint),
            Ok(())
        );
        assert_eq!(
            Esp32s2Scheme.check_efuse(&efuse, CalibrationSource::EfuseVref),
            Err(Error::NotSupported)
        );
        assert_eq!(
            Esp32s2Scheme.check_efuse(&Efuse::new(image(0)), CalibrationSource::EfuseTwoPoint),
            Err(Error::NotSupported)
        );
    }

    #[test]
    fn init_code_only_in_version_2() {
        let v1 = Efuse::new(image(1));
        let v2 = Efuse::new(image(2));

        assert_eq!(Esp32s2Scheme.init_code(&v1, AdcUnit::Adc1, Attenuation::_0dB), None);
        assert_eq!(
            Esp32s2Scheme.init_code(&v2, AdcUnit::Adc1, Attenuation::_0dB),
            Some(1519)
        );
        // 30 -> 29
        assert_eq!(
            Esp32s2Scheme.init_code(&v2, AdcUnit::Adc2, Attenuation::_2p5dB),
            Some(23 + 1677)
        );
    }
}
