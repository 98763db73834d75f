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
    efuse::{esp32 as fuses, Efuse, EfuseStore},
};

const TP_LOW_MV: i64 = 150;
const TP_HIGH_MV: i64 = 850;

const VREF_DIVISOR: i64 = 4096;

const LUT_VREF_LOW: i64 = 1000;
const LUT_VREF_HIGH: i64 = 1200;
const LUT_ADC_STEP_SIZE: i64 = 64;
const LUT_POINTS: usize = 20;
const LUT_LOW_THRESH: u32 = 2880;
const LUT_HIGH_THRESH: u32 = LUT_LOW_THRESH + LUT_ADC_STEP_SIZE as u32;

// Gain (scaled by 65536 / 4096 mV for Vref) and offset in mV, per unit and
// attenuation.
const TP_ATTEN_SCALE: [[i64; 4]; 2] = [
    [65504, 86975, 120389, 224310],
    [65467, 86861, 120416, 224708],
];
const TP_ATTEN_OFFSET: [[i64; 4]; 2] = [[0, 1, 27, 54], [0, 9, 26, 66]];
const VREF_ATTEN_SCALE: [[i64; 4]; 2] = [
    [57431, 76236, 105481, 196602],
    [57236, 76175, 105678, 197170],
];
const VREF_ATTEN_OFFSET: [[i64; 4]; 2] = [[75, 78, 107, 142], [63, 66, 89, 128]];

/// Raw readings of the non-linear 11dB region at a reference voltage of
/// 1000 mV (`low_vref_curve`) and 1200 mV (`high_vref_curve`), starting at
/// 2880 in steps of 64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTable {
    /// Voltages at the low reference voltage.
    pub low_vref_curve: [u32; LUT_POINTS],
    /// Voltages at the high reference voltage.
    pub high_vref_curve: [u32; LUT_POINTS],
}

static LUT_ADC1: LookupTable = LookupTable {
    low_vref_curve: [
        2240, 2297, 2352, 2405, 2457, 2512, 2564, 2616, 2664, 2709, 2754, 2795, 2832, 2868, 2903,
        2937, 2969, 3000, 3030, 3060,
    ],
    high_vref_curve: [
        2667, 2706, 2745, 2780, 2813, 2844, 2873, 2901, 2928, 2956, 2982, 3006, 3032, 3059, 3084,
        3110, 3135, 3160, 3184, 3209,
    ],
};

static LUT_ADC2: LookupTable = LookupTable {
    low_vref_curve: [
        2238, 2293, 2347, 2399, 2451, 2507, 2561, 2613, 2662, 2710, 2754, 2796, 2835, 2872, 2908,
        2942, 2975, 3007, 3039, 3069,
    ],
    high_vref_curve: [
        2657, 2698, 2738, 2774, 2807, 2838, 2867, 2894, 2921, 2946, 2971, 2997, 3022, 3048, 3074,
        3100, 3125, 3150, 3174, 3198,
    ],
};

impl LookupTable {
    /// Bilinear interpolation between the two curves (by `vref`) and the two
    /// bracketing points (by `reading`).
    fn voltage(&self, reading: u32, vref: u32) -> i64 {
        let i = ((reading - LUT_LOW_THRESH) as i64 / LUT_ADC_STEP_SIZE) as usize;
        let i = i.min(LUT_POINTS - 2);

        let vref = vref as i64;
        let reading = reading as i64;
        let low_thresh = LUT_LOW_THRESH as i64;

        let x2dist = LUT_VREF_HIGH - vref;
        let x1dist = vref - LUT_VREF_LOW;
        let y2dist = (i as i64 + 1) * LUT_ADC_STEP_SIZE + low_thresh - reading;
        let y1dist = reading - (i as i64 * LUT_ADC_STEP_SIZE + low_thresh);

        let q11 = self.low_vref_curve[i] as i64;
        let q12 = self.low_vref_curve[i + 1] as i64;
        let q21 = self.high_vref_curve[i] as i64;
        let q22 = self.high_vref_curve[i + 1] as i64;

        let area = (LUT_VREF_HIGH - LUT_VREF_LOW) * LUT_ADC_STEP_SIZE;
        let voltage = q11 * x2dist * y2dist
            + q21 * x1dist * y2dist
            + q12 * x2dist * y1dist
            + q22 * x1dist * y1dist;

        (voltage + area / 2) / area
    }
}

/// Interpolate between `y1` at 0 and `y2` at `step`, rounded.
fn interpolate_two_points(y1: i64, y2: i64, step: i64, x: i64) -> i64 {
    (y1 * step + y2 * x - y1 * x + step / 2) / step
}

/// Two-point, Vref and lookup table calibration of the ESP32.
#[derive(Debug, Clone, Copy, Default)]
pub struct Esp32Scheme;

impl Esp32Scheme {
    fn two_point(unit: AdcUnit, atten: Attenuation, low: u32, high: u32) -> (Gain, Offset) {
        let (u, a) = (unit.index(), atten.index());
        let (low, high) = (low as i64, high as i64);

        // burned values keep high above 2244 and low below 674
        let delta_x = high - low;
        let delta_v = TP_HIGH_MV - TP_LOW_MV;

        let coeff_a = (delta_v * TP_ATTEN_SCALE[u][a] + delta_x / 2) / delta_x;
        let coeff_b = TP_HIGH_MV - (delta_v * high + delta_x / 2) / delta_x + TP_ATTEN_OFFSET[u][a];

        (Gain::from_raw(coeff_a), Offset::from_int(coeff_b))
    }

    fn vref(unit: AdcUnit, atten: Attenuation, vref: u32) -> (Gain, Offset) {
        let (u, a) = (unit.index(), atten.index());

        let coeff_a = vref as i64 * VREF_ATTEN_SCALE[u][a] / VREF_DIVISOR;
        let coeff_b = VREF_ATTEN_OFFSET[u][a];

        (Gain::from_raw(coeff_a), Offset::from_int(coeff_b))
    }

    fn linear(chars: &Characteristics, reading: u32) -> i64 {
        chars.coeff_a.mul_round(reading as i64) + chars.coeff_b.to_int()
    }
}

impl CalibrationScheme for Esp32Scheme {
    fn check_efuse<S: EfuseStore>(
        &self,
        efuse: &Efuse<S>,
        source: CalibrationSource,
    ) -> Result<(), Error> {
        let burned = match source {
            CalibrationSource::EfuseTwoPoint => fuses::two_point_burned(efuse),
            CalibrationSource::EfuseVref => fuses::vref_burned(efuse),
            CalibrationSource::DefaultVref => true,
        };

        if burned {
            Ok(())
        } else {
            Err(Error::NotSupported)
        }
    }

    fn characterize<S: EfuseStore>(
        &self,
        efuse: &Efuse<S>,
        unit: AdcUnit,
        atten: Attenuation,
        resolution: Resolution,
        default_vref: u32,
        config: &CalibrationConfig,
    ) -> Result<Characteristics, Error> {
        let two_point =
            config.allows(CalibrationSource::EfuseTwoPoint) && fuses::two_point_burned(efuse);
        let efuse_vref = config.allows(CalibrationSource::EfuseVref) && fuses::vref_burned(efuse);

        let vref = if efuse_vref {
            fuses::read_vref(efuse)
        } else {
            default_vref
        };

        let (source, (coeff_a, coeff_b)) = if two_point {
            let (low, high) = fuses::read_two_point(efuse, unit);
            debug!("two-point readings {} / {}", low, high);
            (
                CalibrationSource::EfuseTwoPoint,
                Self::two_point(unit, atten, low, high),
            )
        } else if efuse_vref {
            debug!("eFuse Vref {} mV", vref);
            (CalibrationSource::EfuseVref, Self::vref(unit, atten, vref))
        } else if config.allows(CalibrationSource::DefaultVref) {
            debug!("default Vref {} mV", vref);
            (CalibrationSource::DefaultVref, Self::vref(unit, atten, vref))
        } else {
            error!("no calibration source for {:?}", unit);
            return Err(Error::NoCalibrationSource);
        };

        let correction = if config.lut && atten == Attenuation::_11dB {
            Correction::Lut(match unit {
                AdcUnit::Adc1 => &LUT_ADC1,
                AdcUnit::Adc2 => &LUT_ADC2,
            })
        } else {
            Correction::None
        };

        Ok(Characteristics::new(
            ChipVariant::Esp32,
            unit,
            atten,
            resolution,
            source,
            coeff_a,
            coeff_b,
        )
        .with_vref(vref)
        .with_correction(correction))
    }

    fn raw_to_voltage(&self, chars: &Characteristics, reading: u32) -> u32 {
        let voltage = match chars.correction {
            Correction::Lut(lut) if reading >= LUT_LOW_THRESH => {
                let lut_voltage = lut.voltage(reading, chars.vref);
                if reading <= LUT_HIGH_THRESH {
                    // blend across the first step to avoid a jump at the
                    // threshold
                    interpolate_two_points(
                        Self::linear(chars, reading),
                        lut_voltage,
                        LUT_ADC_STEP_SIZE,
                        (reading - LUT_LOW_THRESH) as i64,
                    )
                } else {
                    lut_voltage
                }
            }
            _ => Self::linear(chars, reading),
        };

        voltage.max(0) as u32
    }

    fn init_code<S: EfuseStore>(
        &self,
        _efuse: &Efuse<S>,
        _unit: AdcUnit,
        _atten: Attenuation,
    ) -> Option<u16> {
        None
    }
}
