//! ADC calibration eFuse fields for the ESP32-S3.
//!
//! Calibration readings are stored as chained deltas: the 11dB value is
//! relative to a fixed base, each lower attenuation is relative to the one
//! above it, and ADC2 is relative to ADC1.

use super::{Efuse, EfuseBlock, EfuseField, EfuseStore, Encoding};
use crate::adc::{AdcUnit, Attenuation};

/// `[]` BLK_VERSION_MAJOR of BLOCK2 {0: "No calib"; 1: "ADC calib V1"}
pub const BLK_VERSION_MAJOR: EfuseField = EfuseField::new(EfuseBlock::Block2, 128, 2);
/// `[]` ADC1 init code at atten0
pub const ADC1_INIT_CODE_ATTEN0: EfuseField = EfuseField::new(EfuseBlock::Block2, 149, 8);
/// `[]` ADC1 init code at atten1
pub const ADC1_INIT_CODE_ATTEN1: EfuseField = EfuseField::new(EfuseBlock::Block2, 157, 6);
/// `[]` ADC1 init code at atten2
pub const ADC1_INIT_CODE_ATTEN2: EfuseField = EfuseField::new(EfuseBlock::Block2, 163, 6);
/// `[]` ADC1 init code at atten3
pub const ADC1_INIT_CODE_ATTEN3: EfuseField = EfuseField::new(EfuseBlock::Block2, 169, 6);
/// `[]` ADC2 init code at atten0
pub const ADC2_INIT_CODE_ATTEN0: EfuseField = EfuseField::new(EfuseBlock::Block2, 175, 8);
/// `[]` ADC2 init code at atten1
pub const ADC2_INIT_CODE_ATTEN1: EfuseField = EfuseField::new(EfuseBlock::Block2, 183, 6);
/// `[]` ADC2 init code at atten2
pub const ADC2_INIT_CODE_ATTEN2: EfuseField = EfuseField::new(EfuseBlock::Block2, 189, 6);
/// `[]` ADC2 init code at atten3
pub const ADC2_INIT_CODE_ATTEN3: EfuseField = EfuseField::new(EfuseBlock::Block2, 195, 6);
/// `[]` ADC1 calibration voltage at atten0
pub const ADC1_CAL_VOL_ATTEN0: EfuseField = EfuseField::new(EfuseBlock::Block2, 201, 8);
/// `[]` ADC1 calibration voltage at atten1
pub const ADC1_CAL_VOL_ATTEN1: EfuseField = EfuseField::new(EfuseBlock::Block2, 209, 8);
/// `[]` ADC1 calibration voltage at atten2
pub const ADC1_CAL_VOL_ATTEN2: EfuseField = EfuseField::new(EfuseBlock::Block2, 217, 8);
/// `[]` ADC1 calibration voltage at atten3
pub const ADC1_CAL_VOL_ATTEN3: EfuseField = EfuseField::new(EfuseBlock::Block2, 225, 8);
/// `[]` ADC2 calibration voltage at atten0
pub const ADC2_CAL_VOL_ATTEN0: EfuseField = EfuseField::new(EfuseBlock::Block2, 233, 8);
/// `[]` ADC2 calibration voltage at atten1
pub const ADC2_CAL_VOL_ATTEN1: EfuseField = EfuseField::new(EfuseBlock::Block2, 241, 7);
/// `[]` ADC2 calibration voltage at atten2
pub const ADC2_CAL_VOL_ATTEN2: EfuseField = EfuseField::new(EfuseBlock::Block2, 248, 7);
/// `[]` ADC2 calibration voltage at atten3
pub const ADC2_CAL_VOL_ATTEN3: EfuseField = EfuseField::new(EfuseBlock::Block1, 186, 6);

/// The only calibration version the S3 has shipped with.
pub const SUPPORTED_VERSION: u8 = 1;

/// Voltage applied while every calibration reading was taken, in mV.
pub const CAL_VOL_EXPECTED_MV: u32 = 850;

const INIT_CODE: [[EfuseField; 4]; 2] = [
    [
        ADC1_INIT_CODE_ATTEN0,
        ADC1_INIT_CODE_ATTEN1,
        ADC1_INIT_CODE_ATTEN2,
        ADC1_INIT_CODE_ATTEN3,
    ],
    [
        ADC2_INIT_CODE_ATTEN0,
        ADC2_INIT_CODE_ATTEN1,
        ADC2_INIT_CODE_ATTEN2,
        ADC2_INIT_CODE_ATTEN3,
    ],
];

const CAL_VOL: [[EfuseField; 4]; 2] = [
    [
        ADC1_CAL_VOL_ATTEN0,
        ADC1_CAL_VOL_ATTEN1,
        ADC1_CAL_VOL_ATTEN2,
        ADC1_CAL_VOL_ATTEN3,
    ],
    [
        ADC2_CAL_VOL_ATTEN0,
        ADC2_CAL_VOL_ATTEN1,
        ADC2_CAL_VOL_ATTEN2,
        ADC2_CAL_VOL_ATTEN3,
    ],
];

/// Calibration version burned into the chip.
pub fn calibration_version<S: EfuseStore>(efuse: &Efuse<S>) -> u8 {
    efuse.read_field(BLK_VERSION_MAJOR) as u8
}

/// Init (offset) codes of `unit` for every attenuation.
pub fn read_init_codes<S: EfuseStore>(efuse: &Efuse<S>, unit: AdcUnit) -> [u32; 4] {
    let diff = INIT_CODE[unit.index()].map(|field| efuse.read_field(field));

    let mut code = [0; 4];
    match unit {
        AdcUnit::Adc1 => {
            code[0] = diff[0] + 1850;
            code[1] = diff[1] + code[0] + 90;
            code[2] = diff[2] + code[1];
            code[3] = diff[3] + code[2] + 70;
        }
        AdcUnit::Adc2 => {
            code[0] = diff[0] + 2020;
            code[1] = diff[1] + code[0];
            code[2] = diff[2] + code[1];
            code[3] = diff[3] + code[2];
        }
    }
    code
}

/// Init (offset) code of `unit` at `atten`.
pub fn read_init_code<S: EfuseStore>(efuse: &Efuse<S>, unit: AdcUnit, atten: Attenuation) -> u32 {
    read_init_codes(efuse, unit)[atten.index()]
}

/// Digital outputs of `unit` at 850 mV for every attenuation.
pub fn read_cal_digis<S: EfuseStore>(efuse: &Efuse<S>, unit: AdcUnit) -> [i32; 4] {
    let read = |fields: [EfuseField; 4]| {
        fields.map(|f| efuse.read_signed(f, Encoding::SignMagnitude))
    };
    let adc1_diff = read(CAL_VOL[0]);

    let mut adc1 = [0; 4];
    adc1[3] = adc1_diff[3] + 900;
    adc1[2] = adc1_diff[2] + adc1[3] + 800;
    adc1[1] = adc1_diff[1] + adc1[2] + 700;
    adc1[0] = adc1_diff[0] + adc1[1] + 800;

    if unit == AdcUnit::Adc1 {
        return adc1;
    }

    let adc2_diff = read(CAL_VOL[1]);
    [
        adc1[0] - adc2_diff[0] + 40,
        adc1[1] - adc2_diff[1] + 10,
        adc1[2] - adc2_diff[2] + 20,
        adc1[3] - adc2_diff[3] + 15,
    ]
}

/// The (digital output, voltage in mV) reference pair of `unit` at `atten`.
pub fn read_cal_voltage<S: EfuseStore>(
    efuse: &Efuse<S>,
    unit: AdcUnit,
    atten: Attenuation,
) -> (u32, u32) {
    let digi = read_cal_digis(efuse, unit)[atten.index()];
    (digi.max(0) as u32, CAL_VOL_EXPECTED_MV)
}
