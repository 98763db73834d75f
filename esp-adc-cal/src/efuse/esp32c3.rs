//! ADC calibration eFuse fields for the ESP32-C3.

use super::{Efuse, EfuseBlock, EfuseField, EfuseStore, Encoding};
use crate::adc::Attenuation;

/// `[]` BLK_VERSION_MAJOR of BLOCK2 {0: "No calib"; 1: "ADC calib V1"}
pub const BLK_VERSION_MAJOR: EfuseField = EfuseField::new(EfuseBlock::Block2, 128, 2);
/// `[]` ADC1 init code at atten0
pub const ADC1_INIT_CODE_ATTEN0: EfuseField = EfuseField::new(EfuseBlock::Block2, 148, 10);
/// `[]` ADC1 init code at atten1
pub const ADC1_INIT_CODE_ATTEN1: EfuseField = EfuseField::new(EfuseBlock::Block2, 158, 10);
/// `[]` ADC1 init code at atten2
pub const ADC1_INIT_CODE_ATTEN2: EfuseField = EfuseField::new(EfuseBlock::Block2, 168, 10);
/// `[]` ADC1 init code at atten3
pub const ADC1_INIT_CODE_ATTEN3: EfuseField = EfuseField::new(EfuseBlock::Block2, 178, 10);
/// `[]` ADC1 calibration voltage at atten0
pub const ADC1_CAL_VOL_ATTEN0: EfuseField = EfuseField::new(EfuseBlock::Block2, 188, 10);
/// `[]` ADC1 calibration voltage at atten1
pub const ADC1_CAL_VOL_ATTEN1: EfuseField = EfuseField::new(EfuseBlock::Block2, 198, 10);
/// `[]` ADC1 calibration voltage at atten2
pub const ADC1_CAL_VOL_ATTEN2: EfuseField = EfuseField::new(EfuseBlock::Block2, 208, 10);
/// `[]` ADC1 calibration voltage at atten3
pub const ADC1_CAL_VOL_ATTEN3: EfuseField = EfuseField::new(EfuseBlock::Block2, 218, 10);

/// The only calibration version the C3 has shipped with.
pub const SUPPORTED_VERSION: u8 = 1;

const INIT_CODE: [EfuseField; 4] = [
    ADC1_INIT_CODE_ATTEN0,
    ADC1_INIT_CODE_ATTEN1,
    ADC1_INIT_CODE_ATTEN2,
    ADC1_INIT_CODE_ATTEN3,
];

const CAL_VOL: [EfuseField; 4] = [
    ADC1_CAL_VOL_ATTEN0,
    ADC1_CAL_VOL_ATTEN1,
    ADC1_CAL_VOL_ATTEN2,
    ADC1_CAL_VOL_ATTEN3,
];

/// Voltage applied while the calibration reading was taken, per attenuation.
pub const CAL_VOL_EXPECTED_MV: [u32; 4] = [400, 550, 750, 1370];

const INIT_CODE_BASE: u32 = 1000;
const CAL_DIGI_BASE: i32 = 2000;

/// Calibration version burned into the chip.
pub fn calibration_version<S: EfuseStore>(efuse: &Efuse<S>) -> u8 {
    efuse.read_field(BLK_VERSION_MAJOR) as u8
}

/// ADC1 init (offset) code for `atten`.
pub fn read_init_code<S: EfuseStore>(efuse: &Efuse<S>, atten: Attenuation) -> u32 {
    efuse.read_field(INIT_CODE[atten.index()]) + INIT_CODE_BASE
}

/// The (digital output, voltage in mV) reference pair of ADC1 at `atten`.
pub fn read_cal_voltage<S: EfuseStore>(efuse: &Efuse<S>, atten: Attenuation) -> (u32, u32) {
    let diff = efuse.read_signed(CAL_VOL[atten.index()], Encoding::SignMagnitude);
    let digi = (CAL_DIGI_BASE + diff) as u32;

    (digi, CAL_VOL_EXPECTED_MV[atten.index()])
}
