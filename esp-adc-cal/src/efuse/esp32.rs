//! ADC calibration eFuse fields for the ESP32.

use super::{Efuse, EfuseBlock, EfuseField, EfuseStore, Encoding};
use crate::adc::AdcUnit;

/// `[]` BLOCK3 partially served for ADC calibration data
pub const BLK3_PART_RESERVE: EfuseField = EfuseField::new(EfuseBlock::Block0, 110, 1);
/// `[]` True ADC reference voltage
pub const ADC_VREF: EfuseField = EfuseField::new(EfuseBlock::Block0, 136, 5);
/// `[]` ADC1 Two Point calibration low point. Only valid if
/// BLK3_PART_RESERVE
pub const ADC1_TP_LOW: EfuseField = EfuseField::new(EfuseBlock::Block3, 96, 7);
/// `[]` ADC1 Two Point calibration high point. Only valid if
/// BLK3_PART_RESERVE
pub const ADC1_TP_HIGH: EfuseField = EfuseField::new(EfuseBlock::Block3, 103, 9);
/// `[]` ADC2 Two Point calibration low point. Only valid if
/// BLK3_PART_RESERVE
pub const ADC2_TP_LOW: EfuseField = EfuseField::new(EfuseBlock::Block3, 112, 7);
/// `[]` ADC2 Two Point calibration high point. Only valid if
/// BLK3_PART_RESERVE
pub const ADC2_TP_HIGH: EfuseField = EfuseField::new(EfuseBlock::Block3, 119, 9);

/// Nominal reference voltage the Vref field is relative to, in mV.
pub const VREF_NOMINAL_MV: u32 = 1100;
/// mV per LSB of the Vref field.
pub const VREF_STEP_MV: i32 = 7;

const TP_STEP: i32 = 4;
const TP_LOW_NOMINAL: [u32; 2] = [278, 421];
const TP_HIGH_NOMINAL: [u32; 2] = [3265, 3406];

bitfield::bitfield! {
    /// Word 3 of BLOCK3, holding all four two-point values.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct TwoPointWord(u32);
    impl Debug;
    /// ADC1 reading at 150 mV, two's complement
    pub u32, adc1_tp_low,  _: 6, 0;
    /// ADC1 reading at 850 mV, two's complement
    pub u32, adc1_tp_high, _: 15, 7;
    /// ADC2 reading at 150 mV, two's complement
    pub u32, adc2_tp_low,  _: 22, 16;
    /// ADC2 reading at 850 mV, two's complement
    pub u32, adc2_tp_high, _: 31, 23;
}

impl TwoPointWord {
    /// Read the word from `efuse`.
    pub fn read<S: EfuseStore>(efuse: &Efuse<S>) -> Self {
        Self(efuse.read_field(EfuseField::new(EfuseBlock::Block3, ADC1_TP_LOW.bit_start, 32)))
    }

    fn fields(&self, unit: AdcUnit) -> (u32, u32) {
        match unit {
            AdcUnit::Adc1 => (self.adc1_tp_low(), self.adc1_tp_high()),
            AdcUnit::Adc2 => (self.adc2_tp_low(), self.adc2_tp_high()),
        }
    }

    /// Whether every two-point value has been burned.
    pub fn is_burned(&self) -> bool {
        self.adc1_tp_low() != 0
            && self.adc1_tp_high() != 0
            && self.adc2_tp_low() != 0
            && self.adc2_tp_high() != 0
    }
}

/// Whether two-point values are burned and BLOCK3 is reserved for them.
pub fn two_point_burned<S: EfuseStore>(efuse: &Efuse<S>) -> bool {
    efuse.read_bit(BLK3_PART_RESERVE) && TwoPointWord::read(efuse).is_burned()
}

/// Whether a reference voltage measurement is burned.
pub fn vref_burned<S: EfuseStore>(efuse: &Efuse<S>) -> bool {
    efuse.read_field(ADC_VREF) != 0
}

/// Reference voltage in mV.
pub fn read_vref<S: EfuseStore>(efuse: &Efuse<S>) -> u32 {
    let offset = efuse.read_signed(ADC_VREF, Encoding::SignMagnitude) * VREF_STEP_MV;
    VREF_NOMINAL_MV.saturating_add_signed(offset)
}

/// Raw readings of `unit` at 150 mV and 850 mV, 12-bit at 0dB.
pub fn read_two_point<S: EfuseStore>(efuse: &Efuse<S>, unit: AdcUnit) -> (u32, u32) {
    let (low, high) = TwoPointWord::read(efuse).fields(unit);
    let low = super::decode_signed(low, ADC1_TP_LOW.mask(), Encoding::TwosComplement) * TP_STEP;
    let high = super::decode_signed(high, ADC1_TP_HIGH.mask(), Encoding::TwosComplement) * TP_STEP;

    (
        TP_LOW_NOMINAL[unit.index()].saturating_add_signed(low),
        TP_HIGH_NOMINAL[unit.index()].saturating_add_signed(high),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::efuse::EfuseImage;

    fn burned_image() -> EfuseImage {
        let mut image = EfuseImage::new();
        image.write_field(BLK3_PART_RESERVE, 1);
        image.write_signed(ADC1_TP_LOW, -5, Encoding::TwosComplement);
        image.write_signed(ADC1_TP_HIGH, 12, Encoding::TwosComplement);
        image.write_signed(ADC2_TP_LOW, 3, Encoding::TwosComplement);
        image.write_signed(ADC2_TP_HIGH, -40, Encoding::TwosComplement);
        image.write_signed(ADC_VREF, -4, Encoding::SignMagnitude);
        image
    }

    #[test]
    fn decodes_two_point_values() {
        let efuse = Efuse::new(burned_image());

        assert!(two_point_burned(&efuse));
        assert_eq!(read_two_point(&efuse, AdcUnit::Adc1), (278 - 20, 3265 + 48));
        assert_eq!(read_two_point(&efuse, AdcUnit::Adc2), (421 + 12, 3406 - 160));
    }

    #[test]
    fn two_point_word_splits_fields() {
        let word = TwoPointWord(0xff80_0001);

        assert_eq!(word.adc1_tp_low(), 1);
        assert_eq!(word.adc1_tp_high(), 0);
        assert_eq!(word.adc2_tp_low(), 0);
        assert_eq!(word.adc2_tp_high(), 0x1ff);

        let word = TwoPointWord::read(&Efuse::new(burned_image()));
        assert_eq!(word.adc1_tp_low(), 128 - 5);
        assert_eq!(word.adc1_tp_high(), 12);
        assert_eq!(word.adc2_tp_low(), 3);
        assert_eq!(word.adc2_tp_high(), 512 - 40);
    }

    #[test]
    fn decodes_vref() {
        let efuse = Efuse::new(burned_image());

        assert!(vref_burned(&efuse));
        assert_eq!(read_vref(&efuse), 1100 - 28);
    }

    #[test]
    fn two_point_needs_reserve_bit() {
        let mut image = burned_image();
        image.write_field(BLK3_PART_RESERVE, 0);

        assert!(!two_point_burned(&Efuse::new(image)));
    }

    #[test]
    fn two_point_needs_every_value() {
        let mut image = burned_image();
        image.write_field(ADC2_TP_LOW, 0);

        assert!(!two_point_burned(&Efuse::new(image)));
    }

    #[test]
    fn blank_chip_has_nothing() {
        let efuse = Efuse::new(EfuseImage::new());

        assert!(!two_point_burned(&efuse));
        assert!(!vref_burned(&efuse));
        assert_eq!(read_vref(&efuse), VREF_NOMINAL_MV);
    }
}
