//! ADC calibration eFuse fields for the ESP32-S2.
//!
//! The S2 stores its calibration in BLOCK2 as a table of small signed
//! deltas. Each entry is `raw * multiplier + base`, plus the parsed value of
//! the entry it depends on, so that the wide absolute values only need to be
//! burned once per group.
//!
//! Which entries are meaningful depends on the calibration version burned in
//! [`BLK_VERSION_MINOR`].

use super::{Efuse, EfuseBlock, EfuseField, EfuseStore, Encoding};
use crate::adc::{AdcUnit, Attenuation};

/// `[]` BLK_VERSION_MINOR of BLOCK2 {0: "No calib"; 1: "ADC calib V1"; 2:
/// "ADC calib V2"}
pub const BLK_VERSION_MINOR: EfuseField = EfuseField::new(EfuseBlock::Block2, 132, 3);

/// A calibration quantity stored per (unit, attenuation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibParam {
    /// Version 1: reading at the low reference voltage.
    V1Low,
    /// Version 1: reading at the high reference voltage.
    V1High,
    /// Version 2: reading at the high reference voltage.
    V2High,
    /// Version 2: ADC init (offset) code.
    V2Init,
}

impl CalibParam {
    const fn version(self) -> u8 {
        match self {
            CalibParam::V1Low | CalibParam::V1High => 1,
            CalibParam::V2High | CalibParam::V2Init => 2,
        }
    }

    const fn first_tag(self) -> usize {
        match self {
            CalibParam::V1Low => 1,
            CalibParam::V1High => 9,
            CalibParam::V2High => 17,
            CalibParam::V2Init => 25,
        }
    }
}

const ATTEN_COUNT: usize = 4;

/// One entry of the calibration table.
#[derive(Debug, Clone, Copy)]
pub struct MapInfo {
    /// Where the raw, sign-magnitude value lives.
    pub field: EfuseField,
    /// Scale applied to the raw value.
    pub multiplier: i32,
    /// Added after scaling.
    pub base: i32,
    /// Tag whose parsed value is added on top, 0 for none.
    pub dependency: usize,
}

const fn entry(
    bit_start: u32,
    bit_count: u32,
    multiplier: i32,
    base: i32,
    dependency: usize,
) -> MapInfo {
    MapInfo {
        field: EfuseField::new(EfuseBlock::Block2, bit_start, bit_count),
        multiplier,
        base,
        dependency,
    }
}

/// The calibration table, indexed by tag. Tag 0 is a placeholder.
pub const RAW_MAP: [MapInfo; 34] = [
    MapInfo {
        field: EfuseField::new(EfuseBlock::Block0, 0, 0),
        multiplier: 0,
        base: 0,
        dependency: 0,
    },
    // V1 low: A10L..A23L
    entry(208, 6, 4, 2231, 0),
    entry(214, 6, 4, 1643, 0),
    entry(220, 6, 4, 1290, 0),
    entry(226, 6, 4, 701, 0),
    entry(232, 6, 4, 2305, 0),
    entry(238, 6, 4, 1693, 0),
    entry(244, 6, 4, 1343, 0),
    entry(250, 6, 4, 723, 0),
    // V1 high: A10H..A23H
    entry(144, 8, 4, 5775, 0),
    entry(152, 8, 4, 5693, 0),
    entry(160, 8, 4, 5723, 0),
    entry(168, 8, 4, 6209, 0),
    entry(176, 8, 4, 5817, 0),
    entry(184, 8, 4, 5703, 0),
    entry(192, 8, 4, 5731, 0),
    entry(200, 8, 4, 6157, 0),
    // V2 high: A10H..A23H
    entry(197, 6, 2, 169, 19),
    entry(203, 6, 2, -26, 19),
    entry(209, 9, 2, 126, 22),
    entry(218, 7, 2, 387, 19),
    entry(225, 7, 2, 177, 22),
    entry(232, 10, 2, 5815, 0),
    entry(242, 7, 2, 27, 22),
    entry(249, 7, 2, 410, 22),
    // V2 init: A10I..A23I
    entry(147, 8, 2, 1519, 0),
    entry(155, 6, 2, 88, 25),
    entry(161, 5, 2, 8, 26),
    entry(166, 6, 2, 70, 27),
    entry(172, 8, 2, 1677, 0),
    entry(180, 6, 2, 23, 29),
    entry(186, 5, 2, 6, 30),
    entry(191, 6, 2, 13, 31),
    // temperature sensor
    entry(135, 9, 1, 0, 0),
];

/// Calibration version burned into the chip.
pub fn calibration_version<S: EfuseStore>(efuse: &Efuse<S>) -> u8 {
    efuse.read_field(BLK_VERSION_MINOR) as u8
}

/// Whether `version` is one this crate can decode.
pub const fn version_supported(version: u8) -> bool {
    matches!(version, 1 | 2)
}

/// Tag of `param` for (`unit`, `atten`), if `param` exists in `version`.
pub fn tag(version: u8, unit: AdcUnit, atten: Attenuation, param: CalibParam) -> Option<usize> {
    if param.version() != version {
        return None;
    }

    Some(param.first_tag() + unit.index() * ATTEN_COUNT + atten.index())
}

/// Raw signed value of the entry `tag`.
pub fn raw_value<S: EfuseStore>(efuse: &Efuse<S>, tag: usize) -> i32 {
    match RAW_MAP.get(tag) {
        Some(info) if tag != 0 => efuse.read_signed(info.field, Encoding::SignMagnitude),
        _ => 0,
    }
}

/// Value of the entry `tag` with its dependency chain applied.
pub fn parsed_value<S: EfuseStore>(efuse: &Efuse<S>, tag: usize) -> i32 {
    let mut tag = tag;
    let mut value = 0;

    // dependency chains are acyclic and end at tag 0
    while tag != 0 {
        let Some(info) = RAW_MAP.get(tag) else {
            break;
        };
        value += raw_value(efuse, tag) * info.multiplier + info.base;
        tag = info.dependency;
    }

    value
}

/// Parsed value of `param` for (`unit`, `atten`), if the burned version
/// carries it.
pub fn read_param<S: EfuseStore>(
    efuse: &Efuse<S>,
    unit: AdcUnit,
    atten: Attenuation,
    param: CalibParam,
) -> Option<i32> {
    let version = calibration_version(efuse);
    tag(version, unit, atten, param).map(|tag| parsed_value(efuse, tag))
}
