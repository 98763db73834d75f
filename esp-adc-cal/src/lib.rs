//! ADC calibration for Espressif devices.
//!
//! ## Overview
//!
//! Every chip leaves the factory with measurements of its ADC burned into
//! eFuse. This crate reads them through an [`efuse::EfuseStore`], derives the
//! [`Characteristics`] of an ADC unit at a given attenuation, and converts raw
//! readings into millivolts.
//!
//! The eFuse layout and the math differ between chip generations;
//! [`ChipVariant`] selects the scheme at runtime, while the chip features
//! only pick the default returned by [`ChipVariant::target`]. Nothing here
//! touches hardware directly: sampling goes through an [`AdcDriver`], and
//! eFuse can be read from memory ([`efuse::MappedEfuse`]) or from an image
//! ([`efuse::EfuseImage`]).
//!
//! ## Feature Flags
#![doc = document_features::document_features!()]
#![doc(html_logo_url = "https://avatars.githubusercontent.com/u/46717278")]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

// MUST be the first module
mod fmt;

pub mod adc;
pub mod calibration;
pub mod chip;
pub mod efuse;

pub use self::{
    adc::{AdcDriver, AdcUnit, Attenuation, Resolution},
    calibration::{
        characterize,
        check_efuse,
        get_voltage,
        init_code,
        raw_to_voltage,
        CalibrationConfig,
        CalibrationSource,
        Characteristics,
        Correction,
        Error,
    },
    chip::ChipVariant,
};
