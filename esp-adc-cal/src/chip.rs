//! Chip variants and the ADC properties that differ between them.

use crate::adc::{AdcUnit, Resolution};

/// An Espressif chip with ADC calibration support.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[strum(serialize_all = "lowercase")]
pub enum ChipVariant {
    /// ESP32: two-point or Vref calibration, with a lookup table for the
    /// non-linear 11dB region.
    Esp32,
    /// ESP32-S2: versioned two-point calibration.
    Esp32s2,
    /// ESP32-C3: single reference point with curve fitting.
    Esp32c3,
    /// ESP32-S3: single reference point with curve fitting.
    Esp32s3,
}

macro_rules! assert_unique_features {
    () => {};

    ( $first:tt $(,$rest:tt)* ) => {
        $(
            #[cfg(all(feature = $first, feature = $rest))]
            compile_error!(concat!(
                "Features \"", $first, "\" and \"", $rest, "\" cannot be used together"
            ));
        )*
        assert_unique_features!($($rest),*);
    };
}

assert_unique_features!("esp32", "esp32s2", "esp32c3", "esp32s3");

cfg_if::cfg_if! {
    if #[cfg(feature = "esp32")] {
        const TARGET: Option<ChipVariant> = Some(ChipVariant::Esp32);
    } else if #[cfg(feature = "esp32s2")] {
        const TARGET: Option<ChipVariant> = Some(ChipVariant::Esp32s2);
    } else if #[cfg(feature = "esp32c3")] {
        const TARGET: Option<ChipVariant> = Some(ChipVariant::Esp32c3);
    } else if #[cfg(feature = "esp32s3")] {
        const TARGET: Option<ChipVariant> = Some(ChipVariant::Esp32s3);
    } else {
        const TARGET: Option<ChipVariant> = None;
    }
}

impl ChipVariant {
    /// The chip selected with a chip feature, if any.
    pub const fn target() -> Option<Self> {
        TARGET
    }

    /// Lower-case chip name, e.g. `esp32s3`.
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Number of input channels of `unit`.
    pub const fn channel_count(self, unit: AdcUnit) -> u8 {
        match (self, unit) {
            (ChipVariant::Esp32, AdcUnit::Adc1) => 8,
            (ChipVariant::Esp32, AdcUnit::Adc2) => 10,
            (ChipVariant::Esp32c3, AdcUnit::Adc1) => 5,
            (ChipVariant::Esp32c3, AdcUnit::Adc2) => 1,
            (ChipVariant::Esp32s2 | ChipVariant::Esp32s3, _) => 10,
        }
    }

    /// Resolution every reading is normalized to before conversion.
    pub const fn canonical_resolution(self) -> Resolution {
        match self {
            ChipVariant::Esp32s2 => Resolution::Resolution13Bit,
            _ => Resolution::Resolution12Bit,
        }
    }

    /// Resolutions calibration can be characterized for.
    pub const fn supported_resolutions(self) -> &'static [Resolution] {
        match self {
            ChipVariant::Esp32 => &[
                Resolution::Resolution9Bit,
                Resolution::Resolution10Bit,
                Resolution::Resolution11Bit,
                Resolution::Resolution12Bit,
            ],
            ChipVariant::Esp32s2 => &[Resolution::Resolution13Bit],
            ChipVariant::Esp32c3 | ChipVariant::Esp32s3 => &[Resolution::Resolution12Bit],
        }
    }

    /// Whether `resolution` is one of [`Self::supported_resolutions`].
    pub fn supports(self, resolution: Resolution) -> bool {
        self.supported_resolutions().contains(&resolution)
    }
}
