use std::{collections::BTreeMap, fmt::Write as _, fs, path::Path, str::FromStr};

use anyhow::{bail, ensure, Context, Result};
use esp_adc_cal::{
    characterize,
    check_efuse,
    efuse::{Efuse, EfuseBlock, EfuseImage, EfuseStore, BLOCK_WORDS},
    init_code,
    AdcUnit,
    Attenuation,
    CalibrationConfig,
    ChipVariant,
};
use strum::IntoEnumIterator;

/// eFuse contents as read from a device, e.g. with `espefuse.py dump`.
///
/// ```toml
/// chip = "esp32"
///
/// [blocks]
/// block0 = [0, 0, 0, 0x0000_4000, 0x0000_0300]
/// block3 = [0, 0, 0, 0x0a04_0f83]
/// ```
#[derive(Debug, serde::Deserialize)]
pub struct EfuseDump {
    chip: String,
    #[serde(default)]
    blocks: BTreeMap<String, Vec<u32>>,
}

impl EfuseDump {
    /// Load a dump from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let dump = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;

        Self::parse(&dump).with_context(|| format!("Invalid eFuse dump {}", path.display()))
    }

    /// Parse a dump from TOML.
    pub fn parse(dump: &str) -> Result<Self> {
        Ok(basic_toml::from_str(dump)?)
    }

    /// The chip the dump was taken from.
    pub fn chip(&self) -> Result<ChipVariant> {
        ChipVariant::from_str(&self.chip)
            .map_err(|_| anyhow::anyhow!("Unknown chip '{}'", self.chip))
    }

    /// Assemble the blocks into an image.
    pub fn image(&self) -> Result<EfuseImage> {
        let mut image = EfuseImage::new();

        for (name, words) in &self.blocks {
            let block = parse_block(name)?;
            ensure!(
                words.len() <= BLOCK_WORDS,
                "'{}' has {} words, a block has {}",
                name,
                words.len(),
                BLOCK_WORDS
            );

            for (word, value) in words.iter().enumerate() {
                image.set_word(block, word, *value);
            }
        }

        Ok(image)
    }
}

fn parse_block(name: &str) -> Result<EfuseBlock> {
    let Some(index) = name.strip_prefix("block") else {
        bail!("Unknown block '{}', expected e.g. 'block2'", name);
    };
    let index: u8 = index
        .parse()
        .with_context(|| format!("Unknown block '{}'", name))?;

    EfuseBlock::from_repr(index).with_context(|| format!("No block {} on the chip", index))
}

/// Summary of the calibration data found in `efuse`, and the
/// characterization of every unit at every attenuation.
///
/// With `raw`, each characterization also converts that reading.
pub fn report<S: EfuseStore>(
    chip: ChipVariant,
    efuse: &Efuse<S>,
    default_vref: u32,
    raw: Option<u32>,
) -> Result<String> {
    let mut out = String::new();
    let config = CalibrationConfig::default();

    writeln!(out, "chip: {}", chip)?;
    for source in CalibrationConfig::all().sources {
        let status = match check_efuse(chip, efuse, source) {
            Ok(()) => "available".to_string(),
            Err(e) => e.to_string(),
        };
        writeln!(out, "{:?}: {}", source, status)?;
    }

    for unit in AdcUnit::iter() {
        for atten in Attenuation::iter() {
            write!(out, "{:?} {:?}: ", unit, atten)?;

            let chars = match characterize(
                chip,
                efuse,
                unit,
                atten,
                chip.canonical_resolution(),
                default_vref,
                &config,
            ) {
                Ok(chars) => chars,
                Err(e) => {
                    log::warn!("{:?} {:?} not characterized: {}", unit, atten, e);
                    writeln!(out, "{}", e)?;
                    continue;
                }
            };

            write!(
                out,
                "{:?}, coeff_a {:?}, coeff_b {:?}",
                chars.source(),
                chars.coeff_a(),
                chars.coeff_b()
            )?;
            if chars.vref() != 0 {
                write!(out, ", vref {} mV", chars.vref())?;
            }
            if let Some(code) = init_code(chip, efuse, unit, atten) {
                write!(out, ", init code {}", code)?;
            }
            if let Some(raw) = raw {
                write!(out, ", {} -> {} mV", raw, chars.raw_to_voltage(raw))?;
            }
            writeln!(out)?;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_dump() {
        let dump = EfuseDump::parse(
            r#"
            chip = "esp32s3"

            [blocks]
            block2 = [0, 0, 0, 0, 1]
            "#,
        )
        .unwrap();

        assert_eq!(dump.chip().unwrap(), ChipVariant::Esp32s3);
        let image = dump.image().unwrap();
        assert_eq!(image.read_word(EfuseBlock::Block2, 4), 1);
        assert_eq!(image.read_word(EfuseBlock::Block3, 4), 0);
    }

    #[test]
    fn rejects_bad_dumps() {
        let bad_chip = EfuseDump::parse("chip = \"esp8266\"").unwrap();
        assert!(bad_chip.chip().is_err());

        let bad_block = EfuseDump::parse("chip = \"esp32\"\n[blocks]\nblock11 = [1]").unwrap();
        assert!(bad_block.image().is_err());

        let too_long = EfuseDump::parse("chip = \"esp32\"\n[blocks]\nblock1 = [0,0,0,0,0,0,0,0,0]")
            .unwrap();
        assert!(too_long.image().is_err());
    }

    #[test]
    fn reports_every_unit_and_attenuation() {
        let dump = EfuseDump::parse("chip = \"esp32\"").unwrap();
        let efuse = Efuse::new(dump.image().unwrap());

        let report = report(dump.chip().unwrap(), &efuse, 1100, Some(2048)).unwrap();

        assert!(report.starts_with("chip: esp32\n"));
        assert!(report.contains("EfuseTwoPoint: Calibration source not supported"));
        assert_eq!(report.matches(" -> ").count(), 8);
    }
}
