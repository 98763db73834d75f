use std::path::PathBuf;

use anyhow::{ensure, Result};
use clap::{Args, Parser};
use esp_adc_cal::{efuse::Efuse, ChipVariant};
use xtask::EfuseDump;

// ----------------------------------------------------------------------------
// Command-line Interface

#[derive(Debug, Parser)]
enum Cli {
    /// Print the ADC calibration found in an eFuse dump.
    AdcInfo(AdcInfoArgs),
}

#[derive(Debug, Args)]
struct AdcInfoArgs {
    /// TOML eFuse dump to read.
    dump: PathBuf,
    /// Override the chip named in the dump.
    #[arg(long)]
    chip: Option<ChipVariant>,
    /// Reference voltage in mV used when the dump has none.
    #[arg(long, default_value_t = 1100)]
    default_vref: u32,
    /// Also convert this raw reading with every characterization.
    #[arg(long)]
    raw: Option<u32>,
}

// ----------------------------------------------------------------------------
// Application

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_module("xtask", log::LevelFilter::Info)
        .filter_module("esp_adc_cal", log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    match Cli::parse() {
        Cli::AdcInfo(args) => adc_info(args),
    }
}

// ----------------------------------------------------------------------------
// Subcommands

fn adc_info(args: AdcInfoArgs) -> Result<()> {
    let dump = EfuseDump::load(&args.dump)?;
    let chip = match args.chip {
        Some(chip) => chip,
        None => dump.chip()?,
    };

    if let Some(raw) = args.raw {
        let max = chip.canonical_resolution().max_value();
        ensure!(raw <= max, "Raw reading {} exceeds {} for {}", raw, max, chip);
    }

    log::info!("Reading calibration of {} from {}", chip, args.dump.display());

    let efuse = Efuse::new(dump.image()?);
    print!("{}", xtask::report(chip, &efuse, args.default_vref, args.raw)?);

    Ok(())
}
