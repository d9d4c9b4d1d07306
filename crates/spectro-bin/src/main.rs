//! `spectro` command-line tool.
//!
//! ```bash
//! spectro models
//! spectro probe --config spectro.toml
//! spectro spectrum --config spectro.toml --device bench --integration-us 100000
//! ```
//!
//! Log verbosity follows `RUST_LOG`.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use spectro_core::error::SpectroResult;
use spectro_core::error_recovery::{with_retry, RetryPolicy};
use spectro_core::family::FeatureFamily;
use spectro_devices::config::SpectroConfig;
use spectro_devices::{load_config, models, Device, DeviceRegistry};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

#[derive(Parser)]
#[command(name = "spectro")]
#[command(about = "Query and drive spectrometers over USB, RS-232 and Ethernet", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in models and what they expose on each bus
    Models,

    /// Open every configured device and report identity and state
    Probe {
        /// Device configuration file (TOML)
        #[arg(long)]
        config: PathBuf,
    },

    /// Acquire one spectrum from a configured device
    Spectrum {
        /// Device configuration file (TOML)
        #[arg(long)]
        config: PathBuf,

        /// Device id from the configuration
        #[arg(long)]
        device: String,

        /// Integration time to set first, in µs
        #[arg(long)]
        integration_us: Option<u32>,

        /// Extra attempts after a timed-out or busy acquisition
        #[arg(long, default_value = "2")]
        retries: u32,
    },

    /// Open every catalog model found on USB
    #[cfg(feature = "usb")]
    Discover {
        /// Optional configuration file supplying timeouts
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Models => {
            list_models();
            Ok(())
        }
        Commands::Probe { config } => probe(&read_config(&config)?),
        Commands::Spectrum {
            config,
            device,
            integration_us,
            retries,
        } => {
            let policy = RetryPolicy {
                max_attempts: retries,
                backoff_delay: Duration::from_millis(200),
                multiplier: 2.0,
            };
            spectrum(&read_config(&config)?, &device, integration_us, &policy)
        }
        #[cfg(feature = "usb")]
        Commands::Discover { config } => discover(config),
    }
}

fn read_config(path: &Path) -> Result<SpectroConfig> {
    load_config(path).with_context(|| format!("loading {}", path.display()))
}

fn list_models() {
    for model in models::ALL {
        let table = model.capability_table();
        println!("{}", model.name);
        if let Some(usb) = model.usb {
            println!("  USB id {:04x}:{:04x}", models::VENDOR_ID, usb.product_id);
        }
        for bus in table.buses() {
            let features: Vec<String> = table
                .features_on(bus)
                .into_iter()
                .map(|feature| {
                    let protocols: Vec<&str> = table
                        .protocols_for(feature, bus)
                        .iter()
                        .map(|p| p.label())
                        .collect();
                    format!("{} ({})", feature, protocols.join(", "))
                })
                .collect();
            println!("  {:<9} {}", bus.label(), features.join(", "));
        }
    }
}

fn describe(id: &str, device: &Device) {
    println!("{} [{} over {}]", id, device.name(), device.bus_family());
    match device.serial_number().and_then(|s| s.serial_number()) {
        Ok(serial) => println!("  serial number   {}", serial),
        Err(e) if e.is_capability_probe() => {}
        Err(e) => warn!(id, error = %e, "Serial number query failed"),
    }
    match device.spectrometer().and_then(|s| s.integration_time_micros()) {
        Ok(micros) => println!("  integration     {} µs", micros),
        Err(e) => warn!(id, error = %e, "Integration time query failed"),
    }
    if !device.features(FeatureFamily::ThermoElectric).is_empty() {
        match device.thermo_electric().and_then(|t| t.temperature_celsius()) {
            Ok(celsius) => println!("  detector        {:.1} °C", celsius),
            Err(e) => warn!(id, error = %e, "TEC temperature query failed"),
        }
    }
}

fn probe(config: &SpectroConfig) -> Result<()> {
    let registry = DeviceRegistry::from_config(config);
    if registry.is_empty() {
        return Err(anyhow!("none of the {} configured devices opened", config.devices.len()));
    }
    for info in registry.list_devices() {
        if let Some(device) = registry.get(&info.id) {
            describe(&info.id, &device);
        }
    }
    Ok(())
}

/// One formatted spectrum, retrying timeouts and busy buses per `policy`.
fn acquire(device: &Device, policy: &RetryPolicy) -> SpectroResult<Vec<f64>> {
    with_retry(policy, "spectrum", || {
        device.spectrometer()?.request_formatted_spectrum()
    })
}

fn spectrum(
    config: &SpectroConfig,
    id: &str,
    integration_us: Option<u32>,
    policy: &RetryPolicy,
) -> Result<()> {
    let entry = config
        .device(id)
        .ok_or_else(|| anyhow!("no device '{}' in configuration", id))?;
    let device = spectro_devices::open_device(entry, &config.timeouts)
        .with_context(|| format!("opening '{}'", id))?;
    let spectrometer = device.spectrometer()?;
    if let Some(micros) = integration_us {
        spectrometer.set_integration_time_micros(micros)?;
    }
    for (pixel, counts) in acquire(&device, policy)?.iter().enumerate() {
        println!("{}\t{}", pixel, counts);
    }
    device.close()?;
    Ok(())
}

#[cfg(feature = "usb")]
fn discover(config: Option<PathBuf>) -> Result<()> {
    let timeouts = match config {
        Some(path) => read_config(&path)?.timeouts,
        None => Default::default(),
    };
    let devices = spectro_devices::registry::discover_usb(&timeouts)?;
    if devices.is_empty() {
        println!("no known spectrometers on USB");
    }
    for device in &devices {
        describe(device.name(), device);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectro_bus::mock;
    use spectro_core::bus::Bus;
    use spectro_core::family::BusFamily;
    use std::sync::Arc;

    fn ssm100() -> (Device, mock::MockDevice) {
        let (channel, instrument) = mock::pair_on(BusFamily::Rs232);
        let bus = Bus::from_channel(Box::new(channel), Duration::from_millis(100)).unwrap();
        (Device::new(&models::SSM_100, Arc::new(bus)).unwrap(), instrument)
    }

    fn spectrum_frame(pixels: u16) -> Vec<u8> {
        let mut frame = vec![0x04, (pixels * 2) as u8];
        frame.extend((0..pixels).flat_map(|i| i.to_be_bytes()));
        let xor = frame.iter().fold(0u8, |acc, b| acc ^ b);
        frame.push(xor);
        frame
    }

    #[test]
    fn acquisition_retries_after_a_timeout() {
        let (device, instrument) = ssm100();
        // First request goes unanswered, the retry gets a full spectrum.
        instrument.expect_and_respond(&[0x04, 0x00, 0x04], &[]);
        instrument.expect_and_respond(&[0x04, 0x00, 0x04], &spectrum_frame(100));

        let policy = RetryPolicy {
            max_attempts: 1,
            backoff_delay: Duration::from_millis(1),
            multiplier: 1.0,
        };
        let counts = acquire(&device, &policy).unwrap();
        assert_eq!(counts.len(), 100);
        assert_eq!(counts[99], 99.0);
        assert!(instrument.script_done());
    }

    #[test]
    fn acquisition_without_retries_reports_the_timeout() {
        let (device, instrument) = ssm100();
        instrument.expect_and_respond(&[0x04, 0x00, 0x04], &[]);
        let err = acquire(&device, &RetryPolicy::none()).unwrap_err();
        assert!(err.is_transient());
    }
}
