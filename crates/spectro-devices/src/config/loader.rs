//! Configuration loading.
//!
//! Layers, lowest priority first: built-in defaults, the TOML file,
//! `SPECTRO_`-prefixed environment variables. The merged result is checked
//! with `serde_valid` and then against the model catalog.

use super::schema::{SpectroConfig, TransportConfig};
use crate::models;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde_valid::Validate;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Error types for config loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    /// File not found
    #[error("Config file not found: {0}")]
    NotFound(String),

    /// Parse error (invalid TOML or wrong types)
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    /// Field-level range or length violation
    #[error("Schema validation failed:\n{0}")]
    SchemaValidationError(String),

    /// Cross-field or catalog violation
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "SPECTRO_";

/// Load `path` with environment overrides applied.
pub fn load_config(path: &Path) -> Result<SpectroConfig, ConfigLoadError> {
    if !path.exists() {
        return Err(ConfigLoadError::NotFound(path.display().to_string()));
    }
    debug!("Loading config from: {}", path.display());

    let figment = Figment::from(Serialized::defaults(SpectroConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));
    let config = extract(figment)?;

    info!(
        devices = config.devices.len(),
        "Loaded config from {}",
        path.display()
    );
    Ok(config)
}

/// Load from a TOML string. The environment is not consulted.
pub fn load_config_from_str(toml_content: &str) -> Result<SpectroConfig, ConfigLoadError> {
    let figment = Figment::from(Serialized::defaults(SpectroConfig::default()))
        .merge(Toml::string(toml_content));
    extract(figment)
}

fn extract(figment: Figment) -> Result<SpectroConfig, ConfigLoadError> {
    let config: SpectroConfig = figment
        .extract()
        .map_err(|e| ConfigLoadError::ParseError(e.to_string()))?;

    if let Err(errors) = config.validate() {
        return Err(ConfigLoadError::SchemaValidationError(errors.to_string()));
    }

    let problems = cross_check(&config);
    if !problems.is_empty() {
        return Err(ConfigLoadError::ValidationError(problems.join("; ")));
    }
    Ok(config)
}

/// Checks `serde_valid` cannot express: unique ids, known models, and
/// transports the model actually has.
fn cross_check(config: &SpectroConfig) -> Vec<String> {
    let mut problems = Vec::new();
    let mut seen = HashSet::new();
    for entry in &config.devices {
        if !seen.insert(entry.id.as_str()) {
            problems.push(format!("duplicate device id '{}'", entry.id));
        }
        match models::find(&entry.model) {
            Some(model) => {
                let bus = entry.transport.bus();
                if !model.capability_table().supports_bus(bus) {
                    problems.push(format!(
                        "device '{}': {} has no {} interface",
                        entry.id, model.name, bus
                    ));
                }
            }
            None => problems.push(format!(
                "device '{}': unknown model '{}'",
                entry.id, entry.model
            )),
        }
        match &entry.transport {
            TransportConfig::Serial { port, baud_rate } => {
                if port.is_empty() {
                    problems.push(format!("device '{}': empty serial port", entry.id));
                }
                if !(300..=921_600).contains(baud_rate) {
                    problems.push(format!(
                        "device '{}': baud rate {} outside 300..=921600",
                        entry.id, baud_rate
                    ));
                }
            }
            TransportConfig::Tcp { host, port } => {
                if host.is_empty() || *port == 0 {
                    problems.push(format!("device '{}': incomplete TCP address", entry.id));
                }
            }
            TransportConfig::Usb { .. } => {}
        }
    }
    problems
}
