//! Application settings loaded from config.toml
//!
//! The file controls display formatting, the cycle mutation policy, the
//! reconciliation tolerance and an optional list of buses to seed on first run.
//! Every section is optional.

use crate::core::cycle::CyclePolicy;
use crate::core::reconciliation::DEFAULT_TOLERANCE;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Output formatting
    pub display: DisplayConfig,
    /// Payment cycle rules
    pub cycles: CycleConfig,
    /// Reconciliation rules
    pub reconciliation: ReconciliationConfig,
    /// Buses inserted at start-up when their plate is missing
    pub buses: Vec<BusSeed>,
}

/// Output formatting
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Thousands separator for amounts
    pub thousands_separator: char,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            thousands_separator: ',',
        }
    }
}

/// Payment cycle rules
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Which cycles may be edited or deleted
    pub policy: CyclePolicy,
}

/// Reconciliation rules
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// Discrepancies smaller than this (in thousands) count as balanced
    pub tolerance: f64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

/// A bus to seed
#[derive(Debug, Deserialize, Clone)]
pub struct BusSeed {
    /// License plate
    pub license_plate: String,
    /// Partner operator flag
    #[serde(default)]
    pub is_partner: bool,
    /// Whether shareholders take a cut
    #[serde(default)]
    pub is_shareholding: bool,
    /// Owner share in percent
    #[serde(default = "full_share")]
    pub share_percentage: f64,
    /// Free-text note
    #[serde(default)]
    pub note: String,
    /// Shareholders of this bus
    #[serde(default)]
    pub shareholders: Vec<ShareholderSeed>,
}

/// A shareholder to seed
#[derive(Debug, Deserialize, Clone)]
pub struct ShareholderSeed {
    /// Display name
    pub name: String,
    /// Cut in percent
    pub percentage: f64,
}

const fn full_share() -> f64 {
    100.0
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    debug!("Loading configuration from {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    parse_config(&contents)
}

/// Parses configuration from TOML text
///
/// # Errors
/// Returns an error if the TOML is invalid.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads configuration from `BUS_LEDGER_CONFIG`, or `./config.toml` by default.
/// A missing file yields the defaults.
///
/// # Errors
/// Returns an error if the variable is not valid unicode, or if the file exists
/// but cannot be read or parsed.
pub fn load_default_config() -> Result<AppConfig> {
    let path = match std::env::var("BUS_LEDGER_CONFIG") {
        Ok(path) => path,
        Err(std::env::VarError::NotPresent) => "config.toml".to_string(),
        Err(e) => return Err(e.into()),
    };
    if !Path::new(&path).exists() {
        info!("No configuration file at {}, using defaults", path);
        return Ok(AppConfig::default());
    }
    load_config(&path)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [display]
            thousands_separator = "."

            [cycles]
            policy = "unrestricted"

            [reconciliation]
            tolerance = 1.0

            [[buses]]
            license_plate = "51B-123.45"
            is_shareholding = true
            share_percentage = 25.0
            shareholders = [{ name = "Anh Thảo", percentage = 25.0 }]

            [[buses]]
            license_plate = "29A-999.99"
            is_partner = true
        "#;

        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.display.thousands_separator, '.');
        assert_eq!(config.cycles.policy, CyclePolicy::Unrestricted);
        assert_eq!(config.reconciliation.tolerance, 1.0);
        assert_eq!(config.buses.len(), 2);
        assert_eq!(config.buses[0].shareholders[0].name, "Anh Thảo");
        assert!(config.buses[1].is_partner);
        assert!(!config.buses[1].is_shareholding);
        assert_eq!(config.buses[1].share_percentage, 100.0);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.display.thousands_separator, ',');
        assert_eq!(config.cycles.policy, CyclePolicy::LatestOnly);
        assert_eq!(config.reconciliation.tolerance, DEFAULT_TOLERANCE);
        assert!(config.buses.is_empty());
    }

    #[test]
    fn test_invalid_config_is_config_error() {
        let result = parse_config("[display\nthousands_separator = ");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
