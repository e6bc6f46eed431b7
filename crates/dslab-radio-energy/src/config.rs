//! Calibration data configuration.
//!
//! Calibration files list device models with their power draw in kW:
//!
//! ```yaml
//! models:
//!   - name: stm32wb55rg
//!     description: STM32WB55RG SoC
//!     disabled: 0.00000011
//!     sleep: 0.00001485
//!     rx: 0.00001485
//!     tx:
//!       0: 0.00001716
//! ```
//!
//! The same layout is accepted in JSON, with transmit levels written as string keys.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EnergyError;
use crate::profile::PowerProfile;
use crate::radio::TxPower;

const MEMORY_SOURCE: &str = "<memory>";

/// Holds raw calibration data parsed from a file.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct RawCalibrationConfig {
    /// Calibrated device models.
    #[serde(default)]
    pub models: Vec<RawPowerProfile>,
}

/// Holds calibration of a single device model.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct RawPowerProfile {
    /// Model name, used as the registry key.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Draw with the radio disabled.
    pub disabled: f64,
    /// Draw with the radio sleeping.
    pub sleep: f64,
    /// Draw while receiving.
    pub rx: f64,
    /// Draw while transmitting, per power level in dBm.
    #[serde(default)]
    pub tx: BTreeMap<TxPower, f64>,
}

impl From<RawPowerProfile> for PowerProfile {
    fn from(raw: RawPowerProfile) -> Self {
        raw.tx.into_iter().fold(
            PowerProfile::new(raw.name, raw.disabled, raw.sleep, raw.rx).with_description(raw.description),
            |profile, (tx_power, consumption)| profile.with_tx_consumption(tx_power, consumption),
        )
    }
}

/// Supported calibration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML document.
    Yaml,
    /// JSON document.
    Json,
}

impl ConfigFormat {
    /// Detects the format from the file extension (`.yaml`, `.yml` or `.json`).
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl RawCalibrationConfig {
    /// Reads calibration data from a YAML or JSON file, picking the parser by extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, EnergyError> {
        let path = path.as_ref();
        let path_str = path.display().to_string();
        let format = ConfigFormat::from_path(path).ok_or_else(|| EnergyError::ConfigParse {
            path: path_str.clone(),
            reason: "unsupported file extension, expected .yaml, .yml or .json".to_string(),
        })?;
        let data = std::fs::read_to_string(path).map_err(|source| EnergyError::ConfigIo {
            path: path_str.clone(),
            source,
        })?;
        Self::parse(&data, format, &path_str)
    }

    /// Parses calibration data from a YAML string.
    pub fn from_yaml_str(data: &str) -> Result<Self, EnergyError> {
        Self::parse(data, ConfigFormat::Yaml, MEMORY_SOURCE)
    }

    /// Parses calibration data from a JSON string.
    pub fn from_json_str(data: &str) -> Result<Self, EnergyError> {
        Self::parse(data, ConfigFormat::Json, MEMORY_SOURCE)
    }

    fn parse(data: &str, format: ConfigFormat, source: &str) -> Result<Self, EnergyError> {
        let parse_error = |reason: String| EnergyError::ConfigParse {
            path: source.to_string(),
            reason,
        };
        match format {
            ConfigFormat::Yaml => serde_yaml::from_str(data).map_err(|e| parse_error(e.to_string())),
            ConfigFormat::Json => serde_json::from_str(data).map_err(|e| parse_error(e.to_string())),
        }
    }
}
