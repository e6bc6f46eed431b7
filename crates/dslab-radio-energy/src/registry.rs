//! Registry of calibrated device models.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use sugars::arc;

use crate::config::RawCalibrationConfig;
use crate::error::EnergyError;
use crate::profile::PowerProfile;

/// Maps device model names to their power profiles.
///
/// The registry is built once at startup and handed to each analyser. Profiles are shared via [`Arc`], so every
/// node of a model sees the same transmit table, including levels resolved by
/// [`PowerProfile::resolve_tx_consumption`].
#[derive(Debug, Default, Clone)]
pub struct CalibrationRegistry {
    profiles: BTreeMap<String, Arc<PowerProfile>>,
}

impl CalibrationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in device models.
    ///
    /// Power draw was measured for the whole SoC to reflect real operating conditions.
    pub fn with_default_models() -> Self {
        let mut registry = Self::new();
        registry.profiles.insert(
            "stm32wb55rg".to_string(),
            // 3.3 V, 4.5 mA in rx and sleep, 5.2 mA in tx at 0 dBm
            arc!(PowerProfile::new("stm32wb55rg", 0.00000011, 0.00001485, 0.00001485)
                .with_description("STM32WB55RG Bluetooth LE / 802.15.4 SoC")
                .with_tx_consumption(0, 0.00001716)),
        );
        registry
    }

    /// Builds a registry from parsed calibration data.
    pub fn from_raw(raw: RawCalibrationConfig) -> Result<Self, EnergyError> {
        let mut registry = Self::new();
        for model in raw.models {
            registry.add_profile(model.into())?;
        }
        Ok(registry)
    }

    /// Loads a registry from a YAML or JSON calibration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, EnergyError> {
        Self::from_raw(RawCalibrationConfig::from_file(path)?)
    }

    /// Loads a registry from YAML calibration data.
    pub fn from_yaml_str(data: &str) -> Result<Self, EnergyError> {
        Self::from_raw(RawCalibrationConfig::from_yaml_str(data)?)
    }

    /// Loads a registry from JSON calibration data.
    pub fn from_json_str(data: &str) -> Result<Self, EnergyError> {
        Self::from_raw(RawCalibrationConfig::from_json_str(data)?)
    }

    /// Adds a validated profile under its name. Names must be unique.
    pub fn add_profile(&mut self, profile: PowerProfile) -> Result<Arc<PowerProfile>, EnergyError> {
        profile.validate()?;
        if self.profiles.contains_key(profile.name()) {
            return Err(EnergyError::DuplicateModel(profile.name().to_string()));
        }
        let profile = arc!(profile);
        self.profiles.insert(profile.name().to_string(), profile.clone());
        Ok(profile)
    }

    /// Returns the profile of the given model, if registered.
    pub fn lookup(&self, name: &str) -> Option<Arc<PowerProfile>> {
        self.profiles.get(name).cloned()
    }

    /// Checks whether the given model is registered.
    pub fn exists(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// Returns registered model names in lexicographic order.
    pub fn names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    /// Returns one-line summaries `"<key>\t <name>, <description>"` of registered models, sorted.
    pub fn briefs(&self) -> Vec<String> {
        let mut briefs: Vec<String> = self
            .profiles
            .iter()
            .map(|(key, profile)| format!("{}\t {}, {}", key, profile.name(), profile.description()))
            .collect();
        briefs.sort();
        briefs
    }

    /// Returns the number of registered models.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Checks whether the registry has no models.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
