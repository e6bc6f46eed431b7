//! Device power profiles.

use std::collections::BTreeMap;

use log::debug;
use parking_lot::RwLock;

use crate::energy::nearest_tx_consumption;
use crate::error::EnergyError;
use crate::radio::TxPower;

/// Calibrated power draw of a device model in each radio state.
///
/// All draws are in kW. The disabled, sleep and receive draws are fixed after construction. The transmit table
/// maps power levels in dBm to draw and may be sparse: levels missing from it are resolved on demand by
/// [`resolve_tx_consumption`](PowerProfile::resolve_tx_consumption), which caches the resolved value in the
/// table. Profiles are shared by all nodes of a model, so one resolution serves every node using the same level.
#[derive(Debug)]
pub struct PowerProfile {
    name: String,
    description: String,
    disabled: f64,
    sleep: f64,
    rx: f64,
    tx: RwLock<BTreeMap<TxPower, f64>>,
}

impl PowerProfile {
    /// Creates a profile with an empty transmit table.
    ///
    /// * `disabled` - draw with the radio disabled.
    /// * `sleep` - draw with the radio sleeping.
    /// * `rx` - draw while receiving.
    pub fn new<S: Into<String>>(name: S, disabled: f64, sleep: f64, rx: f64) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            disabled,
            sleep,
            rx,
            tx: RwLock::new(BTreeMap::new()),
        }
    }

    /// Sets the human-readable description.
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    /// Adds a calibrated transmit draw for the given power level.
    pub fn with_tx_consumption(self, tx_power: TxPower, consumption: f64) -> Self {
        self.tx.write().insert(tx_power, consumption);
        self
    }

    /// Checks that every draw is a finite non-negative number.
    pub fn validate(&self) -> Result<(), EnergyError> {
        let invalid = |reason: String| EnergyError::InvalidProfile {
            name: self.name.clone(),
            reason,
        };
        if self.name.is_empty() {
            return Err(invalid("empty name".to_string()));
        }
        for (state, value) in [("disabled", self.disabled), ("sleep", self.sleep), ("rx", self.rx)] {
            if !is_valid_draw(value) {
                return Err(invalid(format!("{} draw {} is not a non-negative number", state, value)));
            }
        }
        for (tx_power, value) in self.tx.read().iter() {
            if !is_valid_draw(*value) {
                return Err(invalid(format!(
                    "tx draw {} at {} dBm is not a non-negative number",
                    value, tx_power
                )));
            }
        }
        Ok(())
    }

    /// Returns the model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the model description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the draw with the radio disabled.
    pub fn disabled_consumption(&self) -> f64 {
        self.disabled
    }

    /// Returns the draw with the radio sleeping.
    pub fn sleep_consumption(&self) -> f64 {
        self.sleep
    }

    /// Returns the draw while receiving.
    pub fn rx_consumption(&self) -> f64 {
        self.rx
    }

    /// Returns the draw recorded for `tx_power`, without resolving missing levels.
    pub fn tx_consumption(&self, tx_power: TxPower) -> Option<f64> {
        self.tx.read().get(&tx_power).copied()
    }

    /// Returns a copy of the transmit table, including previously resolved levels.
    pub fn tx_table(&self) -> BTreeMap<TxPower, f64> {
        self.tx.read().clone()
    }

    /// Returns the transmit draw for `tx_power`, resolving and caching it if the level is not in the table.
    ///
    /// Missing levels take the draw of the nearest higher level in the table, or of the highest level if
    /// `tx_power` is above all of them, or [`DEFAULT_TX_CONSUMPTION`](crate::energy::DEFAULT_TX_CONSUMPTION) if
    /// the table is empty. The resolved value is inserted into the table, so this call mutates the profile.
    /// Concurrent resolutions of the same level are serialized and yield the same value.
    pub fn resolve_tx_consumption(&self, tx_power: TxPower) -> f64 {
        if let Some(consumption) = self.tx_consumption(tx_power) {
            return consumption;
        }
        let mut table = self.tx.write();
        if let Some(consumption) = table.get(&tx_power) {
            return *consumption;
        }
        let consumption = nearest_tx_consumption(&table, tx_power);
        table.insert(tx_power, consumption);
        debug!(
            target: "energy",
            "model {}: no tx draw calibrated for {} dBm, using {}",
            self.name, tx_power, consumption
        );
        consumption
    }
}

impl Clone for PowerProfile {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            description: self.description.clone(),
            disabled: self.disabled,
            sleep: self.sleep,
            rx: self.rx,
            tx: RwLock::new(self.tx_table()),
        }
    }
}

fn is_valid_draw(value: f64) -> bool {
    value.is_finite() && value >= 0.
}
