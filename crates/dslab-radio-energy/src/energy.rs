//! Energy calculation over calibrated power profiles.
//!
//! Energy is computed as `draw * time` with draws in kW and time in microseconds of simulated time, which gives
//! values in mJ. No further unit conversion is done here, scaling for reports is left to the consumer.

use std::collections::BTreeMap;
use std::ops::Add;

use serde::Serialize;

use crate::profile::PowerProfile;
use crate::radio::{RadioStatus, TxPower};

/// Transmit draw in kW assumed for models without any calibrated transmit level.
pub const DEFAULT_TX_CONSUMPTION: f64 = 1.0e-4;

/// Energy consumed by a node (or averaged over nodes) in each radio state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EnergyBreakdown {
    /// Energy consumed with the radio disabled.
    pub disabled: f64,
    /// Energy consumed while sleeping.
    pub sleep: f64,
    /// Energy consumed while transmitting, over all power levels.
    pub tx: f64,
    /// Energy consumed while receiving.
    pub rx: f64,
}

impl EnergyBreakdown {
    /// Computes the energy consumed by a radio according to the given profile.
    ///
    /// Transmit levels missing from the profile are resolved and cached, see
    /// [`PowerProfile::resolve_tx_consumption`].
    pub fn compute(status: &RadioStatus, profile: &PowerProfile) -> Self {
        Self {
            disabled: disabled_energy(status, profile),
            sleep: sleep_energy(status, profile),
            tx: tx_energy(status, profile),
            rx: rx_energy(status, profile),
        }
    }

    /// Returns the sum over all states.
    pub fn total(&self) -> f64 {
        self.disabled + self.sleep + self.tx + self.rx
    }

    /// Divides every category by `n`.
    pub fn scale(&self, n: f64) -> Self {
        Self {
            disabled: self.disabled / n,
            sleep: self.sleep / n,
            tx: self.tx / n,
            rx: self.rx / n,
        }
    }
}

impl Add for EnergyBreakdown {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            disabled: self.disabled + other.disabled,
            sleep: self.sleep + other.sleep,
            tx: self.tx + other.tx,
            rx: self.rx + other.rx,
        }
    }
}

/// Energy consumed with the radio disabled.
pub fn disabled_energy(status: &RadioStatus, profile: &PowerProfile) -> f64 {
    profile.disabled_consumption() * status.spent_disabled() as f64
}

/// Energy consumed while sleeping.
pub fn sleep_energy(status: &RadioStatus, profile: &PowerProfile) -> f64 {
    profile.sleep_consumption() * status.spent_sleep() as f64
}

/// Energy consumed while receiving.
pub fn rx_energy(status: &RadioStatus, profile: &PowerProfile) -> f64 {
    profile.rx_consumption() * status.spent_rx() as f64
}

/// Energy consumed while transmitting, summed over power levels.
pub fn tx_energy(status: &RadioStatus, profile: &PowerProfile) -> f64 {
    status
        .spent_tx()
        .iter()
        .map(|(tx_power, spent)| profile.resolve_tx_consumption(*tx_power) * *spent as f64)
        .sum()
}

/// Picks the transmit draw for a level from a calibration table.
///
/// Returns the exact entry if present, otherwise the entry of the smallest calibrated level above `tx_power`.
/// Levels above the highest calibrated one are clamped to it. An empty table yields
/// [`DEFAULT_TX_CONSUMPTION`].
pub fn nearest_tx_consumption(table: &BTreeMap<TxPower, f64>, tx_power: TxPower) -> f64 {
    if let Some((_, consumption)) = table.range(tx_power..).next() {
        return *consumption;
    }
    match table.values().next_back() {
        Some(max_consumption) => *max_consumption,
        None => DEFAULT_TX_CONSUMPTION,
    }
}
