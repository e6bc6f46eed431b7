//! Radio state tracking.
//!
//! [`RadioStatus`] attributes every microsecond of simulated time to exactly one bucket: disabled, sleep,
//! receive or transmit at a particular power level. Time is always booked to the state the radio was in
//! *before* a transition, so callers must report transitions with the timestamp at which they happen.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::EnergyError;

/// Simulated time in microseconds.
pub type Timestamp = u64;

/// Transmit power level in dBm.
pub type TxPower = i32;

/// Operating mode of a radio transceiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RadioState {
    /// Radio is powered off.
    Disabled,
    /// Radio is in low-power sleep.
    Sleep,
    /// Radio is listening or receiving a frame.
    Receive,
    /// Radio is transmitting at the current transmit power level.
    Transmit,
    /// Marker for a radio whose bookkeeping has not started. Time spent in it is not booked, and it can't be
    /// entered through [`RadioStatus::set_state`].
    Invalid,
}

/// Per-node radio state machine with cumulative time spent in each state.
#[derive(Debug, Clone, Serialize)]
pub struct RadioStatus {
    state: RadioState,
    tx_power: TxPower,
    timestamp: Timestamp,
    spent_disabled: Timestamp,
    spent_sleep: Timestamp,
    spent_rx: Timestamp,
    spent_tx: BTreeMap<TxPower, Timestamp>,
}

impl RadioStatus {
    /// Creates a tracker in the [`RadioState::Disabled`] state with all buckets empty.
    ///
    /// * `tx_power` - initial transmit power level, used by the first transmission.
    /// * `timestamp` - time from which accounting starts.
    pub fn new(tx_power: TxPower, timestamp: Timestamp) -> Self {
        Self {
            state: RadioState::Disabled,
            tx_power,
            timestamp,
            spent_disabled: 0,
            spent_sleep: 0,
            spent_rx: 0,
            spent_tx: BTreeMap::new(),
        }
    }

    /// Books the time elapsed since the last accumulation to the current state.
    ///
    /// Calling it twice with the same timestamp is a no-op. A timestamp earlier than the last accounted one is
    /// rejected with [`EnergyError::ClockRegression`] and leaves the tracker unchanged.
    pub fn accumulate(&mut self, timestamp: Timestamp) -> Result<(), EnergyError> {
        let delta = timestamp
            .checked_sub(self.timestamp)
            .ok_or(EnergyError::ClockRegression {
                last: self.timestamp,
                now: timestamp,
            })?;
        match self.state {
            RadioState::Disabled => self.spent_disabled += delta,
            RadioState::Sleep => self.spent_sleep += delta,
            RadioState::Receive => self.spent_rx += delta,
            RadioState::Transmit => *self.spent_tx.entry(self.tx_power).or_insert(0) += delta,
            RadioState::Invalid => {}
        }
        self.timestamp = timestamp;
        Ok(())
    }

    /// Switches the radio to `state` at `timestamp`, closing out the time spent in the previous state first.
    ///
    /// When switching to [`RadioState::Transmit`], `tx_power` replaces the current power level if given.
    /// For other states `tx_power` is ignored. Switching to [`RadioState::Invalid`] is rejected with
    /// [`EnergyError::InvalidTransition`] and leaves the tracker unchanged.
    pub fn set_state(
        &mut self,
        state: RadioState,
        timestamp: Timestamp,
        tx_power: Option<TxPower>,
    ) -> Result<(), EnergyError> {
        if state == RadioState::Invalid {
            return Err(EnergyError::InvalidTransition(state));
        }
        self.accumulate(timestamp)?;
        self.state = state;
        if state == RadioState::Transmit {
            if let Some(tx_power) = tx_power {
                self.tx_power = tx_power;
            }
        }
        Ok(())
    }

    /// Changes the transmit power level at `timestamp`.
    ///
    /// Time spent transmitting before the change stays booked to the old level.
    pub fn set_tx_power(&mut self, tx_power: TxPower, timestamp: Timestamp) -> Result<(), EnergyError> {
        self.accumulate(timestamp)?;
        self.tx_power = tx_power;
        Ok(())
    }

    /// Returns the current radio state.
    pub fn state(&self) -> RadioState {
        self.state
    }

    /// Returns the current transmit power level.
    pub fn tx_power(&self) -> TxPower {
        self.tx_power
    }

    /// Returns the timestamp of the last accumulation.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Time spent with the radio disabled.
    pub fn spent_disabled(&self) -> Timestamp {
        self.spent_disabled
    }

    /// Time spent sleeping.
    pub fn spent_sleep(&self) -> Timestamp {
        self.spent_sleep
    }

    /// Time spent receiving.
    pub fn spent_rx(&self) -> Timestamp {
        self.spent_rx
    }

    /// Time spent transmitting, per transmit power level.
    pub fn spent_tx(&self) -> &BTreeMap<TxPower, Timestamp> {
        &self.spent_tx
    }

    /// Time spent transmitting at any power level.
    pub fn total_tx_time(&self) -> Timestamp {
        self.spent_tx.values().sum()
    }

    /// Time booked to all buckets.
    pub fn total_time(&self) -> Timestamp {
        self.spent_disabled + self.spent_sleep + self.spent_rx + self.total_tx_time()
    }
}
