#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

pub mod analyser;
pub mod config;
pub mod energy;
pub mod error;
pub mod history;
pub mod profile;
pub mod radio;
pub mod registry;

pub use analyser::{NetworkEnergyAnalyser, NodeEnergy, NodeId};
pub use energy::{EnergyBreakdown, DEFAULT_TX_CONSUMPTION};
pub use error::EnergyError;
pub use history::{EnergyHistory, NetworkSnapshot, NodeEnergyRecord};
pub use profile::PowerProfile;
pub use radio::{RadioState, RadioStatus, Timestamp, TxPower};
pub use registry::CalibrationRegistry;
