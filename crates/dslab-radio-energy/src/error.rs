//! Error type shared by the energy accounting components.

use thiserror::Error;

use crate::analyser::NodeId;
use crate::radio::{RadioState, Timestamp};

/// Errors returned by fallible energy accounting operations.
#[derive(Debug, Error)]
pub enum EnergyError {
    /// The requested device model is not present in the calibration registry.
    #[error("unknown device model '{0}'")]
    UnknownModel(String),
    /// A node with this id is already registered.
    #[error("node {0} is already registered")]
    NodeAlreadyExists(NodeId),
    /// No node with this id is registered.
    #[error("node {0} is not registered")]
    NodeNotFound(NodeId),
    /// The reported timestamp is earlier than the last accounted one.
    #[error("clock regression: last accounted at {last} us, got {now} us")]
    ClockRegression {
        /// Timestamp of the last accumulation.
        last: Timestamp,
        /// Rejected timestamp.
        now: Timestamp,
    },
    /// The radio cannot be switched to the requested state.
    #[error("radio cannot be switched to {0:?}")]
    InvalidTransition(RadioState),
    /// A snapshot was requested while no nodes are registered.
    #[error("cannot capture an energy snapshot without active nodes")]
    NoActiveNodes,
    /// A calibration profile failed validation.
    #[error("invalid power profile '{name}': {reason}")]
    InvalidProfile {
        /// Profile name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },
    /// Two calibration profiles share the same name.
    #[error("device model '{0}' is defined more than once")]
    DuplicateModel(String),
    /// Calibration file could not be read.
    #[error("can't read calibration file {path}")]
    ConfigIo {
        /// File path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Calibration data could not be parsed.
    #[error("can't parse calibration data from {path}: {reason}")]
    ConfigParse {
        /// File path or `<memory>` for in-memory sources.
        path: String,
        /// Parser message.
        reason: String,
    },
}
