//! Energy history records.

use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::analyser::NodeId;
use crate::energy::EnergyBreakdown;
use crate::profile::PowerProfile;
use crate::radio::Timestamp;

// One sample every 30 s over an hour.
const HISTORY_CAPACITY: usize = 3600;

/// Energy consumed by one node up to a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct NodeEnergyRecord {
    /// Node id.
    pub node_id: NodeId,
    /// Profile used for the computation. Serialized as the model name.
    #[serde(rename = "model", serialize_with = "serialize_profile_name")]
    pub profile: Arc<PowerProfile>,
    /// Energy per radio state.
    #[serde(flatten)]
    pub energy: EnergyBreakdown,
}

fn serialize_profile_name<S: Serializer>(profile: &Arc<PowerProfile>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(profile.name())
}

/// Energy per radio state averaged over all nodes active at `timestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NetworkSnapshot {
    /// Snapshot time.
    pub timestamp: Timestamp,
    /// Average energy per radio state.
    #[serde(flatten)]
    pub energy: EnergyBreakdown,
}

/// Append-only series of network snapshots and matching per-node batches.
///
/// Both series always have the same length, and entries at the same index belong to the same snapshot.
#[derive(Debug, Clone)]
pub struct EnergyHistory {
    network: Vec<NetworkSnapshot>,
    nodes: Vec<Vec<NodeEnergyRecord>>,
}

impl Default for EnergyHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl EnergyHistory {
    /// Creates empty history.
    pub fn new() -> Self {
        Self {
            network: Vec::with_capacity(HISTORY_CAPACITY),
            nodes: Vec::with_capacity(HISTORY_CAPACITY),
        }
    }

    /// Appends a network snapshot together with the per-node records it was computed from.
    pub fn push(&mut self, snapshot: NetworkSnapshot, records: Vec<NodeEnergyRecord>) {
        self.network.push(snapshot);
        self.nodes.push(records);
    }

    /// Discards all entries.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Returns network snapshots in capture order.
    pub fn network(&self) -> &[NetworkSnapshot] {
        &self.network
    }

    /// Returns per-node batches in capture order.
    pub fn nodes(&self) -> &[Vec<NodeEnergyRecord>] {
        &self.nodes
    }

    /// Returns the last network snapshot.
    pub fn latest_network(&self) -> Option<&NetworkSnapshot> {
        self.network.last()
    }

    /// Returns the last per-node batch.
    pub fn latest_nodes(&self) -> Option<&[NodeEnergyRecord]> {
        self.nodes.last().map(Vec::as_slice)
    }

    /// Returns the number of snapshots.
    pub fn len(&self) -> usize {
        self.network.len()
    }

    /// Checks whether no snapshot was taken.
    pub fn is_empty(&self) -> bool {
        self.network.is_empty()
    }
}
