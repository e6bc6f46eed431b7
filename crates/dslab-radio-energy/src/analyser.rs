//! Network-wide energy analyser.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, trace, warn};

use crate::energy::EnergyBreakdown;
use crate::error::EnergyError;
use crate::history::{EnergyHistory, NetworkSnapshot, NodeEnergyRecord};
use crate::profile::PowerProfile;
use crate::radio::{RadioState, RadioStatus, Timestamp, TxPower};
use crate::registry::CalibrationRegistry;

/// Node identifier assigned by the simulation.
pub type NodeId = u32;

/// Radio accounting state of a single registered node.
#[derive(Debug, Clone)]
pub struct NodeEnergy {
    id: NodeId,
    profile: Arc<PowerProfile>,
    radio: RadioStatus,
}

impl NodeEnergy {
    fn new(id: NodeId, profile: Arc<PowerProfile>, tx_power: TxPower, timestamp: Timestamp) -> Self {
        Self {
            id,
            profile,
            radio: RadioStatus::new(tx_power, timestamp),
        }
    }

    /// Returns node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Returns the profile of the node's device model.
    pub fn profile(&self) -> &Arc<PowerProfile> {
        &self.profile
    }

    /// Returns the radio state tracker.
    pub fn radio(&self) -> &RadioStatus {
        &self.radio
    }

    /// Returns energy consumed up to the last accounted timestamp.
    pub fn energy(&self) -> EnergyBreakdown {
        EnergyBreakdown::compute(&self.radio, &self.profile)
    }

    fn record(&self) -> NodeEnergyRecord {
        NodeEnergyRecord {
            node_id: self.id,
            profile: self.profile.clone(),
            energy: self.energy(),
        }
    }
}

/// Tracks radio energy consumption of all nodes in a simulated network.
///
/// The simulation reports node lifecycle and radio state transitions with simulated timestamps in microseconds.
/// On each [`capture_snapshot`](Self::capture_snapshot) call the analyser brings every node up to the snapshot
/// time and appends both the per-node energy and the network average to its history. All mutation goes through
/// `&mut self`, so a snapshot is never observed half-written.
///
/// Energy values are `draw [kW] * time [us]`, i.e. mJ. The analyser does not rescale them.
#[derive(Debug)]
pub struct NetworkEnergyAnalyser {
    registry: Arc<CalibrationRegistry>,
    nodes: BTreeMap<NodeId, NodeEnergy>,
    preassigned: BTreeMap<NodeId, Arc<PowerProfile>>,
    history: EnergyHistory,
    title: String,
}

impl NetworkEnergyAnalyser {
    /// Creates analyser using device models from the given registry.
    pub fn new(registry: Arc<CalibrationRegistry>) -> Self {
        Self {
            registry,
            nodes: BTreeMap::new(),
            preassigned: BTreeMap::new(),
            history: EnergyHistory::new(),
            title: String::new(),
        }
    }

    /// Returns the calibration registry.
    pub fn registry(&self) -> &CalibrationRegistry {
        &self.registry
    }

    /// Registers a node with its radio disabled.
    ///
    /// If a model was preassigned to `id` via [`preassign_model`](Self::preassign_model), it takes precedence
    /// over `model`. Fails if the node is already registered (leaving it untouched) or if the model is unknown.
    pub fn register_node(
        &mut self,
        id: NodeId,
        timestamp: Timestamp,
        model: &str,
        tx_power: TxPower,
    ) -> Result<(), EnergyError> {
        if self.nodes.contains_key(&id) {
            warn!(target: "energy", "node {} is already registered, ignoring registration", id);
            return Err(EnergyError::NodeAlreadyExists(id));
        }
        let profile = match self.preassigned.remove(&id) {
            Some(profile) => profile,
            None => self
                .registry
                .lookup(model)
                .ok_or_else(|| EnergyError::UnknownModel(model.to_string()))?,
        };
        debug!(
            target: "energy",
            "node {} registered at {} us with model {}, tx power {} dBm",
            id,
            timestamp,
            profile.name(),
            tx_power
        );
        self.nodes.insert(id, NodeEnergy::new(id, profile, tx_power, timestamp));
        Ok(())
    }

    /// Removes a node. Removing the last node also clears the history and pending preassignments.
    pub fn deregister_node(&mut self, id: NodeId) -> Result<NodeEnergy, EnergyError> {
        let node = self.nodes.remove(&id).ok_or(EnergyError::NodeNotFound(id))?;
        debug!(target: "energy", "node {} deregistered", id);
        if self.nodes.is_empty() {
            self.preassigned.clear();
            self.clear_history();
        }
        Ok(node)
    }

    /// Reports a radio state transition of a node.
    ///
    /// `tx_power` sets the transmit power level when switching to [`RadioState::Transmit`].
    pub fn set_radio_state(
        &mut self,
        id: NodeId,
        state: RadioState,
        timestamp: Timestamp,
        tx_power: Option<TxPower>,
    ) -> Result<(), EnergyError> {
        let node = self.nodes.get_mut(&id).ok_or(EnergyError::NodeNotFound(id))?;
        let prev_state = node.radio.state();
        node.radio.set_state(state, timestamp, tx_power).map_err(|e| {
            warn!(target: "energy", "node {}: rejected transition to {:?}: {}", id, state, e);
            e
        })?;
        trace!(target: "energy", "node {}: {:?} -> {:?} at {} us", id, prev_state, state, timestamp);
        Ok(())
    }

    /// Reports a transmit power change of a node.
    pub fn set_tx_power(&mut self, id: NodeId, tx_power: TxPower, timestamp: Timestamp) -> Result<(), EnergyError> {
        let node = self.nodes.get_mut(&id).ok_or(EnergyError::NodeNotFound(id))?;
        node.radio.set_tx_power(tx_power, timestamp).map_err(|e| {
            warn!(target: "energy", "node {}: rejected tx power change: {}", id, e);
            e
        })
    }

    /// Assigns a device model to a node that is not registered yet.
    ///
    /// The model is used by the next [`register_node`](Self::register_node) call for `id` instead of the model
    /// named there. Fails for registered nodes, use [`reassign_model`](Self::reassign_model) for them.
    pub fn preassign_model(&mut self, id: NodeId, model: &str) -> Result<(), EnergyError> {
        if self.nodes.contains_key(&id) {
            return Err(EnergyError::NodeAlreadyExists(id));
        }
        let profile = self.lookup_model(model)?;
        self.preassigned.insert(id, profile);
        Ok(())
    }

    /// Drops the model preassigned to `id`, returning its profile if there was one.
    pub fn cancel_preassignment(&mut self, id: NodeId) -> Option<Arc<PowerProfile>> {
        self.preassigned.remove(&id)
    }

    /// Switches a registered node to another device model.
    ///
    /// Accumulated radio time is kept; subsequent energy calculations use the new model's profile.
    pub fn reassign_model(&mut self, id: NodeId, model: &str) -> Result<(), EnergyError> {
        let profile = self.lookup_model(model)?;
        let node = self.nodes.get_mut(&id).ok_or(EnergyError::NodeNotFound(id))?;
        debug!(
            target: "energy",
            "node {}: model {} -> {}",
            id,
            node.profile.name(),
            profile.name()
        );
        node.profile = profile;
        Ok(())
    }

    /// Brings every node up to `timestamp` and records per-node and network-average energy.
    ///
    /// Fails without changing anything if no nodes are registered or if `timestamp` is earlier than the last
    /// accounted time of any node.
    pub fn capture_snapshot(&mut self, timestamp: Timestamp) -> Result<NetworkSnapshot, EnergyError> {
        if self.nodes.is_empty() {
            warn!(target: "energy", "no active nodes, skipping snapshot at {} us", timestamp);
            return Err(EnergyError::NoActiveNodes);
        }
        if let Some(node) = self.nodes.values().find(|node| node.radio.timestamp() > timestamp) {
            warn!(target: "energy", "node {}: snapshot at {} us is in the past", node.id, timestamp);
            return Err(EnergyError::ClockRegression {
                last: node.radio.timestamp(),
                now: timestamp,
            });
        }

        let mut records = Vec::with_capacity(self.nodes.len());
        let mut total = EnergyBreakdown::default();
        for node in self.nodes.values_mut() {
            node.radio.accumulate(timestamp)?;
            let record = node.record();
            total = total + record.energy;
            records.push(record);
        }

        let snapshot = NetworkSnapshot {
            timestamp,
            energy: total.scale(self.nodes.len() as f64),
        };
        self.history.push(snapshot, records);
        Ok(snapshot)
    }

    /// Returns the registered node.
    pub fn node(&self, id: NodeId) -> Option<&NodeEnergy> {
        self.nodes.get(&id)
    }

    /// Returns ids of registered nodes in ascending order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    /// Returns the number of registered nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns energy consumed by a node up to its last accounted timestamp, without recording a snapshot.
    pub fn current_energy(&self, id: NodeId) -> Result<EnergyBreakdown, EnergyError> {
        self.nodes
            .get(&id)
            .map(NodeEnergy::energy)
            .ok_or(EnergyError::NodeNotFound(id))
    }

    /// Returns the last network snapshot.
    pub fn latest_network_snapshot(&self) -> Option<&NetworkSnapshot> {
        self.history.latest_network()
    }

    /// Returns per-node records of the last snapshot.
    pub fn latest_node_records(&self) -> Option<&[NodeEnergyRecord]> {
        self.history.latest_nodes()
    }

    /// Returns all network snapshots in capture order.
    pub fn network_history(&self) -> &[NetworkSnapshot] {
        self.history.network()
    }

    /// Returns all per-node batches in capture order, aligned with [`network_history`](Self::network_history).
    pub fn node_history(&self) -> &[Vec<NodeEnergyRecord>] {
        self.history.nodes()
    }

    /// Returns the whole history.
    pub fn history(&self) -> &EnergyHistory {
        &self.history
    }

    /// Discards all recorded snapshots. Radio accounting of registered nodes is kept.
    pub fn clear_history(&mut self) {
        self.history.clear();
        debug!(target: "energy", "energy history cleared");
    }

    /// Returns registered device model names in lexicographic order.
    pub fn model_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Checks whether the device model is registered.
    pub fn model_exists(&self, model: &str) -> bool {
        self.registry.exists(model)
    }

    /// Sets the title used to label exported results.
    pub fn set_title<S: Into<String>>(&mut self, title: S) {
        self.title = title.into();
    }

    /// Returns the title of this analysis.
    pub fn title(&self) -> &str {
        &self.title
    }

    fn lookup_model(&self, model: &str) -> Result<Arc<PowerProfile>, EnergyError> {
        self.registry
            .lookup(model)
            .ok_or_else(|| EnergyError::UnknownModel(model.to_string()))
    }
}
