use std::sync::Arc;

use approx::assert_abs_diff_eq;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use dslab_radio_energy::{
    CalibrationRegistry, EnergyBreakdown, EnergyError, NetworkEnergyAnalyser, PowerProfile, RadioState,
};

///////////////////////////////////////////////////////////////////////////////

const SEED: u64 = 123;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn make_registry() -> Arc<CalibrationRegistry> {
    let mut registry = CalibrationRegistry::new();
    registry
        .add_profile(PowerProfile::new("unit", 0., 0., 1.).with_description("1 kW while receiving"))
        .unwrap();
    registry
        .add_profile(
            PowerProfile::new("five-level", 0.5, 0.25, 2.)
                .with_tx_consumption(-20, 3.)
                .with_tx_consumption(-10, 5.)
                .with_tx_consumption(0, 10.)
                .with_tx_consumption(10, 30.)
                .with_tx_consumption(20, 50.),
        )
        .unwrap();
    registry.add_profile(PowerProfile::new("no-tx", 1., 1., 1.)).unwrap();
    Arc::new(registry)
}

fn make_analyser() -> NetworkEnergyAnalyser {
    init_logger();
    NetworkEnergyAnalyser::new(make_registry())
}

///////////////////////////////////////////////////////////////////////////////

#[test]
// Three nodes receive for 1, 2 and 3 us at 1 kW, so the network average is 2.
fn test_snapshot_average() {
    let mut analyser = make_analyser();
    for id in 1..=3 {
        analyser.register_node(id, 0, "unit", 0).unwrap();
        analyser.set_radio_state(id, RadioState::Receive, 0, None).unwrap();
        analyser
            .set_radio_state(id, RadioState::Sleep, id as u64, None)
            .unwrap();
    }

    let snapshot = analyser.capture_snapshot(10).unwrap();
    assert_eq!(snapshot.timestamp, 10);
    assert_abs_diff_eq!(snapshot.energy.rx, 2., epsilon = 1e-12);
    assert_abs_diff_eq!(snapshot.energy.tx, 0.);

    let records = analyser.latest_node_records().unwrap();
    let ids: Vec<_> = records.iter().map(|r| r.node_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    for record in records {
        assert_abs_diff_eq!(record.energy.rx, record.node_id as f64, epsilon = 1e-12);
        assert_eq!(record.profile.name(), "unit");
    }
    assert_eq!(analyser.latest_network_snapshot(), Some(&snapshot));
}

#[test]
fn test_snapshot_accumulates_current_state() {
    let mut analyser = make_analyser();
    analyser.register_node(7, 100, "five-level", 10).unwrap();
    analyser.set_radio_state(7, RadioState::Transmit, 200, None).unwrap();

    let first = analyser.capture_snapshot(300).unwrap();
    assert_abs_diff_eq!(first.energy.disabled, 100. * 0.5);
    assert_abs_diff_eq!(first.energy.tx, 100. * 30.);
    assert_eq!(analyser.node(7).unwrap().radio().timestamp(), 300);

    // same timestamp again books no extra time
    let second = analyser.capture_snapshot(300).unwrap();
    assert_eq!(first.energy, second.energy);
    assert_eq!(analyser.network_history().len(), 2);
    assert_eq!(analyser.node_history().len(), 2);
}

#[test]
fn test_snapshot_requires_nodes() {
    let mut analyser = make_analyser();
    assert!(matches!(analyser.capture_snapshot(0), Err(EnergyError::NoActiveNodes)));
    assert!(analyser.network_history().is_empty());
    assert!(analyser.node_history().is_empty());
    assert!(analyser.latest_network_snapshot().is_none());
}

#[test]
fn test_snapshot_in_the_past_is_rejected() {
    let mut analyser = make_analyser();
    analyser.register_node(1, 0, "unit", 0).unwrap();
    analyser.register_node(2, 0, "unit", 0).unwrap();
    analyser.set_radio_state(2, RadioState::Receive, 50, None).unwrap();

    assert!(matches!(
        analyser.capture_snapshot(40),
        Err(EnergyError::ClockRegression { last: 50, now: 40 })
    ));
    assert!(analyser.network_history().is_empty());
    // node 1 was not advanced by the failed snapshot
    assert_eq!(analyser.node(1).unwrap().radio().timestamp(), 0);

    assert!(analyser
        .set_radio_state(2, RadioState::Sleep, 10, None)
        .is_err());
    assert_eq!(analyser.node(2).unwrap().radio().state(), RadioState::Receive);
}

#[test]
fn test_deregistering_last_node_clears_history() {
    let mut analyser = make_analyser();
    analyser.register_node(1, 0, "unit", 0).unwrap();
    analyser.register_node(2, 0, "unit", 0).unwrap();
    analyser.capture_snapshot(10).unwrap();
    analyser.capture_snapshot(20).unwrap();

    let removed = analyser.deregister_node(1).unwrap();
    assert_eq!(removed.id(), 1);
    assert_eq!(analyser.network_history().len(), 2);

    analyser.deregister_node(2).unwrap();
    assert_eq!(analyser.node_count(), 0);
    assert!(analyser.network_history().is_empty());
    assert!(analyser.node_history().is_empty());
    assert!(analyser.latest_node_records().is_none());

    assert!(matches!(analyser.deregister_node(2), Err(EnergyError::NodeNotFound(2))));
}

#[test]
fn test_second_registration_is_rejected() {
    let mut analyser = make_analyser();
    analyser.register_node(1, 0, "unit", 0).unwrap();
    analyser.set_radio_state(1, RadioState::Receive, 5, None).unwrap();

    assert!(matches!(
        analyser.register_node(1, 100, "five-level", 20),
        Err(EnergyError::NodeAlreadyExists(1))
    ));

    let node = analyser.node(1).unwrap();
    assert_eq!(node.profile().name(), "unit");
    assert_eq!(node.radio().state(), RadioState::Receive);
    assert_eq!(node.radio().timestamp(), 5);
    assert_eq!(node.radio().tx_power(), 0);
    assert_eq!(analyser.node_count(), 1);
}

#[test]
fn test_unknown_model() {
    let mut analyser = make_analyser();
    assert!(!analyser.model_exists("missing"));
    assert!(matches!(
        analyser.register_node(1, 0, "missing", 0),
        Err(EnergyError::UnknownModel(model)) if model == "missing"
    ));
    assert_eq!(analyser.node_count(), 0);
    assert!(matches!(
        analyser.set_radio_state(1, RadioState::Sleep, 0, None),
        Err(EnergyError::NodeNotFound(1))
    ));
    assert_eq!(analyser.model_names(), vec!["five-level", "no-tx", "unit"]);
}

#[test]
fn test_reassign_model_keeps_radio_time() {
    let mut analyser = make_analyser();
    analyser.register_node(1, 0, "unit", 0).unwrap();
    analyser.set_radio_state(1, RadioState::Receive, 0, None).unwrap();
    analyser.capture_snapshot(10).unwrap();
    assert_abs_diff_eq!(analyser.current_energy(1).unwrap().rx, 10.);

    analyser.reassign_model(1, "five-level").unwrap();
    let node = analyser.node(1).unwrap();
    assert_eq!(node.profile().name(), "five-level");
    assert_eq!(node.radio().spent_rx(), 10);
    assert_abs_diff_eq!(analyser.current_energy(1).unwrap().rx, 20.);

    assert!(matches!(
        analyser.reassign_model(2, "unit"),
        Err(EnergyError::NodeNotFound(2))
    ));
    assert!(matches!(
        analyser.reassign_model(1, "missing"),
        Err(EnergyError::UnknownModel(_))
    ));
    assert_eq!(analyser.node(1).unwrap().profile().name(), "five-level");
}

#[test]
fn test_preassigned_model_wins_at_registration() {
    let mut analyser = make_analyser();
    analyser.preassign_model(4, "no-tx").unwrap();
    analyser.register_node(4, 0, "unit", 0).unwrap();
    assert_eq!(analyser.node(4).unwrap().profile().name(), "no-tx");

    assert!(matches!(
        analyser.preassign_model(4, "unit"),
        Err(EnergyError::NodeAlreadyExists(4))
    ));
    assert!(matches!(
        analyser.preassign_model(5, "missing"),
        Err(EnergyError::UnknownModel(_))
    ));

    // preassignment is consumed by the registration
    analyser.deregister_node(4).unwrap();
    analyser.register_node(4, 0, "unit", 0).unwrap();
    assert_eq!(analyser.node(4).unwrap().profile().name(), "unit");
}

#[test]
// Pending preassignments do not outlive the network: removing the last node drops them.
fn test_preassignment_is_dropped_with_last_node() {
    let mut analyser = make_analyser();
    analyser.preassign_model(9, "no-tx").unwrap();
    analyser.register_node(1, 0, "unit", 0).unwrap();
    analyser.deregister_node(1).unwrap();

    analyser.register_node(9, 1000, "unit", 0).unwrap();
    assert_eq!(analyser.node(9).unwrap().profile().name(), "unit");
}

#[test]
fn test_cancel_preassignment() {
    let mut analyser = make_analyser();
    assert!(analyser.cancel_preassignment(3).is_none());

    analyser.preassign_model(3, "no-tx").unwrap();
    assert_eq!(analyser.cancel_preassignment(3).unwrap().name(), "no-tx");
    assert!(analyser.cancel_preassignment(3).is_none());

    analyser.register_node(3, 0, "unit", 0).unwrap();
    assert_eq!(analyser.node(3).unwrap().profile().name(), "unit");
}

#[test]
// A node can't be parked in the invalid state, so all elapsed time stays accounted.
fn test_invalid_state_is_rejected() {
    let mut analyser = make_analyser();
    analyser.register_node(1, 0, "unit", 0).unwrap();

    assert!(matches!(
        analyser.set_radio_state(1, RadioState::Invalid, 10, None),
        Err(EnergyError::InvalidTransition(RadioState::Invalid))
    ));
    let radio = analyser.node(1).unwrap().radio();
    assert_eq!(radio.state(), RadioState::Disabled);
    assert_eq!(radio.timestamp(), 0);

    analyser.capture_snapshot(1000).unwrap();
    let radio = analyser.node(1).unwrap().radio();
    assert_eq!(radio.total_time(), 1000);
    assert_eq!(radio.spent_disabled(), 1000);
}

#[test]
fn test_interpolation_is_shared_between_nodes() {
    let mut analyser = make_analyser();
    analyser.register_node(1, 0, "five-level", 5).unwrap();
    analyser.register_node(2, 0, "five-level", 25).unwrap();
    analyser.register_node(3, 0, "no-tx", 5).unwrap();
    for id in 1..=3 {
        analyser.set_radio_state(id, RadioState::Transmit, 0, None).unwrap();
    }

    let snapshot = analyser.capture_snapshot(10).unwrap();
    let records = analyser.latest_node_records().unwrap();
    assert_abs_diff_eq!(records[0].energy.tx, 10. * 30.);
    assert_abs_diff_eq!(records[1].energy.tx, 10. * 50.);
    assert_abs_diff_eq!(records[2].energy.tx, 10. * dslab_radio_energy::DEFAULT_TX_CONSUMPTION);
    assert_abs_diff_eq!(
        snapshot.energy.tx,
        (300. + 500. + 10. * dslab_radio_energy::DEFAULT_TX_CONSUMPTION) / 3.,
        epsilon = 1e-9
    );

    let profile = analyser.registry().lookup("five-level").unwrap();
    assert_eq!(profile.tx_consumption(5), Some(30.));
    assert_eq!(profile.tx_consumption(25), Some(50.));
    assert_eq!(
        analyser.registry().lookup("no-tx").unwrap().tx_consumption(5),
        Some(dslab_radio_energy::DEFAULT_TX_CONSUMPTION)
    );
}

#[test]
fn test_tx_power_change() {
    let mut analyser = make_analyser();
    analyser.register_node(1, 0, "five-level", 0).unwrap();
    analyser.set_radio_state(1, RadioState::Transmit, 0, Some(-10)).unwrap();
    analyser.set_tx_power(1, 20, 10).unwrap();
    analyser.set_radio_state(1, RadioState::Receive, 30, None).unwrap();

    let energy = analyser.current_energy(1).unwrap();
    assert_abs_diff_eq!(energy.tx, 10. * 5. + 20. * 50.);
    assert_eq!(analyser.node(1).unwrap().radio().total_tx_time(), 30);
    assert!(analyser.set_tx_power(1, 0, 29).is_err());
    assert!(analyser.set_tx_power(9, 0, 40).is_err());
}

#[test]
fn test_title_and_ids() {
    let mut analyser = make_analyser();
    assert_eq!(analyser.title(), "");
    analyser.set_title("mesh-64");
    assert_eq!(analyser.title(), "mesh-64");

    for id in [9, 3, 5] {
        analyser.register_node(id, 0, "unit", 0).unwrap();
    }
    assert_eq!(analyser.node_ids(), vec![3, 5, 9]);

    analyser.capture_snapshot(1).unwrap();
    analyser.clear_history();
    assert!(analyser.history().is_empty());
    assert_eq!(analyser.node_count(), 3);
}

#[test]
fn test_history_serialization() {
    let mut analyser = make_analyser();
    analyser.register_node(1, 0, "unit", 0).unwrap();
    analyser.set_radio_state(1, RadioState::Receive, 0, None).unwrap();
    analyser.capture_snapshot(4).unwrap();

    let snapshot = serde_json::to_value(analyser.latest_network_snapshot().unwrap()).unwrap();
    assert_eq!(snapshot["timestamp"], 4);
    assert_eq!(snapshot["rx"], 4.0);
    assert_eq!(snapshot["disabled"], 0.0);

    let record = serde_json::to_value(&analyser.latest_node_records().unwrap()[0]).unwrap();
    assert_eq!(record["node_id"], 1);
    assert_eq!(record["model"], "unit");
    assert_eq!(record["rx"], 4.0);
}

///////////////////////////////////////////////////////////////////////////////

#[test]
// Random transitions on several nodes: radio time adds up to the elapsed time and energy never decreases.
fn test_random_transitions() {
    let mut rng = Pcg64::seed_from_u64(SEED);
    let mut analyser = make_analyser();
    let models = ["unit", "five-level", "no-tx"];
    let states = [
        RadioState::Disabled,
        RadioState::Sleep,
        RadioState::Receive,
        RadioState::Transmit,
    ];

    let node_count = 6;
    let mut start_times = Vec::new();
    let mut now = 0;
    for id in 0..node_count {
        now += rng.gen_range(0..100);
        let model = models[rng.gen_range(0..models.len())];
        analyser.register_node(id, now, model, rng.gen_range(-25..25)).unwrap();
        start_times.push(now);
    }

    let mut prev_energy = vec![EnergyBreakdown::default(); node_count as usize];
    for step in 0..2000 {
        now += rng.gen_range(0..1000);
        let id = rng.gen_range(0..node_count);
        let state = states[rng.gen_range(0..states.len())];
        let tx_power = if rng.gen_bool(0.5) {
            Some(rng.gen_range(-30..30))
        } else {
            None
        };
        analyser.set_radio_state(id, state, now, tx_power).unwrap();

        if step % 50 == 0 {
            let snapshot = analyser.capture_snapshot(now).unwrap();
            let records = analyser.latest_node_records().unwrap();
            let mut total = EnergyBreakdown::default();
            for record in records {
                let prev = prev_energy[record.node_id as usize];
                assert!(record.energy.disabled >= prev.disabled);
                assert!(record.energy.sleep >= prev.sleep);
                assert!(record.energy.tx >= prev.tx);
                assert!(record.energy.rx >= prev.rx);
                prev_energy[record.node_id as usize] = record.energy;
                total = total + record.energy;
            }
            assert_abs_diff_eq!(snapshot.energy.tx, total.tx / node_count as f64, epsilon = 1e-6);
            assert_abs_diff_eq!(snapshot.energy.rx, total.rx / node_count as f64, epsilon = 1e-6);
        }
    }

    analyser.capture_snapshot(now).unwrap();
    for id in 0..node_count {
        let radio = analyser.node(id).unwrap().radio();
        assert_eq!(radio.total_time(), now - start_times[id as usize]);
    }
    assert_eq!(analyser.network_history().len(), analyser.node_history().len());
    assert_eq!(analyser.network_history().len(), 41);
}
