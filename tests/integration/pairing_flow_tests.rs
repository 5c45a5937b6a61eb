//! Pairing window → admission → join accept, end to end through `tick`.

use farmcoord::app::commands::{AppCommand, NodeCommand};
use farmcoord::app::events::AppEvent;
use farmcoord::config::PairingPolicy;
use farmcoord::error::RegistryError;
use farmcoord::radio::pairing::CloseReason;

use crate::mock_hw::{
    COORD, FARM, MockStorage, mac, online, pair, started, started_with, test_config,
};

const T7_JOIN: &str = r#"{"msg":"join_request","node_id":"T7"}"#;

#[test]
fn single_node_window_admits_and_closes_at_first_join() {
    let mut cfg = test_config();
    cfg.pairing.policy = PairingPolicy::SingleNode;
    let (mut coord, mut sink) = started(cfg);

    coord
        .handle_command(AppCommand::OpenPairing { duration_ms: Some(5_000) }, 0, &mut sink)
        .unwrap();
    assert!(coord.radio().pairing_window().is_open());

    coord.radio_mut().driver_mut().inject(mac(7), T7_JOIN);
    coord.tick(200, &mut sink);

    let node = coord.registry().lookup("T7").expect("T7 admitted");
    assert_eq!(node.last_seen_ms, 200);
    assert_eq!(node.addr, mac(7));
    assert!(!coord.radio().pairing_window().is_open());
    assert!(sink
        .events
        .contains(&AppEvent::PairingClosed(CloseReason::Satisfied)));
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::NodeAdmitted { node_id } if node_id == "T7")),
        1
    );
}

#[test]
fn until_timeout_window_stays_open_to_deadline() {
    let mut cfg = test_config();
    cfg.pairing.policy = PairingPolicy::UntilTimeout;
    let (mut coord, mut sink) = started(cfg);

    coord
        .handle_command(AppCommand::OpenPairing { duration_ms: Some(5_000) }, 0, &mut sink)
        .unwrap();
    coord.radio_mut().driver_mut().inject(mac(7), T7_JOIN);
    coord.tick(200, &mut sink);

    assert_eq!(coord.registry().lookup("T7").unwrap().last_seen_ms, 200);
    assert!(coord.radio().pairing_window().is_open());

    coord.tick(4_999, &mut sink);
    assert!(coord.radio().pairing_window().is_open());

    coord.tick(5_000, &mut sink);
    assert!(!coord.radio().pairing_window().is_open());
    assert!(sink
        .events
        .contains(&AppEvent::PairingClosed(CloseReason::Expired)));
}

#[test]
fn join_drained_after_deadline_is_not_admitted() {
    let mut cfg = test_config();
    cfg.pairing.policy = PairingPolicy::UntilTimeout;
    let (mut coord, mut sink) = started(cfg);

    coord
        .handle_command(AppCommand::OpenPairing { duration_ms: Some(5_000) }, 0, &mut sink)
        .unwrap();
    coord.radio_mut().driver_mut().inject(mac(7), T7_JOIN);
    coord.tick(6_000, &mut sink);

    assert!(coord.registry().lookup("T7").is_none());
    assert!(!coord.radio().driver().peers.contains(&mac(7)));
    assert!(!coord.radio().pairing_window().is_open());
    assert!(sink
        .events
        .contains(&AppEvent::PairingClosed(CloseReason::Expired)));
    assert_eq!(coord.counters().unknown_sender, 1);
}

#[test]
fn join_accept_carries_identity_and_channel() {
    let mut cfg = test_config();
    cfg.radio.channel = 6;
    let (mut coord, mut sink) = started(cfg);
    pair(&mut coord, &mut sink, mac(7), "T7", 100);

    let accepts = coord
        .radio()
        .driver()
        .sent_of_kind(&mac(7), "tower_join_accept");
    assert_eq!(accepts.len(), 1);
    assert_eq!(accepts[0]["tower_id"], "T7");
    assert_eq!(accepts[0]["coord_id"], COORD);
    assert_eq!(accepts[0]["farm_id"], FARM);
    assert_eq!(accepts[0]["wifi_channel"], 6);
    assert_eq!(accepts[0]["cfg"]["telemetry_interval_ms"], 30_000);
}

#[test]
fn unknown_sender_outside_window_is_ignored() {
    let (mut coord, mut sink) = started(test_config());
    coord.radio_mut().driver_mut().inject(mac(7), T7_JOIN);
    coord.tick(100, &mut sink);

    assert!(coord.registry().is_empty());
    assert_eq!(coord.counters().unknown_sender, 1);
    assert!(coord.radio().driver().sent.is_empty());
}

#[test]
fn node_without_claimed_id_gets_mac_derived_id() {
    let (mut coord, mut sink) = started(test_config());
    coord
        .handle_command(AppCommand::OpenPairing { duration_ms: None }, 0, &mut sink)
        .unwrap();
    coord
        .radio_mut()
        .driver_mut()
        .inject(mac(0x42), r#"{"msg":"join_request"}"#);
    coord.tick(50, &mut sink);

    assert_eq!(coord.registry().len(), 1);
    let node = coord.registry().all().next().unwrap();
    assert_eq!(node.addr, mac(0x42));
    assert!(!node.node_id.is_empty());
}

#[test]
fn full_registry_rejects_without_evicting() {
    let mut cfg = test_config();
    cfg.radio.max_peers = 2;
    cfg.pairing.policy = PairingPolicy::UntilTimeout;
    let (mut coord, mut sink) = started(cfg);

    coord
        .handle_command(AppCommand::OpenPairing { duration_ms: Some(10_000) }, 0, &mut sink)
        .unwrap();
    for (i, id) in ["T1", "T2", "T3"].iter().enumerate() {
        let json = format!(r#"{{"msg":"join_request","node_id":"{id}"}}"#);
        coord.radio_mut().driver_mut().inject(mac(i as u8 + 1), &json);
    }
    coord.tick(100, &mut sink);

    assert_eq!(coord.registry().len(), 2);
    assert!(coord.registry().lookup("T1").is_some());
    assert!(coord.registry().lookup("T2").is_some());
    assert!(coord.registry().lookup("T3").is_none());
    assert!(!coord.radio().driver().peers.contains(&mac(3)));
    assert_eq!(coord.counters().registry_full, 1);
    assert_eq!(
        sink.count(|e| matches!(
            e,
            AppEvent::PairingRejected {
                reason: RegistryError::Full,
                ..
            }
        )),
        1
    );
}

#[test]
fn send_to_unknown_node_is_refused() {
    let (mut coord, mut sink) = started(test_config());
    let result = coord.handle_command(
        AppCommand::Node {
            node_id: "ghost".try_into().unwrap(),
            command: NodeCommand::SetDuty(50),
        },
        0,
        &mut sink,
    );
    assert_eq!(result, Err("unknown node"));
    assert!(coord.radio().driver().sent.is_empty());
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::CommandFailed { reason: "unknown node", .. })),
        1
    );
}

#[test]
fn unpair_removes_peer_and_node() {
    let (mut coord, mut sink) = started(test_config());
    pair(&mut coord, &mut sink, mac(7), "T7", 0);
    assert!(coord.radio().driver().peers.contains(&mac(7)));

    coord
        .handle_command(AppCommand::Unpair("T7".try_into().unwrap()), 10, &mut sink)
        .unwrap();
    assert!(coord.registry().lookup("T7").is_none());
    assert!(!coord.radio().driver().peers.contains(&mac(7)));

    assert_eq!(
        coord.handle_command(AppCommand::Unpair("T7".try_into().unwrap()), 20, &mut sink),
        Err("unknown node")
    );
}

#[test]
fn manual_close_publishes_completion() {
    let (mut coord, mut sink) = online(test_config());
    coord
        .handle_command(AppCommand::OpenPairing { duration_ms: Some(30_000) }, 100, &mut sink)
        .unwrap();
    coord
        .handle_command(AppCommand::ClosePairing, 200, &mut sink)
        .unwrap();

    let broker = coord.uplink().broker();
    let complete = broker.published_on("pairing/complete");
    assert_eq!(complete.len(), 1);
    assert_eq!(complete[0]["reason"], "stopped");

    let status = broker.published_on("pairing/status");
    let events: Vec<_> = status.iter().map(|s| s["event"].clone()).collect();
    assert_eq!(events, ["window_opened", "window_closed"]);
}

#[test]
fn paired_nodes_survive_reboot() {
    let storage = MockStorage::default();
    let (mut coord, mut sink) = started_with(test_config(), storage.clone());
    pair(&mut coord, &mut sink, mac(7), "T7", 0);
    pair(&mut coord, &mut sink, mac(8), "T8", 100);
    drop(coord);

    let (rebooted, _) = started_with(test_config(), storage);

    let ids: Vec<_> = rebooted.registry().all().map(|n| n.node_id.as_str().to_owned()).collect();
    assert_eq!(ids, ["T7", "T8"]);
    assert!(rebooted.radio().driver().peers.contains(&mac(7)));
    assert!(rebooted.radio().driver().peers.contains(&mac(8)));
}
