//! Broker session, inbound command dispatch and outbound publishing.

use farmcoord::app::events::AppEvent;
use farmcoord::radar::ld2450::{RawTarget, encode_frame};

use crate::mock_hw::{
    PREFIX, mac, online, pair, provisioned_storage, started, started_with, test_config,
};

#[test]
fn session_up_announces_online_and_subscribes() {
    let (mut coord, mut sink) = started_with(test_config(), provisioned_storage());
    coord.tick(10, &mut sink);
    assert!(!coord.uplink().is_up());
    coord.tick(20, &mut sink);
    assert!(coord.uplink().is_up());

    let broker = coord.uplink().broker();
    assert_eq!(broker.connects, 1);
    assert_eq!(
        broker.subscriptions,
        [
            format!("{PREFIX}/cmd"),
            format!("{PREFIX}/tower/+/cmd"),
            format!("{PREFIX}/reservoir/cmd"),
        ]
    );

    let (topic, body, retain) = &broker.published[0];
    assert_eq!(topic, &format!("{PREFIX}/status/connection"));
    assert!(*retain);
    let body: serde_json::Value = serde_json::from_slice(body).unwrap();
    assert_eq!(body["status"], "online");
    assert_eq!(body["wifi_connected"], true);
    assert_eq!(body["wifi_rssi"], -55);
}

#[test]
fn last_will_marks_coordinator_offline() {
    let (coord, _) = online(test_config());
    let will = coord.uplink().broker().will.clone().unwrap();
    assert_eq!(will.topic, format!("{PREFIX}/status/connection"));
    let body: serde_json::Value = serde_json::from_slice(&will.payload).unwrap();
    assert_eq!(body["status"], "offline");
    assert_eq!(body["reason"], "unclean_disconnect");
}

#[test]
fn no_broker_host_stays_local() {
    let mut cfg = test_config();
    cfg.broker.host.clear();
    let (mut coord, mut sink) = started_with(cfg, provisioned_storage());
    coord.tick(10, &mut sink);
    coord.tick(20, &mut sink);
    assert!(coord.link().is_connected());
    assert!(!coord.uplink().is_up());
    assert_eq!(coord.uplink().broker().connects, 0);
}

#[test]
fn pair_command_is_acked_with_cmd_id() {
    let (mut coord, mut sink) = online(test_config());
    coord
        .uplink_mut()
        .broker_mut()
        .deliver("cmd", r#"{"cmd":"pair","duration_ms":10000,"cmd_id":"abc"}"#);
    coord.tick(100, &mut sink);

    assert!(coord.radio().pairing_window().is_open());
    let acks = coord.uplink().broker().acks();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0]["cmd"], "pair");
    assert_eq!(acks[0]["ok"], true);
    assert_eq!(acks[0]["cmd_id"], "abc");

    let status = coord.uplink().broker().published_on("pairing/status");
    assert_eq!(status[0]["event"], "window_opened");
    assert_eq!(status[0]["open"], true);
    assert_eq!(status[0]["duration_ms"], 10_000);
}

#[test]
fn tower_command_forwarded_over_radio() {
    let (mut coord, mut sink) = online(test_config());
    pair(&mut coord, &mut sink, mac(7), "T7", 100);

    coord
        .uplink_mut()
        .broker_mut()
        .deliver("tower/T7/cmd", r#"{"cmd":"set_duty","duty":40,"cmd_id":"c9"}"#);
    coord.tick(200, &mut sink);

    let cmds = coord.radio().driver().sent_of_kind(&mac(7), "tower_command");
    assert_eq!(cmds.len(), 1);
    assert_eq!(cmds[0]["tower_id"], "T7");
    assert_eq!(cmds[0]["command"], "set_duty");
    assert_eq!(cmds[0]["duty"], 40);
    assert_eq!(cmds[0]["cmd_id"], "c9");

    let acks = coord.uplink().broker().acks();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0]["ok"], true);
    assert_eq!(acks[0]["node_id"], "T7");
    assert_eq!(coord.registry().lookup("T7").unwrap().last_duty, 40);
}

#[test]
fn command_for_unpaired_tower_is_nacked() {
    let (mut coord, mut sink) = online(test_config());
    coord
        .uplink_mut()
        .broker_mut()
        .deliver("tower/T9/cmd", r#"{"cmd":"reboot"}"#);
    coord.tick(100, &mut sink);

    let acks = coord.uplink().broker().acks();
    assert_eq!(acks[0]["ok"], false);
    assert_eq!(acks[0]["reason"], "unknown node");
    assert_eq!(acks[0]["node_id"], "T9");
    assert!(coord.radio().driver().sent.is_empty());
}

#[test]
fn unknown_command_is_nacked() {
    let (mut coord, mut sink) = online(test_config());
    coord
        .uplink_mut()
        .broker_mut()
        .deliver("cmd", r#"{"cmd":"LED.SET","r":255}"#);
    coord.tick(100, &mut sink);

    let acks = coord.uplink().broker().acks();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0]["cmd"], "led.set");
    assert_eq!(acks[0]["ok"], false);
    assert_eq!(acks[0]["reason"], "unknown command");
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::CommandFailed { reason: "unknown command", .. })),
        1
    );
}

#[test]
fn reservoir_commands_are_unsupported() {
    let (mut coord, mut sink) = online(test_config());
    coord
        .uplink_mut()
        .broker_mut()
        .deliver("reservoir/cmd", r#"{"cmd":"dose","ml":20}"#);
    coord.tick(100, &mut sink);

    let acks = coord.uplink().broker().acks();
    assert_eq!(acks[0]["cmd"], "dose");
    assert_eq!(acks[0]["reason"], "unsupported");
}

#[test]
fn malformed_command_is_dropped_without_ack() {
    let (mut coord, mut sink) = online(test_config());
    let broker = coord.uplink_mut().broker_mut();
    broker.deliver("cmd", "garbage");
    broker.deliver("cmd", r#"{"duty":1}"#);
    coord.tick(100, &mut sink);

    assert!(coord.uplink().broker().acks().is_empty());
    assert_eq!(coord.counters().malformed_command, 2);
}

#[test]
fn unpair_over_uplink() {
    let (mut coord, mut sink) = online(test_config());
    pair(&mut coord, &mut sink, mac(7), "T7", 100);
    pair(&mut coord, &mut sink, mac(8), "T8", 200);

    coord
        .uplink_mut()
        .broker_mut()
        .deliver("cmd", r#"{"cmd":"unpair","node_id":"T7"}"#);
    coord.tick(300, &mut sink);
    assert!(coord.registry().lookup("T7").is_none());
    assert_eq!(coord.registry().len(), 1);

    coord
        .uplink_mut()
        .broker_mut()
        .deliver("cmd", r#"{"cmd":"unpair","all":true}"#);
    coord.tick(400, &mut sink);
    assert!(coord.registry().is_empty());
    assert!(coord.radio().driver().peers.is_empty());
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::NodeRemoved { .. })),
        2
    );
}

#[test]
fn status_command_publishes_telemetry_now() {
    let (mut coord, mut sink) = online(test_config());
    coord
        .uplink_mut()
        .broker_mut()
        .deliver("cmd", r#"{"cmd":"status"}"#);
    coord.tick(100, &mut sink);

    let telemetry = coord.uplink().broker().published_on("telemetry");
    assert_eq!(telemetry.len(), 1);
    assert_eq!(telemetry[0]["farm_id"], "farm001");
    assert_eq!(telemetry[0]["light_lux"], 320.0);
    assert_eq!(telemetry[0]["wifi_connected"], true);
    assert_eq!(telemetry[0]["nodes"], 0);
    assert!(telemetry[0]["diag"].is_object());
    assert_eq!(coord.uplink().broker().acks()[0]["ok"], true);
}

#[test]
fn coordinator_telemetry_is_periodic() {
    let (mut coord, mut sink) = online(test_config());
    coord.tick(4_999, &mut sink);
    assert!(coord.uplink().broker().published_on("telemetry").is_empty());
    coord.tick(5_000, &mut sink);
    coord.tick(5_020, &mut sink);
    assert_eq!(coord.uplink().broker().published_on("telemetry").len(), 1);
    coord.tick(10_000, &mut sink);
    assert_eq!(coord.uplink().broker().published_on("telemetry").len(), 2);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::Telemetry(_))), 2);
}

#[test]
fn node_traffic_is_bridged() {
    let (mut coord, mut sink) = online(test_config());
    pair(&mut coord, &mut sink, mac(7), "T7", 100);

    let radio = coord.radio_mut().driver_mut();
    radio.inject(
        mac(7),
        r#"{"msg":"tower_telemetry","tower_id":"T7","air_temp_c":24.5,"pump_on":true}"#,
    );
    radio.inject(
        mac(7),
        r#"{"msg":"node_status","node_id":"T7","status_mode":"operational","temperature":56.0}"#,
    );
    coord.tick(200, &mut sink);

    let broker = coord.uplink().broker();
    let telemetry = broker.published_on("tower/T7/telemetry");
    assert_eq!(telemetry.len(), 1);
    assert_eq!(telemetry[0]["tower_id"], "T7");
    assert_eq!(telemetry[0]["coord_id"], crate::mock_hw::COORD);
    assert_eq!(telemetry[0]["air_temp_c"], 24.5);
    assert_eq!(telemetry[0]["pump_on"], true);

    let status = broker.published_on("tower/T7/status");
    assert_eq!(status.len(), 1);
    assert_eq!(status[0]["status_mode"], "operational");
    assert_eq!(status[0]["stale"], false);

    let thermal = broker.published_on("tower/T7/thermal");
    assert_eq!(thermal.len(), 1);
    assert_eq!(thermal[0]["is_derated"], true);
    assert_eq!(thermal[0]["deration_level"], 75);
}

#[test]
fn node_ack_is_parked_until_session_returns() {
    let (mut coord, mut sink) = started(test_config());
    pair(&mut coord, &mut sink, mac(7), "T7", 0);
    coord
        .radio_mut()
        .driver_mut()
        .inject(mac(7), r#"{"msg":"ack","cmd_id":"c1"}"#);
    coord.tick(100, &mut sink);
    assert_eq!(coord.uplink().pending_acks(), 1);
    assert!(coord.counters().publish_dropped > 0);

    let creds = farmcoord::config::WifiCredentials::new("FarmNet", "password123").unwrap();
    coord
        .handle_command(
            farmcoord::app::commands::AppCommand::Provision(creds),
            1_000,
            &mut sink,
        )
        .unwrap();
    coord.tick(1_010, &mut sink);
    coord.tick(1_020, &mut sink);

    assert!(coord.uplink().is_up());
    assert_eq!(coord.uplink().pending_acks(), 0);
    let acks = coord.uplink().broker().acks();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0]["cmd"], "node_ack");
    assert_eq!(acks[0]["node_id"], "T7");
    assert_eq!(acks[0]["cmd_id"], "c1");
}

#[test]
fn lost_session_resubscribes_on_return() {
    let (mut coord, mut sink) = online(test_config());
    coord.uplink_mut().broker_mut().connected = false;
    coord.tick(100, &mut sink);
    assert!(!coord.uplink().is_up());

    coord
        .uplink_mut()
        .broker_mut()
        .deliver("cmd", r#"{"cmd":"status"}"#);
    coord.uplink_mut().broker_mut().connected = true;
    coord.tick(200, &mut sink);

    let broker = coord.uplink().broker();
    assert!(coord.uplink().is_up());
    assert_eq!(broker.subscriptions.len(), 6);
    assert_eq!(broker.published_on("status/connection").len(), 1);
    assert_eq!(broker.acks().len(), 1);
}

#[test]
fn radar_updates_are_throttled_on_mmwave() {
    let (mut coord, mut sink) = online(test_config());
    let frame = encode_frame(&[
        RawTarget {
            x_mm: -300,
            y_mm: 2000,
            speed_cm_s: 10,
            resolution_mm: 320,
        },
        RawTarget::default(),
        RawTarget::default(),
    ]);

    for now in [100u64, 200, 300, 1_200] {
        coord.radar_mut().port_mut().rx.extend(frame);
        coord.tick(now, &mut sink);
    }

    let mmwave = coord.uplink().broker().published_on("mmwave");
    // 100 (zone edge), then 1200 once the throttle lapses.
    assert_eq!(mmwave.len(), 2);
    assert_eq!(mmwave[0]["presence"], true);
    assert_eq!(mmwave[0]["zone_occupied"], true);
    assert_eq!(mmwave[0]["sensor_id"], "ld2450");
    assert_eq!(mmwave[0]["targets"].as_array().unwrap().len(), 3);
    assert_eq!(mmwave[0]["targets"][0]["x_mm"], -300);
}
