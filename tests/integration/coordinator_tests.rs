//! Boot, thermal, zone and config behaviour of the whole coordinator.

use farmcoord::app::commands::{AppCommand, ConfigPatch, NodeCommand};
use farmcoord::app::coordinator::Coordinator;
use farmcoord::app::events::AppEvent;
use farmcoord::config::{self, CoordinatorConfig};
use farmcoord::error::RadioConfigError;
use farmcoord::link::LinkState;
use farmcoord::radar::ld2450::{RawTarget, encode_frame};
use farmcoord::registry::actuator_id_for;

use crate::mock_hw::{MockStorage, mac, pair, peripherals, started, started_with, test_config};

fn set_duty(duty: u8) -> AppCommand {
    AppCommand::Node {
        node_id: "T7".try_into().unwrap(),
        command: NodeCommand::SetDuty(duty),
    }
}

fn status_with_temp(t: f32) -> String {
    format!(r#"{{"msg":"node_status","node_id":"T7","temperature":{t}}}"#)
}

fn person_at(x_mm: i16, y_mm: i16) -> [u8; 30] {
    encode_frame(&[
        RawTarget {
            x_mm,
            y_mm,
            speed_cm_s: 0,
            resolution_mm: 360,
        },
        RawTarget::default(),
        RawTarget::default(),
    ])
}

fn empty_frame() -> [u8; 30] {
    encode_frame(&[RawTarget::default(); 3])
}

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn begin_without_credentials_goes_offline() {
    let (coord, sink) = started(test_config());
    assert_eq!(coord.link().state(), LinkState::Offline);
    assert_eq!(
        sink.events,
        vec![
            AppEvent::LinkChanged {
                from: LinkState::Disconnected,
                to: LinkState::Offline,
            },
            AppEvent::Started { nodes: 0 },
        ]
    );
    assert_eq!(coord.radio().driver().configured, Some((1, 20)));
}

#[test]
fn invalid_channel_is_fatal() {
    let mut cfg = test_config();
    cfg.radio.channel = 14;
    let mut coord = Coordinator::new(cfg, peripherals(MockStorage::default()));
    let mut sink = crate::mock_hw::RecordingSink::default();
    assert_eq!(coord.begin(0, &mut sink), Err(RadioConfigError::InvalidChannel));
    assert!(sink.events.is_empty());
}

#[test]
fn driver_refusing_config_is_fatal() {
    let mut hw = peripherals(MockStorage::default());
    hw.radio.fail_configure = true;
    let mut coord = Coordinator::new(test_config(), hw);
    let mut sink = crate::mock_hw::RecordingSink::default();
    assert_eq!(coord.begin(0, &mut sink), Err(RadioConfigError::DriverInit));
}

// ── Peer frames ───────────────────────────────────────────────

#[test]
fn malformed_peer_frame_is_counted_and_skipped() {
    let (mut coord, mut sink) = started(test_config());
    pair(&mut coord, &mut sink, mac(7), "T7", 0);

    coord.radio_mut().driver_mut().inject_raw(mac(7), b"{not json");
    coord
        .radio_mut()
        .driver_mut()
        .inject(mac(7), &status_with_temp(30.0));
    coord.tick(500, &mut sink);

    assert_eq!(coord.counters().malformed_peer, 1);
    let node = coord.registry().lookup("T7").unwrap();
    assert_eq!(node.last_seen_ms, 500);
    assert_eq!(node.temperature_c, Some(30.0));
}

// ── Thermal ───────────────────────────────────────────────────

#[test]
fn hot_node_is_derated_one_step_per_sample() {
    let (mut coord, mut sink) = started(test_config());
    pair(&mut coord, &mut sink, mac(7), "T7", 0);
    coord.handle_command(set_duty(80), 10, &mut sink).unwrap();

    coord
        .radio_mut()
        .driver_mut()
        .inject(mac(7), &status_with_temp(52.0));
    coord.tick(100, &mut sink);

    let node = coord.registry().lookup("T7").unwrap();
    assert!(node.is_derated);
    assert_eq!(node.deration_level, 75);
    assert_eq!(coord.thermal().ceiling("T7"), 75);

    let lights = coord.radio().driver().sent_of_kind(&mac(7), "set_light");
    assert_eq!(lights.len(), 1);
    assert_eq!(lights[0]["value"], 75);
    assert_eq!(lights[0]["reason"], "thermal");
    assert_eq!(lights[0]["light_id"], actuator_id_for(&mac(7)).as_str());

    // Still above the second threshold: one more step.
    coord
        .radio_mut()
        .driver_mut()
        .inject(mac(7), &status_with_temp(52.0));
    coord.tick(200, &mut sink);
    assert_eq!(coord.thermal().ceiling("T7"), 50);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::Thermal(_))),
        2
    );
}

#[test]
fn commanded_duty_is_clamped_to_ceiling() {
    let (mut coord, mut sink) = started(test_config());
    pair(&mut coord, &mut sink, mac(7), "T7", 0);
    coord
        .radio_mut()
        .driver_mut()
        .inject(mac(7), &status_with_temp(47.0));
    coord.tick(100, &mut sink);
    assert_eq!(coord.thermal().ceiling("T7"), 75);

    coord.handle_command(set_duty(90), 200, &mut sink).unwrap();

    let cmds = coord.radio().driver().sent_of_kind(&mac(7), "tower_command");
    let last = cmds.last().unwrap();
    assert_eq!(last["command"], "set_duty");
    assert_eq!(last["duty"], 75);
    assert_eq!(coord.registry().lookup("T7").unwrap().last_duty, 90);
}

#[test]
fn cool_down_restores_last_requested_duty() {
    let (mut coord, mut sink) = started(test_config());
    pair(&mut coord, &mut sink, mac(7), "T7", 0);
    coord.handle_command(set_duty(90), 10, &mut sink).unwrap();

    coord
        .radio_mut()
        .driver_mut()
        .inject(mac(7), &status_with_temp(47.0));
    coord.tick(100, &mut sink);
    // 41 < 45 - 3: recover.
    coord
        .radio_mut()
        .driver_mut()
        .inject(mac(7), &status_with_temp(41.0));
    coord.tick(200, &mut sink);

    let lights = coord.radio().driver().sent_of_kind(&mac(7), "set_light");
    let values: Vec<_> = lights.iter().map(|l| l["value"].as_u64().unwrap()).collect();
    assert_eq!(values, [75, 90]);
    assert!(!coord.registry().lookup("T7").unwrap().is_derated);
}

// ── Zones ─────────────────────────────────────────────────────

#[test]
fn occupancy_drives_zone_actuators() {
    let mut cfg = test_config();
    cfg.zones.zones[0]
        .actuators
        .push(actuator_id_for(&mac(7)))
        .unwrap();
    let (mut coord, mut sink) = started(cfg);
    pair(&mut coord, &mut sink, mac(7), "T7", 0);

    coord.radar_mut().port_mut().rx.extend(person_at(200, 1500));
    coord.tick(100, &mut sink);

    assert_eq!(coord.zones().is_occupied("zone-1"), Some(true));
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::ZoneChanged { occupied: true, .. })),
        1
    );
    let lights = coord.radio().driver().sent_of_kind(&mac(7), "set_light");
    assert_eq!(lights.len(), 1);
    assert_eq!(lights[0]["value"], 100);
    assert_eq!(lights[0]["reason"], "zone");

    // A second occupied frame is not an edge; nothing more is sent.
    coord.radar_mut().port_mut().rx.extend(person_at(250, 1500));
    coord.tick(200, &mut sink);
    assert_eq!(
        coord.radio().driver().sent_of_kind(&mac(7), "set_light").len(),
        1
    );

    // Vacated after five empty updates.
    for i in 0..5u64 {
        coord.radar_mut().port_mut().rx.extend(empty_frame());
        coord.tick(300 + i * 100, &mut sink);
    }
    assert_eq!(coord.zones().is_occupied("zone-1"), Some(false));
    let lights = coord.radio().driver().sent_of_kind(&mac(7), "set_light");
    assert_eq!(lights.len(), 2);
    assert_eq!(lights[1]["value"], 0);
}

#[test]
fn radar_feeds_snapshot_confidence() {
    let (mut coord, mut sink) = started(test_config());
    coord.radar_mut().port_mut().rx.extend(person_at(-500, 800));
    coord.tick(100, &mut sink);

    let snap = coord.snapshot(150);
    assert!(snap.radar_online);
    assert!(snap.radar_presence);
    assert!((snap.radar_confidence - 1.0 / 3.0).abs() < 1e-6);
    assert_eq!(snap.light_lux, Some(320.0));
    assert_eq!(snap.temperature_c, Some(22.5));
    assert!(!snap.wifi_connected);
    assert_eq!(snap.wifi_rssi, None);

    // Stream goes quiet: offline, and presence is not reported.
    coord.tick(5_000, &mut sink);
    let snap = coord.snapshot(5_000);
    assert!(!snap.radar_online);
    assert!(!snap.radar_presence);
    assert_eq!(snap.radar_confidence, 0.0);
}

#[test]
fn corrupt_radar_bytes_are_counted() {
    let (mut coord, mut sink) = started(test_config());
    let mut frame = person_at(100, 1000);
    frame[28] = 0x00; // break the tail
    coord.radar_mut().port_mut().rx.extend(frame);
    coord.tick(100, &mut sink);
    assert_eq!(coord.counters().malformed_radar, 1);
    assert_eq!(coord.zones().is_occupied("zone-1"), Some(false));
}

// ── Runtime config ────────────────────────────────────────────

#[test]
fn config_update_is_saved_after_debounce() {
    let storage = MockStorage::default();
    let (mut coord, mut sink) = started_with(test_config(), storage.clone());

    let patch = ConfigPatch {
        telemetry_interval_ms: Some(10_000),
        ..ConfigPatch::default()
    };
    coord
        .handle_command(AppCommand::UpdateConfig(patch), 1_000, &mut sink)
        .unwrap();
    assert!(coord.is_config_dirty());
    assert_eq!(coord.config().telemetry.coordinator_interval_ms, 10_000);

    coord.tick(5_999, &mut sink);
    assert!(coord.is_config_dirty());
    assert_eq!(
        config::load_config(&storage).unwrap(),
        CoordinatorConfig::default()
    );

    coord.tick(6_000, &mut sink);
    assert!(!coord.is_config_dirty());
    let saved = config::load_config(&storage).unwrap();
    assert_eq!(saved.telemetry.coordinator_interval_ms, 10_000);
}

#[test]
fn invalid_config_update_is_refused() {
    let (mut coord, mut sink) = started(test_config());
    let patch = ConfigPatch {
        telemetry_interval_ms: Some(10),
        ..ConfigPatch::default()
    };
    let r = coord.handle_command(AppCommand::UpdateConfig(patch), 0, &mut sink);
    assert!(r.is_err());
    assert!(!coord.is_config_dirty());
    assert_eq!(coord.config().telemetry.coordinator_interval_ms, 5_000);
}

#[test]
fn failed_send_is_counted_not_fatal() {
    let (mut coord, mut sink) = started(test_config());
    pair(&mut coord, &mut sink, mac(7), "T7", 0);
    coord.radio_mut().driver_mut().fail_send = true;

    assert_eq!(
        coord.handle_command(set_duty(50), 10, &mut sink),
        Err("send failed")
    );
    assert_eq!(coord.counters().send_failures, 1);
    assert_eq!(coord.registry().lookup("T7").unwrap().last_duty, 0);
}
