//! Wi-Fi link lifecycle: provisioning, backoff, offline and recovery.

use farmcoord::app::commands::AppCommand;
use farmcoord::app::coordinator::Coordinator;
use farmcoord::app::events::AppEvent;
use farmcoord::app::ports::ConnectPoll;
use farmcoord::config::WifiCredentials;
use farmcoord::link::LinkState;

use crate::mock_hw::{
    RecordingSink, online, peripherals, provisioned_storage, started, test_config,
};

fn creds() -> WifiCredentials {
    WifiCredentials::new("GreenhouseAP", "hunter2hunter2").unwrap()
}

#[test]
fn provisioning_from_offline_connects_and_persists() {
    let (mut coord, mut sink) = started(test_config());
    assert_eq!(coord.link().state(), LinkState::Offline);
    sink.clear();

    coord
        .handle_command(AppCommand::Provision(creds()), 1_000, &mut sink)
        .unwrap();
    assert_eq!(coord.link().state(), LinkState::Connecting);
    assert_eq!(
        coord.link().wifi().last_ssid.as_deref(),
        Some("GreenhouseAP")
    );
    let stored = WifiCredentials::load(coord.storage()).unwrap().unwrap();
    assert_eq!(stored.ssid.as_str(), "GreenhouseAP");

    coord.tick(1_010, &mut sink);
    assert!(coord.link().is_connected());
    assert_eq!(
        sink.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::LinkChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect::<Vec<_>>(),
        [LinkState::Connecting, LinkState::Connected]
    );

    let snap = coord.snapshot(1_020);
    assert!(snap.wifi_connected);
    assert_eq!(snap.wifi_rssi, Some(-55));
}

#[test]
fn provisioning_while_connected_is_refused() {
    let (mut coord, mut sink) = online(test_config());
    assert_eq!(
        coord.handle_command(AppCommand::Provision(creds()), 100, &mut sink),
        Err("link busy")
    );

    coord.uplink_mut().broker_mut().deliver(
        "cmd",
        r#"{"cmd":"wifi.config","ssid":"Other","password":"password123"}"#,
    );
    coord.tick(200, &mut sink);
    let acks = coord.uplink().broker().acks();
    assert_eq!(acks[0]["cmd"], "wifi.config");
    assert_eq!(acks[0]["reason"], "link busy");
    assert_eq!(coord.link().wifi().attempts, 1);
}

#[test]
fn short_password_is_rejected_before_the_link() {
    let (mut coord, mut sink) = online(test_config());
    coord.uplink_mut().broker_mut().deliver(
        "cmd",
        r#"{"cmd":"wifi_config","ssid":"Other","password":"short"}"#,
    );
    coord.tick(100, &mut sink);
    assert_eq!(
        coord.uplink().broker().acks()[0]["reason"],
        "invalid credentials"
    );
}

#[test]
fn repeated_failures_back_off_then_go_offline() {
    let mut hw = peripherals(provisioned_storage());
    hw.wifi.outcome = ConnectPoll::Failed;
    let mut coord = Coordinator::new(test_config(), hw);
    let mut sink = RecordingSink::default();
    coord.begin(0, &mut sink).unwrap();
    assert_eq!(coord.link().state(), LinkState::Connecting);

    let mut now = 10;
    let mut backoffs = Vec::new();
    for _ in 0..50 {
        coord.tick(now, &mut sink);
        match coord.link().state() {
            LinkState::Disconnected => {
                backoffs.push(coord.link().last_backoff_ms());
                now = coord.link().next_attempt_ms();
            }
            LinkState::Offline => break,
            _ => now += 10,
        }
    }

    assert_eq!(backoffs, [1_000, 2_000, 4_000, 8_000, 16_000]);
    assert_eq!(coord.link().state(), LinkState::Offline);
    assert_eq!(coord.link().wifi().attempts, 6);
    assert!(!coord.uplink().is_up());

    // The slow probe retries on its own once the AP is back.
    coord.link_mut().wifi_mut().outcome = ConnectPoll::Connected;
    let probe_at = coord.link().next_attempt_ms();
    coord.tick(probe_at - 1, &mut sink);
    assert_eq!(coord.link().state(), LinkState::Offline);
    coord.tick(probe_at, &mut sink);
    assert_eq!(coord.link().state(), LinkState::Connecting);
    coord.tick(probe_at + 10, &mut sink);
    assert!(coord.link().is_connected());
    assert_eq!(coord.link().failures(), 0);
}

#[test]
fn pending_connect_times_out() {
    let mut hw = peripherals(provisioned_storage());
    hw.wifi.outcome = ConnectPoll::Pending;
    let mut coord = Coordinator::new(test_config(), hw);
    let mut sink = RecordingSink::default();
    coord.begin(0, &mut sink).unwrap();

    coord.tick(9_999, &mut sink);
    assert_eq!(coord.link().state(), LinkState::Connecting);
    coord.tick(10_000, &mut sink);
    assert_eq!(coord.link().state(), LinkState::Disconnected);
    assert_eq!(coord.link().failures(), 1);
}

#[test]
fn lost_link_closes_session_and_reconnects() {
    let (mut coord, mut sink) = online(test_config());
    coord.link_mut().wifi_mut().connected = false;

    coord.tick(100, &mut sink);
    assert_eq!(coord.link().state(), LinkState::Disconnected);
    assert!(sink.events.contains(&AppEvent::LinkChanged {
        from: LinkState::Connected,
        to: LinkState::Disconnected,
    }));

    coord.tick(200, &mut sink);
    assert!(!coord.uplink().is_up());
    assert!(!coord.uplink().broker().connected);
    let status = coord.uplink().broker().published_on("status/connection");
    assert_eq!(status.last().unwrap()["status"], "offline");
    assert_eq!(status.last().unwrap()["mqtt_connected"], false);

    // Base backoff after a drop, then straight back up.
    coord.tick(1_099, &mut sink);
    assert_eq!(coord.link().state(), LinkState::Disconnected);
    coord.tick(1_100, &mut sink);
    coord.tick(1_110, &mut sink);
    coord.tick(1_120, &mut sink);
    assert!(coord.uplink().is_up());
    assert_eq!(coord.uplink().broker().connects, 2);
    assert_eq!(coord.link().wifi().attempts, 2);
}
