mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use common::{kill_externally, pid_alive, sleeper_script, write_script};
use sentinel_core::{
    EncoderPool, HardwareProbe, InputSupervisor, MulticastPool,
    StateRegistry, UplinkSupervisor, aggregated_state, set_configuration,
    set_intent,
};
use sentinel_model::{
    DeviceRegistry, IntentDocument, StreamConfiguration, StreamIntent,
    UdpStatus,
};
use tempfile::{TempDir, tempdir};
use tokio::time::sleep;

/// A probe whose inventory can be swapped between ticks.
struct ScriptedProbe {
    output: PathBuf,
}

impl ScriptedProbe {
    fn new(dir: &Path) -> (Self, PathBuf) {
        let output = dir.join("probe-output.json");
        fs::write(&output, "[]").expect("seed probe output");
        let script = write_script(
            dir,
            "fake-probe",
            &format!("#!/bin/sh\ncat {}\n", output.display()),
        );
        (ScriptedProbe { output }, script)
    }

    fn report(&self, inventory: &str) {
        fs::write(&self.output, inventory).expect("update probe output");
    }
}

fn one_device(signal_detected: bool) -> String {
    format!(
        r#"[{{"device_number": 0, "name": "DeckLink Duo 2",
             "inputs": [{{"id": "input_0", "port": "SDI 1",
                          "signal_detected": {signal_detected},
                          "format": {}}}]}}]"#,
        if signal_detected {
            "\"1920x1080@60\""
        } else {
            "null"
        }
    )
}

fn input_fixture(dir: &TempDir) -> (InputSupervisor, Arc<StateRegistry>, ScriptedProbe) {
    let registry = Arc::new(StateRegistry::new(dir.path().join("data")));
    let (scripted, probe_script) = ScriptedProbe::new(dir.path());
    let probe = HardwareProbe::new(&probe_script);
    let launcher = sleeper_script(dir.path(), "fake-gst");
    let pool = MulticastPool::with_launcher(launcher.display().to_string());
    let supervisor =
        InputSupervisor::new(Arc::clone(&registry), probe, pool);
    (supervisor, registry, scripted)
}

async fn read_inventory(registry: &StateRegistry) -> DeviceRegistry {
    registry
        .read("device_registry.json", DeviceRegistry::default())
        .await
}

#[tokio::test]
async fn cold_start_without_hardware_writes_empty_registry() {
    let dir = tempdir().expect("tempdir");
    let (mut supervisor, registry, _scripted) = input_fixture(&dir);

    supervisor.reset_stale_state().await;
    supervisor.tick().await;

    let inventory = read_inventory(&registry).await;
    assert!(inventory.devices.is_empty());

    let raw = fs::read_to_string(
        dir.path().join("data").join("device_registry.json"),
    )
    .unwrap();
    assert!(raw.contains("\"devices\""));

    let state = aggregated_state(&registry).await;
    assert_eq!(state.system_status, "No Signal");
}

#[tokio::test]
async fn signal_cycle_starts_and_stops_the_fanout_pipeline() {
    let dir = tempdir().expect("tempdir");
    let (mut supervisor, registry, scripted) = input_fixture(&dir);

    // No signal yet: registered but stopped.
    scripted.report(&one_device(false));
    supervisor.tick().await;
    let inventory = read_inventory(&registry).await;
    let input = inventory.find_input(0, "input_0").unwrap();
    assert_eq!(input.udp.status, UdpStatus::Stopped);
    assert_eq!(input.udp.multicast_ip, "239.0.0.1");
    assert_eq!(input.udp.video_port, 5000);
    assert_eq!(input.udp.audio_port, 5001);

    // Signal appears: fan-out pipeline comes up.
    scripted.report(&one_device(true));
    supervisor.tick().await;
    let inventory = read_inventory(&registry).await;
    let input = inventory.find_input(0, "input_0").unwrap();
    assert_eq!(input.udp.status, UdpStatus::Streaming);
    let pid = input.udp.pipeline_pid.expect("pipeline pid recorded");
    assert!(pid_alive(pid));

    let state = aggregated_state(&registry).await;
    assert_eq!(state.system_status, "Ready to Stream");

    // Signal disappears: pipeline torn down, pid cleared.
    scripted.report(&one_device(false));
    supervisor.tick().await;
    let inventory = read_inventory(&registry).await;
    let input = inventory.find_input(0, "input_0").unwrap();
    assert_eq!(input.udp.status, UdpStatus::Stopped);
    assert_eq!(input.udp.pipeline_pid, None);
    assert!(!pid_alive(pid));
}

#[tokio::test]
async fn vanished_fanout_pipeline_restarts_while_signal_holds() {
    let dir = tempdir().expect("tempdir");
    let (mut supervisor, registry, scripted) = input_fixture(&dir);

    scripted.report(&one_device(true));
    supervisor.tick().await;
    let first_pid = read_inventory(&registry)
        .await
        .find_input(0, "input_0")
        .unwrap()
        .udp
        .pipeline_pid
        .unwrap();

    kill_externally(first_pid);
    sleep(Duration::from_millis(100)).await;

    supervisor.tick().await;
    let input_after = read_inventory(&registry).await;
    let input = input_after.find_input(0, "input_0").unwrap();
    assert_eq!(input.udp.status, UdpStatus::Streaming);
    let second_pid = input.udp.pipeline_pid.unwrap();
    assert_ne!(second_pid, first_pid);
    assert!(pid_alive(second_pid));
}

#[tokio::test]
async fn stale_streaming_state_is_reset_on_startup() {
    let dir = tempdir().expect("tempdir");
    let (supervisor, registry, _scripted) = input_fixture(&dir);

    // A previous incarnation left a streaming record behind; its pid is
    // meaningless now.
    let mut stale = DeviceRegistry::default();
    stale.devices.insert(
        "decklink_0".into(),
        sentinel_model::DeviceEntry {
            name: "DeckLink Duo 2".into(),
            device_number: 0,
            inputs: vec![sentinel_model::InputEntry {
                id: "input_0".into(),
                port: "SDI 1".into(),
                signal_detected: true,
                format: Some("1920x1080@60".into()),
                udp: {
                    let mut udp =
                        sentinel_model::UdpEndpoints::assign(0, 0);
                    udp.status = UdpStatus::Streaming;
                    udp.pipeline_pid = Some(123_456);
                    udp
                },
            }],
        },
    );
    assert!(registry.write("device_registry.json", &stale).await);

    supervisor.reset_stale_state().await;

    let inventory = read_inventory(&registry).await;
    let input = inventory.find_input(0, "input_0").unwrap();
    assert_eq!(input.udp.status, UdpStatus::Stopped);
    assert_eq!(input.udp.pipeline_pid, None);
}

// ---- uplink scenarios ----

struct UplinkFixture {
    registry: Arc<StateRegistry>,
    supervisor: UplinkSupervisor,
    _dir: TempDir,
}

async fn uplink_fixture() -> UplinkFixture {
    let dir = tempdir().expect("tempdir");
    let registry = Arc::new(StateRegistry::new(dir.path().join("data")));

    let destinations = dir.path().join("stream_config.json");
    fs::write(
        &destinations,
        r#"{
          "destinations": {
            "youtube": {
              "name": "YouTube",
              "rtmp_url": "rtmp://a.rtmp.youtube.com/live2",
              "streams": [
                {"id": "main", "name": "Main Channel", "key": "abcd-1234"},
                {"id": "backup", "name": "Backup", "key": "efgh-5678"}
              ]
            }
          }
        }"#,
    )
    .unwrap();

    let presets = dir.path().join("encoding_presets.json");
    fs::write(
        &presets,
        r#"{
          "presets": {
            "hd": {
              "name": "Full HD 1080p",
              "variants": [
                {"id": "hd_high", "name": "High Bitrate",
                 "width": 1920, "height": 1080, "fps": 60, "bitrate": 6000}
              ]
            }
          }
        }"#,
    )
    .unwrap();

    // The input supervisor's side of the world: one input with a live
    // fan-out pipeline.
    let mut inventory = DeviceRegistry::default();
    inventory.devices.insert(
        "decklink_0".into(),
        sentinel_model::DeviceEntry {
            name: "DeckLink Duo 2".into(),
            device_number: 0,
            inputs: vec![sentinel_model::InputEntry {
                id: "input_0".into(),
                port: "SDI 1".into(),
                signal_detected: true,
                format: Some("1920x1080@60".into()),
                udp: {
                    let mut udp =
                        sentinel_model::UdpEndpoints::assign(0, 0);
                    udp.status = UdpStatus::Streaming;
                    udp.pipeline_pid = Some(1);
                    udp
                },
            }],
        },
    );
    assert!(registry.write("device_registry.json", &inventory).await);

    let launcher = sleeper_script(dir.path(), "fake-gst");
    let pool = EncoderPool::with_launcher(
        Arc::clone(&registry),
        launcher.display().to_string(),
    );
    let supervisor = UplinkSupervisor::new(
        Arc::clone(&registry),
        pool,
        &destinations,
        &presets,
    );

    UplinkFixture {
        registry,
        supervisor,
        _dir: dir,
    }
}

fn complete_configuration() -> StreamConfiguration {
    StreamConfiguration {
        selected_device_id: 0,
        selected_input_id: Some("input_0".into()),
        selected_destination_id: Some("youtube:main".into()),
        selected_preset_id: Some("hd_high".into()),
    }
}

#[tokio::test]
async fn go_live_spawns_one_encoder() {
    let mut fixture = uplink_fixture().await;
    assert!(
        set_configuration(&fixture.registry, &complete_configuration())
            .await
    );
    assert!(
        set_intent(&fixture.registry, StreamIntent::AutoStream).await
    );

    fixture.supervisor.tick().await;

    let active = fixture.supervisor.active_streams();
    assert_eq!(active.len(), 1);
    let pid = active["input_0:youtube:main"];
    assert!(pid_alive(pid));

    let state = aggregated_state(&fixture.registry).await;
    assert_eq!(state.system_status, "Streaming Live");
}

#[tokio::test]
async fn healthy_encoder_is_left_alone() {
    let mut fixture = uplink_fixture().await;
    set_configuration(&fixture.registry, &complete_configuration()).await;
    set_intent(&fixture.registry, StreamIntent::AutoStream).await;

    fixture.supervisor.tick().await;
    let pid = fixture.supervisor.active_streams()["input_0:youtube:main"];

    fixture.supervisor.tick().await;
    assert_eq!(
        fixture.supervisor.active_streams()["input_0:youtube:main"],
        pid
    );
}

#[tokio::test]
async fn disabling_intent_stops_the_encoder() {
    let mut fixture = uplink_fixture().await;
    set_configuration(&fixture.registry, &complete_configuration()).await;
    set_intent(&fixture.registry, StreamIntent::AutoStream).await;
    fixture.supervisor.tick().await;
    let pid = fixture.supervisor.active_streams()["input_0:youtube:main"];

    set_intent(&fixture.registry, StreamIntent::Disabled).await;
    fixture.supervisor.tick().await;

    assert!(fixture.supervisor.active_streams().is_empty());
    assert!(!pid_alive(pid));
}

#[tokio::test]
async fn crashed_encoder_restarts_under_auto_stream() {
    let mut fixture = uplink_fixture().await;
    set_configuration(&fixture.registry, &complete_configuration()).await;
    set_intent(&fixture.registry, StreamIntent::AutoStream).await;
    fixture.supervisor.tick().await;
    let first_pid =
        fixture.supervisor.active_streams()["input_0:youtube:main"];

    kill_externally(first_pid);
    sleep(Duration::from_millis(100)).await;

    fixture.supervisor.tick().await;
    let second_pid =
        fixture.supervisor.active_streams()["input_0:youtube:main"];
    assert_ne!(second_pid, first_pid);
    assert!(pid_alive(second_pid));
}

#[tokio::test]
async fn incomplete_configuration_never_starts_an_encoder() {
    let mut fixture = uplink_fixture().await;
    let mut config = complete_configuration();
    config.selected_destination_id = None;
    set_configuration(&fixture.registry, &config).await;
    set_intent(&fixture.registry, StreamIntent::AutoStream).await;

    fixture.supervisor.tick().await;
    assert!(fixture.supervisor.active_streams().is_empty());

    let state = aggregated_state(&fixture.registry).await;
    assert!(state.system_status.contains("selected_destination_id"));

    // Completing the configuration lets the next tick go live.
    set_configuration(&fixture.registry, &complete_configuration()).await;
    fixture.supervisor.tick().await;
    assert_eq!(fixture.supervisor.active_streams().len(), 1);
}

#[tokio::test]
async fn encoder_waits_for_the_multicast_pipeline() {
    let mut fixture = uplink_fixture().await;

    // Signal present but the fan-out pipeline is not up yet.
    let mut inventory = read_uplink_inventory(&fixture.registry).await;
    if let Some(device) = inventory.devices.get_mut("decklink_0") {
        device.inputs[0].udp.status = UdpStatus::Stopped;
        device.inputs[0].udp.pipeline_pid = None;
    }
    assert!(
        fixture
            .registry
            .write("device_registry.json", &inventory)
            .await
    );

    set_configuration(&fixture.registry, &complete_configuration()).await;
    set_intent(&fixture.registry, StreamIntent::AutoStream).await;

    fixture.supervisor.tick().await;
    assert!(fixture.supervisor.active_streams().is_empty());
}

#[tokio::test]
async fn changing_destination_replaces_the_encoder() {
    let mut fixture = uplink_fixture().await;
    set_configuration(&fixture.registry, &complete_configuration()).await;
    set_intent(&fixture.registry, StreamIntent::AutoStream).await;
    fixture.supervisor.tick().await;
    let old_pid =
        fixture.supervisor.active_streams()["input_0:youtube:main"];

    let mut config = complete_configuration();
    config.selected_destination_id = Some("youtube:backup".into());
    set_configuration(&fixture.registry, &config).await;

    fixture.supervisor.tick().await;
    let active = fixture.supervisor.active_streams();
    assert_eq!(active.len(), 1);
    let new_pid = active["input_0:youtube:backup"];
    assert!(!pid_alive(old_pid));
    assert!(pid_alive(new_pid));
}

async fn read_uplink_inventory(registry: &StateRegistry) -> DeviceRegistry {
    registry
        .read("device_registry.json", DeviceRegistry::default())
        .await
}

// Resolution failures must leave the system idle rather than crash.
#[tokio::test]
async fn unknown_preset_keeps_the_system_idle() {
    let mut fixture = uplink_fixture().await;
    let mut config = complete_configuration();
    config.selected_preset_id = Some("does_not_exist".into());
    set_configuration(&fixture.registry, &config).await;
    set_intent(&fixture.registry, StreamIntent::AutoStream).await;

    fixture.supervisor.tick().await;
    assert!(fixture.supervisor.active_streams().is_empty());
}

#[tokio::test]
async fn intent_document_round_trips_through_commands() {
    let dir = tempdir().expect("tempdir");
    let registry = StateRegistry::new(dir.path().join("data"));

    set_configuration(&registry, &complete_configuration()).await;
    set_intent(&registry, StreamIntent::AutoStream).await;

    let doc: IntentDocument =
        registry.read("intent.json", IntentDocument::default()).await;
    assert_eq!(doc.intent, StreamIntent::AutoStream);
    assert_eq!(doc.configuration, complete_configuration());

    // Flipping intent leaves the configuration untouched.
    set_intent(&registry, StreamIntent::Disabled).await;
    let doc: IntentDocument =
        registry.read("intent.json", IntentDocument::default()).await;
    assert_eq!(doc.intent, StreamIntent::Disabled);
    assert_eq!(doc.configuration, complete_configuration());
}
