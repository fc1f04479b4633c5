use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Multicast assignments start here; one /24 octet per device, two ports
/// per input (video, then audio).
const MULTICAST_BASE: &str = "239.0.0";
const PORT_BASE: u16 = 5000;

/// Stable registry key for a capture device index.
pub fn device_id(device_number: u32) -> String {
    format!("decklink_{device_number}")
}

/// Lifecycle of one fan-out pipeline.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum UdpStatus {
    #[default]
    Stopped,
    Streaming,
}

/// The deterministic multicast addressing of one capture input, plus the
/// runtime state of the pipeline feeding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdpEndpoints {
    pub multicast_ip: String,
    pub video_port: u16,
    pub audio_port: u16,
    #[serde(default)]
    pub status: UdpStatus,
    #[serde(default)]
    pub pipeline_pid: Option<u32>,
}

impl UdpEndpoints {
    /// Compute the fixed assignment for input slot `input_index` of device
    /// `device_number`. Stable across restarts and collision-free between
    /// devices by construction.
    pub fn assign(device_number: u32, input_index: usize) -> Self {
        let video_port =
            PORT_BASE + 10 * device_number as u16 + 2 * input_index as u16;
        UdpEndpoints {
            multicast_ip: format!("{MULTICAST_BASE}.{}", device_number + 1),
            video_port,
            audio_port: video_port + 1,
            status: UdpStatus::Stopped,
            pipeline_pid: None,
        }
    }
}

/// One physical connector on a capture card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEntry {
    pub id: String,
    pub port: String,
    pub signal_detected: bool,
    #[serde(default)]
    pub format: Option<String>,
    pub udp: UdpEndpoints,
}

/// One capture card as recorded in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub name: String,
    pub device_number: u32,
    #[serde(default)]
    pub inputs: Vec<InputEntry>,
}

/// The persisted `device_registry.json` document: everything the input
/// supervisor has ever observed. Entries are mutated in place and never
/// removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRegistry {
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceEntry>,
}

impl DeviceRegistry {
    /// Look up one input record by device number and input id.
    pub fn find_input(
        &self,
        device_number: u32,
        input_id: &str,
    ) -> Option<&InputEntry> {
        self.devices
            .get(&device_id(device_number))?
            .inputs
            .iter()
            .find(|input| input.id == input_id)
    }

    /// Force every input back to `stopped` with no pid. Returns whether
    /// anything changed. Used for stale-state recovery after a crash or
    /// restart, when recorded pids no longer mean anything.
    pub fn reset_runtime_state(&mut self) -> bool {
        let mut changed = false;
        for device in self.devices.values_mut() {
            for input in &mut device.inputs {
                if input.udp.status != UdpStatus::Stopped
                    || input.udp.pipeline_pid.is_some()
                {
                    input.udp.status = UdpStatus::Stopped;
                    input.udp.pipeline_pid = None;
                    changed = true;
                }
            }
        }
        changed
    }

    /// True when any input currently has a fan-out pipeline running.
    pub fn any_streaming(&self) -> bool {
        self.devices.values().any(|device| {
            device
                .inputs
                .iter()
                .any(|input| input.udp.status == UdpStatus::Streaming)
        })
    }

    /// True when any input reports a detected signal.
    pub fn any_signal(&self) -> bool {
        self.devices
            .values()
            .any(|device| device.inputs.iter().any(|input| input.signal_detected))
    }
}
