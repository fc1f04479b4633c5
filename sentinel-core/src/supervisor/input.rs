use std::sync::Arc;
use std::time::Duration;

use sentinel_model::{
    DeviceEntry, DeviceRegistry, InputEntry, ProbedDevice, UdpEndpoints,
    UdpStatus, device_id,
};
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::pipeline::MulticastPool;
use crate::probe::HardwareProbe;
use crate::registry::{DEVICE_REGISTRY_DOC, StateRegistry};

/// Reconciliation period of the input supervisor.
pub const INPUT_TICK: Duration = Duration::from_secs(2);

/// Discovers capture hardware and keeps one multicast fan-out pipeline
/// running per signal-bearing input.
pub struct InputSupervisor {
    registry: Arc<StateRegistry>,
    probe: HardwareProbe,
    pool: MulticastPool,
}

impl InputSupervisor {
    pub fn new(
        registry: Arc<StateRegistry>,
        probe: HardwareProbe,
        pool: MulticastPool,
    ) -> Self {
        InputSupervisor {
            registry,
            probe,
            pool,
        }
    }

    /// Startup recovery: pids recorded by a previous incarnation mean
    /// nothing, so every input goes back to `stopped`.
    pub async fn reset_stale_state(&self) {
        let mut inventory: DeviceRegistry = self
            .registry
            .read(DEVICE_REGISTRY_DOC, DeviceRegistry::default())
            .await;
        if inventory.reset_runtime_state()
            && self.registry.write(DEVICE_REGISTRY_DOC, &inventory).await
        {
            info!("reset stale registry state to 'stopped'");
        }
    }

    /// One reconciliation pass: probe, merge, converge pipelines, persist.
    pub async fn tick(&mut self) {
        let snapshot = self.probe.run().await;
        debug!("discovered {} devices", snapshot.len());

        let mut inventory: DeviceRegistry = self
            .registry
            .read(DEVICE_REGISTRY_DOC, DeviceRegistry::default())
            .await;
        Self::merge_snapshot(&mut inventory, &snapshot);
        self.converge(&mut inventory).await;

        if !self.registry.write(DEVICE_REGISTRY_DOC, &inventory).await {
            warn!("failed to persist device registry; retrying next tick");
        }
    }

    /// Fold a probe snapshot into the inventory. New devices and inputs
    /// get their deterministic UDP assignments; existing entries carry
    /// their `udp` block forward and only refresh what the probe
    /// observes. Devices the probe no longer reports lose their signal
    /// but are never removed.
    fn merge_snapshot(inventory: &mut DeviceRegistry, snapshot: &[ProbedDevice]) {
        let mut seen = std::collections::BTreeSet::new();

        for probed in snapshot {
            let key = device_id(probed.device_number);
            seen.insert(key.clone());

            let device = inventory
                .devices
                .entry(key.clone())
                .or_insert_with(|| DeviceEntry {
                    name: probed.name.clone().unwrap_or_else(|| {
                        format!("DeckLink Device {}", probed.device_number)
                    }),
                    device_number: probed.device_number,
                    inputs: Vec::new(),
                });

            for (index, probed_input) in probed.inputs.iter().enumerate() {
                let input_id = probed_input
                    .id
                    .clone()
                    .unwrap_or_else(|| format!("{key}_input_{index}"));

                if !device.inputs.iter().any(|input| input.id == input_id) {
                    device.inputs.push(InputEntry {
                        id: input_id.clone(),
                        port: probed_input
                            .port
                            .clone()
                            .unwrap_or_else(|| "SDI".to_string()),
                        signal_detected: false,
                        format: None,
                        udp: UdpEndpoints::assign(probed.device_number, index),
                    });
                }
                if let Some(input) =
                    device.inputs.iter_mut().find(|input| input.id == input_id)
                {
                    input.signal_detected = probed_input.signal_detected;
                    input.format = probed_input.format.clone();
                }
            }
        }

        for (key, device) in &mut inventory.devices {
            if !seen.contains(key) {
                for input in &mut device.inputs {
                    input.signal_detected = false;
                }
            }
        }
    }

    /// Apply the status × signal transition table against the pool.
    async fn converge(&mut self, inventory: &mut DeviceRegistry) {
        for device in inventory.devices.values_mut() {
            let device_number = device.device_number;
            for input in &mut device.inputs {
                // A tracked child that vanished counts as signal loss; if
                // the signal is still there the table below restarts it.
                if input.udp.status == UdpStatus::Streaming {
                    let alive = input
                        .udp
                        .pipeline_pid
                        .is_some_and(|pid| self.pool.is_alive(pid));
                    if !alive {
                        warn!(
                            "fan-out pipeline for {} is gone; marking stopped",
                            input.id
                        );
                        input.udp.status = UdpStatus::Stopped;
                        input.udp.pipeline_pid = None;
                    }
                }

                match (input.udp.status, input.signal_detected) {
                    (UdpStatus::Stopped, true) => {
                        info!(
                            "starting UDP pipeline for {} ({})",
                            input.id,
                            input.format.as_deref().unwrap_or("unknown format")
                        );
                        if let Some(pid) = self
                            .pool
                            .start(
                                device_number,
                                &input.udp.multicast_ip,
                                input.udp.video_port,
                                input.udp.audio_port,
                            )
                            .await
                        {
                            input.udp.status = UdpStatus::Streaming;
                            input.udp.pipeline_pid = Some(pid);
                        }
                    }
                    (UdpStatus::Streaming, false) => {
                        info!(
                            "stopping UDP pipeline for {} (signal lost)",
                            input.id
                        );
                        if let Some(pid) = input.udp.pipeline_pid.take() {
                            self.pool.stop(pid).await;
                        }
                        input.udp.status = UdpStatus::Stopped;
                    }
                    _ => {}
                }
            }
        }
    }

    /// Run until the shutdown channel fires, then stop every pipeline.
    pub async fn run(mut self, mut shutdown: mpsc::Receiver<()>) {
        info!("input supervisor starting");
        self.reset_stale_state().await;

        let mut ticker = interval(INPUT_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => self.tick().await,
            }
        }

        info!("input supervisor shutting down");
        self.pool.stop_all().await;
    }
}
