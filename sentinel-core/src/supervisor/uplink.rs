use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sentinel_model::{
    DestinationId, DeviceRegistry, IntentDocument, StreamIntent, UdpStatus,
};
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::config::{load_destinations, load_presets};
use crate::pipeline::EncoderPool;
use crate::registry::{DEVICE_REGISTRY_DOC, INTENT_DOC, StateRegistry};

/// Reconciliation period of the uplink supervisor.
pub const UPLINK_TICK: Duration = Duration::from_secs(1);

/// Reconciles the user's streaming intent against available signals,
/// keeping at most one encoder pipeline per `"<input>:<destination>"`
/// binding.
pub struct UplinkSupervisor {
    registry: Arc<StateRegistry>,
    pool: EncoderPool,
    destinations_path: PathBuf,
    presets_path: PathBuf,
    /// Logical binding key → encoder pid. At most one entry.
    owned: HashMap<String, u32>,
}

impl UplinkSupervisor {
    pub fn new(
        registry: Arc<StateRegistry>,
        pool: EncoderPool,
        destinations_path: impl Into<PathBuf>,
        presets_path: impl Into<PathBuf>,
    ) -> Self {
        UplinkSupervisor {
            registry,
            pool,
            destinations_path: destinations_path.into(),
            presets_path: presets_path.into(),
            owned: HashMap::new(),
        }
    }

    /// Currently owned encoder bindings, keyed `"<input>:<destination>"`.
    pub fn active_streams(&self) -> &HashMap<String, u32> {
        &self.owned
    }

    /// One reconciliation pass. Level-triggered: the desired encoder set
    /// is derived from intent and inventory alone, so a failed start is
    /// simply retried next tick and a dead child restarts naturally.
    pub async fn tick(&mut self) {
        let intent: IntentDocument =
            self.registry.read(INTENT_DOC, IntentDocument::default()).await;

        if intent.intent == StreamIntent::Disabled {
            self.stop_owned().await;
            return;
        }

        let config = &intent.configuration;
        if let Some(field) = config.missing_field() {
            warn!("incomplete configuration, cannot start stream ({field} unset)");
            return;
        }
        let (Some(input_id), Some(dest_raw), Some(preset_id)) = (
            config.selected_input_id.as_deref(),
            config.selected_destination_id.as_deref(),
            config.selected_preset_id.as_deref(),
        ) else {
            return;
        };

        // The encoder would block on an empty multicast group, so never
        // start until the fan-out pipeline is already up.
        let inventory: DeviceRegistry = self
            .registry
            .read(DEVICE_REGISTRY_DOC, DeviceRegistry::default())
            .await;
        let Some(input) =
            inventory.find_input(config.selected_device_id, input_id)
        else {
            warn!(
                "input {input_id} not found on device {}",
                config.selected_device_id
            );
            return;
        };
        if !input.signal_detected {
            warn!("input {input_id} has no signal");
            return;
        }
        if input.udp.status != UdpStatus::Streaming {
            warn!("UDP multicast not active for {input_id}");
            return;
        }

        let destination = match DestinationId::parse(dest_raw) {
            Ok(destination) => destination,
            Err(err) => {
                warn!("{err}");
                return;
            }
        };
        let catalogue = match load_destinations(&self.destinations_path) {
            Ok(catalogue) => catalogue,
            Err(err) => {
                warn!("{err}");
                return;
            }
        };
        let Some((platform, stream)) = catalogue.resolve(&destination) else {
            warn!("destination {destination} not found in catalogue");
            return;
        };
        let rtmp_url = platform.ingest_url(stream);

        let presets = match load_presets(&self.presets_path) {
            Ok(presets) => presets,
            Err(err) => {
                warn!("{err}");
                return;
            }
        };
        let Some(preset) = presets.find_variant(preset_id) else {
            warn!("preset {preset_id} not found");
            return;
        };

        let key = format!("{input_id}:{dest_raw}");

        // The user changed input or destination: stop the superseded
        // binding before starting the new one.
        let stale: Vec<(String, u32)> = self
            .owned
            .iter()
            .filter(|(owned_key, _)| **owned_key != key)
            .map(|(owned_key, pid)| (owned_key.clone(), *pid))
            .collect();
        for (stale_key, pid) in stale {
            info!("stopping stream for superseded binding {stale_key}");
            self.pool.stop(pid).await;
            self.owned.remove(&stale_key);
        }

        if let Some(&pid) = self.owned.get(&key) {
            if self.pool.is_alive(pid) {
                debug!("stream {key} is healthy (PID {pid})");
                return;
            }
            warn!("stream {key} (PID {pid}) died unexpectedly; restarting");
            self.owned.remove(&key);
        }

        info!("starting stream: {input_id} -> {dest_raw} ({})", preset.name);
        if let Some(pid) = self
            .pool
            .start(
                &input.udp.multicast_ip,
                input.udp.video_port,
                input.udp.audio_port,
                &rtmp_url,
                preset,
            )
            .await
        {
            self.owned.insert(key, pid);
            info!("stream started with PID {pid}");
        }
    }

    async fn stop_owned(&mut self) {
        let owned: Vec<(String, u32)> = self.owned.drain().collect();
        for (key, pid) in owned {
            info!("stopping stream: {key}");
            self.pool.stop(pid).await;
        }
    }

    /// Run until the shutdown channel fires, then stop every encoder.
    pub async fn run(mut self, mut shutdown: mpsc::Receiver<()>) {
        info!("uplink supervisor starting");

        let mut ticker = interval(UPLINK_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => self.tick().await,
            }
        }

        info!("uplink supervisor shutting down");
        self.stop_owned().await;
        self.pool.stop_all().await;
    }
}
