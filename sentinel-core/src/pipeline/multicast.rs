use std::collections::HashMap;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, info};

use super::{
    GST_LAUNCH, PipelineHandle, SPAWN_GRACE, drain_stderr, spawn_in_group,
    terminate,
};

/// Graceful-exit allowance when stopping a fan-out pipeline.
const STOP_GRACE: Duration = Duration::from_secs(3);

/// Supervises one long-running fan-out pipeline per signal-bearing
/// input, copying raw capture frames to the input's loopback multicast
/// groups.
pub struct MulticastPool {
    launcher: String,
    pipelines: HashMap<u32, PipelineHandle>,
}

impl Default for MulticastPool {
    fn default() -> Self {
        MulticastPool::new()
    }
}

impl MulticastPool {
    pub fn new() -> Self {
        MulticastPool::with_launcher(GST_LAUNCH)
    }

    /// Use a different launcher binary. Test hook and deployment knob.
    pub fn with_launcher(launcher: impl Into<String>) -> Self {
        MulticastPool {
            launcher: launcher.into(),
            pipelines: HashMap::new(),
        }
    }

    /// Raw RTP fan-out: UYVY video and S16BE stereo audio onto the two
    /// multicast ports, TTL 1, loopback interface only.
    fn fanout_args(
        device_number: u32,
        multicast_ip: &str,
        video_port: u16,
        audio_port: u16,
    ) -> Vec<String> {
        let pipeline = format!(
            "decklinkvideosrc device-number={device_number} connection=sdi mode=auto \
             ! videoconvert ! video/x-raw,format=UYVY \
             ! rtpvrawpay mtu=9000 \
             ! udpsink host={multicast_ip} port={video_port} auto-multicast=true \
               ttl-mc=1 async=false multicast-iface=lo \
             decklinkaudiosrc device-number={device_number} \
             ! audioconvert ! audioresample \
             ! audio/x-raw,format=S16BE,channels=2,rate=48000 \
             ! rtpL16pay mtu=1400 \
             ! udpsink host={multicast_ip} port={audio_port} auto-multicast=true \
               ttl-mc=1 async=false multicast-iface=lo"
        );
        pipeline.split_whitespace().map(str::to_string).collect()
    }

    /// Launch a fan-out pipeline for one input. Returns the child pid
    /// once it survives the startup grace period, `None` otherwise.
    pub async fn start(
        &mut self,
        device_number: u32,
        multicast_ip: &str,
        video_port: u16,
        audio_port: u16,
    ) -> Option<u32> {
        info!(
            "starting UDP multicast fan-out: {multicast_ip}:{video_port}/{audio_port}"
        );

        let args = Self::fanout_args(
            device_number,
            multicast_ip,
            video_port,
            audio_port,
        );
        let mut child = match spawn_in_group(&self.launcher, &args, &[]) {
            Ok(child) => child,
            Err(err) => {
                error!("failed to spawn {}: {err}", self.launcher);
                return None;
            }
        };
        let pid = child.id()?;

        sleep(SPAWN_GRACE).await;

        match child.try_wait() {
            Ok(None) => {
                self.pipelines.insert(
                    pid,
                    PipelineHandle {
                        child,
                        pgid: pid as i32,
                    },
                );
                info!("fan-out pipeline started with PID {pid}");
                Some(pid)
            }
            Ok(Some(status)) => {
                let stderr = drain_stderr(child.stderr.take()).await;
                error!("fan-out pipeline exited early ({status}): {stderr}");
                None
            }
            Err(err) => {
                error!("fan-out pipeline liveness check failed: {err}");
                None
            }
        }
    }

    /// Poll one tracked pipeline, reaping it if it has died.
    pub fn is_alive(&mut self, pid: u32) -> bool {
        let Some(handle) = self.pipelines.get_mut(&pid) else {
            return false;
        };
        match handle.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!("fan-out pipeline {pid} exited with {status}");
                self.pipelines.remove(&pid);
                false
            }
            Err(err) => {
                debug!("fan-out pipeline {pid} poll failed: {err}");
                self.pipelines.remove(&pid);
                false
            }
        }
    }

    /// Terminate one pipeline's process group. Idempotent for pids this
    /// pool does not own.
    pub async fn stop(&mut self, pid: u32) -> bool {
        let Some(handle) = self.pipelines.remove(&pid) else {
            debug!("stop requested for untracked pipeline {pid}");
            return false;
        };
        terminate(handle, STOP_GRACE, &format!("fan-out pipeline {pid}"))
            .await;
        info!("stopped fan-out pipeline PID {pid}");
        true
    }

    /// Terminate every tracked pipeline.
    pub async fn stop_all(&mut self) {
        let pids: Vec<u32> = self.pipelines.keys().copied().collect();
        for pid in pids {
            self.stop(pid).await;
        }
    }
}
