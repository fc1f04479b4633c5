use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sentinel_model::PresetVariant;
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

use super::{GST_LAUNCH, SPAWN_GRACE, drain_stderr, spawn_in_group, terminate};
use crate::registry::StateRegistry;
use crate::telemetry;

/// Graceful-exit allowance when stopping an encoder pipeline.
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Fixed AAC audio bitrate in bits per second.
const AUDIO_BITRATE: u32 = 128_000;

struct EncoderHandle {
    child: Child,
    pgid: i32,
    telemetry: JoinHandle<()>,
}

/// Supervises at most one RTMP encoder pipeline per (input, destination)
/// binding: joins the input's multicast groups on loopback, encodes to
/// the selected preset, and pushes to the remote ingest URL while a
/// sibling task parses stderr into the telemetry document.
pub struct EncoderPool {
    launcher: String,
    registry: Arc<StateRegistry>,
    pipelines: HashMap<u32, EncoderHandle>,
}

impl EncoderPool {
    pub fn new(registry: Arc<StateRegistry>) -> Self {
        EncoderPool::with_launcher(registry, GST_LAUNCH)
    }

    /// Use a different launcher binary. Test hook and deployment knob.
    pub fn with_launcher(
        registry: Arc<StateRegistry>,
        launcher: impl Into<String>,
    ) -> Self {
        EncoderPool {
            launcher: launcher.into(),
            registry,
            pipelines: HashMap::new(),
        }
    }

    /// Multicast → H.264/AAC → FLV → RTMP. Keyframe interval is two
    /// seconds of frames; the identity element feeds the telemetry
    /// parser.
    fn encode_args(
        multicast_ip: &str,
        video_port: u16,
        audio_port: u16,
        rtmp_url: &str,
        preset: &PresetVariant,
    ) -> Vec<String> {
        let width = preset.width;
        let height = preset.height;
        let bitrate = preset.bitrate;
        let key_int = preset.fps * 2;

        let pipeline = format!(
            "rtpbin name=rtp latency=0 \
             udpsrc multicast-group={multicast_ip} port={video_port} \
               multicast-iface=lo caps=application/x-rtp \
             ! rtp.recv_rtp_sink_0 \
             rtp. ! rtpvrawdepay ! videoconvert \
             ! videoscale ! video/x-raw,width={width},height={height} \
             ! identity name=video_stats silent=false datarate=1 \
             ! queue max-size-buffers=3 leaky=downstream \
             ! x264enc bitrate={bitrate} speed-preset=veryfast tune=zerolatency \
               key-int-max={key_int} \
             ! video/x-h264,profile=high ! h264parse ! queue name=v_enc \
             udpsrc multicast-group={multicast_ip} port={audio_port} \
               multicast-iface=lo caps=application/x-rtp \
             ! rtp.recv_rtp_sink_1 \
             rtp. ! rtpL16depay ! audioconvert ! audioresample \
             ! queue max-size-buffers=3 leaky=downstream \
             ! avenc_aac bitrate={AUDIO_BITRATE} \
             ! aacparse ! queue name=a_enc \
             flvmux name=mux streamable=true \
             v_enc. ! mux. a_enc. ! mux. mux. ! rtmpsink"
        );
        let mut args: Vec<String> =
            pipeline.split_whitespace().map(str::to_string).collect();
        // One argv element: the ingest element expects the literal
        // " live=1" suffix inside its location property.
        args.push(format!("location={rtmp_url} live=1"));
        args
    }

    /// Launch an encoder for one binding. Returns the child pid once it
    /// survives the startup grace period, `None` otherwise.
    pub async fn start(
        &mut self,
        multicast_ip: &str,
        video_port: u16,
        audio_port: u16,
        rtmp_url: &str,
        preset: &PresetVariant,
    ) -> Option<u32> {
        // Keep stream keys out of the logs.
        let ingest_host = rtmp_url.split('/').nth(2).unwrap_or("unknown");
        info!(
            "starting RTMP encoder to {ingest_host} from \
             {multicast_ip}:{video_port}/{audio_port} ({})",
            preset.id
        );

        let args = Self::encode_args(
            multicast_ip,
            video_port,
            audio_port,
            rtmp_url,
            preset,
        );
        // identity:6 makes the identity element report per-buffer stats
        // on stderr for the telemetry parser.
        let envs = [("GST_DEBUG", "identity:6"), ("GST_DEBUG_NO_COLOR", "1")];
        let mut child = match spawn_in_group(&self.launcher, &args, &envs) {
            Ok(child) => child,
            Err(err) => {
                error!("failed to spawn {}: {err}", self.launcher);
                return None;
            }
        };
        let pid = child.id()?;
        let stderr = child.stderr.take();

        sleep(SPAWN_GRACE).await;

        match child.try_wait() {
            Ok(None) => {}
            Ok(Some(status)) => {
                let stderr = drain_stderr(stderr).await;
                error!("encoder exited early ({status}): {stderr}");
                return None;
            }
            Err(err) => {
                error!("encoder liveness check failed: {err}");
                return None;
            }
        }

        let telemetry = match stderr {
            Some(stderr) => tokio::spawn(telemetry::monitor(
                stderr,
                Arc::clone(&self.registry),
            )),
            // Spawned with a piped stderr, so this arm is unreachable in
            // practice; a no-op task keeps the handle uniform.
            None => tokio::spawn(async {}),
        };

        self.pipelines.insert(
            pid,
            EncoderHandle {
                child,
                pgid: pid as i32,
                telemetry,
            },
        );
        info!("encoder pipeline started with PID {pid}");
        Some(pid)
    }

    /// Poll one tracked encoder, reaping it if it has died.
    pub fn is_alive(&mut self, pid: u32) -> bool {
        let Some(handle) = self.pipelines.get_mut(&pid) else {
            return false;
        };
        match handle.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!("encoder {pid} exited with {status}");
                self.pipelines.remove(&pid);
                false
            }
            Err(err) => {
                debug!("encoder {pid} poll failed: {err}");
                self.pipelines.remove(&pid);
                false
            }
        }
    }

    /// Terminate one encoder's process group. Idempotent for pids this
    /// pool does not own.
    pub async fn stop(&mut self, pid: u32) -> bool {
        let Some(handle) = self.pipelines.remove(&pid) else {
            debug!("stop requested for untracked encoder {pid}");
            return false;
        };
        let EncoderHandle {
            child,
            pgid,
            telemetry,
        } = handle;
        terminate(
            super::PipelineHandle { child, pgid },
            STOP_GRACE,
            &format!("encoder pipeline {pid}"),
        )
        .await;
        // The monitor drains on stderr EOF; abort covers a wedged pipe.
        telemetry.abort();
        info!("stopped encoder pipeline PID {pid}");
        true
    }

    /// Terminate every tracked encoder.
    pub async fn stop_all(&mut self) {
        let pids: Vec<u32> = self.pipelines.keys().copied().collect();
        for pid in pids {
            self.stop(pid).await;
        }
    }
}
