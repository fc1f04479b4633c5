use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use regex::Regex;
use sentinel_model::StreamStats;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::ChildStderr;
use tracing::{debug, warn};

use crate::registry::{STREAM_STATS_DOC, StateRegistry};

/// Minimum interval between telemetry document writes.
const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

// The identity element logs one chain line per buffer when launched with
// GST_DEBUG=identity:6; fpsdisplaysink-style elements log rendered /
// dropped counters.
static RENDERED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"rendered:\s*(\d+),\s*dropped:\s*(\d+),\s*fps:\s*([\d.]+)")
        .expect("rendered regex compiles")
});
static CURRENT_FPS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"current-fps:\s*([\d.]+)").expect("current-fps regex compiles")
});
static CHAIN_BYTES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\((\d+)\s+bytes").expect("chain-bytes regex compiles")
});

/// Best-effort accumulator over encoder stderr lines.
///
/// Fields a line does not carry keep their previous value; unknown lines
/// are ignored outright. Bitrate is derived from the bytes seen since
/// the previous flush.
pub struct TelemetryParser {
    stats: StreamStats,
    started: Instant,
    window_bytes: u64,
    last_flush: Option<Instant>,
}

impl Default for TelemetryParser {
    fn default() -> Self {
        TelemetryParser::new()
    }
}

impl TelemetryParser {
    pub fn new() -> Self {
        TelemetryParser {
            stats: StreamStats::idle(),
            started: Instant::now(),
            window_bytes: 0,
            last_flush: None,
        }
    }

    /// Fold one stderr line into the running counters.
    pub fn observe(&mut self, line: &str) {
        if line.contains("video_stats") && line.contains("chain") {
            if let Some(captures) = CHAIN_BYTES.captures(line) {
                if let Ok(size) = captures[1].parse::<u64>() {
                    self.window_bytes += size;
                    self.stats.frames_processed += 1;
                }
            }
            return;
        }

        if let Some(captures) = RENDERED.captures(line) {
            if let Ok(rendered) = captures[1].parse() {
                self.stats.frames_processed = rendered;
            }
            if let Ok(dropped) = captures[2].parse() {
                self.stats.frames_dropped = dropped;
            }
            if let Ok(fps) = captures[3].parse() {
                self.stats.fps = fps;
            }
        } else if let Some(captures) = CURRENT_FPS.captures(line) {
            if let Ok(fps) = captures[1].parse() {
                self.stats.fps = fps;
            }
        }
    }

    /// Whether enough time has passed for another snapshot write.
    pub fn flush_due(&self) -> bool {
        self.last_flush
            .is_none_or(|last| last.elapsed() >= FLUSH_INTERVAL)
    }

    /// Produce the next snapshot and reset the bitrate window.
    pub fn flush(&mut self) -> StreamStats {
        let now = Instant::now();
        let window = self
            .last_flush
            .map_or_else(|| self.started.elapsed(), |last| now - last)
            .as_secs_f64();
        self.last_flush = Some(now);
        self.flush_with_window(window)
    }

    fn flush_with_window(&mut self, window_secs: f64) -> StreamStats {
        if window_secs > 0.0 {
            self.stats.bitrate =
                (self.window_bytes as f64 * 8.0 / window_secs / 1024.0) as u64;
        }
        self.window_bytes = 0;

        self.stats.stream_duration = self.started.elapsed().as_secs();
        if self.stats.fps == 0.0 && self.stats.stream_duration > 0 {
            // No fps line seen yet; estimate from the frame counter.
            let estimate = self.stats.frames_processed as f64
                / self.stats.stream_duration as f64;
            self.stats.fps = (estimate * 10.0).round() / 10.0;
        }
        self.stats.last_update =
            chrono::Utc::now().timestamp_millis() as f64 / 1000.0;

        self.stats.clone()
    }
}

/// Tail an encoder's stderr, updating the telemetry document at most
/// once per second until the pipe closes.
pub(crate) async fn monitor(stderr: ChildStderr, registry: Arc<StateRegistry>) {
    let mut lines = BufReader::new(stderr).lines();
    let mut parser = TelemetryParser::new();

    while let Ok(Some(line)) = lines.next_line().await {
        parser.observe(&line);
        if parser.flush_due() {
            let stats = parser.flush();
            debug!(
                fps = stats.fps,
                bitrate = stats.bitrate,
                frames = stats.frames_processed,
                "encoder telemetry"
            );
            if !registry.write(STREAM_STATS_DOC, &stats).await {
                warn!("failed to persist encoder telemetry");
            }
        }
    }
    debug!("encoder stderr closed; telemetry monitor exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAIN_LINE: &str = "0:00:01.804 12345 0xa DEBUG identity \
        gstidentity.c:553:gst_identity_transform_ip:<video_stats> chain \
        ******* (video_stats:sink) (414720 bytes, dts: none, pts: 0:00:01.7) \
        0x7f2ab4003600";

    #[test]
    fn chain_lines_accumulate_frames_and_bytes() {
        let mut parser = TelemetryParser::new();
        parser.observe(CHAIN_LINE);
        parser.observe(CHAIN_LINE);

        let stats = parser.flush_with_window(1.0);
        assert_eq!(stats.frames_processed, 2);
        // 2 x 414720 bytes over one second.
        assert_eq!(stats.bitrate, (2 * 414720) * 8 / 1024);
    }

    #[test]
    fn rendered_line_overrides_counters() {
        let mut parser = TelemetryParser::new();
        parser.observe(CHAIN_LINE);
        parser.observe("fpsdisplaysink0: rendered: 120, dropped: 3, fps: 59.94");

        let stats = parser.flush_with_window(1.0);
        assert_eq!(stats.frames_processed, 120);
        assert_eq!(stats.frames_dropped, 3);
        assert!((stats.fps - 59.94).abs() < f64::EPSILON);
    }

    #[test]
    fn current_fps_line_updates_fps_only() {
        let mut parser = TelemetryParser::new();
        parser.observe("current-fps: 29.97");

        let stats = parser.flush_with_window(1.0);
        assert!((stats.fps - 29.97).abs() < f64::EPSILON);
        assert_eq!(stats.frames_processed, 0);
        assert_eq!(stats.frames_dropped, 0);
    }

    #[test]
    fn unrelated_lines_leave_the_snapshot_untouched() {
        let mut parser = TelemetryParser::new();
        parser.observe("Setting pipeline to PLAYING ...");
        parser.observe("Redistribute latency...");

        let stats = parser.flush_with_window(1.0);
        assert_eq!(stats, {
            let mut expected = StreamStats::idle();
            expected.last_update = stats.last_update;
            expected
        });
    }

    #[test]
    fn first_flush_is_immediately_due() {
        let parser = TelemetryParser::new();
        assert!(parser.flush_due());
    }
}
