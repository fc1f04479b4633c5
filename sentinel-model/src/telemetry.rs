use serde::{Deserialize, Serialize};

/// The persisted `stream_stats.json` snapshot, written by the encoder
/// pool while an encoder runs. Consumers treat it as read-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamStats {
    /// Encoder output frame rate.
    #[serde(default)]
    pub fps: f64,
    /// Estimated video bitrate in kbps.
    #[serde(default)]
    pub bitrate: u64,
    #[serde(default)]
    pub frames_processed: u64,
    #[serde(default)]
    pub frames_dropped: u64,
    /// Seconds since the encoder pipeline launched.
    #[serde(default)]
    pub stream_duration: u64,
    /// Wall-clock epoch seconds of the last snapshot write.
    #[serde(default)]
    pub last_update: f64,
}

impl StreamStats {
    /// The all-zero snapshot a consumer sees when no encoder has run.
    pub fn idle() -> Self {
        StreamStats::default()
    }
}
