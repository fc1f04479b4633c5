use serde::{Deserialize, Serialize};

/// The user's declared desired state.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamIntent {
    /// No outgoing stream is wanted; any running encoder must stop.
    #[default]
    Disabled,
    /// Stream autonomously whenever the selected input carries a signal.
    AutoStream,
}

/// The four-field selection the uplink supervisor resolves each tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfiguration {
    #[serde(default)]
    pub selected_device_id: u32,
    #[serde(default)]
    pub selected_input_id: Option<String>,
    #[serde(default)]
    pub selected_destination_id: Option<String>,
    #[serde(default)]
    pub selected_preset_id: Option<String>,
}

impl StreamConfiguration {
    /// First configuration field still unset, if any. `AUTO_STREAM` must
    /// not launch while this returns `Some`.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.selected_input_id.is_none() {
            Some("selected_input_id")
        } else if self.selected_destination_id.is_none() {
            Some("selected_destination_id")
        } else if self.selected_preset_id.is_none() {
            Some("selected_preset_id")
        } else {
            None
        }
    }
}

/// The persisted `intent.json` document. Authoritative across restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentDocument {
    #[serde(default)]
    pub intent: StreamIntent,
    #[serde(default)]
    pub configuration: StreamConfiguration,
}
