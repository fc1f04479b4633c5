use crate::intent::{IntentDocument, StreamIntent};
use crate::inventory::DeviceRegistry;

/// Derive the single-line `system_status` summary from intent and the
/// current inventory. Pure; the REST layer calls this on every read.
pub fn system_status(
    intent: &IntentDocument,
    registry: &DeviceRegistry,
) -> String {
    if intent.intent == StreamIntent::AutoStream {
        // An incomplete configuration can never go live; surface the
        // first missing field instead of claiming we are streaming.
        if let Some(field) = intent.configuration.missing_field() {
            return format!("Waiting For Configuration: {field}");
        }
        return "Streaming Live".to_string();
    }

    if registry.any_streaming() {
        "Ready to Stream".to_string()
    } else if registry.any_signal() {
        "Signal Detected".to_string()
    } else {
        "No Signal".to_string()
    }
}
