//! The shape the external REST layer consumes: intent/configuration
//! commands and the aggregated state read.

use serde::Serialize;
use serde_json::json;
use sentinel_model::{
    DeviceRegistry, IntentDocument, StreamConfiguration, StreamIntent,
    system_status,
};
use tracing::info;

use crate::registry::{DEVICE_REGISTRY_DOC, INTENT_DOC, StateRegistry};

/// Union of intent, configuration, inventory, and the derived status
/// line.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedState {
    pub intent: StreamIntent,
    pub configuration: StreamConfiguration,
    pub hardware: DeviceRegistry,
    pub system_status: String,
}

/// Persist a new intent, leaving the configuration untouched.
pub async fn set_intent(registry: &StateRegistry, intent: StreamIntent) -> bool {
    info!("intent set to {intent:?}");
    registry
        .update(INTENT_DOC, json!({ "intent": intent }))
        .await
}

/// Persist a new four-field configuration, leaving the intent untouched.
pub async fn set_configuration(
    registry: &StateRegistry,
    configuration: &StreamConfiguration,
) -> bool {
    info!("configuration updated: {configuration:?}");
    registry
        .update(INTENT_DOC, json!({ "configuration": configuration }))
        .await
}

/// Read everything a status display needs in one call.
pub async fn aggregated_state(registry: &StateRegistry) -> AggregatedState {
    let intent: IntentDocument =
        registry.read(INTENT_DOC, IntentDocument::default()).await;
    let hardware: DeviceRegistry = registry
        .read(DEVICE_REGISTRY_DOC, DeviceRegistry::default())
        .await;
    let system_status = system_status(&intent, &hardware);

    AggregatedState {
        intent: intent.intent,
        configuration: intent.configuration,
        hardware,
        system_status,
    }
}
