//! Core data model definitions shared across Sentinel crates.

pub mod destinations;
pub mod error;
pub mod intent;
pub mod inventory;
pub mod presets;
pub mod probe;
pub mod status;
pub mod telemetry;

// Intentionally curated re-exports for downstream consumers.
pub use destinations::{
    DestinationId, DestinationsFile, Platform, StreamEndpoint,
};
pub use error::{ModelError, Result as ModelResult};
pub use intent::{IntentDocument, StreamConfiguration, StreamIntent};
pub use inventory::{
    DeviceEntry, DeviceRegistry, InputEntry, UdpEndpoints, UdpStatus,
    device_id,
};
pub use presets::{PresetVariant, PresetsFile, QualityGroup};
pub use probe::{ProbedDevice, ProbedInput};
pub use status::system_status;
pub use telemetry::StreamStats;
