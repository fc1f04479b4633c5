//! # Sentinel Core
//!
//! The autonomous control plane of the Sentinel broadcast appliance:
//!
//! - **State registry**: file-backed JSON documents with per-document
//!   locking and atomic replacement, through which the supervisors and
//!   the external command surface communicate.
//! - **Hardware probe invoker**: runs the black-box probe executable and
//!   turns its output into a typed inventory.
//! - **Pipeline pools**: supervised `gst-launch` child processes for
//!   multicast fan-out and RTMP encoding, including encoder telemetry.
//! - **Supervisors**: the two reconciliation loops that converge hardware
//!   reality and user intent onto running pipelines.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod probe;
pub mod registry;
pub mod state;
pub mod supervisor;
pub mod telemetry;

pub use config::{load_destinations, load_presets};
pub use error::{CoreError, Result};
pub use pipeline::{EncoderPool, MulticastPool};
pub use probe::HardwareProbe;
pub use registry::{
    DEVICE_REGISTRY_DOC, INTENT_DOC, STREAM_STATS_DOC, StateRegistry,
};
pub use state::{AggregatedState, aggregated_state, set_configuration, set_intent};
pub use supervisor::{InputSupervisor, UplinkSupervisor};
