use serde::{Deserialize, Serialize};

/// One input as reported by the hardware probe executable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbedInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default)]
    pub signal_detected: bool,
    #[serde(default)]
    pub format: Option<String>,
}

/// One capture device as reported by the hardware probe executable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbedDevice {
    #[serde(default)]
    pub device_number: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: Vec<ProbedInput>,
}
