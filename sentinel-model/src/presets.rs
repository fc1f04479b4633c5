use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One encoding preset: output geometry, frame rate, and video bitrate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetVariant {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Target video bitrate in kbps.
    pub bitrate: u32,
}

/// A quality tier grouping several variants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityGroup {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub variants: Vec<PresetVariant>,
}

/// The static presets catalogue file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetsFile {
    #[serde(default)]
    pub presets: BTreeMap<String, QualityGroup>,
}

impl PresetsFile {
    /// Look a variant up by id across every quality group.
    pub fn find_variant(&self, variant_id: &str) -> Option<&PresetVariant> {
        self.presets
            .values()
            .flat_map(|group| &group.variants)
            .find(|variant| variant.id == variant_id)
    }
}
