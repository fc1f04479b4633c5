use std::path::Path;

use sentinel_model::{DestinationsFile, PresetsFile};

use crate::error::{CoreError, Result};

/// Load the static destinations catalogue.
///
/// Fatal at daemon startup; per-tick re-reads treat an error as an
/// intent-resolution failure instead.
pub fn load_destinations(path: &Path) -> Result<DestinationsFile> {
    let raw = std::fs::read_to_string(path).map_err(|source| {
        CoreError::ConfigRead {
            path: path.to_path_buf(),
            source,
        }
    })?;
    serde_json::from_str(&raw).map_err(|source| CoreError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the static encoding presets catalogue. Same policy as
/// [`load_destinations`].
pub fn load_presets(path: &Path) -> Result<PresetsFile> {
    let raw = std::fs::read_to_string(path).map_err(|source| {
        CoreError::ConfigRead {
            path: path.to_path_buf(),
            source,
        }
    })?;
    serde_json::from_str(&raw).map_err(|source| CoreError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}
