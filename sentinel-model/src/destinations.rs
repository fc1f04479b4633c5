use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// One stream key within a platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEndpoint {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub key: String,
}

/// One ingest platform and its configured streams.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    #[serde(default)]
    pub name: String,
    pub rtmp_url: String,
    #[serde(default)]
    pub streams: Vec<StreamEndpoint>,
}

/// The static destinations catalogue file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationsFile {
    #[serde(default)]
    pub destinations: BTreeMap<String, Platform>,
}

impl DestinationsFile {
    /// Resolve a destination id against the catalogue.
    pub fn resolve(
        &self,
        id: &DestinationId,
    ) -> Option<(&Platform, &StreamEndpoint)> {
        let platform = self.destinations.get(&id.platform)?;
        let stream =
            platform.streams.iter().find(|stream| stream.id == id.stream)?;
        Some((platform, stream))
    }
}

impl Platform {
    /// Full push URL for one of this platform's streams.
    pub fn ingest_url(&self, stream: &StreamEndpoint) -> String {
        format!("{}/{}", self.rtmp_url, stream.key)
    }
}

/// A `"<platform>:<stream>"` pair identifying one stream key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DestinationId {
    pub platform: String,
    pub stream: String,
}

impl DestinationId {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.split_once(':') {
            Some((platform, stream))
                if !platform.is_empty() && !stream.is_empty() =>
            {
                Ok(DestinationId {
                    platform: platform.to_string(),
                    stream: stream.to_string(),
                })
            }
            _ => Err(ModelError::InvalidDestinationId(raw.to_string())),
        }
    }
}

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.platform, self.stream)
    }
}
