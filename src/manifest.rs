//! Remote update manifest
//!
//! The manifest is a JSON document hosted by the plugin operator describing
//! the latest available release:
//!
//! ```json
//! {
//!   "name": "360 Global Blocks",
//!   "slug": "360-global-blocks",
//!   "version": "1.3.24",
//!   "requires": "6.0",
//!   "requires_php": "7.4",
//!   "download_url": "https://github.com/KazimirAlvis/360-Global-Blocks/archive/refs/heads/main.zip",
//!   "last_updated": "2025-01-14 09:12:00",
//!   "sections": { "description": "...", "installation": "...", "changelog": "..." },
//!   "banners": { "low": "https://...", "high": "https://..." }
//! }
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// Latest-release descriptor fetched from the manifest URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub slug: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub version: String,

    /// Minimum host platform version
    #[serde(default, deserialize_with = "null_as_default")]
    pub requires: String,

    /// Minimum runtime version
    #[serde(default, deserialize_with = "null_as_default")]
    pub requires_php: String,

    /// Highest host platform version the release was tested against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tested: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub download_url: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub last_updated: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub sections: Sections,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banners: Option<Banners>,
}

/// Read an explicit `null` the same as a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sections {
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub installation: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub changelog: String,
}

/// Banner image URLs shown in the plugin information modal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Banners {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<String>,
}

impl Banners {
    pub fn is_empty(&self) -> bool {
        self.low.is_none() && self.high.is_none()
    }
}

impl Manifest {
    /// Parse a manifest response body
    ///
    /// Fails with [`Error::EmptyManifest`] for a blank body and
    /// [`Error::ManifestFormat`] when the body is not a manifest object or
    /// carries no version.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        if body.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(Error::EmptyManifest);
        }

        let value: serde_json::Value =
            serde_json::from_slice(body).map_err(|e| Error::ManifestFormat(e.to_string()))?;

        if !value.is_object() {
            return Err(Error::ManifestFormat(
                "expected a JSON object at the top level".to_string(),
            ));
        }

        let manifest: Manifest =
            serde_json::from_value(value).map_err(|e| Error::ManifestFormat(e.to_string()))?;

        if manifest.version.trim().is_empty() {
            return Err(Error::ManifestFormat(
                "manifest is missing a version".to_string(),
            ));
        }

        Ok(manifest)
    }

    /// Reject manifests published for a different package
    ///
    /// A manifest without a slug is accepted, since its URL is already
    /// specific to one package.
    pub fn check_slug(&self, expected: &str) -> Result<()> {
        if self.slug.trim().is_empty() {
            return Ok(());
        }

        let found = sanitize_key(&self.slug);
        if found != sanitize_key(expected) {
            return Err(Error::SlugMismatch {
                expected: expected.to_string(),
                found,
            });
        }

        Ok(())
    }
}

/// Normalize an identifier to lowercase `[a-z0-9_-]`
pub fn sanitize_key(key: &str) -> String {
    key.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}
