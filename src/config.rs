//! Updater configuration
//!
//! Configuration is stored in TOML format at
//! `~/.globalblocks-updater/config.toml`.
//!
//! # Examples
//!
//! ```no_run
//! use globalblocks_updater::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//! println!("Manifest URL: {}", config.remote.manifest_url);
//! println!("Cache TTL: {}s", config.cache.ttl_seconds);
//! # Ok(())
//! # }
//! ```

use crate::cache::DEFAULT_TTL_SECONDS;
use crate::manifest::sanitize_key;
use crate::transport::{HttpTransport, DEFAULT_TIMEOUT_SECONDS};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the config directory
pub const CONFIG_DIR_ENV: &str = "GLOBALBLOCKS_UPDATER_CONFIG_DIR";

/// Environment variable overriding `remote.manifest_url`
pub const MANIFEST_URL_ENV: &str = "GLOBALBLOCKS_UPDATER_MANIFEST_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// The managed plugin
    #[serde(default)]
    pub package: PackageConfig,

    /// Manifest location and request settings
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Manifest cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Versions reported by the host environment
    #[serde(default)]
    pub host: HostConfig,

    /// Install directory settings
    #[serde(default)]
    pub install: InstallConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Stable identifier; also the canonical install directory name
    #[serde(default = "default_slug")]
    pub slug: String,

    /// Plugin basename relative to the plugins directory
    #[serde(default = "default_plugin_file")]
    pub plugin_file: String,

    /// Installed version; read from the plugin header when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_version: Option<String>,

    /// Name shown when the manifest does not carry one
    #[serde(default = "default_display_name")]
    pub display_name: String,
}

fn default_slug() -> String {
    "360-global-blocks".to_string()
}

fn default_plugin_file() -> String {
    "360-global-blocks/360-global-blocks.php".to_string()
}

fn default_display_name() -> String {
    "360 Global Blocks".to_string()
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            slug: default_slug(),
            plugin_file: default_plugin_file(),
            installed_version: None,
            display_name: default_display_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_manifest_url")]
    pub manifest_url: String,

    /// Request timeout, clamped to 1..=15 seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    #[serde(default = "HttpTransport::default_user_agent")]
    pub user_agent: String,
}

fn default_manifest_url() -> String {
    "https://raw.githubusercontent.com/KazimirAlvis/360-Global-Blocks/main/plugin-manifest.json"
        .to_string()
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            manifest_url: default_manifest_url(),
            timeout_seconds: default_timeout_seconds(),
            user_agent: HttpTransport::default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache directory (`~` is expanded)
    #[serde(default = "default_cache_dir")]
    pub dir: String,

    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

fn default_cache_dir() -> String {
    dirs::cache_dir()
        .map(|d| d.join("globalblocks-updater").to_string_lossy().to_string())
        .unwrap_or_else(|| "~/.globalblocks-updater/cache".to_string())
}

fn default_ttl_seconds() -> u64 {
    DEFAULT_TTL_SECONDS
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Host platform version compared against the manifest's `requires`
    #[serde(default = "default_platform_version")]
    pub platform_version: String,

    /// Runtime version compared against the manifest's `requires_php`
    #[serde(default = "default_runtime_version")]
    pub runtime_version: String,
}

fn default_platform_version() -> String {
    "6.4".to_string()
}

fn default_runtime_version() -> String {
    "8.1".to_string()
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            platform_version: default_platform_version(),
            runtime_version: default_runtime_version(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallConfig {
    /// Directory holding installed plugins (`~` is expanded)
    #[serde(default = "default_plugins_dir")]
    pub plugins_dir: String,

    /// Also treat any unpacked directory whose name contains the slug as ours.
    /// Deprecated: prone to false positives.
    #[serde(default)]
    pub legacy_name_match: bool,
}

fn default_plugins_dir() -> String {
    "./wp-content/plugins".to_string()
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            plugins_dir: default_plugins_dir(),
            legacy_name_match: false,
        }
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

impl Config {
    /// Get the config directory
    ///
    /// Uses GLOBALBLOCKS_UPDATER_CONFIG_DIR if set, otherwise ~/.globalblocks-updater
    pub fn default_dir() -> Result<PathBuf> {
        if let Ok(config_dir) = std::env::var(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(config_dir));
        }

        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| Error::Other("Could not find home directory".to_string()))?;

        Ok(PathBuf::from(home).join(".globalblocks-updater"))
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::default_dir()?.join("config.toml"))
    }

    /// Load config from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    /// Load config from `path`, or defaults if it doesn't exist
    ///
    /// `GLOBALBLOCKS_UPDATER_MANIFEST_URL` overrides `remote.manifest_url`.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if !path.exists() {
            Self::default()
        } else {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        };

        if let Ok(url) = std::env::var(MANIFEST_URL_ENV) {
            if !url.is_empty() {
                config.remote.manifest_url = url;
            }
        }

        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Reject configurations the updater cannot work with
    pub fn validate(&self) -> Result<()> {
        if sanitize_key(&self.package.slug).is_empty() {
            return Err(Error::InvalidConfig("package.slug is empty".to_string()));
        }

        let url = url::Url::parse(&self.remote.manifest_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidConfig(format!(
                "remote.manifest_url must be http(s), got '{}'",
                url.scheme()
            )));
        }

        Ok(())
    }

    /// Sanitized package slug
    pub fn slug(&self) -> String {
        sanitize_key(&self.package.slug)
    }

    pub fn cache_dir(&self) -> PathBuf {
        expand(&self.cache.dir)
    }

    pub fn plugins_dir(&self) -> PathBuf {
        expand(&self.install.plugins_dir)
    }

    /// Canonical install location: `<plugins_dir>/<slug>`
    pub fn canonical_install_path(&self) -> PathBuf {
        self.plugins_dir().join(self.slug())
    }

    /// Absolute path of the plugin's main file
    pub fn plugin_file_path(&self) -> PathBuf {
        self.plugins_dir().join(&self.package.plugin_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.package.slug, "360-global-blocks");
        assert_eq!(config.cache.ttl_seconds, 86_400);
        assert_eq!(config.remote.timeout_seconds, 10);
        assert!(!config.install.legacy_name_match);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            r#"[package]
slug = "My-Plugin"

[install]
plugins_dir = "/srv/www/wp-content/plugins"
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.slug(), "my-plugin");
        assert_eq!(config.package.display_name, "360 Global Blocks");
        assert_eq!(
            config.canonical_install_path(),
            PathBuf::from("/srv/www/wp-content/plugins/my-plugin")
        );
    }

    #[test]
    fn test_save_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.package.installed_version = Some("1.3.0".to_string());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.package.installed_version.as_deref(), Some("1.3.0"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.package.slug = "!!!".to_string();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let mut config = Config::default();
        config.remote.manifest_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(Error::Url(_))));

        let mut config = Config::default();
        config.remote.manifest_url = "ftp://example.com/manifest.json".to_string();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }
}
