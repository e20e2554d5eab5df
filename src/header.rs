//! Plugin file header parsing
//!
//! The installed version lives in the comment header of the plugin's main
//! file:
//!
//! ```text
//! /*
//! Plugin Name: 360 Global Blocks
//!  * Version: 1.2.12
//! */
//! ```

use crate::config::Config;
use crate::Result;
use regex::Regex;
use std::fs;
use std::sync::OnceLock;

/// Version reported when neither the config nor the plugin header provide one
pub const FALLBACK_VERSION: &str = "0.0.0";

fn starred_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)^\s*\*\s*Version:\s*([^\r\n]+)").expect("valid regex"))
}

fn bare_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)Version:\s*([^\r\n]+)").expect("valid regex"))
}

/// Extract the `Version:` value from a plugin file header
///
/// A ` * Version:` line inside a doc-block wins over a bare `Version:`.
pub fn read_header_version(content: &str) -> Option<String> {
    [starred_pattern(), bare_pattern()]
        .iter()
        .find_map(|re| re.captures(content))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Installed version of the managed plugin
///
/// Uses `package.installed_version` when configured, otherwise reads the
/// header of `install.plugins_dir/package.plugin_file`.
pub fn installed_version(config: &Config) -> Result<String> {
    if let Some(version) = config
        .package
        .installed_version
        .as_deref()
        .filter(|v| !v.trim().is_empty())
    {
        return Ok(version.trim().to_string());
    }

    let path = config.plugin_file_path();
    if !path.exists() {
        tracing::debug!(path = %path.display(), "plugin file not found, using fallback version");
        return Ok(FALLBACK_VERSION.to_string());
    }

    let content = fs::read_to_string(&path)?;
    Ok(read_header_version(&content).unwrap_or_else(|| FALLBACK_VERSION.to_string()))
}
