//! globalblocks-updater - self-hosted updates for the 360 Global Blocks plugin
//!
//! Instead of the public plugin directory, the plugin checks a JSON manifest
//! hosted by its maintainers. This crate provides:
//!
//! - Manifest fetching with a one-day cache and a per-process memo
//! - A numeric, multi-segment version gate covering platform and runtime
//!   requirements
//! - Install-path repair so unpacked archives land in `<plugins_dir>/<slug>`
//! - A diagnostics snapshot with a fixed shape
//!
//! Failures never propagate to the host: fetches degrade to "no update known"
//! and relocations leave the original location intact.
//!
//! # Examples
//!
//! ```no_run
//! use globalblocks_updater::{Config, UpdaterHost};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//! let mut host = UpdaterHost::new();
//! let updater = host.init(&config)?;
//!
//! let transient = updater.force_check();
//! println!("{} update(s) available", transient.response.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`resolver`] - Fetch, cache, and gate updates
//! - [`relocate`] - Normalize the install directory after unpacking
//! - [`host`] - Host extension points and the composition root
//! - [`manifest`] - Manifest wire format
//! - [`cache`] - Key-value cache stores
//! - [`transport`] - HTTP client
//! - [`version`] - Version comparison
//! - [`header`] - Plugin header parsing
//! - [`config`] - Configuration
//! - [`error`] - Error types and result handling

pub mod cache;
pub mod config;
pub mod error;
pub mod header;
pub mod host;
pub mod manifest;
pub mod relocate;
pub mod resolver;
pub mod transport;
pub mod version;

pub use cache::{
    cache_key, CacheStore, CachedManifest, Clock, FileCacheStore, ManualClock, MemoryCacheStore,
    SystemClock,
};
pub use config::Config;
pub use error::{Error, Result};
pub use header::{installed_version, read_header_version};
pub use host::{
    PluginInfo, PluginInfoArgs, UpdateRecord, UpdateTransient, Updater, UpdaterHost,
    UpgradeOptions,
};
pub use manifest::{sanitize_key, Banners, Manifest, Sections};
pub use relocate::{
    Filesystem, HookExtra, InstallResult, LocalFilesystem, PackageIdentity, Relocator,
};
pub use resolver::{DebugSnapshot, DecisionReason, UpdateDecision, UpdateResolver, NOT_AVAILABLE};
pub use transport::{HttpTransport, ManifestTransport};
pub use version::{compare_versions, is_newer, satisfies_minimum};
