//! Host integration surface
//!
//! The host CMS calls into the updater at a handful of extension points:
//!
//! - plugin information lookups ([`Updater::plugins_api`])
//! - the update-check transient ([`Updater::filter_update_transient`])
//! - upgrade completion ([`Updater::on_upgrade_complete`])
//! - the two install-path hooks, delegated to [`Relocator`]
//!
//! [`UpdaterHost`] is the composition root that owns the single
//! [`Updater`] instance.

use crate::cache::CacheStore;
use crate::config::Config;
use crate::header::installed_version;
use crate::manifest::{sanitize_key, Banners, Sections};
use crate::relocate::{HookExtra, InstallResult, Relocator};
use crate::resolver::{DebugSnapshot, UpdateResolver};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Action name of plugin information lookups
pub const PLUGIN_INFORMATION_ACTION: &str = "plugin_information";

/// Cache key under which the host's update transient is persisted
pub const UPDATE_TRANSIENT_KEY: &str = "update_plugins";

const DEFAULT_REQUIRES: &str = "6.0";
const DEFAULT_REQUIRES_PHP: &str = "7.4";
const DEFAULT_AUTHOR: &str = "Kaz Alvis";
const DEFAULT_AUTHOR_PROFILE: &str = "https://github.com/KazimirAlvis";
const DEFAULT_HOMEPAGE: &str = "https://github.com/KazimirAlvis/360-Global-Blocks";

/// Arguments of a plugin information lookup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginInfoArgs {
    #[serde(default)]
    pub slug: String,
}

/// Response to a plugin information lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    pub slug: String,
    pub version: String,
    pub tested: String,
    pub requires: String,
    pub requires_php: String,
    pub author: String,
    pub author_profile: String,
    pub homepage: String,
    pub last_updated: String,
    pub download_link: String,
    pub sections: Sections,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banners: Option<Banners>,
}

/// Entry added to the transient when an update is available
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRecord {
    pub slug: String,
    pub plugin: String,
    pub new_version: String,
    pub tested: String,
    pub package: String,
}

/// The host's record of installed versions and available updates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTransient {
    /// Plugin basename -> installed version
    #[serde(default)]
    pub checked: BTreeMap<String, String>,

    /// Plugin basename -> available update
    #[serde(default)]
    pub response: BTreeMap<String, UpdateRecord>,
}

impl UpdateTransient {
    pub fn load(store: &dyn CacheStore) -> Option<Self> {
        let raw = store.get(UPDATE_TRANSIENT_KEY)?;
        serde_json::from_str(&raw).ok()
    }

    pub fn save(&self, store: &dyn CacheStore, ttl_seconds: u64) -> Result<()> {
        store.set(UPDATE_TRANSIENT_KEY, &serde_json::to_string(self)?, ttl_seconds)
    }

    pub fn delete(store: &dyn CacheStore) -> Result<()> {
        store.delete(UPDATE_TRANSIENT_KEY)
    }
}

/// Options passed to the upgrade-complete action
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpgradeOptions {
    pub action: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Plugin basenames touched by the upgrade
    #[serde(default)]
    pub plugins: Vec<String>,
}

fn non_empty(value: &str) -> Option<&str> {
    Some(value.trim()).filter(|v| !v.is_empty())
}

/// Resolver and relocator bound to one plugin on one host
pub struct Updater {
    resolver: UpdateResolver,
    relocator: Relocator,
    slug: String,
    plugin_file: String,
    display_name: String,
    installed_version: String,
    platform_version: String,
    runtime_version: String,
}

impl Updater {
    pub fn new(
        config: &Config,
        installed_version: &str,
        resolver: UpdateResolver,
        relocator: Relocator,
    ) -> Self {
        Self {
            resolver,
            relocator,
            slug: config.slug(),
            plugin_file: config.package.plugin_file.clone(),
            display_name: config.package.display_name.clone(),
            installed_version: installed_version.to_string(),
            platform_version: config.host.platform_version.clone(),
            runtime_version: config.host.runtime_version.clone(),
        }
    }

    /// Updater wired to HTTP, the on-disk cache, and the local filesystem
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let installed = installed_version(config)?;
        let resolver = UpdateResolver::from_config(config)?;
        let relocator = Relocator::from_config(config);
        Ok(Self::new(config, &installed, resolver, relocator))
    }

    pub fn resolver(&mut self) -> &mut UpdateResolver {
        &mut self.resolver
    }

    pub fn relocator(&self) -> &Relocator {
        &self.relocator
    }

    pub fn installed_version(&self) -> &str {
        &self.installed_version
    }

    pub fn plugin_file(&self) -> &str {
        &self.plugin_file
    }

    /// Answer a plugin information lookup
    ///
    /// `None` means "not ours": the host keeps whatever response it had.
    pub fn plugins_api(&mut self, action: &str, args: &PluginInfoArgs) -> Option<PluginInfo> {
        if action != PLUGIN_INFORMATION_ACTION {
            return None;
        }

        if args.slug.is_empty() || sanitize_key(&args.slug) != self.slug {
            return None;
        }

        let manifest = self.resolver.fetch(true)?;
        let now = self.resolver.now().format("%Y-%m-%d %H:%M:%S").to_string();

        Some(PluginInfo {
            name: non_empty(&manifest.name)
                .unwrap_or(self.display_name.as_str())
                .to_string(),
            slug: self.slug.clone(),
            version: non_empty(&manifest.version)
                .unwrap_or(self.installed_version.as_str())
                .to_string(),
            tested: manifest
                .tested
                .clone()
                .unwrap_or_else(|| self.platform_version.clone()),
            requires: non_empty(&manifest.requires)
                .unwrap_or(DEFAULT_REQUIRES)
                .to_string(),
            requires_php: non_empty(&manifest.requires_php)
                .unwrap_or(DEFAULT_REQUIRES_PHP)
                .to_string(),
            author: manifest
                .author
                .clone()
                .unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
            author_profile: DEFAULT_AUTHOR_PROFILE.to_string(),
            homepage: manifest
                .homepage
                .clone()
                .unwrap_or_else(|| DEFAULT_HOMEPAGE.to_string()),
            last_updated: non_empty(&manifest.last_updated)
                .map(str::to_string)
                .unwrap_or(now),
            download_link: manifest.download_url.clone(),
            sections: manifest.sections.clone(),
            banners: manifest.banners.clone().filter(|b| !b.is_empty()),
        })
    }

    /// Add this plugin's update record to the transient when one is offered
    ///
    /// Any earlier record for this plugin is dropped when no update is
    /// offered. A transient with nothing checked is returned as is.
    pub fn filter_update_transient(&mut self, mut transient: UpdateTransient) -> UpdateTransient {
        if transient.checked.is_empty() {
            return transient;
        }

        let decision = self.resolver.should_offer(
            &self.installed_version,
            &self.platform_version,
            &self.runtime_version,
        );

        if let (true, Some(new_version), Some(package)) = (
            decision.eligible,
            decision.target_version,
            decision.package_url,
        ) {
            let tested = self
                .resolver
                .fetch(true)
                .and_then(|m| m.tested)
                .unwrap_or_else(|| self.platform_version.clone());

            tracing::info!(version = %new_version, "offering update");
            transient.response.insert(
                self.plugin_file.clone(),
                UpdateRecord {
                    slug: self.slug.clone(),
                    plugin: self.plugin_file.clone(),
                    new_version,
                    tested,
                    package,
                },
            );
        } else if transient.response.remove(&self.plugin_file).is_some() {
            tracing::debug!(plugin = %self.plugin_file, "dropped stale update record");
        }

        transient
    }

    /// Invalidate the cached manifest after this plugin was updated
    ///
    /// Returns whether the cache was cleared.
    pub fn on_upgrade_complete(&mut self, options: &UpgradeOptions) -> bool {
        let ours = options.action == "update"
            && options.kind == "plugin"
            && options.plugins.iter().any(|p| p == &self.plugin_file);

        if ours {
            tracing::info!(slug = %self.slug, "plugin updated, clearing manifest cache");
            self.resolver.clear_cache();
        }
        ours
    }

    pub fn on_source_selected(&self, source: &Path, extra: &HookExtra) -> PathBuf {
        self.relocator.on_source_selected(source, extra)
    }

    pub fn on_post_install(&self, result: InstallResult, extra: &HookExtra) -> InstallResult {
        self.relocator.on_post_install(result, extra)
    }

    /// Drop cached state and rebuild the update transient from a fresh fetch
    pub fn force_check(&mut self) -> UpdateTransient {
        self.resolver.clear_cache();
        self.resolver.fetch(false);

        let mut transient = UpdateTransient::default();
        transient
            .checked
            .insert(self.plugin_file.clone(), self.installed_version.clone());
        self.filter_update_transient(transient)
    }

    pub fn debug_snapshot(&mut self, transient: Option<&UpdateTransient>) -> DebugSnapshot {
        let detected = transient
            .and_then(|t| t.response.get(&self.plugin_file))
            .map(|r| r.new_version.clone());
        let installed = self.installed_version.clone();
        self.resolver.debug_snapshot(&installed, detected.as_deref())
    }
}

/// Owner of the process's single [`Updater`]
///
/// Repeated initialization returns the existing instance instead of
/// registering a second one.
#[derive(Default)]
pub struct UpdaterHost {
    updater: Option<Updater>,
}

impl UpdaterHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.updater.is_some()
    }

    pub fn init(&mut self, config: &Config) -> Result<&mut Updater> {
        self.init_with(|| Updater::from_config(config))
    }

    /// Build the updater with `build` unless one already exists
    pub fn init_with<F>(&mut self, build: F) -> Result<&mut Updater>
    where
        F: FnOnce() -> Result<Updater>,
    {
        if self.updater.is_some() {
            tracing::debug!("updater already initialized");
        } else {
            self.updater = Some(build()?);
        }

        self.get()
            .ok_or_else(|| Error::Other("updater failed to initialize".to_string()))
    }

    pub fn get(&mut self) -> Option<&mut Updater> {
        self.updater.as_mut()
    }
}
