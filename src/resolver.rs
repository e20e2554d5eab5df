//! Manifest resolution and the update gate
//!
//! [`UpdateResolver`] fetches the remote manifest, caches it, and decides
//! whether an update should be offered to the host.
//!
//! Every failure is absorbed: [`UpdateResolver::fetch`] returns `None` and
//! records a readable reason in [`UpdateResolver::last_error`], and
//! [`UpdateResolver::should_offer`] fails closed. Callers that need the
//! reason as a value use [`UpdateResolver::try_fetch`].
//!
//! # Examples
//!
//! ```no_run
//! use globalblocks_updater::{Config, UpdateResolver};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//! let mut resolver = UpdateResolver::from_config(&config)?;
//!
//! let decision = resolver.should_offer("1.3.0", "6.4", "8.1");
//! if decision.eligible {
//!     println!("Update available: {:?}", decision.target_version);
//! }
//! # Ok(())
//! # }
//! ```

use crate::cache::{cache_key, CacheStore, CachedManifest, Clock, FileCacheStore, SystemClock};
use crate::config::Config;
use crate::manifest::{sanitize_key, Manifest};
use crate::transport::{HttpTransport, ManifestTransport};
use crate::version::{is_newer, satisfies_minimum};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::rc::Rc;

/// Placeholder for diagnostics fields whose source is unavailable
pub const NOT_AVAILABLE: &str = "n/a";

/// Why an update was or was not offered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DecisionReason {
    Eligible,
    /// The manifest could not be fetched or parsed
    ManifestUnavailable,
    /// Installed version is equal to or newer than the remote one
    UpToDate,
    PlatformTooOld { required: String },
    RuntimeTooOld { required: String },
    /// The manifest has no download location
    MissingPackage,
}

/// Outcome of the update gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateDecision {
    pub eligible: bool,
    pub target_version: Option<String>,
    pub package_url: Option<String>,
    #[serde(flatten)]
    pub reason: DecisionReason,
}

impl UpdateDecision {
    fn rejected(manifest: Option<&Manifest>, reason: DecisionReason) -> Self {
        Self {
            eligible: false,
            target_version: manifest.map(|m| m.version.clone()),
            package_url: manifest
                .map(|m| m.download_url.clone())
                .filter(|url| !url.is_empty()),
            reason,
        }
    }
}

/// Complete, fixed-shape view of the updater state for the diagnostics page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebugSnapshot {
    pub installed_version: String,
    pub remote_version: String,
    pub remote_requires_platform: String,
    pub remote_requires_runtime: String,
    pub download_url: String,
    pub remote_last_updated: String,
    pub transient_detected_version: String,
    pub manifest_url: String,
    pub last_error: String,
}

fn or_na(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(NOT_AVAILABLE)
        .to_string()
}

pub struct UpdateResolver {
    slug: String,
    manifest_url: String,
    ttl_seconds: u64,
    cache_key: String,
    transport: Box<dyn ManifestTransport>,
    cache: Box<dyn CacheStore>,
    clock: Rc<dyn Clock>,
    /// Memoized manifest for the rest of this process run
    last_response: Option<Manifest>,
    last_error: Option<String>,
}

impl UpdateResolver {
    pub fn new(
        slug: &str,
        manifest_url: &str,
        ttl_seconds: u64,
        transport: Box<dyn ManifestTransport>,
        cache: Box<dyn CacheStore>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        let slug = sanitize_key(slug);
        Self {
            cache_key: cache_key(&slug),
            slug,
            manifest_url: manifest_url.to_string(),
            ttl_seconds,
            transport,
            cache,
            clock,
            last_response: None,
            last_error: None,
        }
    }

    /// Resolver backed by HTTP and the on-disk cache described by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let clock: Rc<dyn Clock> = Rc::new(SystemClock);
        let transport = HttpTransport::new(config.remote.timeout_seconds, &config.remote.user_agent)?;
        let cache = FileCacheStore::new(config.cache_dir(), clock.clone())?;

        Ok(Self::new(
            &config.slug(),
            &config.remote.manifest_url,
            config.cache.ttl_seconds,
            Box::new(transport),
            Box::new(cache),
            clock,
        ))
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn manifest_url(&self) -> &str {
        &self.manifest_url
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Reason the most recent fetch failed, if it did
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Fetch the manifest, absorbing any failure
    ///
    /// Returns `None` on failure and records the reason in
    /// [`last_error`](Self::last_error).
    pub fn fetch(&mut self, use_cache: bool) -> Option<Manifest> {
        self.last_error = None;

        match self.try_fetch(use_cache) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                tracing::warn!(url = %self.manifest_url, error = %e, "manifest fetch failed");
                self.last_error = Some(e.to_string());
                None
            }
        }
    }

    /// Fetch the manifest, returning the failure reason as an error
    ///
    /// With `use_cache`, the in-process memo and then the cache store are
    /// consulted before the network. Without it, exactly one request is made.
    pub fn try_fetch(&mut self, use_cache: bool) -> Result<Manifest> {
        if use_cache {
            if let Some(manifest) = &self.last_response {
                return Ok(manifest.clone());
            }

            if let Some(cached) = self.read_cache() {
                tracing::debug!(slug = %self.slug, fetched_at = %cached.fetched_at, "using cached manifest");
                self.last_response = Some(cached.manifest.clone());
                return Ok(cached.manifest);
            }
        }

        tracing::debug!(url = %self.manifest_url, "requesting manifest");
        let body = self.transport.get(&self.manifest_url)?;
        let manifest = Manifest::from_slice(&body)?;
        manifest.check_slug(&self.slug)?;

        tracing::info!(slug = %self.slug, version = %manifest.version, "fetched manifest");
        self.write_cache(&manifest);
        self.last_response = Some(manifest.clone());

        Ok(manifest)
    }

    fn read_cache(&self) -> Option<CachedManifest> {
        let raw = self.cache.get(&self.cache_key)?;

        let cached: CachedManifest = match serde_json::from_str(&raw) {
            Ok(cached) => cached,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring undecodable cache entry");
                return None;
            }
        };

        if !cached.is_fresh(self.clock.now(), self.ttl_seconds) {
            tracing::debug!(slug = %self.slug, "cached manifest expired");
            return None;
        }

        if cached.manifest.check_slug(&self.slug).is_err() {
            return None;
        }

        Some(cached)
    }

    fn write_cache(&self, manifest: &Manifest) {
        let entry = CachedManifest::new(manifest.clone(), self.clock.now());

        let result = serde_json::to_string(&entry)
            .map_err(crate::Error::from)
            .and_then(|raw| self.cache.set(&self.cache_key, &raw, self.ttl_seconds));

        // A failed cache write only costs a refetch next time
        if let Err(e) = result {
            tracing::warn!(key = %self.cache_key, error = %e, "failed to cache manifest");
        }
    }

    /// Drop both the cached entry and the in-process memo
    pub fn clear_cache(&mut self) {
        if let Err(e) = self.cache.delete(&self.cache_key) {
            tracing::warn!(key = %self.cache_key, error = %e, "failed to clear manifest cache");
        }
        self.last_response = None;
    }

    /// Clear the cache and immediately refetch, ignoring the time-to-live
    pub fn force_check(&mut self) -> Option<Manifest> {
        self.clear_cache();
        self.fetch(false)
    }

    /// Decide whether to offer the remote release to this host
    ///
    /// All of the following must hold: the remote version is newer than
    /// `installed`, the host platform meets `requires`, the runtime meets
    /// `requires_php`, and the manifest names a download location.
    pub fn should_offer(
        &mut self,
        installed: &str,
        platform_version: &str,
        runtime_version: &str,
    ) -> UpdateDecision {
        let Some(manifest) = self.fetch(true) else {
            return UpdateDecision::rejected(None, DecisionReason::ManifestUnavailable);
        };

        let reason = if !is_newer(installed, &manifest.version) {
            DecisionReason::UpToDate
        } else if !satisfies_minimum(&manifest.requires, platform_version) {
            DecisionReason::PlatformTooOld {
                required: manifest.requires.clone(),
            }
        } else if !satisfies_minimum(&manifest.requires_php, runtime_version) {
            DecisionReason::RuntimeTooOld {
                required: manifest.requires_php.clone(),
            }
        } else if manifest.download_url.trim().is_empty() {
            DecisionReason::MissingPackage
        } else {
            DecisionReason::Eligible
        };

        if reason != DecisionReason::Eligible {
            tracing::debug!(installed, remote = %manifest.version, ?reason, "update not offered");
            return UpdateDecision::rejected(Some(&manifest), reason);
        }

        UpdateDecision {
            eligible: true,
            target_version: Some(manifest.version.clone()),
            package_url: Some(manifest.download_url.clone()),
            reason,
        }
    }

    /// Diagnostics view; every unavailable field reads `"n/a"`
    pub fn debug_snapshot(
        &mut self,
        installed: &str,
        transient_version: Option<&str>,
    ) -> DebugSnapshot {
        let manifest = self.fetch(true);
        let manifest = manifest.as_ref();

        DebugSnapshot {
            installed_version: or_na(Some(installed)),
            remote_version: or_na(manifest.map(|m| m.version.as_str())),
            remote_requires_platform: or_na(manifest.map(|m| m.requires.as_str())),
            remote_requires_runtime: or_na(manifest.map(|m| m.requires_php.as_str())),
            download_url: or_na(manifest.map(|m| m.download_url.as_str())),
            remote_last_updated: or_na(manifest.map(|m| m.last_updated.as_str())),
            transient_detected_version: or_na(transient_version),
            manifest_url: or_na(Some(self.manifest_url.as_str())),
            last_error: or_na(self.last_error.as_deref()),
        }
    }
}
