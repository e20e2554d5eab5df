//! Test utilities shared by the integration tests.
//!
//! Provides manifest fixtures, a scripted transport, an in-memory host setup,
//! and a temporary plugins directory.

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use globalblocks_updater::{
    Config, Error, LocalFilesystem, ManifestTransport, ManualClock, MemoryCacheStore,
    PackageIdentity, Relocator, Result, UpdateResolver, Updater,
};
use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

pub const SLUG: &str = "360-global-blocks";
pub const PLUGIN_FILE: &str = "360-global-blocks/360-global-blocks.php";
pub const DOWNLOAD_URL: &str =
    "https://github.com/KazimirAlvis/360-Global-Blocks/archive/refs/heads/main.zip";

/// Manifest body with the given version and requirements
pub fn manifest_json(version: &str, requires: &str, requires_php: &str, download_url: &str) -> String {
    format!(
        r#"{{
    "name": "360 Global Blocks",
    "slug": "{SLUG}",
    "version": "{version}",
    "requires": "{requires}",
    "requires_php": "{requires_php}",
    "download_url": "{download_url}",
    "last_updated": "2025-01-14 09:12:00",
    "sections": {{
        "description": "Custom Gutenberg blocks for the 360 network.",
        "installation": "Upload and activate.",
        "changelog": "<h4>{version}</h4><ul><li>Fixes</li></ul>"
    }},
    "banners": {{ "low": "https://example.com/banner-772x250.png" }}
}}"#
    )
}

/// The reference manifest: 1.3.24, requires 6.0 / 7.4
pub fn reference_manifest() -> String {
    manifest_json("1.3.24", "6.0", "7.4", DOWNLOAD_URL)
}

/// Transport answering from a queue and counting requests
#[derive(Clone)]
pub struct ScriptedTransport {
    responses: Rc<RefCell<Vec<Result<Vec<u8>>>>>,
    pub calls: Rc<Cell<usize>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            responses: Rc::new(RefCell::new(Vec::new())),
            calls: Rc::new(Cell::new(0)),
        }
    }

    pub fn push_body(&self, body: &str) -> &Self {
        self.responses.borrow_mut().push(Ok(body.as_bytes().to_vec()));
        self
    }

    pub fn push_error(&self, error: Error) -> &Self {
        self.responses.borrow_mut().push(Err(error));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl ManifestTransport for ScriptedTransport {
    fn get(&self, _url: &str) -> Result<Vec<u8>> {
        self.calls.set(self.calls.get() + 1);
        let mut responses = self.responses.borrow_mut();
        if responses.is_empty() {
            return Err(Error::Transport("connection refused".to_string()));
        }
        responses.remove(0)
    }
}

pub fn test_clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 14, 9, 0, 0).unwrap())
}

/// Plugins directory in a temp dir plus a config pointing at it
pub struct TestSite {
    pub temp_dir: TempDir,
    pub plugins_dir: PathBuf,
    pub config: Config,
}

impl TestSite {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let plugins_dir = temp_dir.path().join("wp-content").join("plugins");
        fs::create_dir_all(&plugins_dir).expect("Failed to create plugins directory");

        let mut config = Config::default();
        config.install.plugins_dir = plugins_dir.to_string_lossy().to_string();
        config.cache.dir = temp_dir.path().join("cache").to_string_lossy().to_string();
        config.remote.manifest_url = "https://example.com/plugin-manifest.json".to_string();
        config.host.platform_version = "6.4".to_string();
        config.host.runtime_version = "8.1".to_string();

        Self {
            temp_dir,
            plugins_dir,
            config,
        }
    }

    /// Create a directory holding a plugin main file
    pub fn unpack(&self, parent: &Path, dir_name: &str) -> PathBuf {
        let dir = parent.join(dir_name);
        fs::create_dir_all(dir.join("blocks")).expect("Failed to create unpacked dir");
        fs::write(
            dir.join("360-global-blocks.php"),
            "<?php\n/*\nPlugin Name: 360 Global Blocks\n * Version: 1.3.24\n*/\n",
        )
        .expect("Failed to write plugin file");
        dir
    }

    /// Temporary upgrade directory, as used by the host's unpacker
    pub fn upgrade_dir(&self) -> PathBuf {
        let dir = self.temp_dir.path().join("wp-content").join("upgrade").join("tmp-3f9a2c1");
        fs::create_dir_all(&dir).expect("Failed to create upgrade dir");
        dir
    }

    pub fn relocator(&self) -> Relocator {
        Relocator::new(
            PackageIdentity::new(SLUG, PLUGIN_FILE),
            &self.plugins_dir,
            Box::new(LocalFilesystem),
        )
    }

    /// Updater over a scripted transport and an in-memory cache
    pub fn updater(&self, installed: &str, transport: &ScriptedTransport) -> Updater {
        let clock = test_clock();
        let resolver = UpdateResolver::new(
            SLUG,
            &self.config.remote.manifest_url,
            self.config.cache.ttl_seconds,
            Box::new(transport.clone()),
            Box::new(MemoryCacheStore::new(Rc::new(clock.clone()))),
            Rc::new(clock),
        );
        Updater::new(&self.config, installed, resolver, self.relocator())
    }
}
