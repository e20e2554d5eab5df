pub mod cache;
pub mod check;
pub mod config;
pub mod debug;
pub mod info;
pub mod relocate;

use anyhow::Result;
use globalblocks_updater::{Config, FileCacheStore, SystemClock, UpdateTransient};
use std::rc::Rc;

/// Store holding the host-side update transient, next to the manifest cache
pub fn transient_store(config: &Config) -> Result<FileCacheStore> {
    Ok(FileCacheStore::new(
        config.cache_dir(),
        Rc::new(SystemClock),
    )?)
}

/// Persisted transient, or a fresh one recording the installed version
pub fn load_transient(store: &FileCacheStore, plugin_file: &str, installed: &str) -> UpdateTransient {
    let mut transient = UpdateTransient::load(store).unwrap_or_default();
    transient
        .checked
        .insert(plugin_file.to_string(), installed.to_string());
    transient
}
