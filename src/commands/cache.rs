//! Cache management commands
//!
//! - `cache clear` - Remove the cached manifest and the stored update record
//! - `cache path` - Show the cache location and key

use super::transient_store;
use anyhow::Result;
use globalblocks_updater::{cache_key, CacheStore, Config, UpdateTransient};

pub fn run_clear() -> Result<()> {
    let config = Config::load()?;
    let store = transient_store(&config)?;

    store.delete(&cache_key(&config.slug()))?;
    UpdateTransient::delete(&store)?;

    println!("✓ Cleared cached manifest for '{}'", config.slug());
    Ok(())
}

pub fn run_path() -> Result<()> {
    let config = Config::load()?;

    println!("{}", config.cache_dir().display());
    println!("key: {}", cache_key(&config.slug()));
    Ok(())
}
