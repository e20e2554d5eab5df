use super::{load_transient, transient_store};
use anyhow::Result;
use globalblocks_updater::{Config, DecisionReason, UpdaterHost};

pub fn run(json: bool) -> Result<()> {
    let config = Config::load()?;
    let mut host = UpdaterHost::new();
    let updater = host.init(&config)?;

    let installed = updater.installed_version().to_string();
    let decision = updater.resolver().should_offer(
        &installed,
        &config.host.platform_version,
        &config.host.runtime_version,
    );

    // Keep the persisted transient in step with what the host would see
    let store = transient_store(&config)?;
    let transient = load_transient(&store, updater.plugin_file(), &installed);
    let transient = updater.filter_update_transient(transient);
    transient.save(&store, config.cache.ttl_seconds)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
        return Ok(());
    }

    println!("Installed: {}", installed);
    match decision.reason {
        DecisionReason::Eligible => {
            println!(
                "✓ Update available: {}",
                decision.target_version.unwrap_or_default()
            );
            println!("  Package: {}", decision.package_url.unwrap_or_default());
        }
        DecisionReason::UpToDate => println!("✓ Up to date"),
        DecisionReason::ManifestUnavailable => {
            println!("✗ Manifest unavailable");
            if let Some(error) = updater.resolver().last_error() {
                println!("  {}", error);
            }
        }
        DecisionReason::PlatformTooOld { required } => {
            println!(
                "⚠ Update to {} requires platform {} (host has {})",
                decision.target_version.unwrap_or_default(),
                required,
                config.host.platform_version
            );
        }
        DecisionReason::RuntimeTooOld { required } => {
            println!(
                "⚠ Update to {} requires runtime {} (host has {})",
                decision.target_version.unwrap_or_default(),
                required,
                config.host.runtime_version
            );
        }
        DecisionReason::MissingPackage => {
            println!("⚠ Manifest lists a newer version but no download URL");
        }
    }

    Ok(())
}

pub fn run_force() -> Result<()> {
    let config = Config::load()?;
    let mut host = UpdaterHost::new();
    let updater = host.init(&config)?;

    println!("Checking {} ...", config.remote.manifest_url);

    let transient = updater.force_check();
    let store = transient_store(&config)?;
    transient.save(&store, config.cache.ttl_seconds)?;

    match transient.response.get(updater.plugin_file()) {
        Some(record) => println!("✓ Update available: {}", record.new_version),
        None => match updater.resolver().last_error() {
            Some(error) => println!("✗ Check failed: {}", error),
            None => println!("✓ No update offered"),
        },
    }

    Ok(())
}
