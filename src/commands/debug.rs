use super::transient_store;
use anyhow::Result;
use globalblocks_updater::{Config, UpdateTransient, UpdaterHost};

pub fn run(json: bool) -> Result<()> {
    let config = Config::load()?;
    let mut host = UpdaterHost::new();
    let updater = host.init(&config)?;

    let store = transient_store(&config)?;
    let transient = UpdateTransient::load(&store);
    let snapshot = updater.debug_snapshot(transient.as_ref());

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let rows = [
        ("Installed version", &snapshot.installed_version),
        ("Remote version", &snapshot.remote_version),
        ("Requires platform", &snapshot.remote_requires_platform),
        ("Requires runtime", &snapshot.remote_requires_runtime),
        ("Download URL", &snapshot.download_url),
        ("Last updated", &snapshot.remote_last_updated),
        ("Update in transient", &snapshot.transient_detected_version),
        ("Manifest URL", &snapshot.manifest_url),
        ("Last error", &snapshot.last_error),
    ];

    println!("Updater diagnostics");
    println!("{}", "-".repeat(60));
    for (label, value) in rows {
        println!("{:<22} {}", label, value);
    }

    Ok(())
}
