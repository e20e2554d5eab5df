use anyhow::{bail, Result};
use globalblocks_updater::Config;

pub fn run_show() -> Result<()> {
    let config = Config::load()?;
    let config_path = Config::default_path()?;

    println!("Config file: {}", config_path.display());
    if !config_path.exists() {
        println!("(not found, showing defaults)");
    }
    println!();
    print!("{}", toml::to_string_pretty(&config)?);

    if let Err(e) = config.validate() {
        println!();
        println!("⚠ {}", e);
    }

    Ok(())
}

pub fn run_init(force: bool) -> Result<()> {
    let config_path = Config::default_path()?;

    if config_path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }

    Config::default().save()?;
    println!("✓ Wrote {}", config_path.display());
    Ok(())
}
