use anyhow::Result;
use globalblocks_updater::host::PLUGIN_INFORMATION_ACTION;
use globalblocks_updater::{Config, PluginInfoArgs, UpdaterHost};

pub fn run(slug: Option<String>) -> Result<()> {
    let config = Config::load()?;
    let mut host = UpdaterHost::new();
    let updater = host.init(&config)?;

    let args = PluginInfoArgs {
        slug: slug.unwrap_or_else(|| config.slug()),
    };

    let Some(info) = updater.plugins_api(PLUGIN_INFORMATION_ACTION, &args) else {
        println!("No information available for '{}'", args.slug);
        if let Some(error) = updater.resolver().last_error() {
            println!("  {}", error);
        }
        return Ok(());
    };

    println!("{} {}", info.name, info.version);
    println!("  Slug:          {}", info.slug);
    println!("  Requires:      {} (runtime {})", info.requires, info.requires_php);
    println!("  Tested up to:  {}", info.tested);
    println!("  Last updated:  {}", info.last_updated);
    println!("  Homepage:      {}", info.homepage);
    println!("  Download:      {}", info.download_link);

    if !info.sections.changelog.is_empty() {
        println!();
        println!("Changelog:");
        for line in info.sections.changelog.lines() {
            println!("  {}", line);
        }
    }

    Ok(())
}
