use anyhow::Result;
use globalblocks_updater::{Config, HookExtra, InstallResult, Relocator};
use std::path::PathBuf;

pub fn run(
    path: PathBuf,
    post_install: bool,
    plugin: Option<String>,
    slug: Option<String>,
) -> Result<()> {
    let config = Config::load()?;
    config.validate()?;
    let relocator = Relocator::from_config(&config);
    let extra = HookExtra { plugin, slug };

    let final_path = if post_install {
        relocator
            .on_post_install(InstallResult::new(path.clone(), path.clone()), &extra)
            .destination
    } else {
        relocator.on_source_selected(&path, &extra)
    };

    if final_path == path {
        println!("Unchanged: {}", path.display());
    } else {
        println!("✓ Moved {} -> {}", path.display(), final_path.display());
    }

    Ok(())
}
