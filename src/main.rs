use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

/// Self-hosted update checker for the 360 Global Blocks plugin
#[derive(Parser)]
#[command(name = "globalblocks-updater")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config directory (defaults to ~/.globalblocks-updater)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether an update should be offered
    Check {
        /// Print the decision as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show plugin information from the manifest
    Info {
        /// Slug to look up (defaults to the configured slug)
        slug: Option<String>,
    },

    /// Show the diagnostics snapshot
    Debug {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Clear the cache and check the manifest immediately
    ForceCheck,

    /// Manage the manifest cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Move an unpacked or installed directory to its canonical location
    Relocate {
        /// Directory to relocate
        path: PathBuf,

        /// Treat PATH as an install destination rather than an unpacked source
        #[arg(long)]
        post_install: bool,

        /// Plugin basename reported by the install pipeline
        #[arg(long)]
        plugin: Option<String>,

        /// Slug reported by the install pipeline
        #[arg(long)]
        slug: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Remove the cached manifest and update record
    Clear,

    /// Show the cache location and key
    Path,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "globalblocks_updater=debug"
    } else {
        "globalblocks_updater=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(dir) = &cli.config {
        std::env::set_var(globalblocks_updater::config::CONFIG_DIR_ENV, dir);
    }

    let result = match cli.command {
        Commands::Check { json } => commands::check::run(json),
        Commands::Info { slug } => commands::info::run(slug),
        Commands::Debug { json } => commands::debug::run(json),
        Commands::ForceCheck => commands::check::run_force(),
        Commands::Cache { action } => match action {
            CacheAction::Clear => commands::cache::run_clear(),
            CacheAction::Path => commands::cache::run_path(),
        },
        Commands::Relocate {
            path,
            post_install,
            plugin,
            slug,
        } => commands::relocate::run(path, post_install, plugin, slug),
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::run_show(),
            ConfigAction::Init { force } => commands::config::run_init(force),
        },
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "globalblocks-updater", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
