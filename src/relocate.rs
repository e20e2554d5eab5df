//! Post-unpack directory normalization
//!
//! Archive downloads unpack into directories named after the archive, not the
//! plugin (`360-Global-Blocks-main`, `360-global-blocks-3f9a2c1`). The host's
//! install pipeline offers two extension points where the directory can be
//! corrected:
//!
//! - [`Relocator::on_source_selected`] runs after extraction, before the
//!   files are copied into the plugins directory, and renames the unpacked
//!   directory in place.
//! - [`Relocator::on_post_install`] runs after the install routine and moves
//!   whatever destination it chose to `<plugins_dir>/<slug>`.
//!
//! Both hooks see every package the host installs. They only act on this
//! package, never fail the install, and converge on the same canonical path
//! when run more than once.

use crate::config::Config;
use crate::manifest::sanitize_key;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Filesystem operations needed to relocate a directory
pub trait Filesystem {
    fn exists(&self, path: &Path) -> bool;

    /// Delete a file or directory; a missing path is not an error
    fn delete(&self, path: &Path, recursive: bool) -> Result<()>;

    /// Move `src` to `dst`, replacing `dst` when `overwrite` is set
    fn move_dir(&self, src: &Path, dst: &Path, overwrite: bool) -> Result<()>;
}

/// [`Filesystem`] over `std::fs`
///
/// Moves use `rename`, falling back to copy-then-delete when the rename
/// crosses filesystems.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

impl LocalFilesystem {
    fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
        for entry in WalkDir::new(src).follow_links(false) {
            let entry = entry.map_err(|e| Error::Other(format!("Failed to walk {}: {}", src.display(), e)))?;
            let relative = entry
                .path()
                .strip_prefix(src)
                .map_err(|e| Error::Other(e.to_string()))?;
            let target = dst.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)?;
            } else {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(entry.path(), &target)?;
            }
        }
        Ok(())
    }
}

impl Filesystem for LocalFilesystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn delete(&self, path: &Path, recursive: bool) -> Result<()> {
        let metadata = match fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        if metadata.is_dir() {
            if recursive {
                fs::remove_dir_all(path)?;
            } else {
                fs::remove_dir(path)?;
            }
        } else {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn move_dir(&self, src: &Path, dst: &Path, overwrite: bool) -> Result<()> {
        let relocation_error = |reason: String| Error::Relocation {
            from: src.to_path_buf(),
            to: dst.to_path_buf(),
            reason,
        };

        if dst.exists() {
            if !overwrite {
                return Err(relocation_error("destination already exists".to_string()));
            }
            self.delete(dst, true)?;
        }

        let rename_error = match fs::rename(src, dst) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        // Only a move across filesystems is retried as a copy
        if rename_error.kind() != ErrorKind::CrossesDevices || !src.is_dir() {
            return Err(relocation_error(rename_error.to_string()));
        }

        tracing::debug!(error = %rename_error, "rename crosses filesystems, copying instead");
        if let Err(e) = Self::copy_tree(src, dst) {
            let _ = fs::remove_dir_all(dst);
            return Err(relocation_error(e.to_string()));
        }

        // The copy is complete; a source that will not delete stays behind
        if let Err(e) = fs::remove_dir_all(src) {
            tracing::warn!(path = %src.display(), error = %e, "failed to remove source after copy");
        }
        Ok(())
    }
}

/// Metadata the host pipeline attaches to an install or update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookExtra {
    /// Plugin basename being updated, e.g. `360-global-blocks/360-global-blocks.php`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

/// Result record produced by the host's install routine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallResult {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub destination_name: String,
}

impl InstallResult {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        let destination = destination.into();
        let destination_name = dir_name(&destination);
        Self {
            source: source.into(),
            destination,
            destination_name,
        }
    }
}

/// How a package is recognized in hook metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageIdentity {
    pub slug: String,
    pub plugin_file: String,
    /// Accept unpacked directory names that merely contain the slug
    pub legacy_name_match: bool,
}

impl PackageIdentity {
    pub fn new(slug: &str, plugin_file: &str) -> Self {
        Self {
            slug: sanitize_key(slug),
            plugin_file: plugin_file.to_string(),
            legacy_name_match: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            legacy_name_match: config.install.legacy_name_match,
            ..Self::new(&config.package.slug, &config.package.plugin_file)
        }
    }

    /// Whether an install of `dir` described by `extra` is this package
    ///
    /// The pipeline's own metadata decides: first the plugin basename, then
    /// the reported slug. The directory-name heuristic is only consulted when
    /// `legacy_name_match` is enabled.
    pub fn matches(&self, dir: &Path, extra: &HookExtra) -> bool {
        if let Some(plugin) = extra.plugin.as_deref() {
            let plugin_dir = plugin.split('/').next().unwrap_or(plugin);
            return plugin == self.plugin_file || sanitize_key(plugin_dir) == self.slug;
        }

        if let Some(slug) = extra.slug.as_deref() {
            return sanitize_key(slug) == self.slug;
        }

        if self.legacy_name_match && dir_name(dir).to_lowercase().contains(&self.slug) {
            tracing::warn!(
                dir = %dir.display(),
                "matched package by directory name; this heuristic is deprecated"
            );
            return true;
        }

        false
    }

    /// File name of the plugin's main file, e.g. `360-global-blocks.php`
    pub fn main_file(&self) -> &str {
        self.plugin_file
            .rsplit('/')
            .next()
            .unwrap_or(&self.plugin_file)
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Compare two paths component-wise, ignoring ASCII case and trailing separators
pub fn paths_eq_ignore_case(a: &Path, b: &Path) -> bool {
    let components = |p: &Path| -> Vec<String> {
        p.components()
            .filter(|c| !matches!(c, Component::CurDir))
            .map(|c| c.as_os_str().to_string_lossy().to_ascii_lowercase())
            .collect()
    };
    components(a) == components(b)
}

pub struct Relocator {
    identity: PackageIdentity,
    plugins_dir: PathBuf,
    fs: Box<dyn Filesystem>,
}

impl Relocator {
    pub fn new(identity: PackageIdentity, plugins_dir: impl Into<PathBuf>, fs: Box<dyn Filesystem>) -> Self {
        Self {
            identity,
            plugins_dir: plugins_dir.into(),
            fs,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            PackageIdentity::from_config(config),
            config.plugins_dir(),
            Box::new(LocalFilesystem),
        )
    }

    pub fn identity(&self) -> &PackageIdentity {
        &self.identity
    }

    /// `<plugins_dir>/<slug>`
    pub fn canonical_path(&self) -> PathBuf {
        self.plugins_dir.join(&self.identity.slug)
    }

    /// Rename a freshly unpacked directory to the slug, in place
    ///
    /// Returns the path the pipeline should continue with: the renamed
    /// directory on success, `source` untouched otherwise.
    pub fn on_source_selected(&self, source: &Path, extra: &HookExtra) -> PathBuf {
        if !self.identity.matches(source, extra) {
            return source.to_path_buf();
        }

        if dir_name(source).eq_ignore_ascii_case(&self.identity.slug) {
            return source.to_path_buf();
        }

        let Some(parent) = source.parent() else {
            return source.to_path_buf();
        };
        let destination = parent.join(&self.identity.slug);

        match self.relocate(source, &destination) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(error = %e, "could not rename unpacked source; continuing with original");
                source.to_path_buf()
            }
        }
    }

    /// Move an installed package to the canonical install path
    ///
    /// Rewrites `destination` and `destination_name` on success; any
    /// failure returns `result` unchanged.
    pub fn on_post_install(&self, result: InstallResult, extra: &HookExtra) -> InstallResult {
        if !self.identity.matches(&result.destination, extra) {
            return result;
        }

        let expected = self.canonical_path();
        if paths_eq_ignore_case(&result.destination, &expected) {
            return result;
        }

        match self.relocate(&result.destination, &expected) {
            Ok(destination) => InstallResult {
                destination_name: dir_name(&destination),
                destination,
                ..result
            },
            Err(e) => {
                tracing::warn!(error = %e, "could not move installed package; keeping install location");
                result
            }
        }
    }

    /// Remove any stale `destination`, then move `source` onto it
    ///
    /// A `source` that is already gone while `destination` holds the
    /// plugin's main file is taken as an earlier run having completed the
    /// move. The filesystem keeps no record of that run, so a vanished
    /// `source` next to an older install of this plugin converges on the
    /// older install as well. A `destination` without the main file is
    /// never accepted this way.
    fn relocate(&self, source: &Path, destination: &Path) -> Result<PathBuf> {
        if !self.fs.exists(source) {
            if self.fs.exists(&destination.join(self.identity.main_file())) {
                tracing::debug!(path = %destination.display(), "already relocated");
                return Ok(destination.to_path_buf());
            }
            return Err(Error::Relocation {
                from: source.to_path_buf(),
                to: destination.to_path_buf(),
                reason: "source does not exist".to_string(),
            });
        }

        if self.fs.exists(destination) {
            tracing::debug!(path = %destination.display(), "removing stale destination");
            self.fs.delete(destination, true)?;
        }

        self.fs.move_dir(source, destination, true)?;
        tracing::info!(
            from = %source.display(),
            to = %destination.display(),
            "relocated package directory"
        );

        Ok(destination.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn identity() -> PackageIdentity {
        PackageIdentity::new("360-global-blocks", "360-global-blocks/360-global-blocks.php")
    }

    fn ours() -> HookExtra {
        HookExtra {
            plugin: Some("360-global-blocks/360-global-blocks.php".to_string()),
            slug: None,
        }
    }

    #[test]
    fn test_identity_precedence() {
        let id = identity();
        let dir = Path::new("/tmp/upgrade/360-Global-Blocks-main");

        assert!(id.matches(dir, &ours()));
        assert!(id.matches(
            dir,
            &HookExtra {
                plugin: None,
                slug: Some("360-Global-Blocks".to_string())
            }
        ));

        // The plugin key wins over a matching slug
        assert!(!id.matches(
            dir,
            &HookExtra {
                plugin: Some("akismet/akismet.php".to_string()),
                slug: Some("360-global-blocks".to_string())
            }
        ));

        // Directory name alone is not enough by default
        assert!(!id.matches(dir, &HookExtra::default()));
    }

    #[test]
    fn test_legacy_name_match() {
        let id = PackageIdentity {
            legacy_name_match: true,
            ..identity()
        };
        assert!(id.matches(Path::new("/tmp/360-Global-Blocks-main"), &HookExtra::default()));
        assert!(!id.matches(Path::new("/tmp/akismet"), &HookExtra::default()));
    }

    #[test]
    fn test_paths_eq_ignore_case() {
        assert!(paths_eq_ignore_case(
            Path::new("/srv/plugins/360-Global-Blocks/"),
            Path::new("/srv/plugins/360-global-blocks")
        ));
        assert!(!paths_eq_ignore_case(
            Path::new("/srv/plugins/360-global-blocks-main"),
            Path::new("/srv/plugins/360-global-blocks")
        ));
    }

    #[test]
    fn test_local_filesystem_move_overwrites() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        fs::create_dir_all(src.join("inc")).unwrap();
        fs::write(src.join("inc").join("a.php"), "<?php").unwrap();
        fs::create_dir_all(&dst).unwrap();
        fs::write(dst.join("stale.txt"), "old").unwrap();

        LocalFilesystem.move_dir(&src, &dst, true).unwrap();
        assert!(!src.exists());
        assert!(dst.join("inc").join("a.php").exists());
        assert!(!dst.join("stale.txt").exists());
    }

    #[test]
    fn test_local_filesystem_refuses_without_overwrite() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&dst).unwrap();

        let err = LocalFilesystem.move_dir(&src, &dst, false).unwrap_err();
        assert!(matches!(err, Error::Relocation { .. }));
        assert!(src.exists());
    }

    #[test]
    fn test_copy_tree_preserves_layout() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        fs::create_dir_all(src.join("blocks").join("hero")).unwrap();
        fs::write(src.join("blocks").join("hero").join("block.json"), "{}").unwrap();
        fs::write(src.join("360-global-blocks.php"), "<?php").unwrap();

        LocalFilesystem::copy_tree(&src, &dst).unwrap();
        assert!(dst.join("blocks").join("hero").join("block.json").exists());
        assert!(dst.join("360-global-blocks.php").exists());
        assert!(src.exists());
    }

    #[test]
    fn test_main_file() {
        assert_eq!(identity().main_file(), "360-global-blocks.php");
        assert_eq!(PackageIdentity::new("hello", "hello.php").main_file(), "hello.php");
    }

    #[test]
    fn test_failed_rename_is_not_copied() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("360-global-blocks.php"), "<?php").unwrap();
        let dst = temp.path().join("missing").join("dst");

        let err = LocalFilesystem.move_dir(&src, &dst, true).unwrap_err();
        assert!(matches!(err, Error::Relocation { .. }));
        assert!(src.join("360-global-blocks.php").exists());
        assert!(!dst.exists());
    }

    #[test]
    fn test_vanished_source_needs_installed_destination() {
        let temp = TempDir::new().unwrap();
        let plugins = temp.path().join("plugins");
        let canonical = plugins.join("360-global-blocks");
        fs::create_dir_all(&canonical).unwrap();

        let relocator = Relocator::new(identity(), &plugins, Box::new(LocalFilesystem));
        let result = InstallResult::new(temp.path().join("upgrade"), plugins.join("360-Global-Blocks-main"));

        // Empty canonical directory: not taken as an earlier move
        assert_eq!(relocator.on_post_install(result.clone(), &ours()), result);

        fs::write(canonical.join("360-global-blocks.php"), "<?php").unwrap();
        let converged = relocator.on_post_install(result, &ours());
        assert_eq!(converged.destination, canonical);
        assert_eq!(converged.destination_name, "360-global-blocks");
    }

    #[test]
    fn test_delete_missing_path_is_ok() {
        let temp = TempDir::new().unwrap();
        assert!(LocalFilesystem.delete(&temp.path().join("nope"), true).is_ok());
    }
}
