//! Install-path normalization against a real temporary plugins directory.

mod test_utils;

use globalblocks_updater::{
    Error, Filesystem, HookExtra, InstallResult, LocalFilesystem, PackageIdentity, Relocator,
    Result,
};
use std::fs;
use std::path::Path;
use test_utils::{TestSite, PLUGIN_FILE, SLUG};

fn ours() -> HookExtra {
    HookExtra {
        plugin: Some(PLUGIN_FILE.to_string()),
        slug: None,
    }
}

/// Filesystem whose moves always fail
struct ReadOnlyFilesystem;

impl Filesystem for ReadOnlyFilesystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn delete(&self, _path: &Path, _recursive: bool) -> Result<()> {
        Ok(())
    }

    fn move_dir(&self, src: &Path, dst: &Path, _overwrite: bool) -> Result<()> {
        Err(Error::Relocation {
            from: src.to_path_buf(),
            to: dst.to_path_buf(),
            reason: "read-only filesystem".to_string(),
        })
    }
}

mod source_selection {
    use super::*;

    #[test]
    fn test_renames_branch_suffixed_directory() {
        let site = TestSite::new();
        let upgrade = site.upgrade_dir();
        let source = site.unpack(&upgrade, "360-Global-Blocks-main");

        let result = site.relocator().on_source_selected(&source, &ours());

        assert_eq!(result, upgrade.join(SLUG));
        assert!(result.join("360-global-blocks.php").exists());
        assert!(!source.exists());
    }

    #[test]
    fn test_canonical_name_is_left_alone() {
        let site = TestSite::new();
        let upgrade = site.upgrade_dir();

        for name in [SLUG, "360-Global-Blocks"] {
            let source = site.unpack(&upgrade, name);
            let result = site.relocator().on_source_selected(&source, &ours());
            assert_eq!(result, source);
            assert!(source.exists());
            fs::remove_dir_all(&source).unwrap();
        }
    }

    #[test]
    fn test_unrelated_packages_untouched() {
        let site = TestSite::new();
        let upgrade = site.upgrade_dir();
        let relocator = site.relocator();

        let cases = [
            ("akismet", Some("akismet/akismet.php"), None),
            ("jetpack-main", None, Some("jetpack")),
            ("360-global-blocks-addon", Some("360-global-blocks-addon/addon.php"), None),
            ("woocommerce-8.5.1", None, None),
            ("360-Global-Blocks-main", None, None),
        ];

        for (dir, plugin, slug) in cases {
            let source = site.unpack(&upgrade, dir);
            let extra = HookExtra {
                plugin: plugin.map(str::to_string),
                slug: slug.map(str::to_string),
            };

            assert_eq!(relocator.on_source_selected(&source, &extra), source);
            assert!(source.exists(), "{} must not be moved", dir);
            assert!(!upgrade.join(SLUG).exists());
        }
    }

    #[test]
    fn test_stale_destination_is_replaced() {
        let site = TestSite::new();
        let upgrade = site.upgrade_dir();
        let stale = upgrade.join(SLUG);
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("leftover.txt"), "old").unwrap();

        let source = site.unpack(&upgrade, "360-global-blocks-3f9a2c1");
        let result = site.relocator().on_source_selected(&source, &ours());

        assert_eq!(result, stale);
        assert!(!stale.join("leftover.txt").exists());
        assert!(stale.join("360-global-blocks.php").exists());
    }

    #[test]
    fn test_second_run_converges() {
        let site = TestSite::new();
        let upgrade = site.upgrade_dir();
        let source = site.unpack(&upgrade, "360-Global-Blocks-main");
        let relocator = site.relocator();

        let first = relocator.on_source_selected(&source, &ours());
        let second = relocator.on_source_selected(&source, &ours());

        assert_eq!(first, upgrade.join(SLUG));
        assert_eq!(second, first);
        assert!(first.join("360-global-blocks.php").exists());
    }

    #[test]
    fn test_failed_move_returns_original_source() {
        let site = TestSite::new();
        let upgrade = site.upgrade_dir();
        let source = site.unpack(&upgrade, "360-Global-Blocks-main");

        let relocator = Relocator::new(
            PackageIdentity::new(SLUG, PLUGIN_FILE),
            &site.plugins_dir,
            Box::new(ReadOnlyFilesystem),
        );

        assert_eq!(relocator.on_source_selected(&source, &ours()), source);
        assert!(source.exists());
    }
}

mod post_install {
    use super::*;

    #[test]
    fn test_moves_destination_and_rewrites_result() {
        let site = TestSite::new();
        let installed = site.unpack(&site.plugins_dir, "360-Global-Blocks-main");
        let result = InstallResult::new(site.upgrade_dir(), &installed);

        let fixed = site.relocator().on_post_install(result.clone(), &ours());

        assert_eq!(fixed.destination, site.plugins_dir.join(SLUG));
        assert_eq!(fixed.destination_name, SLUG);
        assert_eq!(fixed.source, result.source);
        assert!(fixed.destination.join("360-global-blocks.php").exists());
        assert!(!installed.exists());
    }

    #[test]
    fn test_canonical_destination_unchanged() {
        let site = TestSite::new();
        let installed = site.unpack(&site.plugins_dir, SLUG);
        let result = InstallResult::new(site.upgrade_dir(), &installed);

        assert_eq!(site.relocator().on_post_install(result.clone(), &ours()), result);
    }

    #[test]
    fn test_other_package_unchanged() {
        let site = TestSite::new();
        let installed = site.unpack(&site.plugins_dir, "hello-dolly-1.7.2");
        let result = InstallResult::new(site.upgrade_dir(), &installed);
        let extra = HookExtra {
            plugin: Some("hello-dolly/hello.php".to_string()),
            slug: None,
        };

        assert_eq!(site.relocator().on_post_install(result.clone(), &extra), result);
        assert!(installed.exists());
    }

    #[test]
    fn test_second_run_converges() {
        let site = TestSite::new();
        let installed = site.unpack(&site.plugins_dir, "360-global-blocks-main");
        let result = InstallResult::new(site.upgrade_dir(), &installed);
        let relocator = site.relocator();

        let first = relocator.on_post_install(result.clone(), &ours());
        let second = relocator.on_post_install(result, &ours());

        assert_eq!(first.destination, site.plugins_dir.join(SLUG));
        assert_eq!(second.destination, first.destination);
    }

    #[test]
    fn test_both_stages_agree_on_location() {
        let site = TestSite::new();
        let relocator = site.relocator();

        // Stage A renames inside the upgrade dir
        let upgrade = site.upgrade_dir();
        let source = site.unpack(&upgrade, "360-Global-Blocks-main");
        let renamed = relocator.on_source_selected(&source, &ours());

        // The host copies the renamed directory into plugins
        let installed = site.plugins_dir.join(renamed.file_name().unwrap());
        LocalFilesystem.move_dir(&renamed, &installed, true).unwrap();

        let result = relocator.on_post_install(InstallResult::new(&renamed, &installed), &ours());
        assert_eq!(result.destination, relocator.canonical_path());
        assert_eq!(result.destination, installed);
    }

    #[test]
    fn test_failed_move_keeps_result() {
        let site = TestSite::new();
        let installed = site.unpack(&site.plugins_dir, "360-Global-Blocks-main");
        let result = InstallResult::new(site.upgrade_dir(), &installed);

        let relocator = Relocator::new(
            PackageIdentity::new(SLUG, PLUGIN_FILE),
            &site.plugins_dir,
            Box::new(ReadOnlyFilesystem),
        );

        assert_eq!(relocator.on_post_install(result.clone(), &ours()), result);
        assert!(installed.exists());
    }
}
