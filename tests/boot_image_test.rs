//! Tests for the dracut boot image builder.

mod helpers;

use std::fs;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use rsinitrd::RsinitrdError;
use rsinitrd::boot::{BootImage, BuildContext, BuildState, DracutBootImage};
use rsinitrd::config::{BuildConfig, SystemConfig};
use rsinitrd::output_format::OutputFormatDetector;
use rsinitrd::system::SystemPreparer;
use tempfile::tempdir;

use helpers::MockExecutor;

/// Detector returning a fixed template.
struct FixedFormat(&'static str);

impl OutputFormatDetector for FixedFormat {
    fn detect_output_format(&self, _root: &Utf8Path) -> String {
        self.0.to_string()
    }
}

/// Preparer recording the roots it was asked to prepare.
struct RecordingPreparer(Arc<Mutex<Vec<Utf8PathBuf>>>);

impl SystemPreparer for RecordingPreparer {
    fn prepare_root(&self, _config: &BuildConfig, root: &Utf8Path) -> Result<()> {
        fs::create_dir_all(root)?;
        self.0.lock().unwrap().push(root.to_owned());
        Ok(())
    }
}

// =============================================================================
// include / omit
// =============================================================================

#[test]
fn test_include_module_repeated_kept_once_in_first_seen_order() {
    let config = helpers::build_config(Utf8Path::new("/r"), Utf8Path::new("/t"));
    let mut image = DracutBootImage::new(
        BuildContext::from_config(&config),
        Arc::new(MockExecutor::new()),
    );

    image.include_module("network", false);
    image.include_module("lvm", false);
    image.include_module("network", false);
    image.include_module("lvm", false);

    assert_eq!(image.options().variant(false).modules(), ["network", "lvm"]);
}

#[test]
fn test_include_file_install_media_partitioning() {
    let config = helpers::build_config(Utf8Path::new("/r"), Utf8Path::new("/t"));
    let mut image = DracutBootImage::new(
        BuildContext::from_config(&config),
        Arc::new(MockExecutor::new()),
    );

    image.include_file("/etc/both", true);
    image.include_file("/etc/standard-only", false);

    let standard = image.options().variant(false).file_args();
    let install = image.options().variant(true).file_args();
    assert!(standard.contains(&"/etc/both".to_string()));
    assert!(standard.contains(&"/etc/standard-only".to_string()));
    assert!(install.contains(&"/etc/both".to_string()));
    assert!(!install.contains(&"/etc/standard-only".to_string()));
}

#[test]
fn test_omit_module_install_media_only_affects_install_variant() {
    let config = helpers::build_config(Utf8Path::new("/r"), Utf8Path::new("/t"));
    let mut image = DracutBootImage::new(
        BuildContext::from_config(&config),
        Arc::new(MockExecutor::new()),
    );

    image.omit_module("plymouth", true);
    image.omit_module("plymouth", true);

    assert_eq!(image.options().variant(true).omit_modules(), ["plymouth"]);
    assert!(image.options().variant(false).omit_modules().is_empty());
}

// =============================================================================
// write_system_config_file
// =============================================================================

#[test]
fn test_write_system_config_file_empty_writes_nothing() -> Result<()> {
    let dir = tempdir()?;
    let root = helpers::utf8_path(&dir);
    let config = helpers::build_config(&root, &root);
    let image =
        DracutBootImage::new(BuildContext::from_config(&config), Arc::new(MockExecutor::new()));
    let config_file = root.join("dracut.conf");

    image.write_system_config_file(&SystemConfig::default(), Some(config_file.as_path()))?;

    assert!(!config_file.exists());
    Ok(())
}

#[test]
fn test_write_system_config_file_modules_only() -> Result<()> {
    let dir = tempdir()?;
    let root = helpers::utf8_path(&dir);
    let config = helpers::build_config(&root, &root);
    let image =
        DracutBootImage::new(BuildContext::from_config(&config), Arc::new(MockExecutor::new()));
    let config_file = root.join("dracut.conf");
    let system_config = SystemConfig {
        modules: vec!["a".to_string(), "b".to_string()],
        omit_modules: Vec::new(),
    };

    image.write_system_config_file(&system_config, Some(config_file.as_path()))?;

    assert_eq!(fs::read_to_string(&config_file)?, "add_dracutmodules+=\" a b \"\n");
    Ok(())
}

#[test]
fn test_write_system_config_file_default_location() -> Result<()> {
    let dir = tempdir()?;
    let root = helpers::utf8_path(&dir);
    let config = helpers::build_config(&root, &root);
    let image =
        DracutBootImage::new(BuildContext::from_config(&config), Arc::new(MockExecutor::new()));
    let system_config = SystemConfig {
        modules: Vec::new(),
        omit_modules: vec!["x".to_string(), "y".to_string()],
    };

    image.write_system_config_file(&system_config, None)?;

    let written = fs::read_to_string(root.join("etc/dracut.conf.d/02-rsinitrd.conf"))?;
    assert_eq!(written, "omit_dracutmodules+=\" x y \"\n");
    Ok(())
}

// =============================================================================
// prepare / create_initrd
// =============================================================================

#[test]
fn test_create_initrd_without_prepare_is_noop() -> Result<()> {
    let dir = tempdir()?;
    let root = helpers::utf8_path(&dir);
    helpers::install_kernel(&root, "vmlinuz", "6.4.0-default");
    let config = helpers::build_config(&root, &root.join("out"));
    let executor = Arc::new(MockExecutor::new());
    let mut image = DracutBootImage::new(BuildContext::from_config(&config), executor.clone());

    image.create_initrd(None, false)?;

    assert_eq!(executor.call_count(), 0);
    assert!(image.initrd_filename().is_none());
    assert_eq!(image.state(), BuildState::NotPrepared);
    Ok(())
}

#[test]
fn test_prepare_writes_profile_and_clears_machine_id() -> Result<()> {
    let dir = tempdir()?;
    let root = helpers::utf8_path(&dir);
    fs::create_dir_all(root.join("etc"))?;
    fs::write(root.join("etc/machine-id"), "abcdef\n")?;
    let config = helpers::build_config(&root, &root.join("out"));
    let mut image =
        DracutBootImage::new(BuildContext::from_config(&config), Arc::new(MockExecutor::new()));

    image.prepare()?;

    assert!(image.is_prepared());
    let profile = fs::read_to_string(root.join(".profile"))?;
    assert!(profile.contains("image_iname='appliance'\n"), "unexpected profile: {}", profile);
    assert_eq!(fs::read_to_string(root.join("etc/machine-id"))?, "");
    assert_eq!(image.options().options(), ["--install", "/.profile"]);
    Ok(())
}

#[test]
fn test_prepare_twice_registers_profile_once() -> Result<()> {
    let dir = tempdir()?;
    let root = helpers::utf8_path(&dir);
    let config = helpers::build_config(&root, &root.join("out"));
    let mut image =
        DracutBootImage::new(BuildContext::from_config(&config), Arc::new(MockExecutor::new()));

    image.prepare()?;
    image.prepare()?;

    assert_eq!(image.options().options(), ["--install", "/.profile"]);
    Ok(())
}

#[test]
fn test_prepare_runs_configured_preparer_once() -> Result<()> {
    let dir = tempdir()?;
    let root = helpers::utf8_path(&dir).join("fresh");
    let config = helpers::build_config(&root, &root.join("out"));
    let prepared = Arc::new(Mutex::new(Vec::new()));
    let mut image =
        DracutBootImage::new(BuildContext::from_config(&config), Arc::new(MockExecutor::new()))
            .with_preparer(Box::new(RecordingPreparer(prepared.clone())));

    image.prepare()?;
    image.prepare()?;

    assert_eq!(*prepared.lock().unwrap(), vec![root.clone()]);
    assert!(root.join(".profile").is_file());
    Ok(())
}

#[test]
fn test_prepare_fails_for_missing_root() {
    let config = helpers::build_config(Utf8Path::new("/nonexistent/rsinitrd/root"), Utf8Path::new("/t"));
    let mut image =
        DracutBootImage::new(BuildContext::from_config(&config), Arc::new(MockExecutor::new()));

    assert!(image.prepare().is_err());
    assert_eq!(image.state(), BuildState::NotPrepared);
}

#[test]
fn test_create_initrd_end_to_end() -> Result<()> {
    let dir = tempdir()?;
    let root = helpers::utf8_path(&dir).join("root");
    let target = helpers::utf8_path(&dir).join("target");
    fs::create_dir_all(&root)?;
    helpers::install_kernel(&root, "vmlinuz", "5.3.18-default");
    let config = helpers::build_config(&root, &target);
    let executor = Arc::new(MockExecutor::new());
    let mut image = DracutBootImage::new(BuildContext::from_config(&config), executor.clone());

    image.prepare()?;
    image.include_module("network", false);
    image.create_initrd(Some("initrd-test"), false)?;

    let calls = executor.calls();
    assert_eq!(calls.len(), 2);

    let dracut = &calls[0];
    assert_eq!(dracut[0], "chroot");
    assert_eq!(dracut[1], root.as_str());
    assert_eq!(dracut[2], "dracut");
    assert_eq!(
        &dracut[3..7],
        ["--force", "--no-hostonly", "--no-hostonly-cmdline", "--xz"]
    );
    let add = dracut.iter().position(|arg| arg == "--add").expect("--add should be present");
    assert_eq!(dracut[add + 1], "network");
    assert!(!dracut.contains(&"--omit".to_string()));
    assert_eq!(dracut[dracut.len() - 2], "initrd-test.xz");
    assert_eq!(dracut[dracut.len() - 1], "5.3.18-default");

    let expected_target = target.join("initrd-test.xz");
    assert_eq!(
        calls[1],
        vec![
            "mv".to_string(),
            root.join("initrd-test.xz").to_string(),
            expected_target.to_string(),
        ]
    );
    assert_eq!(image.initrd_filename(), Some(expected_target.as_path()));
    assert_eq!(image.state(), BuildState::Built);
    Ok(())
}

#[test]
fn test_create_initrd_dry_run_records_no_initrd() -> Result<()> {
    let dir = tempdir()?;
    let root = helpers::utf8_path(&dir).join("root");
    fs::create_dir_all(&root)?;
    helpers::install_kernel(&root, "vmlinuz", "5.3.18-default");
    let config = helpers::build_config(&root, &helpers::utf8_path(&dir).join("target"));
    let executor = Arc::new(MockExecutor::new());
    let mut image = DracutBootImage::new(BuildContext::from_config(&config), executor.clone())
        .with_dry_run(true);

    image.prepare()?;
    image.create_initrd(None, false)?;

    let calls = executor.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0][0], "chroot");
    assert!(image.initrd_filename().is_none());
    assert_eq!(image.state(), BuildState::Built);
    Ok(())
}

#[test]
fn test_create_initrd_uses_configured_base_name_and_install_variant() -> Result<()> {
    let dir = tempdir()?;
    let root = helpers::utf8_path(&dir);
    helpers::install_kernel(&root, "vmlinuz", "6.4.0");
    let config = helpers::build_config(&root, &root.join("out"));
    let executor = Arc::new(MockExecutor::new());
    let mut image = DracutBootImage::new(BuildContext::from_config(&config), executor.clone());

    image.prepare()?;
    image.include_file("/etc/standard", false);
    image.include_file("/etc/install", true);
    image.include_module("kiosk", true);
    image.create_initrd(None, true)?;

    let dracut = &executor.calls()[0];
    assert!(dracut.contains(&"/etc/install".to_string()));
    assert!(!dracut.contains(&"/etc/standard".to_string()));
    assert!(dracut.contains(&"kiosk".to_string()));
    assert!(dracut.contains(&"/.profile".to_string()));
    assert_eq!(dracut[dracut.len() - 2], "initrd-appliance.xz");
    Ok(())
}

#[test]
fn test_create_initrd_without_kernel_fails() -> Result<()> {
    let dir = tempdir()?;
    let root = helpers::utf8_path(&dir);
    let config = helpers::build_config(&root, &root.join("out"));
    let executor = Arc::new(MockExecutor::new());
    let mut image = DracutBootImage::new(BuildContext::from_config(&config), executor.clone());

    image.prepare()?;
    let err = image.create_initrd(None, false).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<RsinitrdError>(),
        Some(RsinitrdError::KernelNotFound { .. })
    ));
    assert_eq!(executor.call_count(), 0);
    assert!(image.initrd_filename().is_none());
    Ok(())
}

#[test]
fn test_create_initrd_dracut_failure_carries_output() -> Result<()> {
    let dir = tempdir()?;
    let root = helpers::utf8_path(&dir);
    helpers::install_kernel(&root, "vmlinuz", "6.4.0");
    let config = helpers::build_config(&root, &root.join("out"));
    let executor = Arc::new(MockExecutor::failing_on(0, "dracut: module 'nope' not found\n"));
    let mut image = DracutBootImage::new(BuildContext::from_config(&config), executor.clone());

    image.prepare()?;
    let err = image.create_initrd(None, false).unwrap_err();

    match err.downcast_ref::<RsinitrdError>() {
        Some(RsinitrdError::CommandFailed { output, .. }) => {
            assert!(output.contains("module 'nope' not found"));
        }
        other => panic!("expected CommandFailed, got {:?}", other),
    }
    assert!(format!("{:#}", err).contains("module 'nope' not found"));
    // relocation must not run after a failed build
    assert_eq!(executor.call_count(), 1);
    assert!(image.initrd_filename().is_none());
    Ok(())
}

#[test]
fn test_create_initrd_relocation_failure_propagates() -> Result<()> {
    let dir = tempdir()?;
    let root = helpers::utf8_path(&dir);
    helpers::install_kernel(&root, "vmlinuz", "6.4.0");
    let config = helpers::build_config(&root, &root.join("out"));
    let executor = Arc::new(MockExecutor::failing_on(1, "mv: cannot move"));
    let mut image = DracutBootImage::new(BuildContext::from_config(&config), executor.clone());

    image.prepare()?;
    let result = image.create_initrd(None, false);

    assert!(result.is_err());
    assert!(image.initrd_filename().is_none());
    assert_eq!(image.state(), BuildState::Prepared);
    Ok(())
}

#[test]
fn test_create_initrd_after_build_is_noop() -> Result<()> {
    let dir = tempdir()?;
    let root = helpers::utf8_path(&dir);
    helpers::install_kernel(&root, "vmlinuz", "6.4.0");
    let config = helpers::build_config(&root, &root.join("out"));
    let executor = Arc::new(MockExecutor::new());
    let mut image = DracutBootImage::new(BuildContext::from_config(&config), executor.clone());

    image.prepare()?;
    image.create_initrd(None, false)?;
    image.create_initrd(Some("second"), false)?;

    assert_eq!(executor.call_count(), 2);
    Ok(())
}

// =============================================================================
// get_boot_names
// =============================================================================

#[test]
fn test_get_boot_names_uses_detected_format() -> Result<()> {
    let dir = tempdir()?;
    let root = helpers::utf8_path(&dir);
    helpers::install_kernel(&root, "vmlinuz", "5.3.18-default");
    let config = helpers::build_config(&root, &root);
    let image =
        DracutBootImage::new(BuildContext::from_config(&config), Arc::new(MockExecutor::new()))
            .with_detector(Box::new(FixedFormat("initrd-{kernel_version}")));

    let names = image.get_boot_names()?;

    assert_eq!(names.kernel_name, "vmlinuz-5.3.18-default");
    assert_eq!(names.initrd_name, "initrd-5.3.18-default");
    Ok(())
}

#[test]
fn test_get_boot_names_default_format_without_dracut() -> Result<()> {
    let dir = tempdir()?;
    let root = helpers::utf8_path(&dir);
    helpers::install_kernel(&root, "Image", "6.1.0");
    let config = helpers::build_config(&root, &root);
    let image =
        DracutBootImage::new(BuildContext::from_config(&config), Arc::new(MockExecutor::new()));

    let names = image.get_boot_names()?;

    assert_eq!(names.kernel_name, "Image-6.1.0");
    assert_eq!(names.initrd_name, "initramfs-6.1.0.img");
    Ok(())
}

#[test]
fn test_get_boot_names_without_kernel_fails() -> Result<()> {
    let dir = tempdir()?;
    let root = helpers::utf8_path(&dir);
    let config = helpers::build_config(&root, &root);
    let image =
        DracutBootImage::new(BuildContext::from_config(&config), Arc::new(MockExecutor::new()));

    let err = image.get_boot_names().unwrap_err();

    match err.downcast_ref::<RsinitrdError>() {
        Some(RsinitrdError::BootImage(message)) => {
            assert!(message.contains("no kernel in boot image tree"));
        }
        other => panic!("expected BootImage error, got {:?}", other),
    }
    Ok(())
}
