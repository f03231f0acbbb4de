//! dracut boot image builder.
//!
//! Generates an initrd by running dracut inside the boot root tree:
//!
//! 1. `prepare()` writes the profile environment into the root tree,
//!    clears the machine identity and registers the profile for inclusion.
//! 2. `include_*`/`omit_*` collect files and modules for the standard and
//!    the install-media initrd.
//! 3. `create_initrd()` runs `chroot <root> dracut ... <basename>.xz <version>`
//!    and moves the result to the target directory.

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info, warn};

use super::{BootImage, BootNames, BuildContext, BuildState};
use crate::config::{BuildConfig, SystemConfig};
use crate::error::RsinitrdError;
use crate::executor::{CommandExecutor, CommandSpec, execute_checked};
use crate::isolation::{ChrootIsolation, Isolation};
use crate::kernel::KernelInspector;
use crate::output_format::{DracutOutputFormat, OutputFormatDetector, render_template};
use crate::profile::Profile;
use crate::system::{ExistingRoot, PROFILE_PATH, SystemPreparer, SystemSetup};

/// Name of the builder tool inside the root tree.
const DRACUT: &str = "dracut";

/// Flags passed on every dracut call.
const DRACUT_BASE_ARGS: &[&str] = &["--force", "--no-hostonly", "--no-hostonly-cmdline", "--xz"];

/// dracut configuration file written by `write_system_config_file`, relative to the root tree.
pub const DRACUT_CONFIG_PATH: &str = "etc/dracut.conf.d/02-rsinitrd.conf";

/// Files and modules of one initrd variant.
///
/// Module lists keep first-seen order and never hold duplicates. A module
/// listed both as added and omitted is passed to dracut as given; keeping
/// the lists disjoint is up to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitrdContents {
    files: Vec<String>,
    modules: Vec<String>,
    omit_modules: Vec<String>,
}

impl InitrdContents {
    /// Adds `--install <filename>`. Repeated files are passed repeatedly.
    pub fn include_file(&mut self, filename: &str) {
        self.files.push("--install".to_string());
        self.files.push(filename.to_string());
    }

    pub fn include_module(&mut self, module: &str) {
        push_unique(&mut self.modules, module);
    }

    pub fn omit_module(&mut self, module: &str) {
        push_unique(&mut self.omit_modules, module);
    }

    /// Returns the `--install <path>` token pairs.
    pub fn file_args(&self) -> &[String] {
        &self.files
    }

    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    pub fn omit_modules(&self) -> &[String] {
        &self.omit_modules
    }

    /// Returns `--add`/`--omit` flags followed by the file arguments.
    ///
    /// A flag is left out entirely when its list is empty.
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if !self.modules.is_empty() {
            args.push("--add".to_string());
            args.push(self.modules.join(" "));
        }
        if !self.omit_modules.is_empty() {
            args.push("--omit".to_string());
            args.push(self.omit_modules.join(" "));
        }
        args.extend(self.files.iter().cloned());
        args
    }
}

fn push_unique(list: &mut Vec<String>, item: &str) {
    if !list.iter().any(|existing| existing == item) {
        list.push(item.to_string());
    }
}

/// Accumulated dracut arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DracutOptions {
    options: Vec<String>,
    standard: InitrdContents,
    install: InitrdContents,
}

impl DracutOptions {
    /// Adds a file to the standard initrd and, with `install_media`, to the
    /// install-media initrd as well.
    pub fn include_file(&mut self, filename: &str, install_media: bool) {
        self.standard.include_file(filename);
        if install_media {
            self.install.include_file(filename);
        }
    }

    pub fn include_module(&mut self, module: &str, install_media: bool) {
        self.variant_mut(install_media).include_module(module);
    }

    pub fn omit_module(&mut self, module: &str, install_media: bool) {
        self.variant_mut(install_media).omit_module(module);
    }

    /// Registers a file that every variant installs, ahead of the variant arguments.
    pub fn install_always(&mut self, filename: &str) {
        let already = self
            .options
            .chunks(2)
            .any(|pair| pair.len() == 2 && pair[0] == "--install" && pair[1] == filename);
        if !already {
            self.options.push("--install".to_string());
            self.options.push(filename.to_string());
        }
    }

    /// Returns the arguments common to every variant.
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Returns the contents of the install-media (`true`) or standard variant.
    pub fn variant(&self, install_media: bool) -> &InitrdContents {
        if install_media { &self.install } else { &self.standard }
    }

    fn variant_mut(&mut self, install_media: bool) -> &mut InitrdContents {
        if install_media { &mut self.install } else { &mut self.standard }
    }

    /// Returns all accumulated arguments for one variant.
    pub fn build_args(&self, install_media: bool) -> Vec<String> {
        let mut args = self.options.clone();
        args.extend(self.variant(install_media).args());
        args
    }
}

/// Renders dracut configuration file lines for the non-empty module lists.
pub fn system_config_lines(config: &SystemConfig) -> String {
    let mut content = String::new();
    if !config.modules.is_empty() {
        content.push_str(&format!("add_dracutmodules+=\" {} \"\n", config.modules.join(" ")));
    }
    if !config.omit_modules.is_empty() {
        content.push_str(&format!("omit_dracutmodules+=\" {} \"\n", config.omit_modules.join(" ")));
    }
    content
}

/// Builds an initrd with dracut inside the boot root tree.
///
/// One instance serves one build: it is prepared, configured, and consumed
/// by `create_initrd`. The external dracut call is waited on without a
/// timeout; a hung dracut blocks the caller.
pub struct DracutBootImage<'a> {
    config: &'a BuildConfig,
    root: Utf8PathBuf,
    target: Utf8PathBuf,
    base_name: String,
    executor: Arc<dyn CommandExecutor>,
    isolation: Box<dyn Isolation>,
    detector: Box<dyn OutputFormatDetector>,
    preparer: Box<dyn SystemPreparer>,
    options: DracutOptions,
    state: BuildState,
    initrd_filename: Option<Utf8PathBuf>,
    dry_run: bool,
}

impl<'a> DracutBootImage<'a> {
    pub fn new(context: BuildContext<'a>, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            base_name: context.config.initrd_base_name(),
            config: context.config,
            root: context.root_directory,
            target: context.target_directory,
            executor,
            isolation: Box::new(ChrootIsolation),
            detector: Box::new(DracutOutputFormat::default()),
            preparer: Box::new(ExistingRoot),
            options: DracutOptions::default(),
            state: BuildState::NotPrepared,
            initrd_filename: None,
            dry_run: false,
        }
    }

    /// Replaces the output format detection strategy.
    #[must_use]
    pub fn with_detector(mut self, detector: Box<dyn OutputFormatDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// Replaces the root tree preparer.
    #[must_use]
    pub fn with_preparer(mut self, preparer: Box<dyn SystemPreparer>) -> Self {
        self.preparer = preparer;
        self
    }

    /// Skips writes to the root tree. Commands are still handed to the executor.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn is_prepared(&self) -> bool {
        self.state == BuildState::Prepared
    }

    pub fn options(&self) -> &DracutOptions {
        &self.options
    }

    /// Returns the dracut command run inside the root tree.
    fn dracut_command(&self, output_file: &str, kernel_version: &str, install_initrd: bool) -> Vec<String> {
        let mut command: Vec<String> = Vec::new();
        command.push(DRACUT.to_string());
        command.extend(DRACUT_BASE_ARGS.iter().map(|arg| arg.to_string()));
        command.extend(self.options.build_args(install_initrd));
        command.push(output_file.to_string());
        command.push(kernel_version.to_string());
        command
    }
}

impl BootImage for DracutBootImage<'_> {
    fn prepare(&mut self) -> Result<()> {
        if self.state == BuildState::Prepared {
            debug!("boot image already prepared in {}", self.root);
            return Ok(());
        }

        info!("preparing boot image in {}", self.root);
        self.preparer
            .prepare_root(self.config, &self.root)
            .context("failed to prepare boot root tree")?;

        if self.dry_run {
            info!("dry run: skipping profile creation and machine-id setup");
        } else {
            let profile = Profile::from_config(self.config);
            let setup = SystemSetup::new(self.root.clone());
            setup.import_shell_environment(&profile)?;
            setup.setup_machine_id()?;
        }

        self.options.install_always(&format!("/{}", PROFILE_PATH));
        self.initrd_filename = None;
        self.state = BuildState::Prepared;
        Ok(())
    }

    fn include_file(&mut self, filename: &str, install_media: bool) {
        self.options.include_file(filename, install_media);
    }

    fn include_module(&mut self, module: &str, install_media: bool) {
        self.options.include_module(module, install_media);
    }

    fn omit_module(&mut self, module: &str, install_media: bool) {
        self.options.omit_module(module, install_media);
    }

    fn write_system_config_file(
        &self,
        config: &SystemConfig,
        config_file: Option<&Utf8Path>,
    ) -> Result<()> {
        let content = system_config_lines(config);
        if content.is_empty() {
            debug!("no dracut modules configured, not writing a config file");
            return Ok(());
        }

        let path = match config_file {
            Some(path) => path.to_owned(),
            None => self.root.join(DRACUT_CONFIG_PATH),
        };
        if self.dry_run {
            info!("dry run: would write {}:\n{}", path, content);
            return Ok(());
        }

        if let Some(parent) = path.parent()
            && !parent.as_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|e| RsinitrdError::io(format!("failed to create {}", parent), e))?;
        }
        info!("writing dracut config {}", path);
        fs::write(&path, content).map_err(|e| RsinitrdError::io(format!("failed to write {}", path), e))?;
        Ok(())
    }

    fn create_initrd(&mut self, basename: Option<&str>, install_initrd: bool) -> Result<()> {
        if self.state != BuildState::Prepared {
            warn!("boot image is {}, skipping initrd creation", self.state);
            return Ok(());
        }

        info!("creating generic dracut initrd archive");
        let kernel = KernelInspector::new(self.root.clone())
            .get_kernel(true)?
            .ok_or_else(|| RsinitrdError::KernelNotFound {
                root: self.root.to_string(),
            })?;

        let output_file = format!("{}.xz", basename.unwrap_or(&self.base_name));
        let command = self.dracut_command(&output_file, &kernel.version, install_initrd);
        debug!("running {} in {} via {}", DRACUT, self.root, self.isolation.name());

        let result = self
            .isolation
            .execute(&self.root, &command, self.executor.as_ref())
            .context("dracut failed to create the initrd")?;
        debug!("dracut output:\n{}", result.output);

        let source = self.root.join(&output_file);
        let destination = absolute_path(&self.target)?.join(&output_file);
        if self.dry_run {
            info!("dry run: would move {} to {}", source, destination);
            self.state = BuildState::Built;
            return Ok(());
        }
        let relocate = CommandSpec::new("mv", vec![source.to_string(), destination.to_string()]);
        execute_checked(self.executor.as_ref(), &relocate)
            .with_context(|| format!("failed to move {} to {}", source, destination))?;

        info!("initrd created: {}", destination);
        self.initrd_filename = Some(destination);
        self.state = BuildState::Built;
        Ok(())
    }

    fn get_boot_names(&self) -> Result<BootNames> {
        let kernel = KernelInspector::new(self.root.clone())
            .get_kernel(false)?
            .ok_or_else(|| {
                RsinitrdError::BootImage(format!("no kernel in boot image tree {} found", self.root))
            })?;

        let template = self.detector.detect_output_format(&self.root);
        Ok(BootNames {
            kernel_name: kernel.name,
            initrd_name: render_template(&template, &kernel.version),
        })
    }

    fn initrd_filename(&self) -> Option<&Utf8Path> {
        self.initrd_filename.as_deref()
    }
}

/// Makes a path absolute against the current directory without touching the filesystem.
fn absolute_path(path: &Utf8Path) -> Result<Utf8PathBuf, RsinitrdError> {
    if path.is_absolute() {
        return Ok(path.to_owned());
    }
    let absolute = std::path::absolute(path)
        .map_err(|e| RsinitrdError::io(format!("failed to resolve {}", path), e))?;
    Utf8PathBuf::from_path_buf(absolute).map_err(|p| {
        RsinitrdError::Validation(format!("path is not valid UTF-8: {}", p.display()))
    })
}
