//! Boot image (initrd) construction.
//!
//! This module provides the trait implemented by boot image builders and
//! the types they share. The dracut builder lives in [`dracut`].

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use strum::Display;

use crate::config::{BuildConfig, SystemConfig};

pub mod dracut;

pub use dracut::{DracutBootImage, DracutOptions, InitrdContents};

/// Paths and configuration one build operates on.
///
/// The caller owns the root and target directories for the duration of the build.
#[derive(Debug, Clone)]
pub struct BuildContext<'a> {
    /// Root tree the initrd is generated from
    pub root_directory: Utf8PathBuf,
    /// Directory the finished initrd is moved to
    pub target_directory: Utf8PathBuf,
    /// Build description
    pub config: &'a BuildConfig,
}

impl<'a> BuildContext<'a> {
    /// Creates a context using the root and target directories of the build description.
    pub fn from_config(config: &'a BuildConfig) -> Self {
        Self {
            root_directory: config.root.clone(),
            target_directory: config.target.clone(),
            config,
        }
    }
}

/// Kernel and initrd file names as a bootloader configuration refers to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootNames {
    pub kernel_name: String,
    pub initrd_name: String,
}

/// Lifecycle of a boot image builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum BuildState {
    NotPrepared,
    Prepared,
    Built,
}

/// Trait for boot image builder implementations.
///
/// A builder is prepared once, configured through the mutators, and
/// consumed by [`create_initrd`](BootImage::create_initrd).
pub trait BootImage {
    /// Prepares the root tree for initrd generation.
    fn prepare(&mut self) -> Result<()>;

    /// Adds a file from the root tree to the initrd.
    fn include_file(&mut self, filename: &str, install_media: bool);

    /// Adds a builder module to the initrd.
    fn include_module(&mut self, module: &str, install_media: bool);

    /// Leaves a builder module out of the initrd.
    fn omit_module(&mut self, module: &str, install_media: bool);

    /// Writes module settings to the builder tool's configuration file.
    fn write_system_config_file(
        &self,
        config: &SystemConfig,
        config_file: Option<&Utf8Path>,
    ) -> Result<()>;

    /// Builds the initrd and moves it to the target directory.
    fn create_initrd(&mut self, basename: Option<&str>, install_initrd: bool) -> Result<()>;

    /// Returns the kernel and initrd file names for bootloader configuration.
    fn get_boot_names(&self) -> Result<BootNames>;

    /// Returns the path of the created initrd, once built.
    fn initrd_filename(&self) -> Option<&Utf8Path>;
}
