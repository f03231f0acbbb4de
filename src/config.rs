//! Build description loading and validation.
//!
//! A build description is a YAML file naming the image, the boot root tree,
//! the target directory and the initrd contents. It replaces ad-hoc state
//! accessors with one typed struct so every consumed field is visible here.

use std::fs::File;
use std::io::BufReader;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use tracing::debug;

use crate::error::RsinitrdError;

/// Top-level build description.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Image identity
    pub image: ImageConfig,
    /// Boot root tree the initrd is generated from
    pub root: Utf8PathBuf,
    /// Directory the finished initrd is moved to
    pub target: Utf8PathBuf,
    /// Initrd contents
    #[serde(default)]
    pub initrd: InitrdConfig,
    /// System preferences exported to the first-boot profile
    #[serde(default)]
    pub preferences: Preferences,
    /// Build type settings exported to the first-boot profile
    #[serde(default)]
    pub type_settings: TypeSettings,
    /// Packages the first-boot code removes
    #[serde(default)]
    pub packages_to_delete: Vec<String>,
    /// Kernel drivers the first-boot code loads
    #[serde(default)]
    pub drivers: Vec<String>,
    /// Files, tools and libraries handled by the strip step
    #[serde(default)]
    pub strip: StripConfig,
}

/// Image identity section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageConfig {
    pub name: String,
    #[serde(default)]
    pub displayname: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// Build type name (e.g., "oem", "iso", "cpio")
    #[serde(default, rename = "type")]
    pub image_type: Option<String>,
    #[serde(default)]
    pub profiles: Vec<String>,
}

/// Initrd contents, partitioned into the standard and install-media variants.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InitrdConfig {
    /// Default base name of the initrd file (without `.xz`)
    #[serde(default)]
    pub basename: Option<String>,
    #[serde(default)]
    pub modules: Vec<String>,
    #[serde(default)]
    pub omit_modules: Vec<String>,
    #[serde(default)]
    pub install_modules: Vec<String>,
    #[serde(default)]
    pub omit_install_modules: Vec<String>,
    #[serde(default)]
    pub include_files: Vec<String>,
    #[serde(default)]
    pub install_include_files: Vec<String>,
    /// Build the install-media variant instead of the standard initrd
    #[serde(default)]
    pub install_media: bool,
}

/// System preferences section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Preferences {
    #[serde(default)]
    pub keytable: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub bootloader_theme: Option<String>,
    #[serde(default)]
    pub bootsplash_theme: Option<String>,
}

/// Build type settings section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeSettings {
    #[serde(default)]
    pub kernelcmdline: Option<String>,
    #[serde(default)]
    pub bootloader: Option<String>,
    #[serde(default)]
    pub firmware: Option<String>,
    #[serde(default)]
    pub compressed: bool,
}

/// Strip section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StripConfig {
    #[serde(default)]
    pub delete: Vec<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub libs: Vec<String>,
}

/// Module lists written to the builder tool's own configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemConfig {
    pub modules: Vec<String>,
    pub omit_modules: Vec<String>,
}

impl BuildConfig {
    /// Returns the default initrd base name: the configured one, or `initrd-<image name>`.
    pub fn initrd_base_name(&self) -> String {
        match &self.initrd.basename {
            Some(name) => name.clone(),
            None => format!("initrd-{}", self.image.name),
        }
    }

    /// Returns the module lists for the builder tool's configuration file.
    /// Returns the module lists of the selected initrd variant.
    pub fn system_config(&self, install_media: bool) -> SystemConfig {
        let initrd = &self.initrd;
        if install_media {
            SystemConfig {
                modules: initrd.install_modules.clone(),
                omit_modules: initrd.omit_install_modules.clone(),
            }
        } else {
            SystemConfig {
                modules: initrd.modules.clone(),
                omit_modules: initrd.omit_modules.clone(),
            }
        }
    }

    /// Validates required values.
    pub fn validate(&self) -> Result<(), RsinitrdError> {
        if self.image.name.trim().is_empty() {
            return Err(RsinitrdError::Validation("image name must not be empty".to_string()));
        }
        if self.root.as_str().is_empty() {
            return Err(RsinitrdError::Validation("root directory must not be empty".to_string()));
        }
        if self.target.as_str().is_empty() {
            return Err(RsinitrdError::Validation(
                "target directory must not be empty".to_string(),
            ));
        }
        if let Some(basename) = &self.initrd.basename
            && (basename.is_empty() || basename.contains('/'))
        {
            return Err(RsinitrdError::Validation(format!(
                "initrd basename must be a plain file name, got {:?}",
                basename
            )));
        }
        for file in self.initrd.include_files.iter().chain(&self.initrd.install_include_files) {
            if !file.starts_with('/') {
                return Err(RsinitrdError::Validation(format!(
                    "included file must be an absolute path inside the root tree: {}",
                    file
                )));
            }
        }
        Ok(())
    }

    /// Resolves relative `root` and `target` paths against `base_dir`.
    fn resolve_paths(&mut self, base_dir: &Utf8Path) {
        if self.root.is_relative() {
            self.root = base_dir.join(&self.root);
        }
        if self.target.is_relative() {
            self.target = base_dir.join(&self.target);
        }
    }
}

/// Loads a build description from a YAML file.
///
/// Relative `root` and `target` paths are resolved against the directory
/// containing the file.
pub fn load_config(path: &Utf8Path) -> Result<BuildConfig, RsinitrdError> {
    let file = File::open(path).map_err(|e| RsinitrdError::io(path.as_str(), e))?;
    let reader = BufReader::new(file);
    let mut config: BuildConfig = serde_yaml::from_reader(reader)
        .map_err(|e| RsinitrdError::Config(format!("failed to parse {}: {}", path, e)))?;

    let base_dir = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.to_owned(),
        _ => Utf8PathBuf::from("."),
    };
    config.resolve_paths(&base_dir);
    debug!("loaded build description from {}", path);
    Ok(config)
}
