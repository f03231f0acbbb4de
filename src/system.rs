//! Root tree preparation collaborators.
//!
//! [`SystemPreparer`] is the seam for installing a minimal root tree, and
//! [`SystemSetup`] applies the first-boot adjustments a boot image needs.

use std::fs;

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info};

use crate::config::BuildConfig;
use crate::error::RsinitrdError;
use crate::profile::Profile;

/// Path of the profile environment file, relative to the root tree.
pub const PROFILE_PATH: &str = ".profile";

/// Installs a root tree suitable for generating a boot image.
pub trait SystemPreparer {
    fn prepare_root(&self, config: &BuildConfig, root: &Utf8Path) -> Result<()>;
}

/// Uses a root tree that was installed beforehand.
#[derive(Debug, Default, Clone)]
pub struct ExistingRoot;

impl SystemPreparer for ExistingRoot {
    fn prepare_root(&self, _config: &BuildConfig, root: &Utf8Path) -> Result<()> {
        if !root.is_dir() {
            return Err(RsinitrdError::Validation(format!(
                "root directory does not exist or is not a directory: {}",
                root
            ))
            .into());
        }
        debug!("using existing root tree {}", root);
        Ok(())
    }
}

/// First-boot adjustments applied inside a root tree.
#[derive(Debug, Clone)]
pub struct SystemSetup {
    root: Utf8PathBuf,
}

impl SystemSetup {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Writes the profile dump to [`PROFILE_PATH`] inside the root tree.
    pub fn import_shell_environment(&self, profile: &Profile) -> Result<(), RsinitrdError> {
        let path = self.root.join(PROFILE_PATH);
        info!("creating profile environment {}", path);
        fs::write(&path, profile.create())
            .map_err(|e| RsinitrdError::io(format!("failed to write {}", path), e))
    }

    /// Clears the machine identity so it is regenerated on first boot.
    pub fn setup_machine_id(&self) -> Result<(), RsinitrdError> {
        let machine_id = self.root.join("etc/machine-id");
        if machine_id.is_file() {
            debug!("truncating {}", machine_id);
            fs::write(&machine_id, "")
                .map_err(|e| RsinitrdError::io(format!("failed to truncate {}", machine_id), e))?;
        }

        let dbus_machine_id = self.root.join("var/lib/dbus/machine-id");
        let is_regular_file = fs::symlink_metadata(&dbus_machine_id)
            .map(|meta| meta.file_type().is_file())
            .unwrap_or(false);
        if is_regular_file {
            debug!("removing {}", dbus_machine_id);
            fs::remove_file(&dbus_machine_id)
                .map_err(|e| RsinitrdError::io(format!("failed to remove {}", dbus_machine_id), e))?;
        }
        Ok(())
    }
}
