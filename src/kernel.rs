//! Installed kernel lookup.
//!
//! Inspects a root tree and reports the name and version of the installed
//! kernel. Versions are taken from the module directories, and the kernel
//! image is looked up in `boot/` using the file names distributions install.

use std::cmp::Ordering;
use std::fs;

use camino::Utf8PathBuf;
use tracing::debug;

use crate::error::RsinitrdError;

/// Directories (relative to the root tree) holding per-version kernel modules.
const MODULE_DIRS: &[&str] = &["lib/modules", "usr/lib/modules"];

/// Kernel image name prefixes in `boot/`, highest priority first.
const KERNEL_PREFIXES: &[&str] = &["uImage", "Image", "zImage", "vmlinuz", "image", "vmlinux"];

/// An installed kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelInfo {
    /// File name of the kernel image (e.g., `vmlinuz-6.4.0-150600.21-default`)
    pub name: String,
    /// Kernel version (e.g., `6.4.0-150600.21-default`)
    pub version: String,
}

/// Looks up the installed kernel in a root tree.
#[derive(Debug, Clone)]
pub struct KernelInspector {
    root: Utf8PathBuf,
}

impl KernelInspector {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the highest-priority installed kernel.
    ///
    /// With `raise_on_not_found` set, a missing kernel is reported as
    /// [`RsinitrdError::KernelNotFound`]; otherwise `Ok(None)` is returned.
    pub fn get_kernel(&self, raise_on_not_found: bool) -> Result<Option<KernelInfo>, RsinitrdError> {
        for version in self.module_versions()? {
            if let Some(name) = self.kernel_image_name(&version) {
                debug!("found kernel {} (version {}) in {}", name, version, self.root);
                return Ok(Some(KernelInfo { name, version }));
            }
        }

        if raise_on_not_found {
            return Err(RsinitrdError::KernelNotFound {
                root: self.root.to_string(),
            });
        }
        Ok(None)
    }

    /// Collects module directory versions, highest version first.
    fn module_versions(&self) -> Result<Vec<String>, RsinitrdError> {
        let mut versions = Vec::new();
        for dir in MODULE_DIRS {
            let path = self.root.join(dir);
            let entries = match fs::read_dir(&path) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(RsinitrdError::io(format!("failed to read {}", path), e)),
            };
            for entry in entries {
                let entry =
                    entry.map_err(|e| RsinitrdError::io(format!("failed to read {}", path), e))?;
                if !entry.path().is_dir() {
                    continue;
                }
                let file_name = entry.file_name();
                if let Some(name) = file_name.to_str()
                    && !versions.iter().any(|v| v == name)
                {
                    versions.push(name.to_string());
                }
            }
        }
        versions.sort_by(|a, b| compare_versions(b, a));
        Ok(versions)
    }

    /// Returns the kernel image file name installed for `version`, if any.
    fn kernel_image_name(&self, version: &str) -> Option<String> {
        let boot = self.root.join("boot");
        for prefix in KERNEL_PREFIXES {
            let name = format!("{}-{}", prefix, version);
            if boot.join(&name).is_file() {
                return Some(name);
            }
        }
        // Layouts that ship the image next to the modules only
        let in_modules = self.root.join("usr/lib/modules").join(version).join("vmlinuz");
        if in_modules.is_file() {
            return Some(format!("vmlinuz-{}", version));
        }
        None
    }
}

/// Compares two version strings, treating digit runs as numbers.
pub(crate) fn compare_versions(a: &str, b: &str) -> Ordering {
    let left = version_chunks(a);
    let right = version_chunks(b);
    for (l, r) in left.iter().zip(right.iter()) {
        let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => l.cmp(r),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    left.len().cmp(&right.len())
}

fn version_chunks(version: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut last_digit: Option<bool> = None;
    for (index, c) in version.char_indices() {
        let is_digit = c.is_ascii_digit();
        if let Some(prev) = last_digit
            && prev != is_digit
        {
            chunks.push(&version[start..index]);
            start = index;
        }
        last_digit = Some(is_digit);
    }
    if start < version.len() {
        chunks.push(&version[start..]);
    }
    chunks
}
