//! Detection of the initrd file name the installed builder tool produces.
//!
//! Bootloader configuration must name the initrd before it is built, so the
//! file name pattern is read out of the builder tool installed in the root
//! tree. The lookup is a heuristic and always degrades to a default.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use camino::Utf8Path;
use regex::Regex;
use tracing::{debug, warn};

/// Placeholder for the kernel version in output file templates.
pub const KERNEL_VERSION_PLACEHOLDER: &str = "{kernel_version}";

/// Template used when the tool's own pattern cannot be determined.
pub const DEFAULT_OUTPUT_FORMAT: &str = "initramfs-{kernel_version}.img";

/// Binary directories searched inside the root tree.
const TOOL_SEARCH_DIRS: &[&str] = &["usr/bin", "usr/sbin", "bin", "sbin"];

/// Matches the default output file assignment in the dracut script.
static DRACUT_OUTFILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"outfile="/boot/([^"]*\$kernel[^"]*)""#).expect("valid outfile regex")
});

/// Strategy for discovering a builder tool's output file name template.
pub trait OutputFormatDetector: Send + Sync {
    /// Returns a template containing [`KERNEL_VERSION_PLACEHOLDER`].
    ///
    /// Never fails: detection problems fall back to a default template.
    fn detect_output_format(&self, root: &Utf8Path) -> String;
}

/// Reads the template from the dracut script installed in the root tree.
#[derive(Debug, Clone)]
pub struct DracutOutputFormat {
    tool: String,
}

impl Default for DracutOutputFormat {
    fn default() -> Self {
        Self {
            tool: "dracut".to_string(),
        }
    }
}

impl DracutOutputFormat {
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }

    /// Returns the first executable tool found in the root's tool directories.
    ///
    /// Each directory is searched on its own, so the root path is never
    /// split on `PATH` separators.
    fn find_tool(&self, root: &Utf8Path) -> Option<PathBuf> {
        let relative = Path::new(".").join(&self.tool);
        TOOL_SEARCH_DIRS.iter().find_map(|dir| {
            which::which_in(&relative, None::<&str>, root.join(dir)).ok()
        })
    }

    /// Extracts the template from the tool's source text.
    pub fn extract_template(text: &str) -> Option<String> {
        DRACUT_OUTFILE_RE
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().replace("$kernel", KERNEL_VERSION_PLACEHOLDER))
    }
}

impl OutputFormatDetector for DracutOutputFormat {
    fn detect_output_format(&self, root: &Utf8Path) -> String {
        let tool_path = match self.find_tool(root) {
            Some(path) => path,
            None => {
                warn!(
                    "{} not found in {}, using default output format {}",
                    self.tool, root, DEFAULT_OUTPUT_FORMAT
                );
                return DEFAULT_OUTPUT_FORMAT.to_string();
            }
        };

        let template = fs::read(&tool_path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| {
                Self::extract_template(&String::from_utf8_lossy(&bytes))
                    .ok_or_else(|| "no outfile assignment found".to_string())
            });

        match template {
            Ok(template) => {
                debug!("detected output format {} from {}", template, tool_path.display());
                template
            }
            Err(reason) => {
                warn!(
                    "could not detect output format from {}: {}, using default {}",
                    tool_path.display(),
                    reason,
                    DEFAULT_OUTPUT_FORMAT
                );
                DEFAULT_OUTPUT_FORMAT.to_string()
            }
        }
    }
}

/// Substitutes the kernel version into an output file template.
pub fn render_template(template: &str, kernel_version: &str) -> String {
    template.replace(KERNEL_VERSION_PLACEHOLDER, kernel_version)
}
