//! Shared fixtures for integration tests.

use std::fs;
use std::sync::Mutex;

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use rsinitrd::config::BuildConfig;
use rsinitrd::executor::{CommandExecutor, CommandSpec, ExecutionResult};
use tempfile::TempDir;

/// Records executed commands in order, optionally failing on a specific call.
#[allow(dead_code)]
pub struct MockExecutor {
    calls: Mutex<Vec<Vec<String>>>,
    /// If set, the Nth call (0-indexed) exits with status 1 and this output.
    fail_on_call: Option<(usize, String)>,
}

#[allow(dead_code)]
impl MockExecutor {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on_call: None,
        }
    }

    pub fn failing_on(call_index: usize, output: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on_call: Some((call_index, output.to_string())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandExecutor for MockExecutor {
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult> {
        let mut calls = self.calls.lock().unwrap();
        let index = calls.len();
        let mut args = vec![spec.command.clone()];
        args.extend(spec.args.iter().cloned());
        calls.push(args);
        drop(calls);

        match &self.fail_on_call {
            Some((fail_index, output)) if *fail_index == index => Ok(ExecutionResult {
                status: Some(exit_status(1)),
                output: output.clone(),
            }),
            _ => Ok(ExecutionResult::default()),
        }
    }
}

/// Builds an exit status carrying the given exit code.
#[allow(dead_code)]
#[cfg(unix)]
pub fn exit_status(code: i32) -> std::process::ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    std::process::ExitStatus::from_raw(code << 8)
}

/// Returns the UTF-8 path of a temporary directory.
#[allow(dead_code)]
pub fn utf8_path(dir: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("tempdir path should be UTF-8")
}

/// Installs an empty kernel image and module directory for `version` into `root`.
#[allow(dead_code)]
pub fn install_kernel(root: &Utf8Path, image: &str, version: &str) {
    fs::create_dir_all(root.join("lib/modules").join(version)).unwrap();
    fs::create_dir_all(root.join("boot")).unwrap();
    fs::write(root.join("boot").join(format!("{}-{}", image, version)), b"kernel").unwrap();
}

/// Creates a minimal build description for the given directories.
#[allow(dead_code)]
pub fn build_config(root: &Utf8Path, target: &Utf8Path) -> BuildConfig {
    let yaml = format!("image:\n  name: appliance\nroot: {}\ntarget: {}\n", root, target);
    serde_yaml::from_str(&yaml).expect("valid build description")
}
