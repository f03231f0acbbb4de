//! Isolation module for executing commands inside a root tree.
//!
//! This module provides the trait and the chroot implementation used to
//! run tools that are installed in the boot root tree rather than on the host.

use anyhow::Result;
use camino::Utf8Path;

use crate::executor::{CommandExecutor, CommandSpec, ExecutionResult, execute_checked};

pub mod chroot;

pub use chroot::ChrootIsolation;

/// Trait for isolation backend implementations.
///
/// An isolation backend wraps a command so that it runs with its filesystem
/// root reassigned to the given root tree.
pub trait Isolation: Send + Sync {
    /// Returns the name of this isolation backend.
    fn name(&self) -> &'static str;

    /// Builds the host-side command that runs `command` inside `rootfs`.
    fn build_command(&self, rootfs: &Utf8Path, command: &[String]) -> CommandSpec;

    /// Executes a command within the isolated rootfs environment.
    ///
    /// A non-zero exit status is returned as an error carrying the
    /// captured combined output.
    fn execute(
        &self,
        rootfs: &Utf8Path,
        command: &[String],
        executor: &dyn CommandExecutor,
    ) -> Result<ExecutionResult> {
        let spec = self.build_command(rootfs, command);
        execute_checked(executor, &spec)
    }
}
