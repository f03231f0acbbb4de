//! Chroot isolation implementation.

use super::Isolation;
use crate::executor::CommandSpec;
use camino::Utf8Path;

/// Chroot-based isolation backend.
///
/// This is the simplest isolation mechanism, using the standard `chroot` command
/// to change the root directory before executing commands.
#[derive(Debug, Default, Clone)]
pub struct ChrootIsolation;

impl Isolation for ChrootIsolation {
    fn name(&self) -> &'static str {
        "chroot"
    }

    fn build_command(&self, rootfs: &Utf8Path, command: &[String]) -> CommandSpec {
        let mut args: Vec<String> = Vec::with_capacity(command.len() + 1);
        args.push(rootfs.to_string());
        args.extend(command.iter().cloned());

        CommandSpec::new("chroot", args)
    }
}
