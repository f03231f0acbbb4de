pub mod boot;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod isolation;
pub mod kernel;
pub mod output_format;
pub mod profile;
pub mod system;

pub use error::RsinitrdError;

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{FmtSubscriber, filter::LevelFilter};

use crate::boot::{BootImage, BootNames, BuildContext, DracutBootImage};
use crate::executor::CommandExecutor;

pub fn init_logging(log_level: cli::LogLevel) -> Result<()> {
    let filter = match log_level {
        cli::LogLevel::Trace => LevelFilter::TRACE,
        cli::LogLevel::Debug => LevelFilter::DEBUG,
        cli::LogLevel::Info => LevelFilter::INFO,
        cli::LogLevel::Warn => LevelFilter::WARN,
        cli::LogLevel::Error => LevelFilter::ERROR,
    };

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder().with_max_level(filter).finish(),
    )
    .context("failed to set global default tracing subscriber")
}

/// Applies the configured files and modules to a prepared builder.
fn configure_boot_image(image: &mut dyn BootImage, config: &config::BuildConfig) {
    let initrd = &config.initrd;
    for file in &initrd.include_files {
        image.include_file(file, false);
    }
    for file in &initrd.install_include_files {
        image.include_file(file, true);
    }
    for module in &initrd.modules {
        image.include_module(module, false);
    }
    for module in &initrd.omit_modules {
        image.omit_module(module, false);
    }
    for module in &initrd.install_modules {
        image.include_module(module, true);
    }
    for module in &initrd.omit_install_modules {
        image.omit_module(module, true);
    }
}

/// Builds the initrd described by the build file and returns its path.
pub fn run_build(
    opts: &cli::BuildArgs,
    executor: Arc<dyn CommandExecutor>,
) -> Result<Option<camino::Utf8PathBuf>> {
    let config = config::load_config(&opts.file)
        .with_context(|| format!("failed to load build description from {}", opts.file))?;
    config.validate().context("build description validation failed")?;

    if !opts.dry_run && !config.target.exists() {
        fs::create_dir_all(&config.target)
            .with_context(|| format!("failed to create directory: {}", config.target))?;
    }

    let mut image = DracutBootImage::new(BuildContext::from_config(&config), executor)
        .with_dry_run(opts.dry_run);
    image.prepare()?;
    configure_boot_image(&mut image, &config);

    let install_initrd = opts.install_initrd || config.initrd.install_media;
    image.write_system_config_file(&config.system_config(install_initrd), None)?;
    image.create_initrd(opts.basename.as_deref(), install_initrd)?;

    let initrd = image.initrd_filename().map(|path| path.to_owned());
    if let Some(path) = &initrd {
        info!("boot image written to {}", path);
    }
    Ok(initrd)
}

pub fn run_validate(opts: &cli::ValidateArgs) -> Result<()> {
    let config = config::load_config(&opts.file)?;
    config.validate().context("build description validation failed")?;
    info!("validation successful:\n{:#?}", config);
    Ok(())
}

/// Resolves the kernel and initrd names of the configured boot root tree.
pub fn run_boot_names(
    opts: &cli::BootNamesArgs,
    executor: Arc<dyn CommandExecutor>,
) -> Result<BootNames> {
    let config = config::load_config(&opts.file)?;
    config.validate().context("build description validation failed")?;
    let image = DracutBootImage::new(BuildContext::from_config(&config), executor);
    image.get_boot_names()
}
