use std::io;
use std::process;
use std::sync::Arc;

use anyhow::Result;
use clap::CommandFactory;
use rsinitrd::cli::{self, Commands};
use rsinitrd::executor::RealCommandExecutor;
use tracing::error;

fn main() -> Result<()> {
    let args = cli::parse_args()?;

    let log_level = match &args.command {
        Commands::Build(opts) => opts.log_level,
        Commands::Validate(opts) => opts.log_level,
        Commands::BootNames(opts) => opts.log_level,
        Commands::Completions(opts) => {
            let mut cmd = cli::Cli::command();
            clap_complete::generate(opts.shell, &mut cmd, env!("CARGO_PKG_NAME"), &mut io::stdout());
            return Ok(());
        }
    };

    rsinitrd::init_logging(log_level)?;

    let result = match &args.command {
        Commands::Build(opts) => {
            let executor = Arc::new(RealCommandExecutor {
                dry_run: opts.dry_run,
            });
            rsinitrd::run_build(opts, executor).map(|_| ())
        }
        Commands::Validate(opts) => rsinitrd::run_validate(opts),
        Commands::BootNames(opts) => {
            let executor = Arc::new(RealCommandExecutor { dry_run: true });
            rsinitrd::run_boot_names(opts, executor).map(|names| {
                println!("kernel_name={}", names.kernel_name);
                println!("initrd_name={}", names.initrd_name);
            })
        }
        Commands::Completions(_) => Ok(()),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        process::exit(1);
    }

    Ok(())
}
