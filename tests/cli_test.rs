use anyhow::Result;
use clap::Parser;
use rsinitrd::cli::{Cli, Commands, LogLevel};

#[test]
fn test_parse_build_command() -> Result<()> {
    let args = Cli::parse_from(["rsinitrd", "build", "--file", "test.yml"]);

    match args.command {
        Commands::Build(opts) => {
            assert_eq!(opts.file, "test.yml");
            assert!(!opts.dry_run);
            assert!(!opts.install_initrd);
            assert_eq!(opts.basename, None);
            assert_eq!(opts.log_level, LogLevel::Info);
        }
        _ => panic!("Expected Build command"),
    }

    Ok(())
}

#[test]
fn test_parse_build_command_with_flags() -> Result<()> {
    let args = Cli::parse_from([
        "rsinitrd",
        "build",
        "--file",
        "test.yml",
        "--basename",
        "initrd-test",
        "--install-initrd",
        "--dry-run",
        "--log-level",
        "debug",
    ]);

    match args.command {
        Commands::Build(opts) => {
            assert_eq!(opts.basename.as_deref(), Some("initrd-test"));
            assert!(opts.install_initrd);
            assert!(opts.dry_run);
            assert_eq!(opts.log_level, LogLevel::Debug);
        }
        _ => panic!("Expected Build command"),
    }

    Ok(())
}

#[test]
fn test_parse_validate_command() -> Result<()> {
    let args = Cli::parse_from(["rsinitrd", "validate", "--file", "test.yml"]);

    match args.command {
        Commands::Validate(opts) => {
            assert_eq!(opts.file, "test.yml");
        }
        _ => panic!("Expected Validate command"),
    }

    Ok(())
}

#[test]
fn test_parse_boot_names_command_defaults() -> Result<()> {
    let args = Cli::parse_from(["rsinitrd", "boot-names"]);

    match args.command {
        Commands::BootNames(opts) => {
            assert_eq!(opts.file, "build.yaml");
            assert_eq!(opts.log_level, LogLevel::Warn);
        }
        _ => panic!("Expected BootNames command"),
    }

    Ok(())
}
