mod cli_args;
mod generate;
mod output;

use clap::Parser;
use colored::*;
use log;
use std::process;

use cli_args::Cli;
use ctxmd_core::AppError;

fn main() {
    let cli_args = Cli::parse();

    setup_logging(cli_args.quiet, cli_args.verbose);

    log::debug!("CLI args parsed: {:?}", cli_args);

    let quiet = cli_args.quiet;
    let exit_code = match generate::handle_generate_command(&cli_args, quiet) {
        Ok(_) => {
            log::info!("Application finished successfully.");
            0
        }
        Err(e) => {
            let exit_code = match e.downcast_ref::<AppError>() {
                Some(AppError::Config(_)) => 1,
                Some(AppError::TomlParse(_)) => 1,
                Some(AppError::TargetDir { .. }) => 1,
                Some(AppError::InvalidArgument(_)) => 1,
                Some(AppError::SizeParse(_)) => 1,
                Some(AppError::Io(_)) => 2,
                Some(AppError::FileRead { .. }) => 2,
                Some(AppError::FileWrite { .. }) => 2,
                Some(AppError::DirCreation { .. }) => 2,
                Some(AppError::WalkDir(_)) => 2,
                Some(AppError::Ignore(_)) => 2,
                Some(_) => 1,
                None => 1,
            };

            // Fatal errors are reported even with --quiet.
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            exit_code
        }
    };
    log::debug!("Exiting with code {}", exit_code);
    process::exit(exit_code);
}

fn setup_logging(quiet: bool, verbose: u8) {
    let log_level = if quiet {
        log::LevelFilter::Off
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();
    log::trace!("Logger initialized with level: {:?}", log_level);
}
