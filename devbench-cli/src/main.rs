// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Devbench CLI
//!
//! Command-line interface for the device throughput benchmarks.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::bench::{
    CommandArgs, EventArgs, PipeReadArgs, PipeWriteArgs, PushEventArgs, ReadArgs, WriteArgs,
};
use commands::suite::SuiteArgs;

/// Exit status for usage, configuration and runtime failures.
const EXIT_FAILURE: u8 = 255;

/// Devbench - concurrent throughput benchmarks for device servers
#[derive(Parser)]
#[command(name = "devbench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging and per-worker result lines
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Attribute read throughput
    Read(ReadArgs),

    /// Attribute write throughput
    Write(WriteArgs),

    /// Command call throughput
    Command(CommandArgs),

    /// Pipe read throughput
    PipeRead(PipeReadArgs),

    /// Pipe write throughput
    PipeWrite(PipeWriteArgs),

    /// Event subscription throughput
    Event(EventArgs),

    /// Pushed change-event throughput
    PushEvent(PushEventArgs),

    /// Run every benchmark of a suite file, starting target servers first
    Suite(SuiteArgs),

    /// Validate a suite file
    Validate {
        /// Path to the suite file (YAML or JSON)
        file: String,
    },
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_FAILURE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // Initialize logging; RUST_LOG wins over --verbose
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let verbose = cli.verbose;
    let outcome = match cli.command {
        Commands::Read(args) => commands::bench::execute(&args, verbose),
        Commands::Write(args) => commands::bench::execute(&args, verbose),
        Commands::Command(args) => commands::bench::execute(&args, verbose),
        Commands::PipeRead(args) => commands::bench::execute(&args, verbose),
        Commands::PipeWrite(args) => commands::bench::execute(&args, verbose),
        Commands::Event(args) => commands::bench::execute(&args, verbose),
        Commands::PushEvent(args) => commands::bench::execute(&args, verbose),
        Commands::Suite(args) => commands::suite::execute(&args, verbose),
        Commands::Validate { file } => commands::validate::execute(&file),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_read_with_common_flags() {
        let cli = Cli::try_parse_from([
            "devbench", "read", "-d", "sys/tg_test/1", "-n", "1:5:2", "-p", "2.5", "-a", "double_scalar",
        ])
        .unwrap();

        match cli.command {
            Commands::Read(args) => {
                assert_eq!(args.common.device.as_deref(), Some("sys/tg_test/1"));
                assert_eq!(args.common.clients, "1:5:2");
                assert_eq!(args.common.period, "2.5");
                assert_eq!(args.attribute, "double_scalar");
            }
            _ => panic!("expected read"),
        }
    }

    #[test]
    fn test_global_verbose_after_subcommand() {
        let cli = Cli::try_parse_from(["devbench", "command", "-d", "a/b/c", "--verbose"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn test_help_is_not_a_failure() {
        let err = Cli::try_parse_from(["devbench", "--help"]).err().unwrap();
        assert!(!err.use_stderr());

        let err = Cli::try_parse_from(["devbench", "read", "--bogus"]).err().unwrap();
        assert!(err.use_stderr());
    }
}
