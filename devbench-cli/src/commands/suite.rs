// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `devbench suite` command - Start target servers and run every benchmark of a suite.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Args;
use devbench_benchmark::{sinks_for, BenchmarkDriver, RunError};
use devbench_core::{BenchmarkConfig, ConfigLoader, ServerSupervisor, WorkerBackend};

use super::bench::TargetArgs;

#[derive(Args, Debug, Clone)]
pub struct SuiteArgs {
    /// Suite file (YAML or JSON)
    #[arg(short, long)]
    pub config: PathBuf,

    #[command(flatten)]
    pub target: TargetArgs,
}

pub fn execute(args: &SuiteArgs, verbose: bool) -> anyhow::Result<()> {
    let suite = ConfigLoader::load_file(&args.config)
        .with_context(|| format!("loading suite {}", args.config.display()))?;
    tracing::info!(
        file = %args.config.display(),
        servers = suite.servers.len(),
        benchmarks = suite.benchmarks.len(),
        "Suite loaded"
    );

    // The in-process loopback device says nothing about external servers,
    // so readiness comes only from each server's ready_check.
    let guard = ServerSupervisor::without_session(suite.readiness)
        .start_all(&suite.servers)
        .context("starting device servers")?;

    if !suite.servers.is_empty() {
        for config in &suite.benchmarks {
            if config.backend == WorkerBackend::Builtin {
                tracing::warn!(
                    benchmark = %config.kind(),
                    device = %config.common.device,
                    "Built-in workers drive the in-process loopback device, \
                     not the launched servers; set worker_program to reach them"
                );
            }
        }
    }

    let connector = args.target.connector();

    let driver = BenchmarkDriver::new(connector).settle(args.target.settle());
    let mut failed = Vec::new();
    for (index, mut config) in suite.benchmarks.into_iter().enumerate() {
        config.common.verbose |= verbose;
        if let Err(e) = run_one(&driver, &config) {
            tracing::error!(index, benchmark = %config.kind(), error = %e, "Benchmark failed");
            failed.push(format!("#{} {}", index, config.kind()));
        }
    }

    guard.stop_all().context("stopping device servers")?;

    if !failed.is_empty() {
        bail!("{} benchmark(s) failed: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}

fn run_one(driver: &BenchmarkDriver, config: &BenchmarkConfig) -> Result<(), RunError> {
    let sinks = sinks_for(config)?;
    driver.run(config, sinks)?;
    Ok(())
}
