// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `devbench validate` command - Validate a suite file.

use anyhow::bail;
use devbench_core::ConfigLoader;

pub fn execute(file: &str) -> anyhow::Result<()> {
    tracing::info!(file = %file, "Validating suite");

    match ConfigLoader::load_file(file) {
        Ok(suite) => {
            println!("✓ Suite is valid");
            println!();
            println!("Readiness:");
            println!("  Wait for ready: {}", suite.readiness.wait);
            println!("  Ready timeout:  {:?}", suite.readiness.timeout);
            println!();
            println!("Device servers ({}):", suite.servers.len());
            for server in &suite.servers {
                println!(
                    "  - {} ({} / {}, stop: {})",
                    server.target_device, server.device_class, server.server_instance, server.stop
                );
            }
            println!();
            println!("Benchmarks ({}):", suite.benchmarks.len());
            for bench in &suite.benchmarks {
                println!(
                    "  - {} on {} (clients: {}, period: {}s)",
                    bench.kind(),
                    bench.common.device,
                    bench.common.worker_counts,
                    bench.common.period
                );
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Suite validation failed:");
            eprintln!("  {}", e);
            bail!("invalid suite {}", file);
        }
    }
}
