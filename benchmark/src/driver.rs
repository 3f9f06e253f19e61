// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Runs a benchmark once per configured worker count and reports each run.

use std::sync::Arc;
use std::time::Duration;

use devbench_core::{BenchmarkConfig, Connector};

use crate::error::RunError;
use crate::metrics::RunRecord;
use crate::reporter::{ReportInfo, ReportSink, ReportWriter};
use crate::run::BenchmarkRun;
use crate::worker::DEFAULT_SETTLE;

/// Sequential driver over the worker counts of a benchmark.
pub struct BenchmarkDriver {
    connector: Arc<dyn Connector>,
    settle: Duration,
}

impl BenchmarkDriver {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            settle: DEFAULT_SETTLE,
        }
    }

    /// Set the push-event settle pause.
    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Run every worker count of `config` in order, feeding `sinks`.
    pub fn run(
        &self,
        config: &BenchmarkConfig,
        sinks: Vec<Box<dyn ReportSink>>,
    ) -> Result<Vec<RunRecord>, RunError> {
        let shared = Arc::new(config.clone());
        let mut writer = ReportWriter::new(config.kind().unit(), sinks);
        writer.begin(&ReportInfo::from_config(config))?;

        tracing::info!(
            benchmark = %config.kind(),
            device = %config.common.device,
            runs = config.common.worker_counts.len(),
            "Starting benchmark"
        );

        let mut records = Vec::with_capacity(config.common.worker_counts.len());
        for (run, &clients) in config.common.worker_counts.as_slice().iter().enumerate() {
            let mut bench = BenchmarkRun::with_settle(
                Arc::clone(&shared),
                Arc::clone(&self.connector),
                clients,
                self.settle,
            );
            bench.start()?;
            bench.fetch_results(config.common.verbose)?;
            let output = bench.output(false)?;

            let record = RunRecord {
                run,
                clients,
                output,
                results: bench.results().to_vec(),
            };
            writer.line(&record)?;
            records.push(record);
        }

        writer.finish()?;
        tracing::info!(benchmark = %config.kind(), "Benchmark finished");
        Ok(records)
    }
}
