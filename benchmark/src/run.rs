// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! One benchmark run: fan out W workers, join them all, drain their results.
//!
//! Lifecycle: `Created -> Started -> ResultsFetched -> Reported`.
//! Transitions only move forward. `output` may be repeated once results
//! are fetched.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use devbench_core::{BenchmarkConfig, Connector};

use crate::channel::{result_channel, ResultReceiver, ResultSender};
use crate::error::RunError;
use crate::format::format_measurement;
use crate::metrics::{Average, WorkerResult};
use crate::worker::{Worker, WorkerTask, DEFAULT_SETTLE};

/// Lifecycle state of a [`BenchmarkRun`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunState {
    Created,
    Started,
    ResultsFetched,
    Reported,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Created => write!(f, "CREATED"),
            RunState::Started => write!(f, "STARTED"),
            RunState::ResultsFetched => write!(f, "RESULTS_FETCHED"),
            RunState::Reported => write!(f, "REPORTED"),
        }
    }
}

/// Formatted aggregate statistics of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutput {
    pub no_clients: String,
    pub counts: String,
    pub sd_counts: String,
    pub speed: String,
    pub sd_speed: String,
    pub sumcounts: String,
    pub sd_sumcounts: String,
    pub sumspeed: String,
    pub sd_sumspeed: String,
    pub time: String,
    pub sd_time: String,
    pub error_sum: String,
}

impl RunOutput {
    /// Format the statistics of `results`.
    pub fn from_results(results: &[WorkerResult]) -> Self {
        let avg = Average::new(results);
        let (counts, sd_counts) = format_measurement(avg.counts());
        let (speed, sd_speed) = format_measurement(avg.speed());
        let (time, sd_time) = format_measurement(avg.elapsed());
        let (sumcounts, sd_sumcounts) = format_measurement(avg.sum_counts());
        let (sumspeed, sd_sumspeed) = format_measurement(avg.sum_speed());

        Self {
            no_clients: avg.size().to_string(),
            counts,
            sd_counts,
            speed,
            sd_speed,
            sumcounts,
            sd_sumcounts,
            sumspeed,
            sd_sumspeed,
            time,
            sd_time,
            error_sum: avg.error_sum().to_string(),
        }
    }

    /// Key/value view of the output.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        [
            ("no_clients", &self.no_clients),
            ("counts", &self.counts),
            ("sd_counts", &self.sd_counts),
            ("speed", &self.speed),
            ("sd_speed", &self.sd_speed),
            ("sumcounts", &self.sumcounts),
            ("sd_sumcounts", &self.sd_sumcounts),
            ("sumspeed", &self.sumspeed),
            ("sd_sumspeed", &self.sd_sumspeed),
            ("time", &self.time),
            ("sd_time", &self.sd_time),
            ("error_sum", &self.error_sum),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
    }

    /// One-line human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "no_clients: {},  counts: {} +/- {},  speed: ({} +/- {}) counts/s,  time: ({} +/- {}) s",
            self.no_clients,
            self.counts,
            self.sd_counts,
            self.speed,
            self.sd_speed,
            self.time,
            self.sd_time
        )
    }
}

/// Coordinator of one run with a fixed number of workers.
pub struct BenchmarkRun {
    pending: Vec<(Box<dyn WorkerTask>, ResultSender)>,
    receivers: Vec<ResultReceiver>,
    results: Vec<WorkerResult>,
    state: RunState,
}

impl BenchmarkRun {
    /// Run `workers` workers of the configured benchmark.
    pub fn new(config: Arc<BenchmarkConfig>, connector: Arc<dyn Connector>, workers: usize) -> Self {
        Self::with_settle(config, connector, workers, DEFAULT_SETTLE)
    }

    /// Like [`BenchmarkRun::new`] with an explicit push-event settle pause.
    pub fn with_settle(
        config: Arc<BenchmarkConfig>,
        connector: Arc<dyn Connector>,
        workers: usize,
        settle: Duration,
    ) -> Self {
        let tasks = (0..workers)
            .map(|id| {
                let worker = Worker::new(id, Arc::clone(&config), Arc::clone(&connector))
                    .settle(settle);
                Box::new(worker) as Box<dyn WorkerTask>
            })
            .collect();
        Self::from_tasks(tasks)
    }

    /// Run arbitrary tasks, one private channel each.
    pub fn from_tasks(tasks: Vec<Box<dyn WorkerTask>>) -> Self {
        let mut pending = Vec::with_capacity(tasks.len());
        let mut receivers = Vec::with_capacity(tasks.len());
        for task in tasks {
            let (tx, rx) = result_channel();
            pending.push((task, tx));
            receivers.push(rx);
        }
        Self {
            pending,
            receivers,
            results: Vec::new(),
            state: RunState::Created,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Number of workers this run was built with.
    pub fn workers(&self) -> usize {
        self.receivers.len()
    }

    /// Collected results; empty until fetched.
    pub fn results(&self) -> &[WorkerResult] {
        &self.results
    }

    fn expect_state(&self, operation: &'static str, allowed: &[RunState]) -> Result<(), RunError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(RunError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    /// Launch every worker, then block until all have terminated.
    ///
    /// If a worker thread cannot be spawned, the workers already running
    /// are still joined before the error is returned.
    pub fn start(&mut self) -> Result<(), RunError> {
        self.expect_state("start", &[RunState::Created])?;
        self.state = RunState::Started;

        let workers = self.pending.len();
        tracing::info!(workers = workers, "Starting benchmark run");

        let mut handles = Vec::with_capacity(workers);
        let mut spawn_error = None;
        for (task, sender) in self.pending.drain(..) {
            let worker_id = task.worker_id();
            let spawned = thread::Builder::new()
                .name(format!("worker-{}", worker_id))
                .spawn(move || task.run(sender));
            match spawned {
                Ok(handle) => handles.push((worker_id, handle)),
                Err(source) => {
                    tracing::error!(worker_id = worker_id, error = %source, "Failed to spawn worker");
                    spawn_error = Some(RunError::WorkerSpawn { worker_id, source });
                    break;
                }
            }
        }

        for (worker_id, handle) in handles {
            if handle.join().is_err() {
                tracing::warn!(worker_id = worker_id, "Worker thread terminated abnormally");
            }
        }
        tracing::info!(workers = workers, "All workers finished");

        match spawn_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Drain every channel without blocking.
    ///
    /// A channel without a result is skipped, so fewer than W results is
    /// possible. With `verbose`, each result is printed as it is collected.
    pub fn fetch_results(&mut self, verbose: bool) -> Result<&[WorkerResult], RunError> {
        self.expect_state("fetch results", &[RunState::Started])?;

        self.results.clear();
        for (slot, receiver) in self.receivers.iter_mut().enumerate() {
            match receiver.try_take() {
                Some(result) => {
                    if verbose {
                        tracing::info!(
                            worker_id = result.worker_id,
                            count = result.count,
                            speed = result.speed(),
                            elapsed_s = result.elapsed_time,
                            "Worker result"
                        );
                        println!(
                            "VERBOSE: id: {},  counts: {},  speed: {} counts/s,  time: {} s",
                            result.worker_id,
                            result.count,
                            result.speed(),
                            result.elapsed_time
                        );
                    }
                    self.results.push(result);
                }
                None => tracing::warn!(slot = slot, "No result from worker"),
            }
        }

        self.state = RunState::ResultsFetched;
        Ok(&self.results)
    }

    /// Formatted statistics over the fetched results.
    ///
    /// Repeated calls return identical output. With `show`, a one-line
    /// summary is printed.
    pub fn output(&mut self, show: bool) -> Result<RunOutput, RunError> {
        self.expect_state("output", &[RunState::ResultsFetched, RunState::Reported])?;

        let output = RunOutput::from_results(&self.results);
        if show {
            println!("{}", output.summary());
        }
        self.state = RunState::Reported;
        Ok(output)
    }
}
