//! Errors raised while running and reporting benchmarks.

use std::path::PathBuf;

use thiserror::Error;

use devbench_core::BenchError;

use crate::run::RunState;

/// Benchmark run and reporting errors.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Invalid run state: cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: RunState,
    },

    #[error("Failed to spawn worker {worker_id}: {source}")]
    WorkerSpawn {
        worker_id: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Report I/O error: {context} ({path}) - {source}")]
    Report {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write report output: {0}")]
    Output(#[source] std::io::Error),

    #[error("Failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Bench(#[from] BenchError),
}
