// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Devbench Benchmarking Engine
//!
//! Fans out concurrent workers against a device for a fixed window,
//! collects one result per worker and reports throughput with
//! propagated uncertainty.
//!
//! # Pipeline
//!
//! `Worker -> WorkerResult -> result channel -> BenchmarkRun -> Average -> RunOutput -> ReportSink`

pub mod channel;
pub mod driver;
pub mod error;
pub mod external;
pub mod format;
pub mod harness;
pub mod metrics;
pub mod reporter;
pub mod run;
pub mod worker;

pub use channel::{result_channel, ResultReceiver, ResultSender};
pub use driver::BenchmarkDriver;
pub use error::RunError;
pub use metrics::{Average, BenchmarkReport, Measurement, RunRecord, SystemInfo, WorkerResult};
pub use reporter::{
    headers, sinks_for, CsvReport, JsonReporter, ReportInfo, ReportSink, ReportWriter, RstReport,
};
pub use run::{BenchmarkRun, RunOutput, RunState};
pub use worker::{Worker, WorkerTask};
