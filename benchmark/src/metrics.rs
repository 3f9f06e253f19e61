// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Worker results and their aggregate statistics.
//!
//! Speed is derived from the measured quantities: the mean count divided
//! by the mean elapsed time, with its uncertainty propagated through the
//! quotient. Per-worker speeds are never averaged for reports.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sysinfo::System;

use devbench_core::BenchmarkKind;

use crate::run::RunOutput;

/// Outcome of one worker over its measurement window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkerResult {
    /// Worker index, unique within a run
    pub worker_id: usize,
    /// Successful operations
    pub count: u64,
    /// Wall-clock seconds spent measuring
    pub elapsed_time: f64,
    /// Failed operations, if the variant tracks them
    pub error_count: Option<u64>,
}

impl WorkerResult {
    pub fn new(worker_id: usize, count: u64, elapsed_time: f64, error_count: Option<u64>) -> Self {
        Self {
            worker_id,
            count,
            elapsed_time,
            error_count,
        }
    }

    /// Operations per second; zero when no time elapsed.
    pub fn speed(&self) -> f64 {
        if self.elapsed_time > 0.0 {
            self.count as f64 / self.elapsed_time
        } else {
            0.0
        }
    }
}

/// Mean and population standard deviation of a quantity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub mean: f64,
    pub sd: f64,
}

impl Measurement {
    pub fn new(mean: f64, sd: f64) -> Self {
        Self { mean, sd }
    }

    /// Population statistics of `values`; NaN for an empty slice.
    pub fn of(values: impl IntoIterator<Item = f64>) -> Self {
        let values: Vec<f64> = values.into_iter().collect();
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean,
            sd: variance.sqrt(),
        }
    }

    /// Deterministic linear scale; the sd scales by the same factor.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            mean: self.mean * factor,
            sd: self.sd * factor,
        }
    }

    /// Quotient `c / t` with first-order propagated uncertainty.
    pub fn quotient(count: Measurement, time: Measurement) -> Self {
        let mean = count.mean / time.mean;
        let sd = (count.sd.powi(2) / time.mean.powi(2)
            + time.sd.powi(2) * count.mean.powi(2) / time.mean.powi(4))
        .sqrt();
        Self { mean, sd }
    }
}

/// Read-only statistics view over a batch of worker results.
///
/// Nothing is cached; every accessor recomputes from the results.
#[derive(Debug, Clone, Copy)]
pub struct Average<'a> {
    results: &'a [WorkerResult],
}

impl<'a> Average<'a> {
    pub fn new(results: &'a [WorkerResult]) -> Self {
        Self { results }
    }

    pub fn size(&self) -> usize {
        self.results.len()
    }

    /// Mean and sd of the per-worker counts.
    pub fn counts(&self) -> Measurement {
        Measurement::of(self.results.iter().map(|r| r.count as f64))
    }

    /// Mean and sd of the per-worker elapsed times.
    pub fn elapsed(&self) -> Measurement {
        Measurement::of(self.results.iter().map(|r| r.elapsed_time))
    }

    /// Ratio-of-means speed with propagated uncertainty.
    pub fn speed(&self) -> Measurement {
        Measurement::quotient(self.counts(), self.elapsed())
    }

    /// Mean and sd of the per-worker speeds (diagnostics only).
    pub fn simple_speed(&self) -> Measurement {
        Measurement::of(self.results.iter().map(WorkerResult::speed))
    }

    /// Implied total count over all workers.
    pub fn sum_counts(&self) -> Measurement {
        self.counts().scaled(self.size() as f64)
    }

    /// Implied total speed over all workers.
    pub fn sum_speed(&self) -> Measurement {
        self.speed().scaled(self.size() as f64)
    }

    /// Sum of the error counts that are present.
    pub fn error_sum(&self) -> u64 {
        self.results.iter().filter_map(|r| r.error_count).sum()
    }
}

/// System information captured at benchmark time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub os_version: String,
    pub kernel_version: Option<String>,
    pub cpu_model: String,
    pub cpu_cores: usize,
    pub memory_bytes: u64,
    pub hostname: String,
}

impl SystemInfo {
    /// Collect current system information.
    pub fn collect() -> Self {
        let sys = System::new_all();

        let unknown = || "Unknown".to_string();
        Self {
            os: System::name().unwrap_or_else(unknown),
            os_version: System::os_version().unwrap_or_else(unknown),
            kernel_version: System::kernel_version(),
            cpu_model: sys
                .cpus()
                .first()
                .map(|cpu| cpu.brand().to_string())
                .unwrap_or_else(unknown),
            cpu_cores: sys.cpus().len(),
            memory_bytes: sys.total_memory(),
            hostname: System::host_name().unwrap_or_else(unknown),
        }
    }

    /// Setup entries describing the benchmarking host.
    pub fn setup_entries(&self) -> Vec<(String, String)> {
        vec![
            ("host".to_string(), self.hostname.clone()),
            ("host_cpus".to_string(), self.cpu_cores.to_string()),
            (
                "host_os".to_string(),
                format!("{} {}", self.os, self.os_version),
            ),
        ]
    }
}

/// One row of a benchmark: the output map plus the raw worker results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Zero-based run index
    pub run: usize,
    /// Requested number of workers
    pub clients: usize,
    pub output: RunOutput,
    pub results: Vec<WorkerResult>,
}

impl RunRecord {
    /// Report row in header order.
    pub fn row(&self) -> Vec<String> {
        let out = &self.output;
        vec![
            self.run.to_string(),
            self.clients.to_string(),
            out.sumcounts.clone(),
            out.sd_sumcounts.clone(),
            out.sumspeed.clone(),
            out.sd_sumspeed.clone(),
            out.counts.clone(),
            out.sd_counts.clone(),
            out.speed.clone(),
            out.sd_speed.clone(),
            out.time.clone(),
            out.sd_time.clone(),
            out.error_sum.clone(),
        ]
    }
}

/// Machine-readable report of one benchmark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub suite: String,
    pub version: String,
    pub benchmark: BenchmarkKind,
    pub title: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub system_info: SystemInfo,
    pub setup: BTreeMap<String, String>,
    pub runs: Vec<RunRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(pairs: &[(u64, f64)]) -> Vec<WorkerResult> {
        pairs
            .iter()
            .enumerate()
            .map(|(i, &(count, time))| WorkerResult::new(i, count, time, Some(0)))
            .collect()
    }

    #[test]
    fn test_speed_guards_zero_elapsed() {
        assert_eq!(WorkerResult::new(0, 10, 0.0, None).speed(), 0.0);
        assert_eq!(WorkerResult::new(0, 10, 2.0, None).speed(), 5.0);
    }

    #[test]
    fn test_population_statistics() {
        let m = Measurement::of([2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((m.mean - 5.0).abs() < 1e-12);
        assert!((m.sd - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_propagated_speed_uncertainty() {
        let speed = Measurement::quotient(Measurement::new(100.0, 10.0), Measurement::new(2.0, 0.2));
        assert!((speed.mean - 50.0).abs() < 1e-12);
        assert!((speed.sd - 50f64.sqrt()).abs() < 1e-12);
        assert!((speed.sd - 7.0711).abs() < 1e-4);
    }

    #[test]
    fn test_identical_workers() {
        let results = results(&[(100, 1.0); 4]);
        let avg = Average::new(&results);

        assert_eq!(avg.size(), 4);
        assert_eq!(avg.counts(), Measurement::new(100.0, 0.0));
        assert_eq!(avg.elapsed(), Measurement::new(1.0, 0.0));
        assert_eq!(avg.speed(), Measurement::new(100.0, 0.0));
        assert_eq!(avg.sum_counts(), Measurement::new(400.0, 0.0));
        assert_eq!(avg.sum_speed(), Measurement::new(400.0, 0.0));
        assert_eq!(avg.error_sum(), 0);
    }

    #[test]
    fn test_sums_scale_with_size() {
        let results = results(&[(90, 1.9), (110, 2.1), (100, 2.0)]);
        let avg = Average::new(&results);
        let n = avg.size() as f64;

        assert!((avg.sum_counts().mean - n * avg.counts().mean).abs() < 1e-9);
        assert!((avg.sum_counts().sd - n * avg.counts().sd).abs() < 1e-9);
        assert!((avg.sum_speed().mean - n * avg.speed().mean).abs() < 1e-9);
        assert!((avg.sum_speed().sd - n * avg.speed().sd).abs() < 1e-9);
    }

    #[test]
    fn test_ratio_of_means_differs_from_mean_of_ratios() {
        let results = results(&[(100, 1.0), (100, 4.0)]);
        let avg = Average::new(&results);
        assert!((avg.speed().mean - 40.0).abs() < 1e-12);
        assert!((avg.simple_speed().mean - 62.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_results_are_nan() {
        let avg = Average::new(&[]);
        assert_eq!(avg.size(), 0);
        assert!(avg.counts().mean.is_nan());
        assert!(avg.counts().sd.is_nan());
        assert!(avg.elapsed().mean.is_nan());
        assert!(avg.speed().mean.is_nan());
        assert!(avg.speed().sd.is_nan());
        assert!(avg.simple_speed().mean.is_nan());
        assert!(avg.sum_counts().mean.is_nan());
        assert_eq!(avg.error_sum(), 0);
    }

    #[test]
    fn test_error_sum_skips_absent_counts() {
        let results = vec![
            WorkerResult::new(0, 1, 1.0, Some(3)),
            WorkerResult::new(1, 1, 1.0, None),
            WorkerResult::new(2, 1, 1.0, Some(4)),
        ];
        assert_eq!(Average::new(&results).error_sum(), 7);
    }

    #[test]
    fn test_system_info_collect() {
        let info = SystemInfo::collect();
        assert!(!info.os.is_empty());
        assert_eq!(info.setup_entries().len(), 3);
    }
}
