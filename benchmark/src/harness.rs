// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Fixed-window measurement loop.
//!
//! The deadline is checked after every attempt, so the window is a lower
//! bound: a loop overshoots the period by at most one call.

use std::time::{Duration, Instant};

use devbench_core::ClientError;

use crate::metrics::WorkerResult;

/// Running totals of one worker.
///
/// Updated in place after every attempt so a partial tally survives a
/// worker fault.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Tally {
    pub count: u64,
    pub errors: u64,
    pub elapsed: Duration,
}

impl Tally {
    /// Record one attempt.
    pub fn record(&mut self, outcome: Result<(), ClientError>) {
        match outcome {
            Ok(()) => self.count += 1,
            Err(e) => {
                self.errors += 1;
                tracing::trace!(error = %e, "Operation failed");
            }
        }
    }

    pub fn into_result(self, worker_id: usize) -> WorkerResult {
        WorkerResult::new(
            worker_id,
            self.count,
            self.elapsed.as_secs_f64(),
            Some(self.errors),
        )
    }
}

/// Repeat `attempt` until `period` has elapsed.
///
/// At least one attempt is made. Failures are counted, never propagated.
pub fn run_for<F>(period: Duration, tally: &mut Tally, mut attempt: F)
where
    F: FnMut() -> Result<(), ClientError>,
{
    let start = Instant::now();
    loop {
        tally.record(attempt());
        tally.elapsed = start.elapsed();
        if tally.elapsed >= period {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_window_bounds_with_fixed_latency() {
        let period = Duration::from_millis(500);
        let latency = Duration::from_millis(20);
        let mut tally = Tally::default();

        run_for(period, &mut tally, || {
            thread::sleep(latency);
            Ok(())
        });

        assert!(tally.elapsed >= period);
        // One call of overshoot plus scheduling slack
        assert!(tally.elapsed <= period + latency + Duration::from_millis(100));
        assert!(tally.count >= 10 && tally.count <= 25, "count {}", tally.count);
        assert_eq!(tally.errors, 0);
    }

    #[test]
    fn test_failures_are_counted() {
        let mut calls = 0u64;
        let mut tally = Tally::default();

        run_for(Duration::from_millis(50), &mut tally, || {
            calls += 1;
            thread::sleep(Duration::from_millis(1));
            if calls % 2 == 0 {
                Err(ClientError::InjectedFault { call: calls })
            } else {
                Ok(())
            }
        });

        assert_eq!(tally.count + tally.errors, calls);
        assert!(tally.errors > 0);
        assert!(tally.count >= tally.errors);
    }

    #[test]
    fn test_tally_into_result() {
        let tally = Tally {
            count: 8,
            errors: 2,
            elapsed: Duration::from_millis(1500),
        };
        let result = tally.into_result(4);
        assert_eq!(result.worker_id, 4);
        assert_eq!(result.count, 8);
        assert_eq!(result.elapsed_time, 1.5);
        assert_eq!(result.error_count, Some(2));
    }
}
