// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! External client programs as workers.
//!
//! The program runs through `sh -c` with the benchmark options exported as
//! `_TANGO_BENCHMARK_<option>` variables. It measures on its own and prints
//! one line `count elapsed_seconds [errors]`.

use std::process::{Command, Stdio};

use crate::metrics::WorkerResult;

/// Run `program` to completion and turn its output into a result.
///
/// Never fails: a spawn error or malformed output yields a zero result.
pub fn run_program(program: &str, env: &[(String, String)], worker_id: usize) -> WorkerResult {
    let output = Command::new("sh")
        .arg("-c")
        .arg(program)
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output();

    let output = match output {
        Ok(output) => output,
        Err(e) => {
            tracing::error!(
                worker_id = worker_id,
                program = program,
                error = %e,
                "Failed to spawn external client"
            );
            return WorkerResult::new(worker_id, 0, 0.0, Some(1));
        }
    };

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        tracing::warn!(worker_id = worker_id, stderr = %stderr.trim(), "External client stderr");
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    match parse_output(&stdout) {
        Some((count, elapsed, errors)) => {
            tracing::debug!(
                worker_id = worker_id,
                count = count,
                elapsed_s = elapsed,
                status = %output.status,
                "External client finished"
            );
            WorkerResult::new(worker_id, count, elapsed, errors)
        }
        None => {
            tracing::warn!(
                worker_id = worker_id,
                output = %stdout.trim(),
                "Malformed result from external client"
            );
            WorkerResult::new(worker_id, 0, 0.0, Some(0))
        }
    }
}

/// First line that parses as `count elapsed [errors]`.
pub fn parse_output(stdout: &str) -> Option<(u64, f64, Option<u64>)> {
    stdout.lines().find_map(parse_line)
}

fn parse_line(line: &str) -> Option<(u64, f64, Option<u64>)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let (count, elapsed, errors) = match fields.as_slice() {
        [count, elapsed] => (count, elapsed, None),
        [count, elapsed, errors] => (count, elapsed, Some(errors.parse().ok()?)),
        _ => return None,
    };
    let elapsed: f64 = elapsed.parse().ok()?;
    if !elapsed.is_finite() || elapsed < 0.0 {
        return None;
    }
    Some((count.parse().ok()?, elapsed, errors))
}
