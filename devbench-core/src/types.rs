// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Validated newtypes shared by configuration and supervision.
//!
//! Each type checks its invariants once, at construction.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Upper bound on the number of runs a worker-count list may expand to.
const MAX_RUNS: usize = 10_000;

/// Upper bound on concurrent workers in a single run.
const MAX_WORKERS: usize = 100_000;

/// Prefix of fully qualified device names (`tango://host:port/a/b/c`).
const FQDN_PREFIX: &str = "tango://";

/// Validated device name of the form `domain/family/member`.
///
/// An optional `tango://host:port/` prefix is accepted and preserved.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceName(String);

impl DeviceName {
    /// Create a new DeviceName with validation.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        let invalid = |reason: &str| ValidationError::InvalidDeviceName {
            name: name.clone(),
            reason: reason.to_string(),
        };

        if name.is_empty() {
            return Err(invalid("device name cannot be empty"));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(invalid("device name cannot contain whitespace"));
        }

        let local = match name.strip_prefix(FQDN_PREFIX) {
            Some(rest) => match rest.split_once('/') {
                Some((host, local)) if !host.is_empty() => local,
                _ => return Err(invalid("missing host after tango://")),
            },
            None => name.as_str(),
        };

        let segments: Vec<&str> = local.split('/').collect();
        if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
            return Err(invalid("expected domain/family/member"));
        }

        Ok(Self(name))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for DeviceName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeviceName> for String {
    fn from(name: DeviceName) -> Self {
        name.0
    }
}

impl FromStr for DeviceName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Validated device server instance of the form `Server/instance`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerInstance(String);

impl ServerInstance {
    /// Create a new ServerInstance with validation.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        let valid = match name.split_once('/') {
            Some((server, instance)) => {
                !server.is_empty()
                    && !instance.is_empty()
                    && !instance.contains('/')
                    && !name.chars().any(char::is_whitespace)
            }
            None => false,
        };

        if !valid {
            return Err(ValidationError::InvalidServerInstance {
                name,
                reason: "expected Server/instance".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Executable name of the server.
    pub fn server(&self) -> &str {
        self.split().0
    }

    /// Instance name passed to the server executable.
    pub fn instance(&self) -> &str {
        self.split().1
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn split(&self) -> (&str, &str) {
        // Validated at construction.
        self.0.split_once('/').unwrap_or((self.0.as_str(), ""))
    }
}

impl fmt::Display for ServerInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ServerInstance {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ServerInstance> for String {
    fn from(name: ServerInstance) -> Self {
        name.0
    }
}

/// Validated measurement period in seconds.
/// Must be finite and strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Period(f64);

impl Period {
    /// Create a new Period with validation.
    pub fn from_secs(secs: f64) -> Result<Self, ValidationError> {
        if !secs.is_finite() || secs <= 0.0 {
            return Err(ValidationError::InvalidPeriod {
                value: secs.to_string(),
                reason: "test period must be a positive number of seconds".to_string(),
            });
        }
        if Duration::try_from_secs_f64(secs).is_err() {
            return Err(ValidationError::InvalidPeriod {
                value: secs.to_string(),
                reason: "test period is too long".to_string(),
            });
        }
        Ok(Self(secs))
    }

    /// Get the period in seconds.
    pub fn as_secs(&self) -> f64 {
        self.0
    }

    /// Get the period as a Duration.
    pub fn as_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.0).unwrap_or(Duration::MAX)
    }
}

impl Default for Period {
    fn default() -> Self {
        Self(10.0)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<f64> for Period {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::from_secs(value)
    }
}

impl From<Period> for f64 {
    fn from(period: Period) -> Self {
        period.0
    }
}

impl FromStr for Period {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let secs: f64 = s
            .trim()
            .parse()
            .map_err(|_| ValidationError::InvalidPeriod {
                value: s.to_string(),
                reason: "test period is not a number".to_string(),
            })?;
        Self::from_secs(secs).map_err(|e| match e {
            ValidationError::InvalidPeriod { reason, .. } => ValidationError::InvalidPeriod {
                value: s.to_string(),
                reason,
            },
            other => other,
        })
    }
}

/// Ordered list of worker counts, one benchmark run per entry.
///
/// Parsed from comma-separated entries, each either an integer or a
/// half-open slice `start:stop[:step]`, e.g. `1,4,10:20:5` → 1, 4, 10, 15.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkerCounts {
    source: String,
    counts: Vec<usize>,
}

impl WorkerCounts {
    /// Parse a worker-count expression.
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidWorkerCounts {
            value: text.to_string(),
            reason,
        };

        if text.trim().is_empty() {
            return Err(invalid("number of clients cannot be empty".to_string()));
        }

        let mut counts = Vec::new();
        for entry in text.split(',') {
            let values = if entry.contains(':') {
                let parts = entry
                    .split(':')
                    .map(|p| parse_int(p).map_err(&invalid))
                    .collect::<Result<Vec<i64>, _>>()?;
                match parts.as_slice() {
                    [start, stop] => slice_range(*start, *stop, 1),
                    [start, stop, step] if *step != 0 => slice_range(*start, *stop, *step),
                    [_, _, _] => return Err(invalid("slice step cannot be zero".to_string())),
                    _ => return Err(invalid(format!("'{}' is not start:stop[:step]", entry))),
                }
            } else {
                vec![parse_int(entry).map_err(&invalid)?]
            };

            for value in values {
                let count = usize::try_from(value)
                    .map_err(|_| invalid(format!("{} is negative", value)))?;
                if count > MAX_WORKERS {
                    return Err(invalid(format!(
                        "{} clients exceeds the limit of {}",
                        count, MAX_WORKERS
                    )));
                }
                counts.push(count);
                if counts.len() > MAX_RUNS {
                    return Err(invalid(format!("more than {} runs requested", MAX_RUNS)));
                }
            }
        }

        Ok(Self {
            source: text.to_string(),
            counts,
        })
    }

    /// Build from explicit counts.
    pub fn from_counts(counts: Vec<usize>) -> Self {
        let source = counts
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(",");
        Self { source, counts }
    }

    /// The expanded counts in order.
    pub fn as_slice(&self) -> &[usize] {
        &self.counts
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl Default for WorkerCounts {
    fn default() -> Self {
        Self::from_counts(vec![1])
    }
}

fn parse_int(text: &str) -> Result<i64, String> {
    text.trim()
        .parse()
        .map_err(|_| format!("'{}' is not an integer", text.trim()))
}

/// Half-open integer range with a non-zero step, either direction.
fn slice_range(start: i64, stop: i64, step: i64) -> Vec<i64> {
    let mut values = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        values.push(current);
        if values.len() > MAX_RUNS {
            break;
        }
        current = match current.checked_add(step) {
            Some(next) => next,
            None => break,
        };
    }
    values
}

impl fmt::Display for WorkerCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl FromStr for WorkerCounts {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for WorkerCounts {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<WorkerCounts> for String {
    fn from(counts: WorkerCounts) -> Self {
        counts.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_name_validation() {
        assert!(DeviceName::new("sys/benchmark/pytarget01").is_ok());
        assert!(DeviceName::new("tango://host:10000/sys/tg_test/1").is_ok());
        assert!(DeviceName::new("").is_err());
        assert!(DeviceName::new("sys/benchmark").is_err());
        assert!(DeviceName::new("sys//x").is_err());
        assert!(DeviceName::new("sys/a b/c").is_err());
        assert!(DeviceName::new("tango:///a/b/c").is_err());
    }

    #[test]
    fn test_server_instance_parts() {
        let server = ServerInstance::new("PyBenchmarkTarget/01").unwrap();
        assert_eq!(server.server(), "PyBenchmarkTarget");
        assert_eq!(server.instance(), "01");
        assert!(ServerInstance::new("PyBenchmarkTarget").is_err());
        assert!(ServerInstance::new("a/b/c").is_err());
        assert!(ServerInstance::new("/01").is_err());
    }

    #[test]
    fn test_period_validation() {
        assert!(Period::from_secs(0.5).is_ok());
        assert!(Period::from_secs(0.0).is_err());
        assert!(Period::from_secs(-1.0).is_err());
        assert!(Period::from_secs(f64::NAN).is_err());
        assert!(Period::from_secs(1e20).is_err());
        assert!("1e20".parse::<Period>().is_err());
        assert_eq!("2.5".parse::<Period>().unwrap().as_secs(), 2.5);
        assert!("ten".parse::<Period>().is_err());
        assert_eq!(
            Period::from_secs(0.25).unwrap().as_duration(),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_worker_counts_plain_and_slices() {
        let counts = WorkerCounts::parse("1,23,45:50:2").unwrap();
        assert_eq!(counts.as_slice(), &[1, 23, 45, 47, 49]);

        let counts = WorkerCounts::parse("1:4").unwrap();
        assert_eq!(counts.as_slice(), &[1, 2, 3]);

        let counts = WorkerCounts::parse("10:0:-5").unwrap();
        assert_eq!(counts.as_slice(), &[10, 5]);

        let counts = WorkerCounts::parse(" 2 , 3 ").unwrap();
        assert_eq!(counts.as_slice(), &[2, 3]);
        assert_eq!(counts.to_string(), " 2 , 3 ");
    }

    #[test]
    fn test_worker_counts_rejects_bad_input() {
        assert!(WorkerCounts::parse("").is_err());
        assert!(WorkerCounts::parse("a").is_err());
        assert!(WorkerCounts::parse("1,,2").is_err());
        assert!(WorkerCounts::parse("1:5:0").is_err());
        assert!(WorkerCounts::parse("1:2:3:4").is_err());
        assert!(WorkerCounts::parse("-1").is_err());
        assert!(WorkerCounts::parse("0:100000").is_err());
    }

    #[test]
    fn test_worker_counts_slice_near_integer_limit() {
        let err = WorkerCounts::parse(
            "9223372036854775806:9223372036854775807:9223372036854775807",
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidWorkerCounts { .. }));

        assert_eq!(slice_range(i64::MAX - 1, i64::MAX, i64::MAX), vec![i64::MAX - 1]);
        assert_eq!(slice_range(i64::MIN + 1, i64::MIN, i64::MIN), vec![i64::MIN + 1]);
        assert!(WorkerCounts::parse("200000").is_err());
    }

    #[test]
    fn test_worker_counts_empty_slice_is_allowed() {
        let counts = WorkerCounts::parse("5:1").unwrap();
        assert!(counts.is_empty());
    }
}
