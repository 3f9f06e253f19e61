// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Benchmark configuration with strict validation.
//!
//! Every benchmark kind has an explicit, enumerated configuration. Suite
//! files (YAML, or JSON by extension) are parsed into raw structures and
//! validated once; nothing downstream sees unvalidated options.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::{AttributeValue, PipeBlob};
use crate::error::{BenchError, BenchResult, ValidationError};
use crate::servers::{Readiness, ServerSpec};
use crate::types::{DeviceName, Period, ServerInstance, WorkerCounts};

pub const DEFAULT_ATTRIBUTE: &str = "BenchmarkScalarAttribute";
pub const DEFAULT_COMMAND: &str = "BenchmarkCommand";
pub const DEFAULT_PIPE: &str = "BenchmarkPipe";
pub const DEFAULT_EVENT_PERIOD_MS: f64 = 10.0;
const DEFAULT_READY_TIMEOUT_S: f64 = 10.0;

/// Kind of remote operation a benchmark exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkKind {
    Read,
    Write,
    Command,
    PipeRead,
    PipeWrite,
    Event,
    PushEvent,
}

impl BenchmarkKind {
    pub const ALL: [BenchmarkKind; 7] = [
        Self::Read,
        Self::Write,
        Self::Command,
        Self::PipeRead,
        Self::PipeWrite,
        Self::Event,
        Self::PushEvent,
    ];

    /// Name used in suite files, e.g. `read_benchmark`.
    pub const fn script_name(&self) -> &'static str {
        match self {
            Self::Read => "read_benchmark",
            Self::Write => "write_benchmark",
            Self::Command => "cmd_benchmark",
            Self::PipeRead => "pipe_read_benchmark",
            Self::PipeWrite => "pipe_write_benchmark",
            Self::Event => "event_benchmark",
            Self::PushEvent => "push_event_benchmark",
        }
    }

    pub fn from_script_name(name: &str) -> Result<Self, ValidationError> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.script_name().eq_ignore_ascii_case(name))
            .ok_or_else(|| ValidationError::UnknownBenchmark {
                name: name.to_string(),
            })
    }

    /// Unit used in report headers, e.g. `Speed [read/s]`.
    pub const fn unit(&self) -> &'static str {
        match self {
            Self::Read | Self::PipeRead => "read",
            Self::Write | Self::PipeWrite => "write",
            Self::Command => "call",
            Self::Event | Self::PushEvent => "event",
        }
    }

    pub const fn default_title(&self) -> &'static str {
        match self {
            Self::Read => "Read Benchmark",
            Self::Write => "Write Benchmark",
            Self::Command => "Command Benchmark",
            Self::PipeRead => "Pipe Read Benchmark",
            Self::PipeWrite => "Pipe Write Benchmark",
            Self::Event => "Event Benchmark",
            Self::PushEvent => "Push Event Benchmark",
        }
    }

    pub const fn default_description(&self) -> &'static str {
        match self {
            Self::Read => {
                "perform check if and how a number of simultaneous clients affect attributes reads speed"
            }
            Self::Write => {
                "perform check if and how a number of simultaneous clients affect attributes write speed"
            }
            Self::Command => {
                "perform check if and how a number of simultaneous clients affect command calls speed"
            }
            Self::PipeRead => {
                "perform check if and how a number of simultaneous clients affect pipes read speed"
            }
            Self::PipeWrite => {
                "perform check if and how a number of simultaneous clients affect pipes write speed"
            }
            Self::Event => {
                "perform check if and how number of parallel subscribers affects subscription time"
            }
            Self::PushEvent => {
                "perform check if and how a number of simultaneous subscribers affect events speed"
            }
        }
    }
}

impl fmt::Display for BenchmarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.script_name())
    }
}

/// The remote operation each worker repeats.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    ReadAttribute {
        attribute: String,
    },
    WriteAttribute {
        attribute: String,
        value: AttributeValue,
    },
    Command {
        command: String,
    },
    PipeRead {
        pipe: String,
    },
    PipeWrite {
        pipe: String,
        blob: PipeBlob,
    },
    /// Subscription churn; with `keep_open` ids accumulate until the window closes.
    EventSubscribe {
        attribute: String,
        keep_open: bool,
    },
    /// Count change events pushed by the device for the whole window.
    PushEvent {
        attribute: String,
        event_period_ms: f64,
    },
}

impl Operation {
    pub fn kind(&self) -> BenchmarkKind {
        match self {
            Self::ReadAttribute { .. } => BenchmarkKind::Read,
            Self::WriteAttribute { .. } => BenchmarkKind::Write,
            Self::Command { .. } => BenchmarkKind::Command,
            Self::PipeRead { .. } => BenchmarkKind::PipeRead,
            Self::PipeWrite { .. } => BenchmarkKind::PipeWrite,
            Self::EventSubscribe { .. } => BenchmarkKind::Event,
            Self::PushEvent { .. } => BenchmarkKind::PushEvent,
        }
    }

    /// Operation-specific `key=value` pairs for report setup sections.
    pub fn parameters(&self) -> Vec<(String, String)> {
        let pair = |k: &str, v: String| (k.to_string(), v);
        match self {
            Self::ReadAttribute { attribute } => vec![pair("attribute", attribute.clone())],
            Self::WriteAttribute { attribute, value } => vec![
                pair("attribute", attribute.clone()),
                pair("value_type", value.type_name().to_string()),
            ],
            Self::Command { command } => vec![pair("command", command.clone())],
            Self::PipeRead { pipe } => vec![pair("pipe", pipe.clone())],
            Self::PipeWrite { pipe, blob } => vec![
                pair("pipe", pipe.clone()),
                pair("size", blob.elements.len().to_string()),
            ],
            Self::EventSubscribe {
                attribute,
                keep_open,
            } => vec![
                pair("attribute", attribute.clone()),
                pair("keep_open", keep_open.to_string()),
            ],
            Self::PushEvent {
                attribute,
                event_period_ms,
            } => vec![
                pair("attribute", attribute.clone()),
                pair("speriod", event_period_ms.to_string()),
            ],
        }
    }
}

/// Where workers execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerBackend {
    /// In-process client session per worker thread.
    Builtin,
    /// One external client program per worker.
    External { program: String },
}

/// Options shared by every benchmark kind.
#[derive(Debug, Clone, PartialEq)]
pub struct CommonOptions {
    pub device: DeviceName,
    pub worker_counts: WorkerCounts,
    pub period: Period,
    pub csv_file: Option<PathBuf>,
    pub json_dir: Option<PathBuf>,
    pub title: String,
    pub description: String,
    pub verbose: bool,
}

impl CommonOptions {
    /// Options with defaults for a benchmark kind.
    pub fn new(device: DeviceName, kind: BenchmarkKind) -> Self {
        Self {
            device,
            worker_counts: WorkerCounts::default(),
            period: Period::default(),
            csv_file: None,
            json_dir: None,
            title: kind.default_title().to_string(),
            description: kind.default_description().to_string(),
            verbose: false,
        }
    }
}

/// Validated configuration of one benchmark.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkConfig {
    pub common: CommonOptions,
    pub operation: Operation,
    pub backend: WorkerBackend,
}

impl BenchmarkConfig {
    pub fn new(common: CommonOptions, operation: Operation, backend: WorkerBackend) -> Self {
        Self {
            common,
            operation,
            backend,
        }
    }

    pub fn kind(&self) -> BenchmarkKind {
        self.operation.kind()
    }

    /// Sorted `key=value` pairs describing the benchmark setup.
    ///
    /// Presentation-only options (title, description, verbose) are omitted.
    pub fn setup_entries(&self) -> Vec<(String, String)> {
        let mut entries = vec![
            ("benchmark".to_string(), self.kind().script_name().to_string()),
            ("device".to_string(), self.common.device.to_string()),
            ("clients".to_string(), self.common.worker_counts.to_string()),
            ("period".to_string(), self.common.period.to_string()),
            (
                "csvfile".to_string(),
                self.common
                    .csv_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            ),
        ];
        entries.extend(self.operation.parameters());
        if let WorkerBackend::External { program } = &self.backend {
            entries.push(("worker_program".to_string(), program.clone()));
        }
        entries.sort();
        entries
    }

    /// Environment handed to external client programs.
    ///
    /// Each option is exported as `_TANGO_BENCHMARK_<key>`.
    pub fn external_env(&self, worker_id: usize) -> Vec<(String, String)> {
        let mut options = vec![
            ("device".to_string(), self.common.device.to_string()),
            ("period".to_string(), self.common.period.to_string()),
            ("worker_id".to_string(), worker_id.to_string()),
        ];
        options.extend(self.operation.parameters());
        options
            .into_iter()
            .map(|(k, v)| (format!("{}{}", EXTERNAL_ENV_PREFIX, k), v))
            .collect()
    }
}

/// Prefix of environment variables read by external client programs.
pub const EXTERNAL_ENV_PREFIX: &str = "_TANGO_BENCHMARK_";

/// Number or string, as YAML/JSON users write them interchangeably.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Text(v) => f.write_str(v),
        }
    }
}

/// Raw suite entry as parsed (before validation).
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEntry {
    // Benchmark entries
    benchmark: Option<String>,
    device: Option<String>,
    clients: Option<Scalar>,
    period: Option<Scalar>,
    csvfile: Option<String>,
    json_dir: Option<String>,
    title: Option<String>,
    description: Option<String>,
    #[serde(default)]
    verbose: bool,
    attribute: Option<String>,
    value: Option<Scalar>,
    shape: Option<Scalar>,
    command: Option<String>,
    pipe: Option<String>,
    size: Option<Scalar>,
    speriod: Option<Scalar>,
    #[serde(default)]
    keep_open: bool,
    worker_program: Option<String>,

    // Device server entries
    target_device: Option<String>,
    device_class: Option<String>,
    server_instance: Option<String>,
    host: Option<String>,
    #[serde(default = "default_stop")]
    stop: bool,
    launch: Option<Vec<String>>,
    ready_check: Option<Vec<String>>,
}

fn default_stop() -> bool {
    true
}

fn default_wait_for_ready() -> bool {
    true
}

fn default_ready_timeout() -> f64 {
    DEFAULT_READY_TIMEOUT_S
}

/// Raw suite file: a bare entry list or a document with readiness settings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSuite {
    Entries(Vec<RawEntry>),
    Document {
        #[serde(default = "default_wait_for_ready")]
        wait_for_ready: bool,
        #[serde(default = "default_ready_timeout")]
        ready_timeout_s: f64,
        entries: Vec<RawEntry>,
    },
}

/// Validated suite: device servers to bring up, then benchmarks in order.
#[derive(Debug, Clone)]
pub struct SuiteConfig {
    pub readiness: Readiness,
    pub servers: Vec<ServerSpec>,
    pub benchmarks: Vec<BenchmarkConfig>,
}

/// Serialization format of a suite file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteFormat {
    Yaml,
    Json,
}

impl SuiteFormat {
    /// JSON for `.json` files, YAML otherwise.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate a suite file.
    pub fn load_file(path: impl AsRef<Path>) -> BenchResult<SuiteConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BenchError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| BenchError::Io {
            context: "reading suite file",
            source: e,
        })?;

        Self::load_string(&content, SuiteFormat::from_path(path))
    }

    /// Load and validate a suite from a string.
    pub fn load_string(content: &str, format: SuiteFormat) -> BenchResult<SuiteConfig> {
        let raw: RawSuite = match format {
            SuiteFormat::Yaml => {
                serde_yaml::from_str(content).map_err(|e| BenchError::ConfigParse {
                    message: format!("YAML parse error: {}", e),
                })?
            }
            SuiteFormat::Json => {
                serde_json::from_str(content).map_err(|e| BenchError::ConfigParse {
                    message: format!("JSON parse error: {}", e),
                })?
            }
        };

        Self::validate(raw).map_err(BenchError::from)
    }

    fn validate(raw: RawSuite) -> Result<SuiteConfig, ValidationError> {
        let (wait, timeout_s, entries) = match raw {
            RawSuite::Entries(entries) => (true, DEFAULT_READY_TIMEOUT_S, entries),
            RawSuite::Document {
                wait_for_ready,
                ready_timeout_s,
                entries,
            } => (wait_for_ready, ready_timeout_s, entries),
        };

        if !timeout_s.is_finite() || timeout_s < 0.0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "ready_timeout_s",
                value: timeout_s.to_string(),
                reason: "must be a non-negative number of seconds".to_string(),
            });
        }

        let mut servers = Vec::new();
        let mut benchmarks = Vec::new();
        let mut seen_devices = HashSet::new();

        for (index, entry) in entries.into_iter().enumerate() {
            match (&entry.benchmark, &entry.target_device) {
                (Some(_), Some(_)) => {
                    return Err(ValidationError::SchemaValidation {
                        message: format!(
                            "entry {} has both 'benchmark' and 'target_device'",
                            index
                        ),
                    })
                }
                (Some(name), None) => {
                    let kind = BenchmarkKind::from_script_name(name)?;
                    benchmarks.push(Self::validate_benchmark(kind, entry, index)?);
                }
                (None, Some(_)) => {
                    let spec = Self::validate_server(entry, index)?;
                    if !seen_devices.insert(spec.target_device.clone()) {
                        return Err(ValidationError::DuplicateTargetDevice {
                            device: spec.target_device.to_string(),
                        });
                    }
                    servers.push(spec);
                }
                (None, None) => {
                    return Err(ValidationError::SchemaValidation {
                        message: format!(
                            "entry {} needs either 'benchmark' or 'target_device'",
                            index
                        ),
                    })
                }
            }
        }

        if benchmarks.is_empty() {
            return Err(ValidationError::SchemaValidation {
                message: "At least one benchmark must be defined".to_string(),
            });
        }

        Ok(SuiteConfig {
            readiness: Readiness {
                wait,
                timeout: Duration::from_secs_f64(timeout_s),
            },
            servers,
            benchmarks,
        })
    }

    fn validate_benchmark(
        kind: BenchmarkKind,
        raw: RawEntry,
        index: usize,
    ) -> Result<BenchmarkConfig, ValidationError> {
        let device = raw
            .device
            .ok_or_else(|| ValidationError::MissingRequiredField {
                field: "device",
                context: format!("benchmark entry {}", index),
            })?;

        let mut common = CommonOptions::new(DeviceName::new(device)?, kind);
        if let Some(clients) = raw.clients {
            common.worker_counts = WorkerCounts::parse(&clients.to_string())?;
        }
        if let Some(period) = raw.period {
            common.period = period.to_string().parse()?;
        }
        common.csv_file = raw.csvfile.map(PathBuf::from);
        common.json_dir = raw.json_dir.map(PathBuf::from);
        if let Some(title) = raw.title {
            common.title = title;
        }
        if let Some(description) = raw.description {
            common.description = description;
        }
        common.verbose = raw.verbose;

        let attribute = raw
            .attribute
            .unwrap_or_else(|| DEFAULT_ATTRIBUTE.to_string());
        let operation = match kind {
            BenchmarkKind::Read => Operation::ReadAttribute { attribute },
            BenchmarkKind::Write => {
                let value = raw.value.map(|v| v.to_string()).unwrap_or_else(|| "0".into());
                let shape = raw.shape.map(|v| v.to_string()).unwrap_or_default();
                Operation::WriteAttribute {
                    attribute,
                    value: AttributeValue::from_notation(&value, &shape)?,
                }
            }
            BenchmarkKind::Command => Operation::Command {
                command: raw.command.unwrap_or_else(|| DEFAULT_COMMAND.to_string()),
            },
            BenchmarkKind::PipeRead => Operation::PipeRead {
                pipe: raw.pipe.unwrap_or_else(|| DEFAULT_PIPE.to_string()),
            },
            BenchmarkKind::PipeWrite => Operation::PipeWrite {
                pipe: raw.pipe.unwrap_or_else(|| DEFAULT_PIPE.to_string()),
                blob: PipeBlob::benchmark_payload(parse_size(raw.size)?),
            },
            BenchmarkKind::Event => Operation::EventSubscribe {
                attribute,
                keep_open: raw.keep_open,
            },
            BenchmarkKind::PushEvent => Operation::PushEvent {
                attribute,
                event_period_ms: parse_event_period(raw.speriod)?,
            },
        };

        let backend = match raw.worker_program {
            Some(program) if !program.trim().is_empty() => WorkerBackend::External { program },
            Some(_) => {
                return Err(ValidationError::InvalidFieldValue {
                    field: "worker_program",
                    value: String::new(),
                    reason: "worker program cannot be empty".to_string(),
                })
            }
            None => WorkerBackend::Builtin,
        };

        Ok(BenchmarkConfig::new(common, operation, backend))
    }

    fn validate_server(raw: RawEntry, index: usize) -> Result<ServerSpec, ValidationError> {
        let missing = |field: &'static str| ValidationError::MissingRequiredField {
            field,
            context: format!("device entry {}", index),
        };

        let target_device = raw.target_device.ok_or_else(|| missing("target_device"))?;
        let server_instance = raw.server_instance.ok_or_else(|| missing("server_instance"))?;
        let device_class = raw.device_class.ok_or_else(|| missing("device_class"))?;
        if matches!(&raw.ready_check, Some(check) if check.is_empty()) {
            return Err(ValidationError::InvalidFieldValue {
                field: "ready_check",
                value: String::new(),
                reason: "readiness check needs a program".to_string(),
            });
        }

        Ok(ServerSpec {
            device_class,
            server_instance: ServerInstance::new(server_instance)?,
            target_device: DeviceName::new(target_device)?,
            host: raw.host,
            stop: raw.stop,
            command: raw.launch,
            ready_check: raw.ready_check,
        })
    }
}

/// Pipe payload size; anything below one becomes one.
pub fn parse_size_text(text: &str) -> Result<usize, ValidationError> {
    let size: i64 = text
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidFieldValue {
            field: "size",
            value: text.to_string(),
            reason: "size is not an integer".to_string(),
        })?;
    Ok(size.max(1) as usize)
}

fn parse_size(raw: Option<Scalar>) -> Result<usize, ValidationError> {
    match raw {
        Some(size) => parse_size_text(&size.to_string()),
        None => Ok(1),
    }
}

/// Event push period in milliseconds; must be positive.
pub fn parse_event_period_text(text: &str) -> Result<f64, ValidationError> {
    match text.trim().parse::<f64>() {
        Ok(ms) if ms > 0.0 && Duration::try_from_secs_f64(ms / 1000.0).is_ok() => Ok(ms),
        _ => Err(ValidationError::InvalidFieldValue {
            field: "speriod",
            value: text.to_string(),
            reason: "event period must be a positive number of milliseconds".to_string(),
        }),
    }
}

fn parse_event_period(raw: Option<Scalar>) -> Result<f64, ValidationError> {
    match raw {
        Some(ms) => parse_event_period_text(&ms.to_string()),
        None => Ok(DEFAULT_EVENT_PERIOD_MS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_suite() {
        let yaml = r#"
- target_device: test/pytarget/01
  device_class: PyBenchmarkTarget
  server_instance: PyBenchmarkTarget/01
- benchmark: read_benchmark
  device: test/pytarget/01
  clients: "1,2:4"
  period: 0.5
- benchmark: write_benchmark
  device: test/pytarget/01
  value: "1,m2"
  shape: 4
- benchmark: cmd_benchmark
  device: test/pytarget/01
  clients: 3
"#;

        let suite = ConfigLoader::load_string(yaml, SuiteFormat::Yaml).unwrap();
        assert_eq!(suite.servers.len(), 1);
        assert!(suite.servers[0].stop);
        assert_eq!(suite.benchmarks.len(), 3);
        assert!(suite.readiness.wait);

        let read = &suite.benchmarks[0];
        assert_eq!(read.kind(), BenchmarkKind::Read);
        assert_eq!(read.common.worker_counts.as_slice(), &[1, 2, 3]);
        assert_eq!(read.common.period.as_secs(), 0.5);
        assert_eq!(read.common.title, "Read Benchmark");

        let write = &suite.benchmarks[1];
        assert_eq!(
            write.operation,
            Operation::WriteAttribute {
                attribute: DEFAULT_ATTRIBUTE.to_string(),
                value: AttributeValue::Spectrum(vec![1.0, -2.0, 1.0, -2.0]),
            }
        );

        assert_eq!(suite.benchmarks[2].common.worker_counts.as_slice(), &[3]);
    }

    #[test]
    fn test_document_with_readiness() {
        let yaml = r#"
wait_for_ready: false
ready_timeout_s: 2
entries:
  - benchmark: event_benchmark
    device: test/pytarget/01
    keep_open: true
"#;
        let suite = ConfigLoader::load_string(yaml, SuiteFormat::Yaml).unwrap();
        assert!(!suite.readiness.wait);
        assert_eq!(suite.readiness.timeout, Duration::from_secs(2));
        assert_eq!(
            suite.benchmarks[0].operation,
            Operation::EventSubscribe {
                attribute: DEFAULT_ATTRIBUTE.to_string(),
                keep_open: true
            }
        );
    }

    #[test]
    fn test_json_suite() {
        let json = r#"[{"benchmark": "pipe_write_benchmark", "device": "a/b/c", "size": 12,
                        "worker_program": "./client"}]"#;
        let suite = ConfigLoader::load_string(json, SuiteFormat::Json).unwrap();
        let bench = &suite.benchmarks[0];
        match &bench.operation {
            Operation::PipeWrite { pipe, blob } => {
                assert_eq!(pipe, DEFAULT_PIPE);
                assert_eq!(blob.elements.len(), 12);
            }
            other => panic!("unexpected operation {:?}", other),
        }
        assert_eq!(
            bench.backend,
            WorkerBackend::External {
                program: "./client".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_benchmark_rejected() {
        let yaml = "- benchmark: fly_benchmark\n  device: a/b/c\n";
        let err = ConfigLoader::load_string(yaml, SuiteFormat::Yaml).unwrap_err();
        assert!(matches!(
            err,
            BenchError::Validation(ValidationError::UnknownBenchmark { .. })
        ));
    }

    #[test]
    fn test_bad_clients_rejected() {
        let yaml = "- benchmark: read_benchmark\n  device: a/b/c\n  clients: 'x'\n";
        let err = ConfigLoader::load_string(yaml, SuiteFormat::Yaml).unwrap_err();
        assert!(matches!(
            err,
            BenchError::Validation(ValidationError::InvalidWorkerCounts { .. })
        ));
    }

    #[test]
    fn test_server_ready_check() {
        let yaml = r#"
- target_device: a/b/c
  device_class: C
  server_instance: S/1
  launch: [my_server, "1"]
  ready_check: [ping_device, a/b/c]
- {benchmark: cmd_benchmark, device: a/b/c}
"#;
        let suite = ConfigLoader::load_string(yaml, SuiteFormat::Yaml).unwrap();
        assert_eq!(
            suite.servers[0].ready_check,
            Some(vec!["ping_device".to_string(), "a/b/c".to_string()])
        );

        let empty = yaml.replace("[ping_device, a/b/c]", "[]");
        let err = ConfigLoader::load_string(&empty, SuiteFormat::Yaml).unwrap_err();
        assert!(matches!(
            err,
            BenchError::Validation(ValidationError::InvalidFieldValue {
                field: "ready_check",
                ..
            })
        ));
    }

    #[test]
    fn test_event_period_bounds() {
        assert_eq!(parse_event_period_text("25").unwrap(), 25.0);
        for text in ["0", "-5", "NaN", "inf", "1e30", "fast"] {
            assert!(parse_event_period_text(text).is_err(), "{}", text);
        }
    }

    #[test]
    fn test_duplicate_target_rejected() {
        let yaml = r#"
- {target_device: a/b/c, device_class: C, server_instance: S/1}
- {target_device: a/b/c, device_class: C, server_instance: S/2}
- {benchmark: read_benchmark, device: a/b/c}
"#;
        let err = ConfigLoader::load_string(yaml, SuiteFormat::Yaml).unwrap_err();
        assert!(matches!(
            err,
            BenchError::Validation(ValidationError::DuplicateTargetDevice { .. })
        ));
    }

    #[test]
    fn test_suite_without_benchmarks_rejected() {
        let yaml = "- {target_device: a/b/c, device_class: C, server_instance: S/1}\n";
        assert!(ConfigLoader::load_string(yaml, SuiteFormat::Yaml).is_err());
    }

    #[test]
    fn test_missing_device_rejected() {
        let yaml = "- benchmark: read_benchmark\n";
        let err = ConfigLoader::load_string(yaml, SuiteFormat::Yaml).unwrap_err();
        assert!(matches!(
            err,
            BenchError::Validation(ValidationError::MissingRequiredField { field: "device", .. })
        ));
    }

    #[test]
    fn test_setup_entries_sorted_and_env() {
        let common = CommonOptions::new(DeviceName::new("a/b/c").unwrap(), BenchmarkKind::Read);
        let config = BenchmarkConfig::new(
            common,
            Operation::ReadAttribute {
                attribute: "Foo".to_string(),
            },
            WorkerBackend::Builtin,
        );
        let keys: Vec<String> = config.setup_entries().into_iter().map(|(k, _)| k).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert!(keys.contains(&"attribute".to_string()));
        assert!(!keys.contains(&"title".to_string()));

        let env = config.external_env(3);
        assert!(env.contains(&("_TANGO_BENCHMARK_attribute".to_string(), "Foo".to_string())));
        assert!(env.contains(&("_TANGO_BENCHMARK_worker_id".to_string(), "3".to_string())));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(SuiteFormat::from_path(Path::new("a.json")), SuiteFormat::Json);
        assert_eq!(SuiteFormat::from_path(Path::new("a.yml")), SuiteFormat::Yaml);
    }
}
