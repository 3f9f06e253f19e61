// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Report sinks for benchmark runs.
//!
//! Every sink receives the same sequence: setup info, the header labels,
//! one record per run, then the end marker.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, Utc};

use devbench_core::{BenchmarkConfig, BenchmarkKind};

use crate::error::RunError;
use crate::metrics::{BenchmarkReport, RunRecord, SystemInfo};

/// Setup keys the table report leaves out.
const RST_HIDDEN: &[&str] = &["worker_program"];

/// Column labels for a benchmark whose operations are counted in `unit`.
pub fn headers(unit: &str) -> Vec<String> {
    [
        "Run no.",
        "No. clients",
        "Sum counts [{}]",
        "SD [{}]",
        "Sum Speed [{}/s]",
        "SD [{}/s]",
        "Counts [{}]",
        "SD [{}]",
        "Speed [{}/s]",
        "SD [{}/s]",
        "  Time [s]  ",
        " SD [s]  ",
        " Errors ",
    ]
    .iter()
    .map(|label| label.replace("{}", unit))
    .collect()
}

/// Descriptive part of a report.
#[derive(Debug, Clone)]
pub struct ReportInfo {
    pub kind: BenchmarkKind,
    pub title: String,
    pub description: String,
    pub date: String,
    /// `key=value` setup entries sorted by key
    pub setup: Vec<(String, String)>,
    pub system: SystemInfo,
}

impl ReportInfo {
    /// Describe `config`, stamped with the current local time.
    pub fn from_config(config: &BenchmarkConfig) -> Self {
        let system = SystemInfo::collect();
        let mut setup = config.setup_entries();
        setup.extend(system.setup_entries());
        setup.sort();

        Self {
            kind: config.kind(),
            title: config.common.title.clone(),
            description: config.common.description.clone(),
            date: Local::now().format("%Y-%m-%d %H:%M:%S%.6f%z").to_string(),
            setup,
            system,
        }
    }
}

/// Destination for report output.
pub trait ReportSink {
    fn info(&mut self, info: &ReportInfo) -> Result<(), RunError>;

    fn header(&mut self, labels: &[String]) -> Result<(), RunError>;

    fn line(&mut self, record: &RunRecord) -> Result<(), RunError>;

    fn end(&mut self) -> Result<(), RunError>;
}

/// reStructuredText report with a simple table.
pub struct RstReport<W: Write> {
    out: W,
    widths: Vec<usize>,
}

impl RstReport<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> RstReport<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            widths: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn rule(&self) -> String {
        self.widths
            .iter()
            .map(|w| "=".repeat(w + 2))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl<W: Write> ReportSink for RstReport<W> {
    fn info(&mut self, info: &ReportInfo) -> Result<(), RunError> {
        let mut text = String::new();
        text.push('\n');
        text.push_str(&format!("{}\n{}\n\n", info.title, "=".repeat(info.title.len())));
        text.push_str(&format!("{}\n\n", info.description));
        text.push_str(&format!("**Date:** {}\n\n", info.date));
        text.push_str("Benchmark setup\n---------------\n\n");
        for (key, value) in &info.setup {
            if !RST_HIDDEN.contains(&key.as_str()) {
                text.push_str(&format!("{}={}\n", key, value));
            }
        }
        text.push_str("\nResults\n-------\n\n");
        self.out.write_all(text.as_bytes()).map_err(RunError::Output)
    }

    fn header(&mut self, labels: &[String]) -> Result<(), RunError> {
        self.widths = labels.iter().map(String::len).collect();
        let rule = self.rule();
        writeln!(self.out, "{}\n {}\n{}", rule, labels.join("   "), rule).map_err(RunError::Output)
    }

    fn line(&mut self, record: &RunRecord) -> Result<(), RunError> {
        let cells: Vec<String> = record
            .row()
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let width = self.widths.get(i).copied().unwrap_or(0);
                format!("{:<width$}", cell, width = width)
            })
            .collect();
        writeln!(self.out, " {}", cells.join("   ")).map_err(RunError::Output)
    }

    fn end(&mut self) -> Result<(), RunError> {
        let rule = self.rule();
        writeln!(self.out, "{}\n", rule).map_err(RunError::Output)?;
        self.out.flush().map_err(RunError::Output)
    }
}

/// Comma-separated report.
pub struct CsvReport<W: Write> {
    out: W,
}

impl CsvReport<BufWriter<File>> {
    /// Create (or truncate) a CSV file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, RunError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| RunError::Report {
            context: "creating CSV file",
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> CsvReport<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_row<S: AsRef<str>>(&mut self, fields: &[S]) -> Result<(), RunError> {
        let row = fields
            .iter()
            .map(|f| quote(f.as_ref()))
            .collect::<Vec<_>>()
            .join(",");
        write!(self.out, "{}\r\n", row).map_err(RunError::Output)
    }
}

/// RFC 4180 field quoting.
fn quote(field: &str) -> String {
    if field.contains(&[',', '"', '\r', '\n'][..]) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

impl<W: Write> ReportSink for CsvReport<W> {
    fn info(&mut self, info: &ReportInfo) -> Result<(), RunError> {
        self.write_row(&[&info.title])?;
        self.write_row(&[&info.date])?;
        let setup: Vec<String> = info
            .setup
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        self.write_row(&setup)
    }

    fn header(&mut self, labels: &[String]) -> Result<(), RunError> {
        let trimmed: Vec<&str> = labels.iter().map(|l| l.trim()).collect();
        self.write_row(&trimmed)
    }

    fn line(&mut self, record: &RunRecord) -> Result<(), RunError> {
        self.write_row(&record.row())
    }

    fn end(&mut self) -> Result<(), RunError> {
        self.out.flush().map_err(RunError::Output)
    }
}

/// JSON reporter: one timestamped file per benchmark.
pub struct JsonReporter {
    output_dir: PathBuf,
    report: Option<BenchmarkReport>,
    saved: Option<PathBuf>,
}

impl JsonReporter {
    /// Create a reporter writing into `output_dir`, creating it if needed.
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self, RunError> {
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir).map_err(|source| RunError::Report {
            context: "creating report directory",
            path: output_dir.clone(),
            source,
        })?;
        Ok(Self {
            output_dir,
            report: None,
            saved: None,
        })
    }

    /// Path of the written report, once `end` has run.
    pub fn saved_path(&self) -> Option<&Path> {
        self.saved.as_deref()
    }

    /// Save a report and return the path of the created file.
    pub fn save(&self, report: &BenchmarkReport) -> Result<PathBuf, RunError> {
        let timestamp = report.timestamp.format("%Y-%m-%dT%H-%M-%S%.3fZ");
        let filename = format!("{}_{}.json", report.benchmark, timestamp);
        let filepath = self.output_dir.join(filename);

        let file = File::create(&filepath).map_err(|source| RunError::Report {
            context: "creating JSON report",
            path: filepath.clone(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, report)?;
        writer.flush().map_err(|source| RunError::Report {
            context: "writing JSON report",
            path: filepath.clone(),
            source,
        })?;

        Ok(filepath)
    }

    /// Load a previously saved report.
    pub fn load(path: impl AsRef<Path>) -> Result<BenchmarkReport, RunError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| RunError::Report {
            context: "opening JSON report",
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_reader(io::BufReader::new(file))?)
    }
}

impl ReportSink for JsonReporter {
    fn info(&mut self, info: &ReportInfo) -> Result<(), RunError> {
        self.report = Some(BenchmarkReport {
            suite: "devbench".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            benchmark: info.kind,
            title: info.title.clone(),
            description: info.description.clone(),
            timestamp: Utc::now(),
            system_info: info.system.clone(),
            setup: info.setup.iter().cloned().collect::<BTreeMap<_, _>>(),
            runs: Vec::new(),
        });
        Ok(())
    }

    fn header(&mut self, _labels: &[String]) -> Result<(), RunError> {
        Ok(())
    }

    fn line(&mut self, record: &RunRecord) -> Result<(), RunError> {
        if let Some(report) = self.report.as_mut() {
            report.runs.push(record.clone());
        }
        Ok(())
    }

    fn end(&mut self) -> Result<(), RunError> {
        if let Some(report) = self.report.take() {
            let path = self.save(&report)?;
            tracing::info!(path = %path.display(), "Saved JSON report");
            self.saved = Some(path);
        }
        Ok(())
    }
}

/// Feeds one header and record sequence to every sink.
pub struct ReportWriter {
    headers: Vec<String>,
    sinks: Vec<Box<dyn ReportSink>>,
}

impl ReportWriter {
    pub fn new(unit: &str, sinks: Vec<Box<dyn ReportSink>>) -> Self {
        Self {
            headers: headers(unit),
            sinks,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Emit setup info and the header row.
    pub fn begin(&mut self, info: &ReportInfo) -> Result<(), RunError> {
        for sink in &mut self.sinks {
            sink.info(info)?;
            sink.header(&self.headers)?;
        }
        Ok(())
    }

    pub fn line(&mut self, record: &RunRecord) -> Result<(), RunError> {
        for sink in &mut self.sinks {
            sink.line(record)?;
        }
        Ok(())
    }

    /// Close every sink in order.
    pub fn finish(mut self) -> Result<(), RunError> {
        for sink in &mut self.sinks {
            sink.end()?;
        }
        Ok(())
    }
}

/// Standard sinks for a benchmark: the table on stdout, plus CSV and
/// JSON files when configured.
pub fn sinks_for(config: &BenchmarkConfig) -> Result<Vec<Box<dyn ReportSink>>, RunError> {
    let mut sinks: Vec<Box<dyn ReportSink>> = vec![Box::new(RstReport::stdout())];
    if let Some(path) = &config.common.csv_file {
        sinks.push(Box::new(CsvReport::create(path)?));
    }
    if let Some(dir) = &config.common.json_dir {
        sinks.push(Box::new(JsonReporter::new(dir)?));
    }
    Ok(sinks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::WorkerResult;
    use crate::run::RunOutput;
    use devbench_core::{CommonOptions, DeviceName, Operation, WorkerBackend};
    use tempfile::TempDir;

    fn info() -> ReportInfo {
        let common = CommonOptions::new(DeviceName::new("a/b/c").unwrap(), BenchmarkKind::Read);
        let config = BenchmarkConfig::new(
            common,
            Operation::ReadAttribute {
                attribute: "Attr".to_string(),
            },
            WorkerBackend::External {
                program: "./client".to_string(),
            },
        );
        ReportInfo::from_config(&config)
    }

    fn record() -> RunRecord {
        let results = vec![WorkerResult::new(0, 100, 1.0, Some(0))];
        RunRecord {
            run: 0,
            clients: 1,
            output: RunOutput::from_results(&results),
            results,
        }
    }

    #[test]
    fn test_headers() {
        let labels = headers("read");
        assert_eq!(labels.len(), 13);
        assert_eq!(labels[2], "Sum counts [read]");
        assert_eq!(labels[4], "Sum Speed [read/s]");
        assert_eq!(labels[10], "  Time [s]  ");
    }

    #[test]
    fn test_rst_layout() {
        let mut rst = RstReport::new(Vec::new());
        let labels = vec!["Run no.".to_string(), "Name".to_string()];
        rst.info(&info()).unwrap();
        rst.header(&labels).unwrap();
        rst.end().unwrap();
        let text = String::from_utf8(rst.into_inner()).unwrap();

        assert!(text.starts_with(&format!("\nRead Benchmark\n{}\n", "=".repeat(14))));
        assert!(text.contains("**Date:** "));
        assert!(text.contains("attribute=Attr\n"));
        assert!(text.contains("device=a/b/c\n"));
        assert!(!text.contains("worker_program"));
        assert!(text.contains("\n========= ======\n Run no.   Name\n========= ======\n"));
    }

    #[test]
    fn test_rst_rows_are_padded() {
        let mut rst = RstReport::new(Vec::new());
        rst.header(&headers("read")).unwrap();
        rst.line(&record()).unwrap();
        let text = String::from_utf8(rst.into_inner()).unwrap();
        let row = text.lines().nth(3).unwrap();
        assert!(row.starts_with(&format!(" {:<7}   {:<11}   ", "0", "1")));
    }

    #[test]
    fn test_csv_layout_and_quoting() {
        let mut csv = CsvReport::new(Vec::new());
        csv.info(&info()).unwrap();
        csv.header(&headers("call")).unwrap();
        csv.line(&record()).unwrap();
        csv.end().unwrap();
        let text = String::from_utf8(csv.into_inner()).unwrap();
        let lines: Vec<&str> = text.split("\r\n").collect();

        assert_eq!(lines[0], "Read Benchmark");
        assert!(lines[2].contains("worker_program=./client"));
        assert!(lines[3].starts_with("Run no.,No. clients,Sum counts [call]"));
        assert!(lines[3].ends_with("Time [s],SD [s],Errors"));
        assert!(lines[4].starts_with("0,1,100."));

        assert_eq!(quote("a,b"), "\"a,b\"");
        assert_eq!(quote("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(quote("plain"), "plain");
    }

    #[test]
    fn test_json_reporter_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let mut reporter = JsonReporter::new(temp_dir.path().join("reports")).unwrap();
        reporter.info(&info()).unwrap();
        reporter.line(&record()).unwrap();
        reporter.end().unwrap();

        let path = reporter.saved_path().unwrap().to_path_buf();
        assert!(path.exists());
        let loaded = JsonReporter::load(&path).unwrap();
        assert_eq!(loaded.benchmark, BenchmarkKind::Read);
        assert_eq!(loaded.runs.len(), 1);
        assert_eq!(loaded.runs[0], record());
        assert_eq!(loaded.setup.get("device").map(String::as_str), Some("a/b/c"));
    }

    #[test]
    fn test_writer_feeds_every_sink() {
        let temp_dir = TempDir::new().unwrap();
        let csv_path = temp_dir.path().join("out.csv");
        let sinks: Vec<Box<dyn ReportSink>> = vec![
            Box::new(CsvReport::create(&csv_path).unwrap()),
            Box::new(JsonReporter::new(temp_dir.path()).unwrap()),
        ];
        let mut writer = ReportWriter::new("read", sinks);
        writer.begin(&info()).unwrap();
        writer.line(&record()).unwrap();
        writer.finish().unwrap();

        let csv = fs::read_to_string(&csv_path).unwrap();
        assert_eq!(csv.split("\r\n").filter(|l| !l.is_empty()).count(), 5);
        let json_files = fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().map(|x| x == "json").unwrap_or(false))
            .count();
        assert_eq!(json_files, 1);
    }
}
