// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `devbench <kind>` commands - Run one benchmark from command-line options.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, CommandFactory};
use devbench_benchmark::{sinks_for, BenchmarkDriver};
use devbench_core::config::{
    parse_event_period_text, parse_size_text, DEFAULT_ATTRIBUTE, DEFAULT_COMMAND, DEFAULT_PIPE,
};
use devbench_core::{
    AttributeValue, BenchError, BenchmarkConfig, BenchmarkKind, CommonOptions, DeviceName,
    LoopbackConnector, LoopbackOptions, Operation, PipeBlob, ValidationError, WorkerBackend,
    WorkerCounts,
};

/// Options shared by every benchmark command.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Target device name, e.g. sys/benchmark/1
    #[arg(short, long)]
    pub device: Option<String>,

    /// Worker counts: a list `1,2,4` or a range `start:stop[:step]`
    #[arg(short = 'n', long = "numbers-of-clients", default_value = "1")]
    pub clients: String,

    /// Measurement window per worker in seconds
    #[arg(short = 'p', long = "test-period", default_value = "10")]
    pub period: String,

    /// Write results as CSV to this file
    #[arg(short = 'f', long = "csv-file")]
    pub csv_file: Option<PathBuf>,

    /// Write a timestamped JSON report into this directory
    #[arg(long)]
    pub json_dir: Option<PathBuf>,

    /// Report title
    #[arg(short, long)]
    pub title: Option<String>,

    /// Report description
    #[arg(long)]
    pub description: Option<String>,

    /// Run each worker as this shell program instead of a built-in client
    #[arg(long)]
    pub worker_program: Option<String>,

    #[command(flatten)]
    pub target: TargetArgs,
}

/// Options of the built-in loopback target.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Latency added to every loopback call, in microseconds
    #[arg(long, default_value_t = 0)]
    pub loopback_latency_us: u64,

    /// Fail every n-th loopback call
    #[arg(long)]
    pub loopback_fail_every: Option<u64>,

    /// Pause around push-event subscriptions, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub settle_ms: u64,
}

impl TargetArgs {
    pub fn connector(&self) -> Arc<LoopbackConnector> {
        Arc::new(LoopbackConnector::new(LoopbackOptions {
            latency: Duration::from_micros(self.loopback_latency_us),
            fail_every: self.loopback_fail_every.filter(|&n| n > 0),
        }))
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// A benchmark command: shared options plus one operation.
pub trait BenchArgs {
    fn common(&self) -> &CommonArgs;

    fn kind(&self) -> BenchmarkKind;

    fn operation(&self) -> Result<Operation, ValidationError>;

    /// Subcommand name, for usage output.
    fn subcommand(&self) -> &'static str;
}

#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Attribute to read
    #[arg(short, long, default_value = DEFAULT_ATTRIBUTE)]
    pub attribute: String,
}

#[derive(Args, Debug, Clone)]
pub struct WriteArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Attribute to write
    #[arg(short, long, default_value = DEFAULT_ATTRIBUTE)]
    pub attribute: String,

    /// Comma-separated values to write, `m` means minus, e.g. `12.28,m123.3`
    #[arg(long, default_value = "0")]
    pub value: String,

    /// Shape of the written value, e.g. `100` or `10,10`
    #[arg(long, default_value = "")]
    pub shape: String,
}

#[derive(Args, Debug, Clone)]
pub struct CommandArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Command to call
    #[arg(short, long, default_value = DEFAULT_COMMAND)]
    pub command: String,
}

#[derive(Args, Debug, Clone)]
pub struct PipeReadArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Pipe to read
    #[arg(long, default_value = DEFAULT_PIPE)]
    pub pipe: String,
}

#[derive(Args, Debug, Clone)]
pub struct PipeWriteArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Pipe to write
    #[arg(long, default_value = DEFAULT_PIPE)]
    pub pipe: String,

    /// Number of elements in the written blob
    #[arg(short, long, default_value = "1", allow_hyphen_values = true)]
    pub size: String,
}

#[derive(Args, Debug, Clone)]
pub struct EventArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Attribute to subscribe to
    #[arg(short, long, default_value = DEFAULT_ATTRIBUTE)]
    pub attribute: String,

    /// Keep subscriptions open until the window closes
    #[arg(long)]
    pub keep_open: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PushEventArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Attribute the device pushes events on
    #[arg(short, long, default_value = DEFAULT_ATTRIBUTE)]
    pub attribute: String,

    /// Device-side push period in milliseconds
    #[arg(long, default_value = "10")]
    pub speriod: String,
}

impl BenchArgs for ReadArgs {
    fn common(&self) -> &CommonArgs {
        &self.common
    }

    fn kind(&self) -> BenchmarkKind {
        BenchmarkKind::Read
    }

    fn operation(&self) -> Result<Operation, ValidationError> {
        Ok(Operation::ReadAttribute {
            attribute: self.attribute.clone(),
        })
    }

    fn subcommand(&self) -> &'static str {
        "read"
    }
}

impl BenchArgs for WriteArgs {
    fn common(&self) -> &CommonArgs {
        &self.common
    }

    fn kind(&self) -> BenchmarkKind {
        BenchmarkKind::Write
    }

    fn operation(&self) -> Result<Operation, ValidationError> {
        Ok(Operation::WriteAttribute {
            attribute: self.attribute.clone(),
            value: AttributeValue::from_notation(&self.value, &self.shape)?,
        })
    }

    fn subcommand(&self) -> &'static str {
        "write"
    }
}

impl BenchArgs for CommandArgs {
    fn common(&self) -> &CommonArgs {
        &self.common
    }

    fn kind(&self) -> BenchmarkKind {
        BenchmarkKind::Command
    }

    fn operation(&self) -> Result<Operation, ValidationError> {
        Ok(Operation::Command {
            command: self.command.clone(),
        })
    }

    fn subcommand(&self) -> &'static str {
        "command"
    }
}

impl BenchArgs for PipeReadArgs {
    fn common(&self) -> &CommonArgs {
        &self.common
    }

    fn kind(&self) -> BenchmarkKind {
        BenchmarkKind::PipeRead
    }

    fn operation(&self) -> Result<Operation, ValidationError> {
        Ok(Operation::PipeRead {
            pipe: self.pipe.clone(),
        })
    }

    fn subcommand(&self) -> &'static str {
        "pipe-read"
    }
}

impl BenchArgs for PipeWriteArgs {
    fn common(&self) -> &CommonArgs {
        &self.common
    }

    fn kind(&self) -> BenchmarkKind {
        BenchmarkKind::PipeWrite
    }

    fn operation(&self) -> Result<Operation, ValidationError> {
        Ok(Operation::PipeWrite {
            pipe: self.pipe.clone(),
            blob: PipeBlob::benchmark_payload(parse_size_text(&self.size)?),
        })
    }

    fn subcommand(&self) -> &'static str {
        "pipe-write"
    }
}

impl BenchArgs for EventArgs {
    fn common(&self) -> &CommonArgs {
        &self.common
    }

    fn kind(&self) -> BenchmarkKind {
        BenchmarkKind::Event
    }

    fn operation(&self) -> Result<Operation, ValidationError> {
        Ok(Operation::EventSubscribe {
            attribute: self.attribute.clone(),
            keep_open: self.keep_open,
        })
    }

    fn subcommand(&self) -> &'static str {
        "event"
    }
}

impl BenchArgs for PushEventArgs {
    fn common(&self) -> &CommonArgs {
        &self.common
    }

    fn kind(&self) -> BenchmarkKind {
        BenchmarkKind::PushEvent
    }

    fn operation(&self) -> Result<Operation, ValidationError> {
        Ok(Operation::PushEvent {
            attribute: self.attribute.clone(),
            event_period_ms: parse_event_period_text(&self.speriod)?,
        })
    }

    fn subcommand(&self) -> &'static str {
        "push-event"
    }
}

/// Build a validated benchmark configuration from command-line options.
pub fn build_config(args: &impl BenchArgs, verbose: bool) -> Result<BenchmarkConfig, BenchError> {
    let cli = args.common();
    let kind = args.kind();

    let device = cli
        .device
        .as_deref()
        .ok_or_else(|| ValidationError::MissingRequiredField {
            field: "device",
            context: "command line".to_string(),
        })?;

    let mut common = CommonOptions::new(DeviceName::new(device)?, kind);
    common.worker_counts = WorkerCounts::parse(&cli.clients)?;
    common.period = cli.period.parse()?;
    common.csv_file = cli.csv_file.clone();
    common.json_dir = cli.json_dir.clone();
    if let Some(title) = &cli.title {
        common.title = title.clone();
    }
    if let Some(description) = &cli.description {
        common.description = description.clone();
    }
    common.verbose = verbose;

    let backend = match &cli.worker_program {
        Some(program) if !program.trim().is_empty() => WorkerBackend::External {
            program: program.clone(),
        },
        Some(_) => {
            return Err(ValidationError::InvalidFieldValue {
                field: "worker_program",
                value: String::new(),
                reason: "worker program cannot be empty".to_string(),
            }
            .into())
        }
        None => WorkerBackend::Builtin,
    };

    Ok(BenchmarkConfig::new(common, args.operation()?, backend))
}

pub fn execute(args: &impl BenchArgs, verbose: bool) -> anyhow::Result<()> {
    if args.common().device.is_none() {
        let mut cli = crate::Cli::command();
        if let Some(usage) = cli.find_subcommand_mut(args.subcommand()) {
            let _ = usage.print_help();
        }
        bail!("no device given; pass one with -d/--device");
    }

    let config = build_config(args, verbose)?;
    tracing::info!(
        benchmark = %config.kind(),
        device = %config.common.device,
        clients = %config.common.worker_counts,
        period = %config.common.period,
        "Benchmark configured"
    );

    let target = &args.common().target;
    let sinks = sinks_for(&config)?;
    BenchmarkDriver::new(target.connector())
        .settle(target.settle())
        .run(&config, sinks)
        .with_context(|| format!("{} failed", config.kind()))?;

    Ok(())
}
