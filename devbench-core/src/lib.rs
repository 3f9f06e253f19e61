//! Devbench Core Library
//!
//! Core library for the devbench control-system benchmark harness.
//! Provides validated configuration, the remote device client seam,
//! an in-process loopback device and device-server supervision.

pub mod client;
pub mod config;
pub mod error;
pub mod loopback;
pub mod servers;
pub mod types;

// Re-export commonly used types
pub use client::{
    AttributeValue, ChangeEvent, Connector, DeviceClient, EventCallback, PipeBlob, SubscriptionId,
};
pub use config::{
    BenchmarkConfig, BenchmarkKind, CommonOptions, ConfigLoader, Operation, SuiteConfig,
    SuiteFormat, WorkerBackend,
};
pub use error::{BenchError, BenchResult, ClientError, ServerError, ValidationError};
pub use loopback::{LoopbackConnector, LoopbackDevice, LoopbackOptions};
pub use servers::{Readiness, ServerGuard, ServerHandle, ServerSpec, ServerSupervisor};
pub use types::{DeviceName, Period, ServerInstance, WorkerCounts};
