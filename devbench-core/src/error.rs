//! Error types for devbench.
//!
//! Library code returns these enums; `anyhow` appears only in the binary.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{DeviceName, ServerInstance};

/// Top-level error type for the benchmark harness.
#[derive(Debug, Error)]
pub enum BenchError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Remote Device Errors
    // =========================================================================
    #[error("Device client error: {0}")]
    Client(#[from] ClientError),

    // =========================================================================
    // Device Server Supervision Errors
    // =========================================================================
    #[error("Device server error: {0}")]
    Server(#[from] ServerError),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Validation errors reject a configuration before any worker is started.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field} in {context}")]
    MissingRequiredField {
        field: &'static str,
        context: String,
    },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid number of clients: {value} - {reason}")]
    InvalidWorkerCounts { value: String, reason: String },

    #[error("Invalid test period: {value} - {reason}")]
    InvalidPeriod { value: String, reason: String },

    #[error("Invalid device name: {name} - {reason}")]
    InvalidDeviceName { name: String, reason: String },

    #[error("Invalid server instance: {name} - {reason}")]
    InvalidServerInstance { name: String, reason: String },

    #[error("Unknown benchmark: {name}")]
    UnknownBenchmark { name: String },

    #[error("Duplicate target device: {device}")]
    DuplicateTargetDevice { device: String },

    #[error("Schema validation failed: {message}")]
    SchemaValidation { message: String },
}

/// Failure of a single remote operation.
///
/// Workers count these; they never abort a measurement loop.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error("Cannot connect to device {device}: {reason}")]
    Connection { device: DeviceName, reason: String },

    #[error("Call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Attribute not found: {name}")]
    UnknownAttribute { name: String },

    #[error("Attribute {name} is not writable")]
    ReadOnlyAttribute { name: String },

    #[error("Command not found: {name}")]
    UnknownCommand { name: String },

    #[error("Pipe not found: {name}")]
    UnknownPipe { name: String },

    #[error("Subscription not found: {id}")]
    UnknownSubscription { id: u64 },

    #[error("Type mismatch for {name}: expected {expected}")]
    TypeMismatch { name: String, expected: &'static str },

    #[error("Device failed: {reason}")]
    DeviceFailed { reason: String },

    #[error("Injected fault on call {call}")]
    InjectedFault { call: u64 },
}

/// Device server supervision errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("No launch command known for server {server}")]
    NoLaunchCommand { server: ServerInstance },

    #[error("Failed to spawn server {server}: {reason}")]
    SpawnFailed {
        server: ServerInstance,
        reason: String,
    },

    #[error("Device {device} did not become ready within {timeout_ms}ms")]
    ReadyTimeout { device: DeviceName, timeout_ms: u64 },

    #[error("Failed to stop server {server}: {reason}")]
    StopFailed {
        server: ServerInstance,
        reason: String,
    },
}

/// Result type alias using BenchError.
pub type BenchResult<T> = Result<T, BenchError>;
