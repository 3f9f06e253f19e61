// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Device server supervision.
//!
//! Launches the device servers a benchmark suite targets, waits until their
//! devices answer, and stops the ones this run launched.
//!
//! A device counts as ready when its `ready_check` command exits
//! successfully or, without one, when a session from the supervisor's
//! connector answers a ping. A supervisor without a connector and a spec
//! without a check has no probe: the server is always launched and never
//! waited for.

use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};

use crate::client::Connector;
use crate::error::ServerError;
use crate::types::{DeviceName, ServerInstance};

/// Interval between readiness probes.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long an already running device gets to answer before a launch.
const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Time a server gets to exit after SIGTERM before it is killed.
const STOP_GRACE: Duration = Duration::from_secs(5);

/// A device server the suite needs running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSpec {
    pub device_class: String,
    pub server_instance: ServerInstance,
    pub target_device: DeviceName,
    /// Host the server is registered on (informational).
    pub host: Option<String>,
    /// Stop the server after the suite if this run launched it.
    pub stop: bool,
    /// Explicit launch command; defaults to `<Server> <instance>`.
    pub command: Option<Vec<String>>,
    /// Command that exits with status 0 once the device answers.
    pub ready_check: Option<Vec<String>>,
}

impl ServerSpec {
    fn launch_command(&self) -> Vec<String> {
        match &self.command {
            Some(command) => command.clone(),
            None => vec![
                self.server_instance.server().to_string(),
                self.server_instance.instance().to_string(),
            ],
        }
    }
}

/// Readiness policy threaded through every start call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Readiness {
    /// Poll the device after launching its server.
    pub wait: bool,
    pub timeout: Duration,
}

impl Default for Readiness {
    fn default() -> Self {
        Self {
            wait: true,
            timeout: Duration::from_secs(10),
        }
    }
}

/// A started (or found running) device server.
#[derive(Debug)]
pub struct ServerHandle {
    spec: ServerSpec,
    /// `None` when the device was already running.
    child: Option<Child>,
}

impl ServerHandle {
    pub fn spec(&self) -> &ServerSpec {
        &self.spec
    }

    /// Whether this run launched the server process.
    pub fn launched(&self) -> bool {
        self.child.is_some()
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Check if the launched process is still running.
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut().map(Child::try_wait) {
            Some(Ok(None)) => true,
            Some(Ok(Some(_))) | Some(Err(_)) | None => false,
        }
    }
}

/// Poll a device until it accepts a session and answers a ping.
///
/// Returns `false` if the timeout elapses first.
pub fn wait_until_ready(connector: &dyn Connector, device: &DeviceName, timeout: Duration) -> bool {
    let start = Instant::now();
    loop {
        let ready = connector
            .connect(device)
            .and_then(|mut client| client.ping())
            .is_ok();
        if ready {
            tracing::debug!(
                device = %device,
                elapsed_ms = start.elapsed().as_millis(),
                "Device is ready"
            );
            return true;
        }
        if start.elapsed() >= timeout {
            return false;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Run a check command until it exits successfully.
///
/// Returns `false` if the timeout elapses first or the command cannot run.
pub fn wait_for_command(check: &[String], timeout: Duration) -> bool {
    let Some((program, args)) = check.split_first() else {
        return false;
    };
    let start = Instant::now();
    loop {
        match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) if status.success() => return true,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(program = %program, error = %e, "Readiness check failed to run");
                return false;
            }
        }
        if start.elapsed() >= timeout {
            return false;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Starts and stops device servers.
pub struct ServerSupervisor {
    /// Session used to ping devices that have no `ready_check`.
    connector: Option<Arc<dyn Connector>>,
    readiness: Readiness,
    probe_timeout: Duration,
    stop_grace: Duration,
}

impl ServerSupervisor {
    pub fn new(connector: Arc<dyn Connector>, readiness: Readiness) -> Self {
        Self {
            connector: Some(connector),
            readiness,
            probe_timeout: PROBE_TIMEOUT,
            stop_grace: STOP_GRACE,
        }
    }

    /// Supervisor for servers reached outside this process.
    ///
    /// Only `ready_check` commands decide readiness.
    pub fn without_session(readiness: Readiness) -> Self {
        Self {
            connector: None,
            readiness,
            probe_timeout: PROBE_TIMEOUT,
            stop_grace: STOP_GRACE,
        }
    }

    /// Set how long an already running device gets to answer before a launch.
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set the SIGTERM grace period.
    pub fn stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Probe a device; `None` when neither a check command nor a session exists.
    fn probe(&self, spec: &ServerSpec, timeout: Duration) -> Option<bool> {
        if let Some(check) = &spec.ready_check {
            return Some(wait_for_command(check, timeout));
        }
        self.connector
            .as_deref()
            .map(|connector| wait_until_ready(connector, &spec.target_device, timeout))
    }

    /// Make sure the server spec's device is running, launching its server if needed.
    pub fn start_target(&self, spec: &ServerSpec) -> Result<ServerHandle, ServerError> {
        match self.probe(spec, self.probe_timeout) {
            Some(true) => {
                tracing::info!(
                    device = %spec.target_device,
                    server = %spec.server_instance,
                    "Device already running"
                );
                return Ok(ServerHandle {
                    spec: spec.clone(),
                    child: None,
                });
            }
            Some(false) => {}
            None => tracing::debug!(
                device = %spec.target_device,
                "No readiness probe, launching unconditionally"
            ),
        }

        let command = spec.launch_command();
        let (program, args) = command
            .split_first()
            .ok_or_else(|| ServerError::NoLaunchCommand {
                server: spec.server_instance.clone(),
            })?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ServerError::SpawnFailed {
                server: spec.server_instance.clone(),
                reason: format!("Failed to spawn {}: {}", program, e),
            })?;

        tracing::info!(
            server = %spec.server_instance,
            device_class = %spec.device_class,
            host = spec.host.as_deref().unwrap_or("localhost"),
            pid = child.id(),
            "Launched device server"
        );

        if self.readiness.wait {
            match self.probe(spec, self.readiness.timeout) {
                Some(true) => {}
                Some(false) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ServerError::ReadyTimeout {
                        device: spec.target_device.clone(),
                        timeout_ms: self.readiness.timeout.as_millis() as u64,
                    });
                }
                None => tracing::warn!(
                    device = %spec.target_device,
                    server = %spec.server_instance,
                    "No ready_check configured, not waiting for the device"
                ),
            }
        }

        Ok(ServerHandle {
            spec: spec.clone(),
            child: Some(child),
        })
    }

    /// Stop a server this run launched, if its server spec asks for it.
    pub fn stop_target(&self, mut handle: ServerHandle) -> Result<(), ServerError> {
        let server = handle.spec.server_instance.clone();
        let Some(mut child) = handle.child.take() else {
            return Ok(());
        };
        if !handle.spec.stop {
            tracing::debug!(server = %server, "Leaving device server running");
            return Ok(());
        }

        let pid = Pid::from_raw(child.id() as i32);
        if let Err(e) = signal::kill(pid, Signal::SIGTERM) {
            tracing::warn!(server = %server, error = %e, "SIGTERM failed");
        }

        let start = Instant::now();
        while start.elapsed() < self.stop_grace {
            match child.try_wait() {
                Ok(Some(status)) => {
                    tracing::info!(server = %server, status = %status, "Device server stopped");
                    return Ok(());
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    return Err(ServerError::StopFailed {
                        server,
                        reason: e.to_string(),
                    })
                }
            }
        }

        tracing::warn!(server = %server, "Device server ignored SIGTERM, killing");
        child.kill().map_err(|e| ServerError::StopFailed {
            server: server.clone(),
            reason: format!("Failed to kill process: {}", e),
        })?;
        child.wait().map_err(|e| ServerError::StopFailed {
            server,
            reason: e.to_string(),
        })?;
        Ok(())
    }

    /// Start every server spec in order; already started servers are stopped on failure.
    pub fn start_all(self, specs: &[ServerSpec]) -> Result<ServerGuard, ServerError> {
        let mut guard = ServerGuard {
            supervisor: self,
            handles: Vec::with_capacity(specs.len()),
        };
        for spec in specs {
            let handle = guard.supervisor.start_target(spec)?;
            guard.handles.push(handle);
        }
        Ok(guard)
    }
}

/// Stops its servers, last started first, when dropped.
pub struct ServerGuard {
    supervisor: ServerSupervisor,
    handles: Vec<ServerHandle>,
}

impl ServerGuard {
    pub fn handles(&self) -> &[ServerHandle] {
        &self.handles
    }

    /// Stop all servers now, reporting the first failure.
    pub fn stop_all(mut self) -> Result<(), ServerError> {
        self.stop_handles()
    }

    fn stop_handles(&mut self) -> Result<(), ServerError> {
        let mut first_error = None;
        while let Some(handle) = self.handles.pop() {
            if let Err(e) = self.supervisor.stop_target(handle) {
                tracing::error!(error = %e, "Failed to stop device server");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for ServerGuard {
    fn drop(&mut self) {
        let _ = self.stop_handles();
    }
}
