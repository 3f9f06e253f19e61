// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Workers: one device session hammering one operation for a fixed window.
//!
//! Every worker delivers exactly one result. Connection failures produce a
//! zero-count result, and a panicking operation still reports the tally
//! gathered up to the fault.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use devbench_core::client::{AttributeValue, ChangeEvent, DeviceClient, EventCallback};
use devbench_core::loopback::{EVENT_ATTRIBUTE, EVENT_SLEEP_PERIOD};
use devbench_core::{BenchmarkConfig, Connector, Operation, SubscriptionId, WorkerBackend};

use crate::channel::ResultSender;
use crate::external;
use crate::harness::{run_for, Tally};
use crate::metrics::WorkerResult;

/// Pause around the push-event window so subscriptions settle.
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(1);

/// Attempts made to stop the device's event pusher.
const STOP_EVENTS_ATTEMPTS: u32 = 10;

/// A unit of work owned by a run.
pub trait WorkerTask: Send + 'static {
    fn worker_id(&self) -> usize;

    /// Execute and deliver the result through `sender`.
    fn run(self: Box<Self>, sender: ResultSender);
}

/// Worker driving the configured operation.
pub struct Worker {
    id: usize,
    config: Arc<BenchmarkConfig>,
    connector: Arc<dyn Connector>,
    settle: Duration,
}

impl Worker {
    pub fn new(id: usize, config: Arc<BenchmarkConfig>, connector: Arc<dyn Connector>) -> Self {
        Self {
            id,
            config,
            connector,
            settle: DEFAULT_SETTLE,
        }
    }

    /// Set the push-event settle pause.
    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Run to completion and return the single result.
    pub fn execute(&self) -> WorkerResult {
        let mut tally = Tally::default();
        let mut reported = None;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match &self.config.backend {
            WorkerBackend::Builtin => self.run_builtin(&mut tally),
            WorkerBackend::External { program } => {
                let env = self.config.external_env(self.id);
                reported = Some(external::run_program(program, &env, self.id));
            }
        }));

        if outcome.is_err() {
            tracing::error!(
                worker_id = self.id,
                count = tally.count,
                errors = tally.errors,
                "Worker panicked, reporting partial tally"
            );
            tally.errors += 1;
        }

        reported.unwrap_or_else(|| tally.into_result(self.id))
    }

    fn run_builtin(&self, tally: &mut Tally) {
        let device = &self.config.common.device;
        let mut client = match self.connector.connect(device) {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(worker_id = self.id, device = %device, error = %e, "Worker could not connect");
                tally.errors += 1;
                return;
            }
        };

        let period = self.config.common.period.as_duration();
        tracing::debug!(worker_id = self.id, kind = %self.config.kind(), "Worker started");

        match &self.config.operation {
            Operation::ReadAttribute { attribute } => run_for(period, tally, || {
                client.read_attribute(attribute).map(|_| ())
            }),
            Operation::WriteAttribute { attribute, value } => run_for(period, tally, || {
                client.write_attribute(attribute, value)
            }),
            Operation::Command { command } => run_for(period, tally, || {
                client.command_inout(command).map(|_| ())
            }),
            Operation::PipeRead { pipe } => {
                run_for(period, tally, || client.read_pipe(pipe).map(|_| ()))
            }
            Operation::PipeWrite { pipe, blob } => {
                run_for(period, tally, || client.write_pipe(pipe, blob))
            }
            Operation::EventSubscribe {
                attribute,
                keep_open,
            } => self.subscription_churn(&mut *client, attribute, *keep_open, period, tally),
            Operation::PushEvent {
                attribute,
                event_period_ms,
            } => self.push_events(&mut *client, attribute, *event_period_ms, period, tally),
        }

        tracing::debug!(
            worker_id = self.id,
            count = tally.count,
            errors = tally.errors,
            "Worker finished"
        );
    }

    fn subscription_churn(
        &self,
        client: &mut dyn DeviceClient,
        attribute: &str,
        keep_open: bool,
        period: Duration,
        tally: &mut Tally,
    ) {
        let worker_id = self.id;
        let callback: EventCallback = Arc::new(move |event: &ChangeEvent| {
            if let Err(e) = &event.value {
                tracing::debug!(worker_id = worker_id, error = %e, "Error event");
            }
        });

        let mut open: Vec<SubscriptionId> = Vec::new();
        run_for(period, tally, || {
            let id = client.subscribe_event(attribute, Arc::clone(&callback))?;
            if keep_open {
                open.push(id);
                Ok(())
            } else {
                client.unsubscribe_event(id)
            }
        });

        for id in open {
            if let Err(e) = client.unsubscribe_event(id) {
                tracing::warn!(worker_id = self.id, subscription = %id, error = %e, "Failed to unsubscribe");
            }
        }
    }

    fn push_events(
        &self,
        client: &mut dyn DeviceClient,
        attribute: &str,
        event_period_ms: f64,
        period: Duration,
        tally: &mut Tally,
    ) {
        let received = Arc::new(AtomicU64::new(0));
        let failed = Arc::new(AtomicU64::new(0));
        let callback: EventCallback = {
            let received = Arc::clone(&received);
            let failed = Arc::clone(&failed);
            Arc::new(move |event: &ChangeEvent| {
                let counter = if event.is_error() { &failed } else { &received };
                counter.fetch_add(1, Ordering::Relaxed);
            })
        };

        let id = match client.subscribe_event(attribute, callback) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(worker_id = self.id, error = %e, "Failed to subscribe");
                tally.errors += 1;
                return;
            }
        };

        let setup = [
            client.write_attribute(EVENT_ATTRIBUTE, &AttributeValue::Text(attribute.to_string())),
            client.write_attribute(EVENT_SLEEP_PERIOD, &AttributeValue::Scalar(event_period_ms)),
        ];
        tally.errors += setup.iter().filter(|r| r.is_err()).count() as u64;
        thread::sleep(self.settle);

        let start = Instant::now();
        if client.command_inout("StartEvents").is_err() {
            tally.errors += 1;
        }
        thread::sleep(period);
        for _ in 0..STOP_EVENTS_ATTEMPTS {
            match client.command_inout("StopEvents") {
                Ok(_) => break,
                Err(_) => tally.errors += 1,
            }
        }
        tally.elapsed = start.elapsed();

        thread::sleep(self.settle);
        if let Err(e) = client.unsubscribe_event(id) {
            tracing::warn!(worker_id = self.id, subscription = %id, error = %e, "Failed to unsubscribe");
        }

        tally.count = received.load(Ordering::Relaxed);
        tally.errors += failed.load(Ordering::Relaxed);
    }
}

impl WorkerTask for Worker {
    fn worker_id(&self) -> usize {
        self.id
    }

    fn run(self: Box<Self>, sender: ResultSender) {
        let result = self.execute();
        if !sender.send(result) {
            tracing::warn!(worker_id = self.id, "Run dropped before the result arrived");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devbench_core::loopback::{LoopbackConnector, LoopbackDevice, LoopbackOptions};
    use devbench_core::{
        BenchmarkKind, ClientError, CommonOptions, DeviceName, Period, PipeBlob,
    };

    fn config(operation: Operation, period: f64) -> Arc<BenchmarkConfig> {
        let kind = operation.kind();
        let mut common = CommonOptions::new(DeviceName::new("test/loop/1").unwrap(), kind);
        common.period = Period::from_secs(period).unwrap();
        Arc::new(BenchmarkConfig::new(common, operation, WorkerBackend::Builtin))
    }

    fn loopback(options: LoopbackOptions) -> (Arc<dyn Connector>, LoopbackDevice) {
        let connector = LoopbackConnector::new(options);
        let device = connector.device().clone();
        (Arc::new(connector), device)
    }

    fn read_op() -> Operation {
        Operation::ReadAttribute {
            attribute: "BenchmarkScalarAttribute".to_string(),
        }
    }

    #[test]
    fn test_read_worker_counts_calls() {
        let (connector, device) = loopback(LoopbackOptions {
            latency: Duration::from_millis(1),
            fail_every: None,
        });
        let result = Worker::new(0, config(read_op(), 0.1), connector).execute();

        assert!(result.count > 0);
        assert_eq!(result.error_count, Some(0));
        assert!(result.elapsed_time >= 0.1);
        assert_eq!(device.counter("ScalarReadsCount"), Some(result.count));
    }

    #[test]
    fn test_faults_are_counted_not_fatal() {
        let (connector, device) = loopback(LoopbackOptions {
            latency: Duration::from_micros(200),
            fail_every: Some(4),
        });
        let op = Operation::Command {
            command: "BenchmarkCommand".to_string(),
        };
        let result = Worker::new(1, config(op, 0.1), connector).execute();

        let errors = result.error_count.unwrap();
        assert!(errors > 0);
        assert_eq!(result.count + errors, device.call_count());
        assert_eq!(device.counter("CommandCallsCount"), Some(result.count));
    }

    #[test]
    fn test_offline_device_yields_zero_result() {
        let (connector, device) = loopback(LoopbackOptions::default());
        device.set_online(false);
        let result = Worker::new(2, config(read_op(), 0.1), connector).execute();

        assert_eq!(result.worker_id, 2);
        assert_eq!(result.count, 0);
        assert_eq!(result.error_count, Some(1));
        assert_eq!(result.speed(), 0.0);
    }

    #[test]
    fn test_write_and_pipe_workers() {
        let (connector, device) = loopback(LoopbackOptions::default());
        let write = Operation::WriteAttribute {
            attribute: "BenchmarkSpectrumAttribute".to_string(),
            value: AttributeValue::Spectrum(vec![1.0, 2.0]),
        };
        let result = Worker::new(0, config(write, 0.05), Arc::clone(&connector)).execute();
        assert_eq!(device.counter("SpectrumWritesCount"), Some(result.count));

        let pipe = Operation::PipeWrite {
            pipe: "BenchmarkPipe".to_string(),
            blob: PipeBlob::benchmark_payload(3),
        };
        let result = Worker::new(0, config(pipe, 0.05), connector).execute();
        assert_eq!(device.counter("PipeWritesCount"), Some(result.count));
    }

    #[test]
    fn test_subscription_churn_leaves_no_listeners() {
        for keep_open in [false, true] {
            let (connector, device) = loopback(LoopbackOptions::default());
            let op = Operation::EventSubscribe {
                attribute: "BenchmarkScalarAttribute".to_string(),
                keep_open,
            };
            let result = Worker::new(0, config(op, 0.05), connector).execute();

            assert!(result.count > 0);
            assert_eq!(device.subscription_count(), 0);
        }
    }

    #[test]
    fn test_push_event_worker_counts_events() {
        let (connector, device) = loopback(LoopbackOptions::default());
        let op = Operation::PushEvent {
            attribute: "BenchmarkScalarAttribute".to_string(),
            event_period_ms: 5.0,
        };
        let result = Worker::new(0, config(op, 0.3), connector)
            .settle(Duration::from_millis(20))
            .execute();

        assert!(result.count > 0, "no events received");
        assert_eq!(result.error_count, Some(0));
        assert!(result.elapsed_time >= 0.3);
        assert_eq!(device.subscription_count(), 0);
    }

    struct PanickingConnector;

    impl Connector for PanickingConnector {
        fn connect(
            &self,
            _device: &DeviceName,
        ) -> Result<Box<dyn DeviceClient>, ClientError> {
            panic!("session setup exploded");
        }
    }

    #[test]
    fn test_panic_still_delivers_result() {
        let worker = Box::new(Worker::new(7, config(read_op(), 0.1), Arc::new(PanickingConnector)));
        let (tx, mut rx) = crate::channel::result_channel();
        worker.run(tx);

        let result = rx.try_take().unwrap();
        assert_eq!(result.worker_id, 7);
        assert_eq!(result.count, 0);
        assert_eq!(result.error_count, Some(1));
    }

    #[test]
    fn test_kind_of_config() {
        assert_eq!(config(read_op(), 1.0).kind(), BenchmarkKind::Read);
    }
}
