// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! In-process benchmark target.
//!
//! Implements the counter-and-echo device behind the [`Connector`] seam so
//! benchmarks can be dry-run without a control system. Every session shares
//! one device state. A fixed per-call latency and periodic faults can be
//! injected.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::client::{
    AttributeValue, ChangeEvent, Connector, DeviceClient, EventCallback, PipeBlob, SubscriptionId,
};
use crate::error::ClientError;
use crate::types::DeviceName;

pub const SCALAR_ATTRIBUTE: &str = "BenchmarkScalarAttribute";
pub const SPECTRUM_ATTRIBUTE: &str = "BenchmarkSpectrumAttribute";
pub const IMAGE_ATTRIBUTE: &str = "BenchmarkImageAttribute";
pub const EVENT_ATTRIBUTE: &str = "EventAttribute";
pub const EVENT_SLEEP_PERIOD: &str = "EventSleepPeriod";
pub const BENCHMARK_COMMAND: &str = "BenchmarkCommand";
pub const BENCHMARK_PIPE: &str = "BenchmarkPipe";

const DEFAULT_EVENT_PERIOD_MS: f64 = 10.0;

/// Fault and latency injection for loopback sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopbackOptions {
    /// Sleep applied to every call.
    pub latency: Duration,
    /// Fail every n-th call, counted across all sessions.
    pub fail_every: Option<u64>,
}

#[derive(Default)]
struct Counters {
    scalar_reads: AtomicU64,
    spectrum_reads: AtomicU64,
    image_reads: AtomicU64,
    scalar_writes: AtomicU64,
    spectrum_writes: AtomicU64,
    image_writes: AtomicU64,
    command_calls: AtomicU64,
    pipe_reads: AtomicU64,
    pipe_writes: AtomicU64,
    events: AtomicU64,
}

impl Counters {
    fn reset(&self) {
        for counter in [
            &self.scalar_reads,
            &self.spectrum_reads,
            &self.image_reads,
            &self.scalar_writes,
            &self.spectrum_writes,
            &self.image_writes,
            &self.command_calls,
            &self.pipe_reads,
            &self.pipe_writes,
            &self.events,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    fn by_name(&self, name: &str) -> Option<&AtomicU64> {
        let counter = match name {
            "ScalarReadsCount" => &self.scalar_reads,
            "SpectrumReadsCount" => &self.spectrum_reads,
            "ImageReadsCount" => &self.image_reads,
            "ScalarWritesCount" => &self.scalar_writes,
            "SpectrumWritesCount" => &self.spectrum_writes,
            "ImageWritesCount" => &self.image_writes,
            "CommandCallsCount" => &self.command_calls,
            "PipeReadsCount" => &self.pipe_reads,
            "PipeWritesCount" => &self.pipe_writes,
            "ScalarEventsCount" => &self.events,
            _ => return None,
        };
        Some(counter)
    }
}

struct Subscription {
    attribute: String,
    callback: EventCallback,
}

struct EventPusher {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

struct DeviceState {
    online: AtomicBool,
    calls: AtomicU64,
    counters: Counters,
    scalar: Mutex<AttributeValue>,
    spectrum: Mutex<AttributeValue>,
    image: Mutex<AttributeValue>,
    event_attribute: Mutex<String>,
    event_period_ms: Mutex<f64>,
    pipe: Mutex<PipeBlob>,
    next_subscription: AtomicU64,
    subscriptions: Mutex<HashMap<u64, Subscription>>,
    pusher: Mutex<Option<EventPusher>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DeviceState {
    fn new() -> Self {
        Self {
            online: AtomicBool::new(true),
            calls: AtomicU64::new(0),
            counters: Counters::default(),
            scalar: Mutex::new(AttributeValue::Scalar(0.0)),
            spectrum: Mutex::new(AttributeValue::Spectrum(Vec::new())),
            image: Mutex::new(AttributeValue::Image {
                rows: 0,
                cols: 0,
                data: Vec::new(),
            }),
            event_attribute: Mutex::new(SCALAR_ATTRIBUTE.to_string()),
            event_period_ms: Mutex::new(DEFAULT_EVENT_PERIOD_MS),
            pipe: Mutex::new(PipeBlob::benchmark_payload(1)),
            next_subscription: AtomicU64::new(1),
            subscriptions: Mutex::new(HashMap::new()),
            pusher: Mutex::new(None),
        }
    }

    fn read(&self, name: &str) -> Result<AttributeValue, ClientError> {
        let value = match name {
            SCALAR_ATTRIBUTE => {
                self.counters.scalar_reads.fetch_add(1, Ordering::Relaxed);
                lock(&self.scalar).clone()
            }
            SPECTRUM_ATTRIBUTE => {
                self.counters.spectrum_reads.fetch_add(1, Ordering::Relaxed);
                lock(&self.spectrum).clone()
            }
            IMAGE_ATTRIBUTE => {
                self.counters.image_reads.fetch_add(1, Ordering::Relaxed);
                lock(&self.image).clone()
            }
            EVENT_ATTRIBUTE => AttributeValue::Text(lock(&self.event_attribute).clone()),
            EVENT_SLEEP_PERIOD => AttributeValue::Scalar(*lock(&self.event_period_ms)),
            other => match self.counters.by_name(other) {
                Some(counter) => AttributeValue::Long(counter.load(Ordering::Relaxed) as i64),
                None => {
                    return Err(ClientError::UnknownAttribute {
                        name: other.to_string(),
                    })
                }
            },
        };
        Ok(value)
    }

    fn write(&self, name: &str, value: &AttributeValue) -> Result<(), ClientError> {
        let mismatch = |expected| ClientError::TypeMismatch {
            name: name.to_string(),
            expected,
        };
        match (name, value) {
            (SCALAR_ATTRIBUTE, AttributeValue::Scalar(_)) => {
                self.counters.scalar_writes.fetch_add(1, Ordering::Relaxed);
                *lock(&self.scalar) = value.clone();
            }
            (SCALAR_ATTRIBUTE, _) => return Err(mismatch("scalar")),
            (SPECTRUM_ATTRIBUTE, AttributeValue::Spectrum(_)) => {
                self.counters.spectrum_writes.fetch_add(1, Ordering::Relaxed);
                *lock(&self.spectrum) = value.clone();
            }
            (SPECTRUM_ATTRIBUTE, _) => return Err(mismatch("spectrum")),
            (IMAGE_ATTRIBUTE, AttributeValue::Image { .. }) => {
                self.counters.image_writes.fetch_add(1, Ordering::Relaxed);
                *lock(&self.image) = value.clone();
            }
            (IMAGE_ATTRIBUTE, _) => return Err(mismatch("image")),
            (EVENT_ATTRIBUTE, AttributeValue::Text(attribute)) => {
                *lock(&self.event_attribute) = attribute.clone();
            }
            (EVENT_ATTRIBUTE, _) => return Err(mismatch("text")),
            (EVENT_SLEEP_PERIOD, AttributeValue::Scalar(ms)) if event_period(*ms).is_some() => {
                *lock(&self.event_period_ms) = *ms;
            }
            (EVENT_SLEEP_PERIOD, AttributeValue::Long(ms))
                if event_period(*ms as f64).is_some() =>
            {
                *lock(&self.event_period_ms) = *ms as f64;
            }
            (EVENT_SLEEP_PERIOD, _) => return Err(mismatch("positive number")),
            (other, _) if self.counters.by_name(other).is_some() => {
                return Err(ClientError::ReadOnlyAttribute {
                    name: other.to_string(),
                })
            }
            (other, _) => {
                return Err(ClientError::UnknownAttribute {
                    name: other.to_string(),
                })
            }
        }
        Ok(())
    }

    fn stop_events(&self) {
        let pusher = lock(&self.pusher).take();
        if let Some(pusher) = pusher {
            pusher.stop.store(true, Ordering::Release);
            let _ = pusher.handle.join();
        }
    }

    fn push_event(&self) {
        let attribute = lock(&self.event_attribute).clone();
        let value = self.read(&attribute).map_err(|e| e.to_string());
        let event = ChangeEvent {
            attribute: attribute.clone(),
            value,
        };

        let callbacks: Vec<EventCallback> = lock(&self.subscriptions)
            .values()
            .filter(|s| s.attribute == attribute)
            .map(|s| Arc::clone(&s.callback))
            .collect();
        for callback in callbacks {
            callback(&event);
        }
        self.counters.events.fetch_add(1, Ordering::Relaxed);
    }
}

/// Push interval for a period in milliseconds; `None` unless positive and representable.
fn event_period(ms: f64) -> Option<Duration> {
    if ms > 0.0 {
        Duration::try_from_secs_f64(ms / 1000.0).ok()
    } else {
        None
    }
}

fn start_events(state: &Arc<DeviceState>) {
    let mut pusher = lock(&state.pusher);
    if pusher.is_some() {
        return;
    }

    let stop = Arc::new(AtomicBool::new(false));
    let weak: Weak<DeviceState> = Arc::downgrade(state);
    let thread_stop = Arc::clone(&stop);
    let handle = thread::spawn(move || {
        while !thread_stop.load(Ordering::Acquire) {
            let Some(state) = weak.upgrade() else {
                break;
            };
            let period = event_period(*lock(&state.event_period_ms))
                .unwrap_or(Duration::from_millis(DEFAULT_EVENT_PERIOD_MS as u64));
            drop(state);
            thread::sleep(period);
            if thread_stop.load(Ordering::Acquire) {
                break;
            }
            match weak.upgrade() {
                Some(state) => state.push_event(),
                None => break,
            }
        }
    });

    *pusher = Some(EventPusher { stop, handle });
}

/// Handle to a loopback device shared by every session.
#[derive(Clone)]
pub struct LoopbackDevice {
    state: Arc<DeviceState>,
}

impl LoopbackDevice {
    pub fn new() -> Self {
        Self {
            state: Arc::new(DeviceState::new()),
        }
    }

    /// Take the device on or off line; offline devices refuse connections and calls.
    pub fn set_online(&self, online: bool) {
        self.state.online.store(online, Ordering::Release);
    }

    pub fn is_online(&self) -> bool {
        self.state.online.load(Ordering::Acquire)
    }

    /// Current value of a counter attribute such as `CommandCallsCount`.
    pub fn counter(&self, name: &str) -> Option<u64> {
        self.state
            .counters
            .by_name(name)
            .map(|c| c.load(Ordering::Relaxed))
    }

    /// Number of open event subscriptions.
    pub fn subscription_count(&self) -> usize {
        lock(&self.state.subscriptions).len()
    }

    /// Total calls received, including failed ones.
    pub fn call_count(&self) -> u64 {
        self.state.calls.load(Ordering::Relaxed)
    }
}

impl Default for LoopbackDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DeviceState {
    fn drop(&mut self) {
        if let Some(pusher) = self.pusher.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            pusher.stop.store(true, Ordering::Release);
        }
    }
}

/// Connector handing out sessions to one [`LoopbackDevice`].
#[derive(Clone)]
pub struct LoopbackConnector {
    device: LoopbackDevice,
    options: LoopbackOptions,
}

impl LoopbackConnector {
    pub fn new(options: LoopbackOptions) -> Self {
        Self::with_device(LoopbackDevice::new(), options)
    }

    pub fn with_device(device: LoopbackDevice, options: LoopbackOptions) -> Self {
        Self { device, options }
    }

    pub fn device(&self) -> &LoopbackDevice {
        &self.device
    }
}

impl Connector for LoopbackConnector {
    fn connect(&self, device: &DeviceName) -> Result<Box<dyn DeviceClient>, ClientError> {
        if !self.device.is_online() {
            return Err(ClientError::Connection {
                device: device.clone(),
                reason: "device is not exported".to_string(),
            });
        }
        tracing::debug!(device = %device, "Opened loopback session");
        Ok(Box::new(LoopbackClient {
            state: Arc::clone(&self.device.state),
            options: self.options,
        }))
    }
}

/// One session with the loopback device.
pub struct LoopbackClient {
    state: Arc<DeviceState>,
    options: LoopbackOptions,
}

impl LoopbackClient {
    /// Apply latency and fault injection for one call.
    fn enter(&self) -> Result<(), ClientError> {
        if !self.options.latency.is_zero() {
            thread::sleep(self.options.latency);
        }
        let call = self.state.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if !self.state.online.load(Ordering::Acquire) {
            return Err(ClientError::DeviceFailed {
                reason: "device is not exported".to_string(),
            });
        }
        match self.options.fail_every {
            Some(n) if n > 0 && call % n == 0 => Err(ClientError::InjectedFault { call }),
            _ => Ok(()),
        }
    }
}

impl DeviceClient for LoopbackClient {
    fn ping(&mut self) -> Result<(), ClientError> {
        self.enter()
    }

    fn read_attribute(&mut self, name: &str) -> Result<AttributeValue, ClientError> {
        self.enter()?;
        self.state.read(name)
    }

    fn write_attribute(&mut self, name: &str, value: &AttributeValue) -> Result<(), ClientError> {
        self.enter()?;
        self.state.write(name, value)
    }

    fn command_inout(&mut self, name: &str) -> Result<Option<AttributeValue>, ClientError> {
        self.enter()?;
        match name {
            BENCHMARK_COMMAND => {
                self.state
                    .counters
                    .command_calls
                    .fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            "ResetCounters" => {
                self.state.counters.reset();
                Ok(None)
            }
            "StartEvents" => {
                start_events(&self.state);
                Ok(None)
            }
            "StopEvents" => {
                self.state.stop_events();
                Ok(None)
            }
            other => Err(ClientError::UnknownCommand {
                name: other.to_string(),
            }),
        }
    }

    fn read_pipe(&mut self, name: &str) -> Result<PipeBlob, ClientError> {
        self.enter()?;
        if name != BENCHMARK_PIPE {
            return Err(ClientError::UnknownPipe {
                name: name.to_string(),
            });
        }
        self.state.counters.pipe_reads.fetch_add(1, Ordering::Relaxed);
        Ok(lock(&self.state.pipe).clone())
    }

    fn write_pipe(&mut self, name: &str, blob: &PipeBlob) -> Result<(), ClientError> {
        self.enter()?;
        if name != BENCHMARK_PIPE {
            return Err(ClientError::UnknownPipe {
                name: name.to_string(),
            });
        }
        self.state
            .counters
            .pipe_writes
            .fetch_add(1, Ordering::Relaxed);
        *lock(&self.state.pipe) = blob.clone();
        Ok(())
    }

    fn subscribe_event(
        &mut self,
        attribute: &str,
        callback: EventCallback,
    ) -> Result<SubscriptionId, ClientError> {
        self.enter()?;
        // Subscribing to an unknown attribute fails like a read would.
        if attribute != EVENT_ATTRIBUTE && attribute != EVENT_SLEEP_PERIOD {
            match attribute {
                SCALAR_ATTRIBUTE | SPECTRUM_ATTRIBUTE | IMAGE_ATTRIBUTE => {}
                other if self.state.counters.by_name(other).is_some() => {}
                other => {
                    return Err(ClientError::UnknownAttribute {
                        name: other.to_string(),
                    })
                }
            }
        }

        let id = self.state.next_subscription.fetch_add(1, Ordering::Relaxed);
        lock(&self.state.subscriptions).insert(
            id,
            Subscription {
                attribute: attribute.to_string(),
                callback,
            },
        );
        Ok(SubscriptionId(id))
    }

    fn unsubscribe_event(&mut self, id: SubscriptionId) -> Result<(), ClientError> {
        self.enter()?;
        match lock(&self.state.subscriptions).remove(&id.0) {
            Some(_) => Ok(()),
            None => Err(ClientError::UnknownSubscription { id: id.0 }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn device_name() -> DeviceName {
        DeviceName::new("test/loopback/1").unwrap()
    }

    #[test]
    fn test_read_write_echo() {
        let connector = LoopbackConnector::new(LoopbackOptions::default());
        let mut client = connector.connect(&device_name()).unwrap();

        client
            .write_attribute(SCALAR_ATTRIBUTE, &AttributeValue::Scalar(4.5))
            .unwrap();
        assert_eq!(
            client.read_attribute(SCALAR_ATTRIBUTE).unwrap(),
            AttributeValue::Scalar(4.5)
        );
        assert_eq!(connector.device().counter("ScalarWritesCount"), Some(1));
        assert_eq!(connector.device().counter("ScalarReadsCount"), Some(1));
        assert!(client
            .write_attribute(SCALAR_ATTRIBUTE, &AttributeValue::Text("x".into()))
            .is_err());
        assert!(client.read_attribute("NoSuchAttribute").is_err());
    }

    #[test]
    fn test_command_and_reset() {
        let connector = LoopbackConnector::new(LoopbackOptions::default());
        let mut client = connector.connect(&device_name()).unwrap();

        client.command_inout(BENCHMARK_COMMAND).unwrap();
        client.command_inout(BENCHMARK_COMMAND).unwrap();
        assert_eq!(
            client.read_attribute("CommandCallsCount").unwrap(),
            AttributeValue::Long(2)
        );
        client.command_inout("ResetCounters").unwrap();
        assert_eq!(connector.device().counter("CommandCallsCount"), Some(0));
        assert!(client.command_inout("Explode").is_err());
    }

    #[test]
    fn test_event_sleep_period_bounds() {
        let connector = LoopbackConnector::new(LoopbackOptions::default());
        let mut client = connector.connect(&device_name()).unwrap();

        client
            .write_attribute(EVENT_SLEEP_PERIOD, &AttributeValue::Scalar(2.5))
            .unwrap();
        for ms in [0.0, -1.0, f64::NAN, 1e300] {
            assert!(client
                .write_attribute(EVENT_SLEEP_PERIOD, &AttributeValue::Scalar(ms))
                .is_err());
        }
        assert!(client
            .write_attribute(EVENT_SLEEP_PERIOD, &AttributeValue::Long(i64::MAX))
            .is_ok());
        assert_eq!(
            client.read_attribute(EVENT_SLEEP_PERIOD).unwrap(),
            AttributeValue::Scalar(i64::MAX as f64)
        );
        assert_eq!(event_period(2.5), Some(Duration::from_micros(2500)));
        assert_eq!(event_period(1e300), None);
    }

    #[test]
    fn test_pipe_echo() {
        let connector = LoopbackConnector::new(LoopbackOptions::default());
        let mut client = connector.connect(&device_name()).unwrap();

        let blob = PipeBlob::benchmark_payload(3);
        client.write_pipe(BENCHMARK_PIPE, &blob).unwrap();
        assert_eq!(client.read_pipe(BENCHMARK_PIPE).unwrap(), blob);
        assert!(client.read_pipe("OtherPipe").is_err());
    }

    #[test]
    fn test_fault_injection_every_third_call() {
        let options = LoopbackOptions {
            fail_every: Some(3),
            ..Default::default()
        };
        let connector = LoopbackConnector::new(options);
        let mut client = connector.connect(&device_name()).unwrap();

        let outcomes: Vec<bool> = (0..6).map(|_| client.ping().is_ok()).collect();
        assert_eq!(outcomes, vec![true, true, false, true, true, false]);
    }

    #[test]
    fn test_latency_injection() {
        let options = LoopbackOptions {
            latency: Duration::from_millis(5),
            ..Default::default()
        };
        let connector = LoopbackConnector::new(options);
        let mut client = connector.connect(&device_name()).unwrap();

        let start = Instant::now();
        client.ping().unwrap();
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_offline_device_refuses_connections() {
        let connector = LoopbackConnector::new(LoopbackOptions::default());
        connector.device().set_online(false);
        assert!(connector.connect(&device_name()).is_err());
        connector.device().set_online(true);
        assert!(connector.connect(&device_name()).is_ok());
    }

    #[test]
    fn test_subscribe_and_push_events() {
        let connector = LoopbackConnector::new(LoopbackOptions::default());
        let mut client = connector.connect(&device_name()).unwrap();

        let received = Arc::new(AtomicU64::new(0));
        let sink = Arc::clone(&received);
        let id = client
            .subscribe_event(
                SCALAR_ATTRIBUTE,
                Arc::new(move |event: &ChangeEvent| {
                    if !event.is_error() {
                        sink.fetch_add(1, Ordering::Relaxed);
                    }
                }),
            )
            .unwrap();
        assert_eq!(connector.device().subscription_count(), 1);

        client
            .write_attribute(EVENT_SLEEP_PERIOD, &AttributeValue::Scalar(1.0))
            .unwrap();
        client.command_inout("StartEvents").unwrap();
        thread::sleep(Duration::from_millis(50));
        client.command_inout("StopEvents").unwrap();

        assert!(received.load(Ordering::Relaxed) > 0);
        client.unsubscribe_event(id).unwrap();
        assert_eq!(connector.device().subscription_count(), 0);
        assert!(client.unsubscribe_event(id).is_err());
    }
}
