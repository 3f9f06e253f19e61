// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Remote device client seam.
//!
//! Workers drive a device exclusively through [`DeviceClient`]. Each worker
//! opens its own session through a [`Connector`], so one session's latency
//! never stalls another worker.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ValidationError};
use crate::types::DeviceName;

/// Largest number of elements a written spectrum or image may hold.
pub const MAX_VALUE_ELEMENTS: usize = 1 << 24;

/// Value read from or written to a device attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum AttributeValue {
    Scalar(f64),
    Spectrum(Vec<f64>),
    Image {
        rows: usize,
        cols: usize,
        data: Vec<f64>,
    },
    Long(i64),
    Text(String),
}

impl AttributeValue {
    /// Build a write value from the command-line notation.
    ///
    /// `values` is a comma-separated list of reals where a leading `m`
    /// stands for a minus sign (`m1.5` is -1.5). `shape` is empty, `n`
    /// or `rows,cols`; with a shape the values are cycled to fill it.
    pub fn from_notation(values: &str, shape: &str) -> Result<Self, ValidationError> {
        let parsed = values
            .replace('m', "-")
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|_| ValidationError::InvalidFieldValue {
                field: "value",
                value: values.to_string(),
                reason: "expected comma-separated numbers".to_string(),
            })?;

        let dims = if shape.trim().is_empty() {
            Vec::new()
        } else {
            shape
                .split(',')
                .map(|d| d.trim().parse::<usize>())
                .collect::<Result<Vec<usize>, _>>()
                .map_err(|_| ValidationError::InvalidFieldValue {
                    field: "shape",
                    value: shape.to_string(),
                    reason: "expected comma-separated sizes".to_string(),
                })?
        };

        let bad_shape = |reason: String| ValidationError::InvalidFieldValue {
            field: "shape",
            value: shape.to_string(),
            reason,
        };
        let elements = |len: Option<usize>| match len {
            Some(len) if len <= MAX_VALUE_ELEMENTS => Ok(len),
            _ => Err(bad_shape(format!(
                "more than {} elements requested",
                MAX_VALUE_ELEMENTS
            ))),
        };

        match dims.as_slice() {
            [] if parsed.len() == 1 => Ok(Self::Scalar(parsed[0])),
            [] => Ok(Self::Spectrum(parsed)),
            [len] => Ok(Self::Spectrum(cycle_fill(&parsed, elements(Some(*len))?))),
            [rows, cols] => Ok(Self::Image {
                rows: *rows,
                cols: *cols,
                data: cycle_fill(&parsed, elements(rows.checked_mul(*cols))?),
            }),
            _ => Err(bad_shape("at most two dimensions are supported".to_string())),
        }
    }

    /// Short type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Spectrum(_) => "spectrum",
            Self::Image { .. } => "image",
            Self::Long(_) => "long",
            Self::Text(_) => "text",
        }
    }
}

fn cycle_fill(values: &[f64], len: usize) -> Vec<f64> {
    values.iter().copied().cycle().take(len).collect()
}

impl Default for AttributeValue {
    fn default() -> Self {
        Self::Scalar(0.0)
    }
}

/// Typed value carried by one pipe element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum PipeValue {
    DevLong64(i64),
    DevULong(u32),
    DevVarUShortArray(Vec<u16>),
    DevVarDoubleArray(Vec<f64>),
    DevBoolean(bool),
}

impl PipeValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::DevLong64(_) => "DevLong64",
            Self::DevULong(_) => "DevULong",
            Self::DevVarUShortArray(_) => "DevVarUShortArray",
            Self::DevVarDoubleArray(_) => "DevVarDoubleArray",
            Self::DevBoolean(_) => "DevBoolean",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipeElement {
    pub name: String,
    pub value: PipeValue,
}

/// Named collection of pipe elements.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipeBlob {
    pub name: String,
    pub elements: Vec<PipeElement>,
}

impl PipeBlob {
    /// Benchmark payload with `size` elements (at least one).
    ///
    /// Elements cycle through one of each supported type and are named
    /// `<index>_<type>`.
    pub fn benchmark_payload(size: usize) -> Self {
        let template = [
            PipeValue::DevLong64(123),
            PipeValue::DevULong(123),
            PipeValue::DevVarUShortArray((0..5).collect()),
            PipeValue::DevVarDoubleArray(vec![1.11, 2.22]),
            PipeValue::DevBoolean(true),
        ];

        let elements = template
            .iter()
            .cycle()
            .take(size.max(1))
            .enumerate()
            .map(|(i, value)| PipeElement {
                name: format!("{}_{}", i, value.type_name()),
                value: value.clone(),
            })
            .collect();

        Self {
            name: "PipeBlob".to_string(),
            elements,
        }
    }
}

/// Identifier of an open event subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Change event delivered to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub attribute: String,
    /// `Err` carries the device-side error description.
    pub value: Result<AttributeValue, String>,
}

impl ChangeEvent {
    pub fn is_error(&self) -> bool {
        self.value.is_err()
    }
}

/// Callback invoked for each change event of a subscription.
pub type EventCallback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// One session with a remote device.
///
/// Every call either succeeds or reports a [`ClientError`]; implementations
/// must not panic on device-side failures.
pub trait DeviceClient: Send {
    /// Check that the device answers.
    fn ping(&mut self) -> Result<(), ClientError>;

    fn read_attribute(&mut self, name: &str) -> Result<AttributeValue, ClientError>;

    fn write_attribute(&mut self, name: &str, value: &AttributeValue) -> Result<(), ClientError>;

    /// Invoke a command without arguments.
    fn command_inout(&mut self, name: &str) -> Result<Option<AttributeValue>, ClientError>;

    fn read_pipe(&mut self, name: &str) -> Result<PipeBlob, ClientError>;

    fn write_pipe(&mut self, name: &str, blob: &PipeBlob) -> Result<(), ClientError>;

    /// Subscribe to change events of an attribute.
    fn subscribe_event(
        &mut self,
        attribute: &str,
        callback: EventCallback,
    ) -> Result<SubscriptionId, ClientError>;

    fn unsubscribe_event(&mut self, id: SubscriptionId) -> Result<(), ClientError>;
}

/// Opens device sessions.
pub trait Connector: Send + Sync {
    fn connect(&self, device: &DeviceName) -> Result<Box<dyn DeviceClient>, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_and_spectrum_values() {
        assert_eq!(
            AttributeValue::from_notation("0", "").unwrap(),
            AttributeValue::Scalar(0.0)
        );
        assert_eq!(
            AttributeValue::from_notation("1.5,m2", "").unwrap(),
            AttributeValue::Spectrum(vec![1.5, -2.0])
        );
    }

    #[test]
    fn test_shaped_values_cycle() {
        assert_eq!(
            AttributeValue::from_notation("1,2", "5").unwrap(),
            AttributeValue::Spectrum(vec![1.0, 2.0, 1.0, 2.0, 1.0])
        );
        assert_eq!(
            AttributeValue::from_notation("7", "2,3").unwrap(),
            AttributeValue::Image {
                rows: 2,
                cols: 3,
                data: vec![7.0; 6]
            }
        );
    }

    #[test]
    fn test_invalid_notation() {
        assert!(AttributeValue::from_notation("x", "").is_err());
        assert!(AttributeValue::from_notation("1", "a").is_err());
        assert!(AttributeValue::from_notation("1", "1,2,3").is_err());
    }

    #[test]
    fn test_oversized_shapes_are_rejected() {
        for shape in ["4294967296,4294967296", "100000000000", "8192,8192"] {
            let err = AttributeValue::from_notation("1", shape).unwrap_err();
            assert!(matches!(
                err,
                ValidationError::InvalidFieldValue { field: "shape", .. }
            ));
        }
        let value = AttributeValue::from_notation("1", "1024,1024").unwrap();
        assert!(matches!(value, AttributeValue::Image { rows: 1024, cols: 1024, .. }));
    }

    #[test]
    fn test_pipe_payload_size() {
        let blob = PipeBlob::benchmark_payload(7);
        assert_eq!(blob.name, "PipeBlob");
        assert_eq!(blob.elements.len(), 7);
        assert_eq!(blob.elements[0].name, "0_DevLong64");
        assert_eq!(blob.elements[5].name, "5_DevLong64");
        assert_eq!(blob.elements[6].value, PipeValue::DevULong(123));

        assert_eq!(PipeBlob::benchmark_payload(0).elements.len(), 1);
    }
}
