// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Self-scaling precision for mean ± sd pairs.
//!
//! A value is shown with about two significant digits of its own
//! uncertainty: `digits = max(0, 2 - floor(log10(sd)))`.

use crate::metrics::Measurement;

/// Floor applied to non-positive or undefined deviations.
const SD_FLOOR: f64 = 1e-15;

/// Decimal places for a value with standard deviation `sd`.
pub fn decimal_places(sd: f64) -> usize {
    let sd = if sd > 0.0 { sd } else { SD_FLOOR };
    let digits = 2.0 - sd.log10().floor();
    if digits > 0.0 {
        digits as usize
    } else {
        0
    }
}

/// Render `value` with a fixed number of decimal places.
pub fn format_fixed(value: f64, digits: usize) -> String {
    format!("{:.*}", digits, value)
}

/// Render a measurement as `(mean, sd)` using the sd's own precision.
pub fn format_measurement(m: Measurement) -> (String, String) {
    let digits = decimal_places(m.sd);
    (format_fixed(m.mean, digits), format_fixed(m.sd, digits))
}
