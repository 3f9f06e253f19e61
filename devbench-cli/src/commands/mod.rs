// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI command implementations.

pub mod bench;
pub mod suite;
pub mod validate;
