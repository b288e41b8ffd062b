// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Data models for measurements, annotation records and exports.

pub mod annotation;
pub mod measurement;
pub mod project;
