// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Owned tensor values and their descriptors, as needed by the offload
//! partitioner to capture graph-level constants.
//!
//! This crate provides:
//! - [`Tensor`]: an owned, n-dimensional tensor stored as a flat byte buffer.
//! - [`Shape`]: runtime shape descriptor.
//! - [`DType`]: supported element data types.
//!
//! Constants captured into a partition are deep copies: a [`Tensor`] never
//! borrows from the graph it was taken from, so a partition descriptor can
//! outlive the graph snapshot it was built from.

mod dtype;
mod error;
mod shape;
mod tensor;

pub use dtype::DType;
pub use error::TensorError;
pub use shape::Shape;
pub use tensor::Tensor;
