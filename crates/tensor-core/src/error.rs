// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for tensor construction.

/// Errors that can occur when building a tensor value.
#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    /// The provided buffer size does not match the expected size for the given shape and dtype.
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// The number of values does not match the shape.
    #[error("shape {shape} needs {expected} values, got {actual}")]
    ElementCountMismatch {
        shape: String,
        expected: usize,
        actual: usize,
    },

    /// The requested data type is not supported for this access.
    #[error("unsupported dtype {dtype:?} for {op}")]
    UnsupportedDType {
        op: &'static str,
        dtype: crate::DType,
    },
}
