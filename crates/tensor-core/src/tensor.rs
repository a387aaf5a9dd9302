// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Owned tensor values.

use crate::{DType, Shape, TensorError};

/// An owned, n-dimensional tensor stored in contiguous memory.
///
/// Graph initializers are held as `Tensor`s, and a partition that captures
/// an initializer receives a clone, never a reference into the graph.
///
/// # Memory Layout
/// Data is stored in row-major (C) order as a flat little-endian byte buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Shape,
    dtype: DType,
    data: Vec<u8>,
}

impl Tensor {
    /// Creates a zero-filled tensor.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{Tensor, Shape, DType};
    /// let bias = Tensor::zeros(Shape::vector(64), DType::F32);
    /// assert_eq!(bias.size_bytes(), 256);
    /// ```
    pub fn zeros(shape: Shape, dtype: DType) -> Self {
        let data = vec![0u8; shape.size_bytes(dtype)];
        Self { shape, dtype, data }
    }

    /// Wraps a raw little-endian buffer.
    ///
    /// The buffer length must equal `shape.size_bytes(dtype)`.
    pub fn from_bytes(shape: Shape, dtype: DType, data: Vec<u8>) -> Result<Self, TensorError> {
        let expected = shape
            .checked_num_elements()
            .and_then(|n| n.checked_mul(dtype.size_bytes()));
        if expected != Some(data.len()) {
            return Err(TensorError::BufferSizeMismatch {
                expected: shape.size_bytes(dtype),
                actual: data.len(),
            });
        }
        Ok(Self { shape, dtype, data })
    }

    /// Builds an `f32` tensor from values in row-major order.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{Tensor, Shape};
    /// let t = Tensor::from_f32(Shape::vector(3), &[1.0, 2.0, 3.0]).unwrap();
    /// assert_eq!(t.to_f32_vec().unwrap(), vec![1.0, 2.0, 3.0]);
    /// ```
    pub fn from_f32(shape: Shape, values: &[f32]) -> Result<Self, TensorError> {
        Self::from_elements(
            shape,
            DType::F32,
            values.len(),
            values.iter().flat_map(|v| v.to_le_bytes()),
        )
    }

    /// Builds an `i64` tensor from values in row-major order.
    pub fn from_i64(shape: Shape, values: &[i64]) -> Result<Self, TensorError> {
        Self::from_elements(
            shape,
            DType::I64,
            values.len(),
            values.iter().flat_map(|v| v.to_le_bytes()),
        )
    }

    fn from_elements(
        shape: Shape,
        dtype: DType,
        count: usize,
        bytes: impl Iterator<Item = u8>,
    ) -> Result<Self, TensorError> {
        if shape.checked_num_elements() != Some(count) {
            return Err(TensorError::ElementCountMismatch {
                shape: shape.to_string(),
                expected: shape.num_elements(),
                actual: count,
            });
        }
        Ok(Self {
            shape,
            dtype,
            data: bytes.collect(),
        })
    }

    /// Returns the tensor's shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the tensor's data type.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Returns the raw byte slice backing this tensor.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns the memory footprint of this tensor in bytes.
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Decodes the buffer as `f32` values.
    pub fn to_f32_vec(&self) -> Result<Vec<f32>, TensorError> {
        if self.dtype != DType::F32 {
            return Err(TensorError::UnsupportedDType {
                op: "to_f32_vec",
                dtype: self.dtype,
            });
        }
        Ok(self
            .data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Returns a one-line description, e.g. `f32[64, 3, 7, 7] (37632 B)`.
    pub fn summary(&self) -> String {
        format!("{}{} ({} B)", self.dtype, self.shape, self.size_bytes())
    }
}
