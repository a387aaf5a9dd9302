// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Static shapes of graph constants.

use std::fmt;

/// Static dimensions of a [`crate::Tensor`].
///
/// Constants carried by a graph always have fully known dimensions;
/// symbolic dimensions only appear in declared value types, which live in
/// the graph crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Creates a shape from the given dimensions.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::Shape;
    /// let w = Shape::new(vec![64, 3, 7, 7]);
    /// assert_eq!(w.rank(), 4);
    /// assert_eq!(w.num_elements(), 9408);
    /// ```
    pub fn new(dims: Vec<usize>) -> Self {
        Self { dims }
    }

    /// Rank-0 shape.
    pub fn scalar() -> Self {
        Self { dims: vec![] }
    }

    /// 1-D shape, e.g. a per-channel scale or bias.
    pub fn vector(len: usize) -> Self {
        Self { dims: vec![len] }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Returns the size of dimension `index`, or `None` if out of bounds.
    pub fn dim(&self, index: usize) -> Option<usize> {
        self.dims.get(index).copied()
    }

    /// Total element count, or `None` if it overflows `usize`.
    ///
    /// A scalar holds one element.
    pub fn checked_num_elements(&self) -> Option<usize> {
        self.dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    /// Total element count, saturating on overflow.
    pub fn num_elements(&self) -> usize {
        self.checked_num_elements().unwrap_or(usize::MAX)
    }

    /// Storage footprint in bytes for `dtype`, saturating on overflow.
    pub fn size_bytes(&self, dtype: super::DType) -> usize {
        self.num_elements().saturating_mul(dtype.size_bytes())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.dims.iter().map(usize::to_string).collect();
        write!(f, "[{}]", dims.join(", "))
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self::new(dims)
    }
}
