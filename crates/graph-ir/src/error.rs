// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for graph loading and validation.

/// Errors that can occur when loading or validating a graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The graph manifest file could not be read.
    #[error("failed to read manifest: {0}")]
    ManifestReadError(#[from] std::io::Error),

    /// The manifest JSON is malformed.
    #[error("failed to parse manifest: {0}")]
    ManifestParseError(#[from] serde_json::Error),

    /// The SafeTensors constants file could not be loaded.
    #[error("failed to load constants: {0}")]
    ConstantsError(String),

    /// A constant tensor could not be built from its data.
    #[error("invalid constant '{name}': {source}")]
    InvalidConstant {
        name: String,
        #[source]
        source: tensor_core::TensorError,
    },

    /// A node definition is malformed.
    #[error("invalid node {index} ('{node}'): {detail}")]
    InvalidNode {
        index: usize,
        node: String,
        detail: String,
    },

    /// A node input names a value that nothing produces.
    #[error("node {index} ('{node}') reads '{value}', which is not produced by any node, graph input or initializer")]
    DanglingInput {
        index: usize,
        node: String,
        value: String,
    },

    /// A node reads a value produced by itself or by a later node.
    #[error("node {index} ('{node}') reads '{value}' before node {producer} produces it")]
    ForwardReference {
        index: usize,
        node: String,
        value: String,
        producer: usize,
    },

    /// Two nodes claim the same output value.
    #[error("value '{value}' is produced by both node {first} and node {second}")]
    DuplicateProducer {
        value: String,
        first: usize,
        second: usize,
    },

    /// The graph as a whole is malformed.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),
}
