// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! JSON graph manifest parsing.
//!
//! The manifest (`graph.json`) lists the graph's nodes in execution order
//! together with its inputs, outputs and declared value types. Small
//! constants may be given inline; large ones live in `constants.safetensors`.
//!
//! # Format
//! ```json
//! {
//!   "name": "resnet-stem",
//!   "inputs": [{ "name": "x", "elem_type": "tensor(float)", "shape": [1, 3, 224, 224] }],
//!   "outputs": [{ "name": "pool0" }],
//!   "nodes": [
//!     { "op_type": "Conv", "inputs": ["x", "conv0.w"], "outputs": ["conv0"],
//!       "attributes": { "kernel_shape": { "ints": [7, 7] } } },
//!     { "op_type": "Relu", "inputs": ["conv0"], "outputs": ["relu0"] },
//!     { "op_type": "MaxPool", "inputs": ["relu0"], "outputs": ["pool0"] }
//!   ],
//!   "constants": [{ "name": "conv0.w", "dtype": "f32", "dims": [64, 3, 7, 7] }]
//! }
//! ```

use crate::{AttributeValue, GraphError, NodeDef, ValueInfo};
use std::collections::BTreeMap;
use std::path::Path;

/// Top-level graph manifest, deserialized from `graph.json`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GraphManifest {
    /// Human-readable graph name.
    pub name: String,
    /// Graph inputs.
    #[serde(default)]
    pub inputs: Vec<ValueInfo>,
    /// Graph outputs.
    #[serde(default)]
    pub outputs: Vec<ValueInfo>,
    /// Declared types of intermediate values.
    #[serde(default)]
    pub value_info: Vec<ValueInfo>,
    /// Nodes in execution order.
    pub nodes: Vec<ManifestNode>,
    /// Constant declarations.
    #[serde(default)]
    pub constants: Vec<ManifestConstant>,
}

/// A single node entry in the manifest.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestNode {
    /// Stable index; defaults to the entry's position in `nodes`.
    #[serde(default)]
    pub index: Option<usize>,
    /// Node name.
    #[serde(default)]
    pub name: Option<String>,
    /// Operator type.
    pub op_type: String,
    /// Input value names.
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Output value names.
    pub outputs: Vec<String>,
    /// Attributes.
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
}

/// A constant declared in the manifest.
///
/// With `values` present the constant is defined inline; otherwise its data
/// must be found under the same name in `constants.safetensors`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestConstant {
    /// Value name.
    pub name: String,
    /// Element type label (`"f32"`, `"i64"`, ...).
    #[serde(default = "default_dtype")]
    pub dtype: String,
    /// Dimensions.
    pub dims: Vec<usize>,
    /// Inline values (f32 or i64 constants only).
    #[serde(default)]
    pub values: Option<Vec<f64>>,
}

fn default_dtype() -> String {
    "f32".to_string()
}

impl GraphManifest {
    /// Loads a manifest from a JSON file path.
    pub fn from_file(path: &Path) -> Result<Self, GraphError> {
        let content = std::fs::read_to_string(path)?;
        let manifest: Self = serde_json::from_str(&content)?;
        Ok(manifest)
    }

    /// Parses a manifest from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        let manifest: Self = serde_json::from_str(json)?;
        Ok(manifest)
    }

    /// Validates that the manifest is internally consistent.
    ///
    /// Checks:
    /// - Every constant's dtype string is recognised.
    /// - No duplicate node names or constant names.
    ///
    /// Naming and wiring are checked later by [`crate::GraphView::validate`].
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut seen_nodes = std::collections::HashSet::new();
        for (pos, node) in self.nodes.iter().enumerate() {
            if let Some(name) = &node.name {
                if !name.is_empty() && !seen_nodes.insert(name) {
                    return Err(GraphError::InvalidNode {
                        index: node.index.unwrap_or(pos),
                        node: name.clone(),
                        detail: "duplicate node name".into(),
                    });
                }
            }
        }

        let mut seen_constants = std::collections::HashSet::new();
        for c in &self.constants {
            if !seen_constants.insert(&c.name) {
                return Err(GraphError::InvalidGraph(format!(
                    "duplicate constant '{}'",
                    c.name
                )));
            }
            if tensor_core::DType::from_str_loose(&c.dtype).is_none() {
                return Err(GraphError::InvalidGraph(format!(
                    "constant '{}' has unsupported dtype '{}'",
                    c.name, c.dtype
                )));
            }
        }

        Ok(())
    }

    /// Converts the manifest's node entries into [`NodeDef`]s.
    pub fn node_defs(&self) -> Vec<NodeDef> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(pos, n)| {
                let index = n.index.unwrap_or(pos);
                NodeDef {
                    index,
                    name: n
                        .name
                        .clone()
                        .unwrap_or_else(|| format!("{}_{index}", n.op_type.to_lowercase())),
                    op_type: n.op_type.clone(),
                    inputs: n.inputs.clone(),
                    outputs: n.outputs.clone(),
                    attributes: n.attributes.clone(),
                }
            })
            .collect()
    }
}
