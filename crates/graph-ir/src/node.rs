// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Node, attribute and value descriptors for the graph IR.
//!
//! A [`NodeDef`] names its operands: inputs and outputs are value names,
//! and producer/consumer relationships are recovered by matching names.
//! An empty input name stands for an omitted optional input.

use std::collections::BTreeMap;

/// A typed operator attribute value.
///
/// Serialised externally tagged, e.g. `{"ints": [3, 3]}` or `{"float": 1e-5}`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeValue {
    /// A single 64-bit integer.
    Int(i64),
    /// A single float.
    Float(f32),
    /// A string.
    String(String),
    /// A list of integers (`kernel_shape`, `pads`, `strides`, ...).
    Ints(Vec<i64>),
    /// A list of floats.
    Floats(Vec<f32>),
    /// A list of strings.
    Strings(Vec<String>),
}

impl AttributeValue {
    /// Returns a short type label (`"int"`, `"ints"`, ...).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Ints(_) => "ints",
            Self::Floats(_) => "floats",
            Self::Strings(_) => "strings",
        }
    }
}

/// A single operator node in the graph.
///
/// `index` is the node's stable identity: it is what a partition reports
/// back to the host graph, so it survives any reordering of the node list.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NodeDef {
    /// Stable graph index.
    pub index: usize,
    /// Node name (may be empty in exported graphs).
    #[serde(default)]
    pub name: String,
    /// Operator type, e.g. `"Conv"`.
    pub op_type: String,
    /// Ordered input value names. `""` marks an omitted optional input.
    pub inputs: Vec<String>,
    /// Ordered output value names.
    pub outputs: Vec<String>,
    /// Attribute map, ordered by key.
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl NodeDef {
    /// Creates a node without attributes.
    pub fn new(index: usize, op_type: &str, inputs: &[&str], outputs: &[&str]) -> Self {
        Self {
            index,
            name: format!("{}_{index}", op_type.to_lowercase()),
            op_type: op_type.to_string(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            attributes: BTreeMap::new(),
        }
    }

    /// Returns the first input name, if the node has one and it is not omitted.
    pub fn first_input(&self) -> Option<&str> {
        self.inputs
            .first()
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Returns the first output name.
    pub fn first_output(&self) -> Option<&str> {
        self.outputs.first().map(String::as_str)
    }

    /// Iterates over the inputs that are actually wired (skips omitted ones).
    pub fn present_inputs(&self) -> impl Iterator<Item = &str> {
        self.inputs
            .iter()
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Returns a concise summary string for display.
    pub fn summary(&self) -> String {
        format!(
            "[{}] {} ({}) {:?} -> {:?}",
            self.index, self.name, self.op_type, self.inputs, self.outputs,
        )
    }
}

/// Declared type information for a value (graph input, output or intermediate).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ValueInfo {
    /// Value name.
    pub name: String,
    /// Declared type string, e.g. `"tensor(float)"` or `"tensor(float16)"`.
    #[serde(default)]
    pub elem_type: Option<String>,
    /// Declared dimensions; `null` entries are symbolic. `None` means unknown rank.
    #[serde(default)]
    pub shape: Option<Vec<Option<usize>>>,
}

impl ValueInfo {
    /// Creates a fully typed value with a static shape.
    pub fn new(name: &str, elem_type: &str, dims: &[usize]) -> Self {
        Self {
            name: name.to_string(),
            elem_type: Some(elem_type.to_string()),
            shape: Some(dims.iter().map(|&d| Some(d)).collect()),
        }
    }

    /// Creates a value known only by name.
    pub fn untyped(name: &str) -> Self {
        Self {
            name: name.to_string(),
            elem_type: None,
            shape: None,
        }
    }

    /// Returns the declared rank, if the shape is known.
    pub fn rank(&self) -> Option<usize> {
        self.shape.as_ref().map(Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_node() {
        let n = NodeDef::new(3, "Conv", &["x", "w"], &["y"]);
        assert_eq!(n.name, "conv_3");
        assert_eq!(n.first_input(), Some("x"));
        assert_eq!(n.first_output(), Some("y"));
    }

    #[test]
    fn test_present_inputs_skip_omitted() {
        let n = NodeDef::new(0, "Conv", &["x", "w", ""], &["y"]);
        let present: Vec<_> = n.present_inputs().collect();
        assert_eq!(present, vec!["x", "w"]);

        let n = NodeDef::new(0, "Resize", &["", "roi"], &["y"]);
        assert_eq!(n.first_input(), None);
    }

    #[test]
    fn test_summary() {
        let n = NodeDef::new(7, "Relu", &["a"], &["b"]);
        let s = n.summary();
        assert!(s.contains("[7]"));
        assert!(s.contains("Relu"));
    }

    #[test]
    fn test_attribute_serde_tagged() {
        let v = AttributeValue::Ints(vec![3, 3]);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"ints":[3,3]}"#);
        let back: AttributeValue = serde_json::from_str(r#"{"float":0.5}"#).unwrap();
        assert_eq!(back, AttributeValue::Float(0.5));
        assert_eq!(back.kind(), "float");
    }

    #[test]
    fn test_value_info_rank() {
        let v = ValueInfo::new("x", "tensor(float)", &[1, 3, 224, 224]);
        assert_eq!(v.rank(), Some(4));
        assert_eq!(ValueInfo::untyped("y").rank(), None);

        let sym: ValueInfo =
            serde_json::from_str(r#"{"name":"z","shape":[null,3,null]}"#).unwrap();
        assert_eq!(sym.rank(), Some(3));
        assert_eq!(sym.elem_type, None);
    }
}
