// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Incremental graph construction.

use crate::graph::{Loaded, Validated};
use crate::{AttributeValue, GraphError, GraphView, NodeDef, ValueInfo};
use std::collections::BTreeMap;
use tensor_core::Tensor;

/// Builder for constructing a [`GraphView`] node by node.
///
/// Nodes receive consecutive indices unless [`skip_indices`](Self::skip_indices)
/// is used to leave a gap.
///
/// # Example
/// ```
/// use graph_ir::GraphBuilder;
///
/// let graph = GraphBuilder::new("block")
///     .input("x", "tensor(float)", &[1, 3, 32, 32])
///     .node("Conv", &["x", "w"], &["c"])
///     .node("Relu", &["c"], &["y"])
///     .output("y")
///     .constant_f32("w", &[8, 3, 3, 3], &[0.0; 216])
///     .build()
///     .unwrap();
/// assert_eq!(graph.num_nodes(), 2);
/// ```
#[derive(Debug)]
pub struct GraphBuilder {
    name: String,
    next_index: usize,
    nodes: Vec<NodeDef>,
    inputs: Vec<ValueInfo>,
    outputs: Vec<ValueInfo>,
    value_info: Vec<ValueInfo>,
    initializers: BTreeMap<String, Tensor>,
    /// First misuse or bad constant, reported by `build`.
    error: Option<GraphError>,
}

impl GraphBuilder {
    /// Creates an empty builder.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            next_index: 0,
            nodes: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            value_info: Vec::new(),
            initializers: BTreeMap::new(),
            error: None,
        }
    }

    /// Declares a typed graph input with a static shape.
    pub fn input(mut self, name: &str, elem_type: &str, dims: &[usize]) -> Self {
        self.inputs.push(ValueInfo::new(name, elem_type, dims));
        self
    }

    /// Declares a graph input by value info.
    pub fn input_info(mut self, info: ValueInfo) -> Self {
        self.inputs.push(info);
        self
    }

    /// Declares a graph output.
    pub fn output(mut self, name: &str) -> Self {
        self.outputs.push(ValueInfo::untyped(name));
        self
    }

    /// Declares the type of an intermediate value.
    pub fn value(mut self, info: ValueInfo) -> Self {
        self.value_info.push(info);
        self
    }

    /// Appends a node at the next free index.
    pub fn node(mut self, op_type: &str, inputs: &[&str], outputs: &[&str]) -> Self {
        self.nodes
            .push(NodeDef::new(self.next_index, op_type, inputs, outputs));
        self.next_index += 1;
        self
    }

    /// Sets an attribute on the most recently added node.
    ///
    /// Calling this before any [`node`](Self::node) is reported by
    /// [`build`](Self::build).
    pub fn attr(mut self, key: &str, value: AttributeValue) -> Self {
        match self.nodes.last_mut() {
            Some(node) => {
                node.attributes.insert(key.to_string(), value);
            }
            None => self.record_error(GraphError::InvalidGraph(format!(
                "attribute '{key}' set before any node was added"
            ))),
        }
        self
    }

    /// Leaves `count` unused indices before the next node.
    pub fn skip_indices(mut self, count: usize) -> Self {
        self.next_index += count;
        self
    }

    /// Adds a constant tensor.
    pub fn constant(mut self, name: &str, tensor: Tensor) -> Self {
        self.initializers.insert(name.to_string(), tensor);
        self
    }

    /// Adds an `f32` constant tensor. A shape/data mismatch is reported by
    /// [`build`](Self::build).
    pub fn constant_f32(mut self, name: &str, dims: &[usize], values: &[f32]) -> Self {
        match Tensor::from_f32(dims.to_vec().into(), values) {
            Ok(t) => {
                self.initializers.insert(name.to_string(), t);
            }
            Err(source) => self.record_error(GraphError::InvalidConstant {
                name: name.to_string(),
                source,
            }),
        }
        self
    }

    fn record_error(&mut self, err: GraphError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// Returns the graph in the `Loaded` state without validating it.
    pub fn into_loaded(self) -> GraphView<Loaded> {
        GraphView::new(self.name, self.nodes, self.inputs, self.outputs)
            .with_value_info(self.value_info)
            .with_initializers(self.initializers)
    }

    /// Consumes the builder and returns the validated graph.
    pub fn build(mut self) -> Result<GraphView<Validated>, GraphError> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.into_loaded().validate()
    }
}
