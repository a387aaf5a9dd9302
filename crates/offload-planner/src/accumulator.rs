// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The pending partition built up during the scan.
//!
//! # State Machine
//!
//! ```text
//!            accept(node)                 accept(node)
//! Empty ───────────────────▶ Accumulating ◀────────────┐
//!   ▲                            │  └──────────────────┘
//!   │        take() (flush)      │
//!   └────────────────────────────┘
//! ```
//!
//! Every accepted node either fuses into the tail member or becomes a new
//! member. The accumulator owns all bookkeeping for the pending partition:
//! boundary inputs, produced outputs, outputs consumed by another member,
//! the producer index and the merged attribute bag.

use crate::{ClusterMember, FusionRules, OffloadPolicy, PlannerError};
use graph_ir::graph::Validated;
use graph_ir::{AttributeValue, GraphView, NodeDef};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Accumulator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorState {
    /// No pending partition.
    Empty,
    /// At least one member is pending.
    Accumulating,
}

/// How an accepted node entered the pending partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    /// The node became a new member at this position.
    Appended(usize),
    /// The node was fused into the tail member at this position.
    Fused(usize),
}

/// Attribute key of the merged attribute bag.
///
/// Rendered as `{operator}-{position}-{attribute}`, where `operator` is the
/// first operator of the member's chain and `position` the member's
/// 1-based position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttributeKey {
    pub position: usize,
    pub op_type: String,
    pub name: String,
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.op_type, self.position, self.name)
    }
}

/// Mutable state of the partition under construction.
#[derive(Debug, Clone, Default)]
pub struct PartitionAccumulator {
    members: Vec<ClusterMember>,
    /// Boundary inputs, deduplicated, first-seen order.
    inputs: Vec<String>,
    /// Every first output produced by an accepted node, fused ones included.
    outputs: Vec<String>,
    /// Produced outputs read by a later accepted node.
    consumed_internal: Vec<String>,
    /// Member output name → member position.
    producers: HashMap<String, usize>,
    /// Graph indices of accepted nodes, scan order.
    node_indices: Vec<usize>,
    attributes: BTreeMap<AttributeKey, AttributeValue>,
}

impl PartitionAccumulator {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current state.
    pub fn state(&self) -> AccumulatorState {
        if self.members.is_empty() {
            AccumulatorState::Empty
        } else {
            AccumulatorState::Accumulating
        }
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[ClusterMember] {
        &self.members
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn consumed_internal(&self) -> &[String] {
        &self.consumed_internal
    }

    pub fn node_indices(&self) -> &[usize] {
        &self.node_indices
    }

    pub fn attributes(&self) -> &BTreeMap<AttributeKey, AttributeValue> {
        &self.attributes
    }

    /// Returns `true` if an accepted node produced `name`.
    pub fn produces(&self, name: &str) -> bool {
        self.outputs.iter().any(|o| o == name)
    }

    /// Returns the position of the member currently exposing `name`.
    pub fn producer_position(&self, name: &str) -> Option<usize> {
        self.producers.get(name).copied()
    }

    /// Returns the most recently added member.
    pub fn tail(&self) -> Option<&ClusterMember> {
        self.members.last()
    }

    /// Adds an eligible node to the pending partition.
    ///
    /// The node fuses into the tail member when a fusion rule matches the
    /// tail's chain and the node directly consumes the tail's output, which
    /// nothing else reads. Otherwise it becomes a new member.
    pub fn accept(
        &mut self,
        node: &NodeDef,
        graph: &GraphView<Validated>,
        rules: &FusionRules,
        policy: &dyn OffloadPolicy,
    ) -> Result<Extension, PlannerError> {
        let output = node
            .first_output()
            .ok_or_else(|| PlannerError::ContractViolation {
                index: node.index,
                node: node.name.clone(),
                detail: "offloaded node has no outputs".into(),
            })?
            .to_string();

        let fused = self
            .tail()
            .filter(|tail| Self::is_adjacent(tail, node, graph))
            .and_then(|tail| rules.try_fuse(&tail.composite, &node.op_type));

        self.node_indices.push(node.index);
        self.outputs.push(output.clone());

        let extension = match fused {
            Some(composite) => {
                let position = self.members.len() - 1;
                let extra_parents = self.parent_positions(node, Some(position));
                let tail = &mut self.members[position];
                let previous = tail.absorb(node, &output, composite);
                for parent in extra_parents {
                    if !tail.parents.contains(&parent) {
                        tail.parents.push(parent);
                    }
                }
                self.producers.remove(&previous);
                self.producers.insert(output, position);
                Extension::Fused(position)
            }
            None => {
                let position = self.members.len();
                let weight_name = policy
                    .weight_input(&node.op_type)
                    .and_then(|slot| node.inputs.get(slot))
                    .filter(|name| !name.is_empty())
                    .cloned();
                let parents = self.parent_positions(node, None);
                self.members.push(ClusterMember::fresh(
                    node,
                    &output,
                    self.inputs.len(),
                    parents,
                    weight_name,
                ));
                self.producers.insert(output, position);
                Extension::Appended(position)
            }
        };

        self.record_inputs(node);
        let position = match extension {
            Extension::Appended(p) | Extension::Fused(p) => p,
        };
        self.record_attributes(node, position);

        Ok(extension)
    }

    /// Takes the pending partition, leaving the accumulator empty.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    /// Fusion needs data adjacency: `node` reads the tail's output first,
    /// and no other consumer or graph output needs that value.
    fn is_adjacent(tail: &ClusterMember, node: &NodeDef, graph: &GraphView<Validated>) -> bool {
        node.first_input() == Some(tail.output_name.as_str())
            && graph.consumers_of(&tail.output_name).len() == 1
            && !graph.is_graph_output(&tail.output_name)
    }

    /// Positions of members producing `node`'s inputs, deduplicated.
    fn parent_positions(&self, node: &NodeDef, exclude: Option<usize>) -> Vec<usize> {
        let mut parents = Vec::new();
        for input in node.present_inputs() {
            if let Some(pos) = self.producer_position(input) {
                if Some(pos) != exclude && !parents.contains(&pos) {
                    parents.push(pos);
                }
            }
        }
        parents
    }

    /// Classifies the node's inputs as internal or boundary.
    fn record_inputs(&mut self, node: &NodeDef) {
        for input in node.present_inputs() {
            if self.produces(input) {
                if !self.consumed_internal.iter().any(|c| c == input) {
                    self.consumed_internal.push(input.to_string());
                }
            } else if !self.inputs.iter().any(|i| i == input) {
                self.inputs.push(input.to_string());
            }
        }
    }

    /// Merges the node's attributes under the member's key prefix.
    fn record_attributes(&mut self, node: &NodeDef, position: usize) {
        let op_type = self.members[position].base_op().to_string();
        for (name, value) in &node.attributes {
            self.attributes.insert(
                AttributeKey {
                    position: position + 1,
                    op_type: op_type.clone(),
                    name: name.clone(),
                },
                value.clone(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AllowListPolicy;
    use graph_ir::GraphBuilder;

    fn accept_all(graph: &GraphView<Validated>) -> PartitionAccumulator {
        let rules = FusionRules::standard();
        let policy = AllowListPolicy::default();
        let mut acc = PartitionAccumulator::new();
        for node in graph.iter_nodes() {
            acc.accept(node, graph, &rules, &policy).unwrap();
        }
        acc
    }

    #[test]
    fn test_empty_state() {
        let acc = PartitionAccumulator::new();
        assert_eq!(acc.state(), AccumulatorState::Empty);
        assert!(acc.tail().is_none());
    }

    #[test]
    fn test_conv_bn_relu_pool() {
        let g = GraphBuilder::new("stem")
            .input("x", "tensor(float)", &[1, 3, 8, 8])
            .node("Conv", &["x", "w"], &["c"])
            .attr("kernel_shape", AttributeValue::Ints(vec![3, 3]))
            .node("BatchNormalization", &["c", "s"], &["n"])
            .attr("epsilon", AttributeValue::Float(1e-5))
            .node("Relu", &["n"], &["r"])
            .node("MaxPool", &["r"], &["p"])
            .attr("kernel_shape", AttributeValue::Ints(vec![2, 2]))
            .output("p")
            .constant_f32("w", &[1], &[1.0])
            .constant_f32("s", &[1], &[1.0])
            .build()
            .unwrap();
        let acc = accept_all(&g);

        assert_eq!(acc.state(), AccumulatorState::Accumulating);
        assert_eq!(acc.members().len(), 2);
        let fused = &acc.members()[0];
        assert_eq!(fused.composite.to_string(), "Conv-BatchNormalization-Relu");
        assert_eq!(fused.output_name, "r");
        assert_eq!(fused.num_inputs, 3);
        assert_eq!(fused.input_start, 0);
        assert_eq!(fused.weight_name.as_deref(), Some("w"));

        let pool = &acc.members()[1];
        assert_eq!(pool.parents, vec![0]);
        assert_eq!(pool.input_start, 3);

        assert_eq!(acc.inputs(), &["x", "w", "s"]);
        assert_eq!(acc.outputs(), &["c", "n", "r", "p"]);
        assert_eq!(acc.consumed_internal(), &["c", "n", "r"]);
        assert_eq!(acc.node_indices(), &[0, 1, 2, 3]);
        assert_eq!(acc.producer_position("r"), Some(0));
        assert_eq!(acc.producer_position("c"), None);

        let keys: Vec<String> = acc.attributes().keys().map(|k| k.to_string()).collect();
        assert_eq!(
            keys,
            vec!["Conv-1-epsilon", "Conv-1-kernel_shape", "MaxPool-2-kernel_shape"]
        );
    }

    #[test]
    fn test_fusion_requires_single_consumer() {
        // Conv output also feeds the Sum, so the BN cannot absorb it.
        let g = GraphBuilder::new("skip")
            .input("x", "tensor(float)", &[1, 3, 8, 8])
            .node("Conv", &["x", "w"], &["c"])
            .node("BatchNormalization", &["c"], &["n"])
            .node("Sum", &["c", "n"], &["y"])
            .constant_f32("w", &[1], &[1.0])
            .build()
            .unwrap();
        let acc = accept_all(&g);
        let names: Vec<String> = acc
            .members()
            .iter()
            .map(|m| m.composite.to_string())
            .collect();
        assert_eq!(names, vec!["Conv", "BatchNormalization", "Sum"]);
        assert_eq!(acc.members()[2].parents, vec![0, 1]);
    }

    #[test]
    fn test_fusion_requires_data_adjacency() {
        // The Relu reads the graph input, not the Conv output.
        let g = GraphBuilder::new("side")
            .input("x", "tensor(float)", &[1, 3, 8, 8])
            .node("Conv", &["x", "w"], &["c"])
            .node("Relu", &["x"], &["r"])
            .constant_f32("w", &[1], &[1.0])
            .build()
            .unwrap();
        let acc = accept_all(&g);
        assert_eq!(acc.members().len(), 2);
        assert_eq!(acc.inputs(), &["x", "w"]);
        assert_eq!(acc.members()[1].input_start, 2);
    }

    #[test]
    fn test_duplicate_inputs_recorded_once() {
        let g = GraphBuilder::new("dup")
            .input("x", "tensor(float)", &[1, 3, 8, 8])
            .node("Sum", &["x", "x"], &["y"])
            .build()
            .unwrap();
        let acc = accept_all(&g);
        assert_eq!(acc.inputs(), &["x"]);
        assert_eq!(acc.members()[0].num_inputs, 2);
    }

    #[test]
    fn test_take_resets() {
        let g = GraphBuilder::new("one")
            .input("x", "tensor(float)", &[1, 3, 8, 8])
            .node("Relu", &["x"], &["y"])
            .build()
            .unwrap();
        let mut acc = accept_all(&g);
        let taken = acc.take();
        assert_eq!(taken.members().len(), 1);
        assert!(acc.is_empty());
        assert!(acc.inputs().is_empty());
        assert!(acc.attributes().is_empty());
    }

    #[test]
    fn test_attribute_key_display() {
        let key = AttributeKey {
            position: 3,
            op_type: "Conv".into(),
            name: "pads".into(),
        };
        assert_eq!(key.to_string(), "Conv-3-pads");
    }
}
