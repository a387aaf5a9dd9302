// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Boundary resolution for a finished partition.

use crate::{ClusterMember, PartitionAccumulator};
use graph_ir::graph::Validated;
use graph_ir::{AttributeValue, GraphView};
use std::collections::{BTreeMap, HashSet};
use tensor_core::Tensor;

/// A finished partition with its boundary resolved, ready to be emitted.
#[derive(Debug, Clone)]
pub struct ResolvedCluster {
    /// Graph indices of absorbed nodes, scan order.
    pub node_indices: Vec<usize>,
    /// Members with their output slots assigned.
    pub members: Vec<ClusterMember>,
    /// Boundary inputs, first-seen order.
    pub inputs: Vec<String>,
    /// Boundary outputs, slot order.
    pub outputs: Vec<String>,
    /// Deep copies of every boundary input that is a graph-level constant.
    pub captures: BTreeMap<String, Tensor>,
    /// Merged attribute bag with rendered keys.
    pub attributes: BTreeMap<String, AttributeValue>,
}

/// Computes the external interface of a finished partition.
pub struct BoundaryResolver;

impl BoundaryResolver {
    /// Resolves the boundary of the pending partition held by `pending`.
    ///
    /// A member's output becomes a boundary output when no other member
    /// reads it, when a node outside the partition also reads it, or when
    /// it is a graph output. Slots are assigned in member order.
    pub fn resolve(pending: PartitionAccumulator, graph: &GraphView<Validated>) -> ResolvedCluster {
        let absorbed: HashSet<usize> = pending.node_indices().iter().copied().collect();
        let consumed_internal: HashSet<&str> =
            pending.consumed_internal().iter().map(String::as_str).collect();

        let mut members = pending.members().to_vec();
        let mut outputs = Vec::new();
        for member in &mut members {
            let name = member.output_name.as_str();
            let read_outside = graph
                .consumers_of(name)
                .iter()
                .any(|consumer| !absorbed.contains(consumer));
            if !consumed_internal.contains(name) || read_outside || graph.is_graph_output(name) {
                member.output_slot = Some(outputs.len());
                outputs.push(name.to_string());
            }
        }

        let inputs = pending.inputs().to_vec();
        let captures: BTreeMap<String, Tensor> = inputs
            .iter()
            .filter_map(|name| graph.initializer(name).map(|t| (name.clone(), t.clone())))
            .collect();

        let attributes = pending
            .attributes()
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect();

        ResolvedCluster {
            node_indices: pending.node_indices().to_vec(),
            members,
            inputs,
            outputs,
            captures,
            attributes,
        }
    }
}
