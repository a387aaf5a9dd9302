// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Partition plan: the output of the partitioner.
//!
//! A plan is a list of [`PartitionDescriptor`]s plus the nodes left to
//! default scheduling. Descriptors are self-contained: they carry deep
//! copies of captured constants and hold no reference into the graph.

use crate::{ClusterMember, FallbackReason, PlannerError};
use graph_ir::graph::Validated;
use graph_ir::{AttributeValue, GraphView};
use std::collections::{BTreeMap, HashMap, HashSet};
use tensor_core::Tensor;

/// One partition handed to the accelerator.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PartitionDescriptor {
    /// Unique, monotonically increasing partition id.
    pub id: usize,
    /// Partition name (`{prefix}{id}`).
    pub name: String,
    /// Key of the graph this partition was cut from.
    pub graph_key: String,
    /// Absorbed graph node indices, scan order.
    pub node_indices: Vec<usize>,
    /// Boundary inputs, first-seen order.
    pub inputs: Vec<String>,
    /// Boundary outputs, slot order.
    pub outputs: Vec<String>,
    /// Offload units, in partition order.
    pub members: Vec<ClusterMember>,
    /// Constants captured by value, keyed by value name.
    #[serde(serialize_with = "serialize_captures")]
    pub captures: BTreeMap<String, Tensor>,
    /// Merged attributes keyed `{operator}-{position}-{attribute}`.
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl PartitionDescriptor {
    /// Returns the number of absorbed graph nodes.
    pub fn num_nodes(&self) -> usize {
        self.node_indices.len()
    }

    /// Returns the total size of captured constants in bytes.
    pub fn capture_bytes(&self) -> usize {
        self.captures.values().map(Tensor::size_bytes).sum()
    }

    /// Returns the hyphen-joined composite types of all members.
    pub fn member_types(&self) -> Vec<String> {
        self.members.iter().map(|m| m.composite.to_string()).collect()
    }

    /// Returns a concise summary string for display.
    pub fn summary(&self) -> String {
        format!(
            "{} : {} nodes {:?}, {} in / {} out, {} members [{}], {} captures ({:.1} KB)",
            self.name,
            self.num_nodes(),
            self.node_indices,
            self.inputs.len(),
            self.outputs.len(),
            self.members.len(),
            self.member_types().join(", "),
            self.captures.len(),
            self.capture_bytes() as f64 / 1024.0,
        )
    }
}

/// Captured tensors serialise as their summaries; raw data stays out of JSON.
fn serialize_captures<S: serde::Serializer>(
    captures: &BTreeMap<String, Tensor>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(captures.iter().map(|(name, t)| (name, t.summary())))
}

/// The result of one partitioning pass.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PartitionPlan {
    /// Name of the partitioned graph.
    pub graph_name: String,
    /// Emitted partitions, in emission order.
    pub partitions: Vec<PartitionDescriptor>,
    /// Node indices left to default scheduling, index order.
    pub rejected_nodes: Vec<usize>,
    /// Set when the whole graph fell back to default scheduling.
    pub fallback: Option<FallbackReason>,
}

impl PartitionPlan {
    /// A plan that offloads nothing.
    pub fn fallback(graph: &GraphView<Validated>, reason: FallbackReason) -> Self {
        Self {
            graph_name: graph.name.clone(),
            partitions: Vec::new(),
            rejected_nodes: graph.iter_nodes().map(|n| n.index).collect(),
            fallback: Some(reason),
        }
    }

    /// Returns the number of partitions.
    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    /// Returns the number of nodes assigned to partitions.
    pub fn num_offloaded_nodes(&self) -> usize {
        self.partitions.iter().map(|p| p.num_nodes()).sum()
    }

    /// Returns `true` if the pass fell back for the whole graph.
    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Finds the partition that absorbed `node_index`.
    pub fn partition_of(&self, node_index: usize) -> Option<&PartitionDescriptor> {
        self.partitions
            .iter()
            .find(|p| p.node_indices.contains(&node_index))
    }

    /// Validates the plan against the graph it was produced from.
    ///
    /// Checks:
    /// - Every graph node is either absorbed by exactly one partition or
    ///   rejected, never both; no unknown indices.
    /// - Partition ids are strictly increasing; absorbed indices are in
    ///   scan order.
    /// - No boundary input is produced inside its own partition, and each
    ///   is produced elsewhere, a graph input or a constant.
    /// - Boundary outputs are unique, each is owned by exactly one member
    ///   whose slot points back at it.
    /// - Captures are exactly the boundary inputs that are constants.
    pub fn validate(&self, graph: &GraphView<Validated>) -> Result<(), PlannerError> {
        let fail = |detail: String| PlannerError::InvalidPlan {
            graph: self.graph_name.clone(),
            detail,
        };

        // Coverage.
        let mut owner: HashMap<usize, String> = HashMap::new();
        for p in &self.partitions {
            for &i in &p.node_indices {
                if let Some(prev) = owner.insert(i, p.name.clone()) {
                    return Err(fail(format!(
                        "node {i} is claimed by both {prev} and {}",
                        p.name
                    )));
                }
            }
        }
        for &i in &self.rejected_nodes {
            if let Some(prev) = owner.insert(i, "the rejected list".to_string()) {
                return Err(fail(format!("node {i} is both in {prev} and rejected")));
            }
        }
        for node in graph.iter_nodes() {
            if !owner.contains_key(&node.index) {
                return Err(fail(format!("node {} is not covered", node.index)));
            }
        }
        if owner.len() != graph.num_nodes() {
            return Err(fail("plan refers to nodes the graph does not have".into()));
        }

        let graph_inputs: HashSet<&str> = graph.inputs.iter().map(|v| v.name.as_str()).collect();

        let mut last_id = None;
        for p in &self.partitions {
            if last_id.is_some_and(|last| p.id <= last) {
                return Err(fail(format!("partition id {} is not increasing", p.id)));
            }
            last_id = Some(p.id);

            if p.node_indices.windows(2).any(|w| w[0] >= w[1]) {
                return Err(fail(format!("{} lists nodes out of scan order", p.name)));
            }

            // Closure.
            let absorbed: HashSet<usize> = p.node_indices.iter().copied().collect();
            for input in &p.inputs {
                match graph.producer_of(input) {
                    Some(producer) if absorbed.contains(&producer) => {
                        return Err(fail(format!(
                            "{} input '{input}' is produced inside the partition",
                            p.name
                        )));
                    }
                    Some(_) => {}
                    None => {
                        if !graph_inputs.contains(input.as_str()) && !graph.is_initializer(input)
                        {
                            return Err(fail(format!(
                                "{} input '{input}' has no producer",
                                p.name
                            )));
                        }
                    }
                }
            }

            // Output slots.
            let mut seen = HashSet::new();
            for out in &p.outputs {
                if !seen.insert(out.as_str()) {
                    return Err(fail(format!("{} exposes '{out}' twice", p.name)));
                }
            }
            let mut slot_owners = vec![0usize; p.outputs.len()];
            for m in &p.members {
                if let Some(slot) = m.output_slot {
                    match p.outputs.get(slot) {
                        Some(name) if *name == m.output_name => slot_owners[slot] += 1,
                        _ => {
                            return Err(fail(format!(
                                "{} member '{}' has a stale output slot {slot}",
                                p.name, m.output_name
                            )))
                        }
                    }
                }
            }
            if let Some(slot) = slot_owners.iter().position(|&n| n != 1) {
                return Err(fail(format!(
                    "{} output slot {slot} is owned by {} members",
                    p.name, slot_owners[slot]
                )));
            }

            // Captures.
            for name in p.captures.keys() {
                if !p.inputs.contains(name) || !graph.is_initializer(name) {
                    return Err(fail(format!(
                        "{} captures '{name}', which is not a constant input",
                        p.name
                    )));
                }
            }
            if let Some(missing) = p
                .inputs
                .iter()
                .find(|i| graph.is_initializer(i) && !p.captures.contains_key(*i))
            {
                return Err(fail(format!(
                    "{} does not capture constant input '{missing}'",
                    p.name
                )));
            }
        }

        Ok(())
    }

    /// Returns a human-readable summary of the plan.
    pub fn summary(&self) -> String {
        if let Some(reason) = &self.fallback {
            return format!(
                "Plan for '{}': fallback to default scheduling ({reason}), {} nodes",
                self.graph_name,
                self.rejected_nodes.len(),
            );
        }
        let total = self.num_offloaded_nodes() + self.rejected_nodes.len();
        let sizes: Vec<usize> = self.partitions.iter().map(|p| p.num_nodes()).collect();
        format!(
            "Plan for '{}': {} partitions covering {}/{} nodes, {} rejected, partition sizes: {:?}",
            self.graph_name,
            self.num_partitions(),
            self.num_offloaded_nodes(),
            total,
            self.rejected_nodes.len(),
            sizes,
        )
    }
}
