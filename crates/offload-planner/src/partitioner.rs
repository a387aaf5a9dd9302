// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The partitioning pass.
//!
//! A single left-to-right scan over the graph's nodes in index order:
//!
//! ```text
//! for each node:
//!     rejected by policy   → flush pending partition, leave node to the host
//!     accepted             → fuse into tail member, or append a new member
//!                            continuation check fails → flush
//!                            else fan-out check fails → flush
//! end of scan              → flush pending partition
//! ```
//!
//! Every flush resolves the boundary of the pending partition and emits a
//! [`PartitionDescriptor`](crate::PartitionDescriptor) with the next id.

use crate::lookahead::{continuation_break, fan_out_break};
use crate::registry::PartitionEmitter;
use crate::{
    AllowListPolicy, BoundaryResolver, Extension, FusionRules, GlobalGate, OffloadPolicy,
    PartitionAccumulator, PartitionDescriptor, PartitionPlan, PartitionRegistry,
    PartitionerConfig, PlannerError,
};
use graph_ir::graph::Validated;
use graph_ir::GraphView;
use std::collections::HashSet;
use std::fmt;

/// What ended a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushTrigger {
    /// The policy rejected this node.
    Rejected(usize),
    /// The next node reads a value from outside the partition.
    Continuation(usize),
    /// A branch reaches this unsupported node before rejoining.
    FanOut(usize),
    EndOfScan,
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(i) => write!(f, "node {i} rejected"),
            Self::Continuation(i) => write!(f, "node {i} reads outside the partition"),
            Self::FanOut(i) => write!(f, "branch reaches unsupported node {i}"),
            Self::EndOfScan => write!(f, "end of scan"),
        }
    }
}

/// Graph partitioner for accelerator offload.
///
/// Owns its policy, fusion table and partition registry. Partition ids keep
/// increasing across passes for as long as the partitioner lives, and
/// [`metadata`](PartitionRegistry::metadata) lookups stay valid for every
/// id it has emitted.
///
/// # Example
/// ```
/// use graph_ir::GraphBuilder;
/// use offload_planner::{Partitioner, PartitionerConfig};
///
/// let graph = GraphBuilder::new("stem")
///     .input("x", "tensor(float)", &[1, 3, 32, 32])
///     .node("Conv", &["x", "w"], &["c"])
///     .node("Relu", &["c"], &["r"])
///     .node("MaxPool", &["r"], &["y"])
///     .output("y")
///     .constant_f32("w", &[8, 3, 3, 3], &[0.0; 216])
///     .build()
///     .unwrap();
///
/// let mut partitioner = Partitioner::new(PartitionerConfig::default()).unwrap();
/// let plan = partitioner.partition(&graph).unwrap();
/// println!("{}", plan.summary());
/// ```
pub struct Partitioner {
    config: PartitionerConfig,
    policy: Box<dyn OffloadPolicy>,
    fusion: FusionRules,
    registry: PartitionRegistry,
}

impl Partitioner {
    /// Creates a partitioner with the allow-list policy from `config`.
    pub fn new(config: PartitionerConfig) -> Result<Self, PlannerError> {
        let policy = Box::new(AllowListPolicy::from_config(&config));
        Self::with_policy(config, policy)
    }

    /// Creates a partitioner with a caller-supplied policy.
    pub fn with_policy(
        config: PartitionerConfig,
        policy: Box<dyn OffloadPolicy>,
    ) -> Result<Self, PlannerError> {
        config.validate()?;
        let fusion = FusionRules::from_config(&config);
        tracing::debug!("partitioner created with policy '{}'", policy.name());
        Ok(Self {
            config,
            policy,
            fusion,
            registry: PartitionRegistry::new(),
        })
    }

    pub fn config(&self) -> &PartitionerConfig {
        &self.config
    }

    pub fn policy(&self) -> &dyn OffloadPolicy {
        self.policy.as_ref()
    }

    /// The id → metadata registry of every partition emitted so far.
    pub fn registry(&self) -> &PartitionRegistry {
        &self.registry
    }

    /// Partitions `graph`.
    ///
    /// Returns a fallback plan (no partitions, every node rejected) when the
    /// global gate trips.
    pub fn partition(
        &mut self,
        graph: &GraphView<Validated>,
    ) -> Result<PartitionPlan, PlannerError> {
        if let Some(reason) = GlobalGate::evaluate(graph, self.policy.as_ref(), &self.config) {
            tracing::info!(
                "graph '{}': falling back to default scheduling ({reason})",
                graph.name
            );
            return Ok(PartitionPlan::fallback(graph, reason));
        }

        let policy = self.policy.as_ref();
        let graph_key = graph.graph_key();
        let mut emitter =
            PartitionEmitter::new(&mut self.registry, &self.config.partition_prefix, &graph_key);
        let mut pending = PartitionAccumulator::new();
        let mut partitions = Vec::new();

        for node in graph.iter_nodes() {
            if !policy.supports(node, graph) {
                tracing::trace!("node {} ({}) rejected", node.index, node.op_type);
                if !pending.is_empty() {
                    flush(
                        &mut pending,
                        graph,
                        &mut emitter,
                        &mut partitions,
                        FlushTrigger::Rejected(node.index),
                    );
                }
                continue;
            }

            match pending.accept(node, graph, &self.fusion, policy)? {
                Extension::Appended(pos) => tracing::trace!(
                    "node {} ({}) appended as member {}",
                    node.index,
                    node.op_type,
                    pos + 1
                ),
                Extension::Fused(pos) => tracing::trace!(
                    "node {} ({}) fused into member {} ({})",
                    node.index,
                    node.op_type,
                    pos + 1,
                    pending.members()[pos].composite
                ),
            }

            let trigger = continuation_break(graph, policy, node, &pending)
                .map(FlushTrigger::Continuation)
                .or_else(|| fan_out_break(graph, policy, node).map(FlushTrigger::FanOut));
            if let Some(trigger) = trigger {
                flush(&mut pending, graph, &mut emitter, &mut partitions, trigger);
            }
        }

        if !pending.is_empty() {
            flush(
                &mut pending,
                graph,
                &mut emitter,
                &mut partitions,
                FlushTrigger::EndOfScan,
            );
        }

        let absorbed: HashSet<usize> = partitions
            .iter()
            .flat_map(|p| p.node_indices.iter().copied())
            .collect();
        let rejected_nodes = graph
            .iter_nodes()
            .map(|n| n.index)
            .filter(|i| !absorbed.contains(i))
            .collect();

        let plan = PartitionPlan {
            graph_name: graph.name.clone(),
            partitions,
            rejected_nodes,
            fallback: None,
        };
        tracing::info!("{}", plan.summary());
        Ok(plan)
    }
}

impl fmt::Debug for Partitioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Partitioner")
            .field("config", &self.config)
            .field("policy", &self.policy.name())
            .field("registry", &self.registry)
            .finish()
    }
}

/// Resolves and emits the pending partition, leaving `pending` empty.
fn flush(
    pending: &mut PartitionAccumulator,
    graph: &GraphView<Validated>,
    emitter: &mut PartitionEmitter<'_>,
    partitions: &mut Vec<PartitionDescriptor>,
    trigger: FlushTrigger,
) {
    let resolved = BoundaryResolver::resolve(pending.take(), graph);
    let descriptor = emitter.emit(resolved);
    tracing::debug!(
        "flush ({trigger}): {} nodes {:?}, {} inputs, {} outputs",
        descriptor.name,
        descriptor.node_indices,
        descriptor.inputs.len(),
        descriptor.outputs.len(),
    );
    partitions.push(descriptor);
}
