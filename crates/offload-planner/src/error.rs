// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the offload planner.

/// Errors that can occur during partitioning.
///
/// Policy rejections and whole-graph fallback are not errors: they show up
/// as flushes and as [`crate::PartitionPlan::fallback`] respectively.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    /// The graph breaks an assumption the partitioner relies on.
    #[error("contract violation at node {index} ('{node}'): {detail}")]
    ContractViolation {
        index: usize,
        node: String,
        detail: String,
    },

    /// A produced plan failed its consistency checks.
    #[error("invalid plan for graph '{graph}': {detail}")]
    InvalidPlan { graph: String, detail: String },

    /// The partitioner configuration is invalid or unreadable.
    #[error("configuration error: {0}")]
    Config(String),

    /// The graph could not be loaded or validated.
    #[error("graph error: {0}")]
    Graph(#[from] graph_ir::GraphError),
}
