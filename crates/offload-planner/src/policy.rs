// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Offload eligibility: per-node predicates and the whole-graph gate.
//!
//! Which operators the accelerator can run is decided outside this crate;
//! [`OffloadPolicy`] is the seam through which that table is supplied.
//! [`AllowListPolicy`] is the configurable default.
//!
//! Before the scan, [`GlobalGate`] decides whether partitioning happens at
//! all. When it trips, the caller schedules every node individually.

use crate::PartitionerConfig;
use graph_ir::graph::Validated;
use graph_ir::{GraphView, NodeDef};
use std::collections::HashSet;
use std::fmt;

/// Decides which nodes the accelerator can take.
///
/// Implementations are pure predicates: no I/O and no interior state, so a
/// pass over the same graph always makes the same decisions.
pub trait OffloadPolicy: Send + Sync {
    /// Human-readable name of this policy.
    fn name(&self) -> &str;

    /// Returns `true` if the operator type is on the accelerator's allow-list.
    fn supports_op(&self, op_type: &str) -> bool;

    /// Returns `true` if the node's tensor ranks/shapes are acceptable.
    fn supports_dimensions(&self, node: &NodeDef, graph: &GraphView<Validated>) -> bool;

    /// Returns `true` for elementwise ops with a variable number of inputs,
    /// all of which must already be produced inside a partition to extend it.
    fn is_variadic(&self, _op_type: &str) -> bool {
        false
    }

    /// Input slot holding the operator's weight tensor, if it has one.
    fn weight_input(&self, _op_type: &str) -> Option<usize> {
        None
    }

    /// Full per-node verdict: dimensions, allow-list and output wiring.
    ///
    /// A partition member exposes a single output, so a node whose
    /// secondary outputs are read anywhere is kept off the accelerator.
    fn supports(&self, node: &NodeDef, graph: &GraphView<Validated>) -> bool {
        self.supports_dimensions(node, graph)
            && self.supports_op(&node.op_type)
            && node
                .outputs
                .iter()
                .skip(1)
                .all(|out| graph.consumers_of(out).is_empty() && !graph.is_graph_output(out))
    }
}

// ── AllowListPolicy ────────────────────────────────────────────────

/// Allow-list policy built from a [`PartitionerConfig`].
///
/// Dimension rules look at the node's first input and apply only when its
/// shape is declared:
/// - rank above `max_rank` is rejected;
/// - `BatchNormalization` on a rank-3 tensor is rejected;
/// - pooling operators need at least rank 3.
#[derive(Debug, Clone)]
pub struct AllowListPolicy {
    supported: HashSet<String>,
    variadic: HashSet<String>,
    max_rank: usize,
}

impl AllowListPolicy {
    /// Creates a policy from the configured allow-list.
    pub fn from_config(config: &PartitionerConfig) -> Self {
        Self {
            supported: config.supported_ops.iter().cloned().collect(),
            variadic: config.variadic_ops.iter().cloned().collect(),
            max_rank: config.max_rank,
        }
    }

    /// Creates a policy accepting exactly the given operator types.
    pub fn with_ops(ops: &[&str]) -> Self {
        let config = PartitionerConfig {
            supported_ops: ops.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        Self::from_config(&config)
    }

    /// Returns the number of allow-listed operator types.
    pub fn num_ops(&self) -> usize {
        self.supported.len()
    }
}

impl Default for AllowListPolicy {
    fn default() -> Self {
        Self::from_config(&PartitionerConfig::default())
    }
}

impl OffloadPolicy for AllowListPolicy {
    fn name(&self) -> &str {
        "allow-list"
    }

    fn supports_op(&self, op_type: &str) -> bool {
        self.supported.contains(op_type)
    }

    fn supports_dimensions(&self, node: &NodeDef, graph: &GraphView<Validated>) -> bool {
        let rank = match node
            .first_input()
            .and_then(|name| graph.value_info(name))
            .and_then(|info| info.rank())
        {
            Some(rank) => rank,
            None => return true,
        };

        if rank > self.max_rank {
            return false;
        }
        if node.op_type == "BatchNormalization" && rank == 3 {
            return false;
        }
        if node.op_type.contains("Pool") && rank < 3 {
            return false;
        }
        true
    }

    fn is_variadic(&self, op_type: &str) -> bool {
        self.variadic.contains(op_type)
    }

    fn weight_input(&self, op_type: &str) -> Option<usize> {
        match op_type {
            "Conv" => Some(1),
            _ => None,
        }
    }
}

// ── Global gate ────────────────────────────────────────────────────

/// Why a pass produced no partitions at all.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum FallbackReason {
    /// The graph runs in a 16-bit float format the accelerator cannot take.
    HalfPrecisionGraph { value: String, elem_type: String },
    /// No node's operator type is on the allow-list.
    NoOffloadableNodes,
    /// `enable_subgraph = false` in the configuration.
    DisabledByConfig,
    /// The environment override is set to `0`.
    DisabledByEnv { var: String, value: String },
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HalfPrecisionGraph { value, elem_type } => {
                write!(f, "half-precision graph ('{value}' is {elem_type})")
            }
            Self::NoOffloadableNodes => write!(f, "no offloadable nodes"),
            Self::DisabledByConfig => write!(f, "subgraph partitioning disabled by config"),
            Self::DisabledByEnv { var, value } => write!(f, "disabled by {var}={value}"),
        }
    }
}

/// The whole-graph pre-scan run once before partitioning.
pub struct GlobalGate;

impl GlobalGate {
    /// Evaluates the gate, reading the override variable from the process
    /// environment.
    pub fn evaluate(
        graph: &GraphView<Validated>,
        policy: &dyn OffloadPolicy,
        config: &PartitionerConfig,
    ) -> Option<FallbackReason> {
        let env_value = if config.env_override_var.is_empty() {
            None
        } else {
            std::env::var(&config.env_override_var).ok()
        };
        Self::evaluate_with_env(graph, policy, config, env_value.as_deref())
    }

    /// Evaluates the gate against an explicit override value.
    ///
    /// Checks, in order:
    /// 1. Precision: the first node (in index order) whose first input has a
    ///    declared type decides; a type string containing `"16"` trips the gate.
    /// 2. At least one node's operator type is allow-listed.
    /// 3. The configuration switch.
    /// 4. The environment override: an integer value of `0` disables.
    pub fn evaluate_with_env(
        graph: &GraphView<Validated>,
        policy: &dyn OffloadPolicy,
        config: &PartitionerConfig,
        env_value: Option<&str>,
    ) -> Option<FallbackReason> {
        let typed_input = graph.iter_nodes().find_map(|node| {
            let input = node.first_input()?;
            graph.declared_type(input).map(|t| (input, t))
        });
        if let Some((value, elem_type)) = typed_input {
            if elem_type.contains("16") {
                return Some(FallbackReason::HalfPrecisionGraph {
                    value: value.to_string(),
                    elem_type: elem_type.to_string(),
                });
            }
        }

        if !graph.iter_nodes().any(|n| policy.supports_op(&n.op_type)) {
            return Some(FallbackReason::NoOffloadableNodes);
        }

        if !config.enable_subgraph {
            return Some(FallbackReason::DisabledByConfig);
        }

        if let Some(value) = env_value {
            if parse_env_int(value) == 0 {
                return Some(FallbackReason::DisabledByEnv {
                    var: config.env_override_var.clone(),
                    value: value.to_string(),
                });
            }
        }

        None
    }
}

/// Parses the leading integer of an environment value; anything that does
/// not start with a number reads as `0`.
fn parse_env_int(value: &str) -> i64 {
    let trimmed = value.trim_start();
    let (sign, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1, &trimmed[1..]),
        Some(b'+') => (1, &trimmed[1..]),
        _ => (1, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        tracing::warn!("environment override '{value}' is not a number; treating it as 0");
        return 0;
    }
    digits[..end]
        .parse::<i64>()
        .map(|n| sign * n)
        .unwrap_or(i64::MAX)
}
