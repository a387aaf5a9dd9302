// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Cluster members: the logical offload units inside a partition.

use crate::CompositeOp;
use graph_ir::NodeDef;

/// Which graph nodes a member stands for.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemberKind {
    /// A single node.
    Fresh { node: usize },
    /// A fusion target plus the nodes fused into it, in scan order.
    Fused { base: usize, absorbed: Vec<usize> },
}

/// One logical offload unit of a partition.
///
/// Parent links and producer lookups are positions in the owning
/// partition's member list, never names.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ClusterMember {
    #[serde(flatten)]
    kind: MemberKind,
    /// Composite operator type, e.g. `Conv-BatchNormalization-Relu`.
    pub composite: CompositeOp,
    /// Number of real inputs consumed, counting fused nodes' extra inputs.
    pub num_inputs: usize,
    /// Position of this member's first input in the partition's input list.
    pub input_start: usize,
    /// Current output name (the last fused node's first output).
    pub output_name: String,
    /// Positions of the members producing this member's inputs.
    pub parents: Vec<usize>,
    /// Slot in the partition's output list, once resolved.
    pub output_slot: Option<usize>,
    /// Weight tensor consumed by the first operator of the chain.
    pub weight_name: Option<String>,
}

impl ClusterMember {
    /// Creates a member for a single node.
    ///
    /// The caller must have checked that the node has an output.
    pub(crate) fn fresh(
        node: &NodeDef,
        output_name: &str,
        input_start: usize,
        parents: Vec<usize>,
        weight_name: Option<String>,
    ) -> Self {
        Self {
            kind: MemberKind::Fresh { node: node.index },
            composite: CompositeOp::single(&node.op_type),
            num_inputs: node.present_inputs().count(),
            input_start,
            output_name: output_name.to_string(),
            parents,
            output_slot: None,
            weight_name,
        }
    }

    /// Fuses `node` into this member.
    ///
    /// The fused node's first input is this member's output, so only its
    /// remaining inputs are added to the count. Returns the replaced output
    /// name.
    pub(crate) fn absorb(
        &mut self,
        node: &NodeDef,
        output_name: &str,
        composite: CompositeOp,
    ) -> String {
        self.kind = match std::mem::replace(&mut self.kind, MemberKind::Fresh { node: 0 }) {
            MemberKind::Fresh { node: base } => MemberKind::Fused {
                base,
                absorbed: vec![node.index],
            },
            MemberKind::Fused { base, mut absorbed } => {
                absorbed.push(node.index);
                MemberKind::Fused { base, absorbed }
            }
        };
        self.composite = composite;
        self.num_inputs += node.present_inputs().count().saturating_sub(1);
        std::mem::replace(&mut self.output_name, output_name.to_string())
    }

    /// Returns the member kind.
    pub fn kind(&self) -> &MemberKind {
        &self.kind
    }

    /// Returns `true` if at least one node has been fused into this member.
    pub fn is_fused(&self) -> bool {
        matches!(self.kind, MemberKind::Fused { .. })
    }

    /// Operator type of the first node of the chain.
    pub fn base_op(&self) -> &str {
        self.composite.base()
    }

    /// Graph indices of every node this member stands for, in scan order.
    pub fn node_indices(&self) -> Vec<usize> {
        match &self.kind {
            MemberKind::Fresh { node } => vec![*node],
            MemberKind::Fused { base, absorbed } => {
                std::iter::once(*base).chain(absorbed.iter().copied()).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_member() {
        let conv = NodeDef::new(4, "Conv", &["x", "w", ""], &["c"]);
        let m = ClusterMember::fresh(&conv, "c", 0, vec![], Some("w".into()));
        assert_eq!(m.kind(), &MemberKind::Fresh { node: 4 });
        assert_eq!(m.num_inputs, 2);
        assert_eq!(m.base_op(), "Conv");
        assert!(!m.is_fused());
        assert_eq!(m.node_indices(), vec![4]);
    }

    #[test]
    fn test_absorb_chain() {
        let conv = NodeDef::new(0, "Conv", &["x", "w"], &["c"]);
        let bn = NodeDef::new(1, "BatchNormalization", &["c", "s", "b", "m", "v"], &["n"]);
        let relu = NodeDef::new(2, "Relu", &["n"], &["r"]);

        let mut m = ClusterMember::fresh(&conv, "c", 0, vec![], Some("w".into()));
        let mut composite = CompositeOp::single("Conv");

        let rules = crate::FusionRules::standard();
        composite = rules.try_fuse(&composite, "BatchNormalization").unwrap();
        assert_eq!(m.absorb(&bn, "n", composite.clone()), "c");
        composite = rules.try_fuse(&composite, "Relu").unwrap();
        assert_eq!(m.absorb(&relu, "r", composite), "n");

        assert_eq!(
            m.kind(),
            &MemberKind::Fused {
                base: 0,
                absorbed: vec![1, 2]
            }
        );
        assert_eq!(m.num_inputs, 2 + 4);
        assert_eq!(m.output_name, "r");
        assert_eq!(m.composite.to_string(), "Conv-BatchNormalization-Relu");
        assert_eq!(m.base_op(), "Conv");
        assert_eq!(m.weight_name.as_deref(), Some("w"));
        assert_eq!(m.node_indices(), vec![0, 1, 2]);
    }

    #[test]
    fn test_serialize_flattens_kind() {
        let relu = NodeDef::new(3, "Relu", &["a"], &["b"]);
        let m = ClusterMember::fresh(&relu, "b", 2, vec![0], None);
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["kind"], "fresh");
        assert_eq!(json["node"], 3);
        assert_eq!(json["composite"], "Relu");
        assert_eq!(json["parents"], serde_json::json!([0]));
    }
}
