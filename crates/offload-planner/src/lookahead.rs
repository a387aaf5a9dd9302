// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Look-ahead checks run after every accepted node.
//!
//! Both checks answer one question: can the pending partition keep growing
//! past this node? Each returns the index of the node that forces a flush.

use crate::{OffloadPolicy, PartitionAccumulator};
use graph_ir::graph::Validated;
use graph_ir::{GraphView, NodeDef};

/// Linear continuation check.
///
/// If the next node in index order is an allow-listed operator, its
/// required inputs (the first input, or every input for a variadic op)
/// must already be produced inside the pending partition. Returns the next
/// node's index when they are not.
pub fn continuation_break(
    graph: &GraphView<Validated>,
    policy: &dyn OffloadPolicy,
    node: &NodeDef,
    pending: &PartitionAccumulator,
) -> Option<usize> {
    let next = graph.next_node_after(node.index)?;
    if !policy.supports_op(&next.op_type) {
        return None;
    }

    let fed_from_partition = if policy.is_variadic(&next.op_type) {
        next.present_inputs().all(|input| pending.produces(input))
    } else {
        next.first_input().map_or(true, |input| pending.produces(input))
    };

    if fed_from_partition {
        None
    } else {
        Some(next.index)
    }
}

/// Fan-out check for branch points.
///
/// When `node` feeds more than one consumer edge, the nodes that follow it
/// are scanned in index order:
/// - a node outside the allow-list stops the scan and forces a flush;
/// - otherwise, a node whose inbound edge count equals the branch's
///   outbound edge count is taken as the rejoin point and stops the scan.
///
/// Reaching the end of the graph does not flush. Returns the index of the
/// blocking node.
pub fn fan_out_break(
    graph: &GraphView<Validated>,
    policy: &dyn OffloadPolicy,
    node: &NodeDef,
) -> Option<usize> {
    let out_edges = graph.output_edge_count(node.index);
    if out_edges <= 1 {
        return None;
    }

    for next in graph.nodes_after(node.index) {
        if !policy.supports_op(&next.op_type) {
            return Some(next.index);
        }
        if graph.input_edge_count(next.index) == out_edges {
            tracing::trace!(
                "branch at node {} rejoins at node {}",
                node.index,
                next.index
            );
            return None;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AllowListPolicy, FusionRules};
    use graph_ir::GraphBuilder;

    fn pending_after(graph: &GraphView<Validated>, last: usize) -> PartitionAccumulator {
        let policy = AllowListPolicy::default();
        let rules = FusionRules::standard();
        let mut acc = PartitionAccumulator::new();
        for node in graph.iter_nodes().take_while(|n| n.index <= last) {
            acc.accept(node, graph, &rules, &policy).unwrap();
        }
        acc
    }

    #[test]
    fn test_continuation_ok_when_fed_internally() {
        let g = GraphBuilder::new("chain")
            .input("x", "tensor(float)", &[1, 3, 8, 8])
            .node("Relu", &["x"], &["a"])
            .node("MaxPool", &["a"], &["b"])
            .build()
            .unwrap();
        let acc = pending_after(&g, 0);
        let policy = AllowListPolicy::default();
        assert_eq!(continuation_break(&g, &policy, g.node(0).unwrap(), &acc), None);
        // Last node: nothing follows.
        assert_eq!(continuation_break(&g, &policy, g.node(1).unwrap(), &acc), None);
    }

    #[test]
    fn test_continuation_breaks_on_outside_input() {
        let g = GraphBuilder::new("two-heads")
            .input("x", "tensor(float)", &[1, 3, 8, 8])
            .input("z", "tensor(float)", &[1, 3, 8, 8])
            .node("Relu", &["x"], &["a"])
            .node("Relu", &["z"], &["b"])
            .build()
            .unwrap();
        let acc = pending_after(&g, 0);
        let policy = AllowListPolicy::default();
        assert_eq!(
            continuation_break(&g, &policy, g.node(0).unwrap(), &acc),
            Some(1)
        );
    }

    #[test]
    fn test_continuation_ignores_unsupported_next() {
        let g = GraphBuilder::new("cpu-next")
            .input("x", "tensor(float)", &[1, 3, 8, 8])
            .input("z", "tensor(float)", &[1, 3, 8, 8])
            .node("Relu", &["x"], &["a"])
            .node("Softmax", &["z"], &["b"])
            .build()
            .unwrap();
        let acc = pending_after(&g, 0);
        let policy = AllowListPolicy::default();
        assert_eq!(continuation_break(&g, &policy, g.node(0).unwrap(), &acc), None);
    }

    #[test]
    fn test_continuation_variadic_checks_all_inputs() {
        let g = GraphBuilder::new("sum")
            .input("x", "tensor(float)", &[1, 3, 8, 8])
            .input("z", "tensor(float)", &[1, 3, 8, 8])
            .node("Relu", &["x"], &["a"])
            .node("Sum", &["a", "z"], &["s"])
            .build()
            .unwrap();
        let acc = pending_after(&g, 0);
        let policy = AllowListPolicy::default();
        assert_eq!(
            continuation_break(&g, &policy, g.node(0).unwrap(), &acc),
            Some(1)
        );
    }

    #[test]
    fn test_continuation_skips_index_gaps() {
        let g = GraphBuilder::new("gap")
            .input("x", "tensor(float)", &[1, 3, 8, 8])
            .input("z", "tensor(float)", &[1, 3, 8, 8])
            .node("Relu", &["x"], &["a"])
            .skip_indices(4)
            .node("Relu", &["z"], &["b"])
            .build()
            .unwrap();
        let acc = pending_after(&g, 0);
        let policy = AllowListPolicy::default();
        assert_eq!(
            continuation_break(&g, &policy, g.node(0).unwrap(), &acc),
            Some(5)
        );
    }

    /// Relu → {Conv, <op>} → Sum.
    fn diamond(arm: &str) -> GraphView<Validated> {
        GraphBuilder::new("diamond")
            .input("x", "tensor(float)", &[1, 3, 8, 8])
            .node("Relu", &["x"], &["a"])
            .node("Conv", &["a", "w"], &["b"])
            .node(arm, &["a"], &["c"])
            .node("Sum", &["b", "c"], &["y"])
            .output("y")
            .constant_f32("w", &[1], &[1.0])
            .build()
            .unwrap()
    }

    #[test]
    fn test_fan_out_rejoins_inside_supported_region() {
        let g = diamond("MaxPool");
        let policy = AllowListPolicy::default();
        assert_eq!(fan_out_break(&g, &policy, g.node(0).unwrap()), None);
    }

    #[test]
    fn test_fan_out_stops_at_rejoin() {
        // The Softmax after the Sum rejoin is never reached by the scan.
        let g = GraphBuilder::new("rejoin-then-cpu")
            .input("x", "tensor(float)", &[1, 3, 8, 8])
            .node("Relu", &["x"], &["a"])
            .node("MaxPool", &["a"], &["b1"])
            .node("AveragePool", &["a"], &["b2"])
            .node("Sum", &["b1", "b2"], &["s"])
            .node("Softmax", &["s"], &["y"])
            .build()
            .unwrap();
        let policy = AllowListPolicy::default();
        assert_eq!(g.input_edge_count(3), g.output_edge_count(0));
        assert_eq!(fan_out_break(&g, &policy, g.node(0).unwrap()), None);
    }

    #[test]
    fn test_fan_out_flushes_on_unsupported_arm() {
        let g = diamond("Softmax");
        let policy = AllowListPolicy::default();
        assert_eq!(fan_out_break(&g, &policy, g.node(0).unwrap()), Some(2));
    }

    #[test]
    fn test_fan_out_not_a_branch() {
        let g = diamond("Softmax");
        let policy = AllowListPolicy::default();
        assert_eq!(fan_out_break(&g, &policy, g.node(1).unwrap()), None);
    }

    #[test]
    fn test_fan_out_unsupported_rejoin_flushes() {
        let g = GraphBuilder::new("cpu-join")
            .input("x", "tensor(float)", &[1, 3, 8, 8])
            .node("Relu", &["x"], &["a"])
            .node("Concat", &["a", "a"], &["y"])
            .build()
            .unwrap();
        let policy = AllowListPolicy::default();
        assert_eq!(fan_out_break(&g, &policy, g.node(0).unwrap()), Some(1));
    }

    #[test]
    fn test_fan_out_end_of_graph() {
        // Both consumers are supported and neither has two inbound edges.
        let g = GraphBuilder::new("split")
            .input("x", "tensor(float)", &[1, 3, 8, 8])
            .node("Relu", &["x"], &["a"])
            .node("MaxPool", &["a"], &["b"])
            .node("AveragePool", &["a"], &["c"])
            .output("b")
            .output("c")
            .build()
            .unwrap();
        let policy = AllowListPolicy::default();
        assert_eq!(fan_out_break(&g, &policy, g.node(0).unwrap()), None);
    }
}
