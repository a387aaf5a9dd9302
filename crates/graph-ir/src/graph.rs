// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Graph view: a read-only DAG of operator nodes.
//!
//! # Type-State Pattern
//!
//! The graph transitions through states enforced at compile time:
//!
//! ```text
//! GraphView<Loaded>    : nodes parsed, not yet checked.
//!       │  .validate()
//!       ▼
//! GraphView<Validated> : naming checked, lookup tables built, ready for partitioning.
//! ```
//!
//! The partitioner only accepts `GraphView<Validated>`, so the
//! single-producer naming and edge tables it relies on always exist.
//! Malformed graphs are rejected here, with a descriptive [`GraphError`],
//! instead of being silently mis-partitioned later.

use crate::{GraphError, NodeDef, ValueInfo};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tensor_core::Tensor;

// ── Type-state markers ─────────────────────────────────────────────

/// Marker: graph has been loaded but not validated.
#[derive(Debug, Clone)]
pub struct Loaded;

/// Marker: graph has been validated and is ready for partitioning.
#[derive(Debug, Clone)]
pub struct Validated;

/// Sealed trait for graph states.
pub trait GraphState: fmt::Debug + Clone {}
impl GraphState for Loaded {}
impl GraphState for Validated {}

// ── Lookup tables ──────────────────────────────────────────────────

/// Lookup tables derived from the node list during validation.
#[derive(Debug, Clone, Default)]
struct GraphIndex {
    /// Node index → position in `nodes`.
    position: HashMap<usize, usize>,
    /// Value name → producing node index.
    producers: HashMap<String, usize>,
    /// Value name → consuming node indices, one entry per input slot.
    consumers: HashMap<String, Vec<usize>>,
    /// Value name → declared value info.
    value_info: HashMap<String, ValueInfo>,
    /// Per-position count of inputs produced by another node.
    input_edges: Vec<usize>,
    /// Per-position count of (consumer node, input slot) pairs fed by this node.
    output_edges: Vec<usize>,
    /// Names of graph outputs.
    graph_outputs: HashSet<String>,
}

// ── GraphView ──────────────────────────────────────────────────────

/// A computation graph: ordered operator nodes plus graph-level constants.
///
/// Nodes are kept sorted by their stable `index`. Indices may have gaps
/// (nodes removed by an earlier pass); a scan simply skips them.
#[derive(Debug, Clone)]
pub struct GraphView<S: GraphState = Loaded> {
    /// Human-readable graph name.
    pub name: String,
    /// Nodes in ascending index order.
    pub nodes: Vec<NodeDef>,
    /// Graph inputs.
    pub inputs: Vec<ValueInfo>,
    /// Graph outputs.
    pub outputs: Vec<ValueInfo>,
    /// Declared types of intermediate values.
    pub value_info: Vec<ValueInfo>,
    /// Graph-level constant tensors, keyed by value name.
    pub initializers: BTreeMap<String, Tensor>,
    index: GraphIndex,
    /// State marker (zero-sized, compile-time only).
    _state: std::marker::PhantomData<S>,
}

// ── Loaded state ───────────────────────────────────────────────────

impl GraphView<Loaded> {
    /// Creates a new graph in the `Loaded` state.
    pub fn new(
        name: String,
        nodes: Vec<NodeDef>,
        inputs: Vec<ValueInfo>,
        outputs: Vec<ValueInfo>,
    ) -> Self {
        Self {
            name,
            nodes,
            inputs,
            outputs,
            value_info: Vec::new(),
            initializers: BTreeMap::new(),
            index: GraphIndex::default(),
            _state: std::marker::PhantomData,
        }
    }

    /// Adds declared types for intermediate values.
    pub fn with_value_info(mut self, value_info: Vec<ValueInfo>) -> Self {
        self.value_info = value_info;
        self
    }

    /// Adds graph-level constant tensors.
    pub fn with_initializers(mut self, initializers: BTreeMap<String, Tensor>) -> Self {
        self.initializers = initializers;
        self
    }

    /// Validates the graph and transitions to the `Validated` state.
    ///
    /// # Checks
    /// - Node indices are strictly increasing (gaps are allowed).
    /// - Every node has at least one output, and no output name is empty.
    /// - Every value has at most one producer.
    /// - Every wired input is produced by a node, is a graph input, or is
    ///   an initializer.
    /// - Every produced input comes from a node with a smaller index, so
    ///   index order is a topological order.
    ///
    /// A graph with no nodes is valid.
    pub fn validate(self) -> Result<GraphView<Validated>, GraphError> {
        let mut index = GraphIndex::default();

        for (pos, node) in self.nodes.iter().enumerate() {
            if pos > 0 && node.index <= self.nodes[pos - 1].index {
                return Err(GraphError::InvalidNode {
                    index: node.index,
                    node: node.name.clone(),
                    detail: format!(
                        "node indices must be strictly increasing (previous is {})",
                        self.nodes[pos - 1].index,
                    ),
                });
            }
            index.position.insert(node.index, pos);

            if node.outputs.is_empty() {
                return Err(GraphError::InvalidNode {
                    index: node.index,
                    node: node.name.clone(),
                    detail: "node has no outputs".into(),
                });
            }
            for out in &node.outputs {
                if out.is_empty() {
                    return Err(GraphError::InvalidNode {
                        index: node.index,
                        node: node.name.clone(),
                        detail: "output name is empty".into(),
                    });
                }
                if let Some(&first) = index.producers.get(out) {
                    return Err(GraphError::DuplicateProducer {
                        value: out.clone(),
                        first,
                        second: node.index,
                    });
                }
                index.producers.insert(out.clone(), node.index);
            }
        }

        let graph_inputs: HashSet<&str> = self.inputs.iter().map(|v| v.name.as_str()).collect();

        index.input_edges = vec![0; self.nodes.len()];
        index.output_edges = vec![0; self.nodes.len()];

        for (pos, node) in self.nodes.iter().enumerate() {
            for input in node.present_inputs() {
                index
                    .consumers
                    .entry(input.to_string())
                    .or_default()
                    .push(node.index);

                match index.producers.get(input) {
                    Some(&producer) if producer >= node.index => {
                        return Err(GraphError::ForwardReference {
                            index: node.index,
                            node: node.name.clone(),
                            value: input.to_string(),
                            producer,
                        });
                    }
                    Some(&producer) => {
                        index.input_edges[pos] += 1;
                        let producer_pos = index.position[&producer];
                        index.output_edges[producer_pos] += 1;
                    }
                    None => {
                        if !graph_inputs.contains(input)
                            && !self.initializers.contains_key(input)
                        {
                            return Err(GraphError::DanglingInput {
                                index: node.index,
                                node: node.name.clone(),
                                value: input.to_string(),
                            });
                        }
                    }
                }
            }
        }

        // Later declarations win: intermediate, then outputs, then inputs.
        for info in self
            .value_info
            .iter()
            .chain(self.outputs.iter())
            .chain(self.inputs.iter())
        {
            index.value_info.insert(info.name.clone(), info.clone());
        }

        for out in &self.outputs {
            if !index.producers.contains_key(&out.name)
                && !graph_inputs.contains(out.name.as_str())
                && !self.initializers.contains_key(&out.name)
            {
                tracing::warn!("graph output '{}' is not produced by any node", out.name);
            }
            index.graph_outputs.insert(out.name.clone());
        }

        tracing::debug!(
            "validated graph '{}': {} nodes, {} initializers",
            self.name,
            self.nodes.len(),
            self.initializers.len(),
        );

        Ok(GraphView {
            name: self.name,
            nodes: self.nodes,
            inputs: self.inputs,
            outputs: self.outputs,
            value_info: self.value_info,
            initializers: self.initializers,
            index,
            _state: std::marker::PhantomData,
        })
    }
}

// ── Validated state ────────────────────────────────────────────────

impl GraphView<Validated> {
    /// Returns the number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Returns one past the largest node index.
    pub fn max_node_index(&self) -> usize {
        self.nodes.last().map(|n| n.index + 1).unwrap_or(0)
    }

    /// Returns an iterator over the nodes in index order.
    pub fn iter_nodes(&self) -> impl Iterator<Item = &NodeDef> {
        self.nodes.iter()
    }

    /// Returns a node by its stable index, or `None` for a gap.
    pub fn node(&self, index: usize) -> Option<&NodeDef> {
        self.index.position.get(&index).map(|&pos| &self.nodes[pos])
    }

    /// Returns the first node whose index is greater than `index`.
    pub fn next_node_after(&self, index: usize) -> Option<&NodeDef> {
        match self.index.position.get(&index) {
            Some(&pos) => self.nodes.get(pos + 1),
            None => self.nodes.iter().find(|n| n.index > index),
        }
    }

    /// Returns the nodes that follow `index`, in index order.
    pub fn nodes_after(&self, index: usize) -> impl Iterator<Item = &NodeDef> {
        let start = match self.index.position.get(&index) {
            Some(&pos) => pos + 1,
            None => self.nodes.partition_point(|n| n.index <= index),
        };
        self.nodes[start..].iter()
    }

    /// Returns a graph-level constant by name.
    pub fn initializer(&self, name: &str) -> Option<&Tensor> {
        self.initializers.get(name)
    }

    /// Returns `true` if `name` is a graph-level constant.
    pub fn is_initializer(&self, name: &str) -> bool {
        self.initializers.contains_key(name)
    }

    /// Returns the declared value info for a value name.
    pub fn value_info(&self, name: &str) -> Option<&ValueInfo> {
        self.index.value_info.get(name)
    }

    /// Returns the declared type string of a value, if any.
    pub fn declared_type(&self, name: &str) -> Option<&str> {
        self.value_info(name).and_then(|v| v.elem_type.as_deref())
    }

    /// Returns the index of the node producing `name`.
    pub fn producer_of(&self, name: &str) -> Option<usize> {
        self.index.producers.get(name).copied()
    }

    /// Returns the indices of nodes consuming `name`, one entry per input slot.
    pub fn consumers_of(&self, name: &str) -> &[usize] {
        self.index
            .consumers
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns the number of inputs of node `index` produced by another node.
    pub fn input_edge_count(&self, index: usize) -> usize {
        self.index
            .position
            .get(&index)
            .map(|&pos| self.index.input_edges[pos])
            .unwrap_or(0)
    }

    /// Returns the number of (consumer, input slot) pairs fed by node `index`.
    pub fn output_edge_count(&self, index: usize) -> usize {
        self.index
            .position
            .get(&index)
            .map(|&pos| self.index.output_edges[pos])
            .unwrap_or(0)
    }

    /// Returns `true` if `name` is one of the graph outputs.
    pub fn is_graph_output(&self, name: &str) -> bool {
        self.index.graph_outputs.contains(name)
    }

    /// Returns a key that distinguishes this graph from structurally
    /// identical graphs: the graph name plus the first node's first output.
    pub fn graph_key(&self) -> String {
        let first_output = self
            .nodes
            .first()
            .and_then(|n| n.first_output())
            .unwrap_or_default();
        format!("{}{}", self.name, first_output)
    }

    /// Returns a summary string describing the graph.
    pub fn summary(&self) -> String {
        let constant_bytes: usize = self.initializers.values().map(Tensor::size_bytes).sum();
        format!(
            "Graph '{}': {} nodes, {} inputs, {} outputs, {} initializers ({:.1} KB)",
            self.name,
            self.num_nodes(),
            self.inputs.len(),
            self.outputs.len(),
            self.initializers.len(),
            constant_bytes as f64 / 1024.0,
        )
    }
}

// ── Shared implementations ─────────────────────────────────────────

impl<S: GraphState> fmt::Display for GraphView<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "GraphView '{}' ({} nodes):", self.name, self.nodes.len())?;
        for node in &self.nodes {
            writeln!(f, "  {}", node.summary())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensor_core::{DType, Shape};

    /// Helper: Conv → Relu → MaxPool with a weight initializer.
    fn chain() -> GraphView<Loaded> {
        let nodes = vec![
            NodeDef::new(0, "Conv", &["x", "w"], &["c"]),
            NodeDef::new(1, "Relu", &["c"], &["r"]),
            NodeDef::new(2, "MaxPool", &["r"], &["y"]),
        ];
        let mut inits = BTreeMap::new();
        inits.insert(
            "w".to_string(),
            Tensor::zeros(Shape::new(vec![8, 3, 3, 3]), DType::F32),
        );
        GraphView::new(
            "chain".into(),
            nodes,
            vec![ValueInfo::new("x", "tensor(float)", &[1, 3, 32, 32])],
            vec![ValueInfo::untyped("y")],
        )
        .with_initializers(inits)
    }

    #[test]
    fn test_validate_ok() {
        let g = chain().validate().unwrap();
        assert_eq!(g.num_nodes(), 3);
        assert_eq!(g.max_node_index(), 3);
    }

    #[test]
    fn test_validate_empty() {
        let g = GraphView::new("empty".into(), vec![], vec![], vec![])
            .validate()
            .unwrap();
        assert_eq!(g.num_nodes(), 0);
        assert_eq!(g.max_node_index(), 0);
        assert_eq!(g.graph_key(), "empty");
        assert!(g.iter_nodes().next().is_none());
    }

    #[test]
    fn test_validate_forward_reference() {
        // Node 1 reads `c`, which only node 2 produces.
        let nodes = vec![
            NodeDef::new(0, "Relu", &["x"], &["a"]),
            NodeDef::new(1, "Conv", &["a", "c"], &["b"]),
            NodeDef::new(2, "Relu", &["a"], &["c"]),
        ];
        let g = GraphView::new(
            "forward".into(),
            nodes,
            vec![ValueInfo::untyped("x")],
            vec![ValueInfo::untyped("b")],
        );
        match g.validate() {
            Err(GraphError::ForwardReference {
                index,
                value,
                producer,
                ..
            }) => {
                assert_eq!((index, producer), (1, 2));
                assert_eq!(value, "c");
            }
            other => panic!("expected forward reference, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_self_loop() {
        let mut g = chain();
        g.nodes[1].inputs = vec!["r".into()];
        assert!(matches!(
            g.validate(),
            Err(GraphError::ForwardReference { index: 1, producer: 1, .. })
        ));
    }

    #[test]
    fn test_validate_no_outputs() {
        let mut g = chain();
        g.nodes[1].outputs.clear();
        assert!(matches!(
            g.validate(),
            Err(GraphError::InvalidNode { index: 1, .. })
        ));
    }

    #[test]
    fn test_validate_unsorted_indices() {
        let mut g = chain();
        g.nodes[2].index = 1;
        assert!(matches!(g.validate(), Err(GraphError::InvalidNode { .. })));
    }

    #[test]
    fn test_validate_dangling_input() {
        let mut g = chain();
        g.nodes[2].inputs = vec!["nowhere".into()];
        match g.validate() {
            Err(GraphError::DanglingInput { index, value, .. }) => {
                assert_eq!(index, 2);
                assert_eq!(value, "nowhere");
            }
            other => panic!("expected dangling input, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_duplicate_producer() {
        let mut g = chain();
        g.nodes[2].outputs = vec!["r".into()];
        assert!(matches!(
            g.validate(),
            Err(GraphError::DuplicateProducer { first: 1, second: 2, .. })
        ));
    }

    #[test]
    fn test_gaps_in_indices() {
        let mut g = chain();
        g.nodes[1].index = 5;
        g.nodes[2].index = 9;
        let g = g.validate().unwrap();
        assert!(g.node(1).is_none());
        assert_eq!(g.node(5).unwrap().op_type, "Relu");
        assert_eq!(g.next_node_after(0).unwrap().index, 5);
        assert_eq!(g.next_node_after(6).unwrap().index, 9);
        assert!(g.next_node_after(9).is_none());
        let rest: Vec<_> = g.nodes_after(0).map(|n| n.index).collect();
        assert_eq!(rest, vec![5, 9]);
        assert_eq!(g.max_node_index(), 10);
    }

    #[test]
    fn test_edge_counts() {
        let nodes = vec![
            NodeDef::new(0, "Relu", &["x"], &["a"]),
            NodeDef::new(1, "Conv", &["a", "w"], &["b"]),
            NodeDef::new(2, "Conv", &["a", "w"], &["c"]),
            NodeDef::new(3, "Sum", &["b", "c"], &["y"]),
        ];
        let mut inits = BTreeMap::new();
        inits.insert("w".to_string(), Tensor::zeros(Shape::vector(1), DType::F32));
        let g = GraphView::new(
            "branch".into(),
            nodes,
            vec![ValueInfo::untyped("x")],
            vec![ValueInfo::untyped("y")],
        )
        .with_initializers(inits)
        .validate()
        .unwrap();

        assert_eq!(g.output_edge_count(0), 2);
        assert_eq!(g.input_edge_count(0), 0);
        assert_eq!(g.input_edge_count(1), 1);
        assert_eq!(g.input_edge_count(3), 2);
        assert_eq!(g.output_edge_count(3), 0);
        assert_eq!(g.consumers_of("a"), &[1, 2]);
        assert_eq!(g.consumers_of("w"), &[1, 2]);
        assert_eq!(g.producer_of("c"), Some(2));
        assert!(g.is_graph_output("y"));
        assert!(!g.is_graph_output("b"));
    }

    #[test]
    fn test_declared_type() {
        let g = chain().validate().unwrap();
        assert_eq!(g.declared_type("x"), Some("tensor(float)"));
        assert_eq!(g.declared_type("y"), None);
        assert_eq!(g.value_info("x").unwrap().rank(), Some(4));
    }

    #[test]
    fn test_graph_key() {
        let g = chain().validate().unwrap();
        assert_eq!(g.graph_key(), "chainc");
    }

    #[test]
    fn test_summary_and_display() {
        let g = chain().validate().unwrap();
        let s = g.summary();
        assert!(s.contains("chain"));
        assert!(s.contains("3 nodes"));
        assert!(s.contains("1 initializers"));
        let display = format!("{g}");
        assert!(display.contains("Relu"));
    }
}
