// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Partition ids, the id → metadata registry, and descriptor emission.
//!
//! A [`PartitionRegistry`] lives as long as the partitioner that owns it.
//! Ids are handed out from a monotonic counter and never reused, so an
//! executor can look up a partition's members by id long after the pass
//! that created it.

use crate::{ClusterMember, PartitionDescriptor, ResolvedCluster};
use std::collections::BTreeMap;

/// Member metadata kept for the executor, keyed by partition id.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ClusterMetadata {
    /// Key of the graph the partition was cut from.
    pub graph_key: String,
    /// Members with resolved output slots.
    pub members: Vec<ClusterMember>,
}

/// Owns the partition-id counter and the id → metadata map.
#[derive(Debug, Default)]
pub struct PartitionRegistry {
    next_id: usize,
    entries: BTreeMap<usize, ClusterMetadata>,
}

impl PartitionRegistry {
    /// Creates a registry whose first id is 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id the next partition will get.
    pub fn peek_next_id(&self) -> usize {
        self.next_id
    }

    /// Takes the next id from the counter.
    pub fn allocate(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Records metadata under `id`.
    pub fn register(&mut self, id: usize, metadata: ClusterMetadata) {
        self.entries.insert(id, metadata);
    }

    /// Looks up a partition's metadata.
    pub fn metadata(&self, id: usize) -> Option<&ClusterMetadata> {
        self.entries.get(&id)
    }

    /// Number of registered partitions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Turns resolved clusters into descriptors for one pass over one graph.
pub struct PartitionEmitter<'a> {
    registry: &'a mut PartitionRegistry,
    prefix: &'a str,
    graph_key: &'a str,
}

impl<'a> PartitionEmitter<'a> {
    pub fn new(registry: &'a mut PartitionRegistry, prefix: &'a str, graph_key: &'a str) -> Self {
        Self {
            registry,
            prefix,
            graph_key,
        }
    }

    /// Assigns the next id, registers the member metadata and builds the
    /// descriptor.
    pub fn emit(&mut self, cluster: ResolvedCluster) -> PartitionDescriptor {
        let id = self.registry.allocate();
        self.registry.register(
            id,
            ClusterMetadata {
                graph_key: self.graph_key.to_string(),
                members: cluster.members.clone(),
            },
        );

        PartitionDescriptor {
            id,
            name: format!("{}{id}", self.prefix),
            graph_key: self.graph_key.to_string(),
            node_indices: cluster.node_indices,
            inputs: cluster.inputs,
            outputs: cluster.outputs,
            members: cluster.members,
            captures: cluster.captures,
            attributes: cluster.attributes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn empty_cluster(indices: Vec<usize>) -> ResolvedCluster {
        ResolvedCluster {
            node_indices: indices,
            members: vec![],
            inputs: vec!["x".into()],
            outputs: vec!["y".into()],
            captures: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut reg = PartitionRegistry::new();
        assert_eq!(reg.peek_next_id(), 0);
        assert_eq!(reg.allocate(), 0);
        assert_eq!(reg.allocate(), 1);
        assert_eq!(reg.peek_next_id(), 2);
        // Allocation alone does not register anything.
        assert!(reg.is_empty());
    }

    #[test]
    fn test_emit_registers_metadata() {
        let mut reg = PartitionRegistry::new();
        let (a, b) = {
            let mut emitter = PartitionEmitter::new(&mut reg, "Sub_", "gx");
            (
                emitter.emit(empty_cluster(vec![0, 1])),
                emitter.emit(empty_cluster(vec![3])),
            )
        };
        assert_eq!((a.id, b.id), (0, 1));
        assert_eq!(a.name, "Sub_0");
        assert_eq!(b.name, "Sub_1");
        assert_eq!(b.graph_key, "gx");
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.metadata(1).unwrap().graph_key, "gx");
        assert!(reg.metadata(2).is_none());
    }

    #[test]
    fn test_ids_continue_across_emitters() {
        let mut reg = PartitionRegistry::new();
        PartitionEmitter::new(&mut reg, "P", "g1").emit(empty_cluster(vec![0]));
        let d = PartitionEmitter::new(&mut reg, "P", "g2").emit(empty_cluster(vec![0]));
        assert_eq!(d.id, 1);
        assert_eq!(reg.metadata(0).unwrap().graph_key, "g1");
        assert_eq!(reg.metadata(1).unwrap().graph_key, "g2");
    }
}
