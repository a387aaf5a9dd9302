// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # offload-planner
//!
//! Partitions a validated [`GraphView`](graph_ir::GraphView) into clusters
//! of nodes that an accelerator backend executes as a unit.
//!
//! # Pipeline
//!
//! | Stage | Type | Role |
//! |---|---|---|
//! | Eligibility | [`OffloadPolicy`], [`GlobalGate`] | Per-node verdict, whole-graph fallback |
//! | Fusion | [`FusionRules`] | `Conv` → `BatchNormalization` → `Relu` chains |
//! | Accumulation | [`PartitionAccumulator`] | Pending partition state machine |
//! | Look-ahead | [`lookahead`] | Continuation and fan-out flush decisions |
//! | Boundary | [`BoundaryResolver`] | Outputs, slots, captured constants |
//! | Emission | [`PartitionEmitter`], [`PartitionRegistry`] | Ids, descriptors, metadata |
//!
//! # Trait-Based Extensibility
//!
//! The operator table is supplied from outside through [`OffloadPolicy`]:
//!
//! ```ignore
//! struct MyAccelerator;
//! impl OffloadPolicy for MyAccelerator {
//!     fn name(&self) -> &str { "my-accel" }
//!     fn supports_op(&self, op_type: &str) -> bool { op_type == "Conv" }
//!     fn supports_dimensions(&self, node: &NodeDef, graph: &GraphView<Validated>) -> bool { true }
//! }
//! let partitioner = Partitioner::with_policy(config, Box::new(MyAccelerator))?;
//! ```
//!
//! # Example
//! ```no_run
//! use graph_ir::GraphLoader;
//! use offload_planner::{Partitioner, PartitionerConfig};
//! use std::path::Path;
//!
//! let graph = GraphLoader::load(Path::new("./graphs/resnet-stem")).unwrap();
//! let mut partitioner = Partitioner::new(PartitionerConfig::default()).unwrap();
//! let plan = partitioner.partition(&graph).unwrap();
//! plan.validate(&graph).unwrap();
//! println!("{}", plan.summary());
//! ```

mod accumulator;
mod boundary;
mod config;
mod error;
mod fusion;
pub mod lookahead;
mod member;
mod partitioner;
mod plan;
mod policy;
mod registry;

pub use accumulator::{AccumulatorState, AttributeKey, Extension, PartitionAccumulator};
pub use boundary::{BoundaryResolver, ResolvedCluster};
pub use config::{PartitionerConfig, DEFAULT_SUPPORTED_OPS};
pub use error::PlannerError;
pub use fusion::{CompositeOp, FusionRules};
pub use member::{ClusterMember, MemberKind};
pub use partitioner::Partitioner;
pub use plan::{PartitionDescriptor, PartitionPlan};
pub use policy::{AllowListPolicy, FallbackReason, GlobalGate, OffloadPolicy};
pub use registry::{ClusterMetadata, PartitionEmitter, PartitionRegistry};
