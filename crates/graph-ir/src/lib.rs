// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # graph-ir
//!
//! A read-only view of an operator graph, as handed to the offload planner.
//!
//! The crate captures exactly what partitioning needs:
//!
//! - [`NodeDef`]: one operator: type, named inputs/outputs, attributes.
//! - [`ValueInfo`]: declared type and shape of a named value.
//! - [`GraphView`]: the ordered node list plus constants, with a
//!   **type-state pattern** (`Loaded` → `Validated`) that builds the
//!   producer/consumer tables on validation.
//! - [`GraphBuilder`]: incremental construction, mostly for tests.
//! - [`GraphLoader`]: loads a graph from a JSON manifest + SafeTensors constants.
//!
//! # Graph Directory Format
//! - `graph.json`: nodes in execution order, graph inputs/outputs, declared types.
//! - `constants.safetensors`: optional constant data in HuggingFace SafeTensors format.
//!
//! # Example
//! ```no_run
//! use graph_ir::GraphLoader;
//! use std::path::Path;
//!
//! let graph = GraphLoader::load(Path::new("./graphs/resnet-stem")).unwrap();
//! println!("{}", graph.summary());
//! for node in graph.iter_nodes() {
//!     println!("  {}", node.summary());
//! }
//! ```

mod builder;
mod error;
pub mod graph;
mod loader;
mod manifest;
mod node;

pub use builder::GraphBuilder;
pub use error::GraphError;
pub use graph::GraphView;
pub use loader::{GraphLoader, CONSTANTS_FILE, MANIFEST_FILE};
pub use manifest::{GraphManifest, ManifestConstant, ManifestNode};
pub use node::{AttributeValue, NodeDef, ValueInfo};
