// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `offload-cli inspect` command: display graph structure and per-node
//! eligibility without running a pass.

use super::truncate;
use offload_planner::{AllowListPolicy, GlobalGate, OffloadPolicy, PartitionerConfig};
use std::path::PathBuf;

pub fn execute(graph_dir: PathBuf, config: PartitionerConfig) -> anyhow::Result<()> {
    config.validate()?;
    let graph = graph_ir::GraphLoader::load(&graph_dir).map_err(|e| {
        anyhow::anyhow!("failed to load graph from '{}': {e}", graph_dir.display())
    })?;
    let policy = AllowListPolicy::from_config(&config);

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║              offload-cli · Graph Inspector          ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    // ── Summary ────────────────────────────────────────────────
    println!("  {}", graph.summary());
    println!("  Policy: {} ({} ops)", policy.name(), policy.num_ops());
    match GlobalGate::evaluate(&graph, &policy, &config) {
        Some(reason) => println!("  Gate: closed ({reason})"),
        None => println!("  Gate: open"),
    }
    println!();

    // ── Per-Node Detail ────────────────────────────────────────
    println!(
        "  {:<5} {:<24} {:<20} {:>4} {:>4} {:<8}",
        "Idx", "Name", "Op", "In", "Out", "Offload",
    );
    println!("  {}", "-".repeat(72));

    for node in graph.iter_nodes() {
        let verdict = if policy.supports(node, &graph) {
            "yes"
        } else if policy.supports_op(&node.op_type) {
            "shape"
        } else {
            "no"
        };
        println!(
            "  {:<5} {:<24} {:<20} {:>4} {:>4} {:<8}",
            node.index,
            truncate(&node.name, 24),
            truncate(&node.op_type, 20),
            graph.input_edge_count(node.index),
            graph.output_edge_count(node.index),
            verdict,
        );
    }
    println!();

    // ── Constants ──────────────────────────────────────────────
    if !graph.initializers.is_empty() {
        println!("  Constants:");
        for (name, tensor) in &graph.initializers {
            println!("   {:<32} {}", truncate(name, 32), tensor.summary());
        }
        println!();
    }
    Ok(())
}
