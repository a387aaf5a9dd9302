// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `offload-cli partition` command: run one partitioning pass over a graph.

use super::truncate;
use offload_planner::{Partitioner, PartitionerConfig};
use std::path::PathBuf;

pub fn execute(graph_dir: PathBuf, config: PartitionerConfig, json: bool) -> anyhow::Result<()> {
    let graph = graph_ir::GraphLoader::load(&graph_dir).map_err(|e| {
        anyhow::anyhow!("failed to load graph from '{}': {e}", graph_dir.display())
    })?;

    let mut partitioner = Partitioner::new(config)?;
    let plan = partitioner.partition(&graph)?;
    plan.validate(&graph)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║            offload-cli · Partition Plan             ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();
    println!("  {}", graph.summary());
    println!("  {}", plan.summary());
    println!();

    if let Some(reason) = &plan.fallback {
        println!("  Whole graph left to default scheduling: {reason}");
        println!();
        return Ok(());
    }

    for p in &plan.partitions {
        println!("  {}", p.name);
        println!("   Nodes:    {:?}", p.node_indices);
        println!("   Inputs:   {}", p.inputs.join(", "));
        println!("   Outputs:  {}", p.outputs.join(", "));
        println!(
            "   Captures: {} ({:.1} KB)",
            p.captures.len(),
            p.capture_bytes() as f64 / 1024.0
        );
        println!(
            "   {:<4} {:<36} {:>6} {:>6} {:<12} {:>5}",
            "Pos", "Members", "#In", "Start", "Parents", "Slot"
        );
        for (pos, member) in p.members.iter().enumerate() {
            let slot = member
                .output_slot
                .map_or_else(|| "-".to_string(), |s| s.to_string());
            println!(
                "   {:<4} {:<36} {:>6} {:>6} {:<12} {:>5}",
                pos + 1,
                truncate(&member.composite.to_string(), 36),
                member.num_inputs,
                member.input_start,
                format!("{:?}", member.parents),
                slot,
            );
        }
        println!();
    }

    if !plan.rejected_nodes.is_empty() {
        println!("  Default scheduling: {:?}", plan.rejected_nodes);
        println!();
    }
    Ok(())
}
