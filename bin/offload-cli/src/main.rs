// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # offload-cli
//!
//! Command-line interface for the accelerator offload partitioner.
//!
//! ## Usage
//! ```bash
//! # Partition a graph and print the plan
//! offload-cli partition --graph ./graphs/resnet-stem
//!
//! # Same, as JSON, with a custom configuration
//! offload-cli --config partitioner.toml partition --graph ./graphs/resnet-stem --json
//!
//! # Inspect per-node eligibility
//! offload-cli inspect --graph ./graphs/resnet-stem
//! ```

mod commands;

use clap::{Parser, Subcommand};
use offload_planner::PartitionerConfig;

#[derive(Parser)]
#[command(
    name = "offload-cli",
    about = "Partitions computation graphs into accelerator offload subgraphs",
    version,
    author
)]
struct Cli {
    /// Path to a TOML partitioner configuration file.
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Partition a graph and print the resulting plan.
    Partition {
        /// Path to the graph directory (graph.json + optional constants.safetensors).
        #[arg(short, long)]
        graph: std::path::PathBuf,

        /// Print the plan as JSON instead of a table.
        #[arg(long)]
        json: bool,

        /// Ignore the environment override variable.
        #[arg(long)]
        no_env: bool,
    },

    /// Inspect a graph: per-node eligibility, edges and the global gate.
    Inspect {
        /// Path to the graph directory.
        #[arg(short, long)]
        graph: std::path::PathBuf,
    },

    /// Print the effective partitioner configuration as TOML.
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => PartitionerConfig::from_file(path).map_err(|e| {
            anyhow::anyhow!("failed to load config from '{}': {e}", path.display())
        })?,
        None => PartitionerConfig::default(),
    };
    tracing::debug!("effective config: {config:?}");

    match cli.command {
        Commands::Partition {
            graph,
            json,
            no_env,
        } => {
            let config = if no_env {
                config.without_env_override()
            } else {
                config
            };
            commands::partition::execute(graph, config, json)
        }
        Commands::Inspect { graph } => commands::inspect::execute(graph, config),
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}
