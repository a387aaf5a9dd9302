// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Partitioner configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! enable_subgraph = true
//! supported_ops = ["Conv", "BatchNormalization", "Relu", "MaxPool"]
//! variadic_ops = ["Sum"]
//! max_rank = 5
//! fuse_conv_relu = true
//! env_override_var = "OFFLOAD_SUBGRAPH"
//! partition_prefix = "OffloadSubgraph_"
//! ```

use crate::PlannerError;
use std::path::Path;

/// Operator types the accelerator accepts out of the box.
pub const DEFAULT_SUPPORTED_OPS: &[&str] = &[
    "Conv",
    "BatchNormalization",
    "Relu",
    "Sum",
    "AveragePool",
    "MaxPool",
    "GlobalAveragePool",
    "GlobalMaxPool",
    "LRN",
];

/// Configuration for the offload partitioner.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PartitionerConfig {
    /// Master switch; `false` makes every pass fall back to per-node scheduling.
    pub enable_subgraph: bool,
    /// Operator types the accelerator can execute.
    pub supported_ops: Vec<String>,
    /// Operators whose inputs must all come from the pending partition
    /// before it may be extended by them.
    pub variadic_ops: Vec<String>,
    /// Largest tensor rank the accelerator handles.
    pub max_rank: usize,
    /// Whether `Relu` fuses directly onto a plain `Conv` member.
    pub fuse_conv_relu: bool,
    /// Environment variable that can switch partitioning off (`0` disables).
    /// An empty name ignores the environment.
    pub env_override_var: String,
    /// Prefix of emitted partition names.
    pub partition_prefix: String,
}

impl PartitionerConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, PlannerError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PlannerError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, PlannerError> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| PlannerError::Config(format!("TOML parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, PlannerError> {
        toml::to_string_pretty(self)
            .map_err(|e| PlannerError::Config(format!("TOML serialise error: {e}")))
    }

    /// Checks the values for consistency.
    pub fn validate(&self) -> Result<(), PlannerError> {
        if self.max_rank == 0 {
            return Err(PlannerError::Config("max_rank must be at least 1".into()));
        }
        if self.partition_prefix.is_empty() {
            return Err(PlannerError::Config(
                "partition_prefix must not be empty".into(),
            ));
        }
        if self.env_override_var.contains('=') || self.env_override_var.contains('\0') {
            return Err(PlannerError::Config(format!(
                "invalid environment variable name '{}'",
                self.env_override_var
            )));
        }
        Ok(())
    }

    /// Returns a config that never consults the environment.
    pub fn without_env_override(mut self) -> Self {
        self.env_override_var.clear();
        self
    }
}

impl Default for PartitionerConfig {
    fn default() -> Self {
        Self {
            enable_subgraph: true,
            supported_ops: DEFAULT_SUPPORTED_OPS.iter().map(|s| s.to_string()).collect(),
            variadic_ops: vec!["Sum".to_string()],
            max_rank: 5,
            fuse_conv_relu: true,
            env_override_var: "OFFLOAD_SUBGRAPH".to_string(),
            partition_prefix: "OffloadSubgraph_".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let c = PartitionerConfig::default();
        assert!(c.enable_subgraph);
        assert_eq!(c.supported_ops.len(), 9);
        assert_eq!(c.variadic_ops, vec!["Sum"]);
        assert_eq!(c.max_rank, 5);
        assert_eq!(c.env_override_var, "OFFLOAD_SUBGRAPH");
        c.validate().unwrap();
    }

    #[test]
    fn test_from_toml_partial() {
        let toml = r#"
supported_ops = ["Conv", "Relu"]
max_rank = 4
fuse_conv_relu = false
"#;
        let c = PartitionerConfig::from_toml(toml).unwrap();
        assert_eq!(c.supported_ops, vec!["Conv", "Relu"]);
        assert_eq!(c.max_rank, 4);
        assert!(!c.fuse_conv_relu);
        // Unspecified fields keep their defaults.
        assert!(c.enable_subgraph);
        assert_eq!(c.partition_prefix, "OffloadSubgraph_");
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let c = PartitionerConfig {
            partition_prefix: "Accel_".into(),
            ..Default::default()
        };
        let back = PartitionerConfig::from_toml(&c.to_toml().unwrap()).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_invalid_values() {
        assert!(PartitionerConfig::from_toml("max_rank = 0").is_err());
        assert!(PartitionerConfig::from_toml(r#"partition_prefix = """#).is_err());
        assert!(PartitionerConfig::from_toml(r#"env_override_var = "A=B""#).is_err());
        assert!(PartitionerConfig::from_toml("max_rank = \"five\"").is_err());
    }

    #[test]
    fn test_without_env_override() {
        let c = PartitionerConfig::default().without_env_override();
        assert!(c.env_override_var.is_empty());
        let back = PartitionerConfig::from_toml(&c.to_toml().unwrap()).unwrap();
        assert!(back.env_override_var.is_empty());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partitioner.toml");
        std::fs::write(&path, "enable_subgraph = false\n").unwrap();
        let c = PartitionerConfig::from_file(&path).unwrap();
        assert!(!c.enable_subgraph);

        assert!(matches!(
            PartitionerConfig::from_file(&dir.path().join("missing.toml")),
            Err(PlannerError::Config(_))
        ));
    }
}
