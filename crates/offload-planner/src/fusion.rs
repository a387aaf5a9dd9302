// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Fusion of adjacent nodes into composite offload units.
//!
//! Only the tail member of a pending partition can absorb a node. The rule
//! table is small and ordered:
//!
//! | Candidate | Tail chain | Result |
//! |---|---|---|
//! | `BatchNormalization` | `Conv` | `Conv-BatchNormalization` |
//! | `Relu` | `Conv-BatchNormalization`, `BatchNormalization`, `Conv` | tail + `-Relu` |

use crate::PartitionerConfig;
use std::fmt;

/// An operator chain executed as one unit, e.g. `Conv-BatchNormalization-Relu`.
///
/// Kept as a list of operator types; the hyphen-joined form is only
/// produced for display and serialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeOp {
    ops: Vec<String>,
}

impl CompositeOp {
    /// A single, unfused operator.
    pub fn single(op_type: &str) -> Self {
        Self {
            ops: vec![op_type.to_string()],
        }
    }

    /// The operator chain, first operator first.
    pub fn ops(&self) -> &[String] {
        &self.ops
    }

    /// The first operator of the chain.
    pub fn base(&self) -> &str {
        &self.ops[0]
    }

    /// Number of fused operators.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Always `false`: a composite holds at least one operator.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Returns `true` if the chain is exactly `chain`.
    pub fn is(&self, chain: &[&str]) -> bool {
        self.ops.len() == chain.len() && self.ops.iter().zip(chain).all(|(a, b)| a == b)
    }

    fn extended(&self, op_type: &str) -> Self {
        let mut ops = self.ops.clone();
        ops.push(op_type.to_string());
        Self { ops }
    }
}

impl fmt::Display for CompositeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ops.join("-"))
    }
}

impl serde::Serialize for CompositeOp {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

const CONV: &[&str] = &["Conv"];
const BATCH_NORM: &[&str] = &["BatchNormalization"];
const CONV_BATCH_NORM: &[&str] = &["Conv", "BatchNormalization"];

/// One fusion rule: `candidate` fuses onto any tail chain listed in `tails`.
#[derive(Debug, Clone)]
struct FusionRule {
    candidate: &'static str,
    tails: Vec<&'static [&'static str]>,
}

/// The ordered fusion table.
#[derive(Debug, Clone)]
pub struct FusionRules {
    rules: Vec<FusionRule>,
}

impl FusionRules {
    /// The full rule table.
    pub fn standard() -> Self {
        Self {
            rules: vec![
                FusionRule {
                    candidate: "BatchNormalization",
                    tails: vec![CONV],
                },
                FusionRule {
                    candidate: "Relu",
                    tails: vec![CONV_BATCH_NORM, BATCH_NORM, CONV],
                },
            ],
        }
    }

    /// The rule table as selected by the configuration.
    ///
    /// With `fuse_conv_relu = false` a `Relu` only fuses after a
    /// `BatchNormalization`.
    pub fn from_config(config: &PartitionerConfig) -> Self {
        let mut rules = Self::standard();
        if !config.fuse_conv_relu {
            for rule in &mut rules.rules {
                if rule.candidate == "Relu" {
                    rule.tails.retain(|chain| *chain != CONV);
                }
            }
        }
        rules
    }

    /// Tries to fuse a node of type `candidate` onto the tail member's chain.
    ///
    /// Rules are tried in table order; the first match wins.
    pub fn try_fuse(&self, tail: &CompositeOp, candidate: &str) -> Option<CompositeOp> {
        self.rules
            .iter()
            .filter(|rule| rule.candidate == candidate)
            .find(|rule| rule.tails.iter().any(|chain| tail.is(chain)))
            .map(|_| tail.extended(candidate))
    }
}

impl Default for FusionRules {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(ops: &[&str]) -> CompositeOp {
        let mut c = CompositeOp::single(ops[0]);
        for op in &ops[1..] {
            c = c.extended(op);
        }
        c
    }

    #[test]
    fn test_conv_bn_relu_chain() {
        let rules = FusionRules::standard();
        let conv = CompositeOp::single("Conv");
        let conv_bn = rules.try_fuse(&conv, "BatchNormalization").unwrap();
        assert_eq!(conv_bn.to_string(), "Conv-BatchNormalization");
        let conv_bn_relu = rules.try_fuse(&conv_bn, "Relu").unwrap();
        assert_eq!(conv_bn_relu.to_string(), "Conv-BatchNormalization-Relu");
        assert_eq!(conv_bn_relu.base(), "Conv");
        assert_eq!(conv_bn_relu.len(), 3);
    }

    #[test]
    fn test_relu_after_bn_and_conv() {
        let rules = FusionRules::standard();
        let bn = CompositeOp::single("BatchNormalization");
        assert_eq!(
            rules.try_fuse(&bn, "Relu").unwrap().to_string(),
            "BatchNormalization-Relu"
        );
        let conv = CompositeOp::single("Conv");
        assert_eq!(rules.try_fuse(&conv, "Relu").unwrap().to_string(), "Conv-Relu");
    }

    #[test]
    fn test_no_match() {
        let rules = FusionRules::standard();
        assert!(rules.try_fuse(&CompositeOp::single("MaxPool"), "Relu").is_none());
        assert!(rules
            .try_fuse(&CompositeOp::single("BatchNormalization"), "BatchNormalization")
            .is_none());
        assert!(rules.try_fuse(&chain(&["Conv", "Relu"]), "Relu").is_none());
        assert!(rules
            .try_fuse(&chain(&["Conv", "BatchNormalization", "Relu"]), "Relu")
            .is_none());
        assert!(rules.try_fuse(&CompositeOp::single("Conv"), "MaxPool").is_none());
    }

    #[test]
    fn test_config_disables_conv_relu() {
        let config = PartitionerConfig {
            fuse_conv_relu: false,
            ..Default::default()
        };
        let rules = FusionRules::from_config(&config);
        assert!(rules.try_fuse(&CompositeOp::single("Conv"), "Relu").is_none());
        assert!(rules
            .try_fuse(&chain(&["Conv", "BatchNormalization"]), "Relu")
            .is_some());
        assert!(rules
            .try_fuse(&CompositeOp::single("BatchNormalization"), "Relu")
            .is_some());
    }

    #[test]
    fn test_serialize_as_string() {
        let c = chain(&["Conv", "BatchNormalization"]);
        assert_eq!(
            serde_json::to_string(&c).unwrap(),
            "\"Conv-BatchNormalization\""
        );
    }
}
