// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Graph loading from manifest + SafeTensors files.
//!
//! The loader reads a graph directory containing:
//! - `graph.json`: the graph manifest (see [`GraphManifest`]).
//! - `constants.safetensors`: optional constant data in HuggingFace
//!   SafeTensors format.
//!
//! Constant data is copied out of the memory map into owned [`Tensor`]s,
//! so the resulting graph does not keep the file mapped.

use crate::graph::Validated;
use crate::{GraphError, GraphManifest, GraphView};
use std::collections::BTreeMap;
use std::path::Path;
use tensor_core::{DType, Shape, Tensor};

/// Default manifest filename.
pub const MANIFEST_FILE: &str = "graph.json";

/// Default SafeTensors filename.
pub const CONSTANTS_FILE: &str = "constants.safetensors";

/// Loads a graph from disk into a validated [`GraphView`].
///
/// # Example
/// ```no_run
/// use graph_ir::GraphLoader;
/// use std::path::Path;
///
/// let graph = GraphLoader::load(Path::new("./graphs/resnet-stem")).unwrap();
/// println!("{}", graph.summary());
/// ```
pub struct GraphLoader;

impl GraphLoader {
    /// Loads and validates a graph from the given directory.
    ///
    /// Steps:
    /// 1. Parse `graph.json` and validate it.
    /// 2. Read every tensor in `constants.safetensors`, if present.
    /// 3. Resolve declared constants (inline values or SafeTensors data).
    /// 4. Construct and validate the [`GraphView`].
    pub fn load(graph_dir: &Path) -> Result<GraphView<Validated>, GraphError> {
        let manifest = GraphManifest::from_file(&graph_dir.join(MANIFEST_FILE))?;
        manifest.validate()?;

        let stored = Self::read_constants(&graph_dir.join(CONSTANTS_FILE))?;
        Self::from_manifest_and_constants(&manifest, stored)
    }

    /// Builds a graph from a manifest and already-loaded constant data.
    ///
    /// Useful for testing without actual SafeTensors files. Stored tensors
    /// that the manifest does not declare are still kept as initializers.
    pub fn from_manifest_and_constants(
        manifest: &GraphManifest,
        mut stored: BTreeMap<String, Tensor>,
    ) -> Result<GraphView<Validated>, GraphError> {
        manifest.validate()?;

        for c in &manifest.constants {
            let dtype = DType::from_str_loose(&c.dtype).ok_or_else(|| {
                GraphError::InvalidGraph(format!(
                    "constant '{}' has unsupported dtype '{}'",
                    c.name, c.dtype
                ))
            })?;
            let shape = Shape::new(c.dims.clone());

            let tensor = match &c.values {
                Some(values) => inline_constant(&c.name, shape, dtype, values)?,
                None => {
                    let t = stored.get(&c.name).ok_or_else(|| {
                        GraphError::ConstantsError(format!(
                            "constant '{}' has no inline values and is missing from {CONSTANTS_FILE}",
                            c.name
                        ))
                    })?;
                    if t.shape() != &shape || t.dtype() != dtype {
                        return Err(GraphError::ConstantsError(format!(
                            "constant '{}' declared as {dtype}{shape} but stored as {}",
                            c.name,
                            t.summary(),
                        )));
                    }
                    continue;
                }
            };
            stored.insert(c.name.clone(), tensor);
        }

        GraphView::new(
            manifest.name.clone(),
            manifest.node_defs(),
            manifest.inputs.clone(),
            manifest.outputs.clone(),
        )
        .with_value_info(manifest.value_info.clone())
        .with_initializers(stored)
        .validate()
    }

    /// Reads all tensors from a SafeTensors file.
    ///
    /// A missing file yields an empty map; the graph may define all of its
    /// constants inline.
    fn read_constants(path: &Path) -> Result<BTreeMap<String, Tensor>, GraphError> {
        if !path.exists() {
            tracing::debug!("no constants file at '{}'", path.display());
            return Ok(BTreeMap::new());
        }

        let file = std::fs::File::open(path).map_err(|e| {
            GraphError::ConstantsError(format!("cannot open '{}': {e}", path.display()))
        })?;

        // Memory-map the file for zero-copy header parsing.
        let mmap = unsafe { memmap2::Mmap::map(&file) }
            .map_err(|e| GraphError::ConstantsError(format!("mmap failed: {e}")))?;

        let tensors = safetensors::SafeTensors::deserialize(&mmap).map_err(|e| {
            GraphError::ConstantsError(format!("SafeTensors parse error: {e}"))
        })?;

        let mut out = BTreeMap::new();
        for (name, view) in tensors.tensors() {
            let dtype = convert_safetensor_dtype(view.dtype())?;
            let shape = Shape::new(view.shape().to_vec());
            let tensor = Tensor::from_bytes(shape, dtype, view.data().to_vec()).map_err(
                |source| GraphError::InvalidConstant {
                    name: name.clone(),
                    source,
                },
            )?;
            out.insert(name, tensor);
        }

        tracing::info!(
            "loaded {} constants from '{}' ({:.2} MB)",
            out.len(),
            path.display(),
            mmap.len() as f64 / (1024.0 * 1024.0),
        );
        Ok(out)
    }
}

/// Builds a constant from inline manifest values.
fn inline_constant(
    name: &str,
    shape: Shape,
    dtype: DType,
    values: &[f64],
) -> Result<Tensor, GraphError> {
    let result = match dtype {
        DType::F32 => {
            let v: Vec<f32> = values.iter().map(|&x| x as f32).collect();
            Tensor::from_f32(shape, &v)
        }
        DType::I64 => {
            let v: Vec<i64> = values.iter().map(|&x| x as i64).collect();
            Tensor::from_i64(shape, &v)
        }
        other => {
            return Err(GraphError::InvalidGraph(format!(
                "inline values are only supported for f32 and i64 constants ('{name}' is {other})"
            )))
        }
    };
    result.map_err(|source| GraphError::InvalidConstant {
        name: name.to_string(),
        source,
    })
}

/// Converts a SafeTensors `Dtype` to our [`DType`].
fn convert_safetensor_dtype(st_dtype: safetensors::Dtype) -> Result<DType, GraphError> {
    match st_dtype {
        safetensors::Dtype::F32 => Ok(DType::F32),
        safetensors::Dtype::F16 => Ok(DType::F16),
        safetensors::Dtype::BF16 => Ok(DType::BF16),
        safetensors::Dtype::I8 => Ok(DType::I8),
        safetensors::Dtype::I32 => Ok(DType::I32),
        safetensors::Dtype::I64 => Ok(DType::I64),
        other => Err(GraphError::ConstantsError(format!(
            "unsupported SafeTensors dtype: {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_manifest(weight_inline: bool) -> GraphManifest {
        let constant = if weight_inline {
            r#"{ "name": "w", "dims": [2], "values": [0.5, -0.5] }"#
        } else {
            r#"{ "name": "w", "dims": [2] }"#
        };
        let json = format!(
            r#"{{
                "name": "tiny",
                "inputs": [{{ "name": "x", "elem_type": "tensor(float)", "shape": [1, 2, 4, 4] }}],
                "outputs": [{{ "name": "y" }}],
                "nodes": [
                    {{ "op_type": "Conv", "inputs": ["x", "w"], "outputs": ["c"] }},
                    {{ "op_type": "Relu", "inputs": ["c"], "outputs": ["y"] }}
                ],
                "constants": [{constant}]
            }}"#
        );
        GraphManifest::from_json(&json).unwrap()
    }

    fn write_constants(dir: &Path, name: &str, values: &[f32]) {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let view = safetensors::tensor::TensorView::new(
            safetensors::Dtype::F32,
            vec![values.len()],
            &bytes,
        )
        .unwrap();
        let data = safetensors::serialize(vec![(name.to_string(), view)], &None).unwrap();
        std::fs::write(dir.join(CONSTANTS_FILE), data).unwrap();
    }

    #[test]
    fn test_inline_constants() {
        let g = GraphLoader::from_manifest_and_constants(&sample_manifest(true), BTreeMap::new())
            .unwrap();
        assert_eq!(g.num_nodes(), 2);
        assert_eq!(
            g.initializer("w").unwrap().to_f32_vec().unwrap(),
            vec![0.5, -0.5]
        );
    }

    #[test]
    fn test_missing_stored_constant() {
        let result =
            GraphLoader::from_manifest_and_constants(&sample_manifest(false), BTreeMap::new());
        assert!(matches!(result, Err(GraphError::ConstantsError(_))));
    }

    #[test]
    fn test_stored_constant_shape_mismatch() {
        let mut stored = BTreeMap::new();
        stored.insert(
            "w".to_string(),
            Tensor::zeros(Shape::vector(3), DType::F32),
        );
        let result = GraphLoader::from_manifest_and_constants(&sample_manifest(false), stored);
        assert!(matches!(result, Err(GraphError::ConstantsError(_))));
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = sample_manifest(false);
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            serde_json::to_string_pretty(&manifest).unwrap(),
        )
        .unwrap();
        write_constants(dir.path(), "w", &[1.0, 2.0]);

        let g = GraphLoader::load(dir.path()).unwrap();
        assert_eq!(g.name, "tiny");
        assert_eq!(
            g.initializer("w").unwrap().to_f32_vec().unwrap(),
            vec![1.0, 2.0]
        );
    }

    #[test]
    fn test_load_without_constants_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            serde_json::to_string(&sample_manifest(true)).unwrap(),
        )
        .unwrap();
        let g = GraphLoader::load(dir.path()).unwrap();
        assert!(g.is_initializer("w"));
    }

    #[test]
    fn test_load_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            GraphLoader::load(dir.path()),
            Err(GraphError::ManifestReadError(_))
        ));
    }

    #[test]
    fn test_inline_unsupported_dtype() {
        let err = inline_constant("k", Shape::vector(1), DType::F16, &[1.0]).unwrap_err();
        assert!(err.to_string().contains("only supported"));
    }
}
