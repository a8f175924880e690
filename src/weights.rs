//! SafeTensors weight loading and name mapping utilities.
//!
//! Checkpoints exported from the training frameworks use their own variable
//! names (`g_net/fc/weight:0`, `conv1d_1/kernel:0`, ...). These helpers
//! translate them into the module paths used by this crate and hand out typed
//! Burn tensors with shape checks.

use anyhow::Result;
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData as BurnTensorData};
use safetensors::{Dtype, SafeTensors};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Raw tensor payload extracted from a SafeTensors file.
#[derive(Debug, Clone)]
pub struct TensorData {
    /// Scalar dtype in the file.
    pub dtype: Dtype,
    /// Shape as a list of dimensions.
    pub shape: Vec<usize>,
    /// Raw byte buffer in row-major order.
    pub data: Vec<u8>,
}

impl TensorData {
    /// Create TensorData from a safetensors TensorView.
    pub fn from_safetensor(tensor: safetensors::tensor::TensorView<'_>) -> Self {
        Self {
            dtype: tensor.dtype(),
            shape: tensor.shape().to_vec(),
            data: tensor.data().to_vec(),
        }
    }

    /// Decode the payload into `f32` values.
    pub fn to_f32(&self) -> Result<Vec<f32>> {
        let values = match self.dtype {
            Dtype::F32 => self
                .data
                .chunks_exact(4)
                .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect(),
            Dtype::BF16 => self
                .data
                .chunks_exact(2)
                .map(|chunk| {
                    let bits = u16::from_le_bytes([chunk[0], chunk[1]]) as u32;
                    f32::from_bits(bits << 16)
                })
                .collect(),
            other => anyhow::bail!("Unsupported dtype {:?}", other),
        };
        Ok(values)
    }
}

/// Named tensors from one checkpoint, consumed as modules claim them.
#[derive(Debug, Default)]
pub struct StateDict {
    tensors: BTreeMap<String, TensorData>,
}

impl StateDict {
    /// Build a state dict from already-mapped tensors.
    pub fn from_tensors(tensors: impl IntoIterator<Item = (String, TensorData)>) -> Self {
        Self {
            tensors: tensors.into_iter().collect(),
        }
    }

    /// Number of tensors not yet claimed.
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// Returns true when every tensor has been claimed.
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Returns true if a tensor with this name is still available.
    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    /// Names of tensors nobody claimed.
    pub fn remaining(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    /// Shape of a tensor without claiming it.
    pub fn shape(&self, name: &str) -> Result<&[usize]> {
        self.tensors
            .get(name)
            .map(|t| t.shape.as_slice())
            .ok_or_else(|| anyhow::anyhow!("Missing tensor '{name}' in checkpoint"))
    }

    /// Claim a tensor and convert it to a Burn tensor of rank `D`.
    pub fn take<B: Backend, const D: usize>(
        &mut self,
        name: &str,
        device: &B::Device,
    ) -> Result<Tensor<B, D>> {
        let tensor = self
            .tensors
            .remove(name)
            .ok_or_else(|| anyhow::anyhow!("Missing tensor '{name}' in checkpoint"))?;
        let shape: [usize; D] = tensor.shape.clone().try_into().map_err(|_| {
            anyhow::anyhow!(
                "Expected {D}D tensor for '{name}', got shape {:?}",
                tensor.shape
            )
        })?;
        let values = tensor.to_f32()?;
        Ok(Tensor::from_data(BurnTensorData::new(values, shape), device))
    }

    /// Claim a tensor and verify it has exactly the expected shape.
    pub fn take_shaped<B: Backend, const D: usize>(
        &mut self,
        name: &str,
        expected: [usize; D],
        device: &B::Device,
    ) -> Result<Tensor<B, D>> {
        let tensor = self.take::<B, D>(name, device)?;
        let dims = tensor.dims();
        if dims != expected {
            anyhow::bail!("Shape mismatch for '{name}': expected {expected:?}, got {dims:?}");
        }
        Ok(tensor)
    }

    /// Log tensors that were present in the file but not used by any module.
    pub fn warn_unused(&self, checkpoint: &str) {
        for name in self.remaining() {
            log::warn!("{checkpoint}: ignoring unused tensor '{name}'");
        }
    }
}

/// Read a SafeTensors file, mapping every name through `map_name`.
///
/// Tensors for which `map_name` returns `None` are skipped.
pub fn load_state_dict(
    path: impl AsRef<Path>,
    map_name: impl Fn(&str) -> Option<String>,
) -> Result<StateDict> {
    let path = path.as_ref();
    if !path.exists() {
        anyhow::bail!("No such file or directory: {}", path.display());
    }
    let bytes = fs::read(path)?;
    let tensors = SafeTensors::deserialize(&bytes)?;
    let mut state = BTreeMap::new();

    for name in tensors.names() {
        if let Some(mapped) = map_name(name) {
            let tensor = tensors.tensor(name)?;
            state.insert(mapped, TensorData::from_safetensor(tensor));
        }
    }

    Ok(StateDict { tensors: state })
}

/// Map GAN checkpoint tensor names into Rust module paths.
///
/// Accepts both dotted module paths and TensorFlow variable names
/// (`g_net/...`, `hr_g_net/...`, with or without the `:0` suffix).
pub fn map_gan_name(name: &str) -> Option<String> {
    const GAN_SCOPE_MAP: &[(&str, &str)] = &[("hr_g_net/", "stage2."), ("g_net/", "stage1.")];
    const GAN_SKIP_PREFIXES: &[&str] = &["d_net", "hr_d_net", "global_step"];

    let name = name.strip_suffix(":0").unwrap_or(name);
    if GAN_SKIP_PREFIXES.iter().any(|prefix| name.starts_with(prefix)) {
        return None;
    }

    let name = map_prefix(name, GAN_SCOPE_MAP).unwrap_or_else(|| name.to_string());
    let name = name.replace('/', ".");
    if name.starts_with("stage1.") || name.starts_with("stage2.") {
        Some(name)
    } else {
        None
    }
}

/// Map sentence encoder tensor names into Rust module paths.
///
/// The Keras layer called `embedding` is the dense layer whose activation is
/// the sentence embedding; the token lookup table is `embedding_1`.
pub fn map_encoder_name(name: &str) -> Option<String> {
    const ENCODER_RENAME_EXACT: &[(&str, &str)] = &[
        ("embedding_1/embeddings", "embedding.weight"),
        ("conv1d_1/kernel", "conv1.weight"),
        ("conv1d_1/bias", "conv1.bias"),
        ("conv1d_2/kernel", "conv2.weight"),
        ("conv1d_2/bias", "conv2.bias"),
        ("embedding/kernel", "dense.weight"),
        ("embedding/bias", "dense.bias"),
    ];
    const ENCODER_KEEP: &[&str] = &[
        "embedding.weight",
        "conv1.weight",
        "conv1.bias",
        "conv2.weight",
        "conv2.bias",
        "dense.weight",
        "dense.bias",
    ];

    let name = name.strip_suffix(":0").unwrap_or(name);
    if let Some(mapped) = map_exact(name, ENCODER_RENAME_EXACT) {
        return Some(mapped);
    }
    if ENCODER_KEEP.contains(&name) {
        return Some(name.to_string());
    }
    // Classifier head and optimizer slots are not part of the embedding graph.
    None
}

/// Apply exact-match rename rules.
fn map_exact(name: &str, rules: &[(&str, &str)]) -> Option<String> {
    rules
        .iter()
        .find(|(from, _)| *from == name)
        .map(|(_, to)| (*to).to_string())
}

/// Apply prefix-based rename rules.
fn map_prefix(name: &str, rules: &[(&str, &str)]) -> Option<String> {
    for (prefix, target) in rules {
        if let Some(rest) = name.strip_prefix(prefix) {
            return Some(format!("{target}{rest}"));
        }
    }
    None
}
