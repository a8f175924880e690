//! Shared test utilities: tiny configs and synthetic checkpoints.
#![allow(dead_code)]

use burn::tensor::TensorData;
use burn_ndarray::NdArray;
use safetensors::{tensor::TensorView, Dtype};
use stackgen::Config;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub type TestBackend = NdArray<f32>;

/// Width of the sentence embeddings produced by [`write_caption_model`].
pub const TEXT_DIM: usize = 10;
const WORD_DIM: usize = 4;
const CONV1_CHANNELS: usize = 5;
const CONV2_CHANNELS: usize = 6;
const KERNEL: usize = 3;
const MAX_SENT_LENGTH: usize = 30;
const POOL_SIZES: [usize; 2] = [2, 3];
const VOCAB: &[&str] = &["a", "small", "bird", "with", "red", "wings", "yellow", "belly"];

/// One named tensor ready for serialization.
pub struct FixtureTensor {
    pub name: String,
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

impl FixtureTensor {
    /// Deterministic small values; batch-norm scales are kept at one.
    pub fn new(name: impl Into<String>, shape: Vec<usize>) -> Self {
        let name = name.into();
        let len: usize = shape.iter().product();
        let unit = name.ends_with("gamma") || name.ends_with("moving_variance");
        let seed = name.len() as f32;
        let values = (0..len)
            .map(|idx| {
                if unit {
                    1.0
                } else {
                    0.05 * ((idx as f32 + seed) * 0.37).sin()
                }
            })
            .collect();
        Self { name, shape, values }
    }
}

/// A small generator that still exercises every layer.
pub fn tiny_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.z_dim = 8;
    config.gan.ef_dim = 4;
    config.gan.gf_dim = 4;
    config.test.lr_imsize = 16;
    config.test.hr_imsize = 32;
    config.test.batch_size = 3;
    config.test.num_samples = 2;
    config.test.pretrained_model = dir.join("stackgan.safetensors").to_string_lossy().into_owned();
    config.embedding.max_sent_length = MAX_SENT_LENGTH;
    config.embedding.pool_sizes = POOL_SIZES;
    config
}

/// YAML equivalent of [`tiny_config`], with a relative checkpoint path.
pub fn tiny_config_yaml() -> String {
    format!(
        "z_dim: 8\n\
         gan:\n  ef_dim: 4\n  gf_dim: 4\n\
         test:\n  lr_imsize: 16\n  hr_imsize: 32\n  batch_size: 3\n  num_samples: 2\n  \
         pretrained_model: stackgan.safetensors\n\
         embedding:\n  max_sent_length: {MAX_SENT_LENGTH}\n  pool_sizes: [{}, {}]\n",
        POOL_SIZES[0], POOL_SIZES[1]
    )
}

/// DejaVu Sans Mono, checked in under `tests/fixtures`.
pub fn fixture_font_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/DejaVuSansMono.ttf")
}

/// Serialize tensors to a SafeTensors file.
pub fn write_safetensors(path: &Path, tensors: &[FixtureTensor]) {
    let bytes: Vec<Vec<u8>> = tensors
        .iter()
        .map(|t| t.values.iter().flat_map(|v| v.to_le_bytes()).collect())
        .collect();
    let mut views = HashMap::new();
    for (tensor, data) in tensors.iter().zip(&bytes) {
        let view = TensorView::new(Dtype::F32, tensor.shape.clone(), data).expect("tensor view");
        views.insert(tensor.name.clone(), view);
    }
    let serialized = safetensors::serialize(&views, &None).expect("serialize");
    std::fs::write(path, serialized).expect("write safetensors");
}

/// Write `model.safetensors` and `tokenizer.json` using Keras names.
pub fn write_caption_model(dir: &Path) {
    std::fs::create_dir_all(dir).expect("create caption model dir");
    let word_index: HashMap<&str, u32> = VOCAB
        .iter()
        .enumerate()
        .map(|(idx, word)| (*word, idx as u32 + 1))
        .collect();
    let encoded = serde_json::to_string(&word_index).expect("encode word index");
    let tokenizer = serde_json::json!({
        "class_name": "Tokenizer",
        "config": { "num_words": null, "lower": true, "split": " ", "word_index": encoded }
    });
    std::fs::write(dir.join("tokenizer.json"), tokenizer.to_string()).expect("write tokenizer");

    let steps = ((MAX_SENT_LENGTH - KERNEL + 1) / POOL_SIZES[0] - KERNEL + 1) / POOL_SIZES[1];
    let flat = steps * CONV2_CHANNELS;
    let tensors = vec![
        FixtureTensor::new("embedding_1/embeddings:0", vec![VOCAB.len() + 2, WORD_DIM]),
        FixtureTensor::new("conv1d_1/kernel:0", vec![KERNEL, WORD_DIM, CONV1_CHANNELS]),
        FixtureTensor::new("conv1d_1/bias:0", vec![CONV1_CHANNELS]),
        FixtureTensor::new("conv1d_2/kernel:0", vec![KERNEL, CONV1_CHANNELS, CONV2_CHANNELS]),
        FixtureTensor::new("conv1d_2/bias:0", vec![CONV2_CHANNELS]),
        FixtureTensor::new("embedding/kernel:0", vec![flat, TEXT_DIM]),
        FixtureTensor::new("embedding/bias:0", vec![TEXT_DIM]),
        FixtureTensor::new("dense_1/kernel:0", vec![TEXT_DIM, 3]),
    ];
    write_safetensors(&dir.join("model.safetensors"), &tensors);
}

fn conv_block(out: &mut Vec<FixtureTensor>, prefix: &str, layer: (usize, usize, usize), bn: bool) {
    let (in_c, out_c, kernel) = layer;
    out.push(FixtureTensor::new(format!("{prefix}.conv"), vec![kernel, kernel, in_c, out_c]));
    if bn {
        batch_norm(out, &format!("{prefix}.bn"), out_c);
    }
}

fn batch_norm(out: &mut Vec<FixtureTensor>, prefix: &str, channels: usize) {
    for stat in ["gamma", "beta", "moving_mean", "moving_variance"] {
        out.push(FixtureTensor::new(format!("{prefix}.{stat}"), vec![channels]));
    }
}

fn linear(out: &mut Vec<FixtureTensor>, prefix: &str, d_in: usize, d_out: usize) {
    out.push(FixtureTensor::new(format!("{prefix}.weight"), vec![d_in, d_out]));
    out.push(FixtureTensor::new(format!("{prefix}.bias"), vec![d_out]));
}

/// Every generator tensor for `config`, under dotted module paths.
pub fn gan_tensors(config: &Config, text_dim: usize) -> Vec<FixtureTensor> {
    let gf = config.gan.gf_dim;
    let ef = config.gan.ef_dim;
    let s16 = config.test.lr_imsize / 16;
    let fc_out = s16 * s16 * gf * 8;
    let mut out = Vec::new();

    linear(&mut out, "stage1.ca.fc", text_dim, ef * 2);
    linear(&mut out, "stage1.fc", ef + config.z_dim, fc_out);
    batch_norm(&mut out, "stage1.fc_bn", fc_out);
    for (idx, layer) in [(gf * 8, gf * 2, 1), (gf * 2, gf * 2, 3), (gf * 2, gf * 8, 3)]
        .into_iter()
        .enumerate()
    {
        conv_block(&mut out, &format!("stage1.res1.{idx}"), layer, true);
    }
    conv_block(&mut out, "stage1.up1", (gf * 8, gf * 4, 3), true);
    for (idx, layer) in [(gf * 4, gf, 1), (gf, gf, 3), (gf, gf * 4, 3)].into_iter().enumerate() {
        conv_block(&mut out, &format!("stage1.res2.{idx}"), layer, true);
    }
    conv_block(&mut out, "stage1.up2", (gf * 4, gf * 2, 3), true);
    conv_block(&mut out, "stage1.up3", (gf * 2, gf, 3), true);
    conv_block(&mut out, "stage1.out", (gf, 3, 3), false);

    linear(&mut out, "stage2.ca.fc", text_dim, ef * 2);
    conv_block(&mut out, "stage2.encode.0", (3, gf, 3), false);
    conv_block(&mut out, "stage2.encode.1", (gf, gf * 2, 4), true);
    conv_block(&mut out, "stage2.encode.2", (gf * 2, gf * 4, 4), true);
    conv_block(&mut out, "stage2.joint", (gf * 4 + ef, gf * 4, 3), true);
    for res in 0..4 {
        for idx in 0..2 {
            conv_block(&mut out, &format!("stage2.res.{res}.{idx}"), (gf * 4, gf * 4, 3), true);
        }
    }
    let mut channels = gf * 4;
    for step in 0..config.upsample_steps() {
        let next = (gf * 4) >> (step + 1);
        conv_block(&mut out, &format!("stage2.up.{step}"), (channels, next, 3), true);
        channels = next;
    }
    conv_block(&mut out, "stage2.out", (channels, 3, 3), false);
    out
}

/// Rename dotted paths to TensorFlow variable names (`g_net/...:0`).
pub fn to_tf_names(tensors: Vec<FixtureTensor>) -> Vec<FixtureTensor> {
    tensors
        .into_iter()
        .map(|mut tensor| {
            let scoped = if let Some(rest) = tensor.name.strip_prefix("stage1.") {
                format!("g_net/{rest}")
            } else if let Some(rest) = tensor.name.strip_prefix("stage2.") {
                format!("hr_g_net/{rest}")
            } else {
                tensor.name.clone()
            };
            tensor.name = format!("{}:0", scoped.replace('.', "/"));
            tensor
        })
        .collect()
}

/// Write a complete generator checkpoint to `config.test.pretrained_model`.
pub fn write_gan_checkpoint(config: &Config) {
    write_safetensors(
        Path::new(&config.test.pretrained_model),
        &gan_tensors(config, TEXT_DIM),
    );
}

/// Flatten tensor data to a `Vec<f32>`.
pub fn values(data: TensorData) -> Vec<f32> {
    data.to_vec::<f32>().expect("f32 values")
}
