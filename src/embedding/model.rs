//! CNN sentence encoder.
//!
//! The network is the feature extractor of a text classifier:
//! token lookup → conv → max-pool → conv → max-pool → flatten → dense + ReLU.
//! The dense activation is the sentence embedding; the classifier head that
//! follows it during training is never loaded.

use super::tokenizer::SentenceTokenizer;
use crate::config::EmbeddingConfig;
use crate::modules::conv::Conv1dOp;
use crate::modules::linear::LinearOp;
use crate::perf::{self, Metric};
use crate::weights::{load_state_dict, map_encoder_name, StateDict};
use anyhow::Result;
use burn::module::Param;
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};
use burn_nn::{Embedding, EmbeddingConfig as LookupConfig};
use std::path::Path;

/// Weights file inside a caption-model directory.
pub const ENCODER_WEIGHTS_FILE: &str = "model.safetensors";
/// Tokenizer file inside a caption-model directory.
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Frozen sentence encoder plus its fitted tokenizer.
#[derive(Debug)]
pub struct SentenceEncoder<B: Backend> {
    pub tokenizer: SentenceTokenizer,
    pub lookup: Embedding<B>,
    pub conv1: Conv1dOp<B>,
    pub conv2: Conv1dOp<B>,
    pub dense: LinearOp<B>,
    pub pool_sizes: [usize; 2],
    pub max_len: usize,
}

impl<B: Backend> SentenceEncoder<B> {
    /// Load `model.safetensors` and `tokenizer.json` from a model directory.
    pub fn from_dir(
        dir: impl AsRef<Path>,
        config: &EmbeddingConfig,
        device: &B::Device,
    ) -> Result<Self> {
        let _span = perf::span(Metric::EncoderLoad);
        let dir = dir.as_ref();
        if !dir.is_dir() {
            anyhow::bail!("Caption model directory not found: {}", dir.display());
        }
        let tokenizer = SentenceTokenizer::open(dir.join(TOKENIZER_FILE))?;
        let mut state = load_state_dict(dir.join(ENCODER_WEIGHTS_FILE), map_encoder_name)?;
        let encoder = Self::from_state(&mut state, tokenizer, config, device)?;
        state.warn_unused("sentence encoder");
        Ok(encoder)
    }

    /// Build the encoder from mapped tensors, inferring layer sizes from shapes.
    pub fn from_state(
        state: &mut StateDict,
        tokenizer: SentenceTokenizer,
        config: &EmbeddingConfig,
        device: &B::Device,
    ) -> Result<Self> {
        let table: Tensor<B, 2> = state.take("embedding.weight", device)?;
        let [vocab, word_dim] = table.dims();
        if tokenizer.max_id() as usize >= vocab {
            anyhow::bail!(
                "Tokenizer emits ids up to {} but the embedding table has {vocab} rows",
                tokenizer.max_id()
            );
        }
        let mut lookup = LookupConfig::new(vocab, word_dim).init::<B>(device);
        lookup.weight = Param::from_tensor(table);

        let conv1 = Conv1dOp::from_state(state, "conv1", device)?;
        if conv1.in_channels() != word_dim {
            anyhow::bail!(
                "conv1 expects {} input channels, word vectors have {word_dim}",
                conv1.in_channels()
            );
        }
        let conv2 = Conv1dOp::from_state(state, "conv2", device)?;
        if conv2.in_channels() != conv1.out_channels() {
            anyhow::bail!(
                "conv2 expects {} input channels, conv1 produces {}",
                conv2.in_channels(),
                conv1.out_channels()
            );
        }

        let [pool1, pool2] = config.pool_sizes;
        if pool1 == 0 || pool2 == 0 {
            anyhow::bail!("Pool sizes must be > 0, got {:?}", config.pool_sizes);
        }
        let steps = conv2.output_len(conv1.output_len(config.max_sent_length) / pool1) / pool2;
        if steps == 0 {
            anyhow::bail!(
                "max_sent_length {} is too short for the encoder",
                config.max_sent_length
            );
        }
        let flat = steps * conv2.out_channels();

        let dense_shape = state.shape("dense.weight")?;
        if dense_shape.len() != 2 || dense_shape[0] != flat {
            anyhow::bail!(
                "dense.weight has shape {dense_shape:?}, expected [{flat}, _] for max_sent_length {}",
                config.max_sent_length
            );
        }
        let mut dense = LinearOp::init(flat, dense_shape[1], device);
        dense.load(state, "dense", device)?;

        Ok(Self {
            tokenizer,
            lookup,
            conv1,
            conv2,
            dense,
            pool_sizes: config.pool_sizes,
            max_len: config.max_sent_length,
        })
    }

    /// Size of the produced embedding vectors.
    pub fn embedding_dim(&self) -> usize {
        self.dense.d_out()
    }

    /// Tokenize and pad normalized sentences into a `[n, max_len]` tensor.
    pub fn tokenize(&self, texts: &[String]) -> Tensor<B, 2, Int> {
        let sequences = self.tokenizer.encode_padded(texts, self.max_len);
        let flat: Vec<i64> = sequences
            .into_iter()
            .flatten()
            .map(|id| id as i64)
            .collect();
        let device = self.conv1.weight.device();
        Tensor::from_data(TensorData::new(flat, [texts.len(), self.max_len]), &device)
    }

    /// Embed normalized sentences into a `[n, embedding_dim]` tensor.
    pub fn embed(&self, texts: &[String]) -> Result<Tensor<B, 2>> {
        let _span = perf::span(Metric::EncoderEmbed);
        if texts.is_empty() {
            anyhow::bail!("No sentences to embed");
        }
        perf::add_count(Metric::SentencesEmbedded, texts.len() as u64);
        Ok(self.forward(self.tokenize(texts)))
    }

    /// Inference forward pass (dropout is the identity here).
    pub fn forward(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let words = self.lookup.forward(tokens).swap_dims(1, 2);
        let hidden = max_pool_1d(relu(self.conv1.forward(words)), self.pool_sizes[0]);
        let hidden = max_pool_1d(relu(self.conv2.forward(hidden)), self.pool_sizes[1]);
        // Flatten steps-major to match the channels-last layout the dense layer was trained on.
        let [batch, channels, steps] = hidden.dims();
        let flat = hidden.swap_dims(1, 2).reshape([batch, steps * channels]);
        relu(self.dense.forward(flat))
    }
}

/// Non-overlapping max pooling over the last axis; trailing steps are dropped.
fn max_pool_1d<B: Backend>(input: Tensor<B, 3>, pool: usize) -> Tensor<B, 3> {
    let [batch, channels, len] = input.dims();
    let steps = len / pool;
    input
        .narrow(2, 0, steps * pool)
        .reshape([batch, channels, steps, pool])
        .max_dim(3)
        .reshape([batch, channels, steps])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::TensorData as WeightTensor;
    use burn_ndarray::{NdArray, NdArrayDevice};
    use safetensors::Dtype;

    type TestBackend = NdArray<f32>;

    fn weight(shape: Vec<usize>) -> WeightTensor {
        let len: usize = shape.iter().product();
        let values: Vec<f32> = (0..len).map(|i| ((i % 7) as f32 - 3.0) * 0.1).collect();
        WeightTensor {
            dtype: Dtype::F32,
            shape,
            data: values.into_iter().flat_map(f32::to_le_bytes).collect(),
        }
    }

    fn tiny_state(dense_in: usize) -> StateDict {
        StateDict::from_tensors([
            ("embedding.weight".to_string(), weight(vec![6, 4])),
            ("conv1.weight".to_string(), weight(vec![3, 4, 5])),
            ("conv1.bias".to_string(), weight(vec![5])),
            ("conv2.weight".to_string(), weight(vec![3, 5, 3])),
            ("conv2.bias".to_string(), weight(vec![3])),
            ("dense.weight".to_string(), weight(vec![dense_in, 8])),
            ("dense.bias".to_string(), weight(vec![8])),
        ])
    }

    fn tokenizer() -> SentenceTokenizer {
        SentenceTokenizer::from_word_index(
            ["a", "small", "red", "bird", "wings"]
                .into_iter()
                .enumerate()
                .map(|(i, w)| (w.to_string(), i as u32 + 1)),
            None,
        )
    }

    fn config() -> EmbeddingConfig {
        // 30 → conv 28 → pool 14 → conv 12 → pool 4: flat = 4 * 3
        EmbeddingConfig {
            max_sent_length: 30,
            pool_sizes: [2, 3],
        }
    }

    #[test]
    fn max_pool_drops_trailing_steps() {
        let device = NdArrayDevice::default();
        let input = Tensor::<TestBackend, 3>::from_data(
            TensorData::new(vec![1.0f32, 5.0, 2.0, 3.0, 9.0], [1, 1, 5]),
            &device,
        );
        let output = max_pool_1d(input, 2).to_data();
        assert_eq!(output.as_slice::<f32>().expect("slice"), &[5.0, 3.0]);
    }

    #[test]
    fn embeds_to_dense_dimension_deterministically() {
        let device = NdArrayDevice::default();
        let mut state = tiny_state(12);
        let encoder =
            SentenceEncoder::<TestBackend>::from_state(&mut state, tokenizer(), &config(), &device)
                .expect("build encoder");
        assert!(state.is_empty());
        assert_eq!(encoder.embedding_dim(), 8);

        let texts = vec!["a small red bird".to_string(), "wings".to_string()];
        let first = encoder.embed(&texts).expect("embed");
        assert_eq!(first.dims(), [2, 8]);
        let second = encoder.embed(&texts).expect("embed");
        let first = first.to_data();
        let second = second.to_data();
        let first = first.as_slice::<f32>().expect("slice");
        assert_eq!(first, second.as_slice::<f32>().expect("slice"));
        assert!(first.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn rejects_incompatible_dense_layer() {
        let device = NdArrayDevice::default();
        let mut state = tiny_state(10);
        let err =
            SentenceEncoder::<TestBackend>::from_state(&mut state, tokenizer(), &config(), &device)
                .unwrap_err();
        assert!(err.to_string().contains("dense.weight"));
    }

    #[test]
    fn rejects_tokenizer_larger_than_table() {
        let device = NdArrayDevice::default();
        let mut state = tiny_state(12);
        let big = SentenceTokenizer::from_word_index([("bird".to_string(), 40)], None);
        let err = SentenceEncoder::<TestBackend>::from_state(&mut state, big, &config(), &device)
            .unwrap_err();
        assert!(err.to_string().contains("embedding table"));
    }

    #[test]
    fn missing_directory_errors() {
        let device = NdArrayDevice::default();
        let err = SentenceEncoder::<TestBackend>::from_dir("no/such/dir", &config(), &device)
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn empty_input_is_rejected() {
        let device = NdArrayDevice::default();
        let mut state = tiny_state(12);
        let encoder =
            SentenceEncoder::<TestBackend>::from_state(&mut state, tokenizer(), &config(), &device)
                .expect("build encoder");
        assert!(encoder.embed(&[]).is_err());
    }
}
