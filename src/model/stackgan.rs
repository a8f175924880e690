//! Two-stage generator orchestration.
//!
//! Stage-I decodes a conditioning code plus noise into a low-resolution image;
//! Stage-II refines that image with a second, independently sampled code.

use crate::{
    config::{Config, MAX_SAMPLES_PER_SENTENCE},
    model::{stage_one::StageOneGenerator, stage_two::StageTwoGenerator},
    perf::{self, Metric},
    weights::{load_state_dict, map_gan_name},
};
use burn::tensor::{backend::Backend, Tensor};

/// One generated sample per embedding row, at both resolutions.
#[derive(Debug, Clone)]
pub struct GeneratedSamples<B: Backend> {
    /// `[batch, 3, lr, lr]` in `[-1, 1]`.
    pub low_res: Tensor<B, 4>,
    /// `[batch, 3, hr, hr]` in `[-1, 1]`.
    pub high_res: Tensor<B, 4>,
}

/// The full StackGAN generator.
#[derive(Debug, Clone)]
pub struct StackGan<B: Backend> {
    pub stage_one: StageOneGenerator<B>,
    pub stage_two: StageTwoGenerator<B>,
    /// Whether [`StackGan::generate_n`] samples conditioning codes.
    pub augment: bool,
    pub text_dim: usize,
}

impl<B: Backend> StackGan<B> {
    /// Build a randomly initialised generator for `text_dim`-wide embeddings.
    pub fn init(config: &Config, text_dim: usize, device: &B::Device) -> Self {
        Self {
            stage_one: StageOneGenerator::init(config, text_dim, device),
            stage_two: StageTwoGenerator::init(config, text_dim, device),
            augment: config.test.augment,
            text_dim,
        }
    }

    /// Build the generator and load `config.test.pretrained_model`.
    ///
    /// Checkpoints may use dotted module paths or TensorFlow variable names.
    /// Any missing or mis-shaped tensor fails the load.
    pub fn from_config(config: &Config, text_dim: usize, device: &B::Device) -> anyhow::Result<Self> {
        let _span = perf::span(Metric::GeneratorLoad);
        let mut model = Self::init(config, text_dim, device);
        let checkpoint = &config.test.pretrained_model;
        let mut state = load_state_dict(checkpoint, map_gan_name)?;
        if state.is_empty() {
            anyhow::bail!("No generator tensors found in {checkpoint}");
        }
        model.stage_one.load_state_dict(&mut state, device)?;
        model.stage_two.load_state_dict(&mut state, device)?;
        state.warn_unused(checkpoint);
        log::info!("Loaded generator weights from {checkpoint}");
        Ok(model)
    }

    /// Generate one low/high resolution pair per embedding row.
    pub fn generate(&self, embeddings: Tensor<B, 2>, augment: bool) -> GeneratedSamples<B> {
        let low_res = {
            let _span = perf::span(Metric::StageOne);
            self.stage_one.generate(embeddings.clone(), augment)
        };
        let high_res = {
            let _span = perf::span(Metric::StageTwo);
            self.stage_two.generate(low_res.clone(), embeddings, augment)
        };
        GeneratedSamples { low_res, high_res }
    }

    /// Generate up to `n` samples per row (capped at 16), each with fresh noise.
    pub fn generate_n(&self, embeddings: Tensor<B, 2>, n: usize) -> Vec<GeneratedSamples<B>> {
        let _span = perf::span(Metric::GenerateBatch);
        let rows = embeddings.dims()[0] as u64;
        let count = n.min(MAX_SAMPLES_PER_SENTENCE);
        if n > count {
            log::warn!("Requested {n} samples per sentence, generating {count}");
        }
        (0..count)
            .map(|_| {
                let samples = self.generate(embeddings.clone(), self.augment);
                perf::add_count(Metric::SamplesGenerated, rows);
                samples
            })
            .collect()
    }
}
