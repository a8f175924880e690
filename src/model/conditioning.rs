//! Conditioning augmentation.
//!
//! A text embedding is projected to a mean and a log standard deviation; the
//! conditioning code is drawn from that Gaussian so nearby codes decode to
//! plausible images for the same sentence.

use crate::modules::linear::LinearOp;
use crate::weights::StateDict;
use anyhow::Result;
use burn::tensor::{
    activation::leaky_relu, backend::Backend, Bool, Distribution, ElementConversion, Tensor,
};

/// Noise values are kept within this many standard deviations.
pub const TRUNCATION: f32 = 2.0;
/// Redraw rounds before clamping the remaining outliers.
const MAX_REDRAWS: usize = 10;
const LEAKINESS: f64 = 0.2;

/// Learned `embedding → (mean, log_sigma)` projection.
#[derive(Debug, Clone)]
pub struct ConditioningAugmentation<B: Backend> {
    pub fc: LinearOp<B>,
    pub ef_dim: usize,
}

impl<B: Backend> ConditioningAugmentation<B> {
    pub fn init(text_dim: usize, ef_dim: usize, device: &B::Device) -> Self {
        Self {
            fc: LinearOp::init(text_dim, ef_dim * 2, device),
            ef_dim,
        }
    }

    /// Load `{prefix}.fc.weight` / `{prefix}.fc.bias`.
    pub fn load(&mut self, state: &mut StateDict, prefix: &str, device: &B::Device) -> Result<()> {
        self.fc.load(state, &format!("{prefix}.fc"), device)
    }

    /// Compute `(mean, log_sigma)`, each `[batch, ef_dim]`.
    pub fn condition(&self, embeddings: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let projected = leaky_relu(self.fc.forward(embeddings), LEAKINESS);
        let mean = projected.clone().narrow(1, 0, self.ef_dim);
        let log_sigma = projected.narrow(1, self.ef_dim, self.ef_dim);
        (mean, log_sigma)
    }

    /// Draw a conditioning code, or return the mean when `augment` is false.
    pub fn sample(&self, embeddings: Tensor<B, 2>, augment: bool) -> Tensor<B, 2> {
        let (mean, log_sigma) = self.condition(embeddings);
        if !augment {
            return mean;
        }
        let epsilon = truncated_normal::<B>(mean.dims(), &mean.device());
        mean + log_sigma.exp() * epsilon
    }
}

/// Standard normal noise with values outside `±TRUNCATION` redrawn.
///
/// Values still out of range after the last redraw are clamped.
pub fn truncated_normal<B: Backend>(shape: [usize; 2], device: &B::Device) -> Tensor<B, 2> {
    let mut noise = Tensor::<B, 2>::random(shape, Distribution::Normal(0.0, 1.0), device);
    let mut mask = out_of_bounds(noise.clone());
    let mut remaining: bool = mask.clone().any().into_scalar().elem();
    let mut attempts = 0;
    while remaining && attempts < MAX_REDRAWS {
        let resample = Tensor::<B, 2>::random(shape, Distribution::Normal(0.0, 1.0), device);
        noise = noise.mask_where(mask, resample);
        mask = out_of_bounds(noise.clone());
        remaining = mask.clone().any().into_scalar().elem();
        attempts += 1;
    }
    if remaining {
        noise = noise.clamp(-TRUNCATION, TRUNCATION);
    }
    noise
}

fn out_of_bounds<B: Backend>(noise: Tensor<B, 2>) -> Tensor<B, 2, Bool> {
    noise.abs().greater_elem(TRUNCATION)
}
