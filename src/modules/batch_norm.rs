//! Inference-mode batch normalization.
//!
//! Moving statistics are folded into a per-channel scale and shift at load
//! time, so the forward pass is a single multiply-add.

use crate::weights::StateDict;
use anyhow::Result;
use burn::tensor::{backend::Backend, Tensor};

/// Epsilon used by the generator's batch norm layers.
pub const BATCH_NORM_EPSILON: f32 = 1e-5;

/// Batch norm reduced to `x * scale + shift`.
#[derive(Debug, Clone)]
pub struct BatchNormOp<B: Backend> {
    /// `gamma / sqrt(moving_variance + eps)`, shape `[channels]`.
    pub scale: Tensor<B, 1>,
    /// `beta - moving_mean * scale`, shape `[channels]`.
    pub shift: Tensor<B, 1>,
}

impl<B: Backend> BatchNormOp<B> {
    /// Identity normalization over `channels`.
    pub fn init(channels: usize, device: &B::Device) -> Self {
        Self {
            scale: Tensor::ones([channels], device),
            shift: Tensor::zeros([channels], device),
        }
    }

    pub fn channels(&self) -> usize {
        self.scale.dims()[0]
    }

    /// Load `gamma`, `beta`, `moving_mean` and `moving_variance` under `prefix`.
    pub fn load(&mut self, state: &mut StateDict, prefix: &str, device: &B::Device) -> Result<()> {
        let channels = self.channels();
        let gamma: Tensor<B, 1> = state.take_shaped(&format!("{prefix}.gamma"), [channels], device)?;
        let beta: Tensor<B, 1> = state.take_shaped(&format!("{prefix}.beta"), [channels], device)?;
        let mean: Tensor<B, 1> =
            state.take_shaped(&format!("{prefix}.moving_mean"), [channels], device)?;
        let variance: Tensor<B, 1> =
            state.take_shaped(&format!("{prefix}.moving_variance"), [channels], device)?;

        let scale = gamma.div(variance.add_scalar(BATCH_NORM_EPSILON).sqrt());
        self.shift = beta.sub(mean.mul(scale.clone()));
        self.scale = scale;
        Ok(())
    }

    /// Normalize a `[batch, channels, height, width]` tensor.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let channels = self.channels();
        let scale = self.scale.clone().reshape([1, channels, 1, 1]);
        let shift = self.shift.clone().reshape([1, channels, 1, 1]);
        input.mul(scale).add(shift)
    }

    /// Normalize a `[batch, features]` tensor.
    pub fn forward_2d(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let channels = self.channels();
        let scale = self.scale.clone().reshape([1, channels]);
        let shift = self.shift.clone().reshape([1, channels]);
        input.mul(scale).add(shift)
    }
}
