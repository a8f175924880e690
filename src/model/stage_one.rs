//! Stage-I generator: conditioning code + noise → low-resolution image.

use super::blocks::{ConvBnBlock, ResidualBranch};
use super::conditioning::ConditioningAugmentation;
use crate::config::Config;
use crate::modules::batch_norm::BatchNormOp;
use crate::modules::linear::LinearOp;
use crate::modules::upsample::upsample_nearest_2x;
use crate::weights::StateDict;
use anyhow::Result;
use burn::tensor::{
    activation::{relu, tanh},
    backend::Backend,
    Distribution, Tensor,
};

/// Low-resolution generator.
///
/// The noise and conditioning code are projected to a `s/16 x s/16` feature
/// map with `gf*8` channels, refined by two residual stages and upsampled four
/// times to `s x s` RGB in `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct StageOneGenerator<B: Backend> {
    pub ca: ConditioningAugmentation<B>,
    pub fc: LinearOp<B>,
    pub fc_bn: BatchNormOp<B>,
    pub res1: ResidualBranch<B>,
    pub up1: ConvBnBlock<B>,
    pub res2: ResidualBranch<B>,
    pub up2: ConvBnBlock<B>,
    pub up3: ConvBnBlock<B>,
    pub out: ConvBnBlock<B>,
    pub z_dim: usize,
    /// Side of the initial feature map (`lr_imsize / 16`).
    pub s16: usize,
}

impl<B: Backend> StageOneGenerator<B> {
    pub fn init(config: &Config, text_dim: usize, device: &B::Device) -> Self {
        let gf = config.gan.gf_dim;
        let ef = config.gan.ef_dim;
        let s16 = config.test.lr_imsize / 16;
        let fc_out = s16 * s16 * gf * 8;
        Self {
            ca: ConditioningAugmentation::init(text_dim, ef, device),
            fc: LinearOp::init(ef + config.z_dim, fc_out, device),
            fc_bn: BatchNormOp::init(fc_out, device),
            res1: ResidualBranch::init(&[(gf * 8, gf * 2, 1), (gf * 2, gf * 2, 3), (gf * 2, gf * 8, 3)], device),
            up1: ConvBnBlock::init(gf * 8, gf * 4, 3, 1, true, device),
            res2: ResidualBranch::init(&[(gf * 4, gf, 1), (gf, gf, 3), (gf, gf * 4, 3)], device),
            up2: ConvBnBlock::init(gf * 4, gf * 2, 3, 1, true, device),
            up3: ConvBnBlock::init(gf * 2, gf, 3, 1, true, device),
            out: ConvBnBlock::init(gf, 3, 3, 1, false, device),
            z_dim: config.z_dim,
            s16,
        }
    }

    /// Replace all weights with the `stage1.*` tensors of a checkpoint.
    pub fn load_state_dict(&mut self, state: &mut StateDict, device: &B::Device) -> Result<()> {
        self.ca.load(state, "stage1.ca", device)?;
        self.fc.load(state, "stage1.fc", device)?;
        self.fc_bn.load(state, "stage1.fc_bn", device)?;
        self.res1.load(state, "stage1.res1", device)?;
        self.up1.load(state, "stage1.up1", device)?;
        self.res2.load(state, "stage1.res2", device)?;
        self.up2.load(state, "stage1.up2", device)?;
        self.up3.load(state, "stage1.up3", device)?;
        self.out.load(state, "stage1.out", device)?;
        Ok(())
    }

    /// Sample codes and noise for a batch of embeddings and decode them.
    pub fn generate(&self, embeddings: Tensor<B, 2>, augment: bool) -> Tensor<B, 4> {
        let batch = embeddings.dims()[0];
        let device = embeddings.device();
        let code = self.ca.sample(embeddings, augment);
        let noise = Tensor::random([batch, self.z_dim], Distribution::Normal(0.0, 1.0), &device);
        self.forward(Tensor::cat(vec![code, noise], 1))
    }

    /// Decode a `[batch, ef_dim + z_dim]` input into `[batch, 3, s, s]`.
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 4> {
        let batch = input.dims()[0];
        let channels = self.fc_bn.channels() / (self.s16 * self.s16);
        let hidden = self.fc_bn.forward_2d(self.fc.forward(input));
        // The projection is laid out channels-last.
        let hidden = hidden
            .reshape([batch, self.s16, self.s16, channels])
            .permute([0, 3, 1, 2]);

        let hidden = self.res1.forward_residual(hidden);
        let hidden = self.up1.forward(upsample_nearest_2x(hidden));
        let hidden = self.res2.forward_residual(hidden);
        let hidden = relu(self.up2.forward(upsample_nearest_2x(hidden)));
        let hidden = relu(self.up3.forward(upsample_nearest_2x(hidden)));
        tanh(self.out.forward(upsample_nearest_2x(hidden)))
    }
}
