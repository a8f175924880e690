//! Stage-II generator: low-resolution image + conditioning code → high resolution.

use super::blocks::{ConvBnBlock, ResidualBranch};
use super::conditioning::ConditioningAugmentation;
use crate::config::Config;
use crate::modules::upsample::upsample_nearest_2x;
use crate::weights::StateDict;
use anyhow::Result;
use burn::tensor::{
    activation::{relu, tanh},
    backend::Backend,
    Tensor,
};

/// Residual blocks between the joint encoding and the upsampler.
const NUM_RESIDUAL_BLOCKS: usize = 4;

/// High-resolution refinement network.
#[derive(Debug, Clone)]
pub struct StageTwoGenerator<B: Backend> {
    pub ca: ConditioningAugmentation<B>,
    /// 3x3 (no norm), then two 4x4 stride-2 downsampling blocks.
    pub encode: Vec<ConvBnBlock<B>>,
    pub joint: ConvBnBlock<B>,
    pub residuals: Vec<ResidualBranch<B>>,
    pub upsample: Vec<ConvBnBlock<B>>,
    pub out: ConvBnBlock<B>,
    pub ef_dim: usize,
}

impl<B: Backend> StageTwoGenerator<B> {
    pub fn init(config: &Config, text_dim: usize, device: &B::Device) -> Self {
        let gf = config.gan.gf_dim;
        let ef = config.gan.ef_dim;
        let encode = vec![
            ConvBnBlock::init(3, gf, 3, 1, false, device),
            ConvBnBlock::init(gf, gf * 2, 4, 2, true, device),
            ConvBnBlock::init(gf * 2, gf * 4, 4, 2, true, device),
        ];
        let residuals = (0..NUM_RESIDUAL_BLOCKS)
            .map(|_| ResidualBranch::init(&[(gf * 4, gf * 4, 3), (gf * 4, gf * 4, 3)], device))
            .collect();

        let mut upsample = Vec::new();
        let mut channels = gf * 4;
        for step in 0..config.upsample_steps() {
            let next = (gf * 4) >> (step + 1);
            upsample.push(ConvBnBlock::init(channels, next, 3, 1, true, device));
            channels = next;
        }

        Self {
            ca: ConditioningAugmentation::init(text_dim, ef, device),
            encode,
            joint: ConvBnBlock::init(gf * 4 + ef, gf * 4, 3, 1, true, device),
            residuals,
            upsample,
            out: ConvBnBlock::init(channels, 3, 3, 1, false, device),
            ef_dim: ef,
        }
    }

    /// Replace all weights with the `stage2.*` tensors of a checkpoint.
    pub fn load_state_dict(&mut self, state: &mut StateDict, device: &B::Device) -> Result<()> {
        self.ca.load(state, "stage2.ca", device)?;
        for (idx, block) in self.encode.iter_mut().enumerate() {
            block.load(state, &format!("stage2.encode.{idx}"), device)?;
        }
        self.joint.load(state, "stage2.joint", device)?;
        for (idx, residual) in self.residuals.iter_mut().enumerate() {
            residual.load(state, &format!("stage2.res.{idx}"), device)?;
        }
        for (idx, block) in self.upsample.iter_mut().enumerate() {
            block.load(state, &format!("stage2.up.{idx}"), device)?;
        }
        self.out.load(state, "stage2.out", device)?;
        Ok(())
    }

    /// Refine Stage-I images using a freshly sampled code for each row.
    pub fn generate(
        &self,
        low_res: Tensor<B, 4>,
        embeddings: Tensor<B, 2>,
        augment: bool,
    ) -> Tensor<B, 4> {
        let code = self.ca.sample(embeddings, augment);
        self.forward(low_res, code)
    }

    /// Map `[batch, 3, s, s]` and a `[batch, ef_dim]` code to `[batch, 3, hr, hr]`.
    pub fn forward(&self, low_res: Tensor<B, 4>, code: Tensor<B, 2>) -> Tensor<B, 4> {
        let mut hidden = low_res;
        for block in &self.encode {
            hidden = relu(block.forward(hidden));
        }

        let [batch, _, height, width] = hidden.dims();
        let code = code
            .reshape([batch, self.ef_dim, 1, 1])
            .repeat_dim(2, height)
            .repeat_dim(3, width);
        let mut hidden = relu(self.joint.forward(Tensor::cat(vec![hidden, code], 1)));

        for residual in &self.residuals {
            hidden = residual.forward_residual(hidden);
        }
        for block in &self.upsample {
            hidden = relu(block.forward(upsample_nearest_2x(hidden)));
        }
        tanh(self.out.forward(hidden))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::{NdArray, NdArrayDevice};

    type TestBackend = NdArray<f32>;

    fn tiny_config() -> Config {
        let mut config = Config::default();
        config.z_dim = 5;
        config.gan.ef_dim = 3;
        config.gan.gf_dim = 4;
        config.test.lr_imsize = 16;
        config.test.hr_imsize = 32;
        config
    }

    #[test]
    fn upsample_plan_halves_channels() {
        let device = NdArrayDevice::default();
        let stage = StageTwoGenerator::<TestBackend>::init(&tiny_config(), 7, &device);
        let channels: Vec<usize> = stage
            .upsample
            .iter()
            .map(|block| block.conv.out_channels())
            .collect();
        assert_eq!(channels, vec![8, 4, 2]);
    }

    #[test]
    fn refines_to_high_resolution() {
        let device = NdArrayDevice::default();
        let stage = StageTwoGenerator::<TestBackend>::init(&tiny_config(), 7, &device);
        let low_res = Tensor::<TestBackend, 4>::zeros([2, 3, 16, 16], &device);
        let embeddings = Tensor::<TestBackend, 2>::ones([2, 7], &device);
        let images = stage.generate(low_res, embeddings, false);
        assert_eq!(images.dims(), [2, 3, 32, 32]);
    }
}
