//! Convolution blocks shared by both generator stages.

use crate::modules::batch_norm::BatchNormOp;
use crate::modules::conv::Conv2dOp;
use crate::weights::StateDict;
use anyhow::Result;
use burn::tensor::{activation::relu, backend::Backend, Tensor};

/// Convolution followed by an optional batch norm; no activation.
#[derive(Debug, Clone)]
pub struct ConvBnBlock<B: Backend> {
    pub conv: Conv2dOp<B>,
    pub norm: Option<BatchNormOp<B>>,
}

impl<B: Backend> ConvBnBlock<B> {
    pub fn init(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        with_norm: bool,
        device: &B::Device,
    ) -> Self {
        Self {
            conv: Conv2dOp::init(in_channels, out_channels, kernel_size, stride, device),
            norm: with_norm.then(|| BatchNormOp::init(out_channels, device)),
        }
    }

    /// Load `{prefix}.conv` and, for normalized blocks, `{prefix}.bn.*`.
    pub fn load(&mut self, state: &mut StateDict, prefix: &str, device: &B::Device) -> Result<()> {
        self.conv.load(state, &format!("{prefix}.conv"), device)?;
        if let Some(norm) = self.norm.as_mut() {
            norm.load(state, &format!("{prefix}.bn"), device)?;
        }
        Ok(())
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let output = self.conv.forward(input);
        match &self.norm {
            Some(norm) => norm.forward(output),
            None => output,
        }
    }
}

/// Residual branch: conv-bn blocks with ReLU between them, none after the last.
///
/// The caller adds the branch output to its input and applies the final ReLU.
#[derive(Debug, Clone)]
pub struct ResidualBranch<B: Backend> {
    pub blocks: Vec<ConvBnBlock<B>>,
}

impl<B: Backend> ResidualBranch<B> {
    /// Build from `(in, out, kernel)` triples; every block is normalized.
    pub fn init(plan: &[(usize, usize, usize)], device: &B::Device) -> Self {
        Self {
            blocks: plan
                .iter()
                .map(|&(in_c, out_c, kernel)| ConvBnBlock::init(in_c, out_c, kernel, 1, true, device))
                .collect(),
        }
    }

    pub fn load(&mut self, state: &mut StateDict, prefix: &str, device: &B::Device) -> Result<()> {
        for (idx, block) in self.blocks.iter_mut().enumerate() {
            block.load(state, &format!("{prefix}.{idx}"), device)?;
        }
        Ok(())
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let last = self.blocks.len().saturating_sub(1);
        let mut value = input;
        for (idx, block) in self.blocks.iter().enumerate() {
            value = block.forward(value);
            if idx != last {
                value = relu(value);
            }
        }
        value
    }

    /// `relu(input + branch(input))`.
    pub fn forward_residual(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let branch = self.forward(input.clone());
        relu(input + branch)
    }
}
