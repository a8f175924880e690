//! Fully connected layer with TensorFlow-style `[in, out]` weights.

use crate::weights::StateDict;
use anyhow::Result;
use burn::tensor::backend::Backend;
use burn::tensor::module::linear;
use burn::tensor::Tensor;

use super::init_normal;

/// Dense projection `x @ weight + bias`.
#[derive(Debug, Clone)]
pub struct LinearOp<B: Backend> {
    /// Weight tensor `[in, out]`.
    pub weight: Tensor<B, 2>,
    /// Optional bias `[out]`.
    pub bias: Option<Tensor<B, 1>>,
}

impl<B: Backend> LinearOp<B> {
    /// Create a layer with small random weights and a zero bias.
    pub fn init(d_in: usize, d_out: usize, device: &B::Device) -> Self {
        Self {
            weight: init_normal([d_in, d_out], device),
            bias: Some(Tensor::zeros([d_out], device)),
        }
    }

    /// Output feature size.
    pub fn d_out(&self) -> usize {
        self.weight.dims()[1]
    }

    /// Replace weights with `{prefix}.weight` and, when present, `{prefix}.bias`.
    pub fn load(&mut self, state: &mut StateDict, prefix: &str, device: &B::Device) -> Result<()> {
        let [d_in, d_out] = self.weight.dims();
        self.weight = state.take_shaped(&format!("{prefix}.weight"), [d_in, d_out], device)?;
        let bias_name = format!("{prefix}.bias");
        self.bias = if state.contains(&bias_name) {
            Some(state.take_shaped(&bias_name, [d_out], device)?)
        } else {
            None
        };
        Ok(())
    }

    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        linear(input, self.weight.clone(), self.bias.clone())
    }
}
