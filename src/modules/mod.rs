//! Low-level neural network building blocks for inference.
//!
//! Layers hold plain Burn tensors and apply Burn's functional ops; weights are
//! replaced in place from a [`crate::weights::StateDict`].

pub mod batch_norm;
pub mod conv;
pub mod linear;
pub mod upsample;

use burn::tensor::{backend::Backend, Distribution, Tensor};

/// Standard deviation of freshly initialized weights.
const INIT_STDDEV: f64 = 0.02;

/// Small normal initialization used before checkpoint weights are loaded.
pub(crate) fn init_normal<B: Backend, const D: usize>(
    shape: [usize; D],
    device: &B::Device,
) -> Tensor<B, D> {
    Tensor::random(shape, Distribution::Normal(0.0, INIT_STDDEV), device)
}
