//! Convolution primitives loaded from channels-last checkpoints.
//!
//! TensorFlow stores 2D kernels as `[kh, kw, in, out]` and Keras stores 1D
//! kernels as `[k, in, out]`; Burn expects `[out, in, ...]`. Kernels are
//! permuted once at load time.

use crate::weights::StateDict;
use anyhow::Result;
use burn::tensor::{
    backend::Backend,
    module::{conv1d, conv2d},
    ops::ConvOptions,
    Tensor,
};

use super::init_normal;

/// 2D convolution with symmetric "same" padding and no bias.
#[derive(Debug, Clone)]
pub struct Conv2dOp<B: Backend> {
    /// Weight tensor `[out, in, k, k]`.
    pub weight: Tensor<B, 4>,
    /// Stride in both spatial dimensions.
    pub stride: usize,
    /// Padding on each side.
    pub padding: usize,
}

impl<B: Backend> Conv2dOp<B> {
    /// Create a convolution that keeps `size / stride` spatial extent.
    pub fn init(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        device: &B::Device,
    ) -> Self {
        Self {
            weight: init_normal([out_channels, in_channels, kernel_size, kernel_size], device),
            stride,
            padding: same_padding(kernel_size, stride),
        }
    }

    pub fn out_channels(&self) -> usize {
        self.weight.dims()[0]
    }

    /// Load `{name}` stored as `[kh, kw, in, out]`.
    pub fn load(&mut self, state: &mut StateDict, name: &str, device: &B::Device) -> Result<()> {
        let [out_c, in_c, kh, kw] = self.weight.dims();
        let kernel: Tensor<B, 4> = state.take_shaped(name, [kh, kw, in_c, out_c], device)?;
        self.weight = kernel.permute([3, 2, 0, 1]);
        Ok(())
    }

    /// Apply the convolution to a `[batch, channels, height, width]` tensor.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let options = ConvOptions::new(
            [self.stride, self.stride],
            [self.padding, self.padding],
            [1, 1],
            1,
        );
        conv2d(input, self.weight.clone(), None, options)
    }
}

/// Padding that reproduces TensorFlow "SAME" when `kernel - stride` is even
/// and the input size is divisible by the stride.
fn same_padding(kernel_size: usize, stride: usize) -> usize {
    kernel_size.saturating_sub(stride) / 2
}

/// 1D convolution with "valid" padding and a bias.
#[derive(Debug, Clone)]
pub struct Conv1dOp<B: Backend> {
    /// Weight tensor `[out, in, k]`.
    pub weight: Tensor<B, 3>,
    /// Bias `[out]`.
    pub bias: Tensor<B, 1>,
}

impl<B: Backend> Conv1dOp<B> {
    /// Load `{prefix}.weight` stored as `[k, in, out]` and `{prefix}.bias`.
    ///
    /// Channel counts and kernel size come from the stored shape.
    pub fn from_state(state: &mut StateDict, prefix: &str, device: &B::Device) -> Result<Self> {
        let kernel: Tensor<B, 3> = state.take(&format!("{prefix}.weight"), device)?;
        let [_, _, out_c] = kernel.dims();
        let bias = state.take_shaped(&format!("{prefix}.bias"), [out_c], device)?;
        Ok(Self {
            weight: kernel.permute([2, 1, 0]),
            bias,
        })
    }

    pub fn in_channels(&self) -> usize {
        self.weight.dims()[1]
    }

    pub fn out_channels(&self) -> usize {
        self.weight.dims()[0]
    }

    pub fn kernel_size(&self) -> usize {
        self.weight.dims()[2]
    }

    /// Output length for an input of `len` steps.
    pub fn output_len(&self, len: usize) -> usize {
        (len + 1).saturating_sub(self.kernel_size())
    }

    /// Apply the convolution to a `[batch, channels, steps]` tensor.
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        let options = ConvOptions::new([1], [0], [1], 1);
        conv1d(input, self.weight.clone(), Some(self.bias.clone()), options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::TensorData as WeightTensor;
    use burn::tensor::TensorData;
    use burn_ndarray::{NdArray, NdArrayDevice};
    use safetensors::Dtype;

    type TestBackend = NdArray<f32>;

    fn weight(shape: Vec<usize>, values: &[f32]) -> WeightTensor {
        WeightTensor {
            dtype: Dtype::F32,
            shape,
            data: values.iter().copied().flat_map(f32::to_le_bytes).collect(),
        }
    }

    #[test]
    fn same_padding_matches_tensorflow_for_even_inputs() {
        assert_eq!(same_padding(1, 1), 0);
        assert_eq!(same_padding(3, 1), 1);
        assert_eq!(same_padding(4, 2), 1);
    }

    #[test]
    fn conv2d_keeps_or_halves_spatial_size() {
        let device = NdArrayDevice::default();
        let input = Tensor::<TestBackend, 4>::ones([2, 3, 8, 8], &device);
        let same = Conv2dOp::<TestBackend>::init(3, 5, 3, 1, &device);
        assert_eq!(same.forward(input.clone()).dims(), [2, 5, 8, 8]);
        let down = Conv2dOp::<TestBackend>::init(3, 4, 4, 2, &device);
        assert_eq!(down.forward(input).dims(), [2, 4, 4, 4]);
    }

    #[test]
    fn conv2d_load_permutes_channels_last_kernel() {
        let device = NdArrayDevice::default();
        let mut conv = Conv2dOp::<TestBackend>::init(2, 1, 1, 1, &device);
        // [kh, kw, in, out] = [1, 1, 2, 1]: out = 2 * c0 + 3 * c1
        let mut state =
            StateDict::from_tensors([("w".to_string(), weight(vec![1, 1, 2, 1], &[2.0, 3.0]))]);
        conv.load(&mut state, "w", &device).expect("load");
        assert_eq!(conv.weight.dims(), [1, 2, 1, 1]);

        let input = Tensor::<TestBackend, 4>::from_data(
            TensorData::new(vec![1.0f32, 10.0], [1, 2, 1, 1]),
            &device,
        );
        let output = conv.forward(input).to_data();
        assert_eq!(output.as_slice::<f32>().expect("slice"), &[32.0]);
    }

    #[test]
    fn conv1d_valid_output_length() {
        let device = NdArrayDevice::default();
        let mut state = StateDict::from_tensors([
            ("c.weight".to_string(), weight(vec![3, 1, 1], &[1.0, 1.0, 1.0])),
            ("c.bias".to_string(), weight(vec![1], &[0.5])),
        ]);
        let conv = Conv1dOp::<TestBackend>::from_state(&mut state, "c", &device).expect("load");
        assert_eq!(conv.kernel_size(), 3);
        assert_eq!(conv.output_len(6), 4);

        let input = Tensor::<TestBackend, 3>::from_data(
            TensorData::new(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], [1, 1, 6]),
            &device,
        );
        let output = conv.forward(input).to_data();
        assert_eq!(
            output.as_slice::<f32>().expect("slice"),
            &[6.5, 9.5, 12.5, 15.5]
        );
    }
}
