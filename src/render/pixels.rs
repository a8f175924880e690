//! Tensor ↔ pixel conversion.

use anyhow::Result;
use burn::tensor::{backend::Backend, Tensor};
use image::{imageops::FilterType, Rgb, RgbImage};

/// Map a generator output in `[-1, 1]` to a byte, truncating toward zero.
pub fn to_pixel(value: f32) -> u8 {
    ((value + 1.0) * 127.5).clamp(0.0, 255.0) as u8
}

/// Inverse of [`to_pixel`].
pub fn from_pixel(pixel: u8) -> f32 {
    pixel as f32 / 127.5 - 1.0
}

/// Convert a `[batch, 3, h, w]` tensor into one image per batch row using `to_byte`.
pub fn tensor_to_images<B: Backend>(
    images: Tensor<B, 4>,
    to_byte: impl Fn(&[f32]) -> Vec<u8>,
) -> Result<Vec<RgbImage>> {
    let [batch, channels, height, width] = images.dims();
    if channels != 3 {
        anyhow::bail!("Expected 3 channels, got {channels}");
    }
    let values = images
        .to_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|err| anyhow::anyhow!("Failed to read image tensor: {err:?}"))?;
    let plane = height * width;
    let per_image = channels * plane;

    let mut output = Vec::with_capacity(batch);
    for chunk in values.chunks_exact(per_image) {
        let bytes = to_byte(chunk);
        let image = RgbImage::from_fn(width as u32, height as u32, |x, y| {
            let offset = y as usize * width + x as usize;
            Rgb([bytes[offset], bytes[plane + offset], bytes[2 * plane + offset]])
        });
        output.push(image);
    }
    Ok(output)
}

/// High-resolution samples: fixed `[-1, 1]` → `[0, 255]` mapping.
pub fn high_res_images<B: Backend>(images: Tensor<B, 4>) -> Result<Vec<RgbImage>> {
    tensor_to_images(images, |values| values.iter().copied().map(to_pixel).collect())
}

/// Low-resolution samples: per-image min/max scaling, then bilinear resize to `size`.
pub fn low_res_images<B: Backend>(images: Tensor<B, 4>, size: u32) -> Result<Vec<RgbImage>> {
    let images = tensor_to_images(images, bytescale)?;
    Ok(images
        .into_iter()
        .map(|image| image::imageops::resize(&image, size, size, FilterType::Triangle))
        .collect())
}

/// Stretch values linearly so the minimum maps to 0 and the maximum to 255.
pub fn bytescale(values: &[f32]) -> Vec<u8> {
    let (min, max) = values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        return vec![0; values.len()];
    }
    values
        .iter()
        .map(|v| ((v - min) * 255.0 / range).round().clamp(0.0, 255.0) as u8)
        .collect()
}
