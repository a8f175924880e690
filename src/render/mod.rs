//! Turning generated samples into captioned JPEG grids.

pub mod caption;
pub mod grid;
pub mod pixels;

use crate::{
    model::stackgan::GeneratedSamples,
    perf::{self, Metric},
};
use anyhow::{Context, Result};
use burn::tensor::backend::Backend;
use caption::CaptionFont;
use image::RgbImage;
use std::path::{Path, PathBuf};

/// Per-sentence images split out of a list of generated batches.
#[derive(Debug, Default)]
pub struct SentenceSamples {
    /// Stage-I samples resized to the Stage-II resolution.
    pub low_res: Vec<RgbImage>,
    pub high_res: Vec<RgbImage>,
}

/// Regroup `samples[i]` (one image per batch row) into one entry per row.
pub fn collect_rows<B: Backend>(
    samples: &[GeneratedSamples<B>],
    rows: usize,
    tile: u32,
) -> Result<Vec<SentenceSamples>> {
    let mut sentences: Vec<SentenceSamples> =
        (0..rows).map(|_| SentenceSamples::default()).collect();
    for sample in samples {
        let low = pixels::low_res_images(sample.low_res.clone(), tile)?;
        let high = pixels::high_res_images(sample.high_res.clone())?;
        if low.len() != rows || high.len() != rows {
            anyhow::bail!(
                "Expected {rows} images per sample, got {} / {}",
                low.len(),
                high.len()
            );
        }
        for (sentence, (low, high)) in sentences.iter_mut().zip(low.into_iter().zip(high)) {
            sentence.low_res.push(low);
            sentence.high_res.push(high);
        }
    }
    Ok(sentences)
}

/// Compose the grid for one sentence and draw labels when a font is available.
pub fn render_sentence(
    samples: &SentenceSamples,
    caption: &str,
    tile: u32,
    font: Option<&CaptionFont>,
) -> RgbImage {
    let _span = perf::span(Metric::RenderGrid);
    let mut image = grid::compose_grid(&samples.low_res, &samples.high_res, tile);
    if let Some(font) = font {
        let labels = grid::stage_label_rows(samples.low_res.len(), tile);
        font.annotate(&mut image, caption, &labels, tile);
    }
    image
}

/// Path of the grid for sentence `index`.
pub fn sentence_path(save_dir: &Path, index: usize) -> PathBuf {
    save_dir.join(format!("sentence{index}.jpg"))
}

/// Write `image` as `sentence{index}.jpg`, creating `save_dir` if needed.
pub fn save_sentence_image(image: &RgbImage, save_dir: &Path, index: usize) -> Result<PathBuf> {
    let _span = perf::span(Metric::WriteImage);
    if !save_dir.is_dir() {
        log::info!("Creating output directory {}", save_dir.display());
        std::fs::create_dir_all(save_dir)
            .with_context(|| format!("Failed to create {}", save_dir.display()))?;
    }
    let path = sentence_path(save_dir, index);
    image
        .save_with_format(&path, image::ImageFormat::Jpeg)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    perf::add_count(Metric::ImagesWritten, 1);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Tensor;
    use burn_ndarray::{NdArray, NdArrayDevice};
    use image::Rgb;

    type TestBackend = NdArray<f32>;

    #[test]
    fn rows_are_regrouped_per_sentence() {
        let device = NdArrayDevice::default();
        let samples: Vec<GeneratedSamples<TestBackend>> = (0..3)
            .map(|_| GeneratedSamples {
                low_res: Tensor::zeros([2, 3, 4, 4], &device),
                high_res: Tensor::zeros([2, 3, 8, 8], &device),
            })
            .collect();
        let sentences = collect_rows(&samples, 2, 8).expect("rows");
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[1].low_res.len(), 3);
        assert_eq!(sentences[1].low_res[0].dimensions(), (8, 8));
    }

    #[test]
    fn saves_into_new_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let save_dir = dir.path().join("nested");
        let image = RgbImage::from_pixel(8, 8, Rgb([200, 10, 10]));
        let path = save_sentence_image(&image, &save_dir, 3).expect("save");
        assert_eq!(path, save_dir.join("sentence3.jpg"));
        let decoded = image::open(&path).expect("decode");
        assert_eq!((decoded.width(), decoded.height()), (8, 8));
    }
}
