//! High-level runtime for caption-file sampling.
//!
//! Owns the configuration, the sentence encoder, the generator and the
//! optional caption font. Everything is loaded once; sampling then walks the
//! caption file in fixed-size batches and writes one grid per sentence.

use crate::batch::{fresh_indices, has_alphabetic, plan_batches};
use crate::config::Config;
use crate::embedding::{normalize, SentenceEncoder};
use crate::model::stackgan::StackGan;
use crate::perf::{self, Metric};
use crate::render::{self, caption::CaptionFont};
use anyhow::{Context, Result};
use burn::tensor::{backend::Backend, Tensor};
use std::path::{Path, PathBuf};

/// Sentences echoed to the log after a run.
const EXAMPLE_SENTENCES: usize = 10;

/// Read a caption file, one sentence per line, and normalize every line.
///
/// Blank lines are kept so output indices match line numbers.
pub fn read_captions(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read captions from {}", path.display()))?;
    Ok(text.lines().map(normalize).collect())
}

/// Directory next to the caption file, used when no save dir is given.
pub fn default_save_dir(caption_path: &Path) -> PathBuf {
    match caption_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Outcome of a sampling run.
#[derive(Debug, Clone)]
pub struct SampleReport {
    /// Normalized sentences, in file order.
    pub sentences: Vec<String>,
    /// Grids written, in sentence order.
    pub written: Vec<PathBuf>,
}

/// Loaded encoder + generator pair.
#[derive(Debug)]
pub struct SampleRuntime<B: Backend> {
    config: Config,
    encoder: SentenceEncoder<B>,
    model: StackGan<B>,
    font: Option<CaptionFont>,
}

impl<B: Backend> SampleRuntime<B> {
    /// Create a runtime from an already-loaded config.
    pub fn from_config(
        config: &Config,
        caption_model: impl AsRef<Path>,
        device: &B::Device,
    ) -> Result<Self> {
        let _span = perf::span(Metric::RuntimeFromConfig);
        config.validate()?;
        let encoder = SentenceEncoder::from_dir(caption_model, &config.embedding, device)?;
        let model = StackGan::from_config(config, encoder.embedding_dim(), device)?;
        let font = match config.test.font_path.as_ref() {
            Some(path) => Some(CaptionFont::open(path)?),
            None => {
                log::warn!("No font_path configured; grids will be written without captions");
                None
            }
        };
        Ok(Self {
            config: config.clone(),
            encoder,
            model,
            font,
        })
    }

    /// Read, normalize and embed every line of a caption file.
    pub fn embed_captions(
        &self,
        caption_path: impl AsRef<Path>,
    ) -> Result<(Vec<String>, Tensor<B, 2>)> {
        let caption_path = caption_path.as_ref();
        let sentences = read_captions(caption_path)?;
        if sentences.is_empty() {
            anyhow::bail!("At least one embedding required");
        }
        let embeddings = self.encoder.embed(&sentences)?;
        log::info!(
            "Loaded {} sentences from {}, embeddings {:?}",
            sentences.len(),
            caption_path.display(),
            embeddings.dims()
        );
        Ok((sentences, embeddings))
    }

    /// Sample grids for every sentence of a caption file.
    ///
    /// Output goes to `save_dir`, or next to the caption file when `None`.
    pub fn sample_captions(
        &self,
        caption_path: impl AsRef<Path>,
        save_dir: Option<&Path>,
    ) -> Result<SampleReport> {
        let caption_path = caption_path.as_ref();
        let save_dir = save_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_save_dir(caption_path));
        let (sentences, embeddings) = self.embed_captions(caption_path)?;
        let written = self.sample_embeddings(&sentences, embeddings, &save_dir)?;

        log::info!("Finished generating samples for {} sentences", sentences.len());
        for (idx, sentence) in sentences.iter().take(EXAMPLE_SENTENCES).enumerate() {
            log::info!("Sentence {idx}: {sentence}");
        }
        Ok(SampleReport { sentences, written })
    }

    /// Generate and write grids for pre-computed `[n, dim]` embeddings.
    pub fn sample_embeddings(
        &self,
        sentences: &[String],
        embeddings: Tensor<B, 2>,
        save_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let num = sentences.len();
        if num == 0 {
            anyhow::bail!("At least one embedding required");
        }
        let [rows, _] = embeddings.dims();
        if rows != num {
            anyhow::bail!("Got {rows} embeddings for {num} sentences");
        }

        let batch_size = num.min(self.config.test.batch_size);
        let tile = self.config.test.hr_imsize as u32;
        let samples_per_sentence = self.config.samples_per_sentence();
        let mut written = Vec::new();
        let mut written_upto = 0;

        for batch in plan_batches(num, batch_size) {
            let fresh = fresh_indices(&batch, written_upto);
            log::debug!("Generating batch {batch:?} ({} new sentences)", fresh.len());
            let rows = embeddings.clone().narrow(0, batch.start, batch.len());
            let samples = self.model.generate_n(rows, samples_per_sentence);
            let per_sentence = render::collect_rows(&samples, batch.len(), tile)?;

            for (idx, sentence_samples) in batch.clone().zip(per_sentence.iter()) {
                if !fresh.contains(&idx) || !has_alphabetic(&sentences[idx]) {
                    continue;
                }
                let caption = &sentences[idx];
                let image =
                    render::render_sentence(sentence_samples, caption, tile, self.font.as_ref());
                written.push(render::save_sentence_image(&image, save_dir, idx)?);
            }
            written_upto = batch.end;
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captions_keep_line_positions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("captions.txt");
        std::fs::write(&path, "A  Small Bird\n\n123\n").expect("write");
        let captions = read_captions(&path).expect("captions");
        assert_eq!(captions, vec!["a small bird", "", "123"]);
    }

    #[test]
    fn save_dir_defaults_to_caption_directory() {
        assert_eq!(
            default_save_dir(Path::new("/data/birds/captions.txt")),
            PathBuf::from("/data/birds")
        );
        assert_eq!(default_save_dir(Path::new("captions.txt")), PathBuf::from("."));
    }
}
