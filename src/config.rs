//! Configuration types for the sampler, the generator and the text encoder.
//!
//! Configurations are typically loaded from YAML files using [`load_config`].
//! Every section has defaults matching the reference 64px → 256px model, so an
//! empty file is a valid config.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Hard cap on stochastic samples drawn per sentence.
pub const MAX_SAMPLES_PER_SENTENCE: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
/// Generator architecture hyperparameters.
pub struct GanConfig {
    /// Size of the conditioning code.
    pub ef_dim: usize,
    /// Base number of generator filters.
    pub gf_dim: usize,
}

impl Default for GanConfig {
    fn default() -> Self {
        Self {
            ef_dim: 128,
            gf_dim: 128,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
/// Sampling settings.
pub struct TestConfig {
    /// Stage-I output resolution.
    pub lr_imsize: usize,
    /// Stage-II output resolution.
    pub hr_imsize: usize,
    /// Maximum number of sentences generated together.
    pub batch_size: usize,
    /// Samples drawn per sentence (capped at 16).
    pub num_samples: usize,
    /// Sample conditioning codes instead of using the mean.
    pub augment: bool,
    /// GAN checkpoint (safetensors).
    pub pretrained_model: String,
    /// Optional default caption file.
    pub caption_path: Option<String>,
    /// TrueType font used for grid labels.
    pub font_path: Option<String>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            lr_imsize: 64,
            hr_imsize: 256,
            batch_size: 64,
            num_samples: 8,
            augment: true,
            pretrained_model: "models/stackgan.safetensors".to_string(),
            caption_path: None,
            font_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
/// Sentence encoder layout that cannot be inferred from weight shapes.
pub struct EmbeddingConfig {
    /// Padded token sequence length.
    pub max_sent_length: usize,
    /// Pool sizes after the first and second convolution.
    pub pool_sizes: [usize; 2],
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            max_sent_length: 400,
            pool_sizes: [5, 3],
        }
    }
}

/// Top-level configuration.
///
/// # Example YAML
///
/// ```yaml
/// gpu_id: 0
/// z_dim: 100
/// gan: { ef_dim: 128, gf_dim: 128 }
/// test:
///   lr_imsize: 64
///   hr_imsize: 256
///   batch_size: 64
///   pretrained_model: models/birds_stackgan.safetensors
///   font_path: fonts/FreeMono.ttf
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// Device index; `-1` selects the CPU backend.
    pub gpu_id: i32,
    /// Size of the Stage-I noise vector.
    pub z_dim: usize,
    /// Generator architecture.
    pub gan: GanConfig,
    /// Sampling settings.
    pub test: TestConfig,
    /// Sentence encoder layout.
    pub embedding: EmbeddingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gpu_id: -1,
            z_dim: 100,
            gan: GanConfig::default(),
            test: TestConfig::default(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl Config {
    /// Upscaling factor between the two stages.
    pub fn hr_lr_ratio(&self) -> usize {
        self.test.hr_imsize / self.test.lr_imsize.max(1)
    }

    /// Check the image sizes against what the generator layout can produce.
    pub fn validate(&self) -> anyhow::Result<()> {
        let lr = self.test.lr_imsize;
        let hr = self.test.hr_imsize;
        if lr == 0 || lr % 16 != 0 {
            anyhow::bail!("lr_imsize must be a positive multiple of 16, got {lr}");
        }
        if hr < lr || hr % lr != 0 || !self.hr_lr_ratio().is_power_of_two() {
            anyhow::bail!("hr_imsize must be a power-of-two multiple of lr_imsize ({hr} vs {lr})");
        }
        if self.gan.gf_dim < 4 {
            anyhow::bail!("gf_dim must be at least 4, got {}", self.gan.gf_dim);
        }
        if self.gan.gf_dim * 4 >> self.upsample_steps() == 0 {
            anyhow::bail!(
                "gf_dim {} is too small for {} Stage-II upsample steps",
                self.gan.gf_dim,
                self.upsample_steps()
            );
        }
        if self.test.batch_size == 0 {
            anyhow::bail!("batch_size must be > 0");
        }
        if self.test.num_samples == 0 {
            anyhow::bail!("num_samples must be > 0");
        }
        Ok(())
    }

    /// Number of 2x upsamples Stage-II needs to go from `lr/4` to `hr`.
    pub fn upsample_steps(&self) -> usize {
        let encoded = (self.test.lr_imsize / 4).max(1);
        (self.test.hr_imsize / encoded).max(1).trailing_zeros() as usize
    }

    /// Samples per sentence after applying the hard cap.
    pub fn samples_per_sentence(&self) -> usize {
        self.test.num_samples.min(MAX_SAMPLES_PER_SENTENCE)
    }
}

/// Load a configuration from a YAML file.
///
/// # Errors
///
/// Returns an error if the file doesn't exist, contains invalid YAML, or
/// describes image sizes the generator cannot produce.
pub fn load_config(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        anyhow::bail!("Config file not found: {}", path.display());
    }

    let data = fs::read_to_string(path)?;
    let mut config: Config = if data.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml::from_str(&data)?
    };
    config.test.pretrained_model = resolve_relative_path(path, &config.test.pretrained_model)
        .to_string_lossy()
        .into_owned();
    for optional in [&mut config.test.font_path, &mut config.test.caption_path] {
        if let Some(value) = optional.as_mut() {
            *value = resolve_relative_path(path, value).to_string_lossy().into_owned();
        }
    }
    config.validate()?;
    Ok(config)
}

/// Resolve a possibly relative path against a config file location.
pub fn resolve_relative_path(config_path: &Path, maybe_relative: &str) -> PathBuf {
    let candidate = Path::new(maybe_relative);
    if candidate.is_absolute() {
        return candidate.to_path_buf();
    }
    config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(candidate)
}
