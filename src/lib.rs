//! # stackgen - StackGAN text-to-image sampling on burn
//!
//! Turns free-form sentences into photo-like images with a pretrained,
//! two-stage conditional GAN.
//!
//! ## Architecture Overview
//!
//! 1. **Sentence embedding** ([`SentenceEncoder`]): a Keras-compatible tokenizer
//!    plus a small CNN (token lookup, two conv/max-pool layers, dense) that maps
//!    each sentence to a fixed-size vector.
//!
//! 2. **Conditioning augmentation**: each embedding is projected to a Gaussian
//!    and a conditioning code is drawn from it, so repeated samples of the same
//!    sentence differ.
//!
//! 3. **Generator** ([`StackGan`]): Stage-I decodes code + noise into a
//!    low-resolution image; Stage-II refines it to the final resolution.
//!
//! 4. **Sampler** ([`SampleRuntime`]): walks a caption file in batches and
//!    writes one captioned `sentence{index}.jpg` grid per sentence.
//!
//! ## Quick Start
//!
//! ```no_run
//! use burn_ndarray::{NdArray, NdArrayDevice};
//! use stackgen::{load_config, SampleRuntime};
//!
//! let config = load_config("cfg/birds.yml").unwrap();
//! let device = NdArrayDevice::default();
//! let runtime =
//!     SampleRuntime::<NdArray<f32>>::from_config(&config, "models/text_model", &device).unwrap();
//! let report = runtime.sample_captions("captions/birds.txt", None).unwrap();
//! println!("wrote {} grids", report.written.len());
//! ```
//!
//! ## Configuration
//!
//! Sampling is configured with a YAML file (see [`Config`]). Checkpoints are
//! SafeTensors files; TensorFlow variable names (`g_net/...`, `hr_g_net/...`)
//! are mapped onto module paths at load time.

// Public modules - these are part of the stable API
pub mod batch;
pub mod config;
pub mod embedding;
pub mod perf;
pub mod render;
pub mod runtime;

// Internal modules - exposed for integration tests but not part of stable API.
// These may change without notice between versions.
#[doc(hidden)]
pub mod model;
#[doc(hidden)]
pub mod modules;
#[doc(hidden)]
pub mod weights;

// Re-exports forming the public API
pub use config::{load_config, Config};
pub use embedding::{SentenceEncoder, SentenceTokenizer};
pub use model::stackgan::{GeneratedSamples, StackGan};
pub use runtime::{SampleReport, SampleRuntime};
