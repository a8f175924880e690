//! Command-line interface for StackGAN sampling.
//!
//! `sample` turns a caption file into one image grid per sentence; `embed`
//! exports the sentence embeddings alone.

#![recursion_limit = "256"]

use anyhow::{Context, Result};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use burn_ndarray::{NdArray, NdArrayDevice};
use clap::ValueEnum;
use clap::{Parser, Subcommand};
use safetensors::Dtype;
use stackgen::config::{load_config, Config};
use stackgen::embedding::SentenceEncoder;
use stackgen::perf;
use stackgen::runtime::{read_captions, SampleRuntime};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[cfg(feature = "backend-wgpu")]
use burn_wgpu::graphics::AutoGraphicsApi;
#[cfg(feature = "backend-wgpu")]
use burn_wgpu::{init_setup, Wgpu, WgpuDevice};

/// Supported compute backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
enum BackendChoice {
    /// Use the WGPU backend (GPU acceleration when available).
    Wgpu,
    /// Use the ndarray backend (CPU).
    Ndarray,
}

#[cfg(feature = "backend-wgpu")]
const DEFAULT_BACKEND: BackendChoice = BackendChoice::Wgpu;
#[cfg(not(feature = "backend-wgpu"))]
const DEFAULT_BACKEND: BackendChoice = BackendChoice::Ndarray;

/// Top-level CLI options.
#[derive(Parser)]
#[command(name = "stackgen")]
#[command(about = "Text-to-image sampling with a two-stage conditional GAN", long_about = None)]
struct Cli {
    /// Print performance summary at the end of the run.
    #[arg(long, short, global = true)]
    verbose: bool,
    /// Compute backend to use.
    #[arg(long, value_enum, default_value_t = DEFAULT_BACKEND, global = true)]
    backend: BackendChoice,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// CLI subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Generate image grids for every sentence of a caption file.
    Sample {
        /// Path to the YAML config.
        #[arg(long = "cfg")]
        config: PathBuf,
        /// Device index; -1 runs on the CPU.
        #[arg(long = "gpu", allow_hyphen_values = true)]
        gpu_id: Option<i32>,
        /// Text file with one caption per line (overrides `test.caption_path`).
        #[arg(long)]
        caption_path: Option<PathBuf>,
        /// Directory holding the sentence encoder weights and tokenizer.
        #[arg(long)]
        caption_model: PathBuf,
        /// Output directory (defaults to the caption file's directory).
        #[arg(long)]
        save_dir: Option<PathBuf>,
        /// Samples per sentence (capped at 16).
        #[arg(long)]
        num_samples: Option<usize>,
        /// Use the conditioning mean instead of sampling codes.
        #[arg(long)]
        no_augment: bool,
    },
    /// Embed a caption file and write the vectors to SafeTensors.
    Embed {
        /// Text file with one caption per line.
        #[arg(long)]
        caption_path: PathBuf,
        /// Directory holding the sentence encoder weights and tokenizer.
        #[arg(long)]
        caption_model: PathBuf,
        /// Output `.safetensors` path.
        #[arg(long)]
        output: PathBuf,
        /// Optional YAML config for the encoder layout.
        #[arg(long = "cfg")]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone)]
struct SampleArgs {
    config: Config,
    caption_path: PathBuf,
    caption_model: PathBuf,
    save_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
struct EmbedArgs {
    config: Config,
    caption_path: PathBuf,
    caption_model: PathBuf,
    output: PathBuf,
}

/// Entry point for the CLI.
fn main() -> Result<()> {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();

    let cli = Cli::parse();
    let verbose = cli.verbose;
    let backend = cli.backend;

    match cli.command {
        Commands::Sample {
            config,
            gpu_id,
            caption_path,
            caption_model,
            save_dir,
            num_samples,
            no_augment,
        } => {
            let mut config = load_config(config)?;
            if let Some(gpu_id) = gpu_id {
                config.gpu_id = gpu_id;
            }
            if let Some(num_samples) = num_samples {
                config.test.num_samples = num_samples;
            }
            if no_augment {
                config.test.augment = false;
            }
            let caption_path = caption_path
                .or_else(|| config.test.caption_path.as_ref().map(PathBuf::from))
                .context("No caption file given; pass --caption-path or set test.caption_path")?;
            let gpu_id = config.gpu_id;
            let args = SampleArgs {
                config,
                caption_path,
                caption_model,
                save_dir,
            };
            match (backend, gpu_id) {
                (BackendChoice::Wgpu, id) if id >= 0 => {
                    #[cfg(feature = "backend-wgpu")]
                    {
                        let device = WgpuDevice::DiscreteGpu(id as usize);
                        init_setup::<AutoGraphicsApi>(&device, Default::default());
                        run_sample::<Wgpu>(args, &device)?;
                    }
                    #[cfg(not(feature = "backend-wgpu"))]
                    {
                        let _ = (args, id);
                        anyhow::bail!("WGPU backend not enabled; build with --features backend-wgpu");
                    }
                }
                (_, id) => {
                    if id >= 0 {
                        log::warn!(
                            "GPU {id} requested but the ndarray backend is selected; running on the CPU"
                        );
                    }
                    let device = NdArrayDevice::default();
                    run_sample::<NdArray<f32>>(args, &device)?;
                }
            }
        }
        Commands::Embed {
            caption_path,
            caption_model,
            output,
            config,
        } => {
            let config = match config {
                Some(path) => load_config(path)?,
                None => Config::default(),
            };
            let args = EmbedArgs {
                config,
                caption_path,
                caption_model,
                output,
            };
            match backend {
                BackendChoice::Wgpu => {
                    #[cfg(feature = "backend-wgpu")]
                    {
                        let device = WgpuDevice::default();
                        init_setup::<AutoGraphicsApi>(&device, Default::default());
                        run_embed::<Wgpu>(args, &device)?;
                    }
                    #[cfg(not(feature = "backend-wgpu"))]
                    {
                        let _ = args;
                        anyhow::bail!("WGPU backend not enabled; build with --features backend-wgpu");
                    }
                }
                BackendChoice::Ndarray => {
                    let device = NdArrayDevice::default();
                    run_embed::<NdArray<f32>>(args, &device)?;
                }
            }
        }
    }

    if verbose {
        eprintln!("{}", perf::report());
    }

    Ok(())
}

fn run_sample<B: Backend>(args: SampleArgs, device: &B::Device) -> Result<()> {
    let runtime = SampleRuntime::<B>::from_config(&args.config, &args.caption_model, device)?;
    let report = runtime.sample_captions(&args.caption_path, args.save_dir.as_deref())?;
    eprintln!(
        "Wrote {} image(s) for {} sentence(s)",
        report.written.len(),
        report.sentences.len()
    );
    Ok(())
}

fn run_embed<B: Backend>(args: EmbedArgs, device: &B::Device) -> Result<()> {
    let encoder =
        SentenceEncoder::<B>::from_dir(&args.caption_model, &args.config.embedding, device)?;
    let sentences = read_captions(&args.caption_path)?;
    if sentences.is_empty() {
        anyhow::bail!("At least one embedding required");
    }
    let embeddings = encoder.embed(&sentences)?;
    save_tensor(&args.output, "embeddings", embeddings)?;
    eprintln!(
        "Saved {} embedding(s) to {}",
        sentences.len(),
        args.output.display()
    );
    Ok(())
}

/// Save a 2D tensor to a SafeTensors file.
fn save_tensor<B: Backend>(path: &Path, name: &str, tensor: Tensor<B, 2>) -> Result<()> {
    let data = tensor.to_data().convert::<f32>();
    let values = data
        .as_slice::<f32>()
        .map_err(|err| anyhow::anyhow!("Failed to read tensor data: {err:?}"))?;
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for value in values {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    let view = safetensors::tensor::TensorView::new(Dtype::F32, data.shape.clone(), &bytes)?;
    let mut tensors = HashMap::new();
    tensors.insert(name.to_string(), view);
    let serialized = safetensors::serialize(&tensors, &None)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serialized)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
