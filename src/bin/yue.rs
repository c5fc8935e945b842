//! YuE CLI — lyrics-to-song generation.
//!
//! Runs stage 1 and stage 2 and writes the codec-index artifacts:
//!
//! ```text
//! {output_dir}/stage1/cot_{genres}_..._{vocal,instrumental}_{id}.npy
//! {output_dir}/stage2/<same names>
//! ```
//!
//! Model weights are downloaded from HuggingFace on first run unless the
//! model ids point at local directories. No neural codec is bundled, so an
//! audio prompt must be given as pre-encoded codec indices (`.npy`).
//!
//! On success a one-line JSON summary is printed to stdout.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use yue_rs::config::{AudioPromptConfig, GenerationConfig};
use yue_rs::model::llama::{HubModels, preferred_device};
use yue_rs::pipeline::{YuePipeline, load_tokenizer};

#[derive(Parser, Debug)]
#[command(
    name = "yue",
    about = "YuE two-stage lyrics-to-song generation",
    long_about = "Generate a song from genre tags and sectioned lyrics.\n\
                  Flags override values from --config; a JSON summary line is printed to stdout."
)]
struct Args {
    /// JSON configuration file providing base values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Genre tags, or a path to a .txt file holding them.
    #[arg(long)]
    genre: Option<String>,

    /// Lyrics with [verse], [chorus], ... sections, or a path to a .txt file.
    #[arg(long)]
    lyrics: Option<String>,

    /// Stage-1 model: local directory or HuggingFace repo id.
    #[arg(long)]
    stage1_model: Option<String>,

    /// Stage-2 model: local directory or HuggingFace repo id.
    #[arg(long)]
    stage2_model: Option<String>,

    /// tokenizer.json to use instead of the stage-1 model's.
    #[arg(long)]
    tokenizer: Option<PathBuf>,

    /// Maximum new tokens per stage-1 segment.
    #[arg(long)]
    max_new_tokens: Option<usize>,

    /// Number of lyric segments to decode.
    #[arg(long)]
    run_n_segments: Option<usize>,

    /// Chunks decoded together in stage 2.
    #[arg(long)]
    stage2_batch_size: Option<usize>,

    /// Pre-encoded audio prompt (.npy codec indices).
    #[arg(long)]
    audio_prompt_path: Option<PathBuf>,

    /// Audio prompt window start in seconds.
    #[arg(long, default_value_t = 0.0)]
    prompt_start_time: f64,

    /// Audio prompt window end in seconds.
    #[arg(long, default_value_t = 30.0)]
    prompt_end_time: f64,

    #[arg(long, short = 'o')]
    output_dir: Option<PathBuf>,

    /// Rescale audio to avoid clipping instead of clamping.
    #[arg(long)]
    rescale: bool,

    /// CUDA device ordinal.
    #[arg(long)]
    cuda_idx: Option<usize>,

    /// Random seed. Omit for a random seed each run.
    #[arg(long, short = 's')]
    seed: Option<u64>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<GenerationConfig> {
        let mut config = match &self.config {
            Some(path) => GenerationConfig::from_json_file(path)
                .with_context(|| format!("failed to read config {}", path.display()))?,
            None => GenerationConfig::default(),
        };
        if let Some(genre) = self.genre {
            config.genre = genre;
        }
        if let Some(lyrics) = self.lyrics {
            config.lyrics = lyrics;
        }
        if let Some(model) = self.stage1_model {
            config.stage1_model = model;
        }
        if let Some(model) = self.stage2_model {
            config.stage2_model = model;
        }
        if self.tokenizer.is_some() {
            config.tokenizer = self.tokenizer;
        }
        if let Some(n) = self.max_new_tokens {
            config.stage1.max_new_tokens = n;
        }
        if let Some(n) = self.run_n_segments {
            config.stage1.run_n_segments = n;
        }
        if let Some(n) = self.stage2_batch_size {
            config.stage2.batch_size = n;
        }
        if let Some(path) = self.audio_prompt_path {
            config.audio_prompt = Some(AudioPromptConfig {
                path,
                start_time: self.prompt_start_time,
                end_time: self.prompt_end_time,
            });
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        config.rescale |= self.rescale;
        if let Some(idx) = self.cuda_idx {
            config.cuda_idx = idx;
        }
        if self.seed.is_some() {
            config.stage1.seed = self.seed;
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Args::parse().into_config()?;
    if config.genre.is_empty() || config.lyrics.is_empty() {
        anyhow::bail!("both --genre and --lyrics are required");
    }
    if let Some(prompt) = &config.audio_prompt
        && prompt.path.extension().is_none_or(|ext| ext != "npy")
    {
        anyhow::bail!(
            "audio prompt {} must be pre-encoded codec indices (.npy)",
            prompt.path.display()
        );
    }

    let device = preferred_device(config.cuda_idx);
    tracing::info!("Using device: {:?}", device);

    let tokenizer = load_tokenizer(&config).context("failed to load tokenizer")?;
    let models = HubModels::new(&config.stage1_model, &config.stage2_model, device);

    let mut pipeline = YuePipeline::new(config, Box::new(tokenizer), Box::new(models))
        .context("invalid configuration")?;
    let output = pipeline.run().context("generation failed")?;

    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}
