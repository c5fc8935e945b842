//! End-to-end generation pipeline.
//!
//! Runs the stages strictly in order:
//! 1. Split the lyrics into labeled segments
//! 2. Stage 1: decode segment by segment (stage-1 model resident)
//! 3. Stage 2: upsample each stage-1 artifact (stage-2 model resident)
//! 4. Reconstruct audio, when a codec and vocoders are attached
//!
//! Each model is acquired from the [`ModelProvider`] right before its stage
//! and dropped when the stage ends.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::codec::{CodeRepair, MajorityVoteRepair};
use crate::config::GenerationConfig;
use crate::lyrics::split_lyrics;
use crate::model::codec::{AudioCodec, Vocoder};
use crate::model::hub::ModelFiles;
use crate::model::lm::ModelProvider;
use crate::model::tokenizer::{HfTokenizer, TextTokenizer, resolve_special_tokens};
use crate::reconstruct::{Reconstruction, Reconstructor};
use crate::stage1::{AudioPrompt, Stage1Generator, Stage1Output};
use crate::stage2::Stage2Upsampler;
use crate::{Error, Result};

/// Everything a run wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineOutput {
    pub stage1: Stage1Output,
    pub stage2: Vec<PathBuf>,
    pub reconstruction: Option<Reconstruction>,
}

/// Vocal and instrumental vocoders.
pub struct Vocoders {
    pub vocal: Box<dyn Vocoder>,
    pub instrumental: Box<dyn Vocoder>,
}

pub struct YuePipeline {
    config: GenerationConfig,
    tokenizer: Box<dyn TextTokenizer>,
    models: Box<dyn ModelProvider>,
    repair: Box<dyn CodeRepair>,
    codec: Option<Box<dyn AudioCodec>>,
    vocoders: Option<Vocoders>,
}

impl YuePipeline {
    pub fn new(
        config: GenerationConfig,
        tokenizer: Box<dyn TextTokenizer>,
        models: Box<dyn ModelProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let repair = Box::new(MajorityVoteRepair::new(config.codec.codebook_size));
        Ok(Self {
            config,
            tokenizer,
            models,
            repair,
            codec: None,
            vocoders: None,
        })
    }

    /// Codec used to encode WAV audio prompts and decode the final codes.
    pub fn with_codec(mut self, codec: Box<dyn AudioCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn with_vocoders(mut self, vocoders: Vocoders) -> Self {
        self.vocoders = Some(vocoders);
        self
    }

    pub fn with_repair(mut self, repair: Box<dyn CodeRepair>) -> Self {
        self.repair = repair;
        self
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn run(&mut self) -> Result<PipelineOutput> {
        let genres = self.config.genre_text()?;
        let segments = split_lyrics(&self.config.lyrics_text()?);
        if segments.is_empty() {
            return Err(Error::Config(
                "lyrics contain no labeled sections such as [verse]".into(),
            ));
        }
        tracing::info!(
            segments = segments.len(),
            decoding = self.config.stage1.run_n_segments.min(segments.len()),
            genres = %genres,
            "lyrics split"
        );

        let special = resolve_special_tokens(self.tokenizer.as_ref(), self.config.special_tokens);
        let audio_prompt = self.audio_prompt()?;

        let stage1_dir = self.config.stage1_dir();
        let stage1 = {
            let mut model = self.models.stage1()?;
            let generator = Stage1Generator::new(
                self.tokenizer.as_ref(),
                special,
                self.config.codec,
                &self.config.stage1,
            );
            generator.run(
                model.as_mut(),
                &genres,
                &segments,
                audio_prompt.as_ref(),
                &stage1_dir,
            )?
        };

        let inputs: Vec<PathBuf> = stage1.paths().iter().map(|p| p.to_path_buf()).collect();
        let stage2_dir = self.config.stage2_dir();
        let stage2 = if Stage2Upsampler::pending(&inputs, &stage2_dir).is_empty() {
            tracing::info!("all stage 2 outputs exist, not loading the stage 2 model");
            inputs
                .iter()
                .map(|input| Stage2Upsampler::output_path(input, &stage2_dir))
                .collect()
        } else {
            let mut model = self.models.stage2()?;
            Stage2Upsampler::new(
                special,
                self.config.codec,
                &self.config.stage2,
                self.repair.as_ref(),
            )
            .run(model.as_mut(), &inputs, &stage2_dir)?
        };

        let reconstruction = match (self.codec.as_deref_mut(), self.vocoders.as_mut()) {
            (Some(codec), Some(vocoders)) => Some(
                Reconstructor::new(
                    codec,
                    vocoders.vocal.as_mut(),
                    vocoders.instrumental.as_mut(),
                    self.config.rescale,
                )
                .run(&stage2, &self.config.output_dir)?,
            ),
            _ => {
                tracing::info!("no codec or vocoders attached, stopping at stage 2 codes");
                None
            }
        };

        Ok(PipelineOutput {
            stage1,
            stage2,
            reconstruction,
        })
    }

    fn audio_prompt(&mut self) -> Result<Option<AudioPrompt>> {
        let Some(window) = &self.config.audio_prompt else {
            return Ok(None);
        };
        let frame_rate = self.config.codec.frame_rate;
        let prompt = if is_npy(&window.path) {
            AudioPrompt::from_npy(window, frame_rate)?
        } else {
            let codec = self.codec.as_deref_mut().ok_or_else(|| {
                Error::Config(format!(
                    "audio prompt {} needs a codec; pass pre-encoded .npy codes instead",
                    window.path.display()
                ))
            })?;
            AudioPrompt::from_wav(window, codec, frame_rate)?
        };
        Ok(Some(prompt))
    }
}

fn is_npy(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "npy")
}

/// Load the configured tokenizer, falling back to the one shipped with the
/// stage-1 checkpoint.
pub fn load_tokenizer(config: &GenerationConfig) -> Result<HfTokenizer> {
    let path = match &config.tokenizer {
        Some(path) => path.clone(),
        None => ModelFiles::resolve(&config.stage1_model)?
            .tokenizer
            .ok_or_else(|| {
                Error::Config(format!(
                    "{} has no tokenizer.json; set a tokenizer path",
                    config.stage1_model
                ))
            })?,
    };
    HfTokenizer::from_file(&path)
}
