//! Configuration for the two-stage YuE pipeline.
//!
//! Defaults match the reference decoding setup for the
//! `YuE-s1-7B-anneal-en-cot` / `YuE-s2-1B-general` checkpoints and the
//! xcodec layout they were trained on.

use std::ops::Range;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Vocabulary layout of the xcodec audio tokens.
///
/// Code `c` of codebook `k` lives at token id
/// `global_offset + k * codebook_size + c`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecLayout {
    pub global_offset: u32,
    pub codebook_size: u32,
    pub num_codebooks: usize,
    /// Codec frames per second.
    pub frame_rate: usize,
}

impl Default for CodecLayout {
    fn default() -> Self {
        Self {
            global_offset: 45334,
            codebook_size: 1024,
            num_codebooks: 12,
            frame_rate: 50,
        }
    }
}

impl CodecLayout {
    /// Token id range occupied by codebook `k`.
    pub fn codebook_range(&self, k: usize) -> Range<u32> {
        let start = self.global_offset + k as u32 * self.codebook_size;
        start..start + self.codebook_size
    }
}

/// Reserved vocabulary ids used to structure prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecialTokens {
    /// `<SOA>`: start of an audio section.
    pub soa: u32,
    /// `<EOA>`: end of an audio section; also the stop token.
    pub eoa: u32,
    /// `<stage_1>`: marks stage-1 codes in a stage-2 prompt.
    pub stage_1: u32,
    /// `<stage_2>`: marks where stage-2 codes begin.
    pub stage_2: u32,
    /// `<xcodec>`: codec separator following `<SOA>`.
    pub xcodec_separator: u32,
}

impl Default for SpecialTokens {
    fn default() -> Self {
        Self {
            soa: 32001,
            eoa: 32002,
            stage_1: 32013,
            stage_2: 32014,
            xcodec_separator: 32016,
        }
    }
}

/// Stage-1 (segment-by-segment) decoding parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stage1Config {
    pub top_p: f64,
    pub temperature: f64,
    pub repetition_penalty: f32,
    pub min_new_tokens: usize,
    pub max_new_tokens: usize,
    /// Guidance scale for the first decoded segment.
    pub guidance_scale_head: f64,
    /// Guidance scale for every later segment.
    pub guidance_scale_tail: f64,
    /// Positions the stage-1 model can attend over.
    pub model_context_length: usize,
    /// Upper bound on the number of lyric segments decoded.
    pub run_n_segments: usize,
    /// Token ids the model may never sample.
    pub blocked: Vec<Range<u32>>,
    /// Seed for the sampler. `None` draws one at random.
    pub seed: Option<u64>,
}

impl Default for Stage1Config {
    fn default() -> Self {
        Self {
            top_p: 0.93,
            temperature: 1.0,
            repetition_penalty: 1.2,
            min_new_tokens: 100,
            max_new_tokens: 3000,
            guidance_scale_head: 1.5,
            guidance_scale_tail: 1.2,
            model_context_length: 16384,
            run_n_segments: 2,
            // The second range is empty: `<xcodec>` stays sampleable.
            blocked: vec![
                0..32002,
                Range {
                    start: 32016,
                    end: 32016,
                },
            ],
            seed: None,
        }
    }
}

impl Stage1Config {
    /// Longest context fed to the model so `max_new_tokens` still fit.
    pub fn max_context(&self) -> usize {
        self.model_context_length
            .saturating_sub(self.max_new_tokens)
            .saturating_sub(1)
    }

    /// Guidance scale for segment `index` (segment 0 is the instruction).
    pub fn guidance_scale(&self, index: usize) -> f64 {
        if index <= 1 {
            self.guidance_scale_head
        } else {
            self.guidance_scale_tail
        }
    }
}

/// Stage-2 (teacher-forced upsampling) parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stage2Config {
    /// Duration of one batch element in seconds.
    pub chunk_seconds: usize,
    /// Maximum chunks decoded together.
    pub batch_size: usize,
    /// Codebooks in the refined output.
    pub codebooks: usize,
}

impl Default for Stage2Config {
    fn default() -> Self {
        Self {
            chunk_seconds: 6,
            batch_size: 4,
            codebooks: 8,
        }
    }
}

impl Stage2Config {
    /// Tokens the model must produce after each ground-truth codebook-0 token.
    pub fn tokens_per_step(&self) -> usize {
        self.codebooks - 1
    }

    /// Frames in one chunk.
    pub fn chunk_frames(&self, layout: &CodecLayout) -> usize {
        self.chunk_seconds * layout.frame_rate
    }

    /// Everything outside codebooks `1..codebooks` is blocked.
    pub fn blocked(&self, layout: &CodecLayout) -> Vec<Range<u32>> {
        vec![
            0..layout.codebook_range(1).start,
            layout.codebook_range(self.codebooks).start..u32::MAX,
        ]
    }
}

/// Reference audio used to prime the first segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioPromptConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default = "default_prompt_end")]
    pub end_time: f64,
}

fn default_prompt_end() -> f64 {
    30.0
}

/// Full configuration surface of a generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Genre tags, or a path to a `.txt` file holding them.
    pub genre: String,
    /// Lyrics, or a path to a `.txt` file holding them.
    pub lyrics: String,
    /// Stage-1 model: local directory or Hub repo id.
    pub stage1_model: String,
    /// Stage-2 model: local directory or Hub repo id.
    pub stage2_model: String,
    /// `tokenizer.json` path. Falls back to the stage-1 model's tokenizer.
    pub tokenizer: Option<PathBuf>,
    pub codec: CodecLayout,
    pub special_tokens: SpecialTokens,
    pub stage1: Stage1Config,
    pub stage2: Stage2Config,
    pub audio_prompt: Option<AudioPromptConfig>,
    pub output_dir: PathBuf,
    /// Rescale instead of clipping when saving audio.
    pub rescale: bool,
    /// CUDA device ordinal.
    pub cuda_idx: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            genre: String::new(),
            lyrics: String::new(),
            stage1_model: "m-a-p/YuE-s1-7B-anneal-en-cot".to_string(),
            stage2_model: "m-a-p/YuE-s2-1B-general".to_string(),
            tokenizer: None,
            codec: CodecLayout::default(),
            special_tokens: SpecialTokens::default(),
            stage1: Stage1Config::default(),
            stage2: Stage2Config::default(),
            audio_prompt: None,
            output_dir: PathBuf::from("./output"),
            rescale: false,
            cuda_idx: 0,
        }
    }
}

impl GenerationConfig {
    /// Load a configuration from a JSON file; absent fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Genre tags, resolved from file when needed and trimmed.
    pub fn genre_text(&self) -> Result<String> {
        Ok(read_text_or_path(&self.genre)?.trim().to_string())
    }

    /// Raw lyrics, resolved from file when needed.
    pub fn lyrics_text(&self) -> Result<String> {
        read_text_or_path(&self.lyrics)
    }

    pub fn stage1_dir(&self) -> PathBuf {
        self.output_dir.join("stage1")
    }

    pub fn stage2_dir(&self) -> PathBuf {
        self.output_dir.join("stage2")
    }

    /// Reject configurations that cannot produce a track.
    pub fn validate(&self) -> Result<()> {
        if self.stage1.max_context() == 0 {
            return Err(Error::Config(format!(
                "max_new_tokens {} leaves no context in a {}-token model",
                self.stage1.max_new_tokens, self.stage1.model_context_length
            )));
        }
        if self.stage2.batch_size == 0 {
            return Err(Error::Config("stage-2 batch size must be positive".into()));
        }
        if self.stage2.codebooks < 2 || self.stage2.codebooks > self.codec.num_codebooks {
            return Err(Error::Config(format!(
                "stage-2 codebooks must be in 2..={}, got {}",
                self.codec.num_codebooks, self.stage2.codebooks
            )));
        }
        if let Some(prompt) = &self.audio_prompt
            && prompt.end_time <= prompt.start_time
        {
            return Err(Error::Config(format!(
                "audio prompt window {}..{} is empty",
                prompt.start_time, prompt.end_time
            )));
        }
        Ok(())
    }
}

/// Values ending in `.txt` are file paths; anything else is literal text.
pub fn read_text_or_path(value: &str) -> Result<String> {
    if value.ends_with(".txt") {
        std::fs::read_to_string(value)
            .map_err(|e| Error::Config(format!("cannot read {value}: {e}")))
    } else {
        Ok(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let layout = CodecLayout::default();
        assert_eq!(layout.codebook_range(0), 45334..46358);
        assert_eq!(layout.codebook_range(8).start, 53526);
    }

    #[test]
    fn test_max_context() {
        let cfg = Stage1Config::default();
        assert_eq!(cfg.max_context(), 16384 - 3000 - 1);
    }

    #[test]
    fn test_guidance_schedule() {
        let cfg = Stage1Config::default();
        assert_eq!(cfg.guidance_scale(1), 1.5);
        assert_eq!(cfg.guidance_scale(2), 1.2);
        assert_eq!(cfg.guidance_scale(5), 1.2);
    }

    #[test]
    fn test_stage2_blocked_ranges() {
        let cfg = Stage2Config::default();
        let blocked = cfg.blocked(&CodecLayout::default());
        assert_eq!(blocked[0], 0..46358);
        assert_eq!(blocked[1].start, 53526);
        assert_eq!(cfg.tokens_per_step(), 7);
        assert_eq!(cfg.chunk_frames(&CodecLayout::default()), 300);
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(
            &path,
            r#"{"genre": "pop rock", "stage2": {"batch_size": 2}}"#,
        )
        .unwrap();
        let cfg = GenerationConfig::from_json_file(&path).unwrap();
        assert_eq!(cfg.genre, "pop rock");
        assert_eq!(cfg.stage2.batch_size, 2);
        assert_eq!(cfg.stage2.chunk_seconds, 6);
        assert_eq!(cfg.stage1.max_new_tokens, 3000);
    }

    #[test]
    fn test_text_or_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genre.txt");
        std::fs::write(&path, "  uplifting pop  \n").unwrap();
        let cfg = GenerationConfig {
            genre: path.to_string_lossy().into_owned(),
            ..Default::default()
        };
        assert_eq!(cfg.genre_text().unwrap(), "uplifting pop");
        assert_eq!(read_text_or_path("inline lyrics").unwrap(), "inline lyrics");
    }

    #[test]
    fn test_validate_rejects_empty_prompt_window() {
        let cfg = GenerationConfig {
            audio_prompt: Some(AudioPromptConfig {
                path: PathBuf::from("ref.npy"),
                start_time: 10.0,
                end_time: 10.0,
            }),
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
        assert!(GenerationConfig::default().validate().is_ok());
    }
}
