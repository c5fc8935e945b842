//! Stage 1: segment-by-segment generation of the dual-track token stream.
//!
//! Segment 0 is a synthetic instruction (genres plus the full lyrics) that is
//! never decoded on its own; it heads the prompt of segment 1. Each lyric
//! segment is then decoded in turn, its prompt appended to everything
//! generated before it:
//!
//! ```text
//! segment 1:  instruction [reference] <sos> text <SOA> <xcodec>  → codes <EOA>
//! segment i:  <eos> <sos> text <SOA> <xcodec>                    → codes <EOA>
//! ```
//!
//! The model output interleaves vocal and instrumental codes. Once all
//! segments are done, every `<SOA>`..`<EOA>` section is split into the two
//! tracks and saved as one artifact per track.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::audio::{Waveform, read_wav, resample};
use crate::codec::{CodecArray, CodecMapper, deinterleave};
use crate::config::{AudioPromptConfig, CodecLayout, SpecialTokens, Stage1Config};
use crate::lyrics::{LyricSegment, full_lyrics};
use crate::model::codec::{AudioCodec, PROMPT_BANDWIDTH_KBPS};
use crate::model::lm::{CausalLm, GenerateRequest, Sampling};
use crate::model::tokenizer::TextTokenizer;
use crate::{Error, Result};

const INSTRUCTION: &str = "Generate music from the given lyrics segment by segment.";

const START_OF_SEGMENT: &str = "[start_of_segment]";
const END_OF_SEGMENT: &str = "[end_of_segment]";
const START_OF_REFERENCE: &str = "[start_of_reference]";
const END_OF_REFERENCE: &str = "[end_of_reference]";

/// One of the two stage-1 output tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Track {
    Vocal,
    Instrumental,
}

impl Track {
    pub fn as_str(self) -> &'static str {
        match self {
            Track::Vocal => "vocal",
            Track::Instrumental => "instrumental",
        }
    }

    /// The track an artifact stem `..._{track}_{id}` belongs to.
    ///
    /// Only the segment before the id counts; genres may contain track
    /// names too.
    pub fn from_artifact_stem(stem: &str) -> Option<Self> {
        let (_, track, _) = split_artifact_stem(stem)?;
        match track {
            "vocal" => Some(Track::Vocal),
            "instrumental" => Some(Track::Instrumental),
            _ => None,
        }
    }
}

/// `stem` with its track segment replaced by `label`, e.g. `mixed`.
pub fn retrack_artifact_stem(stem: &str, label: &str) -> Option<String> {
    let (prefix, _, id) = split_artifact_stem(stem)?;
    Some(format!("{prefix}_{label}_{id}"))
}

fn split_artifact_stem(stem: &str) -> Option<(&str, &str, &str)> {
    let mut parts = stem.rsplitn(3, '_');
    let id = parts.next()?;
    let track = parts.next()?;
    let prefix = parts.next()?;
    Some((prefix, track, id))
}

/// The instruction heading every generation.
pub fn instruction_prompt(genres: &str, segments: &[LyricSegment]) -> String {
    format!(
        "{INSTRUCTION}\n[Genre] {genres}\n{}",
        full_lyrics(segments)
    )
}

/// Artifact file name for one track.
///
/// The name records the genres and decoding parameters; `id` tells runs
/// apart. Dots become `@` so the only `.` left is the extension.
pub fn artifact_name(genres: &str, config: &Stage1Config, track: Track, id: &str) -> String {
    let stem = format!(
        "cot_{}_tp{:?}_T{:?}_rp{:?}_maxtk{}_{}_{id}",
        genres.replace(' ', "-").replace('/', "-"),
        config.top_p,
        config.temperature,
        config.repetition_penalty,
        config.max_new_tokens,
        track.as_str(),
    );
    format!("{}.npy", stem.replace('.', "@"))
}

/// A random 128-bit run identifier in hex.
pub fn run_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}

/// Append-only record of every token fed to or produced by the model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenHistory {
    tokens: Vec<u32>,
}

impl TokenHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, tokens: &[u32]) {
        self.tokens.extend_from_slice(tokens);
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.tokens
    }

    /// The trailing `max_len` tokens; the whole history if it is shorter.
    pub fn window(&self, max_len: usize) -> &[u32] {
        &self.tokens[self.tokens.len().saturating_sub(max_len)..]
    }
}

/// Reference audio codes that prime segment 1.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPrompt {
    codes: CodecArray,
}

impl AudioPrompt {
    /// Keep codebook 0 of `codes` within the `[start, end)` seconds window.
    pub fn new(codes: &CodecArray, window: &AudioPromptConfig, frame_rate: usize) -> Result<Self> {
        let start = (window.start_time * frame_rate as f64) as usize;
        let end = (window.end_time * frame_rate as f64) as usize;
        let codes = codes.select_codebooks(0..1)?.slice_frames(start..end);
        tracing::info!(frames = codes.frames(), "audio prompt prepared");
        Ok(Self { codes })
    }

    /// Pre-encoded codec indices from a `.npy` file.
    pub fn from_npy(window: &AudioPromptConfig, frame_rate: usize) -> Result<Self> {
        let codes = CodecArray::read_npy(&window.path)?;
        Self::new(&codes, window, frame_rate)
    }

    /// Encode a WAV file through `codec` at the single-codebook bandwidth.
    pub fn from_wav(
        window: &AudioPromptConfig,
        codec: &mut dyn AudioCodec,
        frame_rate: usize,
    ) -> Result<Self> {
        let wave = read_wav(&window.path)?;
        Self::from_waveform(&wave, window, codec, frame_rate)
    }

    pub fn from_waveform(
        wave: &Waveform,
        window: &AudioPromptConfig,
        codec: &mut dyn AudioCodec,
        frame_rate: usize,
    ) -> Result<Self> {
        let wave = resample(wave, codec.sample_rate())?;
        let codes = codec.encode(&wave, PROMPT_BANDWIDTH_KBPS)?;
        Self::new(&codes, window, frame_rate)
    }

    pub fn codes(&self) -> &CodecArray {
        &self.codes
    }
}

/// Both tracks decoded from a stage-1 token stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOneTracks {
    pub vocal: CodecArray,
    pub instrumental: CodecArray,
}

/// Paths of the saved stage-1 artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stage1Output {
    pub vocal: PathBuf,
    pub instrumental: PathBuf,
}

impl Stage1Output {
    /// Artifacts in processing order.
    pub fn paths(&self) -> [&Path; 2] {
        [&self.vocal, &self.instrumental]
    }
}

/// Builds segment prompts and drives the stage-1 model.
pub struct Stage1Generator<'a> {
    tokenizer: &'a dyn TextTokenizer,
    special: SpecialTokens,
    mapper: CodecMapper,
    config: &'a Stage1Config,
}

impl<'a> Stage1Generator<'a> {
    pub fn new(
        tokenizer: &'a dyn TextTokenizer,
        special: SpecialTokens,
        layout: CodecLayout,
        config: &'a Stage1Config,
    ) -> Self {
        Self {
            tokenizer,
            special,
            mapper: CodecMapper::stage1(layout),
            config,
        }
    }

    /// Prompt tokens for segment `index` (1-based over `segments`).
    pub fn segment_prompt(
        &self,
        index: usize,
        genres: &str,
        segments: &[LyricSegment],
        audio_prompt: Option<&AudioPrompt>,
    ) -> Result<Vec<u32>> {
        let segment = index
            .checked_sub(1)
            .and_then(|i| segments.get(i))
            .ok_or_else(|| {
                Error::Config(format!(
                    "segment {index} out of range for {} segments",
                    segments.len()
                ))
            })?;
        let text = segment
            .prompt_text()
            .replace(START_OF_SEGMENT, "")
            .replace(END_OF_SEGMENT, "");

        let mut prompt = if index == 1 {
            let mut head = self
                .tokenizer
                .tokenize(&instruction_prompt(genres, segments))?;
            if let Some(reference) = audio_prompt {
                head.extend(self.reference_block(reference)?);
            }
            head
        } else {
            self.tokenizer.tokenize(END_OF_SEGMENT)?
        };
        prompt.extend(self.tokenizer.tokenize(START_OF_SEGMENT)?);
        prompt.extend(self.tokenizer.tokenize(&text)?);
        prompt.extend([self.special.soa, self.special.xcodec_separator]);
        Ok(prompt)
    }

    fn reference_block(&self, reference: &AudioPrompt) -> Result<Vec<u32>> {
        let mut block = self.tokenizer.tokenize(START_OF_REFERENCE)?;
        block.extend([self.special.soa, self.special.xcodec_separator]);
        block.extend(self.mapper.codes_to_ids(reference.codes())?);
        block.push(self.special.eoa);
        block.extend(self.tokenizer.tokenize(END_OF_REFERENCE)?);
        Ok(block)
    }

    /// Decode up to `run_n_segments` segments and return the full history.
    pub fn generate(
        &self,
        model: &mut dyn CausalLm,
        genres: &str,
        segments: &[LyricSegment],
        audio_prompt: Option<&AudioPrompt>,
    ) -> Result<TokenHistory> {
        // A checkpoint with a shorter window than configured bounds the context.
        let max_context = self.config.max_context().min(
            model
                .context_length()
                .saturating_sub(self.config.max_new_tokens)
                .saturating_sub(1),
        );
        let to_run = self.config.run_n_segments.min(segments.len());
        let sampling = Sampling::TopP {
            p: self.config.top_p,
            temperature: self.config.temperature,
        };
        let mut history = TokenHistory::new();

        for index in 1..=to_run {
            let prompt = self.segment_prompt(index, genres, segments, audio_prompt)?;
            history.extend(&prompt);

            let context = history.window(max_context);
            if context.len() < history.len() {
                tracing::warn!(
                    segment = index,
                    length = history.len(),
                    max_context,
                    "context exceeds window, keeping trailing tokens"
                );
            }
            tracing::info!(
                segment = index,
                of = to_run,
                label = %segments[index - 1].label,
                context = context.len(),
                "decoding segment"
            );

            let inputs = vec![context.to_vec()];
            let request = GenerateRequest {
                inputs: &inputs,
                sampling,
                repetition_penalty: self.config.repetition_penalty,
                guidance_scale: Some(self.config.guidance_scale(index)),
                blocked: &self.config.blocked,
                eos_token: self.special.eoa,
                min_new_tokens: self.config.min_new_tokens,
                max_new_tokens: self.config.max_new_tokens,
                seed: self.config.seed.map(|seed| seed.wrapping_add(index as u64)),
            };
            let mut produced = model.generate(&request)?.into_iter().next().unwrap_or_default();
            if produced.last() != Some(&self.special.eoa) {
                produced.push(self.special.eoa);
            }
            tracing::info!(segment = index, tokens = produced.len(), "segment decoded");
            history.extend(&produced);
        }

        Ok(history)
    }

    /// Split every audio section into vocal and instrumental codes.
    ///
    /// With `skip_reference` the first section, which holds the audio
    /// prompt, is left out.
    pub fn extract_tracks(&self, tokens: &[u32], skip_reference: bool) -> Result<StageOneTracks> {
        let starts = positions(tokens, self.special.soa);
        let ends = positions(tokens, self.special.eoa);
        if starts.len() != ends.len() {
            return Err(Error::MalformedOutput {
                start_markers: starts.len(),
                end_markers: ends.len(),
            });
        }

        let mut vocals = Vec::new();
        let mut instrumentals = Vec::new();
        for (&start, &end) in starts.iter().zip(&ends).skip(usize::from(skip_reference)) {
            let mut ids = tokens.get(start + 1..end).unwrap_or_default();
            if ids.first() == Some(&self.special.xcodec_separator) {
                ids = &ids[1..];
            }
            let ids = &ids[..ids.len() / 2 * 2];
            let streams = deinterleave(ids, 2)?;
            vocals.push(self.mapper.ids_to_codes(&streams[0])?);
            instrumentals.push(self.mapper.ids_to_codes(&streams[1])?);
        }

        Ok(StageOneTracks {
            vocal: concat_or_empty(&vocals)?,
            instrumental: concat_or_empty(&instrumentals)?,
        })
    }

    /// Generate, extract and save both tracks under `output_dir`.
    pub fn run(
        &self,
        model: &mut dyn CausalLm,
        genres: &str,
        segments: &[LyricSegment],
        audio_prompt: Option<&AudioPrompt>,
        output_dir: &Path,
    ) -> Result<Stage1Output> {
        let history = self.generate(model, genres, segments, audio_prompt)?;
        let tracks = self.extract_tracks(history.as_slice(), audio_prompt.is_some())?;

        let id = run_id();
        let vocal = output_dir.join(artifact_name(genres, self.config, Track::Vocal, &id));
        let instrumental =
            output_dir.join(artifact_name(genres, self.config, Track::Instrumental, &id));
        tracks.vocal.write_npy(&vocal)?;
        tracks.instrumental.write_npy(&instrumental)?;
        tracing::info!(
            frames = tracks.vocal.frames(),
            vocal = ?vocal,
            instrumental = ?instrumental,
            "stage 1 artifacts saved"
        );
        Ok(Stage1Output {
            vocal,
            instrumental,
        })
    }
}

fn positions(tokens: &[u32], marker: u32) -> Vec<usize> {
    tokens
        .iter()
        .enumerate()
        .filter_map(|(i, &t)| (t == marker).then_some(i))
        .collect()
}

fn concat_or_empty(parts: &[CodecArray]) -> Result<CodecArray> {
    if parts.is_empty() {
        Ok(CodecArray::empty(1))
    } else {
        CodecArray::concat_frames(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lyrics::split_lyrics;
    use crate::testing::{MockCodec, MockLm, MockTokenizer};

    const CB0: u32 = 45334;

    fn config() -> Stage1Config {
        Stage1Config {
            seed: Some(7),
            ..Default::default()
        }
    }

    fn generator<'a>(tokenizer: &'a MockTokenizer, config: &'a Stage1Config) -> Stage1Generator<'a> {
        Stage1Generator::new(
            tokenizer,
            SpecialTokens::default(),
            CodecLayout::default(),
            config,
        )
    }

    #[test]
    fn test_window_keeps_trailing_tokens() {
        let mut history = TokenHistory::new();
        history.extend(&(0..100).collect::<Vec<u32>>());
        let window = history.window(30);
        assert_eq!(window.len(), 30);
        assert_eq!(window, &history.as_slice()[70..]);
        assert_eq!(history.window(500).len(), 100);
        assert_eq!(history.len(), 100);
    }

    #[test]
    fn test_artifact_name_pattern() {
        let name = artifact_name(
            "inspiring female pop",
            &Stage1Config::default(),
            Track::Vocal,
            "abc",
        );
        assert_eq!(
            name,
            "cot_inspiring-female-pop_tp0@93_T1@0_rp1@2_maxtk3000_vocal_abc.npy"
        );
        assert_eq!(run_id().len(), 32);
    }

    #[test]
    fn test_track_read_from_suffix_only() {
        let config = Stage1Config::default();
        let vocal = artifact_name("instrumental pop", &config, Track::Vocal, "abc");
        let stem = vocal.trim_end_matches(".npy");
        assert_eq!(Track::from_artifact_stem(stem), Some(Track::Vocal));
        assert_eq!(
            retrack_artifact_stem(stem, "mixed").unwrap(),
            "cot_instrumental-pop_tp0@93_T1@0_rp1@2_maxtk3000_mixed_abc"
        );
        assert_eq!(Track::from_artifact_stem("cot_pop_drums_abc"), None);
        assert_eq!(Track::from_artifact_stem("vocal"), None);
    }

    #[test]
    fn test_two_segments_two_calls_with_cumulative_context() {
        let lyrics = "[verse]\nla la\n\n[chorus]\noh oh\n";
        let segments = split_lyrics(lyrics);
        assert_eq!(segments.len(), 2);

        let tokenizer = MockTokenizer::default();
        let config = config();
        let generator = generator(&tokenizer, &config);
        let mut model = MockLm::scripted(vec![CB0 + 1, CB0 + 2, CB0 + 3, CB0 + 4]);

        let history = generator.generate(&mut model, "pop", &segments, None).unwrap();
        let calls = model.calls();
        assert_eq!(calls.len(), 2);

        let first_prompt = generator.segment_prompt(1, "pop", &segments, None).unwrap();
        let second_prompt = generator.segment_prompt(2, "pop", &segments, None).unwrap();
        assert_eq!(calls[0].inputs[0], first_prompt);
        // Segment 2 sees segment 1's prompt and output, then its own prompt.
        let mut expected = first_prompt.clone();
        expected.extend([CB0 + 1, CB0 + 2, CB0 + 3, CB0 + 4, 32002]);
        expected.extend(&second_prompt);
        assert_eq!(calls[1].inputs[0], expected);
        assert_eq!(calls[0].guidance_scale, Some(1.5));
        assert_eq!(calls[1].guidance_scale, Some(1.2));

        assert_eq!(
            second_prompt[..tokenizer.tokenize(END_OF_SEGMENT).unwrap().len()],
            tokenizer.tokenize(END_OF_SEGMENT).unwrap()[..]
        );
        assert_eq!(&second_prompt[second_prompt.len() - 2..], &[32001, 32016]);

        let tracks = generator.extract_tracks(history.as_slice(), false).unwrap();
        assert_eq!(tracks.vocal.row(0), &[1, 3, 1, 3]);
        assert_eq!(tracks.instrumental.row(0), &[2, 4, 2, 4]);
    }

    #[test]
    fn test_run_n_segments_caps_calls() {
        let segments = split_lyrics("[a]\nx\n[b]\ny\n[c]\nz\n");
        let tokenizer = MockTokenizer::default();
        let config = Stage1Config {
            run_n_segments: 1,
            ..config()
        };
        let mut model = MockLm::scripted(vec![CB0, CB0]);
        generator(&tokenizer, &config)
            .generate(&mut model, "rock", &segments, None)
            .unwrap();
        assert_eq!(model.calls().len(), 1);
    }

    #[test]
    fn test_zero_segments_zero_calls() {
        let segments = split_lyrics("no sections here");
        assert!(segments.is_empty());
        let tokenizer = MockTokenizer::default();
        let config = config();
        let mut model = MockLm::scripted(vec![CB0]);
        let generator = generator(&tokenizer, &config);
        let history = generator.generate(&mut model, "pop", &segments, None).unwrap();
        assert!(model.calls().is_empty());
        assert!(history.is_empty());
        let tracks = generator.extract_tracks(history.as_slice(), false).unwrap();
        assert!(tracks.vocal.is_empty());
    }

    #[test]
    fn test_context_truncated_to_max_context() {
        let segments = split_lyrics("[verse]\none\n[chorus]\ntwo\n");
        let tokenizer = MockTokenizer::default();
        let config = Stage1Config {
            model_context_length: 60,
            max_new_tokens: 20,
            min_new_tokens: 0,
            ..config()
        };
        let max_context = config.max_context();
        let mut model = MockLm::scripted(vec![CB0; 20]);
        generator(&tokenizer, &config)
            .generate(&mut model, "pop", &segments, None)
            .unwrap();
        for call in model.calls() {
            assert!(call.inputs[0].len() <= max_context);
        }
        // The window is the tail of the history, ending in the new prompt.
        let last = &model.calls()[1].inputs[0];
        assert_eq!(last.len(), max_context);
        assert_eq!(&last[last.len() - 2..], &[32001, 32016]);
    }

    #[test]
    fn test_model_window_bounds_context() {
        let segments = split_lyrics("[verse]\none\n[chorus]\ntwo\n");
        let tokenizer = MockTokenizer::default();
        let config = Stage1Config {
            max_new_tokens: 20,
            min_new_tokens: 0,
            ..config()
        };
        let mut model = MockLm::scripted(vec![CB0; 20]).with_context_length(60);
        generator(&tokenizer, &config)
            .generate(&mut model, "pop", &segments, None)
            .unwrap();
        for call in model.calls() {
            assert!(call.inputs[0].len() <= 39);
        }
        assert_eq!(model.calls()[1].inputs[0].len(), 39);
    }

    #[test]
    fn test_missing_eoa_is_appended() {
        let segments = split_lyrics("[verse]\none\n");
        let tokenizer = MockTokenizer::default();
        let config = config();
        let mut model = MockLm::scripted(vec![CB0 + 5, CB0 + 6]);
        let history = generator(&tokenizer, &config)
            .generate(&mut model, "pop", &segments, None)
            .unwrap();
        assert_eq!(history.as_slice().last(), Some(&32002));
    }

    #[test]
    fn test_unbalanced_markers_are_malformed() {
        let tokenizer = MockTokenizer::default();
        let config = config();
        let tokens = [32001, 32016, CB0, CB0, 32002, 32001, CB0];
        let err = generator(&tokenizer, &config)
            .extract_tracks(&tokens, false)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedOutput {
                start_markers: 2,
                end_markers: 1
            }
        ));
    }

    #[test]
    fn test_extraction_skips_reference_and_odd_tail() {
        let tokenizer = MockTokenizer::default();
        let config = config();
        let tokens = [
            32001, 32016, CB0 + 9, 32002, // reference
            32001, 32016, CB0 + 1, CB0 + 2, CB0 + 3, 32002, // odd length
            32001, CB0 + 4, CB0 + 5, 32002, // no separator
        ];
        let tracks = generator(&tokenizer, &config)
            .extract_tracks(&tokens, true)
            .unwrap();
        assert_eq!(tracks.vocal.row(0), &[1, 4]);
        assert_eq!(tracks.instrumental.row(0), &[2, 5]);
    }

    #[test]
    fn test_audio_prompt_block_in_first_segment() {
        let segments = split_lyrics("[verse]\none\n");
        let tokenizer = MockTokenizer::default();
        let config = config();
        let codes = CodecArray::from_rows(vec![(0..200).collect(), vec![0; 200]]).unwrap();
        let window = AudioPromptConfig {
            path: PathBuf::from("unused.npy"),
            start_time: 1.0,
            end_time: 2.0,
        };
        let prompt = AudioPrompt::new(&codes, &window, 50).unwrap();
        assert_eq!(prompt.codes().codebooks(), 1);
        assert_eq!(prompt.codes().row(0).first(), Some(&50));
        assert_eq!(prompt.codes().frames(), 50);

        let generator = generator(&tokenizer, &config);
        let tokens = generator
            .segment_prompt(1, "pop", &segments, Some(&prompt))
            .unwrap();
        let reference_ids: Vec<u32> = (50..100).map(|c| CB0 + c).collect();
        let found = tokens.windows(reference_ids.len() + 3).any(|w| {
            w[..2] == [32001, 32016]
                && w[2..w.len() - 1] == reference_ids[..]
                && w[w.len() - 1] == 32002
        });
        assert!(found);

        // Two sections now: the reference is skipped on extraction.
        let mut model = MockLm::scripted(vec![CB0 + 7, CB0 + 8]);
        let history = generator
            .generate(&mut model, "pop", &segments, Some(&prompt))
            .unwrap();
        let tracks = generator.extract_tracks(history.as_slice(), true).unwrap();
        assert!(tracks.vocal.row(0).iter().all(|&c| c == 7));
    }

    #[test]
    fn test_audio_prompt_from_waveform_resamples_and_encodes() {
        let mut codec = MockCodec { level: 0.0 };
        // 3 s at 32 kHz becomes 150 frames at the codec's 16 kHz.
        let wave = Waveform::new(vec![0.0; 96_000], 32_000);
        let window = AudioPromptConfig {
            path: PathBuf::from("unused.wav"),
            start_time: 1.0,
            end_time: 30.0,
        };
        let prompt = AudioPrompt::from_waveform(&wave, &window, &mut codec, 50).unwrap();
        assert_eq!(prompt.codes().frames(), 100);
        assert_eq!(prompt.codes().row(0)[0], 50);
    }

    #[test]
    fn test_run_writes_both_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let segments = split_lyrics("[verse]\none\n");
        let tokenizer = MockTokenizer::default();
        let config = config();
        let mut model = MockLm::scripted(vec![CB0 + 1, CB0 + 2]);
        let output = generator(&tokenizer, &config)
            .run(&mut model, "pop", &segments, None, dir.path())
            .unwrap();
        assert!(output.vocal.to_string_lossy().contains("_vocal_"));
        assert!(output.instrumental.to_string_lossy().contains("_instrumental_"));
        let vocal = CodecArray::read_npy(&output.vocal).unwrap();
        assert_eq!(vocal.codebooks(), 1);
        assert!(vocal.row(0).iter().all(|&c| c == 1));
    }
}
