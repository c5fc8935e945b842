//! Stage 2: teacher-forced upsampling from one codebook to eight.
//!
//! The stage-1 codes are cut into fixed-length chunks that are decoded side
//! by side in one batch. Each batch row is prompted with
//! `<SOA> <stage_1> chunk <stage_2>`, then for every frame the known
//! codebook-0 token is appended and the model fills in the other seven
//! codebooks:
//!
//! ```text
//! ... <stage_2> c0[0] c1[0]..c7[0] c0[1] c1[1]..c7[1] ...
//!               ^^^^^ forced       ^^^^^ forced
//! ```
//!
//! Frames past the last whole chunk are decoded afterwards as a batch of
//! one. Out-of-range codes in the result are repaired before saving.

use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::codec::{CodeRepair, CodecArray, CodecMapper};
use crate::config::{CodecLayout, SpecialTokens, Stage2Config};
use crate::model::lm::{CausalLm, GenerateRequest, Sampling};
use crate::{Error, Result};

/// How the frames of one artifact are grouped into model calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    /// Frame ranges of whole-chunk batches, in order.
    pub batches: Vec<Range<usize>>,
    /// Frames after the last whole chunk, decoded as a batch of one.
    pub remainder: Option<Range<usize>>,
}

impl BatchPlan {
    pub fn new(frames: usize, chunk_frames: usize, batch_size: usize) -> Self {
        let chunk_frames = chunk_frames.max(1);
        let batch_frames = chunk_frames * batch_size.max(1);
        let usable = frames / chunk_frames * chunk_frames;
        let batches = (0..usable)
            .step_by(batch_frames)
            .map(|start| start..(start + batch_frames).min(usable))
            .collect();
        let remainder = (usable < frames).then_some(usable..frames);
        Self { batches, remainder }
    }
}

/// Runs the stage-2 model over stage-1 artifacts.
pub struct Stage2Upsampler<'a> {
    special: SpecialTokens,
    layout: CodecLayout,
    config: &'a Stage2Config,
    repair: &'a dyn CodeRepair,
}

impl<'a> Stage2Upsampler<'a> {
    pub fn new(
        special: SpecialTokens,
        layout: CodecLayout,
        config: &'a Stage2Config,
        repair: &'a dyn CodeRepair,
    ) -> Self {
        Self {
            special,
            layout,
            config,
            repair,
        }
    }

    /// Where the refined version of `input` is written.
    pub fn output_path(input: &Path, output_dir: &Path) -> PathBuf {
        output_dir.join(input.file_name().unwrap_or_default())
    }

    /// Inputs whose output does not exist yet.
    pub fn pending<'p>(inputs: &'p [PathBuf], output_dir: &Path) -> Vec<&'p PathBuf> {
        inputs
            .iter()
            .filter(|input| !Self::output_path(input, output_dir).exists())
            .collect()
    }

    /// Refine every artifact in `inputs`, skipping those already done.
    ///
    /// Returns the output paths in input order, skipped ones included.
    pub fn run(
        &self,
        model: &mut dyn CausalLm,
        inputs: &[PathBuf],
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let mut outputs = Vec::with_capacity(inputs.len());
        for input in inputs {
            let output = Self::output_path(input, output_dir);
            if output.exists() {
                tracing::info!(path = ?output, "stage 2 output exists, skipping");
                outputs.push(output);
                continue;
            }
            let codes = CodecArray::read_npy(input)?;
            tracing::info!(path = ?input, frames = codes.frames(), "stage 2 upsampling");
            let refined = self.upsample(model, &codes)?;
            refined.write_npy(&output)?;
            outputs.push(output);
        }
        Ok(outputs)
    }

    /// Upsample single-codebook `codes` and repair invalid codes.
    ///
    /// Invalid codes in the input are repaired first so they can be mapped
    /// back into the vocabulary.
    pub fn upsample(&self, model: &mut dyn CausalLm, codes: &CodecArray) -> Result<CodecArray> {
        let mut codes = codes.select_codebooks(0..1)?;
        let invalid = self.repair.repair(&mut codes);
        if invalid > 0 {
            tracing::warn!(invalid, "replaced out-of-range stage 1 codes before upsampling");
        }
        let ids = CodecMapper::stage1(self.layout).codes_to_ids(&codes)?;
        let chunk_frames = self.config.chunk_frames(&self.layout);
        let plan = BatchPlan::new(ids.len(), chunk_frames, self.config.batch_size);

        let per_frame = self.config.codebooks;
        let mut output = Vec::with_capacity(ids.len() * per_frame);
        for batch in &plan.batches {
            let rows: Vec<Vec<u32>> = ids[batch.clone()]
                .chunks(chunk_frames)
                .map(<[u32]>::to_vec)
                .collect();
            tracing::debug!(frames = ?batch, rows = rows.len(), "stage 2 batch");
            for row in self.teacher_force(model, &rows)? {
                output.extend(row);
            }
        }
        if let Some(remainder) = plan.remainder {
            tracing::debug!(frames = ?remainder, "stage 2 remainder");
            let rows = vec![ids[remainder].to_vec()];
            for row in self.teacher_force(model, &rows)? {
                output.extend(row);
            }
        }

        let mut refined =
            CodecMapper::stage2(self.layout, self.config.codebooks).ids_to_codes(&output)?;
        let invalid = self.repair.repair(&mut refined);
        if invalid > 0 {
            tracing::warn!(
                invalid,
                "replaced out-of-range codes; audio quality may suffer"
            );
        }
        Ok(refined)
    }

    /// Decode equally long rows of codebook-0 tokens frame by frame.
    ///
    /// Returns, per row, `codebooks` tokens per frame in frame order.
    pub fn teacher_force(
        &self,
        model: &mut dyn CausalLm,
        rows: &[Vec<u32>],
    ) -> Result<Vec<Vec<u32>>> {
        let frames = rows.first().map_or(0, Vec::len);
        let mut prompts: Vec<Vec<u32>> = rows
            .iter()
            .map(|row| {
                let mut prompt = Vec::with_capacity(3 + row.len() * (1 + self.config.codebooks));
                prompt.extend([self.special.soa, self.special.stage_1]);
                prompt.extend(row);
                prompt.push(self.special.stage_2);
                prompt
            })
            .collect();
        let prompt_len = prompts.first().map_or(0, Vec::len);

        let blocked = self.config.blocked(&self.layout);
        let expected = self.config.tokens_per_step();
        for frame in 0..frames {
            for (prompt, row) in prompts.iter_mut().zip(rows) {
                prompt.push(row[frame]);
            }
            let request = GenerateRequest {
                inputs: &prompts,
                sampling: Sampling::Greedy,
                repetition_penalty: 1.0,
                guidance_scale: None,
                blocked: &blocked,
                eos_token: self.special.eoa,
                min_new_tokens: expected,
                max_new_tokens: expected,
                seed: None,
            };
            let produced = model.generate(&request)?;
            if produced.len() != prompts.len() {
                return Err(Error::Config(format!(
                    "stage 2 model returned {} rows for a batch of {}",
                    produced.len(),
                    prompts.len()
                )));
            }
            for (prompt, new_tokens) in prompts.iter_mut().zip(produced) {
                if new_tokens.len() != expected {
                    return Err(Error::TeacherForcing {
                        expected,
                        produced: new_tokens.len(),
                    });
                }
                prompt.extend(new_tokens);
            }
        }

        Ok(prompts
            .into_iter()
            .map(|prompt| prompt[prompt_len..].to_vec())
            .collect())
    }
}
