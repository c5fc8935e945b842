//! Logits processing for one decode step.
//!
//! Applied to the last-position logits of a single batch row, in order:
//!
//! 1. classifier-free guidance against the unconditional branch
//! 2. repetition penalty over the full context
//! 3. eos suppression until `min_new_tokens` have been produced
//! 4. blocked id ranges
//!
//! followed by token selection through candle's `LogitsProcessor`.

use candle_core::{D, DType, Tensor};
use candle_transformers::generation::{self, LogitsProcessor};

use super::lm::{GenerateRequest, Sampling};
use crate::Result;

/// Mix conditional and unconditional logits in log-probability space:
/// `scale * (cond - uncond) + uncond`.
pub fn apply_guidance(cond: &Tensor, uncond: &Tensor, scale: f64) -> Result<Tensor> {
    let cond = candle_nn::ops::log_softmax(&cond.to_dtype(DType::F32)?, D::Minus1)?;
    let uncond = candle_nn::ops::log_softmax(&uncond.to_dtype(DType::F32)?, D::Minus1)?;
    let guided = ((cond - &uncond)? * scale)?;
    Ok((guided + uncond)?)
}

/// Set the logits of every blocked token to `-inf`, and of `eos_token`
/// too while `suppress_eos` holds.
pub fn mask_tokens(
    logits: &Tensor,
    request: &GenerateRequest<'_>,
    suppress_eos: bool,
) -> Result<Tensor> {
    let mut values = logits.to_dtype(DType::F32)?.to_vec1::<f32>()?;
    let vocab = values.len();
    for range in request.blocked {
        let start = (range.start as usize).min(vocab);
        let end = (range.end as usize).min(vocab);
        values[start..end].fill(f32::NEG_INFINITY);
    }
    if suppress_eos && let Some(eos) = values.get_mut(request.eos_token as usize) {
        *eos = f32::NEG_INFINITY;
    }
    Ok(Tensor::from_vec(values, vocab, logits.device())?)
}

/// Run steps 1–4 on one row's logits.
///
/// `context` is the row's prompt followed by the tokens generated so far;
/// `generated` is how many of those are new.
pub fn process_logits(
    logits: &Tensor,
    uncond: Option<&Tensor>,
    context: &[u32],
    generated: usize,
    request: &GenerateRequest<'_>,
) -> Result<Tensor> {
    let mut logits = match (uncond, request.guidance_scale) {
        (Some(uncond), Some(scale)) => apply_guidance(logits, uncond, scale)?,
        _ => logits.to_dtype(DType::F32)?,
    };
    if request.repetition_penalty != 1.0 {
        logits = candle_transformers::utils::apply_repeat_penalty(
            &logits,
            request.repetition_penalty,
            context,
        )?;
    }
    mask_tokens(&logits, request, generated < request.min_new_tokens)
}

/// Build the token selector for a request.
pub fn logits_processor(sampling: Sampling, seed: u64) -> LogitsProcessor {
    let sampling = match sampling {
        Sampling::Greedy => generation::Sampling::ArgMax,
        Sampling::TopP { p, temperature } => generation::Sampling::TopP { p, temperature },
    };
    LogitsProcessor::from_sampling(seed, sampling)
}
