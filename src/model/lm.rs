//! Autoregressive generation contract.

use std::ops::Range;

use crate::{Error, Result};

/// Token selection after logits processing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sampling {
    /// Always take the highest-scoring token.
    Greedy,
    /// Nucleus sampling.
    TopP { p: f64, temperature: f64 },
}

/// One call to [`CausalLm::generate`].
#[derive(Debug, Clone)]
pub struct GenerateRequest<'a> {
    /// Batch rows; all must have the same length.
    pub inputs: &'a [Vec<u32>],
    pub sampling: Sampling,
    /// `1.0` disables the penalty.
    pub repetition_penalty: f32,
    /// Classifier-free guidance scale. `None` disables guidance.
    pub guidance_scale: Option<f64>,
    /// Token ids that may never be produced.
    pub blocked: &'a [Range<u32>],
    /// Stop token; finished rows are padded with it.
    pub eos_token: u32,
    pub min_new_tokens: usize,
    pub max_new_tokens: usize,
    /// Sampler seed. `None` draws a fresh one per call.
    pub seed: Option<u64>,
}

impl GenerateRequest<'_> {
    pub fn batch_size(&self) -> usize {
        self.inputs.len()
    }

    /// Length shared by every batch row.
    pub fn input_len(&self) -> usize {
        self.inputs.first().map_or(0, Vec::len)
    }

    pub fn validate(&self) -> Result<()> {
        let len = self.input_len();
        if len == 0 {
            return Err(Error::Config("generate called with an empty prompt".into()));
        }
        if self.inputs.iter().any(|row| row.len() != len) {
            return Err(Error::Config(
                "generate requires equally long batch rows".into(),
            ));
        }
        if self.min_new_tokens > self.max_new_tokens {
            return Err(Error::Config(format!(
                "min_new_tokens {} exceeds max_new_tokens {}",
                self.min_new_tokens, self.max_new_tokens
            )));
        }
        Ok(())
    }

    /// Whether `token` is in a blocked range.
    pub fn is_blocked(&self, token: u32) -> bool {
        self.blocked.iter().any(|range| range.contains(&token))
    }
}

/// A causal language model that can extend a batch of token sequences.
pub trait CausalLm {
    /// Generate new tokens for every batch row.
    ///
    /// Returns only the newly generated tokens, one vector per row. Rows that
    /// stop early are padded with `eos_token` to the longest row.
    fn generate(&mut self, request: &GenerateRequest<'_>) -> Result<Vec<Vec<u32>>>;

    /// Maximum positions the model attends over.
    fn context_length(&self) -> usize;
}

impl<T: CausalLm + ?Sized> CausalLm for Box<T> {
    fn generate(&mut self, request: &GenerateRequest<'_>) -> Result<Vec<Vec<u32>>> {
        (**self).generate(request)
    }

    fn context_length(&self) -> usize {
        (**self).context_length()
    }
}

/// Hands out the stage models on demand.
///
/// The pipeline acquires each model right before its stage and drops it
/// when the stage ends, so only one model is resident at a time.
pub trait ModelProvider {
    fn stage1(&mut self) -> Result<Box<dyn CausalLm>>;
    fn stage2(&mut self) -> Result<Box<dyn CausalLm>>;
}
