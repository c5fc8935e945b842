//! YuE lyrics-to-song generation in Rust.
//!
//! Orchestrates the two-stage YuE language models on candle. Loads the
//! original safetensors checkpoints directly from a local directory or the
//! HuggingFace Hub.
//!
//! ## Architecture
//!
//! ```text
//! genres + lyrics → segments ──┐
//!                              ↓
//!          stage 1 (7B Llama, segment by segment, CFG)
//!                              ↓  codebook 0, vocal + instrumental
//!          stage 2 (1B Llama, teacher-forced, batched)
//!                              ↓  8 codebooks
//!          codec decode + vocoders → crossover mix
//! ```
//!
//! ## Modules
//!
//! - [`lyrics`] — section splitting
//! - [`codec`] — codec arrays, vocabulary mapping, invalid-code repair
//! - [`stage1`] — segment prompts, context window, track extraction
//! - [`stage2`] — chunked teacher-forced upsampling
//! - [`model`] — language model, tokenizer, codec and vocoder contracts
//! - [`audio`] — WAV I/O, resampling, mixing, crossover blend
//! - [`reconstruct`] — codes to finished audio
//! - [`pipeline`] — end-to-end run

pub mod audio;
pub mod codec;
pub mod config;
pub mod lyrics;
pub mod model;
pub mod pipeline;
pub mod reconstruct;
pub mod stage1;
pub mod stage2;

mod error;

pub use error::{Error, Result};

#[cfg(test)]
mod testing;
