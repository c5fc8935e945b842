//! Model collaborators.
//!
//! The pipeline talks to its models only through the traits defined here,
//! so stage logic can be driven by real candle models or by test doubles.
//!
//! - [`lm`] — [`CausalLm`](lm::CausalLm) generation contract and [`ModelProvider`](lm::ModelProvider)
//! - [`sampling`] — logits processing (guidance, repetition penalty, blocked ids)
//! - [`llama`] — candle Llama implementation of the stage-1/stage-2 models
//! - [`hub`] — model file resolution (local directory or HuggingFace Hub)
//! - [`tokenizer`] — text tokenizer and special-token resolution
//! - [`codec`] — neural codec and vocoder contracts

pub mod codec;
pub mod hub;
pub mod llama;
pub mod lm;
pub mod sampling;
pub mod tokenizer;
