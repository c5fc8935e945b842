//! Error types for yue-rs.

use std::fmt;
use std::ops::Range;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Candle tensor/model error.
    #[error("candle: {0}")]
    Candle(#[from] candle_core::Error),

    /// Tokenizer error.
    #[error("tokenizer: {0}")]
    Tokenizer(TokenizerError),

    /// Audio processing error (resampling, WAV I/O, mixing).
    #[error("audio: {0}")]
    Audio(String),

    /// Model weight loading error.
    #[error("weight loading: {0}")]
    WeightLoad(String),

    /// Invalid configuration.
    #[error("config: {0}")]
    Config(String),

    /// I/O error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// HuggingFace Hub error.
    #[error("hf-hub: {0}")]
    HfHub(String),

    /// Stage-1 output cannot be split into audio sections.
    #[error(
        "invalid pairs of start/end-of-audio markers: {start_markers} start, {end_markers} end"
    )]
    MalformedOutput {
        start_markers: usize,
        end_markers: usize,
    },

    /// A flat codec id sequence is not aligned to the codebook count.
    #[error("{len} codec ids cannot be split into {num_codebooks} codebooks")]
    ShapeMismatch { len: usize, num_codebooks: usize },

    /// A teacher-forcing step produced the wrong number of tokens.
    #[error("teacher forcing expected {expected} new tokens per step, model produced {produced}")]
    TeacherForcing { expected: usize, produced: usize },

    /// A codec index outside `[0, codebook_size)` where a valid code is required.
    #[error("codec index {value} outside codebook of size {codebook_size}")]
    CodeOutOfRange { value: i64, codebook_size: usize },

    /// A token sequence does not start inside the expected codebook range.
    #[error("token {token} does not start codebook range {}..{}", range.start, range.end)]
    CodebookMismatch { token: u32, range: Range<u32> },
}

/// Wrapper for tokenizer errors (tokenizers::Error doesn't impl std::error::Error).
#[derive(Debug)]
pub struct TokenizerError(pub String);

impl fmt::Display for TokenizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<tokenizers::Error> for Error {
    fn from(error: tokenizers::Error) -> Self {
        Error::Tokenizer(TokenizerError(error.to_string()))
    }
}

impl From<hound::Error> for Error {
    fn from(error: hound::Error) -> Self {
        Error::Audio(error.to_string())
    }
}

impl From<hf_hub::api::sync::ApiError> for Error {
    fn from(error: hf_hub::api::sync::ApiError) -> Self {
        Error::HfHub(error.to_string())
    }
}
