//! Text tokenizer.

use std::path::Path;

use tokenizers::Tokenizer;

use crate::config::SpecialTokens;
use crate::error::TokenizerError;
use crate::{Error, Result};

/// Turns prompt text into vocabulary ids.
pub trait TextTokenizer {
    /// Encode `text` without adding special tokens.
    fn tokenize(&self, text: &str) -> Result<Vec<u32>>;

    /// Id of a single vocabulary entry, if present.
    fn token_id(&self, token: &str) -> Option<u32>;
}

/// `tokenizer.json` backed tokenizer.
pub struct HfTokenizer {
    inner: Tokenizer,
}

impl HfTokenizer {
    pub fn from_file(path: &Path) -> Result<Self> {
        tracing::info!(path = ?path, "loading tokenizer");
        let inner = Tokenizer::from_file(path).map_err(|e| {
            Error::Tokenizer(TokenizerError(format!("{}: {e}", path.display())))
        })?;
        Ok(Self { inner })
    }
}

impl TextTokenizer for HfTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self.inner.encode(text, false)?;
        Ok(encoding.get_ids().to_vec())
    }

    fn token_id(&self, token: &str) -> Option<u32> {
        self.inner.token_to_id(token)
    }
}

/// Look the structural tokens up in the vocabulary, keeping `defaults` for
/// any the tokenizer does not define.
pub fn resolve_special_tokens(
    tokenizer: &dyn TextTokenizer,
    defaults: SpecialTokens,
) -> SpecialTokens {
    let lookup = |name: &str, fallback: u32| match tokenizer.token_id(name) {
        Some(id) => {
            if id != fallback {
                tracing::debug!(token = name, id, fallback, "vocabulary overrides special token");
            }
            id
        }
        None => fallback,
    };
    SpecialTokens {
        soa: lookup("<SOA>", defaults.soa),
        eoa: lookup("<EOA>", defaults.eoa),
        stage_1: lookup("<stage_1>", defaults.stage_1),
        stage_2: lookup("<stage_2>", defaults.stage_2),
        xcodec_separator: lookup("<xcodec>", defaults.xcodec_separator),
    }
}
