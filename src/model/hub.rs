//! Model file resolution.
//!
//! A model id is either a local directory or a HuggingFace Hub repo id
//! (e.g. `m-a-p/YuE-s1-7B-anneal-en-cot`). Hub files are fetched through
//! the `hf-hub` cache.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use hf_hub::api::sync::{Api, ApiRepo};

use crate::{Error, Result};

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_FILE: &str = "model.safetensors";
const WEIGHTS_INDEX_FILE: &str = "model.safetensors.index.json";

/// Files making up one causal LM checkpoint.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    /// `tokenizer.json`, when the checkpoint ships one.
    pub tokenizer: Option<PathBuf>,
    /// One or more safetensors shards.
    pub weights: Vec<PathBuf>,
}

impl ModelFiles {
    /// Resolve `model_id` as a local directory if one exists, otherwise as a
    /// Hub repo.
    pub fn resolve(model_id: &str) -> Result<Self> {
        let local = Path::new(model_id);
        if local.is_dir() {
            Self::from_dir(local)
        } else {
            Self::from_hub(model_id)
        }
    }

    pub fn from_dir(dir: &Path) -> Result<Self> {
        let config = dir.join(CONFIG_FILE);
        if !config.is_file() {
            return Err(Error::WeightLoad(format!(
                "{} not found in {}",
                CONFIG_FILE,
                dir.display()
            )));
        }
        let index = dir.join(WEIGHTS_INDEX_FILE);
        let weights = if index.is_file() {
            shard_names(&std::fs::read_to_string(&index)?)?
                .into_iter()
                .map(|name| dir.join(name))
                .collect()
        } else {
            let single = dir.join(WEIGHTS_FILE);
            if !single.is_file() {
                return Err(Error::WeightLoad(format!(
                    "no safetensors weights in {}",
                    dir.display()
                )));
            }
            vec![single]
        };
        let tokenizer = Some(dir.join(TOKENIZER_FILE)).filter(|path| path.is_file());
        Ok(Self {
            config,
            tokenizer,
            weights,
        })
    }

    pub fn from_hub(repo_id: &str) -> Result<Self> {
        tracing::info!(repo = repo_id, "resolving model files from HuggingFace Hub");
        let api = Api::new()?;
        let repo = api.model(repo_id.to_string());
        let config = repo.get(CONFIG_FILE)?;
        let weights = match repo.get(WEIGHTS_INDEX_FILE) {
            Ok(index) => fetch_shards(&repo, &std::fs::read_to_string(index)?)?,
            Err(_) => vec![repo.get(WEIGHTS_FILE)?],
        };
        let tokenizer = repo.get(TOKENIZER_FILE).ok();
        Ok(Self {
            config,
            tokenizer,
            weights,
        })
    }
}

fn fetch_shards(repo: &ApiRepo, index_json: &str) -> Result<Vec<PathBuf>> {
    shard_names(index_json)?
        .iter()
        .map(|name| Ok(repo.get(name)?))
        .collect()
}

/// Distinct shard file names referenced by a safetensors index, sorted.
fn shard_names(index_json: &str) -> Result<Vec<String>> {
    let index: serde_json::Value = serde_json::from_str(index_json)?;
    let weight_map = index["weight_map"]
        .as_object()
        .ok_or_else(|| Error::WeightLoad("safetensors index has no weight_map".into()))?;
    let names: BTreeSet<String> = weight_map
        .values()
        .filter_map(|value| value.as_str().map(str::to_string))
        .collect();
    Ok(names.into_iter().collect())
}
