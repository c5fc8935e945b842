//! Llama causal LM on candle.
//!
//! Both YuE stages are Llama checkpoints in HuggingFace layout. [`LlamaLm`]
//! wraps `candle_transformers::models::llama` behind [`CausalLm`].
//!
//! # KV cache reuse
//!
//! Stage 2 calls `generate` once per frame with the previous call's tokens
//! plus a few more; stage 1 does the same per segment until the context
//! window starts sliding. The cache is kept across calls and only the new
//! tail is fed when the request extends what the model has already seen.
//! Anything else rebuilds the cache from a full prefill.
//!
//! Candle's Llama builds its causal mask without the cached prefix, so a
//! multi-token forward is only valid on an empty cache. Incremental feeding
//! is therefore done one position at a time.

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::llama::{Cache, Config, Llama, LlamaConfig};

use super::hub::ModelFiles;
use super::lm::{CausalLm, GenerateRequest, ModelProvider};
use super::sampling::{logits_processor, process_logits};
use crate::{Error, Result};

/// Longest tail fed token by token before a full prefill is cheaper.
const MAX_INCREMENTAL_TOKENS: usize = 512;

/// Return the preferred device: CUDA if available, otherwise CPU.
pub fn preferred_device(cuda_ordinal: usize) -> Device {
    Device::cuda_if_available(cuda_ordinal).unwrap_or(Device::Cpu)
}

/// BF16 on accelerators, F32 on CPU.
pub fn preferred_dtype(device: &Device) -> DType {
    if device.is_cpu() {
        DType::F32
    } else {
        DType::BF16
    }
}

/// A loaded Llama checkpoint with a persistent KV cache.
pub struct LlamaLm {
    model: Llama,
    config: Config,
    device: Device,
    dtype: DType,
    cache: Cache,
    /// Tokens whose keys/values are in `cache`, per batch row.
    fed: Vec<Vec<u32>>,
}

impl LlamaLm {
    pub fn load(files: &ModelFiles, device: &Device, dtype: DType) -> Result<Self> {
        let config_json = std::fs::read_to_string(&files.config)?;
        let llama_config: LlamaConfig = serde_json::from_str(&config_json)?;
        let config = llama_config.into_config(cfg!(feature = "flash-attn"));

        tracing::info!(
            shards = files.weights.len(),
            layers = config.num_hidden_layers,
            vocab = config.vocab_size,
            "loading Llama weights"
        );
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&files.weights, dtype, device)
                .map_err(|e| Error::WeightLoad(format!("Llama weights: {e}")))?
        };
        let model = Llama::load(vb, &config)
            .map_err(|e| Error::WeightLoad(format!("Llama model init: {e}")))?;
        let cache = Cache::new(true, dtype, &config, device)?;

        Ok(Self {
            model,
            config,
            device: device.clone(),
            dtype,
            cache,
            fed: Vec::new(),
        })
    }

    fn new_cache(&self) -> Result<Cache> {
        Ok(Cache::new(true, self.dtype, &self.config, &self.device)?)
    }

    /// Bring the cache up to date with `inputs` and return the logits of
    /// their last position, `(batch, vocab)`.
    fn prime(&mut self, inputs: &[Vec<u32>]) -> Result<Tensor> {
        match reusable_prefix(&self.fed, inputs, MAX_INCREMENTAL_TOKENS) {
            Some(reused) => {
                tracing::debug!(reused, new = inputs[0].len() - reused, "reusing KV cache");
                let mut logits = None;
                for pos in reused..inputs[0].len() {
                    let column: Vec<u32> = inputs.iter().map(|row| row[pos]).collect();
                    logits = Some(self.feed(&column)?);
                }
                logits.ok_or_else(|| Error::Config("nothing to feed".into()))
            }
            None => {
                self.fed.clear();
                self.cache = self.new_cache()?;
                let (batch, len) = (inputs.len(), inputs[0].len());
                let flat: Vec<u32> = inputs.iter().flatten().copied().collect();
                let input = Tensor::from_vec(flat, (batch, len), &self.device)?;
                let logits = self.model.forward(&input, 0, &mut self.cache)?;
                self.fed = inputs.to_vec();
                Ok(logits)
            }
        }
    }

    /// Feed one token per row at the next position.
    fn feed(&mut self, column: &[u32]) -> Result<Tensor> {
        let index_pos = self.fed.first().map_or(0, Vec::len);
        let input = Tensor::new(column, &self.device)?.unsqueeze(1)?;
        let logits = self.model.forward(&input, index_pos, &mut self.cache)?;
        for (row, &token) in self.fed.iter_mut().zip(column) {
            row.push(token);
        }
        Ok(logits)
    }
}

/// The classifier-free guidance branch: the same model conditioned only on
/// the last prompt token, with a cache of its own.
struct Unconditional {
    cache: Cache,
    pos: usize,
}

impl Unconditional {
    fn step(&mut self, model: &Llama, column: &[u32], device: &Device) -> Result<Tensor> {
        let input = Tensor::new(column, device)?.unsqueeze(1)?;
        let logits = model.forward(&input, self.pos, &mut self.cache)?;
        self.pos += 1;
        Ok(logits)
    }
}

impl CausalLm for LlamaLm {
    fn generate(&mut self, request: &GenerateRequest<'_>) -> Result<Vec<Vec<u32>>> {
        request.validate()?;
        let batch = request.batch_size();
        let seed = request.seed.unwrap_or_else(rand::random);
        let mut processor = logits_processor(request.sampling, seed);

        let mut logits = self.prime(request.inputs)?;
        let mut uncond = match request.guidance_scale {
            Some(_) => Some(Unconditional {
                cache: self.new_cache()?,
                pos: 0,
            }),
            None => None,
        };
        let mut uncond_logits = match &mut uncond {
            Some(branch) => {
                let last: Vec<u32> = request
                    .inputs
                    .iter()
                    .map(|row| row[row.len() - 1])
                    .collect();
                Some(branch.step(&self.model, &last, &self.device)?)
            }
            None => None,
        };

        let mut contexts = request.inputs.to_vec();
        let mut generated = vec![Vec::with_capacity(request.max_new_tokens); batch];
        let mut finished = vec![false; batch];

        for step in 0..request.max_new_tokens {
            let mut column = Vec::with_capacity(batch);
            for row in 0..batch {
                if finished[row] {
                    column.push(request.eos_token);
                    continue;
                }
                let row_logits = logits.get(row)?;
                let row_uncond = match &uncond_logits {
                    Some(u) => Some(u.get(row)?),
                    None => None,
                };
                let processed = process_logits(
                    &row_logits,
                    row_uncond.as_ref(),
                    &contexts[row],
                    step,
                    request,
                )?;
                column.push(processor.sample(&processed)?);
            }

            for (row, &token) in column.iter().enumerate() {
                generated[row].push(token);
                contexts[row].push(token);
                if token == request.eos_token {
                    finished[row] = true;
                }
            }
            if finished.iter().all(|&done| done) || step + 1 == request.max_new_tokens {
                break;
            }

            logits = self.feed(&column)?;
            if let Some(branch) = &mut uncond {
                uncond_logits = Some(branch.step(&self.model, &column, &self.device)?);
            }
        }

        tracing::debug!(
            rows = batch,
            new_tokens = generated.first().map_or(0, Vec::len),
            "generation finished"
        );
        Ok(generated)
    }

    fn context_length(&self) -> usize {
        self.config.max_position_embeddings
    }
}

/// Number of leading tokens of `inputs` already in the cache, when the cache
/// can be extended rather than rebuilt.
fn reusable_prefix(fed: &[Vec<u32>], inputs: &[Vec<u32>], max_delta: usize) -> Option<usize> {
    let fed_len = fed.first()?.len();
    let len = inputs.first()?.len();
    if fed.len() != inputs.len() || fed_len == 0 || len <= fed_len || len - fed_len > max_delta {
        return None;
    }
    inputs
        .iter()
        .zip(fed)
        .all(|(row, seen)| row.starts_with(seen))
        .then_some(fed_len)
}

/// Loads the stage models from local directories or the Hub on request.
pub struct HubModels {
    stage1_id: String,
    stage2_id: String,
    device: Device,
    dtype: DType,
}

impl HubModels {
    pub fn new(stage1_id: impl Into<String>, stage2_id: impl Into<String>, device: Device) -> Self {
        let dtype = preferred_dtype(&device);
        Self {
            stage1_id: stage1_id.into(),
            stage2_id: stage2_id.into(),
            device,
            dtype,
        }
    }

    fn load(&self, model_id: &str) -> Result<Box<dyn CausalLm>> {
        tracing::info!(model = model_id, device = ?self.device, dtype = ?self.dtype, "loading model");
        let files = ModelFiles::resolve(model_id)?;
        Ok(Box::new(LlamaLm::load(&files, &self.device, self.dtype)?))
    }
}

impl ModelProvider for HubModels {
    fn stage1(&mut self) -> Result<Box<dyn CausalLm>> {
        self.load(&self.stage1_id)
    }

    fn stage2(&mut self) -> Result<Box<dyn CausalLm>> {
        self.load(&self.stage2_id)
    }
}
