//! Test doubles for the model collaborators.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;
use std::rc::Rc;

use crate::Result;
use crate::audio::Waveform;
use crate::codec::CodecArray;
use crate::model::codec::{AudioCodec, Vocoder};
use crate::model::lm::{CausalLm, GenerateRequest, ModelProvider, Sampling};
use crate::model::tokenizer::TextTokenizer;

/// What a [`MockLm`] was asked to do.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub inputs: Vec<Vec<u32>>,
    pub sampling: Sampling,
    pub guidance_scale: Option<f64>,
    pub blocked: Vec<Range<u32>>,
    pub min_new_tokens: usize,
    pub max_new_tokens: usize,
}

type Responder = Box<dyn FnMut(usize, &GenerateRequest<'_>) -> Vec<Vec<u32>>>;

/// Scripted language model that records every call.
pub struct MockLm {
    responder: Responder,
    calls: Vec<RecordedCall>,
    events: Option<(Rc<RefCell<Vec<String>>>, &'static str)>,
    context_length: usize,
}

impl MockLm {
    /// Answer every call with `tokens` for each batch row.
    pub fn scripted(tokens: Vec<u32>) -> Self {
        Self::with(move |_, request| vec![tokens.clone(); request.inputs.len()])
    }

    /// Answer with `f(call_index, request)`.
    pub fn with<F>(f: F) -> Self
    where
        F: FnMut(usize, &GenerateRequest<'_>) -> Vec<Vec<u32>> + 'static,
    {
        Self {
            responder: Box::new(f),
            calls: Vec::new(),
            events: None,
            context_length: 16384,
        }
    }

    pub fn with_context_length(mut self, context_length: usize) -> Self {
        self.context_length = context_length;
        self
    }

    /// Log `drop <name>` into `events` when dropped.
    pub fn tracked(mut self, events: Rc<RefCell<Vec<String>>>, name: &'static str) -> Self {
        self.events = Some((events, name));
        self
    }

    pub fn calls(&self) -> &[RecordedCall] {
        &self.calls
    }
}

impl CausalLm for MockLm {
    fn generate(&mut self, request: &GenerateRequest<'_>) -> Result<Vec<Vec<u32>>> {
        request.validate()?;
        let index = self.calls.len();
        self.calls.push(RecordedCall {
            inputs: request.inputs.to_vec(),
            sampling: request.sampling,
            guidance_scale: request.guidance_scale,
            blocked: request.blocked.to_vec(),
            min_new_tokens: request.min_new_tokens,
            max_new_tokens: request.max_new_tokens,
        });
        Ok((self.responder)(index, request))
    }

    fn context_length(&self) -> usize {
        self.context_length
    }
}

impl Drop for MockLm {
    fn drop(&mut self) {
        if let Some((events, name)) = &self.events {
            events.borrow_mut().push(format!("drop {name}"));
        }
    }
}

/// Hands out fresh scripted models and logs their lifetimes.
pub struct MockProvider {
    pub stage1_tokens: Vec<u32>,
    pub stage2_tokens: Vec<u32>,
    pub events: Rc<RefCell<Vec<String>>>,
}

impl ModelProvider for MockProvider {
    fn stage1(&mut self) -> Result<Box<dyn CausalLm>> {
        self.events.borrow_mut().push("load stage1".into());
        Ok(Box::new(
            MockLm::scripted(self.stage1_tokens.clone()).tracked(self.events.clone(), "stage1"),
        ))
    }

    fn stage2(&mut self) -> Result<Box<dyn CausalLm>> {
        self.events.borrow_mut().push("load stage2".into());
        Ok(Box::new(
            MockLm::scripted(self.stage2_tokens.clone()).tracked(self.events.clone(), "stage2"),
        ))
    }
}

/// Byte-level tokenizer: every UTF-8 byte is one id below 256.
#[derive(Debug, Clone, Default)]
pub struct MockTokenizer {
    specials: HashMap<String, u32>,
}

impl MockTokenizer {
    pub fn with_special(mut self, token: &str, id: u32) -> Self {
        self.specials.insert(token.to_string(), id);
        self
    }
}

impl TextTokenizer for MockTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<u32>> {
        Ok(text.bytes().map(u32::from).collect())
    }

    fn token_id(&self, token: &str) -> Option<u32> {
        self.specials.get(token).copied()
    }
}

/// Codec with 50 frames per second at 16 kHz and flat output.
pub struct MockCodec {
    pub level: f32,
}

impl AudioCodec for MockCodec {
    fn sample_rate(&self) -> u32 {
        16_000
    }

    fn encode(&mut self, wave: &Waveform, _target_bandwidth: f32) -> Result<CodecArray> {
        let frames = wave.len() / 320;
        CodecArray::from_rows(vec![(0..frames as i64).map(|t| t % 1024).collect()])
    }

    fn decode(&mut self, codes: &CodecArray) -> Result<Waveform> {
        Ok(Waveform::new(vec![self.level; codes.frames() * 320], 16_000))
    }
}

/// Vocoder producing `samples_per_frame` samples of `level` per frame.
pub struct MockVocoder {
    pub level: f32,
    pub samples_per_frame: usize,
}

impl Vocoder for MockVocoder {
    fn sample_rate(&self) -> u32 {
        44_100
    }

    fn synthesize(&mut self, codes: &CodecArray) -> Result<Waveform> {
        Ok(Waveform::new(
            vec![self.level; codes.frames() * self.samples_per_frame],
            44_100,
        ))
    }
}

/// Assert `path` holds a readable WAV at `sample_rate`.
pub fn assert_wav(path: &Path, sample_rate: u32) {
    let wave = crate::audio::read_wav(path).unwrap();
    assert_eq!(wave.sample_rate, sample_rate, "{}", path.display());
}
