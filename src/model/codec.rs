//! Neural codec and vocoder contracts.
//!
//! Neither network ships with this crate. Callers plug in their own
//! implementations; the pipeline only needs waveforms in and out.

use std::path::Path;

use crate::Result;
use crate::audio::{Waveform, save_audio};
use crate::codec::CodecArray;

/// Target bandwidth (kbps) at which the codec yields a single codebook.
pub const PROMPT_BANDWIDTH_KBPS: f32 = 0.5;

/// Residual-quantized audio codec (xcodec).
pub trait AudioCodec {
    /// Rate of the waveforms accepted by `encode` and produced by `decode`.
    fn sample_rate(&self) -> u32;

    /// Encode a mono waveform at `target_bandwidth` kbps.
    fn encode(&mut self, wave: &Waveform, target_bandwidth: f32) -> Result<CodecArray>;

    /// Decode codec indices back to a waveform.
    fn decode(&mut self, codes: &CodecArray) -> Result<Waveform>;
}

/// Codes-to-waveform upsampler producing the high-fidelity stems.
pub trait Vocoder {
    fn sample_rate(&self) -> u32;

    /// Synthesize a waveform from codec indices.
    fn synthesize(&mut self, codes: &CodecArray) -> Result<Waveform>;

    /// Synthesize, save to `output` and return the saved waveform.
    fn process(&mut self, codes: &CodecArray, output: &Path, rescale: bool) -> Result<Waveform> {
        let wave = self.synthesize(codes)?;
        save_audio(output, &wave, rescale)
    }
}
