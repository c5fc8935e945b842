//! Sample-rate conversion.

use rubato::{FftFixedIn, Resampler};

use super::Waveform;
use crate::{Error, Result};

const CHUNK: usize = 1024;
const SUB_CHUNKS: usize = 2;

/// Resample a mono waveform to `target_rate`.
///
/// The output is trimmed of the resampler delay and has exactly
/// `round(len * target_rate / source_rate)` samples.
pub fn resample(wave: &Waveform, target_rate: u32) -> Result<Waveform> {
    if wave.sample_rate == target_rate || wave.is_empty() {
        return Ok(Waveform::new(wave.samples.clone(), target_rate));
    }

    let mut resampler = FftFixedIn::<f32>::new(
        wave.sample_rate as usize,
        target_rate as usize,
        CHUNK,
        SUB_CHUNKS,
        1,
    )
    .map_err(|e| Error::Audio(format!("resampler setup: {e}")))?;

    let expected = (wave.len() as f64 * f64::from(target_rate) / f64::from(wave.sample_rate))
        .round() as usize;
    let delay = resampler.output_delay();
    let mut out = Vec::with_capacity(expected + delay + CHUNK);

    let mut pos = 0;
    // Keep feeding zero-padded chunks past the input until the delayed tail
    // has been flushed.
    while out.len() < expected + delay {
        let end = (pos + CHUNK).min(wave.len());
        let mut block = vec![0.0f32; CHUNK];
        if pos < end {
            block[..end - pos].copy_from_slice(&wave.samples[pos..end]);
        }
        let frames = resampler
            .process(&[block], None)
            .map_err(|e| Error::Audio(format!("resampling: {e}")))?;
        out.extend_from_slice(&frames[0]);
        pos += CHUNK;
    }

    Ok(Waveform::new(
        out[delay..delay + expected].to_vec(),
        target_rate,
    ))
}
