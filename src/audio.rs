//! Audio utilities.
//!
//! Mono waveforms flow between the codec, the vocoders and the final blend:
//! 16 kHz out of the codec decoder, 44.1 kHz out of the vocoders.

mod blend;
mod resample;
mod wav;

pub use blend::{DEFAULT_CUTOFF_HZ, mix_tracks, replace_low_freq_energy_matched};
pub use resample::resample;
pub use wav::{PEAK_LIMIT, read_wav, save_audio, write_wav};

/// A mono waveform.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Down-mix interleaved multi-channel samples by averaging channels.
    pub fn from_interleaved(samples: &[f32], channels: u16, sample_rate: u32) -> Self {
        let channels = usize::from(channels.max(1));
        let samples = if channels == 1 {
            samples.to_vec()
        } else {
            samples
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect()
        };
        Self::new(samples, sample_rate)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }

    pub fn peak(&self) -> f32 {
        self.samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
    }
}
