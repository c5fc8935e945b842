//! Track mixing and spectral blending.

use rustfft::FftPlanner;
use rustfft::num_complex::Complex;

use super::{Waveform, resample};
use crate::{Error, Result};

/// Crossover frequency between the codec and vocoder renditions.
pub const DEFAULT_CUTOFF_HZ: f32 = 5500.0;

/// Sum two equally long tracks sample by sample.
pub fn mix_tracks(a: &Waveform, b: &Waveform) -> Result<Waveform> {
    if a.sample_rate != b.sample_rate {
        return Err(Error::Audio(format!(
            "cannot mix {} Hz with {} Hz",
            a.sample_rate, b.sample_rate
        )));
    }
    if a.len() != b.len() {
        return Err(Error::Audio(format!(
            "cannot mix tracks of {} and {} samples",
            a.len(),
            b.len()
        )));
    }
    let samples = a.samples.iter().zip(&b.samples).map(|(x, y)| x + y).collect();
    Ok(Waveform::new(samples, a.sample_rate))
}

/// Replace the band below `cutoff_hz` of `high` with that of `low`, scaled
/// so the band keeps `high`'s energy.
///
/// `low` is resampled to `high`'s rate and padded or truncated to its
/// length. The result has `high`'s rate and length. A silent low band
/// leaves `high` unchanged.
pub fn replace_low_freq_energy_matched(
    low: &Waveform,
    high: &Waveform,
    cutoff_hz: f32,
) -> Result<Waveform> {
    let n = high.len();
    if n == 0 {
        return Ok(high.clone());
    }
    let mut low = resample(low, high.sample_rate)?.samples;
    low.resize(n, 0.0);

    let mut planner = FftPlanner::<f32>::new();
    let forward = planner.plan_fft_forward(n);
    let inverse = planner.plan_fft_inverse(n);

    let mut low_spec: Vec<Complex<f32>> = low.iter().map(|&s| Complex::new(s, 0.0)).collect();
    let mut spec: Vec<Complex<f32>> = high
        .samples
        .iter()
        .map(|&s| Complex::new(s, 0.0))
        .collect();
    forward.process(&mut low_spec);
    forward.process(&mut spec);

    let bin_hz = high.sample_rate as f32 / n as f32;
    let cutoff_bins = ((0..=n / 2).take_while(|&k| (k as f32) * bin_hz < cutoff_hz)).count();

    let band_energy = |bins: &[Complex<f32>]| -> f64 {
        bins[..cutoff_bins]
            .iter()
            .map(|c| f64::from(c.norm_sqr()))
            .sum()
    };
    let low_energy = band_energy(&low_spec);
    let high_energy = band_energy(&spec);
    if low_energy <= 0.0 {
        tracing::warn!("low-fidelity band is silent, keeping the high-fidelity track");
        return Ok(high.clone());
    }
    let scale = (high_energy / low_energy).sqrt() as f32;
    tracing::debug!(cutoff_bins, scale, "energy-matched low band");

    for k in 0..cutoff_bins {
        spec[k] = low_spec[k] * scale;
        let mirror = n - k;
        if k > 0 && mirror > k {
            spec[mirror] = low_spec[mirror] * scale;
        }
    }

    inverse.process(&mut spec);
    let norm = 1.0 / n as f32;
    let samples = spec.iter().map(|c| c.re * norm).collect();
    Ok(Waveform::new(samples, high.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f32, amplitude: f32, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin() * amplitude
            })
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_mix_sums() {
        let a = Waveform::new(vec![0.1, 0.2], 16_000);
        let b = Waveform::new(vec![0.3, -0.2], 16_000);
        let mixed = mix_tracks(&a, &b).unwrap();
        assert!((mixed.samples[0] - 0.4).abs() < 1e-6);
        assert!(mixed.samples[1].abs() < 1e-6);
    }

    #[test]
    fn test_mix_rejects_length_mismatch() {
        let a = Waveform::new(vec![0.0; 3], 16_000);
        let b = Waveform::new(vec![0.0; 4], 16_000);
        assert!(matches!(mix_tracks(&a, &b), Err(Error::Audio(_))));
    }

    #[test]
    fn test_high_band_preserved_low_band_energy_matched() {
        let rate = 44_100;
        let len = 44_100;
        // High-fidelity: 200 Hz at 0.5 plus 10 kHz at 0.2.
        let high: Vec<f32> = tone(200.0, 0.5, rate, len)
            .iter()
            .zip(tone(10_000.0, 0.2, rate, len))
            .map(|(a, b)| a + b)
            .collect();
        // Low-fidelity rendition of the same low band, quieter.
        let low = tone(200.0, 0.25, 16_000, 16_000);

        let out = replace_low_freq_energy_matched(
            &Waveform::new(low, 16_000),
            &Waveform::new(high.clone(), rate),
            DEFAULT_CUTOFF_HZ,
        )
        .unwrap();
        assert_eq!(out.sample_rate, rate);
        assert_eq!(out.len(), len);
        let middle = 4_000..40_000;
        let diff = rms(&out.samples[middle.clone()]) - rms(&high[middle]);
        assert!(diff.abs() < 0.02, "rms drift {diff}");
    }

    #[test]
    fn test_silent_low_leaves_high_untouched() {
        let rate = 44_100;
        let high = Waveform::new(tone(1_000.0, 0.3, rate, 4_410), rate);
        let low = Waveform::new(vec![0.0; 1_600], 16_000);
        let out = replace_low_freq_energy_matched(&low, &high, DEFAULT_CUTOFF_HZ).unwrap();
        for (a, b) in out.samples.iter().zip(&high.samples) {
            assert!((a - b).abs() < 1e-4);
        }
    }
}
