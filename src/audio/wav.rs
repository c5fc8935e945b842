//! WAV file I/O.

use std::path::Path;

use super::Waveform;
use crate::Result;

/// Largest absolute sample value written by [`save_audio`].
pub const PEAK_LIMIT: f32 = 0.99;

/// Read a WAV file, down-mixing to mono.
///
/// Integer samples are scaled to [-1, 1].
pub fn read_wav(path: impl AsRef<Path>) -> Result<Waveform> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max_val = (1u32 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    Ok(Waveform::from_interleaved(
        &samples,
        spec.channels,
        spec.sample_rate,
    ))
}

/// Write a mono waveform as 16-bit PCM. Samples are clipped to [-1, 1].
pub fn write_wav(path: impl AsRef<Path>, wave: &Waveform) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: wave.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &s in &wave.samples {
        writer.write_sample((s.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Limit the peak to [`PEAK_LIMIT`] and save as 16-bit PCM, creating the
/// parent directory as needed.
///
/// With `rescale` the whole waveform is scaled down by `PEAK_LIMIT / peak`
/// when it exceeds the limit; otherwise samples are clamped.
pub fn save_audio(path: impl AsRef<Path>, wave: &Waveform, rescale: bool) -> Result<Waveform> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let limited = limit_peak(wave, rescale);
    write_wav(path, &limited)?;
    tracing::debug!(path = ?path, seconds = limited.duration_secs(), "saved audio");
    Ok(limited)
}

fn limit_peak(wave: &Waveform, rescale: bool) -> Waveform {
    let samples = if rescale {
        let peak = wave.peak();
        let scale = if peak > 0.0 {
            (PEAK_LIMIT / peak).min(1.0)
        } else {
            1.0
        };
        wave.samples.iter().map(|s| s * scale).collect()
    } else {
        wave.samples
            .iter()
            .map(|s| s.clamp(-PEAK_LIMIT, PEAK_LIMIT))
            .collect()
    };
    Waveform::new(samples, wave.sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rescale_scales_loud_audio() {
        let wave = Waveform::new(vec![1.98, -0.5], 16_000);
        let limited = limit_peak(&wave, true);
        assert!((limited.samples[0] - 0.99).abs() < 1e-6);
        assert!((limited.samples[1] + 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_rescale_leaves_quiet_audio() {
        let wave = Waveform::new(vec![0.5, -0.25], 16_000);
        assert_eq!(limit_peak(&wave, true), wave);
    }

    #[test]
    fn test_clamp_without_rescale() {
        let wave = Waveform::new(vec![1.5, -2.0, 0.3], 16_000);
        assert_eq!(limit_peak(&wave, false).samples, vec![0.99, -0.99, 0.3]);
    }

    #[test]
    fn test_save_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.wav");
        let original = Waveform::new(vec![0.0, 0.5, -0.5, 1.2], 44_100);
        save_audio(&path, &original, false).unwrap();
        let loaded = read_wav(&path).unwrap();
        assert_eq!(loaded.sample_rate, 44_100);
        assert_eq!(loaded.len(), 4);
        let expected = [0.0, 0.5, -0.5, 0.99];
        for (a, b) in loaded.samples.iter().zip(expected) {
            assert!((a - b).abs() < 1e-3);
        }
    }
}
