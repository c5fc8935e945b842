//! Track reconstruction and mixing.
//!
//! Turns the refined stage-2 artifacts into audio:
//!
//! ```text
//! {output}/recons/{stem}.wav             codec decode, 16 kHz
//! {output}/recons/mix/{mixed}.wav        vocal + instrumental, 16 kHz
//! {output}/vocoder/stems/{track}.wav     vocoder, 44.1 kHz
//! {output}/vocoder/mix/{mixed}.wav       vocal + instrumental, 44.1 kHz
//! {output}/{mixed}.wav                   low band of the codec mix under the vocoder mix
//! ```
//!
//! `{mixed}` is the instrumental artifact's stem with its track segment
//! replaced by `mixed`. A failed mix is logged and ends reconstruction
//! early; everything written up to that point stays usable.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::Result;
use crate::audio::{
    DEFAULT_CUTOFF_HZ, Waveform, mix_tracks, read_wav, replace_low_freq_energy_matched,
    save_audio, write_wav,
};
use crate::codec::CodecArray;
use crate::model::codec::{AudioCodec, Vocoder};
use crate::stage1::{Track, retrack_artifact_stem};

const MIXED: &str = "mixed";

/// Files written by [`Reconstructor::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconstruction {
    /// One codec-decoded waveform per artifact.
    pub tracks: Vec<PathBuf>,
    pub recons_mix: Option<PathBuf>,
    pub vocoder_stems: Vec<PathBuf>,
    pub vocoder_mix: Option<PathBuf>,
    /// The final blended song.
    pub output: Option<PathBuf>,
}

/// Drives the codec decoder and both vocoders over stage-2 artifacts.
pub struct Reconstructor<'a> {
    codec: &'a mut dyn AudioCodec,
    vocal: &'a mut dyn Vocoder,
    instrumental: &'a mut dyn Vocoder,
    rescale: bool,
    cutoff_hz: f32,
}

impl<'a> Reconstructor<'a> {
    pub fn new(
        codec: &'a mut dyn AudioCodec,
        vocal: &'a mut dyn Vocoder,
        instrumental: &'a mut dyn Vocoder,
        rescale: bool,
    ) -> Self {
        Self {
            codec,
            vocal,
            instrumental,
            rescale,
            cutoff_hz: DEFAULT_CUTOFF_HZ,
        }
    }

    pub fn run(&mut self, artifacts: &[PathBuf], output_dir: &Path) -> Result<Reconstruction> {
        let recons_dir = output_dir.join("recons");
        let mut result = Reconstruction::default();

        for artifact in artifacts {
            let codes = CodecArray::read_npy(artifact)?;
            let wave = self.codec.decode(&codes)?;
            let path = recons_dir.join(format!("{}.wav", file_stem(artifact)));
            save_audio(&path, &wave, false)?;
            result.tracks.push(path);
        }

        for artifact in artifacts {
            let stem = file_stem(artifact);
            if Track::from_artifact_stem(&stem) != Some(Track::Instrumental) {
                continue;
            }
            let (Some(vocal_stem), Some(mixed_stem)) = (
                retrack_artifact_stem(&stem, Track::Vocal.as_str()),
                retrack_artifact_stem(&stem, MIXED),
            ) else {
                continue;
            };
            let vocal_path = recons_dir.join(format!("{vocal_stem}.wav"));
            if !vocal_path.exists() {
                continue;
            }
            let instrumental = read_wav(recons_dir.join(format!("{stem}.wav")))?;
            let vocal = read_wav(&vocal_path)?;
            let Some(mix) = mix_or_log(&vocal, &instrumental, "codec")? else {
                continue;
            };
            let path = recons_dir.join("mix").join(format!("{mixed_stem}.wav"));
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            write_wav(&path, &mix)?;
            result.recons_mix = Some(path);
        }

        let stems_dir = output_dir.join("vocoder").join("stems");
        let mut vocal_stem = None;
        let mut instrumental_stem = None;
        let mut mixed_name = None;
        for artifact in artifacts {
            let stem = file_stem(artifact);
            let Some(track) = Track::from_artifact_stem(&stem) else {
                tracing::warn!(path = ?artifact, "artifact name carries no track, skipping");
                continue;
            };
            let codes = CodecArray::read_npy(artifact)?;
            let path = stems_dir.join(format!("{}.wav", track.as_str()));
            match track {
                Track::Instrumental => {
                    instrumental_stem =
                        Some(self.instrumental.process(&codes, &path, self.rescale)?);
                    mixed_name = retrack_artifact_stem(&stem, MIXED).map(|s| format!("{s}.wav"));
                }
                Track::Vocal => {
                    vocal_stem = Some(self.vocal.process(&codes, &path, self.rescale)?);
                }
            }
            result.vocoder_stems.push(path);
        }

        let (Some(vocal), Some(instrumental), Some(mixed_name)) =
            (vocal_stem, instrumental_stem, mixed_name)
        else {
            tracing::warn!("need both a vocal and an instrumental track to mix");
            return Ok(result);
        };
        let Some(mix) = mix_or_log(&vocal, &instrumental, "vocoder")? else {
            return Ok(result);
        };
        let vocoder_mix = output_dir.join("vocoder").join("mix").join(&mixed_name);
        let mix = save_audio(&vocoder_mix, &mix, self.rescale)?;
        tracing::info!(path = ?vocoder_mix, "created vocoder mix");
        result.vocoder_mix = Some(vocoder_mix);

        let Some(recons_mix) = &result.recons_mix else {
            return Ok(result);
        };
        let low = read_wav(recons_mix)?;
        let blended = replace_low_freq_energy_matched(&low, &mix, self.cutoff_hz)?;
        let output = output_dir.join(&mixed_name);
        save_audio(&output, &blended, self.rescale)?;
        tracing::info!(path = ?output, seconds = blended.duration_secs(), "song written");
        result.output = Some(output);
        Ok(result)
    }
}

/// Mix two tracks, logging and returning `None` when their shapes differ.
pub fn mix_or_log(
    vocal: &Waveform,
    instrumental: &Waveform,
    stage: &str,
) -> Result<Option<Waveform>> {
    match mix_tracks(vocal, instrumental) {
        Ok(mix) => Ok(Some(mix)),
        Err(error) => {
            tracing::error!(
                stage,
                %error,
                vocal = vocal.len(),
                instrumental = instrumental.len(),
                "mix failed"
            );
            Ok(None)
        }
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
