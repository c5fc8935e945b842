//! Mapping between flat vocabulary token streams and codec arrays.
//!
//! Multi-codebook audio is fed to the language models position-major:
//!
//! ```text
//! frame 0: cb0 cb1 … cbN-1 | frame 1: cb0 cb1 … cbN-1 | …
//! ```
//!
//! with codebook `k` shifted into its own vocabulary range by
//! `global_offset + k * codebook_size`.

use std::ops::Range;

use super::CodecArray;
use crate::config::CodecLayout;
use crate::{Error, Result};

/// Interleave per-codebook streams position-major.
///
/// Streams must be equally long; element `k` of stream `b` lands at
/// `k * streams.len() + b`.
pub fn interleave<T: Copy>(streams: &[Vec<T>]) -> Vec<T> {
    let n = streams.len();
    let frames = streams.first().map_or(0, Vec::len);
    let mut out = Vec::with_capacity(n * frames);
    for t in 0..frames {
        for stream in streams {
            out.push(stream[t]);
        }
    }
    out
}

/// Split a flat sequence into `num_codebooks` streams.
///
/// Element `k` of codebook `b` is read from flat position
/// `k * num_codebooks + b`. The length must be an exact multiple.
pub fn deinterleave<T: Copy>(flat: &[T], num_codebooks: usize) -> Result<Vec<Vec<T>>> {
    if num_codebooks == 0 || flat.len() % num_codebooks != 0 {
        return Err(Error::ShapeMismatch {
            len: flat.len(),
            num_codebooks,
        });
    }
    let frames = flat.len() / num_codebooks;
    let mut streams = vec![Vec::with_capacity(frames); num_codebooks];
    for frame in flat.chunks_exact(num_codebooks) {
        for (stream, &value) in streams.iter_mut().zip(frame) {
            stream.push(value);
        }
    }
    Ok(streams)
}

/// Flatten a codec array frame by frame.
pub fn flatten(codes: &CodecArray) -> Vec<i64> {
    let rows: Vec<Vec<i64>> = codes.rows().map(<[i64]>::to_vec).collect();
    interleave(&rows)
}

/// Inverse of [`flatten`].
pub fn unflatten(flat: &[i64], num_codebooks: usize) -> Result<CodecArray> {
    CodecArray::from_rows(deinterleave(flat, num_codebooks)?)
}

/// Converts between codec arrays and vocabulary token ids for a contiguous
/// run of codebooks `quantizer_begin..quantizer_begin + n_quantizer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecMapper {
    layout: CodecLayout,
    quantizer_begin: usize,
    n_quantizer: usize,
}

impl CodecMapper {
    pub fn new(layout: CodecLayout, quantizer_begin: usize, n_quantizer: usize) -> Self {
        Self {
            layout,
            quantizer_begin,
            n_quantizer,
        }
    }

    /// Single-codebook mapper used by stage 1.
    pub fn stage1(layout: CodecLayout) -> Self {
        Self::new(layout, 0, 1)
    }

    /// Mapper over the first `codebooks` codebooks, used by stage 2.
    pub fn stage2(layout: CodecLayout, codebooks: usize) -> Self {
        Self::new(layout, 0, codebooks)
    }

    /// Vocabulary range of the first mapped codebook.
    pub fn first_codebook_range(&self) -> Range<u32> {
        self.layout.codebook_range(self.quantizer_begin)
    }

    /// Shift codes into vocabulary space and flatten them position-major.
    ///
    /// Rows `quantizer_begin..quantizer_begin + n_quantizer` of `codes` are
    /// used; every code must lie in `[0, codebook_size)`.
    pub fn codes_to_ids(&self, codes: &CodecArray) -> Result<Vec<u32>> {
        let end = self.quantizer_begin + self.n_quantizer;
        let selected = codes.select_codebooks(self.quantizer_begin..end)?;
        let codebook_size = self.layout.codebook_size;
        let rows = selected
            .rows()
            .enumerate()
            .map(|(i, row)| {
                let base = self.layout.codebook_range(self.quantizer_begin + i).start;
                row.iter()
                    .map(|&code| {
                        if code < 0 || code >= i64::from(codebook_size) {
                            return Err(Error::CodeOutOfRange {
                                value: code,
                                codebook_size: codebook_size as usize,
                            });
                        }
                        Ok(base + code as u32)
                    })
                    .collect::<Result<Vec<u32>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(interleave(&rows))
    }

    /// Recover codes from a flat token stream.
    ///
    /// The stream must start inside the first mapped codebook's range. A
    /// trailing partial frame is dropped. Offsets are removed without range
    /// checks, so tokens from the wrong codebook surface as out-of-range codes
    /// for [`super::CodeRepair`] to handle.
    pub fn ids_to_codes(&self, ids: &[u32]) -> Result<CodecArray> {
        if ids.is_empty() {
            return Ok(CodecArray::empty(self.n_quantizer));
        }
        let range = self.first_codebook_range();
        if !range.contains(&ids[0]) {
            return Err(Error::CodebookMismatch { token: ids[0], range });
        }
        let usable = ids.len() - ids.len() % self.n_quantizer;
        let flat: Vec<i64> = ids[..usable].iter().map(|&id| i64::from(id)).collect();
        let mut codes = unflatten(&flat, self.n_quantizer)?;
        for i in 0..self.n_quantizer {
            let base = i64::from(self.layout.codebook_range(self.quantizer_begin + i).start);
            for value in codes.row_mut(i) {
                *value -= base;
            }
        }
        Ok(codes)
    }
}
