//! Codebook-major codec index arrays.

use std::ops::Range;
use std::path::Path;

use candle_core::{DType, Device, Tensor};

use crate::{Error, Result};

/// A `(codebooks × frames)` array of codec indices.
///
/// Stored codebook-major: element `(k, t)` is at `k * frames + t`. This is
/// the artifact exchanged between stage 1, stage 2 and the codec decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecArray {
    codebooks: usize,
    frames: usize,
    data: Vec<i64>,
}

impl CodecArray {
    pub fn new(codebooks: usize, frames: usize, data: Vec<i64>) -> Result<Self> {
        if data.len() != codebooks * frames {
            return Err(Error::ShapeMismatch {
                len: data.len(),
                num_codebooks: codebooks,
            });
        }
        Ok(Self {
            codebooks,
            frames,
            data,
        })
    }

    /// An array with `codebooks` rows and no frames.
    pub fn empty(codebooks: usize) -> Self {
        Self {
            codebooks,
            frames: 0,
            data: Vec::new(),
        }
    }

    /// Build from one sequence per codebook; all rows must be equally long.
    pub fn from_rows(rows: Vec<Vec<i64>>) -> Result<Self> {
        let codebooks = rows.len();
        let frames = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().find(|row| row.len() != frames) {
            return Err(Error::Audio(format!(
                "ragged codec rows: expected {frames} frames, found {}",
                bad.len()
            )));
        }
        Ok(Self {
            codebooks,
            frames,
            data: rows.into_iter().flatten().collect(),
        })
    }

    pub fn codebooks(&self) -> usize {
        self.codebooks
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    pub fn row(&self, k: usize) -> &[i64] {
        &self.data[k * self.frames..(k + 1) * self.frames]
    }

    pub fn row_mut(&mut self, k: usize) -> &mut [i64] {
        &mut self.data[k * self.frames..(k + 1) * self.frames]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[i64]> {
        (0..self.codebooks).map(|k| self.row(k))
    }

    pub fn get(&self, k: usize, t: usize) -> i64 {
        self.data[k * self.frames + t]
    }

    /// Keep only codebooks in `range`.
    pub fn select_codebooks(&self, range: Range<usize>) -> Result<Self> {
        if range.end > self.codebooks {
            return Err(Error::Audio(format!(
                "codebooks {}..{} requested from a {}-codebook array",
                range.start, range.end, self.codebooks
            )));
        }
        let rows = range.map(|k| self.row(k).to_vec()).collect();
        Self::from_rows(rows)
    }

    /// Frames in `range`, clamped to the array length.
    pub fn slice_frames(&self, range: Range<usize>) -> Self {
        let start = range.start.min(self.frames);
        let end = range.end.clamp(start, self.frames);
        let data = self
            .rows()
            .flat_map(|row| row[start..end].iter().copied())
            .collect();
        Self {
            codebooks: self.codebooks,
            frames: end - start,
            data,
        }
    }

    /// Concatenate arrays along the time axis.
    pub fn concat_frames(parts: &[CodecArray]) -> Result<Self> {
        let Some(first) = parts.first() else {
            return Err(Error::Audio("nothing to concatenate".into()));
        };
        let codebooks = first.codebooks;
        if let Some(bad) = parts.iter().find(|p| p.codebooks != codebooks) {
            return Err(Error::Audio(format!(
                "cannot concatenate {}-codebook array onto {codebooks} codebooks",
                bad.codebooks
            )));
        }
        let rows = (0..codebooks)
            .map(|k| parts.iter().flat_map(|p| p.row(k).iter().copied()).collect())
            .collect();
        Self::from_rows(rows)
    }

    /// Convert to an `I64` tensor of shape `[codebooks, frames]`.
    pub fn to_tensor(&self, device: &Device) -> Result<Tensor> {
        Ok(Tensor::from_vec(
            self.data.clone(),
            (self.codebooks, self.frames),
            device,
        )?)
    }

    /// Build from a 1-D (single codebook) or 2-D `[codebooks, frames]` tensor.
    pub fn from_tensor(tensor: &Tensor) -> Result<Self> {
        let tensor = tensor.to_dtype(DType::I64)?;
        match tensor.rank() {
            1 => {
                let row = tensor.to_vec1::<i64>()?;
                Self::from_rows(vec![row])
            }
            2 => Self::from_rows(tensor.to_vec2::<i64>()?),
            rank => Err(Error::Audio(format!(
                "codec arrays are 1-D or 2-D, got rank {rank}"
            ))),
        }
    }

    /// Persist as `.npy`, written beside the target and renamed into place
    /// so a partially written file never appears under the final name.
    pub fn write_npy(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".partial");
        let tmp = path.with_file_name(tmp_name);
        self.to_tensor(&Device::Cpu)?.write_npy(&tmp)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn read_npy(path: impl AsRef<Path>) -> Result<Self> {
        let tensor = Tensor::read_npy(path.as_ref())?;
        Self::from_tensor(&tensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CodecArray {
        CodecArray::from_rows(vec![vec![1, 2, 3], vec![4, 5, 6]]).unwrap()
    }

    #[test]
    fn test_shape_and_access() {
        let a = sample();
        assert_eq!(a.codebooks(), 2);
        assert_eq!(a.frames(), 3);
        assert_eq!(a.row(1), &[4, 5, 6]);
        assert_eq!(a.get(0, 2), 3);
    }

    #[test]
    fn test_new_rejects_wrong_length() {
        assert!(matches!(
            CodecArray::new(2, 3, vec![0; 5]),
            Err(Error::ShapeMismatch { len: 5, .. })
        ));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        assert!(CodecArray::from_rows(vec![vec![1, 2], vec![3]]).is_err());
    }

    #[test]
    fn test_slice_and_concat() {
        let a = sample();
        let head = a.slice_frames(0..1);
        let tail = a.slice_frames(1..10);
        assert_eq!(tail.frames(), 2);
        assert_eq!(CodecArray::concat_frames(&[head, tail]).unwrap(), a);
    }

    #[test]
    fn test_concat_rejects_mismatched_codebooks() {
        let one = CodecArray::from_rows(vec![vec![1]]).unwrap();
        assert!(CodecArray::concat_frames(&[sample(), one]).is_err());
    }

    #[test]
    fn test_select_codebooks() {
        let a = sample();
        assert_eq!(a.select_codebooks(1..2).unwrap().row(0), &[4, 5, 6]);
        assert!(a.select_codebooks(0..3).is_err());
    }

    #[test]
    fn test_npy_roundtrip_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codes.npy");
        let a = sample();
        a.write_npy(&path).unwrap();
        assert_eq!(CodecArray::read_npy(&path).unwrap(), a);
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("codes.npy")]);
    }
}
