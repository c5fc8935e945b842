//! Codec token manipulation.
//!
//! Bridges the language models' vocabulary space and the per-codebook
//! indices of the xcodec neural codec.
//!
//! - [`array`] — the `(codebooks × frames)` [`CodecArray`] and its `.npy` form
//! - [`mapper`] — vocabulary offsets, interleaving and de-interleaving
//! - [`repair`] — recovery of out-of-range codes after stage 2

mod array;
mod mapper;
mod repair;

pub use array::CodecArray;
pub use mapper::{CodecMapper, deinterleave, flatten, interleave, unflatten};
pub use repair::{CodeRepair, MajorityVoteRepair};
