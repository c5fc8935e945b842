//! Invalid-code recovery.
//!
//! Stage 2 can emit a token from the wrong codebook, which decodes to an
//! index outside `[0, codebook_size)`. The codec cannot decode such indices,
//! so they are replaced before saving. Replacement is lossy and may audibly
//! harm the result; it keeps the track decodable, nothing more.

use std::collections::HashMap;

use super::CodecArray;

/// A strategy for replacing out-of-range codes in place.
pub trait CodeRepair {
    /// Repair `codes`, returning how many invalid codes were found.
    fn repair(&self, codes: &mut CodecArray) -> usize;
}

/// Replaces every invalid code with the most frequent value in its own
/// codebook row. Ties go to the value encountered first. When that value is
/// itself invalid the most frequent valid value is used, and `0` for a row
/// with no valid code at all.
#[derive(Debug, Clone, Copy)]
pub struct MajorityVoteRepair {
    codebook_size: u32,
}

impl MajorityVoteRepair {
    pub fn new(codebook_size: u32) -> Self {
        Self { codebook_size }
    }

    fn is_valid(&self, code: i64) -> bool {
        (0..i64::from(self.codebook_size)).contains(&code)
    }
}

impl CodeRepair for MajorityVoteRepair {
    fn repair(&self, codes: &mut CodecArray) -> usize {
        let mut invalid = 0;
        for k in 0..codes.codebooks() {
            let row = codes.row_mut(k);
            let bad = row.iter().filter(|&&c| !self.is_valid(c)).count();
            if bad == 0 {
                continue;
            }
            invalid += bad;
            let replacement = most_frequent(row.iter().copied())
                .filter(|&value| self.is_valid(value))
                .or_else(|| most_frequent(row.iter().copied().filter(|&c| self.is_valid(c))))
                .unwrap_or(0);
            for code in row.iter_mut() {
                if !self.is_valid(*code) {
                    *code = replacement;
                }
            }
        }
        invalid
    }
}

/// Most frequent value; the earliest first occurrence wins a tie.
fn most_frequent(values: impl Iterator<Item = i64>) -> Option<i64> {
    let mut counts: HashMap<i64, (usize, usize)> = HashMap::new();
    for (position, value) in values.enumerate() {
        counts.entry(value).or_insert((0, position)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(value, _)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replaces_with_row_majority() {
        let mut codes =
            CodecArray::from_rows(vec![vec![7, 7, 3, -1, 2000], vec![1, 2, 3, 4, 5]]).unwrap();
        let found = MajorityVoteRepair::new(1024).repair(&mut codes);
        assert_eq!(found, 2);
        assert_eq!(codes.row(0), &[7, 7, 3, 7, 7]);
        assert_eq!(codes.row(1), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_tie_goes_to_first_encountered() {
        let mut codes = CodecArray::from_rows(vec![vec![4, 9, 9, 4, 1024]]).unwrap();
        MajorityVoteRepair::new(1024).repair(&mut codes);
        assert_eq!(codes.row(0), &[4, 9, 9, 4, 4]);
    }

    #[test]
    fn test_repair_is_idempotent() {
        let mut codes =
            CodecArray::from_rows(vec![vec![5, -3, 5, 1024, 8], vec![2048, 2048, 1, 1, 1]])
                .unwrap();
        let repair = MajorityVoteRepair::new(1024);
        repair.repair(&mut codes);
        let once = codes.clone();
        repair.repair(&mut codes);
        assert_eq!(codes, once);
    }

    #[test]
    fn test_invalid_majority_falls_back_to_valid_value() {
        let mut codes = CodecArray::from_rows(vec![vec![-7, -7, -7, 12, 30, 12]]).unwrap();
        let found = MajorityVoteRepair::new(1024).repair(&mut codes);
        assert_eq!(found, 3);
        assert_eq!(codes.row(0), &[12, 12, 12, 12, 30, 12]);
    }

    #[test]
    fn test_row_without_valid_codes_becomes_zero() {
        let mut codes = CodecArray::from_rows(vec![vec![-13318, 1024, 1024]]).unwrap();
        assert_eq!(MajorityVoteRepair::new(1024).repair(&mut codes), 3);
        assert_eq!(codes.row(0), &[0, 0, 0]);
    }

    #[test]
    fn test_valid_array_untouched() {
        let mut codes = CodecArray::from_rows(vec![vec![0, 1023, 512]]).unwrap();
        let before = codes.clone();
        assert_eq!(MajorityVoteRepair::new(1024).repair(&mut codes), 0);
        assert_eq!(codes, before);
    }
}
