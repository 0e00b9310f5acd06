//src/sketch.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use xxhash_rust::xxh64::xxh64;

use crate::config::SketchParams;

/// Seed for k-mer hashing; changing it invalidates every stored database.
pub const HASH_SEED: u64 = 42;

#[inline]
fn encode_base_2bit(b: u8) -> u64 {
    match b {
        b'A' | b'a' => 0,
        b'C' | b'c' => 1,
        b'G' | b'g' => 2,
        b'T' | b't' => 3,
        _ => 4, // invalid marker
    }
}

/// Hash of a canonical 2-bit encoded k-mer.
#[inline]
pub fn hash_kmer(canonical: u64) -> u64 {
    xxh64(&canonical.to_le_bytes(), HASH_SEED)
}

/// A scaled ("FracMinHash") sketch: every canonical k-mer hash at or below
/// `u64::MAX / scaled` is kept. The result does not depend on the order in
/// which sequences are added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FracMinHash {
    params: SketchParams,
    max_hash: u64,
    track_abundance: bool,
    mins: BTreeMap<u64, u64>,
}

impl FracMinHash {
    pub fn new(params: SketchParams, track_abundance: bool) -> Self {
        let max_hash = u64::MAX / params.scaled.max(1);
        Self {
            params,
            max_hash,
            track_abundance,
            mins: BTreeMap::new(),
        }
    }

    /// A fresh, empty sketch with the same configuration.
    pub fn copy_and_clear(&self) -> Self {
        Self::new(self.params, self.track_abundance)
    }

    pub fn params(&self) -> SketchParams {
        self.params
    }

    pub fn ksize(&self) -> u8 {
        self.params.ksize
    }

    pub fn scaled(&self) -> u64 {
        self.params.scaled
    }

    pub fn max_hash(&self) -> u64 {
        self.max_hash
    }

    pub fn is_empty(&self) -> bool {
        self.mins.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mins.len()
    }

    #[inline]
    pub fn add_hash(&mut self, hash: u64) {
        if hash > self.max_hash {
            return;
        }
        let count = self.mins.entry(hash).or_insert(0);
        if self.track_abundance || *count == 0 {
            *count += 1;
        }
    }

    /// Hash every canonical k-mer of `seq`. Windows containing anything other
    /// than ACGT are skipped rather than rejected.
    pub fn add_sequence(&mut self, seq: &[u8]) {
        let k = self.params.ksize as usize;
        if k == 0 || seq.len() < k {
            return;
        }
        let mask: u64 = if k == 32 { u64::MAX } else { (1u64 << (2 * k)) - 1 };
        let rc_shift = 2 * (k - 1);

        let mut fwd = 0u64;
        let mut rev = 0u64;
        let mut valid = 0usize;
        for &b in seq {
            let code = encode_base_2bit(b);
            if code > 3 {
                // 'N' or other => restart the window
                valid = 0;
                fwd = 0;
                rev = 0;
                continue;
            }
            fwd = ((fwd << 2) | code) & mask;
            rev = (rev >> 2) | ((3 - code) << rc_shift);
            valid += 1;
            if valid >= k {
                let canonical = fwd.min(rev);
                self.add_hash(hash_kmer(canonical));
            }
        }
    }

    /// Union with another sketch of the same configuration.
    pub fn merge(&mut self, other: &FracMinHash) {
        for (&hash, &count) in &other.mins {
            if hash > self.max_hash {
                continue;
            }
            let entry = self.mins.entry(hash).or_insert(0);
            if self.track_abundance {
                *entry += count;
            } else {
                *entry = 1;
            }
        }
    }

    /// Retained hashes in ascending order.
    pub fn hashes(&self) -> impl Iterator<Item = u64> + '_ {
        self.mins.keys().copied()
    }

    pub fn min_hash(&self) -> Option<u64> {
        self.mins.keys().next().copied()
    }

    pub fn contains(&self, hash: u64) -> bool {
        self.mins.contains_key(&hash)
    }

    /// Occurrences of `hash`; `1` for any retained hash when abundance is not tracked.
    pub fn abundance(&self, hash: u64) -> u64 {
        self.mins.get(&hash).copied().unwrap_or(0)
    }

    pub fn into_abundances(self) -> BTreeMap<u64, u64> {
        self.mins
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(ksize: u8, scaled: u64) -> SketchParams {
        SketchParams::new(ksize, scaled).unwrap()
    }

    const SEQ: &[u8] = b"ATGCGTACGTTAGCCGATCGATCGGCTAGCTAGCTAGGCTTACGATCGATGCATGCA";

    #[test]
    fn test_deterministic() {
        let mut a = FracMinHash::new(params(11, 1), false);
        let mut b = a.copy_and_clear();
        a.add_sequence(SEQ);
        b.add_sequence(SEQ);
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_reverse_complement_is_same_sketch() {
        let rc: Vec<u8> = SEQ
            .iter()
            .rev()
            .map(|b| match b {
                b'A' => b'T',
                b'T' => b'A',
                b'C' => b'G',
                _ => b'C',
            })
            .collect();
        let mut a = FracMinHash::new(params(15, 1), false);
        let mut b = a.copy_and_clear();
        a.add_sequence(SEQ);
        b.add_sequence(&rc);
        assert_eq!(a.hashes().collect::<Vec<_>>(), b.hashes().collect::<Vec<_>>());
    }

    #[test]
    fn test_short_and_invalid_sequences_are_empty() {
        let mut mh = FracMinHash::new(params(21, 1), false);
        mh.add_sequence(b"ACGT");
        assert!(mh.is_empty());
        mh.add_sequence(b"NNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNNN");
        assert!(mh.is_empty());
        assert_eq!(mh.min_hash(), None);
    }

    #[test]
    fn test_n_breaks_windows() {
        let mut plain = FracMinHash::new(params(5, 1), false);
        plain.add_sequence(b"ACGTAC");
        let mut broken = plain.copy_and_clear();
        broken.add_sequence(b"ACGTNAC");
        assert_eq!(plain.len(), 2);
        assert!(broken.is_empty());
    }

    #[test]
    fn test_order_independent_merge() {
        let mut whole = FracMinHash::new(params(9, 1), false);
        whole.add_sequence(&SEQ[..30]);
        whole.add_sequence(&SEQ[30..]);

        let mut first = whole.copy_and_clear();
        first.add_sequence(&SEQ[30..]);
        let mut second = whole.copy_and_clear();
        second.add_sequence(&SEQ[..30]);
        first.merge(&second);
        assert_eq!(whole, first);
    }

    #[test]
    fn test_scaled_subsamples() {
        let mut all = FracMinHash::new(params(11, 1), false);
        let mut some = FracMinHash::new(params(11, 4), false);
        all.add_sequence(SEQ);
        some.add_sequence(SEQ);
        assert!(some.len() <= all.len());
        assert!(some.hashes().all(|h| h <= some.max_hash() && all.contains(h)));
    }

    #[test]
    fn test_abundance_tracking() {
        let mut mh = FracMinHash::new(params(4, 1), true);
        mh.add_sequence(b"AAAAAA");
        let h = mh.min_hash().unwrap();
        assert_eq!(mh.len(), 1);
        assert_eq!(mh.abundance(h), 3);

        let mut flat = FracMinHash::new(params(4, 1), false);
        flat.add_sequence(b"AAAAAA");
        assert_eq!(flat.abundance(h), 1);
    }
}
