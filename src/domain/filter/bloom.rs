//! Bloom filter
//!
//! Standard bit-array construction with `k` probe positions derived from one
//! SHA-256 digest by double hashing (`h1 + i * h2`). No false negatives.

use std::f64::consts::LN_2;

use sha2::{Digest, Sha256};

const MIN_BITS: u64 = 64;
const MAX_HASHES: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomFilter {
    bits: Vec<u64>,
    num_bits: u64,
    num_hashes: u32,
    inserted: usize,
}

impl BloomFilter {
    /// Creates a filter with an explicit bit count and probe count
    pub fn new(num_bits: u64, num_hashes: u32) -> Self {
        let words = num_bits.max(MIN_BITS).div_ceil(64);

        Self {
            bits: vec![0; words as usize],
            num_bits: words * 64,
            num_hashes: num_hashes.clamp(1, MAX_HASHES),
            inserted: 0,
        }
    }

    /// Sizes a filter for `expected_items` entries at the given false-positive rate
    pub fn with_rate(expected_items: usize, false_positive_rate: f64) -> Self {
        let n = expected_items.max(1) as f64;
        let p = false_positive_rate.clamp(1e-9, 0.5);

        let m = (-(n * p.ln()) / (LN_2 * LN_2)).ceil();
        let k = ((m / n) * LN_2).round();

        Self::new(m as u64, k as u32)
    }

    /// Builds a filter holding every id in `ids`
    pub fn from_ids<I, S>(ids: I, expected_items: usize, false_positive_rate: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids: Vec<S> = ids.into_iter().collect();
        let mut filter = Self::with_rate(expected_items.max(ids.len()), false_positive_rate);

        for id in &ids {
            filter.insert(id.as_ref());
        }

        filter
    }

    pub fn insert(&mut self, id: &str) {
        for bit in self.positions(id) {
            self.bits[(bit / 64) as usize] |= 1 << (bit % 64);
        }
        self.inserted += 1;
    }

    /// `false` means definitely absent; `true` means maybe present
    pub fn test(&self, id: &str) -> bool {
        self.positions(id)
            .all(|bit| self.bits[(bit / 64) as usize] & (1 << (bit % 64)) != 0)
    }

    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    pub fn inserted(&self) -> usize {
        self.inserted
    }

    fn positions(&self, id: &str) -> impl Iterator<Item = u64> + use<> {
        let digest = Sha256::digest(id.as_bytes());

        let mut lo = [0u8; 8];
        let mut hi = [0u8; 8];
        lo.copy_from_slice(&digest[0..8]);
        hi.copy_from_slice(&digest[8..16]);

        let h1 = u64::from_le_bytes(lo);
        let h2 = u64::from_le_bytes(hi) | 1;
        let num_bits = self.num_bits;

        (0..u64::from(self.num_hashes))
            .map(move |i| h1.wrapping_add(i.wrapping_mul(h2)) % num_bits)
    }
}
