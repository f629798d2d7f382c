//! Hash-prefix bucketing.
//!
//! Items are grouped by the first two characters of their hash. Buckets
//! are kept in sorted order so that a lookup can also reach the buckets
//! immediately before and after, which catches near-identical hashes that
//! straddle a prefix boundary.

use std::collections::HashMap;

/// Bucket key of a rendered hash
pub fn bucket_key(hash: &str) -> &str {
    match hash.char_indices().nth(2) {
        Some((end, _)) => &hash[..end],
        None => hash,
    }
}

/// Sorted buckets of item indices
#[derive(Debug)]
pub struct BucketIndex<'a> {
    keys: Vec<&'a str>,
    buckets: Vec<Vec<usize>>,
    positions: HashMap<&'a str, usize>,
}

impl<'a> BucketIndex<'a> {
    /// Index hashes by position in the given slice
    pub fn build(hashes: &[&'a str]) -> Self {
        let mut grouped: HashMap<&'a str, Vec<usize>> = HashMap::new();
        for (index, hash) in hashes.iter().enumerate() {
            grouped.entry(bucket_key(hash)).or_default().push(index);
        }

        let mut entries: Vec<(&'a str, Vec<usize>)> = grouped.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        let positions = entries
            .iter()
            .enumerate()
            .map(|(position, (key, _))| (*key, position))
            .collect();
        let (keys, buckets) = entries.into_iter().unzip();

        Self {
            keys,
            buckets,
            positions,
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.keys.len()
    }

    /// Sorted bucket keys
    pub fn keys(&self) -> &[&'a str] {
        &self.keys
    }

    /// Indices in the bucket of `hash` and its two sorted neighbours
    pub fn neighbourhood(&self, hash: &str) -> impl Iterator<Item = usize> + '_ {
        let range = match self.positions.get(bucket_key(hash)) {
            Some(&position) => position.saturating_sub(1)..(position + 2).min(self.buckets.len()),
            None => 0..0,
        };
        self.buckets[range].iter().flatten().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_two_leading_characters() {
        assert_eq!(bucket_key("a1b2c3"), "a1");
        assert_eq!(bucket_key("a"), "a");
        assert_eq!(bucket_key(""), "");
    }

    #[test]
    fn buckets_are_sorted() {
        let index = BucketIndex::build(&["ff00", "0a11", "7c00", "0a22"]);
        assert_eq!(index.keys(), &["0a", "7c", "ff"]);
        assert_eq!(index.bucket_count(), 3);
    }

    #[test]
    fn neighbourhood_spans_adjacent_buckets() {
        let hashes = ["10aa", "11aa", "12aa", "13aa", "11bb"];
        let index = BucketIndex::build(&hashes);

        let mut around_11: Vec<usize> = index.neighbourhood("11zz").collect();
        around_11.sort_unstable();
        assert_eq!(around_11, vec![0, 1, 2, 4]);

        let mut first: Vec<usize> = index.neighbourhood("10").collect();
        first.sort_unstable();
        assert_eq!(first, vec![0, 1, 4]);

        let last: Vec<usize> = index.neighbourhood("13").collect();
        assert_eq!(last, vec![2, 3]);

        assert_eq!(index.neighbourhood("99").count(), 0);
    }
}
