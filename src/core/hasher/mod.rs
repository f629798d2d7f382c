//! # Hasher Module
//!
//! Computes the fingerprints the clustering engine compares.
//!
//! ## Fingerprints
//! - **Images** - a 64-bit dHash plus a 64-bin colour histogram, both
//!   taken from a thumbnail bounded to 256px
//! - **Videos** - the dHash of two frames, sampled at 10% and 50% of the
//!   duration, comma-joined; no histogram
//!
//! ## Performance
//! - `zune-jpeg` for JPEG decoding
//! - `fast_image_resize` for SIMD-accelerated reductions
//! - `rayon` for hashing each chunk in parallel
//!
//! ## Example
//! ```rust,ignore
//! use media_similarity::core::hasher::{HashEngine, LocalThumbnailProvider};
//!
//! let engine = HashEngine::new(Box::new(LocalThumbnailProvider::new()));
//! let outcome = engine.compute(&items, &cancel, |delta| bar.inc(delta as u64));
//! ```

mod difference;
mod engine;
pub mod fast_decode;
pub mod fast_resize;
mod histogram;
mod provider;
mod video;

pub use difference::{hamming_distance, DifferenceHash, HASH_HEX_LEN};
pub use engine::{
    default_chunk_size, HashEngine, HashOutcome, DEFAULT_THUMBNAIL_EDGE, FRAME_HASH_SEPARATOR,
    VIDEO_SAMPLE_POINTS,
};
pub use histogram::{histogram_distance, ColorHistogram, HISTOGRAM_BINS};
pub use provider::{LocalThumbnailProvider, ThumbnailProvider};

#[cfg(test)]
pub(crate) use engine::tests::FakeProvider;

/// A fixed-length bit signature compared by Hamming distance
pub trait PerceptualHash: Clone + Send + Sync {
    /// Number of differing bits; lower means more alike
    fn distance(&self, other: &Self) -> u32;

    fn as_bytes(&self) -> &[u8];

    fn to_hex(&self) -> String {
        self.as_bytes().iter().map(|b| format!("{:02x}", b)).collect()
    }

    fn bit_count(&self) -> u32 {
        (self.as_bytes().len() * 8) as u32
    }

    /// Similarity as a percentage (0-100)
    fn similarity(&self, other: &Self) -> f64 {
        let max_distance = self.bit_count();
        if max_distance == 0 {
            return 100.0;
        }
        (1.0 - self.distance(other) as f64 / max_distance as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similarity_spans_zero_to_hundred() {
        let zero = DifferenceHash::from_hex("0000000000000000").unwrap();
        let ones = DifferenceHash::from_hex("ffffffffffffffff").unwrap();
        assert_eq!(zero.similarity(&zero), 100.0);
        assert_eq!(zero.similarity(&ones), 0.0);
    }
}
