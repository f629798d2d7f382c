//! 64-bit difference hash (dHash).
//!
//! The image is reduced to a 9×8 grayscale grid. Each row yields eight
//! bits, one per adjacent pair, set when the left pixel is brighter than
//! its right neighbour. Rows are concatenated top to bottom, most
//! significant bit first, and rendered as 16 lowercase hex characters.

use super::fast_resize::resize_to_grayscale;
use super::PerceptualHash;
use crate::error::HashError;
use image::{DynamicImage, GrayImage};
use std::fmt;

const GRID_WIDTH: u32 = 9;
const GRID_HEIGHT: u32 = 8;

/// Length of a rendered hash
pub const HASH_HEX_LEN: usize = 16;

/// A 64-bit dHash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DifferenceHash([u8; 8]);

impl DifferenceHash {
    /// Hash a decoded image
    pub fn compute(image: &DynamicImage) -> Result<Self, HashError> {
        let gray = resize_to_grayscale(image, GRID_WIDTH, GRID_HEIGHT)?;
        Ok(Self::from_grid(&gray))
    }

    fn from_grid(gray: &GrayImage) -> Self {
        let mut bits: u64 = 0;
        for y in 0..GRID_HEIGHT {
            for x in 0..GRID_WIDTH - 1 {
                let left = gray.get_pixel(x, y)[0];
                let right = gray.get_pixel(x + 1, y)[0];
                bits = (bits << 1) | u64::from(left > right);
            }
        }
        Self(bits.to_be_bytes())
    }

    /// Parse a rendered hash; anything but 16 hex digits is rejected
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != HASH_HEX_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u64::from_str_radix(s, 16)
            .ok()
            .map(|bits| Self(bits.to_be_bytes()))
    }

    pub fn bits(&self) -> u64 {
        u64::from_be_bytes(self.0)
    }
}

impl PerceptualHash for DifferenceHash {
    fn distance(&self, other: &Self) -> u32 {
        (self.bits() ^ other.bits()).count_ones()
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for DifferenceHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.bits())
    }
}

/// Hamming distance between two rendered hashes.
///
/// `None` when either string is malformed; callers treat that as "not
/// similar".
pub fn hamming_distance(a: &str, b: &str) -> Option<u32> {
    let a = DifferenceHash::from_hex(a)?;
    let b = DifferenceHash::from_hex(b)?;
    Some(a.distance(&b))
}
