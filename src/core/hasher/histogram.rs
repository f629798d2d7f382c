//! Quantised colour histogram.
//!
//! A 16×16 RGB reduction sorted into 4 levels per channel, 64 bins in all,
//! stored as a comma-separated list of counts. Used as a second opinion on
//! image matches: two pictures with close dHashes but different palettes
//! are not the same photo.

use super::fast_resize::resize_to_rgb;
use crate::error::HashError;
use image::{DynamicImage, RgbImage};
use std::fmt;

/// Number of bins
pub const HISTOGRAM_BINS: usize = 64;

const REDUCTION_EDGE: u32 = 16;
const LEVEL_WIDTH: u8 = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorHistogram {
    bins: [u32; HISTOGRAM_BINS],
}

impl ColorHistogram {
    /// Build the histogram of a decoded image
    pub fn compute(image: &DynamicImage) -> Result<Self, HashError> {
        let reduced = resize_to_rgb(image, REDUCTION_EDGE, REDUCTION_EDGE)?;
        Ok(Self::from_rgb(&reduced))
    }

    fn from_rgb(image: &RgbImage) -> Self {
        let mut bins = [0u32; HISTOGRAM_BINS];
        for pixel in image.pixels() {
            let [r, g, b] = pixel.0.map(|c| (c / LEVEL_WIDTH) as usize);
            bins[r * 16 + g * 4 + b] += 1;
        }
        Self { bins }
    }

    pub fn bins(&self) -> &[u32; HISTOGRAM_BINS] {
        &self.bins
    }

    pub fn total(&self) -> u64 {
        self.bins.iter().map(|&c| u64::from(c)).sum()
    }

    /// Parse a stored histogram; requires exactly 64 counts
    pub fn parse(s: &str) -> Option<Self> {
        let mut bins = [0u32; HISTOGRAM_BINS];
        let mut count = 0;
        for part in s.split(',') {
            if count == HISTOGRAM_BINS {
                return None;
            }
            bins[count] = part.trim().parse().ok()?;
            count += 1;
        }
        (count == HISTOGRAM_BINS).then_some(Self { bins })
    }

    /// `1 − 2·Σmin / (ΣA + ΣB)`.
    ///
    /// Two empty histograms are identical; one empty histogram matches
    /// nothing else.
    pub fn distance(&self, other: &Self) -> f64 {
        let (total_a, total_b) = (self.total(), other.total());
        match (total_a, total_b) {
            (0, 0) => return 0.0,
            (0, _) | (_, 0) => return 1.0,
            _ => {}
        }

        let overlap: u64 = self
            .bins
            .iter()
            .zip(other.bins.iter())
            .map(|(&a, &b)| u64::from(a.min(b)))
            .sum();
        1.0 - (2.0 * overlap as f64) / (total_a + total_b) as f64
    }
}

impl fmt::Display for ColorHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, count) in self.bins.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", count)?;
        }
        Ok(())
    }
}

/// Distance between two stored histograms; `None` if either is malformed
pub fn histogram_distance(a: &str, b: &str) -> Option<f64> {
    Some(ColorHistogram::parse(a)?.distance(&ColorHistogram::parse(b)?))
}
