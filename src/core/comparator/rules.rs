//! Pairwise matching rules.

use super::{is_screenshot_like, Sensitivity, SCREENSHOT_HASH_THRESHOLD};
use crate::core::fingerprint::FingerprintEntry;
use crate::core::hasher::{hamming_distance, histogram_distance, FRAME_HASH_SEPARATOR};
use crate::core::media::MediaItem;

/// A clusterable item: its metadata plus its stored fingerprint
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub item: &'a MediaItem,
    pub entry: &'a FingerprintEntry,
}

impl<'a> Candidate<'a> {
    pub fn path(&self) -> &'a str {
        &self.item.id
    }

    pub fn hash(&self) -> &'a str {
        &self.entry.perceptual_hash
    }
}

/// Decides whether two candidates of one partition match.
///
/// Malformed stored data never matches.
pub trait SimilarityRule: Send + Sync {
    /// Prefix of group ids produced under this rule
    fn group_prefix(&self) -> &'static str;

    fn is_match(&self, a: &Candidate<'_>, b: &Candidate<'_>) -> bool;
}

/// dHash distance plus histogram distance
#[derive(Debug, Clone, Copy)]
pub struct ImageRule {
    sensitivity: Sensitivity,
}

impl ImageRule {
    pub fn new(sensitivity: Sensitivity) -> Self {
        Self { sensitivity }
    }

    /// dHash threshold for this particular pair
    pub fn hash_threshold(&self, a: &MediaItem, b: &MediaItem) -> u32 {
        if is_screenshot_like(a) || is_screenshot_like(b) {
            SCREENSHOT_HASH_THRESHOLD
        } else {
            self.sensitivity.image_hash_threshold()
        }
    }
}

impl SimilarityRule for ImageRule {
    fn group_prefix(&self) -> &'static str {
        super::IMAGE_GROUP_PREFIX
    }

    fn is_match(&self, a: &Candidate<'_>, b: &Candidate<'_>) -> bool {
        let Some(distance) = hamming_distance(a.hash(), b.hash()) else {
            return false;
        };
        if distance > self.hash_threshold(a.item, b.item) {
            return false;
        }

        match (a.entry.histogram.as_deref(), b.entry.histogram.as_deref()) {
            (Some(ha), Some(hb)) => histogram_distance(ha, hb)
                .is_some_and(|d| d <= self.sensitivity.histogram_threshold()),
            _ => false,
        }
    }
}

/// Any frame of one video close to any frame of the other
#[derive(Debug, Clone, Copy)]
pub struct VideoRule {
    sensitivity: Sensitivity,
}

impl VideoRule {
    pub fn new(sensitivity: Sensitivity) -> Self {
        Self { sensitivity }
    }
}

impl SimilarityRule for VideoRule {
    fn group_prefix(&self) -> &'static str {
        super::VIDEO_GROUP_PREFIX
    }

    fn is_match(&self, a: &Candidate<'_>, b: &Candidate<'_>) -> bool {
        let threshold = self.sensitivity.video_hash_threshold();
        a.hash().split(FRAME_HASH_SEPARATOR).any(|fa| {
            b.hash()
                .split(FRAME_HASH_SEPARATOR)
                .any(|fb| hamming_distance(fa, fb).is_some_and(|d| d <= threshold))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::tests::media_item;

    fn fingerprint(path: &str, hash: &str, histogram: Option<&str>) -> FingerprintEntry {
        FingerprintEntry {
            file_path: path.to_string(),
            last_modified: 1,
            size: 1,
            perceptual_hash: hash.to_string(),
            histogram: histogram.map(str::to_string),
        }
    }

    fn flat_histogram() -> String {
        vec!["4"; 64].join(",")
    }

    #[test]
    fn image_match_needs_both_filters() {
        let hist = flat_histogram();
        let (ia, ib) = (media_item("/a.jpg", 1, 1, false), media_item("/b.jpg", 1, 1, false));
        let a = fingerprint("/a.jpg", "0000000000000000", Some(&hist));
        let b = fingerprint("/b.jpg", "000000000000001f", Some(&hist));
        let rule = ImageRule::new(Sensitivity::Balanced);

        assert!(rule.is_match(
            &Candidate { item: &ia, entry: &a },
            &Candidate { item: &ib, entry: &b }
        ));
        assert!(!ImageRule::new(Sensitivity::Strict).is_match(
            &Candidate { item: &ia, entry: &a },
            &Candidate { item: &ib, entry: &b }
        ));

        let no_hist = fingerprint("/b.jpg", "000000000000001f", None);
        assert!(!rule.is_match(
            &Candidate { item: &ia, entry: &a },
            &Candidate { item: &ib, entry: &no_hist }
        ));
    }

    #[test]
    fn malformed_hash_never_matches() {
        let hist = flat_histogram();
        let item = media_item("/a.jpg", 1, 1, false);
        let good = fingerprint("/a.jpg", "0000000000000000", Some(&hist));
        let bad = fingerprint("/a.jpg", "00", Some(&hist));
        let rule = ImageRule::new(Sensitivity::Loose);
        assert!(!rule.is_match(
            &Candidate { item: &item, entry: &good },
            &Candidate { item: &item, entry: &bad }
        ));
    }

    #[test]
    fn screenshot_tightens_threshold() {
        let rule = ImageRule::new(Sensitivity::Loose);
        let shot = media_item("/Pictures/Screenshots/s.png", 1, 1, false);
        let photo = media_item("/dcim/p.jpg", 1, 1, false);
        assert_eq!(rule.hash_threshold(&shot, &photo), SCREENSHOT_HASH_THRESHOLD);
        assert_eq!(rule.hash_threshold(&photo, &photo), 8);
    }

    #[test]
    fn video_matches_on_any_frame_pair() {
        let (ia, ib) = (media_item("/a.mp4", 1, 1, true), media_item("/b.mp4", 1, 1, true));
        let a = fingerprint("/a.mp4", "ffffffffffffffff,0000000000000000", None);
        let b = fingerprint("/b.mp4", "0f0f0f0f0f0f0f0f,0000000000000003", None);
        let far = fingerprint("/b.mp4", "0f0f0f0f0f0f0f0f,00000000000000ff", None);
        let rule = VideoRule::new(Sensitivity::Balanced);

        assert!(rule.is_match(
            &Candidate { item: &ia, entry: &a },
            &Candidate { item: &ib, entry: &b }
        ));
        assert!(!rule.is_match(
            &Candidate { item: &ia, entry: &a },
            &Candidate { item: &ib, entry: &far }
        ));
    }
}
