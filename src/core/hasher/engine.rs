//! Chunked, failure-isolating fingerprint computation.

use super::difference::DifferenceHash;
use super::histogram::ColorHistogram;
use super::provider::ThumbnailProvider;
use crate::core::fingerprint::FingerprintEntry;
use crate::core::media::MediaItem;
use crate::core::pipeline::CancellationToken;
use crate::error::HashError;
use rayon::prelude::*;
use tracing::{debug, warn};

/// Longest thumbnail edge handed to the hashers
pub const DEFAULT_THUMBNAIL_EDGE: u32 = 256;

/// Fractions of a video's duration at which frames are sampled
pub const VIDEO_SAMPLE_POINTS: [f64; 2] = [0.1, 0.5];

/// Separator between per-frame hashes of a video
pub const FRAME_HASH_SEPARATOR: char = ',';

/// Twice the available parallelism, at least 1
pub fn default_chunk_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_mul(2)
        .max(1)
}

/// What one `compute` call produced
#[derive(Debug, Default)]
pub struct HashOutcome {
    /// New or refreshed fingerprints
    pub entries: Vec<FingerprintEntry>,
    /// Paths that could not be hashed
    pub skipped: Vec<String>,
    /// Stopped early on cancellation
    pub cancelled: bool,
}

/// Computes fingerprints for items that need them.
///
/// Items are processed in chunks: every item of a chunk is hashed in
/// parallel and the whole chunk finishes before progress is reported and
/// the next chunk starts. This caps how many decoded bitmaps are alive at
/// once.
pub struct HashEngine {
    provider: Box<dyn ThumbnailProvider>,
    chunk_size: usize,
    thumbnail_edge: u32,
}

impl HashEngine {
    pub fn new(provider: Box<dyn ThumbnailProvider>) -> Self {
        Self {
            provider,
            chunk_size: default_chunk_size(),
            thumbnail_edge: DEFAULT_THUMBNAIL_EDGE,
        }
    }

    /// Override the chunk size; 0 is treated as 1
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_thumbnail_edge(mut self, edge: u32) -> Self {
        self.thumbnail_edge = edge.max(1);
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Hash every item, reporting a processed-count delta once per chunk.
    ///
    /// A failing item lands in `skipped`; it never aborts the batch.
    pub fn compute<F>(
        &self,
        items: &[&MediaItem],
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> HashOutcome
    where
        F: FnMut(usize),
    {
        let mut outcome = HashOutcome::default();

        for (index, chunk) in items.chunks(self.chunk_size).enumerate() {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }

            let results: Vec<Option<Result<Option<FingerprintEntry>, HashError>>> = chunk
                .par_iter()
                .map(|item| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    Some(self.hash_item(item))
                })
                .collect();

            let mut processed = 0;
            for (item, result) in chunk.iter().zip(results) {
                match result {
                    None => outcome.cancelled = true,
                    Some(Ok(Some(entry))) => {
                        outcome.entries.push(entry);
                        processed += 1;
                    }
                    Some(Ok(None)) => {
                        debug!("No fingerprint for {} (zero duration)", item.id);
                        processed += 1;
                    }
                    Some(Err(e)) => {
                        warn!("Skipping {}: {}", item.id, e);
                        outcome.skipped.push(item.id.clone());
                        processed += 1;
                    }
                }
            }

            if processed > 0 {
                on_progress(processed);
            }
            debug!("Hashed chunk {} ({} items)", index, processed);

            if outcome.cancelled {
                break;
            }
        }

        outcome
    }

    /// Fingerprint one item.
    ///
    /// `Ok(None)` for a video with no usable duration.
    pub fn hash_item(&self, item: &MediaItem) -> Result<Option<FingerprintEntry>, HashError> {
        let (perceptual_hash, histogram) = if item.is_video {
            match self.hash_video(item)? {
                Some(hash) => (hash, None),
                None => return Ok(None),
            }
        } else {
            let thumb = self.provider.image_thumbnail(item, self.thumbnail_edge)?;
            if thumb.width() == 0 || thumb.height() == 0 {
                return Err(HashError::EmptyImage {
                    path: item.path().to_path_buf(),
                });
            }
            let hash = DifferenceHash::compute(&thumb)?;
            let histogram = ColorHistogram::compute(&thumb)?;
            (hash.to_string(), Some(histogram.to_string()))
        };

        Ok(Some(FingerprintEntry {
            file_path: item.id.clone(),
            last_modified: item.date_modified,
            size: item.size,
            perceptual_hash,
            histogram,
        }))
    }

    fn hash_video(&self, item: &MediaItem) -> Result<Option<String>, HashError> {
        let duration_ms = self.provider.video_duration_ms(item)?;
        if duration_ms <= 0 {
            return Ok(None);
        }

        let mut hashes = Vec::with_capacity(VIDEO_SAMPLE_POINTS.len());
        for fraction in VIDEO_SAMPLE_POINTS {
            let at_ms = (duration_ms as f64 * fraction) as i64;
            let frame = self.provider.video_frame(item, at_ms, self.thumbnail_edge)?;
            hashes.push(DifferenceHash::compute(&frame)?.to_string());
        }
        Ok(Some(hashes.join(&FRAME_HASH_SEPARATOR.to_string())))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::fingerprint::tests::media_item;
    use image::{DynamicImage, ImageBuffer, Rgb};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Provider serving synthetic images and counting decodes
    #[derive(Clone, Default)]
    pub(crate) struct FakeProvider {
        pub decodes: Arc<AtomicUsize>,
        pub failing: Arc<Mutex<Vec<String>>>,
        pub durations: Arc<Mutex<HashMap<String, i64>>>,
        pub frame_requests: Arc<Mutex<Vec<i64>>>,
    }

    impl FakeProvider {
        pub(crate) fn fail(&self, path: &str) {
            self.failing.lock().unwrap().push(path.to_string());
        }

        pub(crate) fn set_duration(&self, path: &str, ms: i64) {
            self.durations.lock().unwrap().insert(path.to_string(), ms);
        }

        fn image_for(&self, item: &MediaItem) -> Result<DynamicImage, HashError> {
            self.decodes.fetch_add(1, Ordering::SeqCst);
            if self.failing.lock().unwrap().contains(&item.id) {
                return Err(HashError::DecodeError {
                    path: item.path().to_path_buf(),
                    reason: "synthetic failure".to_string(),
                });
            }
            Ok(gradient())
        }
    }

    pub(crate) fn gradient() -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(64, 64, |x, y| {
            Rgb([(x * 4) as u8, (y * 4) as u8, 128])
        }))
    }

    impl ThumbnailProvider for FakeProvider {
        fn image_thumbnail(&self, item: &MediaItem, _max_edge: u32) -> Result<DynamicImage, HashError> {
            self.image_for(item)
        }

        fn video_duration_ms(&self, item: &MediaItem) -> Result<i64, HashError> {
            Ok(*self.durations.lock().unwrap().get(&item.id).unwrap_or(&10_000))
        }

        fn video_frame(
            &self,
            item: &MediaItem,
            at_ms: i64,
            _max_edge: u32,
        ) -> Result<DynamicImage, HashError> {
            self.frame_requests.lock().unwrap().push(at_ms);
            self.image_for(item)
        }
    }

    fn items(count: usize) -> Vec<MediaItem> {
        (0..count)
            .map(|i| media_item(&format!("/photos/{}.jpg", i), 1_000, 10, false))
            .collect()
    }

    #[test]
    fn progress_is_reported_per_chunk() {
        let engine = HashEngine::new(Box::new(FakeProvider::default())).with_chunk_size(3);
        let items = items(7);
        let refs: Vec<&MediaItem> = items.iter().collect();

        let mut deltas = Vec::new();
        let outcome = engine.compute(&refs, &CancellationToken::new(), |d| deltas.push(d));

        assert_eq!(deltas, vec![3, 3, 1]);
        assert_eq!(outcome.entries.len(), 7);
        assert!(outcome.skipped.is_empty());
        assert!(!outcome.cancelled);
    }

    #[test]
    fn one_bad_file_does_not_abort_the_batch() {
        let provider = FakeProvider::default();
        provider.fail("/photos/2.jpg");
        let engine = HashEngine::new(Box::new(provider)).with_chunk_size(2);
        let items = items(5);
        let refs: Vec<&MediaItem> = items.iter().collect();

        let outcome = engine.compute(&refs, &CancellationToken::new(), |_| {});

        assert_eq!(outcome.entries.len(), 4);
        assert_eq!(outcome.skipped, vec!["/photos/2.jpg"]);
    }

    #[test]
    fn image_entries_carry_hash_and_histogram() {
        let engine = HashEngine::new(Box::new(FakeProvider::default()));
        let item = media_item("/photos/a.jpg", 42, 99, false);

        let entry = engine.hash_item(&item).unwrap().unwrap();
        assert_eq!(entry.file_path, "/photos/a.jpg");
        assert_eq!(entry.last_modified, 42);
        assert_eq!(entry.size, 99);
        assert!(DifferenceHash::from_hex(&entry.perceptual_hash).is_some());
        assert!(ColorHistogram::parse(entry.histogram.as_deref().unwrap()).is_some());
    }

    #[test]
    fn video_samples_two_frames() {
        let provider = FakeProvider::default();
        provider.set_duration("/clips/a.mp4", 20_000);
        let engine = HashEngine::new(Box::new(provider.clone()));
        let item = media_item("/clips/a.mp4", 1, 1, true);

        let entry = engine.hash_item(&item).unwrap().unwrap();
        let frames: Vec<&str> = entry.perceptual_hash.split(FRAME_HASH_SEPARATOR).collect();
        assert_eq!(frames.len(), 2);
        assert!(entry.histogram.is_none());
        assert_eq!(*provider.frame_requests.lock().unwrap(), vec![2_000, 10_000]);
    }

    #[test]
    fn zero_duration_video_yields_nothing() {
        let provider = FakeProvider::default();
        provider.set_duration("/clips/empty.mp4", 0);
        let engine = HashEngine::new(Box::new(provider.clone()));
        let item = media_item("/clips/empty.mp4", 1, 1, true);
        let refs = vec![&item];

        let outcome = engine.compute(&refs, &CancellationToken::new(), |_| {});
        assert!(outcome.entries.is_empty());
        assert!(outcome.skipped.is_empty());
        assert_eq!(provider.decodes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancelled_before_start_hashes_nothing() {
        let provider = FakeProvider::default();
        let engine = HashEngine::new(Box::new(provider.clone())).with_chunk_size(2);
        let items = items(4);
        let refs: Vec<&MediaItem> = items.iter().collect();

        let token = CancellationToken::new();
        token.cancel();
        let outcome = engine.compute(&refs, &token, |_| {});

        assert!(outcome.cancelled);
        assert!(outcome.entries.is_empty());
        assert_eq!(provider.decodes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancelling_between_chunks_keeps_finished_work() {
        let engine = HashEngine::new(Box::new(FakeProvider::default())).with_chunk_size(2);
        let items = items(6);
        let refs: Vec<&MediaItem> = items.iter().collect();

        let token = CancellationToken::new();
        let outcome = engine.compute(&refs, &token, |_| token.cancel());

        assert!(outcome.cancelled);
        assert_eq!(outcome.entries.len(), 2);
    }

    #[test]
    fn zero_chunk_size_is_clamped() {
        let engine = HashEngine::new(Box::new(FakeProvider::default())).with_chunk_size(0);
        assert_eq!(engine.chunk_size(), 1);
        assert!(default_chunk_size() >= 2);
    }
}
