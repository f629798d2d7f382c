//! Pipeline execution implementation.

use super::CancellationToken;
use crate::core::comparator::{ClusterRequest, ClusteringEngine, Sensitivity};
use crate::core::denial::{DenialLedger, InMemoryDenialLedger};
use crate::core::exact::ExactMatcher;
use crate::core::fingerprint::{
    items_needing_hash, orphaned_paths, FingerprintStore, InMemoryFingerprintStore,
};
use crate::core::hasher::{HashEngine, LocalThumbnailProvider, ThumbnailProvider, DEFAULT_THUMBNAIL_EDGE};
use crate::core::media::{MediaItem, MediaSource};
use crate::core::results::{sort_by_total_size, ScanResultCache, ScanResultGroup, ScanScope};
use crate::error::{EngineError, ScanError};
use crate::events::{
    null_sender, ClusterEvent, Event, EventSender, HashEvent, HashProgress, PipelineEvent,
    PipelinePhase, PipelineSummary,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Smallest thumbnail edge the hashers can work from
const MIN_THUMBNAIL_EDGE: u32 = 16;

/// Configuration for one scan pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub sensitivity: Sensitivity,
    pub scope: ScanScope,
    /// Also look for byte-identical files
    pub detect_exact: bool,
    /// Write results to the scan result cache, when one is configured
    pub persist: bool,
    /// Longest thumbnail edge used for hashing
    pub thumbnail_edge: u32,
    /// Items hashed per chunk; `None` picks twice the available parallelism
    pub chunk_size: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sensitivity: Sensitivity::Balanced,
            scope: ScanScope::Full,
            detect_exact: true,
            persist: true,
            thumbnail_edge: DEFAULT_THUMBNAIL_EDGE,
            chunk_size: None,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.chunk_size == Some(0) {
            return Err(EngineError::Config("chunk size must be at least 1".into()));
        }
        if self.thumbnail_edge < MIN_THUMBNAIL_EDGE {
            return Err(EngineError::Config(format!(
                "thumbnail edge must be at least {}px",
                MIN_THUMBNAIL_EDGE
            )));
        }
        Ok(())
    }
}

/// Result of one scan pass
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// Exact and similar groups, largest total size first
    pub groups: Vec<ScanResultGroup>,
    /// Files that could not be scanned
    pub unscannable: Vec<String>,
    pub scope: ScanScope,
    /// Items fingerprinted during this pass
    pub hashed: usize,
    /// Items whose stored fingerprint was reused
    pub reused: usize,
    /// Stored fingerprints purged because their file is no longer a candidate
    pub purged: usize,
    pub duration_ms: u64,
}

impl ScanOutcome {
    pub fn similar_groups(&self) -> usize {
        self.groups
            .iter()
            .filter(|g| matches!(g, ScanResultGroup::Similar(_)))
            .count()
    }

    pub fn duplicate_groups(&self) -> usize {
        self.groups.len() - self.similar_groups()
    }

    pub fn reclaimable_bytes(&self) -> u64 {
        self.groups.iter().map(|g| g.reclaimable_bytes()).sum()
    }
}

/// Builder for a [`ScanPipeline`]
pub struct PipelineBuilder {
    config: PipelineConfig,
    fingerprints: Option<Box<dyn FingerprintStore>>,
    denials: Option<Box<dyn DenialLedger>>,
    results: Option<ScanResultCache>,
    provider: Option<Box<dyn ThumbnailProvider>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            fingerprints: None,
            denials: None,
            results: None,
            provider: None,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn sensitivity(mut self, sensitivity: Sensitivity) -> Self {
        self.config.sensitivity = sensitivity;
        self
    }

    pub fn scope(mut self, scope: ScanScope) -> Self {
        self.config.scope = scope;
        self
    }

    pub fn detect_exact(mut self, enabled: bool) -> Self {
        self.config.detect_exact = enabled;
        self
    }

    pub fn persist(mut self, enabled: bool) -> Self {
        self.config.persist = enabled;
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_size = Some(chunk_size);
        self
    }

    pub fn thumbnail_edge(mut self, edge: u32) -> Self {
        self.config.thumbnail_edge = edge;
        self
    }

    /// Fingerprint store; defaults to an in-memory store
    pub fn fingerprint_store(mut self, store: Box<dyn FingerprintStore>) -> Self {
        self.fingerprints = Some(store);
        self
    }

    /// Denial ledger; defaults to an empty in-memory ledger
    pub fn denial_ledger(mut self, ledger: Box<dyn DenialLedger>) -> Self {
        self.denials = Some(ledger);
        self
    }

    /// Where results are persisted; without one nothing is saved
    pub fn result_cache(mut self, cache: ScanResultCache) -> Self {
        self.results = Some(cache);
        self
    }

    /// Bitmap source; defaults to local decoding plus ffmpeg
    pub fn thumbnail_provider(mut self, provider: Box<dyn ThumbnailProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn build(self) -> Result<ScanPipeline, EngineError> {
        self.config.validate()?;

        let provider = self
            .provider
            .unwrap_or_else(|| Box::new(LocalThumbnailProvider::new()));
        let mut hash_engine =
            HashEngine::new(provider).with_thumbnail_edge(self.config.thumbnail_edge);
        let mut exact = ExactMatcher::new();
        if let Some(chunk_size) = self.config.chunk_size {
            hash_engine = hash_engine.with_chunk_size(chunk_size);
            exact = exact.with_chunk_size(chunk_size);
        }

        Ok(ScanPipeline {
            config: self.config,
            fingerprints: self
                .fingerprints
                .unwrap_or_else(|| Box::new(InMemoryFingerprintStore::new())),
            denials: self
                .denials
                .unwrap_or_else(|| Box::new(InMemoryDenialLedger::new())),
            results: self.results,
            hash_engine,
            exact,
            clustering: ClusteringEngine::new(),
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Fingerprint, cluster, match and persist one candidate set
pub struct ScanPipeline {
    config: PipelineConfig,
    fingerprints: Box<dyn FingerprintStore>,
    denials: Box<dyn DenialLedger>,
    results: Option<ScanResultCache>,
    hash_engine: HashEngine,
    exact: ExactMatcher,
    clustering: ClusteringEngine,
}

impl ScanPipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn fingerprint_store(&self) -> &dyn FingerprintStore {
        self.fingerprints.as_ref()
    }

    pub fn denial_ledger(&self) -> &dyn DenialLedger {
        self.denials.as_ref()
    }

    pub fn result_cache(&self) -> Option<&ScanResultCache> {
        self.results.as_ref()
    }

    /// Run without events or cancellation
    pub fn run(&self, items: &[MediaItem]) -> Result<ScanOutcome, EngineError> {
        self.run_with_events(items, &null_sender(), &CancellationToken::new())
    }

    /// Enumerate a source, then run over its items
    pub fn run_source(
        &self,
        source: &dyn MediaSource,
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<ScanOutcome, EngineError> {
        let items = source.media_items()?;
        self.run_with_events(&items, events, cancel)
    }

    /// Run with event reporting and cancellation.
    ///
    /// On cancellation, fingerprints computed so far are kept and
    /// `ScanError::Cancelled` is returned.
    pub fn run_with_events(
        &self,
        items: &[MediaItem],
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<ScanOutcome, EngineError> {
        let start_time = Instant::now();

        // Ids key every store; a second copy of one would pair with itself
        let mut seen = HashSet::new();
        let unique: Vec<MediaItem> = items
            .iter()
            .filter(|i| seen.insert(i.id.as_str()))
            .cloned()
            .collect();
        if unique.len() < items.len() {
            warn!("Ignoring {} repeated candidate ids", items.len() - unique.len());
        }
        let items = unique.as_slice();

        events.send(Event::Pipeline(PipelineEvent::Started {
            total_items: items.len(),
        }));

        // Phase 1: fingerprints
        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Fingerprinting,
        }));

        let existing = self.fingerprints.get_all()?;
        let pending = items_needing_hash(items, &existing);
        let reused = items.len() - pending.len();
        let total = pending.len();
        events.send(Event::Hash(HashEvent::Started {
            pending: total,
            reused,
        }));

        let mut completed = 0;
        let hashed = self.hash_engine.compute(&pending, cancel, |delta| {
            completed += delta;
            events.send(Event::Hash(HashEvent::Progress(HashProgress { completed, total })));
        });

        for path in &hashed.skipped {
            events.send(Event::Hash(HashEvent::Skipped {
                path: PathBuf::from(path),
                message: "could not be decoded".to_string(),
            }));
        }

        self.fingerprints.upsert(&hashed.entries)?;

        if hashed.cancelled {
            info!(
                "Scan cancelled after {} of {} items; progress kept",
                hashed.entries.len(),
                total
            );
            events.send(Event::Pipeline(PipelineEvent::Cancelled));
            return Err(ScanError::Cancelled.into());
        }

        events.send(Event::Hash(HashEvent::Completed {
            hashed: hashed.entries.len(),
            skipped: hashed.skipped.len(),
        }));

        let candidates: HashSet<String> = items.iter().map(|i| i.id.clone()).collect();
        let orphans = orphaned_paths(&existing, &candidates);

        // Stored entries that needed a refresh but got none no longer
        // describe their file
        let refreshed: HashSet<&str> = hashed.entries.iter().map(|e| e.file_path.as_str()).collect();
        let stale: Vec<String> = pending
            .iter()
            .filter(|i| existing.contains_key(&i.id) && !refreshed.contains(i.id.as_str()))
            .map(|i| i.id.clone())
            .collect();

        let hashed_count = hashed.entries.len();
        let mut merged = existing;
        for path in &stale {
            merged.remove(path);
        }
        if !stale.is_empty() {
            self.fingerprints.delete_by_paths(&stale)?;
            info!("Dropped {} outdated fingerprints that could not be refreshed", stale.len());
        }
        for entry in hashed.entries {
            merged.insert(entry.file_path.clone(), entry);
        }
        let item_map: HashMap<String, MediaItem> =
            items.iter().map(|i| (i.id.clone(), i.clone())).collect();

        // Phase 2: similar groups
        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Clustering,
        }));

        let denials = self.denials.get_all_keys()?;
        let (videos, images): (Vec<&MediaItem>, Vec<&MediaItem>) = items
            .iter()
            .filter(|i| merged.contains_key(&i.id))
            .partition(|i| i.is_video);
        events.send(Event::Cluster(ClusterEvent::Started {
            images: images.len(),
            videos: videos.len(),
        }));

        let mut groups = self.clustering.cluster(&ClusterRequest {
            fingerprints: &merged,
            candidates: &candidates,
            items: &item_map,
            sensitivity: self.config.sensitivity,
            denials: &denials,
        });
        events.send(Event::Cluster(ClusterEvent::Completed {
            groups: groups.len(),
        }));

        let mut unscannable = hashed.skipped;

        // Phase 3: exact copies
        if self.config.detect_exact {
            events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
                phase: PipelinePhase::ExactMatching,
            }));

            let exact = self.exact.find_duplicates(items, cancel);
            if exact.cancelled {
                events.send(Event::Pipeline(PipelineEvent::Cancelled));
                return Err(ScanError::Cancelled.into());
            }
            events.send(Event::Cluster(ClusterEvent::ExactCompleted {
                groups: exact.groups.len(),
            }));

            for path in exact.unscannable {
                if !unscannable.contains(&path) {
                    unscannable.push(path);
                }
            }
            groups.extend(exact.groups);
            sort_by_total_size(&mut groups);
        }
        unscannable.sort();

        if !orphans.is_empty() {
            self.fingerprints.delete_by_paths(&orphans)?;
            info!("Purged {} fingerprints for files no longer present", orphans.len());
        }

        // Phase 4: persistence
        if self.config.persist {
            if let Some(results) = &self.results {
                events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
                    phase: PipelinePhase::Saving,
                }));
                results.save_scan_results(&groups, &unscannable, self.config.scope, None)?;
                events.send(Event::Pipeline(PipelineEvent::ResultsSaved {
                    scope: self.config.scope.to_string(),
                    groups: groups.len(),
                }));
            } else {
                debug!("No result cache configured; results not persisted");
            }
        }

        let outcome = ScanOutcome {
            groups,
            unscannable,
            scope: self.config.scope,
            hashed: hashed_count,
            reused,
            purged: orphans.len(),
            duration_ms: start_time.elapsed().as_millis() as u64,
        };

        events.send(Event::Pipeline(PipelineEvent::Completed {
            summary: PipelineSummary {
                total_items: items.len(),
                hashed: outcome.hashed,
                reused: outcome.reused,
                skipped: outcome.unscannable.len(),
                similar_groups: outcome.similar_groups(),
                duplicate_groups: outcome.duplicate_groups(),
                reclaimable_bytes: outcome.reclaimable_bytes(),
                duration_ms: outcome.duration_ms,
            },
        }));

        info!(
            "Scan finished: {} groups, {} unscannable, {} hashed, {} reused",
            outcome.groups.len(),
            outcome.unscannable.len(),
            outcome.hashed,
            outcome.reused
        );
        Ok(outcome)
    }
}
