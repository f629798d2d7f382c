//! Group construction.

use super::bucket::{bucket_key, BucketIndex};
use super::rules::{Candidate, ImageRule, SimilarityRule, VideoRule};
use super::Sensitivity;
use crate::core::denial::pair_key;
use crate::core::fingerprint::FingerprintEntry;
use crate::core::media::MediaItem;
use crate::core::results::{sort_by_total_size, ScanResultGroup};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

/// Id prefix of image groups
pub const IMAGE_GROUP_PREFIX: &str = "img-";

/// Id prefix of video groups
pub const VIDEO_GROUP_PREFIX: &str = "vid-";

/// Everything one clustering pass reads.
///
/// All maps are snapshots; nothing here changes while clustering runs.
pub struct ClusterRequest<'a> {
    /// Old and new fingerprints, keyed by path
    pub fingerprints: &'a HashMap<String, FingerprintEntry>,
    /// Paths taking part in this scan
    pub candidates: &'a HashSet<String>,
    /// Metadata for every candidate, keyed by path
    pub items: &'a HashMap<String, MediaItem>,
    pub sensitivity: Sensitivity,
    /// Denied pair keys
    pub denials: &'a HashSet<String>,
}

/// Turns fingerprints into similar groups
#[derive(Debug, Default, Clone, Copy)]
pub struct ClusteringEngine;

impl ClusteringEngine {
    pub fn new() -> Self {
        Self
    }

    /// Cluster images and videos concurrently, largest groups first.
    ///
    /// Candidates without a fingerprint or metadata are ignored.
    pub fn cluster(&self, request: &ClusterRequest<'_>) -> Vec<ScanResultGroup> {
        let mut images = Vec::new();
        let mut videos = Vec::new();

        for path in request.candidates {
            let (Some(item), Some(entry)) = (request.items.get(path), request.fingerprints.get(path))
            else {
                continue;
            };
            if entry.perceptual_hash.is_empty() {
                continue;
            }
            let candidate = Candidate { item, entry };
            if item.is_video {
                videos.push(candidate);
            } else {
                images.push(candidate);
            }
        }

        let image_rule = ImageRule::new(request.sensitivity);
        let video_rule = VideoRule::new(request.sensitivity);
        let (mut groups, video_groups) = rayon::join(
            || cluster_partition(images, &image_rule, request.denials),
            || cluster_partition(videos, &video_rule, request.denials),
        );

        debug!(
            "Clustered {} image groups and {} video groups",
            groups.len(),
            video_groups.len()
        );

        groups.extend(video_groups);
        sort_by_total_size(&mut groups);
        groups
    }
}

/// Cluster one partition.
///
/// Seeds are taken in (bucket, path) order. Each group grows breadth-first:
/// every member's bucket neighbourhood is searched, so membership can chain
/// through intermediate matches.
fn cluster_partition(
    mut candidates: Vec<Candidate<'_>>,
    rule: &dyn SimilarityRule,
    denials: &HashSet<String>,
) -> Vec<ScanResultGroup> {
    candidates.sort_by(|a, b| {
        bucket_key(a.hash())
            .cmp(bucket_key(b.hash()))
            .then_with(|| a.path().cmp(b.path()))
    });

    let hashes: Vec<&str> = candidates.iter().map(|c| c.hash()).collect();
    let index = BucketIndex::build(&hashes);

    let mut visited = vec![false; candidates.len()];
    let mut groups = Vec::new();
    let mut queue = VecDeque::new();

    for seed in 0..candidates.len() {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;

        let mut members = vec![seed];
        queue.push_back(seed);

        while let Some(current) = queue.pop_front() {
            let anchor = &candidates[current];
            for other in index.neighbourhood(anchor.hash()) {
                if visited[other] {
                    continue;
                }
                let partner = &candidates[other];
                if denials.contains(&pair_key(anchor.path(), partner.path())) {
                    continue;
                }
                if !rule.is_match(anchor, partner) {
                    continue;
                }
                visited[other] = true;
                members.push(other);
                queue.push_back(other);
            }
        }

        if members.len() < 2 {
            continue;
        }

        let id = format!("{}{}", rule.group_prefix(), candidates[seed].hash());
        let items = members
            .iter()
            .map(|&m| candidates[m].item.clone())
            .collect();
        if let Some(group) = ScanResultGroup::similar(id, items) {
            groups.push(group);
        }
    }

    groups
}
