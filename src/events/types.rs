//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by a scan pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Fingerprinting phase events
    Hash(HashEvent),
    /// Clustering phase events
    Cluster(ClusterEvent),
    /// Pipeline-level events
    Pipeline(PipelineEvent),
}

/// Events during the fingerprinting phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HashEvent {
    /// Hashing has started
    Started {
        /// Items that need a fresh fingerprint
        pending: usize,
        /// Items served from the fingerprint store
        reused: usize,
    },
    /// A chunk finished
    Progress(HashProgress),
    /// An item could not be hashed and was marked unscannable
    Skipped { path: PathBuf, message: String },
    /// Hashing completed
    Completed { hashed: usize, skipped: usize },
}

/// Progress information during hashing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashProgress {
    /// Items processed so far (cumulative across chunks)
    pub completed: usize,
    /// Items to process in this pass
    pub total: usize,
}

/// Events during the clustering phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClusterEvent {
    /// Clustering has started
    Started { images: usize, videos: usize },
    /// Exact-duplicate grouping finished
    ExactCompleted { groups: usize },
    /// Clustering completed
    Completed { groups: usize },
}

/// Pipeline-level events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// Pipeline has started
    Started { total_items: usize },
    /// Moving to a new phase
    PhaseChanged { phase: PipelinePhase },
    /// Results were written to the scan result cache
    ResultsSaved { scope: String, groups: usize },
    /// Pipeline completed successfully
    Completed { summary: PipelineSummary },
    /// Pipeline was cancelled
    Cancelled,
}

/// Phases of a scan pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelinePhase {
    Fingerprinting,
    Clustering,
    ExactMatching,
    Saving,
}

/// Summary of a scan pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Candidate items supplied by the caller
    pub total_items: usize,
    /// Items hashed during this pass
    pub hashed: usize,
    /// Items whose stored fingerprint was still valid
    pub reused: usize,
    /// Items that could not be scanned
    pub skipped: usize,
    /// Look-alike groups found
    pub similar_groups: usize,
    /// Byte-identical groups found
    pub duplicate_groups: usize,
    /// Bytes freed by keeping one item per group
    pub reclaimable_bytes: u64,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelinePhase::Fingerprinting => write!(f, "Fingerprinting"),
            PipelinePhase::Clustering => write!(f, "Clustering"),
            PipelinePhase::ExactMatching => write!(f, "Matching exact copies"),
            PipelinePhase::Saving => write!(f, "Saving"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_serializable() {
        let event = Event::Hash(HashEvent::Progress(HashProgress {
            completed: 16,
            total: 40,
        }));

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: Event = serde_json::from_str(&json).unwrap();

        match deserialized {
            Event::Hash(HashEvent::Progress(p)) => {
                assert_eq!(p.completed, 16);
                assert_eq!(p.total, 40);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn pipeline_summary_is_serializable() {
        let summary = PipelineSummary {
            total_items: 1000,
            hashed: 120,
            reused: 870,
            skipped: 10,
            similar_groups: 42,
            duplicate_groups: 7,
            reclaimable_bytes: 500_000_000,
            duration_ms: 5000,
        };

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("500000000"));
    }

    #[test]
    fn phase_display() {
        assert_eq!(PipelinePhase::Clustering.to_string(), "Clustering");
    }
}
