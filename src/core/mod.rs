//! # Core Module
//!
//! The GUI-agnostic similarity engine.
//!
//! ## Modules
//! - `media` - Candidate items and the sources that supply them
//! - `fingerprint` - Persistent per-file hash cache
//! - `denial` - Pairs the user has marked as not similar
//! - `hasher` - dHash, colour histogram and the chunked hash engine
//! - `comparator` - Bucketed clustering of similar items
//! - `exact` - Byte-identical duplicate detection
//! - `results` - Result groups, the scan result cache and revalidation
//! - `pipeline` - Orchestrates a full scan pass

pub mod comparator;
pub mod denial;
pub mod exact;
pub mod fingerprint;
pub mod hasher;
pub mod media;
pub mod pipeline;
pub mod results;

// Re-export commonly used types
pub use comparator::Sensitivity;
pub use media::{MediaItem, MediaSource};
pub use pipeline::{CancellationToken, ScanOutcome, ScanPipeline};
pub use results::{LoadedScanResults, ScanResultGroup, ScanScope};
