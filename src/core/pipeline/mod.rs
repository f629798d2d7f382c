//! # Pipeline Module
//!
//! Orchestrates one scan pass over a candidate list.
//!
//! ## Stages
//! 1. **Fingerprint** - hash items whose stored fingerprint is missing or
//!    stale, reuse the rest
//! 2. **Cluster** - group look-alike images and videos
//! 3. **Match** - group byte-identical files (optional)
//! 4. **Persist** - save groups and unscannable files for the scope
//!
//! Stored fingerprints whose file is no longer a candidate are purged at
//! the end of the pass.
//!
//! ## Cancellation
//! A [`CancellationToken`] is checked between hashing chunks and before
//! each item. Fingerprints finished before cancellation are kept, so the
//! next scan resumes where this one stopped.

mod cancel;
mod executor;

pub use cancel::CancellationToken;
pub use executor::{PipelineBuilder, PipelineConfig, ScanOutcome, ScanPipeline};
