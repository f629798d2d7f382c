//! # Media Similarity
//!
//! Finds duplicate and look-alike photos and videos, and remembers what it
//! found.
//!
//! ## Core Philosophy
//! - **Never auto-delete** - the engine decides which files match, never
//!   what happens to them
//! - **Incremental** - unchanged files are never decoded twice
//! - **Trust but verify** - cached results are checked against the disk
//!   before they are shown
//!
//! ## Architecture
//! - `core` - The detection, clustering and caching engine
//! - `events` - Event-driven progress reporting (GUI-ready)
//! - `error` - Error types
//! - `cli` - Command-line interface (binary only)

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{EngineError, Result};

/// Install a `RUST_LOG`-driven tracing subscriber.
///
/// Call once from the application entry point. A second call leaves the
/// first subscriber in place.
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
