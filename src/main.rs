//! # media-dedup CLI
//!
//! Command-line front end for the media similarity engine.
//!
//! ## Usage
//! ```bash
//! media-dedup scan ~/Pictures --sensitivity loose
//! media-dedup load --output json
//! ```

mod cli;

use media_similarity::Result;

fn main() -> Result<()> {
    media_similarity::init_tracing();
    cli::run()
}
