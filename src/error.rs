//! Typed errors for the directory diff core.
//!
//! Mirrors the teacher's split between `thiserror`-derived errors for
//! conditions a caller might match on and `anyhow::Result` at the
//! application boundary for everything else.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal or typed errors raised by the diff core (spec.md §7).
///
/// Non-fatal scan/comparison errors never become a `DiffError` — they are
/// recorded on the affected node/`comparison_errors` map instead and the
/// owning worker loop continues.
#[derive(Debug, Error)]
pub enum DiffError {
    #[error("root directory unreadable: {path}: {source}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read directory {path}: {source}")]
    ScanIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to compare files {left} and {right}: {source}")]
    CompareIo {
        left: PathBuf,
        right: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
