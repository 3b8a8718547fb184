//! Error types for match setup and execution.
//!
//! Setup failures (archive open/map, search-list load) fail the whole call
//! before any worker starts. Record-level problems are not errors at all:
//! malformed lines are dropped silently by the parser. The enum is
//! `#[non_exhaustive]`; callers should keep a fallback match arm.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Errors surfaced by [`crate::match_archive`] and search-list loading.
#[derive(Debug)]
#[non_exhaustive]
pub enum MatchError {
    /// The archive file could not be opened.
    ArchiveOpen { path: PathBuf, source: io::Error },
    /// The archive file could not be stat'd.
    ArchiveMetadata { path: PathBuf, source: io::Error },
    /// The archive file could not be memory-mapped.
    ArchiveMap { path: PathBuf, source: io::Error },
    /// The search-list file could not be opened.
    SearchListOpen { path: PathBuf, source: io::Error },
    /// The search-list file is not a valid statement array.
    SearchListParse {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// A pipeline worker panicked; results are incomplete and discarded.
    WorkerPanicked,
}

impl MatchError {
    pub(crate) fn archive_open(path: &std::path::Path, source: io::Error) -> Self {
        Self::ArchiveOpen {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn archive_metadata(path: &std::path::Path, source: io::Error) -> Self {
        Self::ArchiveMetadata {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn archive_map(path: &std::path::Path, source: io::Error) -> Self {
        Self::ArchiveMap {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArchiveOpen { path, source } => {
                write!(f, "failed to open archive {}: {source}", path.display())
            }
            Self::ArchiveMetadata { path, source } => {
                write!(f, "failed to stat archive {}: {source}", path.display())
            }
            Self::ArchiveMap { path, source } => {
                write!(f, "failed to mmap archive {}: {source}", path.display())
            }
            Self::SearchListOpen { path, source } => {
                write!(f, "failed to open search list {}: {source}", path.display())
            }
            Self::SearchListParse { path, source } => {
                write!(f, "failed to parse search list {}: {source}", path.display())
            }
            Self::WorkerPanicked => write!(f, "a match pipeline worker panicked"),
        }
    }
}

impl std::error::Error for MatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ArchiveOpen { source, .. }
            | Self::ArchiveMetadata { source, .. }
            | Self::ArchiveMap { source, .. }
            | Self::SearchListOpen { source, .. } => Some(source),
            Self::SearchListParse { source, .. } => Some(source),
            Self::WorkerPanicked => None,
        }
    }
}
