//! Archive mapping and newline-aligned chunking.
//!
//! The archive is mapped read-only and partitioned into contiguous byte
//! ranges, one per chunk group. Boundaries are snapped forward to just past
//! the next newline so every chunk is a whole-line sequence; a line is never
//! split across chunks and never duplicated.
//!
//! Invariants of [`chunk_ranges`]:
//! - The ranges are contiguous and concatenate to exactly `[0, buf.len())`.
//! - Every chunk except the last ends with `'\n'` or is empty.
//! - The last chunk always ends at `buf.len()`, so a file without a trailing
//!   newline still has its final line covered.
//!
//! Degenerate shapes are valid output: an empty file yields all-empty
//! ranges, and a single huge line lands entirely in one chunk while the
//! others come back empty.

use crate::errors::MatchError;
use memmap2::Mmap;
use std::fs::File;
use std::ops::Range;
use std::path::Path;

/// A read-only memory mapping of the archive file.
///
/// The mapping must outlive the pipeline; workers borrow line slices out of
/// it. The archive is assumed quiescent for the duration of a run; this is
/// a batch tool, and truncation by a concurrent writer is outside the
/// supported model.
#[derive(Debug)]
pub struct Archive {
    // None for zero-length files: mapping an empty file errors on some
    // platforms, and there is nothing to map anyway.
    mmap: Option<Mmap>,
}

impl Archive {
    /// Opens and maps the archive. Any failure here is fatal to the match
    /// call; the pipeline is never started on a half-open archive.
    pub fn open(path: &Path) -> Result<Self, MatchError> {
        let file = File::open(path).map_err(|e| MatchError::archive_open(path, e))?;
        let len = file
            .metadata()
            .map_err(|e| MatchError::archive_metadata(path, e))?
            .len();
        let mmap = if len == 0 {
            None
        } else {
            // SAFETY: read-only mapping of a file we just opened; see the
            // quiescence note on the type.
            Some(unsafe { Mmap::map(&file) }.map_err(|e| MatchError::archive_map(path, e))?)
        };
        Ok(Self { mmap })
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Partitions `buf` into `chunks` contiguous newline-aligned ranges.
///
/// Each boundary starts at `len / chunks` bytes past the previous one and is
/// then pushed forward to one past the next `'\n'`. See the module docs for
/// the exact coverage invariants.
///
/// # Panics
///
/// Panics if `chunks == 0`.
pub fn chunk_ranges(buf: &[u8], chunks: usize) -> Vec<Range<usize>> {
    assert!(chunks > 0, "chunk count must be > 0");

    let raw = buf.len() / chunks;
    let mut ranges = Vec::with_capacity(chunks);
    let mut pos = 0usize;

    for i in 0..chunks {
        let start = pos;
        let mut end = if i + 1 == chunks {
            buf.len()
        } else {
            (start + raw).min(buf.len())
        };

        // Snap forward so the chunk ends just past a newline. If the raw
        // boundary already sits past one, leave it alone. When no newline
        // exists ahead, the chunk collapses to empty and the remainder
        // falls through to the last chunk; only the last chunk may end at
        // `buf.len()` without a trailing newline.
        if end > start && end < buf.len() && buf[end - 1] != b'\n' {
            end = match memchr::memchr(b'\n', &buf[end..]) {
                Some(offset) => end + offset + 1,
                None => start,
            };
        }

        ranges.push(start..end);
        pos = end;
    }

    ranges
}
