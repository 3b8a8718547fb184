//! Core data model: call-sites, parsed records, and severity.
//!
//! A `LogStatement` is a call-site extracted from source by the indexer and
//! consumed here read-only. A `ParsedLog` is one archive line after the
//! grammar in [`crate::parser`] has accepted it. The two meet through the
//! fingerprint in [`crate::fingerprint`], which keys on the *short path*
//! (the last two path components) because that is the only path form the
//! archive ever carries.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Log severity with fixed ordinals matching the search-list wire format.
///
/// The ordinal participates in fingerprinting as its decimal ASCII form, so
/// the discriminant values are load-bearing and must not be reordered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum Severity {
    Info = 0,
    Warning = 1,
    Error = 2,
    Fatal = 3,
}

impl Severity {
    /// Numeric ordinal (0..=3).
    #[inline]
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Maps a wire-format severity character (`I`/`W`/`E`/`F`).
    #[inline]
    pub fn from_wire(c: u8) -> Option<Self> {
        match c {
            b'I' => Some(Self::Info),
            b'W' => Some(Self::Warning),
            b'E' => Some(Self::Error),
            b'F' => Some(Self::Fatal),
            _ => None,
        }
    }

    /// The single-character wire form.
    #[inline]
    pub fn as_char(self) -> char {
        match self {
            Self::Info => 'I',
            Self::Warning => 'W',
            Self::Error => 'E',
            Self::Fatal => 'F',
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "I",
            Self::Warning => "W",
            Self::Error => "E",
            Self::Fatal => "F",
        })
    }
}

/// Error for out-of-range severity ordinals in search-list input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidSeverity(pub u8);

impl fmt::Display for InvalidSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid severity ordinal: {} (expected 0..=3)", self.0)
    }
}

impl std::error::Error for InvalidSeverity {}

impl TryFrom<u8> for Severity {
    type Error = InvalidSeverity;

    fn try_from(value: u8) -> Result<Self, InvalidSeverity> {
        // Spelled `Severity::` because `Self::Error` would be ambiguous with
        // the associated error type in this impl.
        match value {
            0 => Ok(Severity::Info),
            1 => Ok(Severity::Warning),
            2 => Ok(Severity::Error),
            3 => Ok(Severity::Fatal),
            other => Err(InvalidSeverity(other)),
        }
    }
}

impl From<Severity> for u8 {
    fn from(value: Severity) -> Self {
        value as u8
    }
}

/// Verbosity sentinel for call-sites without a verbosity gate.
pub const NO_VERBOSITY: i32 = -1;

/// A log-emission call-site, as produced by the source indexer.
///
/// `source_file` is relative to the indexer's working directory and is
/// normalized to its short form only when fingerprinting. Within a search
/// list the triple `(short_path, line_number, severity)` is intended to be
/// unique; duplicates are collisions, resolved first-wins at map build time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogStatement {
    pub source_file: String,
    pub line_number: u32,
    pub severity: Severity,
    /// Present only for verbosity-gated call-sites (`V(n).Info(...)` style).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbosity: Option<i32>,
    /// Carried through for reporting; never participates in matching.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub format_string: String,
}

impl LogStatement {
    /// The short form of `source_file`: `parent_dir/file`.
    #[inline]
    pub fn short_source_file(&self) -> &str {
        short_path(&self.source_file)
    }

    /// Verbosity with the `-1` sentinel applied.
    #[inline]
    pub fn verbosity_or_sentinel(&self) -> i32 {
        self.verbosity.unwrap_or(NO_VERBOSITY)
    }
}

/// One archive line after parsing.
///
/// `source_file` is the path exactly as it appeared on the wire, which is
/// already the short form. All fields are owned copies; nothing in a
/// `ParsedLog` borrows the archive mapping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedLog {
    pub source_file: String,
    pub line_number: u32,
    pub severity: Severity,
    /// Remainder of the line after the header; display only.
    pub message: String,
}

/// Dense identity of a retained call-site inside a [`crate::SearchMap`].
///
/// Match buckets key on this, not on the fingerprint: fingerprint collisions
/// in the search list are already resolved to a single statement at load
/// time, so one id is one call-site.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatementId(pub u32);

/// Reduces a path to its last two `/`-separated components.
///
/// `a/b/c.go` becomes `b/c.go`; paths with at most one separator are
/// returned verbatim. The result is always a suffix of the input, so this
/// borrows instead of allocating.
pub fn short_path(path: &str) -> &str {
    let bytes = path.as_bytes();
    match memchr::memrchr(b'/', bytes) {
        None => path,
        Some(last) => match memchr::memrchr(b'/', &bytes[..last]) {
            None => path,
            Some(prev) => &path[prev + 1..],
        },
    }
}
