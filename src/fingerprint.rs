//! The call-site fingerprint: a SHA-1 over `(short_path, line, severity)`.
//!
//! Both sides of the match compute the same digest: the search map hashes
//! each statement's short path, the matcher hashes each parsed record's wire
//! path verbatim (it is already short). Equal triples therefore produce
//! equal fingerprints regardless of which side they came from.
//!
//! The hash input is the plain concatenation of the short path, the decimal
//! line number, and the decimal severity ordinal, with no separators. That
//! leaves a theoretical field-boundary ambiguity (`"foo.go1" + "2"` vs
//! `"foo.go" + "12"`), but the encoding is frozen for compatibility with
//! persisted search lists. Do not add separators.

use crate::statement::{LogStatement, ParsedLog, Severity};
use sha1::{Digest, Sha1};
use std::fmt;

/// A 20-byte SHA-1 digest identifying one call-site triple.
///
/// Rendered as lowercase hex at display boundaries only; comparisons and
/// map keys use the raw bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 20]);

impl Fingerprint {
    /// Hashes one `(short_path, line_number, severity)` triple.
    ///
    /// `short_path` must already be in short form; statements go through
    /// [`LogStatement::fingerprint`] which normalizes first.
    pub fn compute(short_path: &str, line_number: u32, severity: Severity) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(short_path.as_bytes());
        let mut digits = [0u8; 10];
        hasher.update(format_decimal(&mut digits, line_number));
        // The ordinal is 0..=3, always a single decimal digit.
        hasher.update([b'0' + severity.ordinal()]);
        Self(hasher.finalize().into())
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Lowercase hex form, the interchange encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; 20]> for Fingerprint {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl LogStatement {
    /// Fingerprint over the statement's *short* source path.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::compute(self.short_source_file(), self.line_number, self.severity)
    }
}

impl ParsedLog {
    /// Fingerprint over the wire path verbatim.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::compute(&self.source_file, self.line_number, self.severity)
    }
}

/// Formats `value` as decimal ASCII into a stack buffer.
///
/// Fingerprints are computed once per parsed record, so this path must not
/// allocate. Ten bytes hold any `u32`.
fn format_decimal(buf: &mut [u8; 10], mut value: u32) -> &[u8] {
    let mut pos = buf.len();
    loop {
        pos -= 1;
        buf[pos] = b'0' + (value % 10) as u8;
        value /= 10;
        if value == 0 {
            break;
        }
    }
    &buf[pos..]
}
