//! Hand-written parser for the klog line format.
//!
//! The format is a fixed-offset header followed by a variable tail:
//!
//! ```text
//! Lmmdd hh:mm:ss.uuuuuu threadid dir/file:line] message
//! [------------- 29 bytes -------------]
//! ```
//!
//! `L` is the severity character, the thread id is seven characters
//! left-padded with spaces, and the bytes at offsets 5, 21, and 29 are
//! literal spaces. Everything is validated by direct byte indexing; no
//! regex, no intermediate copies. The only allocations are the two owned
//! strings in the final record.
//!
//! Rejection is silent by design: an archive is mostly noise (stack traces,
//! wrapped output, foreign formats), and unparseable lines are expected,
//! not errors.

use crate::statement::{ParsedLog, Severity};

/// Byte offset where the `dir/file:line]` section begins.
const PATH_START: usize = 30;

/// Parses one newline-stripped archive line.
///
/// Returns `None` for anything that is not a well-formed klog line. The
/// accepted grammar is deliberately strict; see the module docs and the
/// rejection tests below for the exact rules.
pub fn parse_line(line: &[u8]) -> Option<ParsedLog> {
    // The header is 30 bytes (offsets 0..=29) and the path needs at least
    // one byte after it, so anything of 29 bytes or fewer is out.
    if line.len() < PATH_START {
        return None;
    }

    // Fixed spaces first: they are the cheapest way to bail on non-klog.
    if line[5] != b' ' || line[21] != b' ' || line[29] != b' ' {
        return None;
    }

    let severity = Severity::from_wire(line[0])?;

    // mmdd
    if !matches!(line[1], b'0'..=b'1')
        || !line[2].is_ascii_digit()
        || !matches!(line[3], b'0'..=b'3')
        || !line[4].is_ascii_digit()
    {
        return None;
    }

    // hh:mm:ss.uuuuuu
    if !matches!(line[6], b'0'..=b'2') || !line[7].is_ascii_digit() {
        return None;
    }
    if line[8] != b':' {
        return None;
    }
    if !matches!(line[9], b'0'..=b'5') || !line[10].is_ascii_digit() {
        return None;
    }
    if line[11] != b':' {
        return None;
    }
    if !matches!(line[12], b'0'..=b'5') || !line[13].is_ascii_digit() {
        return None;
    }
    if line[14] != b'.' {
        return None;
    }
    if line[15..21].iter().any(|b| !b.is_ascii_digit()) {
        return None;
    }

    // Thread id: leading spaces, then digits. The transition is one-way;
    // a space after a digit is malformed.
    let mut in_digits = false;
    for &b in &line[22..29] {
        match b {
            b' ' if !in_digits => {}
            b'0'..=b'9' => in_digits = true,
            _ => return None,
        }
    }

    // dir/file: one or more path characters with exactly one '/' separating
    // a non-empty directory from a non-empty filename, terminated by ':'.
    let mut slash = None;
    let mut cursor = PATH_START;
    let colon = loop {
        if cursor == line.len() {
            return None;
        }
        match line[cursor] {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {}
            b'/' => {
                if slash.is_some() {
                    return None;
                }
                slash = Some(cursor);
            }
            b':' => break cursor,
            _ => return None,
        }
        cursor += 1;
    };
    let slash = slash?;
    if slash == PATH_START || slash + 1 == colon {
        return None;
    }

    // Line number: one or more decimal digits terminated by ']'.
    let digits_start = colon + 1;
    let mut line_number: u32 = 0;
    let mut cursor = digits_start;
    let bracket = loop {
        if cursor == line.len() {
            return None;
        }
        match line[cursor] {
            b']' => break cursor,
            b @ b'0'..=b'9' => {
                line_number = line_number
                    .checked_mul(10)?
                    .checked_add((b - b'0') as u32)?;
            }
            _ => return None,
        }
        cursor += 1;
    };
    if bracket == digits_start {
        return None;
    }

    // A single space separates the header from the message.
    let space = bracket + 1;
    if space >= line.len() || line[space] != b' ' {
        return None;
    }

    // Path characters are validated ASCII above, so this cannot fail.
    let source_file = std::str::from_utf8(&line[PATH_START..colon]).ok()?.to_owned();
    let message = String::from_utf8_lossy(&line[space + 1..]).into_owned();

    Some(ParsedLog {
        source_file,
        line_number,
        severity,
        message,
    })
}

/// Parses one line in JSON-wrapped mode: the line is a JSON object and the
/// klog payload lives in `field` as a string.
///
/// Lines that are not JSON objects, lack the field, or hold a non-string
/// there are dropped like any other unparseable line.
pub fn parse_json_wrapped(line: &[u8], field: &str) -> Option<ParsedLog> {
    let value: serde_json::Value = serde_json::from_slice(line).ok()?;
    let payload = value.get(field)?.as_str()?;
    parse_line(payload.as_bytes())
}

/// Dispatches between plain and JSON-wrapped parsing.
///
/// The JSON branch exists only when a field is configured, so plain-mode
/// throughput never pays for it.
#[inline]
pub(crate) fn parse_record(line: &[u8], json_field: Option<&str>) -> Option<ParsedLog> {
    match json_field {
        None => parse_line(line),
        Some(field) => parse_json_wrapped(line, field),
    }
}
