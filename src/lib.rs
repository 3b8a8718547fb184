//! Log-coverage matching for klog-style archives.
//!
//! Given a *search list* of known log call-sites (extracted from source by
//! an indexer) and a multi-gigabyte archive of emitted log lines, this crate
//! answers: which call-sites actually fired, and how often?
//!
//! The archive side is built for throughput:
//! - The file is memory-mapped and split into newline-aligned chunks.
//! - A hand-written byte-level parser (no regex) turns lines into records.
//! - A fan-out pipeline of producers, parsers, and matchers runs the chunks
//!   in parallel over bounded queues; results fan back in as per-worker
//!   match tables.
//! - Matching keys on a SHA-1 *fingerprint* of `(short_path, line,
//!   severity)`, the only identity both the source index and the wire
//!   format can agree on.
//!
//! # Flow
//!
//! ```text
//! search list ──► SearchMap (fingerprint index, collisions reported)
//! archive ──► mmap ──► chunks ──► {lines ──► records ──► buckets}×W
//!                                      └──► MatchResults ──► aggregate
//!                                                            analyze / rank
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use klogmatch::{
//!     aggregate_results, analyze_matches, load_search_list, match_archive,
//!     sort_matches, MatchConfig, SearchMap,
//! };
//!
//! let list = load_search_list("search-list.json")?;
//! let (map, collisions) = SearchMap::build(list);
//! for c in &collisions {
//!     eprintln!("duplicate fingerprint {}", c.fingerprint);
//! }
//!
//! let results = match_archive(&map, "archive.log", &MatchConfig::default())?;
//! let aggregate = aggregate_results(results.matches);
//! let analysis = analyze_matches(&map, &aggregate);
//! let ranked = sort_matches(&map, aggregate);
//! ```
//!
//! The CLI, the source indexer, and report formatting live elsewhere; this
//! crate is the matching engine they share.

pub mod analyze;
pub mod chunker;
pub mod errors;
pub mod fingerprint;
pub mod parser;
pub mod pipeline;
pub mod search_map;
pub mod statement;

pub use analyze::{
    aggregate_results, analyze_matches, find_missed, sort_matches, AnalyzeResult, HitCount,
    MatchEntry,
};
pub use chunker::{chunk_ranges, Archive};
pub use errors::MatchError;
pub use fingerprint::Fingerprint;
pub use parser::{parse_json_wrapped, parse_line};
pub use pipeline::{match_archive, MatchConfig, MatchResults, Matches};
pub use search_map::{load_search_list, FingerprintCollision, SearchMap};
pub use statement::{LogStatement, ParsedLog, Severity, StatementId, NO_VERBOSITY};
