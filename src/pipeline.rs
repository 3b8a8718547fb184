//! The Match pipeline: fan-out over archive chunks, fan-in of match tables.
//!
//! # Architecture
//!
//! ```text
//! mmap ─► chunk_ranges ─► G chunk groups
//!
//! per group g:
//!   producer(chunk g) ──► bounded(lines) ──► parsers ──► bounded(records) ──► matchers
//!                                            (W/G per group)                 (W/G per group)
//!
//! matchers ─► per-worker Matches, joined ─► MatchResults
//! ```
//!
//! W workers default to the CPU count; the chunk count is G = max(1, W / 4).
//! Parsers and matchers are assigned to groups round-robin so each group's
//! queues are shared by W/G threads of each stage.
//!
//! # Termination
//!
//! Close coordination is sender-drop. Each producer owns its group's only
//! line sender and drops it on chunk exhaustion; the group's parsers drain
//! and exit. Each parser owns a clone of the group's record sender, so the
//! record queue disconnects exactly when the last parser of the group
//! exits. The matchers drain to disconnect and return their local tables
//! through their join handles. No close arbiter, no sentinel messages.
//!
//! # State
//!
//! The mapped archive and the search map are shared read-only borrows
//! (workers are scoped threads). The two result counters are atomics owned
//! by the invocation, so concurrent and repeated `match_archive` calls are
//! fully independent. Match buckets stay worker-local until the caller
//! aggregates them.

use crate::chunker::{chunk_ranges, Archive};
use crate::errors::MatchError;
use crate::parser::parse_record;
use crate::search_map::SearchMap;
use crate::statement::{ParsedLog, StatementId};
use ahash::AHashMap;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

/// Per-worker match table: call-site identity to the records that hit it,
/// in append order.
pub type Matches = AHashMap<StatementId, Vec<ParsedLog>>;

/// Default ratio of workers to chunk groups.
const WORKERS_PER_GROUP: usize = 4;

/// Tuning for one match run.
#[derive(Clone, Debug)]
pub struct MatchConfig {
    /// Worker thread count per stage. 0 means auto (available parallelism).
    pub workers: usize,
    /// Workers sharing one chunk group's queues. G = max(1, workers / this).
    pub workers_per_group: usize,
    /// Capacity of each bounded queue. 0 means auto (= workers).
    pub queue_capacity: usize,
    /// When set, each archive line is a JSON object and the klog payload is
    /// read from this field.
    pub json_field: Option<String>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            workers_per_group: WORKERS_PER_GROUP,
            queue_capacity: 0,
            json_field: None,
        }
    }
}

impl MatchConfig {
    fn resolved_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        thread::available_parallelism().map_or(1, |n| n.get())
    }

    /// Validate tuning values.
    ///
    /// # Panics
    ///
    /// Panics if `workers_per_group` is 0.
    fn validate(&self) {
        assert!(self.workers_per_group > 0, "workers_per_group must be > 0");
    }
}

/// Output of one match run: per-worker tables plus the two run counters.
///
/// `matches` is one table per matcher worker, in no particular order; feed
/// it to [`crate::analyze::aggregate_results`]. The counters satisfy
/// `num_matched + num_not_matched == lines that parsed`, and the sum of all
/// bucket lengths equals `num_matched`.
#[derive(Debug, Default)]
pub struct MatchResults {
    pub matches: Vec<Matches>,
    pub num_matched: u64,
    pub num_not_matched: u64,
}

/// Run counters scoped to a single invocation.
#[derive(Debug, Default)]
struct MatchCounters {
    matched: AtomicU64,
    not_matched: AtomicU64,
}

/// Matches an on-disk archive against a search map.
///
/// Setup failures (open, stat, mmap) return an error before any worker
/// starts. After that the run is all-or-nothing: it drains the archive to
/// completion, and a worker panic surfaces as
/// [`MatchError::WorkerPanicked`] once the pipeline has unwound.
pub fn match_archive(
    search: &SearchMap,
    archive: impl AsRef<Path>,
    cfg: &MatchConfig,
) -> Result<MatchResults, MatchError> {
    cfg.validate();

    let archive = Archive::open(archive.as_ref())?;
    let buf = archive.as_bytes();
    if buf.is_empty() {
        // Equivalent to G empty chunks; skip the thread machinery.
        return Ok(MatchResults::default());
    }

    let workers = cfg.resolved_workers();
    let groups = (workers / cfg.workers_per_group).max(1);
    let capacity = if cfg.queue_capacity > 0 {
        cfg.queue_capacity
    } else {
        workers
    };

    let chunks = chunk_ranges(buf, groups);
    let counters = MatchCounters::default();
    let json_field = cfg.json_field.as_deref();

    let per_worker: Result<Vec<Matches>, ()> = thread::scope(|s| {
        let mut line_txs = Vec::with_capacity(groups);
        let mut line_rxs = Vec::with_capacity(groups);
        let mut record_txs = Vec::with_capacity(groups);
        let mut record_rxs = Vec::with_capacity(groups);
        for _ in 0..groups {
            let (tx, rx) = bounded::<&[u8]>(capacity);
            line_txs.push(tx);
            line_rxs.push(rx);
            let (tx, rx) = bounded::<ParsedLog>(capacity);
            record_txs.push(tx);
            record_rxs.push(rx);
        }

        // One producer per chunk; it takes the group's only line sender.
        let mut stage_handles = Vec::with_capacity(groups + workers);
        for (range, lines) in chunks.iter().zip(line_txs) {
            let chunk = &buf[range.clone()];
            stage_handles.push(s.spawn(move || produce_lines(chunk, lines)));
        }

        for w in 0..workers {
            let lines = line_rxs[w % groups].clone();
            let records = record_txs[w % groups].clone();
            stage_handles.push(s.spawn(move || parse_lines(lines, records, json_field)));
        }
        // Parsers hold the only record senders from here on; their exits
        // close the record queues.
        drop(record_txs);
        drop(line_rxs);

        let counters = &counters;
        let matcher_handles: Vec<_> = (0..workers)
            .map(|w| {
                let records = record_rxs[w % groups].clone();
                s.spawn(move || match_records(search, records, counters))
            })
            .collect();
        drop(record_rxs);

        // Join everything; a panic in any stage poisons the run.
        let mut ok = true;
        for handle in stage_handles {
            ok &= handle.join().is_ok();
        }
        let mut tables = Vec::with_capacity(workers);
        for handle in matcher_handles {
            match handle.join() {
                Ok(table) => tables.push(table),
                Err(_) => ok = false,
            }
        }
        if ok {
            Ok(tables)
        } else {
            Err(())
        }
    });

    let matches = per_worker.map_err(|()| MatchError::WorkerPanicked)?;
    Ok(MatchResults {
        matches,
        num_matched: counters.matched.load(Ordering::Relaxed),
        num_not_matched: counters.not_matched.load(Ordering::Relaxed),
    })
}

/// Line producer: splits one chunk into newline-stripped line slices.
///
/// Empty lines are forwarded; the parser rejects them. A send failure means
/// the consumers are gone (a downstream panic), so the producer just stops.
fn produce_lines<'buf>(chunk: &'buf [u8], lines: Sender<&'buf [u8]>) {
    let mut start = 0;
    for nl in memchr::memchr_iter(b'\n', chunk) {
        if lines.send(&chunk[start..nl]).is_err() {
            return;
        }
        start = nl + 1;
    }
    // Final line of a chunk without a trailing newline.
    if start < chunk.len() {
        let _ = lines.send(&chunk[start..]);
    }
}

/// Parser stage: raw lines in, parsed records out, rejects dropped.
fn parse_lines(lines: Receiver<&[u8]>, records: Sender<ParsedLog>, json_field: Option<&str>) {
    for line in lines.iter() {
        if let Some(record) = parse_record(line, json_field) {
            if records.send(record).is_err() {
                return;
            }
        }
    }
}

/// Matcher stage: fingerprint each record, bucket hits, count everything.
fn match_records(
    search: &SearchMap,
    records: Receiver<ParsedLog>,
    counters: &MatchCounters,
) -> Matches {
    let mut local = Matches::default();
    for record in records.iter() {
        match search.get(&record.fingerprint()) {
            Some(id) => {
                local.entry(id).or_default().push(record);
                counters.matched.fetch_add(1, Ordering::Relaxed);
            }
            None => {
                counters.not_matched.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
    local
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::{LogStatement, Severity};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE_LINE: &str =
        "I1105 13:30:39.614388  739568 queueset/queueset.go:488] Sample Text\n";

    fn sample_search_map() -> SearchMap {
        let stmt = LogStatement {
            source_file: "k8s.io/apiserver/pkg/util/flowcontrol/fairqueuing/queueset/queueset.go"
                .into(),
            line_number: 488,
            severity: Severity::Info,
            verbosity: None,
            format_string: "Sample".into(),
        };
        let (map, collisions) = SearchMap::build(vec![stmt]);
        assert!(collisions.is_empty());
        map
    }

    fn write_archive(contents: &[u8]) -> NamedTempFile {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(contents).unwrap();
        tmp.flush().unwrap();
        tmp
    }

    fn small_config() -> MatchConfig {
        MatchConfig {
            workers: 4,
            workers_per_group: 2,
            queue_capacity: 4,
            json_field: None,
        }
    }

    fn total_hits(results: &MatchResults) -> u64 {
        results
            .matches
            .iter()
            .flat_map(|m| m.values())
            .map(|hits| hits.len() as u64)
            .sum()
    }

    #[test]
    fn single_line_matches() {
        let map = sample_search_map();
        let archive = write_archive(SAMPLE_LINE.as_bytes());

        let results = match_archive(&map, archive.path(), &small_config()).unwrap();
        assert_eq!(results.num_matched, 1);
        assert_eq!(results.num_not_matched, 0);
        assert_eq!(total_hits(&results), 1);

        let hits: Vec<_> = results
            .matches
            .iter()
            .flat_map(|m| m.values())
            .flatten()
            .collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].message, "Sample Text");
        assert_eq!(hits[0].source_file, "queueset/queueset.go");
    }

    #[test]
    fn severity_mismatch_does_not_match() {
        let stmt = LogStatement {
            source_file: "queueset/queueset.go".into(),
            line_number: 488,
            severity: Severity::Error,
            verbosity: None,
            format_string: String::new(),
        };
        let (map, _) = SearchMap::build(vec![stmt]);
        let archive = write_archive(SAMPLE_LINE.as_bytes());

        let results = match_archive(&map, archive.path(), &small_config()).unwrap();
        assert_eq!(results.num_matched, 0);
        assert_eq!(results.num_not_matched, 1);
    }

    #[test]
    fn unparseable_line_counts_in_neither_bucket() {
        let map = sample_search_map();
        let archive = write_archive(b"not a klog line\n");

        let results = match_archive(&map, archive.path(), &small_config()).unwrap();
        assert_eq!(results.num_matched, 0);
        assert_eq!(results.num_not_matched, 0);
    }

    #[test]
    fn empty_archive_yields_empty_results() {
        let map = sample_search_map();
        let archive = write_archive(b"");

        let results = match_archive(&map, archive.path(), &small_config()).unwrap();
        assert_eq!(results.num_matched, 0);
        assert_eq!(results.num_not_matched, 0);
        assert!(results.matches.is_empty());
    }

    #[test]
    fn chunk_boundaries_neither_drop_nor_duplicate_lines() {
        let map = sample_search_map();
        let mut contents = Vec::new();
        for _ in 0..1000 {
            contents.extend_from_slice(SAMPLE_LINE.as_bytes());
        }
        let archive = write_archive(&contents);

        // 16 workers over groups of 4 forces 4 chunks.
        let cfg = MatchConfig {
            workers: 16,
            workers_per_group: 4,
            queue_capacity: 16,
            json_field: None,
        };
        let results = match_archive(&map, archive.path(), &cfg).unwrap();
        assert_eq!(results.num_matched, 1000);
        assert_eq!(results.num_not_matched, 0);
        assert_eq!(total_hits(&results), 1000);
    }

    #[test]
    fn mixed_archive_counts_add_up() {
        let map = sample_search_map();
        let mut contents = Vec::new();
        contents.extend_from_slice(SAMPLE_LINE.as_bytes());
        contents.extend_from_slice(b"garbage\n");
        contents
            .extend_from_slice(b"W1105 13:30:39.614388  739568 other/file.go:12] unknown site\n");
        contents.extend_from_slice(SAMPLE_LINE.as_bytes());
        contents.extend_from_slice(b"\n");
        let archive = write_archive(&contents);

        let results = match_archive(&map, archive.path(), &small_config()).unwrap();
        // Three lines parsed: two hits, one miss. Garbage and the empty
        // line never reach the counters.
        assert_eq!(results.num_matched, 2);
        assert_eq!(results.num_not_matched, 1);
        assert_eq!(total_hits(&results), results.num_matched);
    }

    #[test]
    fn json_wrapped_mode_matches_like_plain() {
        let map = sample_search_map();
        let wrapped = format!("{{\"log\":\"{}\"}}\n", SAMPLE_LINE.trim_end_matches('\n'));
        let archive = write_archive(wrapped.as_bytes());

        let cfg = MatchConfig {
            json_field: Some("log".into()),
            ..small_config()
        };
        let results = match_archive(&map, archive.path(), &cfg).unwrap();
        assert_eq!(results.num_matched, 1);
        assert_eq!(results.num_not_matched, 0);

        // Without the field configured the same archive is pure noise.
        let results = match_archive(&map, archive.path(), &small_config()).unwrap();
        assert_eq!(results.num_matched, 0);
        assert_eq!(results.num_not_matched, 0);
    }

    #[test]
    fn archive_without_trailing_newline_keeps_final_line() {
        let map = sample_search_map();
        let mut contents = Vec::new();
        contents.extend_from_slice(SAMPLE_LINE.as_bytes());
        contents.extend_from_slice(SAMPLE_LINE.trim_end_matches('\n').as_bytes());
        let archive = write_archive(&contents);

        let results = match_archive(&map, archive.path(), &small_config()).unwrap();
        assert_eq!(results.num_matched, 2);
    }

    #[test]
    fn repeated_runs_are_independent() {
        // The counters live in the invocation, not the process; a second
        // run must not see the first run's totals.
        let map = sample_search_map();
        let mut contents = Vec::new();
        for _ in 0..10 {
            contents.extend_from_slice(SAMPLE_LINE.as_bytes());
        }
        let archive = write_archive(&contents);

        let first = match_archive(&map, archive.path(), &small_config()).unwrap();
        let second = match_archive(&map, archive.path(), &small_config()).unwrap();
        assert_eq!(first.num_matched, 10);
        assert_eq!(second.num_matched, 10);
        assert_eq!(first.num_not_matched, 0);
        assert_eq!(second.num_not_matched, 0);
    }

    #[test]
    fn single_worker_single_group_still_works() {
        let map = sample_search_map();
        let mut contents = Vec::new();
        for _ in 0..50 {
            contents.extend_from_slice(SAMPLE_LINE.as_bytes());
        }
        let archive = write_archive(&contents);

        let cfg = MatchConfig {
            workers: 1,
            workers_per_group: 4,
            queue_capacity: 1,
            json_field: None,
        };
        let results = match_archive(&map, archive.path(), &cfg).unwrap();
        assert_eq!(results.num_matched, 50);
    }

    #[test]
    fn missing_archive_is_a_setup_failure() {
        let map = sample_search_map();
        let err = match_archive(&map, "/nonexistent/archive.log", &small_config()).unwrap_err();
        assert!(matches!(err, MatchError::ArchiveOpen { .. }));
    }
}
