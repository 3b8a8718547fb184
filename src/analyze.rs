//! Aggregation, coverage analysis, and ranking of match tables.
//!
//! Everything here is single-threaded post-processing: the pipeline hands
//! over per-worker tables, and this module folds them, derives the
//! severity/verbosity coverage breakdown against the original search map,
//! and produces the ranked hit list.

use crate::pipeline::Matches;
use crate::search_map::SearchMap;
use crate::statement::{ParsedLog, Severity, StatementId};
use std::collections::BTreeMap;

/// Hit/missed tally for one bucket of the analysis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HitCount {
    pub hit: u64,
    pub missed: u64,
}

impl HitCount {
    #[inline]
    fn record(&mut self, hit: bool) {
        if hit {
            self.hit += 1;
        } else {
            self.missed += 1;
        }
    }

    #[inline]
    pub fn total(&self) -> u64 {
        self.hit + self.missed
    }

    /// `hit / (hit + missed) * 100`. NaN for an empty bucket; suppressing
    /// empty buckets is the report layer's job.
    pub fn percent_hit(&self) -> f64 {
        self.hit as f64 / self.total() as f64 * 100.0
    }
}

/// Coverage breakdown over a whole search map.
///
/// Info and Error call-sites are additionally bucketed by verbosity, keyed
/// by the gate level with [`crate::statement::NO_VERBOSITY`] (-1) for
/// ungated sites. `BTreeMap` keeps verbosity iteration order deterministic
/// for reporting.
#[derive(Clone, Debug, Default)]
pub struct AnalyzeResult {
    pub total: HitCount,
    pub info: BTreeMap<i32, HitCount>,
    pub warning: HitCount,
    pub error: BTreeMap<i32, HitCount>,
    pub fatal: HitCount,
}

/// One row of the ranked hit list.
#[derive(Clone, Debug)]
pub struct MatchEntry {
    pub statement: StatementId,
    pub hits: Vec<ParsedLog>,
}

impl MatchEntry {
    #[inline]
    pub fn hit_count(&self) -> usize {
        self.hits.len()
    }
}

/// Folds per-worker tables into one, keyed by call-site identity.
///
/// The fold is append-or-install per key, so it is associative and
/// commutative over inputs up to bucket ordering; total counts never depend
/// on worker or merge order.
pub fn aggregate_results(per_worker: Vec<Matches>) -> Matches {
    let mut tables = per_worker.into_iter();
    let mut aggregate = tables.next().unwrap_or_default();
    for table in tables {
        for (id, mut hits) in table {
            aggregate.entry(id).or_default().append(&mut hits);
        }
    }
    aggregate
}

/// Walks the search map and tallies hits and misses per bucket.
///
/// A statement counts as hit when its aggregate bucket exists and is
/// non-empty; an absent bucket and an empty one are the same miss.
pub fn analyze_matches(search: &SearchMap, aggregate: &Matches) -> AnalyzeResult {
    let mut result = AnalyzeResult::default();
    for (id, stmt) in search.iter() {
        let hit = aggregate.get(&id).is_some_and(|hits| !hits.is_empty());
        result.total.record(hit);
        match stmt.severity {
            Severity::Info => result
                .info
                .entry(stmt.verbosity_or_sentinel())
                .or_default()
                .record(hit),
            Severity::Warning => result.warning.record(hit),
            Severity::Error => result
                .error
                .entry(stmt.verbosity_or_sentinel())
                .or_default()
                .record(hit),
            Severity::Fatal => result.fatal.record(hit),
        }
    }
    result
}

/// Ranks call-sites by hit count, descending.
///
/// Ties break by source file descending, then line number and severity
/// descending, which makes the order total and deterministic regardless of
/// hash-map iteration order.
pub fn sort_matches(search: &SearchMap, aggregate: Matches) -> Vec<MatchEntry> {
    let mut entries: Vec<MatchEntry> = aggregate
        .into_iter()
        .map(|(statement, hits)| MatchEntry { statement, hits })
        .collect();

    entries.sort_unstable_by(|a, b| {
        let (sa, sb) = (search.statement(a.statement), search.statement(b.statement));
        b.hits
            .len()
            .cmp(&a.hits.len())
            .then_with(|| sb.source_file.cmp(&sa.source_file))
            .then_with(|| sb.line_number.cmp(&sa.line_number))
            .then_with(|| sb.severity.cmp(&sa.severity))
    });

    entries
}

/// Call-sites with no hits at all, as empty buckets.
///
/// Feeds the "show me what never fired" half of the report.
pub fn find_missed(search: &SearchMap, aggregate: &Matches) -> Matches {
    let mut missed = Matches::default();
    for (id, _) in search.iter() {
        if !aggregate.get(&id).is_some_and(|hits| !hits.is_empty()) {
            missed.insert(id, Vec::new());
        }
    }
    missed
}
