//! Search-list loading and the fingerprint index.
//!
//! The search list is the indexer's output: a JSON array of call-sites. At
//! load time every statement is fingerprinted once and installed in a
//! fingerprint-keyed map. Duplicate fingerprints are *collisions*: the first
//! statement wins, the rest are reported back to the caller and discarded.
//! Retained statements get a dense [`StatementId`], which is the identity
//! that match buckets and reports key on.

use crate::errors::MatchError;
use crate::fingerprint::Fingerprint;
use crate::statement::{LogStatement, StatementId};
use ahash::AHashMap;
use std::collections::hash_map::Entry;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Fingerprint index over the retained statements of one search list.
///
/// Read-only after construction; shared freely across matcher workers.
#[derive(Debug, Default)]
pub struct SearchMap {
    statements: Vec<LogStatement>,
    by_fingerprint: AHashMap<Fingerprint, StatementId>,
}

/// One fingerprint claimed by more than one search-list entry.
///
/// `statements[0]` is the entry that was retained; the rest were discarded.
#[derive(Clone, Debug)]
pub struct FingerprintCollision {
    pub fingerprint: Fingerprint,
    pub statements: Vec<LogStatement>,
}

impl SearchMap {
    /// Builds the map, resolving collisions first-wins.
    ///
    /// Collisions are a warning, not an error: the caller decides whether to
    /// print them. Each reported collision lists the retained statement
    /// first, then every discarded duplicate in list order.
    pub fn build(list: Vec<LogStatement>) -> (Self, Vec<FingerprintCollision>) {
        let mut statements = Vec::with_capacity(list.len());
        let mut by_fingerprint = AHashMap::with_capacity(list.len());
        let mut collisions: Vec<FingerprintCollision> = Vec::new();
        let mut collision_slots: AHashMap<Fingerprint, usize> = AHashMap::new();

        for stmt in list {
            let fp = stmt.fingerprint();
            match by_fingerprint.entry(fp) {
                Entry::Vacant(slot) => {
                    slot.insert(StatementId(statements.len() as u32));
                    statements.push(stmt);
                }
                Entry::Occupied(existing) => {
                    let retained = *existing.get();
                    let slot = *collision_slots.entry(fp).or_insert_with(|| {
                        collisions.push(FingerprintCollision {
                            fingerprint: fp,
                            statements: vec![statements[retained.0 as usize].clone()],
                        });
                        collisions.len() - 1
                    });
                    collisions[slot].statements.push(stmt);
                }
            }
        }

        (
            Self {
                statements,
                by_fingerprint,
            },
            collisions,
        )
    }

    /// Number of retained (unique-fingerprint) statements.
    #[inline]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Looks up the call-site identity for a fingerprint.
    #[inline]
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<StatementId> {
        self.by_fingerprint.get(fingerprint).copied()
    }

    /// The retained statement behind an id.
    ///
    /// # Panics
    ///
    /// Panics if `id` did not come from this map.
    #[inline]
    pub fn statement(&self, id: StatementId) -> &LogStatement {
        &self.statements[id.0 as usize]
    }

    /// Iterates retained statements in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (StatementId, &LogStatement)> {
        self.statements
            .iter()
            .enumerate()
            .map(|(i, stmt)| (StatementId(i as u32), stmt))
    }
}

/// Loads a search list from a JSON array file.
pub fn load_search_list(path: impl AsRef<Path>) -> Result<Vec<LogStatement>, MatchError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| MatchError::SearchListOpen {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| MatchError::SearchListParse {
        path: path.to_path_buf(),
        source,
    })
}
