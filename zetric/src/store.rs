//! Ordered-set store abstraction and the in-memory reference backend.
//!
//! A [`ScoreStore`] is one ordered collection per key: entries are
//! (score, payload) pairs sorted by score. This is the shape of a Redis
//! sorted set, reduced to the operations the metric store actually needs.
//!
//! Two implementations ship with the crate:
//!
//! - [`MemoryStore`] — in-process reference backend, used by the test suite
//!   and usable as an embedded store.
//! - [`RedisStore`](crate::RedisStore) — real backend over Redis sorted
//!   sets, behind the `redis-backend` feature.
//!
//! # Upsert contract
//!
//! [`ScoreStore::upsert`] keeps at most one payload per score: writing to an
//! occupied score replaces the payload (last write wins). Backends whose
//! native sorted set tolerates multiple members at one score must enforce
//! this themselves (the Redis backend removes the score range before
//! inserting).

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::StoreError;

/// One (score, payload) entry from an ordered collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredEntry {
    /// The entry's score (for data points, a bucketed Unix timestamp).
    pub score: i64,
    /// The stored payload.
    pub payload: String,
}

/// Ordered-set collection operations required by [`TimeSeries`](crate::TimeSeries).
///
/// Methods take `&mut self` because real backends hold a connection that
/// requires exclusive access per command. All operations are single
/// blocking round trips; failures propagate without retry.
pub trait ScoreStore {
    /// Returns whether the collection at `key` exists (has any entries).
    ///
    /// # Errors
    ///
    /// Propagates any backend failure.
    fn exists(&mut self, key: &str) -> Result<bool, StoreError>;

    /// Inserts `payload` at `score`, replacing any existing payload there.
    ///
    /// # Errors
    ///
    /// Propagates any backend failure.
    fn upsert(&mut self, key: &str, score: i64, payload: &str) -> Result<(), StoreError>;

    /// Returns entries with `min <= score <= max`, ascending by score.
    ///
    /// # Errors
    ///
    /// Propagates any backend failure.
    fn range_by_score(
        &mut self,
        key: &str,
        min: i64,
        max: i64,
    ) -> Result<Vec<ScoredEntry>, StoreError>;

    /// Returns entries by ascending rank, `start..=stop` inclusive.
    ///
    /// Negative indices count from the end, as in Redis ZRANGE
    /// (`-1` is the highest-scored entry).
    ///
    /// # Errors
    ///
    /// Propagates any backend failure.
    fn range_by_rank(
        &mut self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<ScoredEntry>, StoreError>;

    /// Returns entries by descending rank, `start..=stop` inclusive.
    ///
    /// Rank 0 is the highest-scored entry. Negative indices count from the
    /// end of the reversed order.
    ///
    /// # Errors
    ///
    /// Propagates any backend failure.
    fn reverse_range_by_rank(
        &mut self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<ScoredEntry>, StoreError>;

    /// Removes entries with `min <= score <= max`; returns the removed count.
    ///
    /// Removing the last entry removes the collection itself, so a
    /// subsequent [`exists`](Self::exists) reports `false`.
    ///
    /// # Errors
    ///
    /// Propagates any backend failure.
    fn remove_by_score_range(
        &mut self,
        key: &str,
        min: i64,
        max: i64,
    ) -> Result<u64, StoreError>;
}

/// In-process ordered-set store.
///
/// Collections are `BTreeMap<score, payload>` per key, so the one-payload-
/// per-score upsert contract holds by construction. The handle is cheaply
/// cloneable; clones share the same underlying tables, which lets tests (or
/// multiple series) observe each other's writes like they would against a
/// shared remote store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<HashMap<String, BTreeMap<i64, String>>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, HashMap<String, BTreeMap<i64, String>>> {
        // A poisoned lock only means another thread panicked mid-write;
        // the table itself is still structurally valid.
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resolves Redis-style rank bounds against a collection of `len` entries.
///
/// Returns `None` when the resolved range is empty.
#[allow(clippy::cast_sign_loss)] // both bounds are clamped non-negative before the cast
fn resolve_ranks(len: i64, start: i64, stop: i64) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let start = if start < 0 { start + len } else { start }.max(0);
    let stop = if stop < 0 { stop + len } else { stop }.min(len - 1);
    if start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

impl ScoreStore for MemoryStore {
    fn exists(&mut self, key: &str) -> Result<bool, StoreError> {
        Ok(self.tables().contains_key(key))
    }

    fn upsert(&mut self, key: &str, score: i64, payload: &str) -> Result<(), StoreError> {
        self.tables()
            .entry(key.to_string())
            .or_default()
            .insert(score, payload.to_string());
        Ok(())
    }

    fn range_by_score(
        &mut self,
        key: &str,
        min: i64,
        max: i64,
    ) -> Result<Vec<ScoredEntry>, StoreError> {
        let tables = self.tables();
        let Some(table) = tables.get(key) else {
            return Ok(Vec::new());
        };
        if min > max {
            return Ok(Vec::new());
        }
        Ok(table
            .range(min..=max)
            .map(|(&score, payload)| ScoredEntry {
                score,
                payload: payload.clone(),
            })
            .collect())
    }

    fn range_by_rank(
        &mut self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<ScoredEntry>, StoreError> {
        let tables = self.tables();
        let Some(table) = tables.get(key) else {
            return Ok(Vec::new());
        };
        let Some((start, stop)) = resolve_ranks(table.len() as i64, start, stop) else {
            return Ok(Vec::new());
        };
        Ok(table
            .iter()
            .skip(start)
            .take(stop - start + 1)
            .map(|(&score, payload)| ScoredEntry {
                score,
                payload: payload.clone(),
            })
            .collect())
    }

    fn reverse_range_by_rank(
        &mut self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<ScoredEntry>, StoreError> {
        let tables = self.tables();
        let Some(table) = tables.get(key) else {
            return Ok(Vec::new());
        };
        let Some((start, stop)) = resolve_ranks(table.len() as i64, start, stop) else {
            return Ok(Vec::new());
        };
        Ok(table
            .iter()
            .rev()
            .skip(start)
            .take(stop - start + 1)
            .map(|(&score, payload)| ScoredEntry {
                score,
                payload: payload.clone(),
            })
            .collect())
    }

    fn remove_by_score_range(
        &mut self,
        key: &str,
        min: i64,
        max: i64,
    ) -> Result<u64, StoreError> {
        let mut tables = self.tables();
        let Some(table) = tables.get_mut(key) else {
            return Ok(0);
        };
        if min > max {
            return Ok(0);
        }
        let doomed: Vec<i64> = table.range(min..=max).map(|(&score, _)| score).collect();
        for score in &doomed {
            table.remove(score);
        }
        if table.is_empty() {
            tables.remove(key);
        }
        Ok(doomed.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(score: i64, payload: &str) -> ScoredEntry {
        ScoredEntry {
            score,
            payload: payload.to_string(),
        }
    }

    fn seeded() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.upsert("k", 10, "a").unwrap();
        store.upsert("k", 20, "b").unwrap();
        store.upsert("k", 30, "c").unwrap();
        store
    }

    #[test]
    fn test_exists_tracks_collection_lifecycle() {
        let mut store = MemoryStore::new();
        assert!(!store.exists("k").unwrap());
        store.upsert("k", 1, "x").unwrap();
        assert!(store.exists("k").unwrap());
        store.remove_by_score_range("k", i64::MIN, i64::MAX).unwrap();
        assert!(!store.exists("k").unwrap());
    }

    #[test]
    fn test_upsert_replaces_payload_at_score() {
        let mut store = MemoryStore::new();
        store.upsert("k", 60, "5").unwrap();
        store.upsert("k", 60, "7").unwrap();
        let entries = store.range_by_score("k", 60, 60).unwrap();
        assert_eq!(entries, vec![entry(60, "7")]);
    }

    #[test]
    fn test_range_by_score_is_inclusive_and_ascending() {
        let mut store = seeded();
        let entries = store.range_by_score("k", 10, 20).unwrap();
        assert_eq!(entries, vec![entry(10, "a"), entry(20, "b")]);
        assert!(store.range_by_score("k", 40, 50).unwrap().is_empty());
        assert!(store.range_by_score("missing", 0, 100).unwrap().is_empty());
    }

    #[test]
    fn test_range_by_rank_supports_negative_indices() {
        let mut store = seeded();
        assert_eq!(
            store.range_by_rank("k", 0, -1).unwrap(),
            vec![entry(10, "a"), entry(20, "b"), entry(30, "c")]
        );
        assert_eq!(store.range_by_rank("k", 1, -1).unwrap(), vec![
            entry(20, "b"),
            entry(30, "c")
        ]);
        assert_eq!(store.range_by_rank("k", 0, 0).unwrap(), vec![entry(10, "a")]);
        assert!(store.range_by_rank("k", 5, 9).unwrap().is_empty());
        assert!(store.range_by_rank("k", 2, 1).unwrap().is_empty());
    }

    #[test]
    fn test_reverse_range_by_rank_starts_at_highest_score() {
        let mut store = seeded();
        assert_eq!(
            store.reverse_range_by_rank("k", 0, 0).unwrap(),
            vec![entry(30, "c")]
        );
        assert_eq!(
            store.reverse_range_by_rank("k", 0, 1).unwrap(),
            vec![entry(30, "c"), entry(20, "b")]
        );
    }

    #[test]
    fn test_remove_by_score_range_reports_count() {
        let mut store = seeded();
        assert_eq!(store.remove_by_score_range("k", 10, 20).unwrap(), 2);
        assert_eq!(store.range_by_rank("k", 0, -1).unwrap(), vec![entry(30, "c")]);
        assert_eq!(store.remove_by_score_range("k", 100, 200).unwrap(), 0);
    }

    #[test]
    fn test_clones_share_tables() {
        let mut store = MemoryStore::new();
        let mut other = store.clone();
        store.upsert("k", 1, "x").unwrap();
        assert!(other.exists("k").unwrap());
    }
}
