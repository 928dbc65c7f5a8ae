//! Redis sorted-set backend for [`ScoreStore`].
//!
//! Maps the trait operations onto ZADD / ZRANGEBYSCORE / ZRANGE / ZREVRANGE
//! / ZREMRANGEBYSCORE. Redis sorted sets tolerate distinct members at the
//! same score, so the one-payload-per-score upsert contract is enforced
//! here with a ZREMRANGEBYSCORE + ZADD pipeline (MULTI/EXEC, so readers
//! never observe the bucket half-written).
//!
//! Requires the `redis-backend` feature.

use redis::{Client, Commands, Connection};

use crate::error::StoreError;
use crate::store::{ScoreStore, ScoredEntry};

impl From<redis::RedisError> for StoreError {
    fn from(source: redis::RedisError) -> Self {
        StoreError::Backend {
            source: Box::new(source),
        }
    }
}

/// A [`ScoreStore`] over one Redis connection.
pub struct RedisStore {
    conn: Connection,
}

impl RedisStore {
    /// Connects to the Redis server at `url` (e.g. `redis://127.0.0.1:6379`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the URL is invalid or the
    /// connection cannot be established.
    pub fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let conn = client.get_connection()?;
        Ok(Self { conn })
    }

    /// Wraps an already-established connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }
}

fn entries_from_pairs(pairs: Vec<(String, i64)>) -> Vec<ScoredEntry> {
    pairs
        .into_iter()
        .map(|(payload, score)| ScoredEntry { score, payload })
        .collect()
}

#[allow(clippy::cast_possible_truncation)] // rank bounds fit isize on all supported targets
impl ScoreStore for RedisStore {
    fn exists(&mut self, key: &str) -> Result<bool, StoreError> {
        Ok(self.conn.exists(key)?)
    }

    fn upsert(&mut self, key: &str, score: i64, payload: &str) -> Result<(), StoreError> {
        let _: () = redis::pipe()
            .atomic()
            .zrembyscore(key, score, score)
            .ignore()
            .zadd(key, payload, score)
            .ignore()
            .query(&mut self.conn)?;
        Ok(())
    }

    fn range_by_score(
        &mut self,
        key: &str,
        min: i64,
        max: i64,
    ) -> Result<Vec<ScoredEntry>, StoreError> {
        let pairs: Vec<(String, i64)> = self.conn.zrangebyscore_withscores(key, min, max)?;
        Ok(entries_from_pairs(pairs))
    }

    fn range_by_rank(
        &mut self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<ScoredEntry>, StoreError> {
        let pairs: Vec<(String, i64)> =
            self.conn.zrange_withscores(key, start as isize, stop as isize)?;
        Ok(entries_from_pairs(pairs))
    }

    fn reverse_range_by_rank(
        &mut self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<ScoredEntry>, StoreError> {
        let pairs: Vec<(String, i64)> =
            self.conn.zrevrange_withscores(key, start as isize, stop as isize)?;
        Ok(entries_from_pairs(pairs))
    }

    fn remove_by_score_range(
        &mut self,
        key: &str,
        min: i64,
        max: i64,
    ) -> Result<u64, StoreError> {
        Ok(self.conn.zrembyscore(key, min, max)?)
    }
}
