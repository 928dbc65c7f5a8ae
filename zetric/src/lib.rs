//! # zetric
//!
//! Time-bucketed metric storage over ordered-set backends.
//!
//! zetric records scalar metric values keyed by a rounded timestamp and
//! reads them back as single points, ranges, or full series. Each metric
//! is one ordered collection (one Redis sorted set, or an in-memory
//! equivalent): data points live at step-aligned timestamp scores, and a
//! reserved score-0 entry holds the series metadata as JSON.
//!
//! ## Key Properties
//!
//! - Round-to-nearest bucketing: minute/hour/day/week buckets are the
//!   nearest multiple of the step width (half rounds up), month buckets use
//!   the containing calendar month's length
//! - One value per bucket — writes to an occupied bucket overwrite
//! - Explicit reserved metadata slot at score 0, excluded from every read
//!   path by score
//! - Pluggable backend behind the [`ScoreStore`] trait; the `redis-backend`
//!   feature provides a Redis sorted-set implementation
//!
//! ## Quick Start
//!
//! ```rust
//! use zetric::{MemoryStore, SeriesConfig, Step, TimeSeries};
//!
//! # fn main() -> zetric::Result<()> {
//! let store = MemoryStore::new();
//! let mut requests = TimeSeries::new(store, "requests", SeriesConfig::new(Step::Minute))?;
//!
//! // Record a value; the timestamp rounds to its minute bucket.
//! let bucket = requests.set("5", Some(1_700_000_030))?;
//! assert_eq!(bucket % 60, 0);
//!
//! // Read it back: latest, as-of, range, or everything.
//! let latest = requests.get(None)?;
//! assert_eq!(latest.map(|p| p.value), Some("5".to_string()));
//!
//! let all = requests.get_all()?.unwrap();
//! assert_eq!(all.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`series`] — the [`TimeSeries`] façade, hooks, and metadata handling
//! - [`step`] — step granularities and bucket arithmetic
//! - [`store`] — the [`ScoreStore`] trait and the in-memory backend
//! - [`error`] — error types

use std::time::{SystemTime, UNIX_EPOCH};

pub mod error;
#[cfg(feature = "redis-backend")]
pub mod redis_store;
pub mod series;
pub mod step;
pub mod store;

// Re-export primary API types at crate root for convenience.
pub use error::{MetaError, Result, StepError, StoreError, ZetricError};
#[cfg(feature = "redis-backend")]
pub use redis_store::RedisStore;
pub use series::{
    DATA_MIN_SCORE, DataPoint, DefaultHooks, META_SCORE, Meta, MetricHooks, SeriesConfig,
    SetOptions, TimeSeries,
};
pub use step::Step;
pub use store::{MemoryStore, ScoreStore, ScoredEntry};

/// The current time as Unix seconds.
///
/// Clamps to 0 if the system clock reads before the epoch.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}
