//! The time-bucketed metric series.
//!
//! A [`TimeSeries`] is a façade over one ordered collection in a
//! [`ScoreStore`]: data points live at step-aligned timestamp scores, and a
//! single reserved entry at score [`META_SCORE`] holds the series metadata
//! as JSON. The series is stateless per call apart from the metadata cache;
//! every operation is a blocking round trip to the store.
//!
//! # Metadata convention
//!
//! Score 0 is reserved: the metadata entry is written there at first
//! initialization and all data reads exclude it *by score*
//! ([`DATA_MIN_SCORE`] is the lowest valid data score). Writes that would
//! bucket to the reserved score are refused with
//! [`ZetricError::ReservedBucket`].
//!
//! # Example
//!
//! ```rust
//! use zetric::{MemoryStore, SeriesConfig, Step, TimeSeries};
//!
//! # fn main() -> zetric::Result<()> {
//! let store = MemoryStore::new();
//! let mut requests = TimeSeries::new(store, "requests", SeriesConfig::new(Step::Minute))?;
//!
//! requests.set("5", Some(1_700_000_030))?;
//!
//! let point = requests.get(Some(1_700_000_030))?.unwrap();
//! assert_eq!(point.timestamp % 60, 0);
//! assert_eq!(point.value, "5");
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{MetaError, Result, ZetricError};
use crate::step::Step;
use crate::store::ScoreStore;

/// Reserved score of the metadata entry.
pub const META_SCORE: i64 = 0;

/// Lowest score a data point may occupy.
pub const DATA_MIN_SCORE: i64 = META_SCORE + 1;

/// JSON object type used for series metadata.
pub type Meta = Map<String, Value>;

/// Configuration for a [`TimeSeries`] instance.
///
/// The step is an explicit per-instance parameter; the prefix and the
/// metric name together derive the backing collection key
/// (`"{prefix}:{name}"`), which must be stable and unique per metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesConfig {
    /// Bucket granularity for writes and range bounds.
    pub step: Step,
    /// Key namespace prepended to the metric name.
    pub prefix: String,
}

impl SeriesConfig {
    /// Creates a config with the given step and the default key prefix.
    pub fn new(step: Step) -> Self {
        Self {
            step,
            prefix: "zetric".to_string(),
        }
    }

    /// Replaces the key prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// The backing collection key derived for a metric name.
    pub fn key_for(&self, name: &str) -> String {
        format!("{}:{}", self.prefix, name)
    }
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self::new(Step::Minute)
    }
}

/// Per-metric hooks for value transformation and initial metadata.
///
/// The defaults are identity and an empty map; metric types that need to
/// normalize values before storage override [`before_set`](Self::before_set).
pub trait MetricHooks {
    /// Transforms a raw value into its storable form. Applied on every
    /// write unless [`SetOptions::skip_before_set`] is set.
    fn before_set(&self, value: &str) -> String {
        value.to_owned()
    }

    /// Initial metadata written when the series is first created.
    ///
    /// Must be deterministic: concurrent first-writers may both run
    /// initialization, and the upsert is only benign if they write the
    /// same payload.
    fn default_meta(&self) -> Meta {
        Meta::new()
    }
}

/// The identity hooks used by [`TimeSeries::new`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl MetricHooks for DefaultHooks {}

/// Options for [`TimeSeries::set_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// Skip the [`MetricHooks::before_set`] transform for this write.
    pub skip_before_set: bool,
}

/// A single resolved data point: bucket timestamp and stored value.
///
/// The value is the stored representation; the `before_set` transform is
/// not reversed on reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPoint {
    /// The step-aligned bucket timestamp (Unix seconds).
    pub timestamp: i64,
    /// The stored value.
    pub value: String,
}

/// A metric series over one ordered collection.
///
/// See the [module documentation](self) for the storage layout. The series
/// holds its store client by value; cheaply cloneable clients (such as
/// [`MemoryStore`](crate::MemoryStore)) can back several series at once.
pub struct TimeSeries<S: ScoreStore> {
    store: S,
    key: String,
    step: Step,
    hooks: Box<dyn MetricHooks + Send + Sync>,
    meta: Option<Meta>,
}

impl<S: ScoreStore> TimeSeries<S> {
    /// Opens the series named `name`, creating its backing collection (and
    /// the metadata entry) if absent.
    ///
    /// # Errors
    ///
    /// Propagates store failures from the existence check or the initial
    /// metadata write.
    pub fn new(store: S, name: &str, config: SeriesConfig) -> Result<Self> {
        Self::with_hooks(store, name, config, Box::new(DefaultHooks))
    }

    /// Like [`new`](Self::new), with custom [`MetricHooks`].
    ///
    /// # Errors
    ///
    /// Propagates store failures from the existence check or the initial
    /// metadata write.
    pub fn with_hooks(
        store: S,
        name: &str,
        config: SeriesConfig,
        hooks: Box<dyn MetricHooks + Send + Sync>,
    ) -> Result<Self> {
        let key = config.key_for(name);
        let mut series = Self {
            store,
            key,
            step: config.step,
            hooks,
            meta: None,
        };
        series.ensure_initialized()?;
        Ok(series)
    }

    /// The derived backing collection key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The configured step granularity.
    pub fn step(&self) -> Step {
        self.step
    }

    /// Creates the backing collection (metadata entry at [`META_SCORE`])
    /// if it does not exist. Idempotent; a no-op on an initialized series.
    ///
    /// Invoked at construction and at the start of every write, so a series
    /// whose collection was deleted externally re-initializes on the next
    /// `set` call.
    ///
    /// # Errors
    ///
    /// Propagates store failures, or [`MetaError::Serialize`] if the
    /// default metadata cannot be encoded.
    pub fn ensure_initialized(&mut self) -> Result<()> {
        if !self.store.exists(&self.key)? {
            let payload =
                serde_json::to_string(&self.hooks.default_meta()).map_err(MetaError::Serialize)?;
            self.store.upsert(&self.key, META_SCORE, &payload)?;
        }
        Ok(())
    }

    /// Records `value` at `at` (Unix seconds; `None` means now).
    ///
    /// Returns the bucket timestamp the value was stored under.
    ///
    /// # Errors
    ///
    /// See [`set_with`](Self::set_with).
    pub fn set(&mut self, value: &str, at: Option<i64>) -> Result<i64> {
        self.set_with(value, at, SetOptions::default())
    }

    /// Records `value` at `at`, with explicit [`SetOptions`].
    ///
    /// The value passes through [`MetricHooks::before_set`] unless skipped,
    /// the timestamp is rounded to its bucket, and the (bucket, value) pair
    /// is upserted. One value per bucket: writing the same bucket twice
    /// keeps the later value.
    ///
    /// # Errors
    ///
    /// Returns [`ZetricError::ReservedBucket`] if the timestamp buckets to
    /// the reserved metadata score; otherwise propagates step resolution
    /// and store failures.
    pub fn set_with(&mut self, value: &str, at: Option<i64>, options: SetOptions) -> Result<i64> {
        let value = if options.skip_before_set {
            value.to_owned()
        } else {
            self.hooks.before_set(value)
        };

        // The collection may have been removed externally since this
        // instance was constructed.
        self.ensure_initialized()?;

        let t = at.unwrap_or_else(crate::unix_now);
        let bucket = self.step.bucket(t)?;
        if bucket < DATA_MIN_SCORE {
            return Err(ZetricError::ReservedBucket { bucket });
        }
        self.store.upsert(&self.key, bucket, &value)?;
        Ok(bucket)
    }

    /// Returns the latest data point, or the value as-of `at`.
    ///
    /// With `at = None` this is the highest-scored data point. With a
    /// timestamp it is an as-of lookup: the latest data point whose bucket
    /// is at or before `bucket(at)`. The metadata entry never qualifies;
    /// `Ok(None)` means the collection is absent or holds no data points.
    ///
    /// # Errors
    ///
    /// Propagates step resolution and store failures.
    pub fn get(&mut self, at: Option<i64>) -> Result<Option<DataPoint>> {
        if !self.store.exists(&self.key)? {
            return Ok(None);
        }

        let entry = match at {
            Some(t) => {
                let bucket = self.step.bucket(t)?;
                if bucket < DATA_MIN_SCORE {
                    return Ok(None);
                }
                self.store
                    .range_by_score(&self.key, DATA_MIN_SCORE, bucket)?
                    .pop()
            }
            None => self
                .store
                .reverse_range_by_rank(&self.key, 0, 0)?
                .into_iter()
                .next(),
        };

        Ok(entry
            .filter(|e| e.score != META_SCORE)
            .map(|e| DataPoint {
                timestamp: e.score,
                value: e.payload,
            }))
    }

    /// Returns all data points with buckets in `[bucket(start), bucket(end)]`.
    ///
    /// Both bounds are bucketed before querying. The metadata entry is
    /// excluded unconditionally, even when the bucketed range spans score 0.
    /// `Ok(None)` means the collection is absent; an empty map means no data
    /// points fall in the range.
    ///
    /// # Errors
    ///
    /// Propagates step resolution and store failures.
    pub fn get_range(&mut self, start: i64, end: i64) -> Result<Option<BTreeMap<i64, String>>> {
        if !self.store.exists(&self.key)? {
            return Ok(None);
        }

        let lo = self.step.bucket(start)?.max(DATA_MIN_SCORE);
        let hi = self.step.bucket(end)?;
        if hi < lo {
            return Ok(Some(BTreeMap::new()));
        }

        let entries = self.store.range_by_score(&self.key, lo, hi)?;
        Ok(Some(collect_points(entries)))
    }

    /// Returns every data point in the series.
    ///
    /// A score-range scan from [`DATA_MIN_SCORE`] upward, so the metadata
    /// entry is excluded regardless of its rank. `Ok(None)` means the
    /// collection is absent.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn get_all(&mut self) -> Result<Option<BTreeMap<i64, String>>> {
        if !self.store.exists(&self.key)? {
            return Ok(None);
        }

        let entries = self
            .store
            .range_by_score(&self.key, DATA_MIN_SCORE, i64::MAX)?;
        Ok(Some(collect_points(entries)))
    }

    /// Returns the series metadata, fetching and caching it on first access.
    ///
    /// Subsequent calls on the same instance return the cached value without
    /// a store round trip; the cache lives for the instance's lifetime and
    /// is refreshed only by [`set_meta`](Self::set_meta).
    ///
    /// # Errors
    ///
    /// Returns [`MetaError::Missing`] if the collection has no entry at the
    /// metadata score, [`MetaError::Parse`] if the payload is not valid
    /// JSON, and propagates store failures.
    pub fn meta(&mut self) -> Result<&Meta> {
        if self.meta.is_none() {
            let fetched = self.fetch_meta()?;
            self.meta = Some(fetched);
        }
        Ok(self.meta.get_or_insert_with(Meta::new))
    }

    /// Replaces the series metadata, caching and persisting it immediately.
    ///
    /// Persistence is delete-then-insert at the metadata score and is not
    /// transactional: a concurrent reader can observe the collection with no
    /// metadata entry, and interleaved updates are last-write-wins.
    ///
    /// # Errors
    ///
    /// Returns [`MetaError::Serialize`] if the value cannot be encoded, and
    /// propagates store failures.
    pub fn set_meta(&mut self, meta: Meta) -> Result<()> {
        let payload = serde_json::to_string(&meta).map_err(MetaError::Serialize)?;
        self.meta = Some(meta);
        self.store
            .remove_by_score_range(&self.key, META_SCORE, META_SCORE)?;
        self.store.upsert(&self.key, META_SCORE, &payload)?;
        Ok(())
    }

    fn fetch_meta(&mut self) -> Result<Meta> {
        let entry = self
            .store
            .range_by_score(&self.key, META_SCORE, META_SCORE)?
            .into_iter()
            .next()
            .ok_or_else(|| MetaError::Missing {
                key: self.key.clone(),
            })?;
        let parsed = serde_json::from_str(&entry.payload).map_err(|source| MetaError::Parse {
            key: self.key.clone(),
            source,
        })?;
        Ok(parsed)
    }
}

/// Converts store entries into a timestamp-keyed map.
fn collect_points(entries: Vec<crate::store::ScoredEntry>) -> BTreeMap<i64, String> {
    entries
        .into_iter()
        .map(|e| (e.score, e.payload))
        .collect()
}
