//! Integration tests for the series write and read paths.

use zetric::error::Result;
use zetric::{
    DATA_MIN_SCORE, META_SCORE, MemoryStore, MetricHooks, ScoreStore, SeriesConfig, SetOptions,
    Step, TimeSeries, ZetricError,
};

// A timestamp comfortably inside the minute bucket at 1_700_000_040.
const T0: i64 = 1_700_000_030;
const T0_BUCKET: i64 = 1_700_000_040;

fn minute_series(store: MemoryStore, name: &str) -> Result<TimeSeries<MemoryStore>> {
    TimeSeries::new(store, name, SeriesConfig::new(Step::Minute))
}

#[test]
fn test_set_then_get_returns_bucketed_point() -> Result<()> {
    let mut series = minute_series(MemoryStore::new(), "requests")?;

    let bucket = series.set("5", Some(T0))?;
    assert_eq!(bucket, T0_BUCKET);

    let point = series.get(Some(T0))?.expect("point should exist");
    assert_eq!(point.timestamp, T0_BUCKET);
    assert_eq!(point.value, "5");
    Ok(())
}

#[test]
fn test_get_without_timestamp_returns_latest() -> Result<()> {
    let mut series = minute_series(MemoryStore::new(), "requests")?;
    series.set("1", Some(T0))?;
    series.set("2", Some(T0 + 600))?;

    let latest = series.get(None)?.expect("latest should exist");
    assert_eq!(latest.value, "2");
    Ok(())
}

#[test]
fn test_get_on_fresh_series_returns_none() -> Result<()> {
    let mut series = minute_series(MemoryStore::new(), "requests")?;

    // The collection exists (metadata was written) but holds no data, so
    // the highest-scored entry is the metadata entry. It must not leak out.
    assert_eq!(series.get(None)?, None);
    assert_eq!(series.get(Some(T0))?, None);
    Ok(())
}

#[test]
fn test_get_as_of_returns_last_known_value() -> Result<()> {
    let mut series = minute_series(MemoryStore::new(), "requests")?;
    series.set("1", Some(T0))?;

    // An hour later nothing new was written; the as-of lookup still finds
    // the value recorded at T0.
    let point = series.get(Some(T0 + 3_600))?.expect("as-of should resolve");
    assert_eq!(point.timestamp, T0_BUCKET);
    assert_eq!(point.value, "1");

    // Before the first write there is nothing.
    assert_eq!(series.get(Some(T0 - 3_600))?, None);
    Ok(())
}

#[test]
fn test_get_range_round_trip() -> Result<()> {
    let mut series = minute_series(MemoryStore::new(), "requests")?;
    series.set("5", Some(T0))?;

    let range = series.get_range(T0, T0)?.expect("collection exists");
    assert_eq!(range.len(), 1);
    assert_eq!(range.get(&T0_BUCKET).map(String::as_str), Some("5"));
    Ok(())
}

#[test]
fn test_get_range_never_includes_metadata() -> Result<()> {
    let mut series = minute_series(MemoryStore::new(), "requests")?;
    series.set("5", Some(T0))?;

    // A range whose bucketed bounds span score 0 would have returned the
    // metadata entry under rank- or sentinel-based exclusion.
    let range = series.get_range(0, T0 + 120)?.expect("collection exists");
    assert_eq!(range.len(), 1);
    assert!(!range.contains_key(&META_SCORE));
    assert_eq!(range.get(&T0_BUCKET).map(String::as_str), Some("5"));
    Ok(())
}

#[test]
fn test_get_range_bounds_are_bucketed_and_inclusive() -> Result<()> {
    let mut series = minute_series(MemoryStore::new(), "requests")?;
    series.set("a", Some(T0))?;
    series.set("b", Some(T0 + 60))?;
    series.set("c", Some(T0 + 300))?;

    // T0-120 and T0+120 bucket to T0_BUCKET-120 and T0_BUCKET+120; only the
    // first two points fall inside.
    let range = series
        .get_range(T0 - 120, T0 + 120)?
        .expect("collection exists");
    let timestamps: Vec<i64> = range.keys().copied().collect();
    assert_eq!(timestamps, vec![T0_BUCKET, T0_BUCKET + 60]);
    Ok(())
}

#[test]
fn test_get_all_skips_metadata_entry() -> Result<()> {
    let mut series = minute_series(MemoryStore::new(), "requests")?;
    series.set("1", Some(T0))?;
    series.set("2", Some(T0 + 60))?;

    let all = series.get_all()?.expect("collection exists");
    assert_eq!(all.len(), 2);
    assert!(all.keys().all(|&ts| ts >= DATA_MIN_SCORE));
    Ok(())
}

#[test]
fn test_set_is_idempotent_per_bucket() -> Result<()> {
    let mut series = minute_series(MemoryStore::new(), "requests")?;
    series.set("5", Some(T0))?;
    series.set("5", Some(T0))?;

    let all = series.get_all()?.expect("collection exists");
    assert_eq!(all.len(), 1);
    Ok(())
}

#[test]
fn test_rewriting_a_bucket_keeps_last_value() -> Result<()> {
    let mut series = minute_series(MemoryStore::new(), "requests")?;
    series.set("5", Some(T0))?;
    series.set("7", Some(T0 + 1))?; // same bucket, different value

    let all = series.get_all()?.expect("collection exists");
    assert_eq!(all.len(), 1);
    assert_eq!(all.get(&T0_BUCKET).map(String::as_str), Some("7"));
    Ok(())
}

#[test]
fn test_reads_on_missing_collection_return_none() -> Result<()> {
    let store = MemoryStore::new();
    let mut external = store.clone();
    let mut series = minute_series(store, "requests")?;

    // Simulate an external DEL of the backing key.
    external.remove_by_score_range(series.key(), i64::MIN, i64::MAX)?;

    assert_eq!(series.get(None)?, None);
    assert_eq!(series.get_range(T0, T0 + 60)?, None);
    assert_eq!(series.get_all()?, None);
    Ok(())
}

#[test]
fn test_set_reinitializes_after_external_delete() -> Result<()> {
    let store = MemoryStore::new();
    let mut external = store.clone();
    let mut series = minute_series(store, "requests")?;

    external.remove_by_score_range(series.key(), i64::MIN, i64::MAX)?;
    assert!(!external.exists(series.key())?);

    series.set("5", Some(T0))?;

    // Both the data point and a fresh metadata entry are back.
    let meta_entries = external.range_by_score(series.key(), META_SCORE, META_SCORE)?;
    assert_eq!(meta_entries.len(), 1);
    assert_eq!(
        series.get(Some(T0))?.map(|p| p.value),
        Some("5".to_string())
    );
    Ok(())
}

#[test]
fn test_write_to_reserved_bucket_is_refused() {
    let mut series = minute_series(MemoryStore::new(), "requests").unwrap();

    // 10s rounds to bucket 0, the reserved metadata slot.
    let err = series.set("5", Some(10)).unwrap_err();
    assert!(matches!(err, ZetricError::ReservedBucket { bucket: 0 }));
}

struct Doubler;

impl MetricHooks for Doubler {
    fn before_set(&self, value: &str) -> String {
        format!("{value}{value}")
    }
}

#[test]
fn test_before_set_hook_applies_unless_skipped() -> Result<()> {
    let mut series = TimeSeries::with_hooks(
        MemoryStore::new(),
        "requests",
        SeriesConfig::new(Step::Minute),
        Box::new(Doubler),
    )?;

    series.set("5", Some(T0))?;
    assert_eq!(series.get(None)?.map(|p| p.value), Some("55".to_string()));

    series.set_with(
        "5",
        Some(T0 + 60),
        SetOptions {
            skip_before_set: true,
        },
    )?;
    assert_eq!(series.get(None)?.map(|p| p.value), Some("5".to_string()));
    Ok(())
}

#[test]
fn test_key_derivation_uses_prefix_and_name() -> Result<()> {
    let series = TimeSeries::new(
        MemoryStore::new(),
        "requests",
        SeriesConfig::new(Step::Minute).with_prefix("app"),
    )?;
    assert_eq!(series.key(), "app:requests");
    Ok(())
}

#[test]
fn test_week_step_buckets_writes() -> Result<()> {
    let mut series = TimeSeries::new(
        MemoryStore::new(),
        "weekly",
        SeriesConfig::new(Step::Week),
    )?;
    let bucket = series.set("1", Some(T0))?;
    assert_eq!(bucket % 604_800, 0);
    assert_eq!(series.get(Some(T0 + 604_800))?.map(|p| p.timestamp), Some(bucket));
    Ok(())
}
