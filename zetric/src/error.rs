//! Error types for the zetric metric store.

use thiserror::Error;

/// The main error type for all zetric operations.
#[derive(Error, Debug)]
pub enum ZetricError {
    /// Error from the backing ordered-set store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Error reading or writing series metadata.
    #[error("metadata error: {0}")]
    Meta(#[from] MetaError),

    /// Error resolving a step granularity or bucket.
    #[error("step error: {0}")]
    Step(#[from] StepError),

    /// A write resolved to the reserved metadata bucket.
    ///
    /// Score 0 holds the series metadata entry; data points must bucket to
    /// a positive score. Writes this close to the epoch are refused rather
    /// than silently overwriting the metadata slot.
    #[error("bucket {bucket} collides with the reserved metadata slot")]
    ReservedBucket {
        /// The offending bucket timestamp.
        bucket: i64,
    },
}

/// Errors from the backing store client.
///
/// Store connectivity and command failures are propagated as-is; there is
/// no retry logic anywhere in this crate. Every operation is single-attempt.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend reported a failure (connectivity, protocol, command).
    #[error("store backend failure: {source}")]
    Backend {
        /// The underlying backend error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Errors reading or writing the score-0 metadata entry.
#[derive(Error, Debug)]
pub enum MetaError {
    /// The collection exists but has no entry at the metadata score.
    #[error("no metadata entry in collection '{key}'")]
    Missing {
        /// The backing collection key.
        key: String,
    },

    /// The metadata payload is not valid JSON.
    #[error("malformed metadata in collection '{key}': {source}")]
    Parse {
        /// The backing collection key.
        key: String,
        /// The underlying JSON parsing error.
        #[source]
        source: serde_json::Error,
    },

    /// The metadata value could not be serialized to JSON.
    #[error("failed to serialize metadata: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors resolving a step granularity or a bucket timestamp.
#[derive(Error, Debug)]
pub enum StepError {
    /// The step name is not one of minute/hour/day/week/month.
    #[error("unrecognized step '{name}' (expected minute, hour, day, week, or month)")]
    Unrecognized {
        /// The name that failed to parse.
        name: String,
    },

    /// The timestamp cannot be resolved to a calendar date.
    #[error("timestamp {timestamp} is outside the representable date range")]
    TimeOutOfRange {
        /// The offending timestamp.
        timestamp: i64,
    },
}

/// Type alias for `Result<T, ZetricError>`.
pub type Result<T> = std::result::Result<T, ZetricError>;
