use chronex_model::{BucketKey, ModelError};
use thiserror::Error;

/// Errors surfaced by [`crate::DeadlineEngine`].
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid timestamp {0}: must be positive milliseconds since epoch")]
    InvalidTimestamp(i64),

    #[error(
        "timestamp {ts} is not encodable with {bits} sequence bits; \
         reduce sequence_bits or use a nearer deadline"
    )]
    TimestampOutOfRange { ts: i64, bits: u32 },

    #[error("bucket {key} exhausted its sequence space of {capacity} ids")]
    BucketFull { key: BucketKey, capacity: u64 },

    #[error("configuration rejected: {0}")]
    Config(#[from] ModelError),

    #[error("poll handler failed: {0}")]
    Handler(#[source] anyhow::Error),
}

/// Errors surfaced by [`crate::MemoCache`].
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("loader produced no value for the requested key")]
    NullDerived,
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
