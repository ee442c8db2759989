//! Shared vocabulary types for the Chronex deadline scheduling engine.
//!
//! This crate defines the identifier arithmetic and configuration surface
//! shared by the engine and its callers:
//!
//! - [`BucketKey`]: sortable integer key for a millisecond-resolution
//!   deadline bucket. Integer ordering of keys equals chronological ordering.
//! - [`TaskId`]: caller-facing handle encoding `(BucketKey, sequence)` so the
//!   owning bucket can be recovered from the id alone.
//! - [`EngineConfig`]: sizing and id-width knobs for the engine.
//!
//! ## Feature Flags
//!
//! - `serde`: derives `Serialize`/`Deserialize` for the public types.

pub mod config;
pub mod error;
pub mod ids;

pub use config::{DEFAULT_SEQUENCE_BITS, EngineConfig, MAX_SEQUENCE_BITS};
pub use error::{ModelError, Result};
pub use ids::{BucketKey, TaskId};
