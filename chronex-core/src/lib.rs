//! # Chronex Core
//!
//! A concurrent deadline scheduling engine: callers register absolute
//! millisecond deadlines, receive compact ids, and later drain every elapsed
//! deadline in bounded batches.
//!
//! ## Overview
//!
//! - **Millisecond buckets**: deadlines sharing a millisecond share a bucket;
//!   buckets are created lazily and removed the moment they drain to empty.
//! - **FIFO across time**: [`DeadlineEngine::poll`] visits elapsed buckets in
//!   ascending key order, so an earlier deadline is never delivered after a
//!   later one within a call.
//! - **Self-describing ids**: a [`TaskId`] encodes its bucket key, so
//!   [`DeadlineEngine::cancel`] is a single bucket lookup.
//! - **Bounded polls**: every poll delivers at most `max_poll` tasks; the
//!   rest stay scheduled for the next call.
//!
//! The engine never runs scheduled work itself: the caller supplies a handler
//! that is invoked synchronously during `poll`, and the caller owns retries
//! and persistence.
//!
//! The crate also ships [`MemoCache`], a small single-flight memoizing cache
//! that composes with the engine but shares no state with it.
//!
//! ## Example
//!
//! ```
//! use chronex_core::DeadlineEngine;
//!
//! let engine = DeadlineEngine::new();
//! let id = engine.schedule(1_700_000_000_000)?;
//!
//! let mut fired = Vec::new();
//! let delivered = engine.poll(
//!     1_700_000_000_000,
//!     |id| {
//!         fired.push(id);
//!         Ok(())
//!     },
//!     16,
//! )?;
//! assert_eq!(delivered, 1);
//! assert_eq!(fired, vec![id]);
//! assert_eq!(engine.size(), 0);
//! # Ok::<(), chronex_core::EngineError>(())
//! ```

pub mod cache;
pub mod engine;
pub mod error;

pub use cache::MemoCache;
pub use engine::DeadlineEngine;
pub use error::{CacheError, EngineError, Result};

pub use chronex_model::{BucketKey, EngineConfig, TaskId};
