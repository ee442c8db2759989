//! The deadline engine: a two-level concurrent bucket table.
//!
//! The outer [`DashMap`] maps a [`BucketKey`] (a millisecond) to its bucket;
//! each bucket is an `Arc<Mutex<..>>` so distinct milliseconds mutate fully
//! in parallel while operations on one bucket serialize. Bucket locks are
//! only ever taken after the outer map's shard guard has been dropped, so the
//! two lock levels can never invert.
//!
//! Drain-to-empty removal uses a retire protocol: whichever thread empties a
//! bucket flips its `retired` flag under the bucket lock and is then the only
//! thread allowed to remove the map entry. A `schedule` racing with that
//! removal observes `retired` and retries against a fresh entry, so a stale
//! `Arc` can never resurrect a dead bucket.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use chronex_model::{BucketKey, EngineConfig, TaskId};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{EngineError, Result};

/// One millisecond's worth of scheduled tasks.
///
/// The map value is the raw deadline as supplied by the caller; it is kept
/// for inspection only, the bucket key is authoritative. `next_seq` is a
/// monotone counter: sequence numbers are never reused after a removal, so a
/// cancel-then-schedule within one millisecond cannot mint a duplicate id.
#[derive(Debug, Default)]
struct Bucket {
    tasks: HashMap<TaskId, i64>,
    next_seq: u64,
    retired: bool,
}

/// Concurrent deadline registry with millisecond buckets.
///
/// All operations take `&self`; share the engine across threads behind an
/// [`Arc`] with no external synchronization. One engine instance owns all of
/// its state exclusively and lives for the process lifetime.
///
/// Nothing evicts tasks that are never polled or cancelled; callers are
/// responsible for eventually draining every deadline they schedule.
#[derive(Debug)]
pub struct DeadlineEngine {
    buckets: DashMap<BucketKey, Arc<Mutex<Bucket>>>,
    sequence_bits: u32,
}

impl Default for DeadlineEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DeadlineEngine {
    /// Engine with the default configuration.
    pub fn new() -> Self {
        let config = EngineConfig::default();
        Self {
            buckets: DashMap::with_capacity(config.initial_buckets),
            sequence_bits: config.sequence_bits,
        }
    }

    /// Engine with an explicit bucket-table sizing hint.
    pub fn with_capacity(initial_buckets: usize) -> Self {
        Self::new_unchecked(
            EngineConfig::default().with_initial_buckets(initial_buckets),
        )
    }

    /// Engine with a full, validated configuration.
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new_unchecked(config))
    }

    fn new_unchecked(config: EngineConfig) -> Self {
        Self {
            buckets: DashMap::with_capacity(config.initial_buckets),
            sequence_bits: config.sequence_bits,
        }
    }

    /// Register a deadline and return its unique id.
    ///
    /// `deadline_ms` is an absolute UTC timestamp in milliseconds; it must be
    /// positive and encodable with the configured sequence width. The
    /// returned id is unique among all live ids; scheduling into a bucket
    /// whose sequence space is exhausted fails with
    /// [`EngineError::BucketFull`] instead of minting an undecodable id.
    pub fn schedule(&self, deadline_ms: i64) -> Result<TaskId> {
        if deadline_ms <= 0 {
            return Err(EngineError::InvalidTimestamp(deadline_ms));
        }
        if deadline_ms > BucketKey::max_encodable_millis(self.sequence_bits) {
            return Err(EngineError::TimestampOutOfRange {
                ts: deadline_ms,
                bits: self.sequence_bits,
            });
        }

        let key = BucketKey::from_millis(deadline_ms);
        let capacity = 1u64 << self.sequence_bits;

        loop {
            let slot = {
                let entry = self.buckets.entry(key).or_insert_with(|| {
                    trace!("bucket created: key={key}");
                    Arc::new(Mutex::new(Bucket::default()))
                });
                Arc::clone(entry.value())
            };

            let mut bucket = slot.lock();
            if bucket.retired {
                // Lost a race against drain-to-empty removal; the entry is
                // gone or about to be, so fetch a fresh one.
                continue;
            }
            if bucket.next_seq >= capacity {
                return Err(EngineError::BucketFull { key, capacity });
            }
            let seq = bucket.next_seq;
            bucket.next_seq += 1;

            let id = TaskId::encode(key, seq, self.sequence_bits);
            bucket.tasks.insert(id, deadline_ms);
            trace!("task scheduled: id={id} key={key} seq={seq}");
            return Ok(id);
        }
    }

    /// Register a deadline given as a [`DateTime<Utc>`].
    pub fn schedule_at(&self, when: DateTime<Utc>) -> Result<TaskId> {
        self.schedule(when.timestamp_millis())
    }

    /// Remove a scheduled task before it fires.
    ///
    /// Returns whether the id was live. Idempotent: cancelling an unknown,
    /// already-cancelled, or already-delivered id returns `false` with no
    /// side effects, for arbitrary ids.
    pub fn cancel(&self, id: TaskId) -> bool {
        let (key, _seq) = id.decode(self.sequence_bits);
        let slot = match self.buckets.get(&key) {
            Some(entry) => Arc::clone(entry.value()),
            None => return false,
        };

        let mut bucket = slot.lock();
        if bucket.retired || bucket.tasks.remove(&id).is_none() {
            return false;
        }
        if bucket.tasks.is_empty() {
            bucket.retired = true;
            drop(bucket);
            self.buckets.remove(&key);
            trace!("bucket retired: key={key}");
        }
        trace!("task cancelled: id={id}");
        true
    }

    /// Deliver and remove elapsed tasks, earliest bucket first.
    ///
    /// Visits every bucket whose key is `<=` the bucket of `now_ms`
    /// (inclusive of the current millisecond) in ascending key order, calling
    /// `handler` once per delivered task, until `max_poll` tasks have been
    /// delivered or no eligible bucket remains. Buckets past the horizon are
    /// never touched. `max_poll == 0` returns `Ok(0)` without invoking the
    /// handler.
    ///
    /// A delivered task is removed before the handler's result is inspected,
    /// so a failing handler still consumes its task; the error is then
    /// propagated fail-fast (remaining eligible buckets are left for the next
    /// call) with all engine invariants intact. Callers that need per-task
    /// isolation should catch inside their own handler.
    ///
    /// The handler runs while its bucket's lock is held, and bucket locks
    /// are not reentrant: a handler must not call back into the engine
    /// (`schedule`, `cancel`, `poll`, or `size`), or it can deadlock on the
    /// bucket it is being delivered from.
    ///
    /// Within one bucket the delivery order is unspecified.
    pub fn poll<F>(
        &self,
        now_ms: i64,
        mut handler: F,
        max_poll: usize,
    ) -> Result<usize>
    where
        F: FnMut(TaskId) -> anyhow::Result<()>,
    {
        if now_ms <= 0 {
            return Err(EngineError::InvalidTimestamp(now_ms));
        }
        if max_poll == 0 {
            return Ok(0);
        }

        let started = Instant::now();
        let horizon = BucketKey::from_millis(now_ms);

        // Snapshot eligible keys without holding any lock across the walk.
        // A bucket created after this point waits for the next poll.
        let mut eligible: Vec<BucketKey> = self
            .buckets
            .iter()
            .map(|entry| *entry.key())
            .filter(|key| *key <= horizon)
            .collect();
        eligible.sort_unstable();

        let bucket_count = eligible.len();
        let mut delivered = 0usize;

        for key in eligible {
            if delivered >= max_poll {
                break;
            }
            let slot = match self.buckets.get(&key) {
                Some(entry) => Arc::clone(entry.value()),
                None => continue, // drained by a concurrent poll or cancel
            };

            let mut bucket = slot.lock();
            if bucket.retired {
                continue;
            }

            let mut failure: Option<anyhow::Error> = None;
            while delivered < max_poll && failure.is_none() {
                let Some(&id) = bucket.tasks.keys().next() else {
                    break;
                };
                bucket.tasks.remove(&id);
                delivered += 1;
                if let Err(err) = handler(id) {
                    failure = Some(err);
                }
            }

            if bucket.tasks.is_empty() {
                bucket.retired = true;
                drop(bucket);
                self.buckets.remove(&key);
                trace!("bucket retired: key={key}");
            }

            if let Some(err) = failure {
                return Err(EngineError::Handler(err));
            }
        }

        debug!(
            "poll complete: horizon={horizon} buckets={bucket_count} \
             delivered={delivered} elapsed={:?}",
            started.elapsed()
        );
        Ok(delivered)
    }

    /// [`Self::poll`] with the horizon given as a [`DateTime<Utc>`].
    pub fn poll_at<F>(
        &self,
        now: DateTime<Utc>,
        handler: F,
        max_poll: usize,
    ) -> Result<usize>
    where
        F: FnMut(TaskId) -> anyhow::Result<()>,
    {
        self.poll(now.timestamp_millis(), handler, max_poll)
    }

    /// Number of live tasks, summed over all buckets.
    ///
    /// An O(buckets) aggregation, not O(1).
    pub fn size(&self) -> usize {
        self.buckets
            .iter()
            .map(|entry| entry.value().lock().tasks.len())
            .sum()
    }
}
