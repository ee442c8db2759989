use crate::config::MAX_SEQUENCE_BITS;

/// Sortable key for a millisecond-resolution deadline bucket.
///
/// The key is the deadline truncated to whole milliseconds since the Unix
/// epoch (UTC), so integer ordering of keys is chronological ordering and two
/// deadlines share a key iff they fall in the same millisecond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BucketKey(i64);

impl BucketKey {
    /// Build the key for an absolute UTC timestamp in milliseconds.
    pub fn from_millis(ms: i64) -> Self {
        BucketKey(ms)
    }

    /// The bucket's millisecond, i.e. the truncated deadline it represents.
    pub fn as_millis(self) -> i64 {
        self.0
    }

    /// Largest millisecond timestamp whose key still encodes into a positive
    /// `i64` task id when shifted left by `bits`.
    pub fn max_encodable_millis(bits: u32) -> i64 {
        debug_assert!(bits <= MAX_SEQUENCE_BITS);
        i64::MAX >> bits
    }
}

impl std::fmt::Display for BucketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-facing handle for a scheduled task.
///
/// A task id packs `(BucketKey, sequence)` into one `i64`:
/// the bucket key occupies the high bits and a per-bucket sequence number the
/// low `bits` bits. Decoding an id therefore recovers the exact bucket it
/// lives in, which is what makes cancellation O(1) — no reverse index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaskId(i64);

impl TaskId {
    /// Pack a bucket key and sequence number into a task id.
    ///
    /// The caller is responsible for range checks: `key` must not exceed
    /// [`BucketKey::max_encodable_millis`] for `bits`, and `seq` must be below
    /// `1 << bits`. The engine enforces both before minting ids.
    pub fn encode(key: BucketKey, seq: u64, bits: u32) -> Self {
        debug_assert!(bits >= 1 && bits <= MAX_SEQUENCE_BITS);
        debug_assert!(seq < (1u64 << bits));
        debug_assert!(key.0 <= BucketKey::max_encodable_millis(bits));
        TaskId((key.0 << bits) | seq as i64)
    }

    /// Unpack the id back into its bucket key and sequence number.
    ///
    /// Never panics, even for ids that were not minted by an engine; such
    /// ids simply decode to a bucket that does not exist.
    pub fn decode(self, bits: u32) -> (BucketKey, u64) {
        let key = BucketKey(self.0 >> bits);
        let seq = (self.0 & ((1i64 << bits) - 1)) as u64;
        (key, seq)
    }

    /// The raw encoded value.
    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl From<TaskId> for i64 {
    fn from(id: TaskId) -> i64 {
        id.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SEQUENCE_BITS;

    const BITS: u32 = DEFAULT_SEQUENCE_BITS;

    #[test]
    fn encode_decode_roundtrip() {
        let key = BucketKey::from_millis(1_622_185_001_000);
        for seq in [0u64, 1, 99, (1 << BITS) - 1] {
            let id = TaskId::encode(key, seq, BITS);
            assert_eq!(id.decode(BITS), (key, seq));
        }
    }

    #[test]
    fn key_ordering_is_chronological() {
        let earlier = BucketKey::from_millis(1_000);
        let later = BucketKey::from_millis(1_001);
        assert!(earlier < later);

        // Ids inherit the ordering: a later bucket always outranks an
        // earlier one regardless of sequence numbers.
        let id_hi_seq = TaskId::encode(earlier, (1 << BITS) - 1, BITS);
        let id_lo_seq = TaskId::encode(later, 0, BITS);
        assert!(id_hi_seq < id_lo_seq);
    }

    #[test]
    fn same_millisecond_same_key() {
        assert_eq!(
            BucketKey::from_millis(42),
            BucketKey::from_millis(42),
        );
        assert_ne!(
            BucketKey::from_millis(42),
            BucketKey::from_millis(43),
        );
    }

    #[test]
    fn decode_of_arbitrary_ids_does_not_panic() {
        for raw in [i64::MIN, -1, 0, 1, i64::MAX] {
            let (_key, seq) = TaskId(raw).decode(BITS);
            assert!(seq < (1 << BITS));
        }
    }

    #[test]
    fn max_encodable_covers_realistic_timestamps() {
        // Even with the widest permitted sequence field, keys comfortably
        // hold millisecond timestamps far beyond the year 10000.
        let max = BucketKey::max_encodable_millis(MAX_SEQUENCE_BITS);
        assert!(max > 253_402_300_799_999); // 9999-12-31T23:59:59.999Z
    }
}
