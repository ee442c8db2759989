use crate::error::{ModelError, Result};

/// Default width of the per-bucket sequence field, in bits.
///
/// Twenty bits allow over a million live ids per millisecond bucket before
/// the sequence space is exhausted.
pub const DEFAULT_SEQUENCE_BITS: u32 = 20;

/// Widest permitted sequence field.
///
/// Millisecond timestamps occupy roughly 41 bits for the current era; capping
/// the sequence at 22 bits keeps every encoded id a positive `i64` for any
/// timestamp up to [`crate::BucketKey::max_encodable_millis`].
pub const MAX_SEQUENCE_BITS: u32 = 22;

/// Sizing and id-width configuration for a deadline engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Initial capacity hint for the bucket table.
    pub initial_buckets: usize,
    /// Width of the per-bucket sequence field in each task id.
    ///
    /// A bucket can hold at most `1 << sequence_bits` ids over its lifetime;
    /// scheduling beyond that fails rather than minting an undecodable id.
    pub sequence_bits: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_buckets: 16,
            sequence_bits: DEFAULT_SEQUENCE_BITS,
        }
    }
}

impl EngineConfig {
    /// Configuration with an explicit bucket-table sizing hint.
    pub fn with_initial_buckets(mut self, initial_buckets: usize) -> Self {
        self.initial_buckets = initial_buckets;
        self
    }

    /// Override the sequence field width.
    pub fn with_sequence_bits(mut self, bits: u32) -> Self {
        self.sequence_bits = bits;
        self
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.sequence_bits < 1 || self.sequence_bits > MAX_SEQUENCE_BITS {
            return Err(ModelError::InvalidConfig(format!(
                "sequence_bits must be between 1 and {MAX_SEQUENCE_BITS}, got {}",
                self.sequence_bits
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_width_sequence() {
        let config = EngineConfig::default().with_sequence_bits(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_oversized_sequence() {
        let config =
            EngineConfig::default().with_sequence_bits(MAX_SEQUENCE_BITS + 1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn builders_compose() {
        let config = EngineConfig::default()
            .with_initial_buckets(4)
            .with_sequence_bits(8);
        assert_eq!(config.initial_buckets, 4);
        assert_eq!(config.sequence_bits, 8);
        assert!(config.validate().is_ok());
    }
}
