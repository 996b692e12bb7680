use std::time::Duration;

use snafu::Snafu;

/// Batcher tuning knobs.
#[derive(Debug, Clone)]
pub struct BatcherConfig {
    pub max_batch_size: usize,
    pub batch_timeout: Duration,
    /// Soft queue capacity. `None` means "unbounded" subject to the hard
    /// backstop of `10 * max_batch_size` applied regardless, to avoid
    /// pathological pile-ups ahead of a stalled detector.
    pub queue_capacity: Option<usize>,
}

#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("max_batch_size must be in 1..=64, got {value}"))]
    InvalidMaxBatchSize { value: usize },
    #[snafu(display("batch_timeout must be at least 1ms, got {value:?}"))]
    InvalidBatchTimeout { value: Duration },
}

impl BatcherConfig {
    pub fn new(max_batch_size: usize, batch_timeout: Duration) -> Result<Self, ConfigError> {
        if max_batch_size == 0 || max_batch_size > 64 {
            return InvalidMaxBatchSizeSnafu {
                value: max_batch_size,
            }
            .fail();
        }
        if batch_timeout.is_zero() {
            return InvalidBatchTimeoutSnafu {
                value: batch_timeout,
            }
            .fail();
        }
        Ok(Self {
            max_batch_size,
            batch_timeout,
            queue_capacity: None,
        })
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// The effective hard cap on queued-but-not-yet-batched submissions:
    /// the configured soft capacity, clamped to `10 * max_batch_size`.
    pub fn effective_queue_capacity(&self) -> usize {
        let hard_cap = self.max_batch_size * 10;
        match self.queue_capacity {
            Some(configured) => configured.min(hard_cap),
            None => hard_cap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_and_oversized_batch() {
        assert!(BatcherConfig::new(0, Duration::from_millis(50)).is_err());
        assert!(BatcherConfig::new(65, Duration::from_millis(50)).is_err());
        assert!(BatcherConfig::new(64, Duration::from_millis(50)).is_ok());
    }

    #[test]
    fn effective_capacity_clamps_to_hard_cap() {
        let cfg = BatcherConfig::new(4, Duration::from_millis(10))
            .unwrap()
            .with_queue_capacity(1_000);
        assert_eq!(cfg.effective_queue_capacity(), 40);

        let cfg = BatcherConfig::new(4, Duration::from_millis(10)).unwrap();
        assert_eq!(cfg.effective_queue_capacity(), 40);
    }
}
