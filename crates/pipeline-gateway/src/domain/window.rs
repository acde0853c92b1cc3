//! Prefetch window sizing.

use crate::domain::config::ConfigError;

/// How many requests a streaming call keeps in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    initial: usize,
    replenish: usize,
}

impl WindowPolicy {
    /// Both sizes must be positive.
    pub fn new(initial: usize, replenish: usize) -> Result<Self, ConfigError> {
        if initial == 0 {
            return Err(ConfigError::InvalidWindow("prefetch must be > 0".into()));
        }
        if replenish == 0 {
            return Err(ConfigError::InvalidWindow(
                "prefetch_on_recv must be > 0".into(),
            ));
        }
        Ok(Self { initial, replenish })
    }

    /// One request at a time.
    pub fn sequential() -> Self {
        Self {
            initial: 1,
            replenish: 1,
        }
    }

    /// Requests admitted before anything is yielded
    pub fn initial(&self) -> usize {
        self.initial
    }

    /// Requests admitted per delivered response
    pub fn replenish(&self) -> usize {
        self.replenish
    }

    /// Upper bound on in-flight requests at any moment.
    pub fn capacity(&self) -> usize {
        self.initial.max(self.replenish)
    }
}
