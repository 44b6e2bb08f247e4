//! Random container port allocation.
//!
//! A candidate is drawn uniformly from the configured range and checked
//! against the ports held by stored servers. After a bounded number of
//! collisions allocation fails instead of scanning the range.
//!
//! The check and the later write of the port are not atomic. Two concurrent
//! allocations for different servers can pick the same port; the engine then
//! refuses the second bind and the start fails with a retryable error.

use std::sync::Arc;

use rand::Rng;
use thiserror::Error;
use tracing::debug;

use crate::metrics;
use crate::server::{ServerStore, StoreError};

/// Default number of candidates tried before giving up.
pub const DEFAULT_PORT_ATTEMPTS: u32 = 10;

/// Port allocation failure.
#[derive(Debug, Error)]
pub enum PortError {
    /// Every candidate collided with an assigned port.
    #[error("no free container port after {attempts} attempts")]
    Exhausted { attempts: u32 },

    /// The server config row is missing.
    #[error("server configuration not found")]
    MissingConfig,

    /// The configured range is empty.
    #[error("invalid container port range {min}..={max}")]
    InvalidRange { min: u16, max: u16 },

    /// Reading assignments failed.
    #[error("failed to read port assignments: {0}")]
    Store(#[from] StoreError),
}

/// Picks collision-free container ports.
pub struct PortAllocator {
    store: Arc<dyn ServerStore>,
    max_attempts: u32,
}

impl PortAllocator {
    pub fn new(store: Arc<dyn ServerStore>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Draw a port that no stored server currently holds.
    pub fn allocate(&self) -> Result<u16, PortError> {
        let config = self.store.server_config()?.ok_or(PortError::MissingConfig)?;
        let (min, max) = (config.min_container_port, config.max_container_port);
        if min > max {
            return Err(PortError::InvalidRange { min, max });
        }

        let mut rng = rand::thread_rng();
        for attempt in 1..=self.max_attempts {
            let candidate = rng.gen_range(min..=max);
            if self.store.find_by_container_port(candidate)?.is_none() {
                debug!(port = candidate, attempt, "allocated container port");
                metrics::PORT_ALLOCATION_ATTEMPTS.observe(f64::from(attempt));
                return Ok(candidate);
            }
            debug!(port = candidate, attempt, "container port taken");
        }

        metrics::PORT_ALLOCATION_FAILURES.inc();
        Err(PortError::Exhausted {
            attempts: self.max_attempts,
        })
    }
}
