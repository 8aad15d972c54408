//! Ambient logging setup and a small performance-timing helper, used the
//! same way throughout the ledger, packaging, and bindle layers: wrap an
//! operation, log its duration at `debug` on completion.

use log::debug;
use std::time::Instant;

/// Initialize the process-wide logger from `RUST_LOG` (or `info` if unset).
/// Safe to call more than once; a second call is a no-op.
pub fn init_logger() {
    match env_logger::try_init() {
        Ok(_) => debug!("logger initialized"),
        Err(_) => debug!("logger already initialized, skipping"),
    }
}

/// Times a named operation and logs its elapsed duration when dropped, or
/// explicitly via [`PerformanceTimer::elapsed_ms`].
pub struct PerformanceTimer {
    start: Instant,
    operation: &'static str,
}

impl PerformanceTimer {
    pub fn new(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Drop for PerformanceTimer {
    fn drop(&mut self) {
        debug!("{} took {}ms", self.operation, self.elapsed_ms());
    }
}
