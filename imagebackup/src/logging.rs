//! Logging setup for the `imagebackup` binary.
//!
//! Everything diagnostic goes to stderr through `tracing`. Each line carries
//! its level (`ERROR`, `WARN`, `INFO`) as a prefix, which is how errors,
//! warnings and information are told apart.

use std::cell::Cell;
use std::time::{Duration, Instant};
use tracing::Level;

/// Installs the stderr subscriber. Call once, first thing in `main`.
///
/// The level is fixed at INFO: the tool reads no environment or config file.
pub fn init() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::INFO)
        .with_target(false)
        .without_time()
        .init();
}

/// A rate limiter for progress messages.
///
/// Used when stderr is not a terminal and the progress bar is hidden, so a
/// multi-hour copy logs a line every few seconds instead of once per block.
pub struct LogThrottle {
    interval: Duration,
    last: Cell<Option<Instant>>,
}

impl LogThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Cell::new(None),
        }
    }

    /// Returns true if nothing was logged within the interval.
    pub fn should_log(&self) -> bool {
        let now = Instant::now();
        match self.last.get() {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last.set(Some(now));
                true
            }
        }
    }
}
