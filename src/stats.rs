//! Transfer statistics types.

use std::time::{Duration, Instant};

/// Statistics for a single saved item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemStats {
    /// Payload size in bytes.
    pub bytes: u64,
    /// Time from issuing the transfer request to the file being in place.
    pub elapsed: Duration,
}

impl ItemStats {
    /// Returns the average transfer speed in bytes per second.
    #[must_use]
    pub fn average_speed(&self) -> u64 {
        bytes_per_sec(self.bytes, self.elapsed)
    }
}

/// Statistics for an entire download session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    /// Number of items saved to disk.
    pub files_saved: usize,
    /// Total bytes saved.
    pub total_bytes: u64,
    /// Total elapsed time for the session, pacing delays included.
    pub elapsed: Duration,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStats {
    /// Creates a new empty session stats.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            files_saved: 0,
            total_bytes: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Returns the average download speed in bytes per second.
    #[must_use]
    pub fn average_speed(&self) -> u64 {
        bytes_per_sec(self.total_bytes, self.elapsed)
    }
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn bytes_per_sec(bytes: u64, elapsed: Duration) -> u64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        (bytes as f64 / secs) as u64
    } else {
        0
    }
}

/// Builder for accumulating session statistics during a run.
#[derive(Debug)]
pub struct SessionStatsBuilder {
    files_saved: usize,
    total_bytes: u64,
    start_time: Instant,
}

impl Default for SessionStatsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStatsBuilder {
    /// Creates a new session stats builder; the clock starts now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            files_saved: 0,
            total_bytes: 0,
            start_time: Instant::now(),
        }
    }

    /// Records a saved item of `bytes` bytes.
    pub const fn add_saved(&mut self, bytes: u64) {
        self.files_saved += 1;
        self.total_bytes += bytes;
    }

    /// Builds the final session statistics.
    #[must_use]
    pub fn build(&self) -> SessionStats {
        SessionStats {
            files_saved: self.files_saved,
            total_bytes: self.total_bytes,
            elapsed: self.start_time.elapsed(),
        }
    }
}
