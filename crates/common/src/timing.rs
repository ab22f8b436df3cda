//! Timing utilities for export instrumentation.
//!
//! Every export is anchored to a monotonic clock started when the request is
//! accepted. This module provides utilities for:
//! - Capturing the start instant alongside its wall-clock timestamp
//! - Measuring per-stage laps for structured logs

use std::time::{Duration, Instant};

/// A monotonic clock anchored at the start of one export.
#[derive(Debug, Clone)]
pub struct ExportClock {
    /// The instant the export started.
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,

    /// End of the previous lap.
    last_lap: Instant,
}

impl ExportClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            epoch: now,
            epoch_wall: chrono::Utc::now().to_rfc3339(),
            last_lap: now,
        }
    }

    /// Milliseconds elapsed since the export started.
    pub fn elapsed_ms(&self) -> u128 {
        self.epoch.elapsed().as_millis()
    }

    /// Wall-clock time at export start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }

    /// Time since the previous lap (or since start), resetting the lap mark.
    pub fn lap(&mut self) -> Duration {
        let now = Instant::now();
        let lap = now.duration_since(self.last_lap);
        self.last_lap = now;
        lap
    }

    /// Milliseconds since the previous lap, resetting the lap mark.
    pub fn lap_ms(&mut self) -> u128 {
        self.lap().as_millis()
    }
}

/// Format a wall-clock timestamp suitable for file names (`20240131-235959`).
pub fn file_stamp() -> String {
    chrono::Local::now().format("%Y%m%d-%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_elapsed() {
        let clock = ExportClock::start();
        // Should be very small but non-negative
        assert!(clock.elapsed_ms() < 1_000);
    }

    #[test]
    fn test_laps_reset() {
        let mut clock = ExportClock::start();
        std::thread::sleep(Duration::from_millis(5));
        let first = clock.lap();
        assert!(first >= Duration::from_millis(5));
        let second = clock.lap();
        assert!(second < first);
    }

    #[test]
    fn test_epoch_wall_is_rfc3339() {
        let clock = ExportClock::start();
        assert!(chrono::DateTime::parse_from_rfc3339(clock.epoch_wall()).is_ok());
    }

    #[test]
    fn test_file_stamp_shape() {
        let stamp = file_stamp();
        assert_eq!(stamp.len(), 15);
        assert_eq!(stamp.as_bytes()[8], b'-');
    }
}
