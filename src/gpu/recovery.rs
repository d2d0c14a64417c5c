//! Backend health tracking and suspension detection

use std::time::{Duration, Instant};

/// Tracks backend failures and caps how often the pipeline tries to restart it
#[derive(Debug, Clone)]
pub struct GpuHealthMonitor {
    error_count: usize,
    last_error_time: Option<Instant>,

    /// Restarts since the last clean frame
    recovery_attempts: usize,

    max_recovery_attempts: usize,
}

impl GpuHealthMonitor {
    pub fn new(max_recovery_attempts: usize) -> Self {
        Self {
            error_count: 0,
            last_error_time: None,
            recovery_attempts: 0,
            max_recovery_attempts,
        }
    }

    pub fn record_error(&mut self, now: Instant) {
        self.error_count += 1;
        self.last_error_time = Some(now);
        log::warn!("[GpuHealthMonitor] Error recorded. Total errors: {}", self.error_count);
    }

    pub fn record_recovery_attempt(&mut self) {
        self.recovery_attempts += 1;
        log::info!("[GpuHealthMonitor] Recovery attempt #{}", self.recovery_attempts);
    }

    /// A frame completed without backend errors
    pub fn record_clean_frame(&mut self) {
        if self.recovery_attempts > 0 {
            log::info!(
                "[GpuHealthMonitor] Backend healthy after {} recovery attempt(s)",
                self.recovery_attempts
            );
            self.recovery_attempts = 0;
        }
    }

    pub fn should_attempt_recovery(&self) -> bool {
        if self.recovery_attempts >= self.max_recovery_attempts {
            log::error!("[GpuHealthMonitor] Maximum recovery attempts reached");
            return false;
        }
        true
    }

    pub fn recovery_attempts(&self) -> usize {
        self.recovery_attempts
    }

    /// Backend errors over the pipeline's lifetime; never reset
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn last_error_time(&self) -> Option<Instant> {
        self.last_error_time
    }
}

/// Detects host suspension from the gap between frames
#[derive(Debug, Clone)]
pub struct FrameWatchdog {
    threshold: Duration,
    last_frame: Option<Instant>,
}

impl FrameWatchdog {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            last_frame: None,
        }
    }

    /// True when more than the threshold passed since the last recorded frame
    pub fn is_suspended(&self, now: Instant) -> bool {
        match self.last_frame {
            Some(last) => now.saturating_duration_since(last) > self.threshold,
            None => false,
        }
    }

    pub fn record_frame(&mut self, now: Instant) {
        self.last_frame = Some(now);
    }

    pub fn last_frame(&self) -> Option<Instant> {
        self.last_frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_capped_until_clean_frame() {
        let mut monitor = GpuHealthMonitor::new(2);
        assert!(monitor.should_attempt_recovery());

        monitor.record_recovery_attempt();
        monitor.record_recovery_attempt();
        assert!(!monitor.should_attempt_recovery());

        let failed_at = Instant::now();
        monitor.record_error(failed_at);
        monitor.record_clean_frame();
        assert!(monitor.should_attempt_recovery());
        assert_eq!(monitor.error_count(), 1);
        assert_eq!(monitor.last_error_time(), Some(failed_at));
    }

    #[test]
    fn test_watchdog_threshold_is_exclusive() {
        let start = Instant::now();
        let mut watchdog = FrameWatchdog::new(Duration::from_secs(60));
        assert!(!watchdog.is_suspended(start));

        watchdog.record_frame(start);
        assert!(!watchdog.is_suspended(start + Duration::from_secs(60)));
        assert!(watchdog.is_suspended(start + Duration::from_secs(61)));
    }
}
