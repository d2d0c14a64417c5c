//! Deferred scene reload requests
//!
//! Any thread may request a reload; the pipeline only applies it once the current frame has
//! returned to `Idle`.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

#[derive(Debug, Clone, Default)]
pub struct ReloadSignal {
    requested_at: Arc<Mutex<Option<Instant>>>,
}

impl ReloadSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for a reload. Repeated requests before it is applied collapse into one.
    pub fn request(&self) {
        let mut requested_at = self.requested_at.lock();
        if requested_at.is_none() {
            *requested_at = Some(Instant::now());
            log::debug!("[ReloadSignal::request] Scene reload requested");
        }
    }

    pub fn is_pending(&self) -> bool {
        self.requested_at.lock().is_some()
    }

    /// Consume the pending request, returning when it was made
    pub fn take(&self) -> Option<Instant> {
        self.requested_at.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_collapse() {
        let signal = ReloadSignal::new();
        let other = signal.clone();

        signal.request();
        let first = signal.take();
        assert!(first.is_some());
        assert!(!other.is_pending());

        other.request();
        other.request();
        assert!(signal.take().is_some());
        assert!(signal.take().is_none());
    }

    #[test]
    fn test_request_from_other_thread() {
        let signal = ReloadSignal::new();
        let remote = signal.clone();
        std::thread::spawn(move || remote.request()).join().unwrap();
        assert!(signal.is_pending());
    }
}
