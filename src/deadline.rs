// ABOUTME: Deadline — the cancellation/deadline handle threaded through
// ABOUTME: EvalContext and the Sandbox contract (spec §3.5, §5)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A deadline/cancellation handle. Cheap to clone; a clone observes the
/// same cancellation flag and expiry instant as its source.
#[derive(Debug, Clone)]
pub struct Deadline {
    expires_at: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl Deadline {
    /// No deadline, never expires unless explicitly cancelled.
    pub fn none() -> Self {
        Self {
            expires_at: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn after(duration: Duration) -> Self {
        Self {
            expires_at: Some(Instant::now() + duration),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A handle that, when signaled via `cancel()`, marks this deadline
    /// (and every clone of it) expired immediately.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_expired(&self) -> bool {
        if self.cancelled.load(Ordering::Relaxed) {
            return true;
        }
        matches!(self.expires_at, Some(at) if Instant::now() >= at)
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_deadline_never_expires() {
        assert!(!Deadline::none().is_expired());
    }

    #[test]
    fn zero_duration_deadline_expires_immediately() {
        let d = Deadline::after(Duration::from_secs(0));
        std::thread::sleep(Duration::from_millis(1));
        assert!(d.is_expired());
    }

    #[test]
    fn cancel_handle_expires_all_clones() {
        let d = Deadline::after(Duration::from_secs(60));
        let handle = d.cancel_handle();
        assert!(!d.is_expired());
        handle.store(true, Ordering::Relaxed);
        assert!(d.is_expired());
    }
}
