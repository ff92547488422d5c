//! Cooperative stop token shared by the run-loop and its helper threads.

use std::sync::mpsc::Sender;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use storybook_core::DeviceEvent;

/// Set once; every clone observes it. Triggering also posts
/// [`DeviceEvent::ShutdownRequested`] so a loop blocked on its event channel
/// wakes up.
#[derive(Clone)]
pub struct ShutdownSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
    events: Sender<DeviceEvent>,
}

impl ShutdownSignal {
    pub fn new(events: Sender<DeviceEvent>) -> Self {
        Self {
            inner: Arc::new((Mutex::new(false), Condvar::new())),
            events,
        }
    }

    pub fn trigger(&self) {
        let (lock, cvar) = &*self.inner;
        let mut stopped = lock.lock().unwrap_or_else(PoisonError::into_inner);
        if *stopped {
            return;
        }
        *stopped = true;
        cvar.notify_all();
        // The loop may already be gone.
        let _ = self.events.send(DeviceEvent::ShutdownRequested);
    }

    pub fn is_triggered(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until triggered or `duration` elapses. Returns `true` if triggered.
    pub fn wait_timeout(&self, duration: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let deadline = Instant::now() + duration;
        let mut stopped = lock.lock().unwrap_or_else(PoisonError::into_inner);

        while !*stopped {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            stopped = cvar
                .wait_timeout(stopped, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        *stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn test_wait_times_out_when_not_triggered() {
        let (tx, _rx) = mpsc::channel();
        let signal = ShutdownSignal::new(tx);
        assert!(!signal.wait_timeout(Duration::from_millis(20)));
        assert!(!signal.is_triggered());
    }

    #[test]
    fn test_trigger_wakes_waiter_and_posts_event() {
        let (tx, rx) = mpsc::channel();
        let signal = ShutdownSignal::new(tx);
        let waiter = signal.clone();

        let handle = thread::spawn(move || waiter.wait_timeout(Duration::from_secs(30)));
        signal.trigger();

        assert!(handle.join().unwrap());
        assert_eq!(rx.recv().unwrap(), DeviceEvent::ShutdownRequested);
    }

    #[test]
    fn test_trigger_is_idempotent() {
        let (tx, rx) = mpsc::channel();
        let signal = ShutdownSignal::new(tx);
        signal.trigger();
        signal.trigger();

        assert!(signal.wait_timeout(Duration::ZERO));
        assert_eq!(rx.try_iter().count(), 1);
    }
}
