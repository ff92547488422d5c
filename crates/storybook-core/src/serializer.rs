//! Single-command gate for button presses.
//!
//! A press that arrives while another command is still running is dropped,
//! not queued. Debouncing happens upstream at the button source.

use core::sync::atomic::{AtomicBool, Ordering};

use log::debug;

/// Lets at most one command run at a time; overlapping commands are refused.
#[derive(Debug, Default)]
pub struct CommandSerializer {
    busy: AtomicBool,
}

impl CommandSerializer {
    pub const fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    /// Run `action` to completion if no other command is running.
    ///
    /// Returns `false` without calling `action` when the gate is taken.
    pub fn try_dispatch<F: FnOnce()>(&self, action: F) -> bool {
        if self
            .busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            debug!(" Command refused, another command is in flight");
            return false;
        }

        // Released on drop so a panicking command does not wedge the gate.
        let _busy = BusyGuard(&self.busy);
        action();
        true
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
