//! Turns SIGINT and SIGTERM into a graceful stop.
//!
//! The first signal triggers the [`ShutdownSignal`], so the run-loop drains
//! in-flight presses and the storybook is left consistent. A second signal
//! while that is happening exits straight away.

use std::ffi::c_int;
use std::io;
use std::thread::{self, JoinHandle};

use log::{info, warn};
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};

use crate::error::AppError;
use crate::shutdown::ShutdownSignal;

/// Watches for termination signals until dropped.
#[derive(Debug)]
pub struct SignalWatcher {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl SignalWatcher {
    /// Watch SIGINT and SIGTERM.
    pub fn spawn(shutdown: ShutdownSignal) -> Result<Self, AppError> {
        Self::watch(&[SIGINT, SIGTERM], shutdown)
    }

    pub fn watch(signals: &[c_int], shutdown: ShutdownSignal) -> Result<Self, AppError> {
        let mut signals = Signals::new(signals).map_err(io::Error::other)?;
        let handle = signals.handle();
        let thread = thread::Builder::new()
            .name("signals".to_owned())
            .spawn(move || {
                for signal in signals.forever() {
                    if shutdown.is_triggered() {
                        warn!(" Signal {} received again, exiting now", signal);
                        std::process::exit(128 + signal);
                    }
                    info!(" Signal {} received, finishing the current page", signal);
                    shutdown.trigger();
                }
            })?;
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

impl Drop for SignalWatcher {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    use signal_hook::consts::signal::{SIGUSR1, SIGUSR2};
    use storybook_core::DeviceEvent;

    #[test]
    fn test_signal_triggers_shutdown() {
        let (events, event_rx) = mpsc::channel();
        let shutdown = ShutdownSignal::new(events);
        let watcher = SignalWatcher::watch(&[SIGUSR1], shutdown.clone()).unwrap();

        signal_hook::low_level::raise(SIGUSR1).unwrap();

        assert!(shutdown.wait_timeout(Duration::from_secs(5)));
        assert_eq!(
            event_rx.recv_timeout(Duration::from_secs(5)),
            Ok(DeviceEvent::ShutdownRequested)
        );
        drop(watcher);
    }

    #[test]
    fn test_drop_stops_watching() {
        let (events, _event_rx) = mpsc::channel();
        let shutdown = ShutdownSignal::new(events);
        let watcher = SignalWatcher::watch(&[SIGUSR2], shutdown.clone()).unwrap();

        drop(watcher);

        assert!(!shutdown.is_triggered());
    }
}
