//! Event sources feeding the run-loop.
//!
//! Buttons arrive as lines on stdin (`a`..`d`, `q` to quit). The optional
//! auto-generation ticker presses A on a fixed period until shutdown.

use std::io::{self, BufRead};
use std::str::FromStr;
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};
use storybook_core::{ButtonLabel, DeviceEvent};

use crate::error::AppError;
use crate::shutdown::ShutdownSignal;

/// Interpret one line of button input. Blank lines and unknown input yield
/// nothing.
pub fn parse_line(line: &str) -> Option<DeviceEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if ["q", "quit", "exit"]
        .iter()
        .any(|word| line.eq_ignore_ascii_case(word))
    {
        return Some(DeviceEvent::ShutdownRequested);
    }
    match ButtonLabel::from_str(line) {
        Ok(label) => Some(DeviceEvent::Button(label)),
        Err(e) => {
            warn!(" Ignoring input: {}", e);
            None
        }
    }
}

/// Read button lines from stdin until EOF.
///
/// The thread is left detached: a blocked read cannot be interrupted.
pub fn spawn_stdin_buttons(events: Sender<DeviceEvent>) -> Result<JoinHandle<()>, AppError> {
    let handle = thread::Builder::new()
        .name("stdin-buttons".to_owned())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(" Failed to read button input: {}", e);
                        break;
                    }
                };
                if let Some(event) = parse_line(&line) {
                    if events.send(event).is_err() {
                        break;
                    }
                }
            }
            debug!(" Button input closed");
        })?;
    Ok(handle)
}

/// Press A now and then every `period` until `shutdown` fires.
pub fn spawn_auto_generate(
    period: Duration,
    events: Sender<DeviceEvent>,
    shutdown: ShutdownSignal,
) -> Result<JoinHandle<()>, AppError> {
    info!(" Generating a page every {}s", period.as_secs());
    let handle = thread::Builder::new()
        .name("auto-generate".to_owned())
        .spawn(move || loop {
            if events.send(DeviceEvent::Button(ButtonLabel::A)).is_err() {
                break;
            }
            if shutdown.wait_timeout(period) {
                debug!(" Auto-generation stopped");
                break;
            }
        })?;
    Ok(handle)
}
