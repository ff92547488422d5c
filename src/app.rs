//! Appliance wiring and the run-loop.
//!
//! The loop owns the event channel. Every button press is handled on its own
//! thread behind the appliance's single-command gate, so a press that lands
//! during a slow generation is dropped rather than queued. An interrupt
//! request (button B), SIGINT/SIGTERM or an external shutdown ends the loop;
//! in-flight presses are allowed to finish first.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{error, info, warn};
use storybook_core::{
    Appliance, BookDir, DeviceEvent, ImageGenerator, PageController, Renderer, StorybookStore,
    TextGenerator,
};

use crate::backends::Backend;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::input;
use crate::panel::PngPanel;
use crate::shutdown::ShutdownSignal;

/// Assemble the appliance from `config` and run it until it is told to stop.
pub fn run(config: AppConfig) -> Result<(), AppError> {
    let backend = Backend::from_config(&config)?;
    let book = BookDir::create(&config.book_dir)?;
    let panel = PngPanel::new(&config.display_output);

    let (events, event_rx) = mpsc::channel();
    let shutdown = ShutdownSignal::new(events.clone());

    let controller = PageController::new(
        backend,
        panel,
        StorybookStore::new(book),
        config.prompts.clone(),
        events.clone(),
    );
    let appliance = Arc::new(Appliance::new(controller));
    #[cfg(unix)]
    let _signals = crate::signals::SignalWatcher::spawn(shutdown.clone())?;
    appliance.start();

    input::spawn_stdin_buttons(events.clone())?;
    let ticker = match config.auto_generate_secs {
        Some(secs) if secs > 0 => Some(input::spawn_auto_generate(
            Duration::from_secs(secs),
            events.clone(),
            shutdown.clone(),
        )?),
        _ => None,
    };
    drop(events);

    info!(" Storybook ready: A next/generate, B quit, D previous");
    run_loop(&appliance, &event_rx, &shutdown);

    if let Some(ticker) = ticker {
        if ticker.join().is_err() {
            warn!(" Auto-generation thread panicked");
        }
    }
    info!(" Storybook stopped on page {}", appliance.cursor().current());
    Ok(())
}

/// Dispatch events until an interrupt or shutdown arrives, then trigger
/// `shutdown` and wait for outstanding presses.
pub fn run_loop<G, R>(
    appliance: &Arc<Appliance<G, R>>,
    events: &Receiver<DeviceEvent>,
    shutdown: &ShutdownSignal,
) where
    G: TextGenerator + ImageGenerator + Send + 'static,
    R: Renderer + Send + 'static,
{
    let mut presses: Vec<JoinHandle<()>> = Vec::new();

    loop {
        let Ok(event) = events.recv() else {
            info!(" All event sources closed");
            break;
        };

        match event {
            DeviceEvent::Button(label) => {
                presses.retain(|handle| !handle.is_finished());
                let appliance = Arc::clone(appliance);
                let spawned = thread::Builder::new()
                    .name(format!("button-{}", label))
                    .spawn(move || {
                        appliance.press(label);
                    });
                match spawned {
                    Ok(handle) => presses.push(handle),
                    Err(e) => error!(" Failed to start handler for button {}: {}", label, e),
                }
            }
            DeviceEvent::InterruptRequested => {
                info!(" Interrupt requested, stopping");
                break;
            }
            DeviceEvent::ShutdownRequested => {
                info!(" Shutdown requested, stopping");
                break;
            }
        }
    }

    shutdown.trigger();
    for handle in presses {
        if handle.join().is_err() {
            warn!(" A button handler panicked");
        }
    }
}
