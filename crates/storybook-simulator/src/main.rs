//! Desktop simulator for the storybook appliance.
//!
//! Drives storybook-core in an SDL2 window via `embedded-graphics-simulator`.
//! Text and illustrations come from canned generators, so the page flow can
//! be exercised without any model behind it.
//!
//! # Key bindings
//!
//! | Key | Action                          |
//! |-----|---------------------------------|
//! | A   | Next page / generate a new one  |
//! | B   | Interrupt (quits)               |
//! | C   | Reserved                        |
//! | D   | Previous page                   |
//! | Q   | Quit                            |
//!
//! The book is kept in `simulator-book/` unless a directory is passed as the
//! first argument.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics_simulator::{
    OutputSettingsBuilder, SimulatorDisplay, SimulatorEvent, Window, sdl2::Keycode,
};
use log::{error, info, warn};

use storybook_core::compose::{PAGE_HEIGHT_PX, PAGE_WIDTH_PX};
use storybook_core::{
    Appliance, BookDir, ButtonLabel, DeviceEvent, FrameBuffer, ImageGenerator, PageController,
    PromptTemplates, Renderer, StoryError, StorybookStore, TextGenerator,
};

// ---------------------------------------------------------------------------
// Display constants
// ---------------------------------------------------------------------------

/// Pixel scale factor for the simulator window.
const WINDOW_SCALE: u32 = 1;

/// Target frame duration (~30 FPS).
const FRAME_DURATION: Duration = Duration::from_millis(33);

/// Pretend generation takes a while so overlapping presses can be tried out.
const MOCK_GENERATION_DELAY: Duration = Duration::from_millis(1500);

const DEFAULT_BOOK_DIR: &str = "simulator-book";

// ---------------------------------------------------------------------------
// Mock generators
// ---------------------------------------------------------------------------

const MOCK_LINES: &[&str] = &[
    "A small lantern woke up in the attic and decided tonight it would find the moon.",
    "The lantern rolled past a sleeping cat, who dreamed of fish made of starlight.",
    "Outside, an old oak whispered directions in a language only lanterns understand.",
    "At the river, a frog in a paper crown offered a ride across on a lily pad.",
    "Halfway across, the water turned silver and the moon leaned down to say hello.",
    "The lantern glowed so brightly that every window in the village lit up in reply.",
];

/// Cycles through canned sentences and paints a colour-shifted gradient.
struct MockStoryteller {
    pages: AtomicUsize,
}

impl MockStoryteller {
    fn new() -> Self {
        Self {
            pages: AtomicUsize::new(0),
        }
    }
}

impl TextGenerator for MockStoryteller {
    fn generate_text(&self, _persona: &str, prompt: &str) -> Result<String, StoryError> {
        thread::sleep(MOCK_GENERATION_DELAY);
        let n = self.pages.fetch_add(1, Ordering::SeqCst);
        info!("Mock text for prompt of {} chars", prompt.len());
        Ok(MOCK_LINES[n % MOCK_LINES.len()].to_owned())
    }
}

impl ImageGenerator for MockStoryteller {
    fn generate_image(&self, prompt: &str, output: &Path) -> Result<(), StoryError> {
        // Hue depends on the prompt so pages are told apart at a glance.
        let seed = prompt.bytes().fold(0u8, |acc, b| acc.wrapping_mul(31).wrapping_add(b));
        let image = image::RgbImage::from_fn(256, 256, |x, y| {
            image::Rgb([(x as u8).wrapping_add(seed), (y as u8) / 2 + 64, 255 - (x as u8) / 2])
        });
        image.save(output)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Latest presented frame, picked up by the window loop.
type FrameSlot = Arc<Mutex<Option<FrameBuffer>>>;

struct WindowRenderer {
    slot: FrameSlot,
}

impl Renderer for WindowRenderer {
    fn present(&mut self, frame: &FrameBuffer) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame.clone());
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

fn keycode_to_button(keycode: Keycode) -> Option<ButtonLabel> {
    match keycode {
        Keycode::A => Some(ButtonLabel::A),
        Keycode::B => Some(ButtonLabel::B),
        Keycode::C => Some(ButtonLabel::C),
        Keycode::D => Some(ButtonLabel::D),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Press threads
// ---------------------------------------------------------------------------

/// Button presses run off the window thread and are joined before exit.
#[derive(Default)]
struct PressThreads {
    handles: Vec<JoinHandle<()>>,
}

impl PressThreads {
    fn spawn(
        &mut self,
        appliance: &Arc<Appliance<MockStoryteller, WindowRenderer>>,
        label: ButtonLabel,
    ) {
        self.handles.retain(|press| !press.is_finished());
        let appliance = Arc::clone(appliance);
        self.handles.push(thread::spawn(move || {
            if !appliance.press(label) {
                info!("Button {} ignored, still busy", label);
            }
        }));
    }

    /// Wait for every outstanding press. Returns how many panicked.
    fn join_all(self) -> usize {
        if !self.handles.is_empty() {
            info!("Waiting for {} button press(es) to finish", self.handles.len());
        }
        let mut panicked = 0;
        for press in self.handles {
            if press.join().is_err() {
                warn!("A button press panicked before exit");
                panicked += 1;
            }
        }
        panicked
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();
    info!("Starting storybook simulator");
    info!("Keys: A=Next/Generate  B=Interrupt  C=Reserved  D=Previous  Q=Quit");

    let book_dir = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BOOK_DIR));
    let book = match BookDir::create(&book_dir) {
        Ok(book) => book,
        Err(e) => {
            error!("Cannot open book at {}: {}", book_dir.display(), e);
            return;
        }
    };

    let slot = FrameSlot::default();
    let (events, event_rx) = mpsc::channel();
    let controller = PageController::new(
        MockStoryteller::new(),
        WindowRenderer { slot: slot.clone() },
        StorybookStore::new(book),
        PromptTemplates::default(),
        events,
    );
    let appliance = Arc::new(Appliance::new(controller));
    appliance.start();

    // Panel is landscape: the rotated page.
    let mut display = SimulatorDisplay::<Rgb888>::new(Size::new(PAGE_HEIGHT_PX, PAGE_WIDTH_PX));
    let output_settings = OutputSettingsBuilder::new().scale(WINDOW_SCALE).build();
    let mut window = Window::new("Storybook Simulator", &output_settings);

    // The SDL window is lazily initialized on the first `update()` call.
    // We must call `update()` once before `events()` or it will panic.
    let _ = display.clear(Rgb888::WHITE);
    window.update(&display);

    let mut presses = PressThreads::default();

    // -----------------------------------------------------------------------
    // Main loop
    // -----------------------------------------------------------------------
    'running: loop {
        let frame_start = Instant::now();

        // --- SDL events ---------------------------------------------------
        for event in window.events() {
            match event {
                SimulatorEvent::Quit => break 'running,

                SimulatorEvent::KeyDown { keycode, repeat, .. } => {
                    if keycode == Keycode::Q || keycode == Keycode::Escape {
                        break 'running;
                    }
                    if repeat {
                        continue;
                    }

                    if let Some(label) = keycode_to_button(keycode) {
                        presses.spawn(&appliance, label);
                    }
                }

                _ => {}
            }
        }

        // --- Device events ------------------------------------------------
        match event_rx.try_recv() {
            Ok(DeviceEvent::InterruptRequested) | Ok(DeviceEvent::ShutdownRequested) => {
                info!("Interrupt requested");
                break 'running;
            }
            Ok(DeviceEvent::Button(_)) | Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => break 'running,
        }

        // --- Render -------------------------------------------------------
        let presented = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(frame) = presented {
            let _ = display.clear(Rgb888::WHITE);
            if let Err(e) = frame.flush(&mut display) {
                error!("Draw error: {:?}", e);
            }
        }

        window.update(&display);

        // --- Frame pacing -------------------------------------------------
        let elapsed = frame_start.elapsed();
        if elapsed < FRAME_DURATION {
            thread::sleep(FRAME_DURATION - elapsed);
        }
    }

    presses.join_all();

    info!("Simulator exiting on page {}", appliance.cursor().current());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn appliance(dir: &Path) -> Arc<Appliance<MockStoryteller, WindowRenderer>> {
        let (events, _rx) = mpsc::channel();
        let controller = PageController::new(
            MockStoryteller::new(),
            WindowRenderer {
                slot: FrameSlot::default(),
            },
            StorybookStore::new(BookDir::create(dir).unwrap()),
            PromptTemplates::default(),
            events,
        );
        Arc::new(Appliance::new(controller))
    }

    #[test]
    fn test_join_all_waits_for_running_press() {
        let dir = tempfile::tempdir().unwrap();
        let appliance = appliance(dir.path());
        let mut presses = PressThreads::default();

        presses.spawn(&appliance, ButtonLabel::A);
        assert_eq!(presses.join_all(), 0);

        // The press finished writing its page before join_all returned.
        assert!(!appliance.is_busy());
        assert_eq!(appliance.cursor().current(), 1);
    }
}
