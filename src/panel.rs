//! Panel stand-in: the presented frame is written to a PNG file.
//!
//! The surface has the fixed landscape resolution of the e-paper panel.
//! Frames are copied in from the top-left corner; anything larger is clipped
//! and anything smaller leaves white margins.

use std::path::{Path, PathBuf};

use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use embedded_graphics::prelude::DrawTarget;
use log::{debug, error};
use storybook_core::compose::{self, PAGE_HEIGHT_PX, PAGE_WIDTH_PX};
use storybook_core::{FrameBuffer, Renderer};

/// Panel width in pixels (landscape).
pub const PANEL_WIDTH_PX: u32 = PAGE_HEIGHT_PX;

/// Panel height in pixels (landscape).
pub const PANEL_HEIGHT_PX: u32 = PAGE_WIDTH_PX;

pub struct PngPanel {
    output: PathBuf,
    surface: FrameBuffer,
}

impl PngPanel {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            surface: FrameBuffer::new(PANEL_WIDTH_PX, PANEL_HEIGHT_PX, Rgb888::WHITE),
        }
    }

    pub fn output(&self) -> &Path {
        &self.output
    }
}

impl Renderer for PngPanel {
    fn present(&mut self, frame: &FrameBuffer) {
        let Ok(()) = self.surface.clear(Rgb888::WHITE);
        let Ok(()) = frame.flush(&mut self.surface);

        match compose::save_png(&self.surface, &self.output) {
            Ok(()) => debug!(" Panel updated: {}", self.output.display()),
            Err(e) => error!(" Failed to update panel {}: {}", self.output.display(), e),
        }
    }
}
