//! External collaborators the core depends on.
//!
//! The appliance wires concrete backends and the panel in; tests and the
//! simulator provide scripted ones.

use std::path::Path;

use crate::error::StoryError;
use crate::framebuffer::FrameBuffer;

/// Produces story text.
pub trait TextGenerator {
    fn generate_text(&self, persona: &str, prompt: &str) -> Result<String, StoryError>;
}

/// Produces an illustration file for a prompt.
pub trait ImageGenerator {
    /// Write an image artifact to `output`. A failure may leave no file or a
    /// partial one behind.
    fn generate_image(&self, prompt: &str, output: &Path) -> Result<(), StoryError>;
}

/// Pushes a finished bitmap to the physical display.
pub trait Renderer {
    fn present(&mut self, frame: &FrameBuffer);
}
