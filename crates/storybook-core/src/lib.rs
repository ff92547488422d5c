//! Hardware-independent core library for the storybook appliance
//!
//! This crate contains all platform-agnostic logic of the storybook device:
//! text reflow, the persisted page sequence, the navigation cursor, the
//! single-command gate used by the buttons, page compositing and the page
//! controller that ties them together.
//!
//! Text and image generation, the physical panel and the buttons are
//! collaborators reached through the traits in [`collaborators`]; the device
//! binary and the desktop simulator provide the concrete implementations.

pub mod appliance;
pub mod collaborators;
pub mod command;
pub mod compose;
pub mod controller;
pub mod cursor;
pub mod error;
pub mod framebuffer;
pub mod persistence;
pub mod reflow;
pub mod serializer;
pub mod storybook;

pub use appliance::Appliance;
pub use collaborators::{ImageGenerator, Renderer, TextGenerator};
pub use command::{ButtonLabel, Command, DeviceEvent};
pub use controller::{PageController, PageKind, PromptTemplates};
pub use cursor::{CursorState, PageCursor};
pub use error::{StoryError, Transition};
pub use framebuffer::FrameBuffer;
pub use persistence::{BookDir, MemoryStore, ResourceStore};
pub use reflow::wrap;
pub use serializer::CommandSerializer;
pub use storybook::{Page, StorybookStore, render_transcript};
