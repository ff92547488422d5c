//! The controller behind the single-command gate.
//!
//! Button presses may arrive on any thread. Each one either runs to
//! completion or is dropped because another press is still being handled.

use std::sync::{Mutex, PoisonError};

use log::debug;

use crate::collaborators::{ImageGenerator, Renderer, TextGenerator};
use crate::command::ButtonLabel;
use crate::controller::PageController;
use crate::cursor::PageCursor;
use crate::serializer::CommandSerializer;

pub struct Appliance<G, R> {
    serializer: CommandSerializer,
    controller: Mutex<PageController<G, R>>,
}

impl<G, R> Appliance<G, R>
where
    G: TextGenerator + ImageGenerator,
    R: Renderer,
{
    pub fn new(controller: PageController<G, R>) -> Self {
        Self {
            serializer: CommandSerializer::new(),
            controller: Mutex::new(controller),
        }
    }

    /// Show the newest stored page, if there is one.
    pub fn start(&self) {
        self.serializer.try_dispatch(|| self.with_controller(|c| c.show_current()));
    }

    /// Handle a press. Returns `false` if it was dropped because the
    /// appliance was busy.
    pub fn press(&self, label: ButtonLabel) -> bool {
        let accepted = self
            .serializer
            .try_dispatch(|| self.with_controller(|c| c.handle_button(label)));
        if !accepted {
            debug!(" Button {} dropped while busy", label);
        }
        accepted
    }

    pub fn is_busy(&self) -> bool {
        self.serializer.is_busy()
    }

    pub fn cursor(&self) -> PageCursor {
        self.with_controller(|c| c.cursor())
    }

    /// Run `f` with exclusive access to the controller.
    pub fn with_controller<T>(&self, f: impl FnOnce(&mut PageController<G, R>) -> T) -> T {
        let mut controller = self.controller.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut controller)
    }
}
