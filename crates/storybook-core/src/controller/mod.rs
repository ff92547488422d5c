//! Page controller: turns button presses into navigation, generation and
//! rendering.
//!
//! # States
//!
//! | Cursor                | A                | B         | C    | D            |
//! |-----------------------|------------------|-----------|------|--------------|
//! | empty / newest page   | generate a page  | interrupt | noop | previous     |
//! | older page            | next stored page | interrupt | noop | previous     |
//!
//! "previous" is a no-op on the first page and on an empty book.
//!
//! Generation failures never stop the controller: a missing text becomes an
//! empty page and a missing illustration leaves its region blank, so the
//! device always has something to show.

use std::sync::mpsc::Sender;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::collaborators::{ImageGenerator, Renderer, TextGenerator};
use crate::command::{ButtonLabel, Command, DeviceEvent};
use crate::compose::{self, compose_page, for_display, load_illustration};
use crate::cursor::PageCursor;
use crate::framebuffer::FrameBuffer;
use crate::persistence::BookDir;
use crate::storybook::{Page, StorybookStore, render_transcript};


/// Whether the page about to be generated opens the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    First,
    Next,
}

impl PageKind {
    fn for_book(pages: &[Page]) -> Self {
        if pages.is_empty() { Self::First } else { Self::Next }
    }

    pub const fn hint(self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Next => "next",
        }
    }
}

/// Text fragments the generation prompts are assembled from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PromptTemplates {
    /// System persona handed to the text generator with every request.
    pub persona: String,
    /// Introduces the transcript of the pages so far.
    pub story_so_far: String,
    /// Asks for the page itself; `{page}` becomes `first` or `next`.
    pub page_request: String,
    /// Prepended to the quoted page text to form the image prompt.
    pub illustration: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            persona: "You are a machine that generates text for children's books. \
                      You only generate text. \
                      You do not reply with the text in quotes, quotes are allowed just not around the reply. \
                      You do not preface the reply with anything. \
                      You do not explain your replies. "
                .to_owned(),
            story_so_far: "Given the following page numbers and text of an illustrated \
                           children's fantasy book. "
                .to_owned(),
            page_request: "Create the text for the {page} page of an illustrated children's \
                           fantasy book. This text should be around 20 words. If you desire, you \
                           can include a hero, monster, mythical creature or artifact. You can \
                           choose a random mood or theme. Be creative."
                .to_owned(),
            illustration: "an illustration in a children's book for the following scene: "
                .to_owned(),
        }
    }
}

impl PromptTemplates {
    /// Prompt for the next page of `pages`.
    pub fn page_prompt(&self, pages: &[Page]) -> String {
        let request = self
            .page_request
            .replace("{page}", PageKind::for_book(pages).hint());
        match PageKind::for_book(pages) {
            PageKind::First => request,
            PageKind::Next => format!(
                "{}\n{}\n{}",
                self.story_so_far,
                render_transcript(pages),
                request
            ),
        }
    }

    /// Prompt for the illustration of a page.
    pub fn illustration_prompt(&self, text: &str) -> String {
        format!("{}\"{}\"", self.illustration, text)
    }
}

/// Owns the navigation state and every collaborator of the appliance.
pub struct PageController<G, R> {
    generator: G,
    renderer: R,
    store: StorybookStore<BookDir>,
    cursor: PageCursor,
    prompts: PromptTemplates,
    events: Sender<DeviceEvent>,
}

impl<G, R> PageController<G, R>
where
    G: TextGenerator + ImageGenerator,
    R: Renderer,
{
    /// Build a controller positioned on the newest stored page.
    pub fn new(
        generator: G,
        renderer: R,
        store: StorybookStore<BookDir>,
        prompts: PromptTemplates,
        events: Sender<DeviceEvent>,
    ) -> Self {
        let cursor = PageCursor::from_pages(&store.load());
        info!(
            " Storybook at {} opened on page {} of {}",
            store.resources().root().display(),
            cursor.current(),
            cursor.max()
        );

        Self {
            generator,
            renderer,
            store,
            cursor,
            prompts,
            events,
        }
    }

    pub fn cursor(&self) -> PageCursor {
        self.cursor
    }

    pub fn store(&self) -> &StorybookStore<BookDir> {
        &self.store
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Interpret a button press against the current cursor and run it.
    pub fn handle_button(&mut self, label: ButtonLabel) {
        let command = Command::from_button(label, &self.cursor);
        info!(
            " Button {} -> {:?} (page {} of {})",
            label,
            command,
            self.cursor.current(),
            self.cursor.max()
        );
        self.execute(command);
    }

    pub fn execute(&mut self, command: Command) {
        match command {
            Command::GenerateOrAdvance => {
                if self.cursor.current() < self.cursor.max() {
                    self.advance();
                } else {
                    self.generate_page();
                }
            }
            Command::Retreat => self.retreat(),
            Command::SignalSelf => self.signal_interrupt(),
            Command::Noop => debug!(" Nothing to do"),
        }
    }

    /// Show the page under the cursor, if any. Used at startup.
    pub fn show_current(&mut self) {
        match self.cursor.current() {
            0 => debug!(" Storybook is empty, nothing to show yet"),
            page_number => self.present_stored(page_number),
        }
    }

    fn advance(&mut self) {
        match self.cursor.advance() {
            Ok(page_number) => self.present_stored(page_number),
            Err(e) => debug!(" Ignoring advance: {}", e),
        }
    }

    fn retreat(&mut self) {
        match self.cursor.retreat() {
            Ok(page_number) => self.present_stored(page_number),
            Err(e) => debug!(" Ignoring retreat: {}", e),
        }
    }

    fn signal_interrupt(&self) {
        info!(" Interrupt requested");
        if self.events.send(DeviceEvent::InterruptRequested).is_err() {
            warn!(" Nobody is listening for interrupt requests");
        }
    }

    fn generate_page(&mut self) {
        let pages = self.store.load();
        let prompt = self.prompts.page_prompt(&pages);
        debug!(" Page prompt: {}", prompt);

        let text = match self.generator.generate_text(&self.prompts.persona, &prompt) {
            Ok(text) => text.replace("\n\n", "\n"),
            Err(e) => {
                warn!(" Text generation failed, continuing with an empty page: {}", e);
                String::new()
            }
        };
        info!(" Generated text: {}", text);

        let page_number = match self.store.append(&text) {
            Ok(page_number) => page_number,
            Err(e) => {
                error!(" Failed to save the new page, keeping page {}: {}", self.cursor.current(), e);
                return;
            }
        };

        if let Err(e) = self.store.resources().set_aside_artifacts(page_number) {
            warn!(" Failed to clear old artifacts of page {}: {}", page_number, e);
        }

        let illustration_path = self.store.resources().illustration_path(page_number);
        let image_prompt = self.prompts.illustration_prompt(&text);
        if let Err(e) = self.generator.generate_image(&image_prompt, &illustration_path) {
            warn!(" Image generation failed for page {}: {}", page_number, e);
        }

        if let Err(e) = self.cursor.record_new_page(page_number) {
            // The store is authoritative; resynchronise with it.
            warn!(" Cursor out of step with the storybook: {}", e);
            self.cursor = PageCursor::from_pages(&self.store.load());
        }

        let page = self.compose(page_number, &text);
        if let Err(e) = compose::save_png(&page, &self.store.resources().page_image_path(page_number)) {
            warn!(" Failed to save page {} image: {}", page_number, e);
        }
        self.present(&page);
    }

    /// Composite page `page_number` from its text and stored illustration.
    fn compose(&self, page_number: u32, text: &str) -> FrameBuffer {
        let path = self.store.resources().illustration_path(page_number);
        let illustration = load_illustration(&path)
            .map_err(|e| warn!(" No usable illustration for page {}: {}", page_number, e))
            .ok();
        compose_page(text, illustration.as_ref())
    }

    /// Present the saved bitmap of a page, rebuilding it if it is unreadable.
    fn present_stored(&mut self, page_number: u32) {
        let path = self.store.resources().page_image_path(page_number);
        let page = match compose::load_png(&path) {
            Ok(page) => page,
            Err(e) => match self.store.page(page_number) {
                Some(stored) => {
                    warn!(" Rebuilding page {} image ({})", page_number, e);
                    let page = self.compose(page_number, &stored.text);
                    if let Err(e) = compose::save_png(&page, &path) {
                        warn!(" Failed to save page {} image: {}", page_number, e);
                    }
                    page
                }
                None => {
                    warn!(" Page {} is missing from the storybook, showing a blank page", page_number);
                    compose_page("", None)
                }
            },
        };
        self.present(&page);
    }

    fn present(&mut self, page: &FrameBuffer) {
        debug!(" Presenting page {}", self.cursor.current());
        self.renderer.present(&for_display(page));
    }
}
