//! Append-only page sequence persisted as a single JSON document.
//!
//! The whole sequence is rewritten on every append. Missing or unreadable
//! documents load as an empty storybook; an unreadable one is copied aside
//! before it is first overwritten so its bytes are never lost.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;

use crate::error::StoryError;
use crate::persistence::ResourceStore;

/// Resource name of the page sequence inside a book.
pub const STORYBOOK_RESOURCE: &str = "storybook.json";

/// Suffix of the copy kept when the page sequence could not be parsed.
const MALFORMED_SUFFIX: &str = ".malformed";

/// One persisted page of story text.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub page_number: u32,
    pub text: String,
}

/// Owner and only writer of the persisted page sequence.
pub struct StorybookStore<R: ResourceStore> {
    resources: R,
    name: String,
}

impl<R: ResourceStore> StorybookStore<R> {
    pub fn new(resources: R) -> Self {
        Self::with_name(resources, STORYBOOK_RESOURCE)
    }

    pub fn with_name(resources: R, name: &str) -> Self {
        Self {
            resources,
            name: name.to_owned(),
        }
    }

    pub fn resources(&self) -> &R {
        &self.resources
    }

    /// Read the persisted sequence, reporting why nothing could be read.
    ///
    /// An existing but blank resource reads as an empty sequence.
    pub fn read(&self) -> Result<Vec<Page>, StoryError> {
        let bytes = self
            .resources
            .read(&self.name)?
            .ok_or(StoryError::PersistenceMissing)?;
        parse_pages(&bytes)
    }

    /// Load the persisted sequence. Missing or malformed data loads as empty.
    pub fn load(&self) -> Vec<Page> {
        match self.read() {
            Ok(pages) => pages,
            Err(StoryError::PersistenceMissing) => {
                debug!(" No storybook at {}, starting empty", self.name);
                Vec::new()
            }
            Err(StoryError::PersistenceMalformed(reason)) => {
                warn!(" Storybook {} is malformed ({}), treating as empty", self.name, reason);
                Vec::new()
            }
            Err(e) => {
                warn!(" Failed to read storybook {}: {}", self.name, e);
                Vec::new()
            }
        }
    }

    /// Look up a single page by number.
    pub fn page(&self, page_number: u32) -> Option<Page> {
        self.load()
            .into_iter()
            .find(|page| page.page_number == page_number)
    }

    /// Append `text` as the next page and rewrite the whole sequence.
    ///
    /// Returns the number assigned to the new page.
    pub fn append(&self, text: &str) -> Result<u32, StoryError> {
        let mut pages = match self.resources.read(&self.name)? {
            None => Vec::new(),
            Some(bytes) => match parse_pages(&bytes) {
                Ok(pages) => pages,
                Err(e) => {
                    let backup = format!("{}{}", self.name, MALFORMED_SUFFIX);
                    warn!(" {} before append, keeping a copy as {}", e, backup);
                    self.resources.write_atomic(&backup, &bytes)?;
                    Vec::new()
                }
            },
        };

        let next = next_page_number(&pages).ok_or_else(|| {
            StoryError::PersistenceMalformed("no page number left after the highest page".to_owned())
        })?;
        pages.push(Page {
            page_number: next,
            text: text.to_owned(),
        });

        self.resources.write_atomic(&self.name, &encode_pages(&pages)?)?;
        info!(" Saved page {} to {}", next, self.name);
        Ok(next)
    }
}

/// Number the next appended page receives, or `None` once numbers run out.
pub fn next_page_number(pages: &[Page]) -> Option<u32> {
    match pages.iter().map(|page| page.page_number).max() {
        Some(max) => max.checked_add(1),
        None => Some(1),
    }
}

/// `Page {n}: {text}` per line in page order, as fed to the text generator.
pub fn render_transcript(pages: &[Page]) -> String {
    let mut ordered: Vec<&Page> = pages.iter().collect();
    ordered.sort_by_key(|page| page.page_number);

    ordered
        .into_iter()
        .map(|page| format!("Page {}: {}\n", page.page_number, page.text))
        .collect()
}

fn parse_pages(bytes: &[u8]) -> Result<Vec<Page>, StoryError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let pages: Vec<Page> = serde_json::from_slice(bytes)
        .map_err(|e| StoryError::PersistenceMalformed(e.to_string()))?;

    let max = pages.iter().map(|page| page.page_number).max().unwrap_or(0);
    if max == u32::MAX {
        return Err(StoryError::PersistenceMalformed(format!(
            "page number {} leaves no room for another page",
            max
        )));
    }
    if max as usize != pages.len() {
        warn!(
            " Storybook numbering is not contiguous ({} pages, highest {})",
            pages.len(),
            max
        );
    }
    Ok(pages)
}

fn encode_pages(pages: &[Page]) -> Result<Vec<u8>, StoryError> {
    let mut bytes = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut bytes, PrettyFormatter::with_indent(b"    "));
    pages
        .serialize(&mut serializer)
        .map_err(|e| StoryError::Encode(e.to_string()))?;
    Ok(bytes)
}
