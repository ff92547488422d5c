//! Byte-level persistence surface used by the storybook store.
//!
//! Every write goes through a temporary file in the destination directory
//! that is renamed over the target, so a reader never sees a half-written
//! resource.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use log::debug;

use crate::error::StoryError;

/// Named byte resources with an all-or-nothing write.
pub trait ResourceStore {
    /// Read a resource. `Ok(None)` means it does not exist.
    fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StoryError>;

    /// Replace a resource with `bytes` in a single step.
    fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<(), StoryError>;
}

/// Write `path` by filling a sibling temporary file and renaming it into place.
pub fn write_file_atomic<F>(path: &Path, fill: F) -> Result<(), StoryError>
where
    F: FnOnce(&mut File) -> Result<(), StoryError>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    fill(temp.as_file_mut())?;
    temp.as_file_mut().flush()?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| StoryError::Io(e.error))?;
    debug!(" Replaced {}", path.display());
    Ok(())
}

/// Suffix given to artifacts replaced by a newly generated page.
pub const STALE_SUFFIX: &str = ".stale";

// ---------------------------------------------------------------------------
// Book directory
// ---------------------------------------------------------------------------

/// On-disk home of one storybook: the page sequence plus the per-page
/// illustration and rendered-page artifacts.
#[derive(Debug, Clone)]
pub struct BookDir {
    root: PathBuf,
}

impl BookDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Open the directory, creating it if needed.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self, StoryError> {
        let book = Self::new(root);
        fs::create_dir_all(&book.root)?;
        Ok(book)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resource_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Raw illustration written by the image collaborator for page `n`.
    pub fn illustration_path(&self, page_number: u32) -> PathBuf {
        self.root.join(format!("page_{page_number}_image.png"))
    }

    /// Composited (unrotated) page bitmap for page `n`.
    pub fn page_image_path(&self, page_number: u32) -> PathBuf {
        self.root.join(format!("page_{page_number}.png"))
    }

    /// Rename any artifacts already on disk for page `n` to `*.stale`, so a
    /// page generated under that number never picks up an older image.
    pub fn set_aside_artifacts(&self, page_number: u32) -> Result<(), StoryError> {
        for path in [
            self.illustration_path(page_number),
            self.page_image_path(page_number),
        ] {
            let mut stale = path.clone().into_os_string();
            stale.push(STALE_SUFFIX);
            match fs::rename(&path, &stale) {
                Ok(()) => debug!(" Set aside {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl ResourceStore for BookDir {
    fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StoryError> {
        match fs::read(self.resource_path(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<(), StoryError> {
        write_file_atomic(&self.resource_path(name), |file| {
            file.write_all(bytes)?;
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Volatile [`ResourceStore`], for tests and for running without a card.
#[derive(Debug, Default)]
pub struct MemoryStore {
    resources: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a resource with raw bytes.
    pub fn insert(&self, name: &str, bytes: impl Into<Vec<u8>>) {
        self.resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_owned(), bytes.into());
    }
}

impl ResourceStore for MemoryStore {
    fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StoryError> {
        Ok(self
            .resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned())
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<(), StoryError> {
        self.insert(name, bytes);
        Ok(())
    }
}
