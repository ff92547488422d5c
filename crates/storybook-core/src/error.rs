//! Error taxonomy shared by the storybook core.
//!
//! None of these errors is fatal to the appliance: the controller logs them
//! and keeps the device showing something.

use core::fmt;

use thiserror_no_std::Error;

/// Cursor movement that was requested when [`StoryError::InvalidTransition`]
/// was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Advance,
    Retreat,
    RecordNewPage(u32),
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Advance => f.write_str("advance"),
            Self::Retreat => f.write_str("retreat"),
            Self::RecordNewPage(n) => write!(f, "record page {n}"),
        }
    }
}

#[derive(Error, Debug)]
pub enum StoryError {
    /// The persisted storybook does not exist yet.
    #[error("storybook resource does not exist")]
    PersistenceMissing,

    /// The persisted storybook exists but could not be parsed.
    #[error("storybook resource is malformed: {0}")]
    PersistenceMalformed(String),

    /// A text or image collaborator did not produce a result.
    #[error("generation failed: {0}")]
    GenerationFailure(String),

    /// A cursor movement that the current position does not allow.
    #[error("cannot {transition} from page {current} of {max}")]
    InvalidTransition {
        transition: Transition,
        current: u32,
        max: u32,
    },

    #[error("I/O error: {0}")]
    Io(std::io::Error),

    #[error("failed to encode storybook: {0}")]
    Encode(String),

    #[error("image error: {0}")]
    Image(String),
}

impl From<std::io::Error> for StoryError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<image::ImageError> for StoryError {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err.to_string())
    }
}
