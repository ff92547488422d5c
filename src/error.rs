//! Errors raised while assembling the appliance.
//!
//! Nothing here is produced once the run-loop is going: failures inside a
//! command are [`storybook_core::StoryError`]s and are logged, not returned.

use thiserror_no_std::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Cannot set up generation backend: {0}")]
    Backend(String),
    #[error("IO error: {0}")]
    Io(std::io::Error),
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<storybook_core::StoryError> for AppError {
    fn from(e: storybook_core::StoryError) -> Self {
        match e {
            storybook_core::StoryError::Io(e) => Self::Io(e),
            other => Self::Backend(other.to_string()),
        }
    }
}
