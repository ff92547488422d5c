//! The storybook appliance: configuration, generation backends, button
//! input and the run-loop around [`storybook_core`].

pub mod app;
pub mod backends;
pub mod config;
pub mod error;
pub mod input;
pub mod panel;
pub mod shutdown;
#[cfg(unix)]
pub mod signals;

pub use error::AppError;
