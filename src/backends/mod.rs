//! Generation backends.
//!
//! The appliance talks to exactly one backend, chosen by
//! [`AppConfig::llm_provider`]. Each one produces both the page text and the
//! illustration.

mod http;
pub mod ollama;
pub mod openai;
pub mod replicate;

use std::path::Path;

use log::info;
use storybook_core::{ImageGenerator, StoryError, TextGenerator};

use crate::config::{AppConfig, OPENAI_KEY_VAR, Provider, REPLICATE_KEY_VAR};
use crate::error::AppError;

pub use ollama::Ollama;
pub use openai::OpenAi;
pub use replicate::Replicate;

pub enum Backend {
    Ollama(Box<Ollama>),
    OpenAi(Box<OpenAi>),
    Replicate(Box<Replicate>),
}

impl Backend {
    /// Build the backend the configuration selects.
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let backend = match config.llm_provider {
            Provider::Ollama => Backend::Ollama(Box::new(Ollama::new(&config.ollama))),
            Provider::OpenAi => {
                let key = required_key(config.openai_api_key.as_deref(), OPENAI_KEY_VAR)?;
                Backend::OpenAi(Box::new(OpenAi::new(&config.openai, key)))
            }
            Provider::Replicate => {
                let key = required_key(config.replicate_api_key.as_deref(), REPLICATE_KEY_VAR)?;
                Backend::Replicate(Box::new(Replicate::new(&config.replicate, key)))
            }
        };
        info!(" Using {} backend", backend.name());
        Ok(backend)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Ollama(_) => "ollama",
            Backend::OpenAi(_) => "openai",
            Backend::Replicate(_) => "replicate",
        }
    }
}

fn required_key(key: Option<&str>, var: &str) -> Result<String, AppError> {
    match key {
        Some(key) if !key.trim().is_empty() => Ok(key.trim().to_owned()),
        _ => Err(AppError::Backend(format!(
            "no API key configured; set it in the config file or {}",
            var
        ))),
    }
}

impl TextGenerator for Backend {
    fn generate_text(&self, persona: &str, prompt: &str) -> Result<String, StoryError> {
        match self {
            Backend::Ollama(backend) => backend.generate_text(persona, prompt),
            Backend::OpenAi(backend) => backend.generate_text(persona, prompt),
            Backend::Replicate(backend) => backend.generate_text(persona, prompt),
        }
    }
}

impl ImageGenerator for Backend {
    fn generate_image(&self, prompt: &str, output: &Path) -> Result<(), StoryError> {
        match self {
            Backend::Ollama(backend) => backend.generate_image(prompt, output),
            Backend::OpenAi(backend) => backend.generate_image(prompt, output),
            Backend::Replicate(backend) => backend.generate_image(prompt, output),
        }
    }
}
