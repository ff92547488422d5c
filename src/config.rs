//! Appliance configuration, read from a JSON file.
//!
//! Every field has a default, so a partial file (or none at all) is valid.
//! API credentials may come from the file or from the environment.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use storybook_core::PromptTemplates;

use crate::error::AppError;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Environment variable naming the OpenAI API key.
pub const OPENAI_KEY_VAR: &str = "OPENAI_API_KEY";

/// Environment variable naming the Replicate API token.
pub const REPLICATE_KEY_VAR: &str = "REPLICATE_API_TOKEN";

/// Which service generates page text and illustrations.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Ollama,
    OpenAi,
    Replicate,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub llm_provider: Provider,
    /// Directory holding `storybook.json` and the page images.
    pub book_dir: PathBuf,
    /// Where the panel stand-in writes the presented frame.
    pub display_output: PathBuf,
    /// Request a new page every N seconds, as if A were pressed.
    pub auto_generate_secs: Option<u64>,
    pub prompts: PromptTemplates,
    pub ollama: OllamaConfig,
    pub openai: OpenAiConfig,
    pub replicate: ReplicateConfig,
    pub openai_api_key: Option<String>,
    pub replicate_api_key: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm_provider: Provider::default(),
            book_dir: PathBuf::from("book1"),
            display_output: PathBuf::from("display.png"),
            auto_generate_secs: None,
            prompts: PromptTemplates::default(),
            ollama: OllamaConfig::default(),
            openai: OpenAiConfig::default(),
            replicate: ReplicateConfig::default(),
            openai_api_key: None,
            replicate_api_key: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub stable_diffusion: StableDiffusionConfig,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/api/generate".to_owned(),
            model: "llama3".to_owned(),
            temperature: 0.9,
            timeout_secs: 600,
            stable_diffusion: StableDiffusionConfig::default(),
        }
    }
}

/// Local Stable Diffusion executable used alongside Ollama.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct StableDiffusionConfig {
    pub binary: PathBuf,
    pub models_path: PathBuf,
    pub steps: u32,
}

impl Default for StableDiffusionConfig {
    fn default() -> Self {
        let home = home_dir();
        Self {
            binary: home.join("OnnxStream/src/build/sd"),
            models_path: home.join("sd_models/stable-diffusion-1.5-onnxstream"),
            steps: 3,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_owned(),
            text_model: "gpt-4o".to_owned(),
            image_model: "dall-e-3".to_owned(),
            timeout_secs: 300,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ReplicateConfig {
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for ReplicateConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.replicate.com/v1".to_owned(),
            text_model: "meta/meta-llama-3.1-405b-instruct".to_owned(),
            image_model: "black-forest-labs/flux-pro".to_owned(),
            temperature: 2.0,
            timeout_secs: 300,
        }
    }
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default()
}

impl AppConfig {
    /// Read the configuration at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(" No configuration at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let config = Self::from_json(&contents)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        info!(" Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_json(contents: &str) -> Result<Self, AppError> {
        serde_json::from_str(contents).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Fill credentials the file left out from `lookup` (normally the
    /// process environment).
    pub fn apply_credentials(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.openai_api_key.is_none() {
            self.openai_api_key = lookup(OPENAI_KEY_VAR);
        }
        if self.replicate_api_key.is_none() {
            self.replicate_api_key = lookup(REPLICATE_KEY_VAR);
        }
    }
}
