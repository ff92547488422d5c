//! OpenAI chat completions for text and the images endpoint for
//! illustrations.

use std::path::Path;

use serde_json::{Value, json};
use storybook_core::{ImageGenerator, StoryError, TextGenerator};

use super::http;
use crate::config::OpenAiConfig;

pub struct OpenAi {
    agent: ureq::Agent,
    config: OpenAiConfig,
    api_key: String,
}

impl OpenAi {
    pub fn new(config: &OpenAiConfig, api_key: String) -> Self {
        Self {
            agent: http::agent(config.timeout_secs),
            config: config.clone(),
            api_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn chat_body(&self, persona: &str, prompt: &str) -> Value {
        json!({
            "model": self.config.text_model,
            "messages": [
                { "role": "system", "content": persona },
                { "role": "user", "content": prompt },
            ],
        })
    }

    fn image_body(&self, prompt: &str) -> Value {
        json!({
            "model": self.config.image_model,
            "prompt": prompt,
            "size": "1024x1024",
            "quality": "standard",
            "n": 1,
        })
    }
}

impl TextGenerator for OpenAi {
    fn generate_text(&self, persona: &str, prompt: &str) -> Result<String, StoryError> {
        let reply = http::post_json(
            &self.agent,
            &self.url("chat/completions"),
            Some(&self.api_key),
            &[],
            &self.chat_body(persona, prompt),
        )?;
        Ok(http::string_at(&reply, "/choices/0/message/content")?.to_owned())
    }
}

impl ImageGenerator for OpenAi {
    fn generate_image(&self, prompt: &str, output: &Path) -> Result<(), StoryError> {
        let reply = http::post_json(
            &self.agent,
            &self.url("images/generations"),
            Some(&self.api_key),
            &[],
            &self.image_body(prompt),
        )?;
        let image_url = http::string_at(&reply, "/data/0/url")?;
        http::download(&self.agent, image_url, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> OpenAi {
        let config = OpenAiConfig {
            base_url: "https://api.example.test/v1/".to_owned(),
            ..OpenAiConfig::default()
        };
        OpenAi::new(&config, "sk-test".to_owned())
    }

    #[test]
    fn test_persona_goes_in_system_message() {
        let body = backend().chat_body("Be whimsical.", "Page one, please.");
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "Be whimsical.");
        assert_eq!(body["messages"][1]["content"], "Page one, please.");
    }

    #[test]
    fn test_image_request_is_square() {
        let body = backend().image_body("a castle");
        assert_eq!(body["size"], "1024x1024");
        assert_eq!(body["n"], 1);
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        assert_eq!(
            backend().url("chat/completions"),
            "https://api.example.test/v1/chat/completions"
        );
    }
}
