//! Local backend: text from an Ollama server, illustrations from a Stable
//! Diffusion executable on the same machine.

use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;

use log::{debug, warn};
use serde_json::{Value, json};
use storybook_core::{ImageGenerator, StoryError, TextGenerator};

use super::http;
use crate::config::{OllamaConfig, StableDiffusionConfig};

pub struct Ollama {
    agent: ureq::Agent,
    config: OllamaConfig,
}

impl Ollama {
    pub fn new(config: &OllamaConfig) -> Self {
        Self {
            agent: http::agent(config.timeout_secs),
            config: config.clone(),
        }
    }

    fn request_body(&self, persona: &str, prompt: &str) -> Value {
        json!({
            "model": self.config.model,
            "prompt": format!("{}{}", persona, prompt),
            "stream": false,
            "options": { "temperature": self.config.temperature },
        })
    }
}

/// Generated text from an `/api/generate` reply, leading whitespace removed.
pub(crate) fn response_text(reply: &Value) -> Result<String, StoryError> {
    Ok(http::string_at(reply, "/response")?.trim_start().to_owned())
}

impl TextGenerator for Ollama {
    fn generate_text(&self, persona: &str, prompt: &str) -> Result<String, StoryError> {
        let body = self.request_body(persona, prompt);
        let reply = http::post_json(&self.agent, &self.config.endpoint, None, &[], &body)?;
        response_text(&reply)
    }
}

impl ImageGenerator for Ollama {
    fn generate_image(&self, prompt: &str, output: &Path) -> Result<(), StoryError> {
        run_stable_diffusion(&self.config.stable_diffusion, prompt, output)
    }
}

// ---------------------------------------------------------------------------
// Stable Diffusion subprocess
// ---------------------------------------------------------------------------

pub(crate) fn stable_diffusion_command(
    config: &StableDiffusionConfig,
    prompt: &str,
    output: &Path,
) -> Command {
    let mut command = Command::new(&config.binary);
    command
        .args(["--xl", "--turbo", "--rpi", "--models-path"])
        .arg(&config.models_path)
        .arg("--prompt")
        .arg(prompt)
        .arg("--steps")
        .arg(config.steps.to_string())
        .arg("--output")
        .arg(output);
    command
}

fn run_stable_diffusion(
    config: &StableDiffusionConfig,
    prompt: &str,
    output: &Path,
) -> Result<(), StoryError> {
    debug!(" Running {} for {}", config.binary.display(), output.display());
    // Only a file written by this run counts as success.
    match fs::remove_file(output) {
        Ok(()) => debug!(" Removed old {}", output.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    let status = stable_diffusion_command(config, prompt, output)
        .status()
        .map_err(|e| http::failure(&config.binary.display().to_string(), e))?;
    // The exit status is unreliable; the output file is what counts.
    if !status.success() {
        warn!(" Stable Diffusion exited with {}", status);
    }
    if output.exists() {
        Ok(())
    } else {
        Err(StoryError::GenerationFailure(format!(
            "no image written to {}",
            output.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use std::path::PathBuf;

    #[test]
    fn test_prompt_is_persona_then_request() {
        let ollama = Ollama::new(&OllamaConfig::default());
        let body = ollama.request_body("You are a bard. ", "Tell me a tale.");

        assert_eq!(body["prompt"], "You are a bard. Tell me a tale.");
        assert_eq!(body["model"], "llama3");
        assert_eq!(body["stream"], false);
        assert!(body["options"]["temperature"].as_f64().is_some());
    }

    #[test]
    fn test_response_is_left_trimmed() {
        let reply = json!({ "response": "\n  The dragon yawned. \n", "done": true });
        assert_eq!(response_text(&reply).unwrap(), "The dragon yawned. \n");
    }

    #[test]
    fn test_stable_diffusion_arguments() {
        let config = StableDiffusionConfig {
            binary: PathBuf::from("/opt/sd"),
            models_path: PathBuf::from("/opt/models"),
            steps: 3,
        };
        let command = stable_diffusion_command(&config, "a fox", Path::new("book1/page_1_image.png"));

        assert_eq!(command.get_program(), OsStr::new("/opt/sd"));
        let args: Vec<_> = command.get_args().collect();
        assert_eq!(
            args,
            [
                "--xl",
                "--turbo",
                "--rpi",
                "--models-path",
                "/opt/models",
                "--prompt",
                "a fox",
                "--steps",
                "3",
                "--output",
                "book1/page_1_image.png",
            ]
            .map(OsStr::new)
        );
    }

    #[test]
    fn test_missing_binary_is_a_generation_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = StableDiffusionConfig {
            binary: dir.path().join("no-such-sd"),
            models_path: dir.path().to_path_buf(),
            steps: 1,
        };
        let err = run_stable_diffusion(&config, "a fox", &dir.path().join("out.png")).unwrap_err();
        assert!(matches!(err, StoryError::GenerationFailure(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_old_output_does_not_count_as_success() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.png");
        std::fs::write(&output, b"left over from an earlier book").unwrap();
        let config = StableDiffusionConfig {
            binary: PathBuf::from("false"),
            models_path: dir.path().to_path_buf(),
            steps: 1,
        };

        let err = run_stable_diffusion(&config, "a fox", &output).unwrap_err();

        assert!(matches!(err, StoryError::GenerationFailure(_)));
        assert!(!output.exists());
    }
}
