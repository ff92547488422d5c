//! Replicate predictions. Created with `Prefer: wait`, then polled through
//! `urls.get` until they settle or the configured timeout runs out.

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};
use serde_json::{Value, json};
use storybook_core::{ImageGenerator, StoryError, TextGenerator};

use super::http;
use crate::config::ReplicateConfig;

/// Pause between polls of an unfinished prediction.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct Replicate {
    agent: ureq::Agent,
    config: ReplicateConfig,
    api_key: String,
}

impl Replicate {
    pub fn new(config: &ReplicateConfig, api_key: String) -> Self {
        Self {
            agent: http::agent(config.timeout_secs),
            config: config.clone(),
            api_key,
        }
    }

    /// Run `model` (`owner/name`) on `input` and return the finished prediction.
    fn predict(&self, model: &str, input: Value) -> Result<Value, StoryError> {
        let url = format!(
            "{}/models/{}/predictions",
            self.config.base_url.trim_end_matches('/'),
            model
        );
        let created = Instant::now();
        let prediction = http::post_json(
            &self.agent,
            &url,
            Some(&self.api_key),
            &[("Prefer", "wait")],
            &json!({ "input": input }),
        )?;

        let deadline = created + Duration::from_secs(self.config.timeout_secs);
        let prediction = wait_for_prediction(prediction, deadline, POLL_INTERVAL, |url| {
            http::get_json(&self.agent, url, Some(&self.api_key))
        })
        .map_err(|e| match e {
            StoryError::GenerationFailure(reason) => {
                StoryError::GenerationFailure(format!("{}: {}", model, reason))
            }
            other => other,
        })?;
        debug!(" Prediction for {} succeeded", model);
        Ok(prediction)
    }

    fn text_input(&self, persona: &str, prompt: &str) -> Value {
        json!({
            "max_tokens": 1024,
            "min_tokens": 0,
            "temperature": self.config.temperature,
            "system_prompt": persona,
            "prompt": prompt,
        })
    }
}

/// Where a prediction stands, judged from its `status`.
#[derive(Debug, PartialEq)]
pub(crate) enum PredictionState {
    Succeeded,
    /// `starting`, `processing`, or no status yet.
    Pending,
    /// `failed` or `canceled`, with the reported error.
    Failed(String),
}

pub(crate) fn prediction_state(prediction: &Value) -> PredictionState {
    match prediction.get("status").and_then(Value::as_str) {
        Some("succeeded") => PredictionState::Succeeded,
        Some(status @ ("failed" | "canceled")) => {
            let reason = match prediction.get("error") {
                Some(Value::String(error)) => error.clone(),
                Some(Value::Null) | None => status.to_owned(),
                Some(other) => other.to_string(),
            };
            PredictionState::Failed(reason)
        }
        _ => PredictionState::Pending,
    }
}

/// Poll `prediction` through its `urls.get` until it settles.
///
/// `fetch` performs the GET; it is a parameter so polling runs without a
/// network in tests.
pub(crate) fn wait_for_prediction<F>(
    mut prediction: Value,
    deadline: Instant,
    interval: Duration,
    mut fetch: F,
) -> Result<Value, StoryError>
where
    F: FnMut(&str) -> Result<Value, StoryError>,
{
    let mut polls = 0u32;
    loop {
        match prediction_state(&prediction) {
            PredictionState::Succeeded => return Ok(prediction),
            PredictionState::Failed(reason) => return Err(StoryError::GenerationFailure(reason)),
            PredictionState::Pending => {}
        }

        let status = prediction
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("pending")
            .to_owned();
        if Instant::now() >= deadline {
            return Err(StoryError::GenerationFailure(format!(
                "prediction still {} after {} polls",
                status, polls
            )));
        }
        let poll_url = http::string_at(&prediction, "/urls/get")?.to_owned();
        if polls == 0 {
            info!(" Prediction is {}, polling until it finishes", status);
        }

        thread::sleep(interval.min(deadline.saturating_duration_since(Instant::now())));
        prediction = fetch(&poll_url)?;
        polls += 1;
    }
}

fn image_input(prompt: &str) -> Value {
    json!({
        "num_outputs": 1,
        "aspect_ratio": "1:1",
        "output_format": "png",
        "safety_tolerance": 5,
        "output_quality": 100,
        "prompt": prompt,
    })
}

/// Language models stream tokens, so `output` is usually a list of fragments.
pub(crate) fn output_text(prediction: &Value) -> String {
    match prediction.get("output") {
        Some(Value::Array(parts)) => parts.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(text)) => text.clone(),
        _ => String::new(),
    }
}

/// Image models answer with one URL or a list of them; the first is used.
pub(crate) fn output_url(prediction: &Value) -> Result<&str, StoryError> {
    let url = match prediction.get("output") {
        Some(Value::Array(urls)) => urls.first().and_then(Value::as_str),
        Some(Value::String(url)) => Some(url.as_str()),
        _ => None,
    };
    url.ok_or_else(|| StoryError::GenerationFailure("prediction has no image URL".to_owned()))
}

impl TextGenerator for Replicate {
    fn generate_text(&self, persona: &str, prompt: &str) -> Result<String, StoryError> {
        let prediction = self.predict(&self.config.text_model, self.text_input(persona, prompt))?;
        Ok(output_text(&prediction))
    }
}

impl ImageGenerator for Replicate {
    fn generate_image(&self, prompt: &str, output: &Path) -> Result<(), StoryError> {
        let prediction = self.predict(&self.config.image_model, image_input(prompt))?;
        http::download(&self.agent, output_url(&prediction)?, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_text_fragments_are_joined() {
        let prediction = json!({ "status": "succeeded", "output": ["Once ", "upon ", "a time."] });
        assert_eq!(output_text(&prediction), "Once upon a time.");
    }

    #[test]
    fn test_missing_text_output_is_empty() {
        assert_eq!(output_text(&json!({ "status": "starting" })), "");
    }

    #[test]
    fn test_image_url_from_string_or_list() {
        let single = json!({ "output": "https://replicate.test/a.png" });
        let list = json!({ "output": ["https://replicate.test/b.png", "https://replicate.test/c.png"] });

        assert_eq!(output_url(&single).unwrap(), "https://replicate.test/a.png");
        assert_eq!(output_url(&list).unwrap(), "https://replicate.test/b.png");
        assert!(output_url(&json!({ "output": [] })).is_err());
    }

    const POLL_URL: &str = "https://api.replicate.test/v1/predictions/abc";

    fn pending(status: &str) -> Value {
        json!({ "id": "abc", "status": status, "urls": { "get": POLL_URL } })
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    /// Answers each poll with the next reply in order.
    fn scripted(
        replies: Vec<Value>,
    ) -> (impl FnMut(&str) -> Result<Value, StoryError>, Rc<Cell<usize>>) {
        let polls = Rc::new(Cell::new(0));
        let counter = polls.clone();
        let mut replies = replies.into_iter();
        let fetch = move |url: &str| {
            assert_eq!(url, POLL_URL);
            counter.set(counter.get() + 1);
            Ok(replies.next().expect("polled past the last scripted reply"))
        };
        (fetch, polls)
    }

    #[test]
    fn test_prediction_states() {
        assert_eq!(
            prediction_state(&json!({ "status": "succeeded", "output": "hi" })),
            PredictionState::Succeeded
        );
        assert_eq!(prediction_state(&pending("starting")), PredictionState::Pending);
        assert_eq!(prediction_state(&pending("processing")), PredictionState::Pending);
        assert_eq!(prediction_state(&json!({ "id": "abc" })), PredictionState::Pending);
        assert_eq!(
            prediction_state(&json!({ "status": "failed", "error": "CUDA out of memory" })),
            PredictionState::Failed("CUDA out of memory".to_owned())
        );
        assert_eq!(
            prediction_state(&json!({ "status": "canceled", "error": null })),
            PredictionState::Failed("canceled".to_owned())
        );
    }

    #[test]
    fn test_finished_prediction_is_not_polled() {
        let (fetch, polls) = scripted(vec![]);
        let done = json!({ "status": "succeeded", "output": ["The ", "end."] });

        let prediction = wait_for_prediction(done, far_deadline(), Duration::ZERO, fetch).unwrap();

        assert_eq!(output_text(&prediction), "The end.");
        assert_eq!(polls.get(), 0);
    }

    #[test]
    fn test_starting_prediction_is_polled_until_succeeded() {
        let (fetch, polls) = scripted(vec![
            pending("processing"),
            pending("processing"),
            json!({ "status": "succeeded", "output": "https://replicate.test/page.png" }),
        ]);

        let prediction =
            wait_for_prediction(pending("starting"), far_deadline(), Duration::ZERO, fetch).unwrap();

        assert_eq!(output_url(&prediction).unwrap(), "https://replicate.test/page.png");
        assert_eq!(polls.get(), 3);
    }

    #[test]
    fn test_failure_while_polling_carries_error() {
        let (fetch, _polls) = scripted(vec![
            pending("processing"),
            json!({ "status": "failed", "error": "NSFW content detected" }),
        ]);

        let err =
            wait_for_prediction(pending("starting"), far_deadline(), Duration::ZERO, fetch).unwrap_err();

        assert!(matches!(err, StoryError::GenerationFailure(reason) if reason == "NSFW content detected"));
    }

    #[test]
    fn test_processing_past_deadline_is_a_failure() {
        let (fetch, polls) = scripted(vec![]);

        let err = wait_for_prediction(pending("processing"), Instant::now(), Duration::ZERO, fetch)
            .unwrap_err();

        assert!(matches!(err, StoryError::GenerationFailure(reason) if reason.contains("still processing")));
        assert_eq!(polls.get(), 0);
    }

    #[test]
    fn test_pending_without_poll_url_is_a_failure() {
        let (fetch, _polls) = scripted(vec![]);

        let err = wait_for_prediction(json!({ "status": "starting" }), far_deadline(), Duration::ZERO, fetch)
            .unwrap_err();

        assert!(matches!(err, StoryError::GenerationFailure(reason) if reason.contains("/urls/get")));
    }

    #[test]
    fn test_text_input_carries_persona() {
        let replicate = Replicate::new(&ReplicateConfig::default(), "r8_test".to_owned());
        let input = replicate.text_input("Be kind.", "Page two.");
        assert_eq!(input["system_prompt"], "Be kind.");
        assert_eq!(input["prompt"], "Page two.");
        assert_eq!(input["max_tokens"], 1024);
    }
}
