//! Blocking JSON-over-HTTP helpers shared by the remote backends.

use std::fmt::Display;
use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;

use log::debug;
use serde_json::Value;
use storybook_core::StoryError;
use storybook_core::persistence::write_file_atomic;

const USER_AGENT: &str = "storybook-rs";

pub(crate) fn agent(timeout_secs: u64) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
}

pub(crate) fn failure(context: &str, e: impl Display) -> StoryError {
    StoryError::GenerationFailure(format!("{}: {}", context, e))
}

/// POST `body` and parse the JSON reply.
pub(crate) fn post_json(
    agent: &ureq::Agent,
    url: &str,
    bearer: Option<&str>,
    headers: &[(&str, &str)],
    body: &Value,
) -> Result<Value, StoryError> {
    debug!(" POST {}", url);
    let mut request = agent.post(url).set("Content-Type", "application/json");
    if let Some(token) = bearer {
        request = request.set("Authorization", &format!("Bearer {}", token));
    }
    for (name, value) in headers {
        request = request.set(name, value);
    }

    let response = request
        .send_string(&body.to_string())
        .map_err(|e| failure(url, e))?;
    read_json(response)
}

/// GET `url` and parse the JSON reply.
pub(crate) fn get_json(
    agent: &ureq::Agent,
    url: &str,
    bearer: Option<&str>,
) -> Result<Value, StoryError> {
    debug!(" GET {}", url);
    let mut request = agent.get(url);
    if let Some(token) = bearer {
        request = request.set("Authorization", &format!("Bearer {}", token));
    }
    let response = request.call().map_err(|e| failure(url, e))?;
    read_json(response)
}

fn read_json(response: ureq::Response) -> Result<Value, StoryError> {
    let mut reply = String::new();
    response
        .into_reader()
        .read_to_string(&mut reply)
        .map_err(|e| failure("failed to read reply", e))?;
    serde_json::from_str(&reply).map_err(|e| failure("failed to parse reply", e))
}

/// Fetch `url` into `output`, replacing it only once the body is complete.
pub(crate) fn download(agent: &ureq::Agent, url: &str, output: &Path) -> Result<(), StoryError> {
    debug!(" GET {} -> {}", url, output.display());
    let response = agent.get(url).call().map_err(|e| failure(url, e))?;
    let mut reader = response.into_reader();
    write_file_atomic(output, |file| {
        io::copy(&mut reader, file)?;
        Ok(())
    })
}

/// The string at `pointer`, or a failure naming what was missing.
pub(crate) fn string_at<'a>(reply: &'a Value, pointer: &str) -> Result<&'a str, StoryError> {
    reply
        .pointer(pointer)
        .and_then(Value::as_str)
        .ok_or_else(|| failure("unexpected reply", format!("no string at {}", pointer)))
}
