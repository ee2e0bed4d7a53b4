use anyhow::{Context, Result, anyhow};
use tracing::debug;
use ureq::Agent;

use crate::client::api_error;
use crate::models::{Content, GenerateContentRequest, GenerateContentResponse, Part};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// A generative text model: prompt in, free text out
#[cfg_attr(test, mockall::automock)]
pub trait SongOracle: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String>;
}

/// Gemini client using the REST generateContent endpoint
pub struct GeminiClient {
    agent: Agent,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(agent: Agent, api_key: String, model: String) -> Self {
        GeminiClient {
            agent,
            base_url: GEMINI_BASE_URL.to_string(),
            api_key,
            model,
        }
    }
}

impl SongOracle for GeminiClient {
    fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        debug!(model = %self.model, prompt_len = prompt.len(), "Calling Gemini");

        let response: GenerateContentResponse = self
            .agent
            .post(&url)
            .query("key", &self.api_key)
            .send_json(&body)
            .map_err(api_error)
            .context("Gemini request failed")?
            .into_json()
            .context("Failed to parse Gemini response")?;

        match response.text() {
            Some(text) => Ok(text),
            None => {
                let reason = response
                    .prompt_feedback
                    .and_then(|feedback| feedback.block_reason)
                    .unwrap_or_else(|| "no candidates".to_string());
                Err(anyhow!("Gemini returned no text ({reason})"))
            }
        }
    }
}
