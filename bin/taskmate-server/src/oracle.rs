//! HTTP client for an OpenAI-compatible chat-completions endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use taskmate_agent::{AgentError, CompletionOracle, PromptMessage};
use tracing::{debug, warn};

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct HttpOracle {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpOracle {
    /// `None` when no oracle URL is configured.
    pub fn from_config(cfg: &Config) -> Result<Option<Self>, reqwest::Error> {
        let Some(url) = cfg.oracle_url.clone() else {
            return Ok(None);
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.oracle_timeout_secs))
            .build()?;
        Ok(Some(Self {
            client,
            url,
            model: cfg.oracle_model.clone(),
            api_key: cfg.oracle_api_key.clone(),
        }))
    }
}

fn failed(context: &str, detail: impl std::fmt::Display) -> AgentError {
    warn!(error = %detail, "{context}");
    AgentError::ClassifyFailed(format!("{context}: {detail}"))
}

/// Pull `choices[0].message.content` out of a completion response.
fn extract_content(body: &Value) -> Result<String, AgentError> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| failed("oracle response has no message content", body))
}

#[async_trait]
impl CompletionOracle for HttpOracle {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, AgentError> {
        let payload = json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0,
        });
        let mut request = self.client.post(&self.url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| failed("oracle request failed", e))?;
        if !response.status().is_success() {
            return Err(failed("oracle returned an error status", response.status()));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| failed("oracle response is not JSON", e))?;
        debug!(model = %self.model, "oracle completion received");
        extract_content(&body)
    }
}
