use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, error};

use super::traits::SummarizationClient;
use crate::config::Config;
use crate::core::future::BoxFuture;
use crate::core::text::truncate_log;
use crate::services::errors::SummaryError;

pub const SUMMARY_PROMPT: &str = "Hi, could you please summarize the following slides for me?";

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub timeout: Duration,
}

impl OpenAiSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            api_key: cfg.openai_api_key.clone(),
            base_url: cfg.openai_base_url.clone(),
            model: cfg.summary_model.clone(),
            temperature: cfg.summary_temperature,
            timeout: Duration::from_secs(cfg.summary_request_timeout_seconds),
        }
    }
}

/// Chat-completions backend for OpenAI-compatible services.
#[derive(Clone)]
pub struct OpenAiSummarizer {
    client: reqwest::Client,
    settings: OpenAiSettings,
}

impl OpenAiSummarizer {
    pub fn new(settings: OpenAiSettings) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| format!("build http client failed: {e}"))?;
        Ok(Self { client, settings })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    async fn request(&self, slide_text: &str) -> Result<String, String> {
        if self.settings.api_key.trim().is_empty() {
            return Err("OPENAI_API_KEY is not configured".to_string());
        }

        let payload = json!({
            "model": self.settings.model,
            "temperature": self.settings.temperature,
            "stream": false,
            "messages": [
                { "role": "system", "content": SUMMARY_PROMPT },
                { "role": "user", "content": slide_text },
            ],
        });

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = resp.status();
        let raw = resp.text().await.map_err(|e| e.to_string())?;
        if !status.is_success() {
            let err_text = truncate_log(&raw, 2000);
            error!("[SUMMARIZER] request failed: status={}, error={}", status, err_text);
            return Err(format!("status {}: {}", status, err_text));
        }

        parse_completion(&raw)
    }
}

/// `choices[0].message.content`, trimmed. Empty content is an error.
pub fn parse_completion(raw: &str) -> Result<String, String> {
    let val: Value = serde_json::from_str(raw).map_err(|err| {
        format!(
            "invalid JSON response: {}; body_preview={}",
            err,
            truncate_log(raw, 1200)
        )
    })?;

    let content = val
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|v| v.as_str())
        .map(str::trim)
        .unwrap_or("");

    if content.is_empty() {
        return Err(format!(
            "empty completion; body_preview={}",
            truncate_log(raw, 1200)
        ));
    }
    Ok(content.to_string())
}

impl SummarizationClient for OpenAiSummarizer {
    fn summarize<'a>(
        &'a self,
        slide_index: usize,
        slide_text: &'a str,
    ) -> BoxFuture<'a, Result<String, SummaryError>> {
        Box::pin(async move {
            debug!(
                "[SUMMARIZER] slide {} ({} chars) -> {}",
                slide_index,
                slide_text.chars().count(),
                self.settings.model
            );
            self.request(slide_text)
                .await
                .map_err(|cause| SummaryError::new(slide_index, cause))
        })
    }
}
