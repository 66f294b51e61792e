use super::client::LlmClient;
use crate::types::{AppError, Result, Upstream};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Client for OpenAI-compatible Chat Completions APIs.
pub struct OpenAiCompatClient {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiCompatClient {
    pub fn new(
        api_base: &str,
        api_key: Option<String>,
        model: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        })
    }

    fn api_url(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    fn build_request_body(&self, system: &str, prompt: &str) -> Value {
        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": prompt}));

        json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0.3,
            "response_format": {"type": "json_object"},
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    #[tracing::instrument(skip_all, fields(model = %self.model))]
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        let mut request = self
            .client
            .post(self.api_url())
            .json(&self.build_request_body(system, prompt));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::upstream(Upstream::Llm, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, "LLM provider returned an error");
            return Err(AppError::Upstream {
                service: Upstream::Llm,
                message: format!("Provider returned {status}: {body}"),
                timed_out: false,
            });
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| AppError::upstream(Upstream::Llm, e))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AppError::Upstream {
                service: Upstream::Llm,
                message: "Provider returned no completion".to_string(),
                timed_out: false,
            })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
