use std::env;

use reqwest::Client;

use super::endpoints::{
    ChatCompletionRequest, ChatCompletionResponse, Provider, OPENROUTER_CHAT_URL,
};

#[derive(Debug, thiserror::Error)]
pub enum ApiConnectionError {
    #[error("API key not found in environment: {0}")]
    MissingApiKey(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("API error {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("API returned no message content")]
    EmptyResponse,
}

impl Provider {
    pub fn openrouter(api_key_env: &str, endpoint: &str) -> Self {
        Self::OpenRouter {
            api_key_env: api_key_env.to_string(),
            endpoint: endpoint.to_string(),
        }
    }

    pub fn openrouter_default(api_key_env: &str) -> Self {
        Self::openrouter(api_key_env, OPENROUTER_CHAT_URL)
    }

    /// Whether the API key env var is set, without reading the key.
    pub fn has_api_key(&self) -> bool {
        match self {
            Provider::OpenRouter { api_key_env, .. } => env::var(api_key_env).is_ok(),
        }
    }

    pub async fn call_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ApiConnectionError> {
        match self {
            Provider::OpenRouter {
                api_key_env,
                endpoint,
            } => {
                let api_key = env::var(api_key_env)
                    .map_err(|_| ApiConnectionError::MissingApiKey(api_key_env.clone()))?;

                let site_url =
                    env::var("SITE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
                let app_name =
                    env::var("APP_NAME").unwrap_or_else(|_| "ingredient-canon".to_string());

                tracing::debug!(
                    model = request.model.as_str(),
                    endpoint = endpoint.as_str(),
                    "chat completion request"
                );
                let response = Client::new()
                    .post(endpoint)
                    .bearer_auth(api_key)
                    .header("Content-Type", "application/json")
                    .header("HTTP-Referer", site_url)
                    .header("X-Title", app_name)
                    .json(&request)
                    .send()
                    .await?;

                let status = response.status();
                if status.is_success() {
                    let body = response.text().await?;
                    Ok(serde_json::from_str::<ChatCompletionResponse>(&body)?)
                } else {
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Failed to read error body".to_string());
                    tracing::warn!(%status, "chat completion failed");
                    Err(ApiConnectionError::Api { status, body })
                }
            }
        }
    }
}
