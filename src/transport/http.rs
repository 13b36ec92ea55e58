use super::{RequestEnvelope, RequestTransport};
use crate::config::CommandConfig;
use crate::core::{CommandError, Result};
use async_trait::async_trait;
use serde_json::Value as JsonValue;

/// Posts envelopes as JSON to the authority's HTTP endpoint.
///
/// A non-2xx answer is a transport error carrying the `error` field of the
/// response body when there is one.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn from_config(config: &CommandConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| CommandError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            url: config.server_url(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RequestTransport for HttpTransport {
    async fn send(&self, envelope: RequestEnvelope) -> Result<JsonValue> {
        let response = self
            .client
            .post(&self.url)
            .json(&envelope)
            .send()
            .await
            .map_err(|err| CommandError::Transport(err.to_string()))?;

        let status = response.status();
        let body: JsonValue = response
            .json()
            .await
            .map_err(|err| CommandError::Transport(format!("invalid response body: {}", err)))?;

        if !status.is_success() {
            let message = body
                .get("error")
                .and_then(JsonValue::as_str)
                .unwrap_or_else(|| status.as_str());
            return Err(CommandError::Transport(format!(
                "server answered {}: {}",
                status, message
            )));
        }
        Ok(body)
    }
}
