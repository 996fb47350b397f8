use super::sse::decode_deltas;
use super::types::{ChatMessage, ChatRequest};
use crate::error::{AgError, Result};
use futures::stream::Stream;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use std::pin::Pin;
use std::time::Duration;

/// Content deltas of one streamed completion, in arrival order.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Client for OpenAI-compatible `/chat/completions` endpoints.
#[derive(Clone)]
pub struct CompletionClient {
    client: reqwest::Client,
    base_url: String,
}

impl CompletionClient {
    pub fn new(api_key: &str, base_url: &str, connect_timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| AgError::Config(format!("Invalid API key format: {}", e)))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| AgError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Submits the conversation and returns the stream of content deltas.
    pub async fn stream_chat(&self, model: &str, messages: &[ChatMessage]) -> Result<DeltaStream> {
        let request = ChatRequest::streaming(model, messages);
        tracing::debug!(
            model = model,
            messages = messages.len(),
            url = %self.completions_url(),
            "Sending streaming completion request"
        );

        let response = self
            .client
            .post(self.completions_url())
            .json(&request)
            .send()
            .await?;
        let response = check_response_status(response).await?;

        Ok(Box::pin(decode_deltas(response.bytes_stream())))
    }
}

async fn check_response_status(response: reqwest::Response) -> Result<reqwest::Response> {
    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        tracing::error!(
            status = %status,
            error = %error_text,
            "API request failed"
        );
        return Err(AgError::Api(format!(
            "API request failed with status {}: {}",
            status, error_text
        )));
    }
    Ok(response)
}
