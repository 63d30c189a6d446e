use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use super::response::{first_text, grounded_result};
use super::types::{ApiError, GenerateContentRequest, GenerateContentResponse, GroundedResult};
use crate::config::{ApiKey, GeminiConfig};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    #[error("Gemini rate limit exceeded")]
    RateLimited,

    #[error("Gemini quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("Gemini API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Gemini request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("model returned no content (safety filter or empty response)")]
    EmptyResponse,
}

impl GeminiError {
    /// Throttling and server-side failures are worth another attempt.
    fn is_transient(&self) -> bool {
        match self {
            GeminiError::RateLimited => true,
            GeminiError::Api { code, .. } => (500..600).contains(code),
            _ => false,
        }
    }
}

impl From<&ApiError> for GeminiError {
    fn from(err: &ApiError) -> Self {
        let message = err.message.clone().unwrap_or_default();
        match err.code {
            Some(429) => GeminiError::RateLimited,
            Some(403) => GeminiError::QuotaExhausted(message),
            code => GeminiError::Api {
                code: code.unwrap_or(0),
                message,
            },
        }
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(http: Client, config: &GeminiConfig) -> Self {
        Self {
            http,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: ApiKey::new("test-key"),
            model: "gemini-test".to_string(),
            base_url: base_url.to_string(),
        }
    }

    /// Asks for a JSON response and returns the raw text of the first candidate.
    pub async fn generate_json(&self, prompt: &str) -> Result<String, GeminiError> {
        let request = GenerateContentRequest::prompt(prompt).json_output();
        let response = self.send_with_retry(&request).await?;
        first_text(&response).ok_or(GeminiError::EmptyResponse)
    }

    /// Runs the prompt with Google Search grounding enabled.
    pub async fn grounded_search(&self, query: &str) -> Result<GroundedResult, GeminiError> {
        let request = GenerateContentRequest::prompt(query).with_google_search();
        let response = self.send_with_retry(&request).await?;
        Ok(grounded_result(&response))
    }

    async fn send_with_retry(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GeminiError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.send(request).await {
                Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                    let delay = backoff_delay(attempt);
                    debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying Gemini request");
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    async fn send(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GeminiError> {
        let url = format!("{}/{}:generateContent", self.base_url, self.model);
        debug_assert!(
            url.starts_with("https://") || cfg!(test),
            "API key must only be sent over HTTPS"
        );

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose())
            .header("User-Agent", crate::USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let err = error_from_status(status, &text);
            warn!(%status, error = %err, "Gemini request rejected");
            return Err(err);
        }

        let body: GenerateContentResponse = response.json().await?;
        if let Some(api_error) = &body.error {
            let err = GeminiError::from(api_error);
            warn!(error = %err, "Gemini reported an error with status 200");
            return Err(err);
        }

        debug!(model = %self.model, "Gemini request complete");
        Ok(body)
    }
}

/// Maps a non-2xx response to an error, preferring the structured error body.
fn error_from_status(status: StatusCode, body: &str) -> GeminiError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return GeminiError::RateLimited;
    }
    if let Ok(parsed) = serde_json::from_str::<GenerateContentResponse>(body)
        && let Some(api_error) = &parsed.error
    {
        return api_error.into();
    }

    let end = body.floor_char_boundary(200);
    GeminiError::Api {
        code: status.as_u16(),
        message: format!("HTTP {status}: {}", &body[..end]),
    }
}

/// Exponential delay with equal jitter: half fixed, half random.
fn backoff_delay(attempt: u32) -> Duration {
    let full = BASE_BACKOFF * 2u32.pow(attempt.saturating_sub(1));
    let half = full / 2;
    half + half.mul_f64(fastrand::f64())
}


#[cfg(test)]
mod http_tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn text_response(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": text }], "role": "model" }
            }]
        })
    }

    #[tokio::test]
    async fn generate_json_sends_mime_type_and_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gemini-test:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "generationConfig": { "responseMimeType": "application/json" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response(r#"{"size":"40"}"#)))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(Client::new(), &server.uri());
        let text = client.generate_json("extract").await.unwrap();

        assert_eq!(text, r#"{"size":"40"}"#);
    }

    #[tokio::test]
    async fn generate_json_empty_candidate_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": []
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(Client::new(), &server.uri());
        let result = client.generate_json("extract").await;
        assert!(matches!(result, Err(GeminiError::EmptyResponse)));
    }

    #[tokio::test]
    async fn grounded_search_enables_search_tool() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "tools": [{ "google_search": {} }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "https://org.example" }], "role": "model" },
                    "groundingMetadata": {
                        "groundingChunks": [{ "web": { "uri": "https://org.example" } }]
                    }
                }]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(Client::new(), &server.uri());
        let result = client.grounded_search("official site").await.unwrap();

        assert_eq!(result.answer.as_deref(), Some("https://org.example"));
        assert_eq!(result.sources[0].url, "https://org.example");
    }

    #[tokio::test]
    async fn server_error_is_retried_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response("{}")))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(Client::new(), &server.uri());
        let text = client.generate_json("extract").await.unwrap();
        assert_eq!(text, "{}");
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": { "code": 400, "message": "Invalid argument" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(Client::new(), &server.uri());
        let result = client.generate_json("extract").await;
        assert!(matches!(result, Err(GeminiError::Api { code: 400, .. })));
    }

    #[tokio::test]
    async fn error_body_in_200_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": { "code": 403, "message": "Quota exceeded" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(Client::new(), &server.uri());
        let result = client.generate_json("extract").await;
        assert!(matches!(result, Err(GeminiError::QuotaExhausted(_))));
    }
}
