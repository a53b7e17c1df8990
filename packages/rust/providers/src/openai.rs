//! OpenAI-compatible chat completion model.

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};
use url::Url;

use pubcompare_shared::{GenerativeModel, OpenAiConfig, PubCompareError, Result};

use crate::{endpoint, http_client};

const PORT: &str = "generative model";

/// Sends each prompt as a single system message to `/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiChatModel {
    base_url: Url,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiChatModel {
    pub fn new(config: &OpenAiConfig, api_key: impl Into<String>) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_key: api_key.into(),
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

/// Map a non-success status to a port error, keeping the API's message when present.
fn http_error(status: reqwest::StatusCode, body: &str) -> PubCompareError {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error")?.get("message")?.as_str().map(String::from))
        .unwrap_or_else(|| body.trim().to_string());

    let message = match status.as_u16() {
        401 => format!("authentication failed (401): {detail}"),
        429 => format!("rate limited or out of quota (429): {detail}"),
        s if s >= 500 => format!("server error ({status}): {detail}"),
        _ => format!("HTTP {status}: {detail}"),
    };
    PubCompareError::port(PORT, message)
}

impl GenerativeModel for OpenAiChatModel {
    #[instrument(skip_all, fields(model = %self.model))]
    fn complete(&self, prompt: &str) -> Result<String> {
        let url = endpoint(&self.base_url, "chat/completions")?;
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [{ "role": "system", "content": prompt }],
        });

        debug!(url = %url, prompt_chars = prompt.len(), "sending chat completion request");
        let response = http_client()?
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| PubCompareError::Network(format!("chat completion request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| PubCompareError::Network(format!("failed to read response body: {e}")))?;
        if !status.is_success() {
            return Err(http_error(status, &text));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| PubCompareError::port(PORT, format!("invalid response JSON: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| PubCompareError::port(PORT, "response contained no message content"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn model_for(server: &MockServer) -> OpenAiChatModel {
        let config = OpenAiConfig {
            base_url: Url::parse(&format!("{}/v1/", server.uri())).unwrap(),
            ..Default::default()
        };
        OpenAiChatModel::new(&config, "sk-test")
    }

    /// The blocking client must not be created or dropped on an async thread.
    async fn complete_blocking(model: OpenAiChatModel, prompt: &str) -> Result<String> {
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || model.complete(&prompt))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-3.5-turbo",
                "messages": [{ "role": "system", "content": "Compare these" }],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "Paper 1 uses BLEU." } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let model = model_for(&server);
        assert_eq!(model.model(), "gpt-3.5-turbo");
        let answer = complete_blocking(model, "Compare these").await.unwrap();
        assert_eq!(answer, "Paper 1 uses BLEU.");
    }

    #[tokio::test]
    async fn api_errors_become_port_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "message": "You exceeded your current quota" }
            })))
            .mount(&server)
            .await;

        let err = complete_blocking(model_for(&server), "hi").await.unwrap_err();
        match err {
            PubCompareError::Port { port, message } => {
                assert_eq!(port, PORT);
                assert!(message.contains("429"));
                assert!(message.contains("exceeded your current quota"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = complete_blocking(model_for(&server), "hi").await.unwrap_err();
        assert!(matches!(err, PubCompareError::Port { .. }));
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        // Reserve a free port, then release it so nothing listens there.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = OpenAiConfig {
            base_url: Url::parse(&format!("http://127.0.0.1:{port}/v1/")).unwrap(),
            ..Default::default()
        };
        let model = OpenAiChatModel::new(&config, "sk-test");

        let err = complete_blocking(model, "hi").await.unwrap_err();
        assert!(matches!(err, PubCompareError::Network(_)), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn slow_response_is_not_cut_off_by_client() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(std::time::Duration::from_secs(32))
                    .set_body_json(json!({
                        "choices": [{ "message": { "role": "assistant", "content": "eventually" } }]
                    })),
            )
            .mount(&server)
            .await;

        let answer = complete_blocking(model_for(&server), "take your time").await.unwrap();
        assert_eq!(answer, "eventually");
    }
}
