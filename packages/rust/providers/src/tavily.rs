//! Tavily web search.

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};
use url::Url;

use pubcompare_shared::{PubCompareError, Result, SearchTool, TavilyConfig};

use crate::{endpoint, http_client};

const PORT: &str = "web search";

#[derive(Debug, Clone)]
pub struct TavilySearch {
    base_url: Url,
    api_key: String,
    max_results: u32,
}

impl TavilySearch {
    pub fn new(config: &TavilyConfig, api_key: impl Into<String>) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_key: api_key.into(),
            max_results: config.max_results,
        }
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

/// Plain-text rendering handed back to the agent as an observation.
fn render(response: SearchResponse) -> String {
    let mut lines = Vec::new();
    if let Some(answer) = response.answer.filter(|a| !a.is_empty()) {
        lines.push(format!("Answer: {answer}"));
    }
    for hit in response.results {
        lines.push(format!("- {} ({}): {}", hit.title, hit.url, hit.content.trim()));
    }
    if lines.is_empty() {
        return "No results found.".into();
    }
    lines.join("\n")
}

impl SearchTool for TavilySearch {
    #[instrument(skip(self))]
    fn search(&self, query: &str) -> Result<String> {
        let url = endpoint(&self.base_url, "search")?;
        debug!(url = %url, "sending search request");

        let response = http_client()?
            .post(url)
            .json(&json!({
                "api_key": self.api_key,
                "query": query,
                "max_results": self.max_results,
            }))
            .send()
            .map_err(|e| PubCompareError::Network(format!("search request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| PubCompareError::Network(format!("failed to read response body: {e}")))?;
        if !status.is_success() {
            return Err(PubCompareError::port(PORT, format!("HTTP {status}: {}", text.trim())));
        }

        let parsed: SearchResponse = serde_json::from_str(&text)
            .map_err(|e| PubCompareError::port(PORT, format!("invalid response JSON: {e}")))?;
        Ok(render(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn search_for(server: &MockServer) -> TavilySearch {
        let config = TavilyConfig {
            base_url: Url::parse(&server.uri()).unwrap(),
            max_results: 2,
            ..Default::default()
        };
        TavilySearch::new(&config, "tvly-test")
    }

    async fn search_blocking(search: TavilySearch, query: &str) -> Result<String> {
        let query = query.to_string();
        tokio::task::spawn_blocking(move || search.search(&query))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn renders_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(json!({
                "api_key": "tvly-test",
                "query": "SST-2 benchmark",
                "max_results": 2,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    { "title": "SST", "url": "https://example.org/sst", "content": "Sentiment treebank." },
                    { "title": "GLUE", "url": "https://example.org/glue", "content": "Benchmark suite." }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = search_blocking(search_for(&server), "SST-2 benchmark").await.unwrap();
        assert_eq!(
            text,
            "- SST (https://example.org/sst): Sentiment treebank.\n\
             - GLUE (https://example.org/glue): Benchmark suite."
        );
    }

    #[tokio::test]
    async fn empty_results_are_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
            .mount(&server)
            .await;

        let text = search_blocking(search_for(&server), "nothing").await.unwrap();
        assert_eq!(text, "No results found.");
    }

    #[tokio::test]
    async fn http_failure_is_port_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let err = search_blocking(search_for(&server), "q").await.unwrap_err();
        assert!(err.to_string().contains("invalid api key"));
    }
}
