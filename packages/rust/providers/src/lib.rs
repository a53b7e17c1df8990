//! HTTP adapters for the model and search ports.
//!
//! Both adapters use the blocking `reqwest` client and build it per call, so
//! they are safe to call from the blocking threads the pipeline runs ports on.

pub mod openai;
pub mod tavily;

pub use openai::OpenAiChatModel;
pub use tavily::TavilySearch;

use std::time::Duration;

use pubcompare_shared::{PubCompareError, Result};
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Blocking client with no total request timeout. The caller's stage deadline
/// bounds each call, not the client.
fn http_client() -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(None::<Duration>)
        .user_agent(concat!("pubcompare/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| PubCompareError::Network(format!("failed to build HTTP client: {e}")))
}

/// `base` joined with `path`, treating `base` as a directory.
fn endpoint(base: &Url, path: &str) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let dir = format!("{}/", base.path());
        base.set_path(&dir);
    }
    base.join(path)
        .map_err(|e| PubCompareError::config(format!("invalid endpoint {base}{path}: {e}")))
}
