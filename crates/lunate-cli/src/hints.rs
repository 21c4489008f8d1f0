//! Documentation hints for unsupported constructs.
//!
//! Purely advisory: a missing service, a slow one, or a malformed answer all
//! come back as `None`.

use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

fn default_timeout_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HintOptions {
    /// Hint service root; hints are off when unset.
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for HintOptions {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Deserialize)]
struct HintResponse {
    hint: String,
}

/// Body of a hint response: `{"hint": "..."}` or plain text.
pub fn parse_hint(body: &str) -> Option<String> {
    let text = match serde_json::from_str::<HintResponse>(body) {
        Ok(response) => response.hint,
        Err(_) => body.to_string(),
    };
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

pub fn hint_url(base_url: &str, node_type: &str) -> String {
    format!("{}/hints/{}", base_url.trim_end_matches('/'), node_type)
}

/// `GET <base>/hints/<nodeType>`.
pub async fn fetch_hint(options: &HintOptions, node_type: &str) -> Option<String> {
    let base_url = options.base_url.as_deref()?;
    let url = hint_url(base_url, node_type);

    let request = async {
        let response = reqwest::Client::new()
            .get(&url)
            .send()
            .await?
            .error_for_status()?;
        response.text().await
    };

    match tokio::time::timeout(Duration::from_millis(options.timeout_ms), request).await {
        Ok(Ok(body)) => parse_hint(&body),
        Ok(Err(err)) => {
            debug!("Hint request {} failed: {}", url, err);
            None
        }
        Err(_) => {
            debug!("Hint request {} timed out after {}ms", url, options.timeout_ms);
            None
        }
    }
}
