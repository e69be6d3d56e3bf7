//! Fetch URL tool: downloads a page and returns its visible text.

use reqwest::Client;
use scraper::{Html, Node};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use toolpipe_types::{Tool, ToolDefinition, ToolError};

pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (compatible; MCPBot/1.0)";

const DEFAULT_TIMEOUT_S: u64 = 15;
const DEFAULT_MAX_CHARS: usize = 8000;
const TRUNCATION_MARKER: &str = " ...[truncated]";

/// Elements whose text never counts as visible.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript"];

/// Tool for reading a web page after a search.
pub struct FetchUrlTool {
    client: Client,
}

#[derive(Deserialize)]
struct FetchUrlInput {
    url: String,
    #[serde(default = "default_timeout_s")]
    timeout_s: u64,
    #[serde(default = "default_max_chars")]
    max_chars: usize,
}

fn default_timeout_s() -> u64 {
    DEFAULT_TIMEOUT_S
}

fn default_max_chars() -> usize {
    DEFAULT_MAX_CHARS
}

impl FetchUrlTool {
    pub fn new() -> Result<Self, ToolError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ToolError::ExecutionFailed(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn fetch(&self, input: &FetchUrlInput) -> Result<(u16, String), reqwest::Error> {
        let response = self
            .client
            .get(&input.url)
            .timeout(Duration::from_secs(input.timeout_s))
            .send()
            .await?
            .error_for_status()?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok((status, body))
    }
}

impl Tool for FetchUrlTool {
    fn name(&self) -> &str {
        "fetch_url"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "fetch_url".to_string(),
            description: "Downloads a page and returns cleaned visible text. \
                          Useful after search, so the model can read the page."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "required": ["url"],
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "Absolute http(s) URL to fetch"
                    },
                    "timeout_s": {
                        "type": "integer",
                        "description": "Request timeout in seconds",
                        "default": DEFAULT_TIMEOUT_S
                    },
                    "max_chars": {
                        "type": "integer",
                        "description": "Maximum characters of text to return",
                        "default": DEFAULT_MAX_CHARS
                    }
                }
            }),
        }
    }

    fn execute(
        &self,
        input: Value,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Value, ToolError>> + Send + '_>>
    {
        Box::pin(async move {
            let input: FetchUrlInput =
                serde_json::from_value(input).map_err(|e| ToolError::InvalidInput {
                    tool: "fetch_url".into(),
                    message: e.to_string(),
                })?;

            tracing::debug!("Fetching {}", input.url);
            match self.fetch(&input).await {
                Ok((status, body)) => {
                    let text = truncate_chars(extract_visible_text(&body), input.max_chars);
                    Ok(json!({
                        "url": input.url,
                        "status_code": status,
                        "text": text,
                    }))
                }
                Err(e) => {
                    tracing::debug!("Fetch of {} failed: {e}", input.url);
                    Ok(json!({"url": input.url, "error": e.to_string()}))
                }
            }
        })
    }
}

/// Collect every text node outside script/style/noscript, trimmed and joined
/// with single spaces.
fn extract_visible_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let mut parts = Vec::new();
    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }

    parts.join(" ")
}

fn truncate_chars(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &text[..cut]),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visible_text_skips_scripts_and_styles() {
        let html = r#"<html><head><title>Page</title>
            <style>body { color: red }</style>
            <script>var hidden = 1;</script></head>
            <body><h1>Hello</h1>
            <p>  first   paragraph </p>
            <noscript>enable js</noscript>
            <p>second</p></body></html>"#;
        assert_eq!(
            extract_visible_text(html),
            "Page Hello first   paragraph second"
        );
    }

    #[test]
    fn nested_hidden_content_is_skipped() {
        let html = "<body><noscript><p>inner</p></noscript><div>kept</div></body>";
        assert_eq!(extract_visible_text(html), "kept");
    }

    #[test]
    fn empty_document_yields_empty_text() {
        assert_eq!(extract_visible_text(""), "");
    }

    #[test]
    fn long_text_is_truncated_by_characters() {
        assert_eq!(truncate_chars("abcdef".into(), 3), "abc ...[truncated]");
        assert_eq!(truncate_chars("abc".into(), 3), "abc");
        assert_eq!(truncate_chars("héllo".into(), 2), "hé ...[truncated]");
    }

    #[tokio::test]
    async fn unreachable_host_is_reported_as_value() {
        let tool = FetchUrlTool::new().unwrap();
        let out = tool
            .execute(json!({"url": "http://127.0.0.1:9/", "timeout_s": 2, "max_chars": 100}))
            .await
            .unwrap();
        assert_eq!(out["url"], "http://127.0.0.1:9/");
        assert!(out["error"].is_string());
        assert!(out.get("text").is_none());
    }

    #[tokio::test]
    async fn invalid_url_is_reported_as_value() {
        let tool = FetchUrlTool::new().unwrap();
        let out = tool
            .execute(json!({"url": "not a url", "timeout_s": 1, "max_chars": 10}))
            .await
            .unwrap();
        assert!(out["error"].is_string());
    }

    #[tokio::test]
    async fn missing_url_is_invalid_input() {
        let tool = FetchUrlTool::new().unwrap();
        let err = tool.execute(json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput { .. }));
    }

    #[tokio::test]
    #[ignore] // requires network
    async fn fetches_a_real_page() {
        let tool = FetchUrlTool::new().unwrap();
        let out = tool
            .execute(json!({"url": "https://example.com", "timeout_s": 15, "max_chars": 8000}))
            .await
            .unwrap();
        assert_eq!(out["status_code"], 200);
        assert!(out["text"].as_str().unwrap().contains("Example Domain"));
    }
}
