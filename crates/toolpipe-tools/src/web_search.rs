//! Web search tool backed by DuckDuckGo's HTML endpoint.

use crate::fetch_url::USER_AGENT;
use reqwest::{Client, Url};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use toolpipe_types::{Tool, ToolDefinition, ToolError};

const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const DEFAULT_MAX_RESULTS: usize = 6;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Tool for searching the web.
pub struct WebSearchTool {
    client: Client,
}

#[derive(Deserialize)]
struct WebSearchInput {
    query: String,
    #[serde(default = "default_max_results")]
    max_results: usize,
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

impl WebSearchTool {
    pub fn new() -> Result<Self, ToolError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ToolError::ExecutionFailed(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, ToolError> {
        let response = self
            .client
            .get(SEARCH_ENDPOINT)
            .query(&[("q", query)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ToolError::ExecutionFailed(format!("Search request failed: {e}")))?;

        let body = response
            .text()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Failed to read search results: {e}")))?;

        Ok(parse_results(&body, max_results))
    }
}

impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "web_search".to_string(),
            description: "Web search (DuckDuckGo). Returns a list of {title, url, snippet}."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "required": ["query"],
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query"
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum number of results",
                        "default": DEFAULT_MAX_RESULTS
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
            let input: WebSearchInput =
                serde_json::from_value(input).map_err(|e| ToolError::InvalidInput {
                    tool: "web_search".into(),
                    message: e.to_string(),
                })?;

            if input.query.trim().is_empty() {
                return Err(ToolError::InvalidInput {
                    tool: "web_search".into(),
                    message: "query must not be empty".into(),
                });
            }

            let results = self.search(&input.query, input.max_results).await?;
            tracing::debug!("Search for {:?} returned {} results", input.query, results.len());
            serde_json::to_value(results).map_err(|e| ToolError::ExecutionFailed(e.to_string()))
        })
    }
}

/// Pull organic results out of a DuckDuckGo HTML results page.
fn parse_results(html: &str, max_results: usize) -> Vec<SearchResult> {
    let (Ok(result_sel), Ok(link_sel), Ok(snippet_sel)) = (
        Selector::parse("div.result"),
        Selector::parse("a.result__a"),
        Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let mut results = Vec::new();

    for block in document.select(&result_sel) {
        if results.len() >= max_results {
            break;
        }
        if block.value().classes().any(|c| c == "result--ad") {
            continue;
        }
        let Some(link) = block.select(&link_sel).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };

        let snippet = block
            .select(&snippet_sel)
            .next()
            .map(|s| element_text(&s))
            .unwrap_or_default();

        results.push(SearchResult {
            title: element_text(&link),
            url: resolve_redirect(href),
            snippet,
        });
    }

    results
}

fn element_text(element: &ElementRef<'_>) -> String {
    let text: String = element.text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Result links go through `/l/?uddg=<target>`; return the target.
fn resolve_redirect(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else if href.starts_with('/') {
        format!("https://duckduckgo.com{href}")
    } else {
        href.to_string()
    };

    Url::parse(&absolute)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "uddg")
                .map(|(_, target)| target.into_owned())
        })
        .unwrap_or(absolute)
}
