//! Tool registry and built-in tools for toolpipe.

mod calc;
mod fetch_url;
mod registry;
pub mod schema;
mod web_search;

pub use calc::CalcTool;
pub use fetch_url::FetchUrlTool;
pub use registry::ToolRegistry;
pub use web_search::WebSearchTool;
