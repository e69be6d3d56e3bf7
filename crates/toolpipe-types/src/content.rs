//! Content blocks carried in tool results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One unit of tool output.
///
/// Only `text` blocks have a first-class shape. Every other block kind
/// (images, embedded resources, whatever a host invents) is kept verbatim as
/// an opaque JSON object so it can be handed back to the caller untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum ContentBlock {
    Text { text: String },
    Opaque(Value),
}

impl ContentBlock {
    /// Create a text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// The text payload, if this is a text block.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Opaque(_) => None,
        }
    }

    /// The block's `type` tag.
    pub fn kind(&self) -> &str {
        match self {
            Self::Text { .. } => "text",
            Self::Opaque(value) => value
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("unknown"),
        }
    }
}

impl TryFrom<Value> for ContentBlock {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Some(object) = value.as_object() else {
            return Err(format!("content block must be an object, got {value}"));
        };
        match object.get("type").and_then(Value::as_str) {
            Some("text") => match object.get("text") {
                Some(Value::String(text)) => Ok(Self::Text { text: text.clone() }),
                _ => Err("text content block is missing a string `text` field".to_string()),
            },
            Some(_) => Ok(Self::Opaque(value)),
            None => Err("content block is missing its `type` tag".to_string()),
        }
    }
}

impl From<ContentBlock> for Value {
    fn from(block: ContentBlock) -> Self {
        match block {
            ContentBlock::Text { text } => serde_json::json!({"type": "text", "text": text}),
            ContentBlock::Opaque(value) => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_block_wire_shape() {
        let block = ContentBlock::text("hello");
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value, json!({"type": "text", "text": "hello"}));
    }

    #[test]
    fn unknown_kind_is_kept_opaque() {
        let raw = json!({"type": "image", "data": "aGk=", "mimeType": "image/png"});
        let block: ContentBlock = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(block.kind(), "image");
        assert!(block.as_text().is_none());
        assert_eq!(serde_json::to_value(&block).unwrap(), raw);
    }

    #[test]
    fn text_block_without_text_is_rejected() {
        let err = serde_json::from_value::<ContentBlock>(json!({"type": "text"})).unwrap_err();
        assert!(err.to_string().contains("`text`"));
    }

    #[test]
    fn untagged_block_is_rejected() {
        assert!(serde_json::from_value::<ContentBlock>(json!({"text": "x"})).is_err());
        assert!(serde_json::from_value::<ContentBlock>(json!("x")).is_err());
    }
}
