//! Tool domain value objects — the outcome of a delegated tool call.

use serde::{Deserialize, Serialize};

/// Result of a delegated tool call.
///
/// `ok` separates two very different outcomes that both look "empty":
///
/// | `ok` | `content` | `error` | Meaning |
/// |------|-----------|---------|---------|
/// | `false` | `None` | `""` | The executor declined or did not handle the call |
/// | `false` | `None` | text | The executor answered but the payload failed to decode |
/// | `true` | value | any | The tool ran; `error` is the executor's own report |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Decoded tool output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
    /// Error text reported for this call (may be empty)
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    ok: bool,
}

impl ToolResult {
    /// The executor chose not to handle the call. Not an error.
    pub fn declined() -> Self {
        Self {
            content: None,
            error: String::new(),
            ok: false,
        }
    }

    /// The executor responded but its payload could not be decoded.
    pub fn undecodable(error: impl Into<String>) -> Self {
        Self {
            content: None,
            error: error.into(),
            ok: false,
        }
    }

    /// The tool ran and produced `content`.
    pub fn completed(content: serde_json::Value, error: impl Into<String>) -> Self {
        Self {
            content: Some(content),
            error: error.into(),
            ok: true,
        }
    }

    /// Whether the tool executed and a result is attached
    pub fn is_ok(&self) -> bool {
        self.ok
    }

    pub fn is_declined(&self) -> bool {
        !self.ok && self.error.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declined_is_not_an_error() {
        let result = ToolResult::declined();
        assert!(!result.is_ok());
        assert!(result.is_declined());
        assert!(result.content.is_none());
        assert_eq!(result.error, "");
    }

    #[test]
    fn test_undecodable_is_not_declined() {
        let result = ToolResult::undecodable("trailing characters");
        assert!(!result.is_ok());
        assert!(!result.is_declined());
    }

    #[test]
    fn test_completed_keeps_executor_error() {
        let result = ToolResult::completed(serde_json::json!({"lines": 3}), "partial read");
        assert!(result.is_ok());
        assert_eq!(result.error, "partial read");
        assert_eq!(result.content.unwrap()["lines"], 3);
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(ToolResult::declined()).unwrap();
        assert_eq!(json, serde_json::json!({"error": "", "ok": false}));
    }
}
