//! ```` ```tool_elicit ```` blocks asking the client to run a local tool.

use super::fences::FencedBlock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

pub const TOOL_ELICIT_LANG: &str = "tool_elicit";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolElicitRequest {
    pub tool: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Deserialize)]
struct RawRequest {
    tool: String,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    reason: Option<Value>,
}

/// Parse one block body. Anything that is not a JSON object with a non-empty
/// string `tool` is discarded.
pub fn parse_body(body: &str) -> Option<ToolElicitRequest> {
    let value: Value = match serde_json::from_str(body.trim()) {
        Ok(value) => value,
        Err(err) => {
            debug!(error = %err, "Discarding malformed tool_elicit block");
            return None;
        }
    };
    if !value.is_object() {
        return None;
    }
    let raw: RawRequest = serde_json::from_value(value).ok()?;

    let tool = raw.tool.trim();
    if tool.is_empty() {
        return None;
    }

    let params = match raw.params {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(other) => {
            debug!(tool, params = %other, "Discarding tool_elicit block with non-object params");
            return None;
        }
    };

    let reason = raw.reason.and_then(|r| match r {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    });

    Some(ToolElicitRequest {
        tool: tool.to_string(),
        params,
        reason,
    })
}

/// Requests from every `tool_elicit` block, in document order.
pub fn extract(blocks: &[FencedBlock<'_>]) -> Vec<ToolElicitRequest> {
    blocks
        .iter()
        .filter(|block| block.lang == TOOL_ELICIT_LANG)
        .filter_map(|block| parse_body(block.body))
        .collect()
}

/// True when a `tool_elicit` fence has opened but not yet closed.
pub fn has_open_block(blocks: &[FencedBlock<'_>]) -> bool {
    blocks
        .iter()
        .any(|block| block.lang == TOOL_ELICIT_LANG && !block.closed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::inline::fences::scan;
    use serde_json::json;

    #[test]
    fn parses_tool_params_and_reason() {
        let text = "Let me check.\n```tool_elicit\n{\"tool\": \"current_time\", \"params\": {\"timezone\": \"UTC\"}, \"reason\": \"need the time\"}\n```\n";
        let requests = extract(&scan(text));
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].tool, "current_time");
        assert_eq!(requests[0].params.get("timezone"), Some(&json!("UTC")));
        assert_eq!(requests[0].reason.as_deref(), Some("need the time"));
    }

    #[test]
    fn params_and_reason_are_optional() {
        let request = parse_body(r#"{"tool":"generate_uuid"}"#).unwrap();
        assert!(request.params.is_empty());
        assert!(request.reason.is_none());
    }

    #[test]
    fn malformed_json_yields_no_request() {
        let text = "```tool_elicit\n{\"tool\": \"calculate\", \"params\": {\n```\n";
        assert!(extract(&scan(text)).is_empty());
    }

    #[test]
    fn missing_or_empty_tool_is_discarded() {
        assert!(parse_body(r#"{"params": {}}"#).is_none());
        assert!(parse_body(r#"{"tool": "  "}"#).is_none());
        assert!(parse_body(r#"{"tool": 7}"#).is_none());
        assert!(parse_body(r#"["tool"]"#).is_none());
        assert!(parse_body(r#"{"tool": "x", "params": [1, 2]}"#).is_none());
    }

    #[test]
    fn bad_block_does_not_hide_good_ones() {
        let text = "```tool_elicit\nnot json\n```\n\n```tool_elicit\n{\"tool\":\"a\"}\n```\n```json\n{\"tool\":\"b\"}\n```\n";
        let requests = extract(&scan(text));
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].tool, "a");
    }

    #[test]
    fn detects_open_block_mid_stream() {
        assert!(has_open_block(&scan("```tool_elicit\n{\"tool\":")));
        assert!(!has_open_block(&scan("```tool_elicit\n{}\n```\n")));
    }
}
