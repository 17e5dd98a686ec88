//! Result helpers for MCP tool responses

use rmcp::{
    model::{CallToolResult, Content},
    ErrorData as McpError,
};
use serde::Serialize;

/// Create a successful JSON response from any serializable data
///
/// The data is pretty-printed into a single text content item, which is what
/// agents read back from a tool call.
///
/// ```rust,ignore
/// fn my_tool(&self) -> Result<CallToolResult, McpError> {
///     let tables = vec!["public.users"];
///     json_success(&tables)
/// }
/// ```
pub fn json_success<T: Serialize>(data: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| McpError::internal_error(format!("failed to serialize result: {}", e), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Preview {
        columns: Vec<String>,
        rows: Vec<Option<String>>,
    }

    #[test]
    fn test_json_success() {
        let data = Preview {
            columns: vec!["id".to_string()],
            rows: vec![Some("1".to_string()), None],
        };
        let result = json_success(&data).unwrap();
        assert!(!result.is_error.unwrap_or(false));
        assert_eq!(result.content.len(), 1);

        let text = result.content[0].as_text().unwrap().text.clone();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["rows"][1], serde_json::Value::Null);
    }
}
