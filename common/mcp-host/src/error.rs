//! Error conversion for MCP tools
//!
//! Domain crates implement [`IntoMcpError`] for their error enums to pick the
//! MCP error code per variant; [`ResultExt::to_mcp_err`] then applies it at
//! the tool boundary.

use rmcp::ErrorData as McpError;

/// Type alias for MCP tool results
pub type McpResult<T> = Result<T, McpError>;

/// Conversion of a domain error into an MCP error
///
/// ```rust,ignore
/// impl IntoMcpError for MyError {
///     fn into_mcp_error(self) -> McpError {
///         match self {
///             MyError::BadInput(msg) => McpError::invalid_params(msg, None),
///             other => McpError::internal_error(other.to_string(), None),
///         }
///     }
/// }
/// ```
pub trait IntoMcpError {
    /// Convert this error into an MCP error
    fn into_mcp_error(self) -> McpError;
}

impl IntoMcpError for serde_json::Error {
    fn into_mcp_error(self) -> McpError {
        McpError::invalid_params(format!("JSON error: {}", self), None)
    }
}

/// Extension trait providing `to_mcp_err()` on results
pub trait ResultExt<T> {
    /// Convert the error to an MCP error
    fn to_mcp_err(self) -> McpResult<T>;
}

impl<T, E: IntoMcpError> ResultExt<T> for Result<T, E> {
    fn to_mcp_err(self) -> McpResult<T> {
        self.map_err(IntoMcpError::into_mcp_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::ErrorCode;

    #[derive(Debug)]
    enum LookupError {
        Missing(String),
        Broken,
    }

    impl IntoMcpError for LookupError {
        fn into_mcp_error(self) -> McpError {
            match self {
                LookupError::Missing(name) => {
                    McpError::invalid_params(format!("{} is missing", name), None)
                }
                LookupError::Broken => McpError::internal_error("broken", None),
            }
        }
    }

    #[test]
    fn test_result_ext_uses_variant_mapping() {
        let result: Result<(), LookupError> = Err(LookupError::Missing("table".into()));
        let err = result.to_mcp_err().unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert!(err.message.contains("table is missing"));

        let result: Result<(), LookupError> = Err(LookupError::Broken);
        let err = result.to_mcp_err().unwrap_err();
        assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
    }

    #[test]
    fn test_result_ext_passes_ok_through() {
        let result: Result<u8, LookupError> = Ok(7);
        assert_eq!(result.to_mcp_err().unwrap(), 7);
    }

    #[test]
    fn test_json_error_is_invalid_params() {
        let err = serde_json::from_str::<u8>("nope").unwrap_err().into_mcp_error();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }
}
