//! Structured errors for the naturia-sw server.
//!
//! Failures of the intermediary itself arrive as `naturia_core::Error`;
//! these cover problems with the tool call.

use rmcp::model::{ErrorCode, ErrorData as McpError};

/// Structured errors for tool calls.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Invalid input parameters (e.g., unknown theme, bad timestamp).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Tool output could not be encoded.
    #[error("ENCODE_FAILED: {0}")]
    EncodeFailed(String),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let (code, message) = match &err {
            ToolError::InvalidInput(msg) => (-32602, msg.clone()),
            ToolError::EncodeFailed(msg) => (-32603, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_codes() {
        let err: McpError = ToolError::InvalidInput("theme must be light or dark".into()).into();
        assert_eq!(err.code.0, -32602);
        assert_eq!(err.message, "theme must be light or dark");

        let err: McpError = ToolError::EncodeFailed("x".into()).into();
        assert_eq!(err.code.0, -32603);
    }
}
