use std::borrow::Cow;

use rmcp::ErrorData;
use rmcp::model::{CallToolResult, Content, ErrorCode};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;
use webapi_core::control::ControlError;
use webapi_core::text::ToolText;

fn mcp_err(code: ErrorCode, message: impl Into<Cow<'static, str>>) -> ErrorData {
    ErrorData {
        code,
        message: message.into(),
        data: None,
    }
}

/// Tool parameters as the JSON arguments object the dispatcher decodes.
pub(crate) fn arguments<P: Serialize>(params: &P) -> Result<Value, ErrorData> {
    serde_json::to_value(params)
        .map_err(|err| mcp_err(ErrorCode::INTERNAL_ERROR, format!("unencodable arguments: {err}")))
}

/// One text content item per block; control errors become `isError` results.
pub(crate) fn text_result(tool: &str, result: Result<ToolText, ControlError>) -> CallToolResult {
    match result {
        Ok(text) => CallToolResult::success(
            text.into_blocks().into_iter().map(Content::text).collect(),
        ),
        Err(err) => {
            warn!(tool, error = %err, "tool failed");
            CallToolResult::error(vec![Content::text(format!("Error executing {tool}: {err}"))])
        }
    }
}
