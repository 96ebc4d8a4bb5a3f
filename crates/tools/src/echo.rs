//! Echo tool: returns the message it was given.

use async_trait::async_trait;
use memir_core::error::ToolError;
use memir_core::tool::{Tool, ToolResult};
use serde_json::Value;

pub const PLACEHOLDER_REPLY: &str = "I'm your M.E.M.I.R. assistant! (This is a placeholder response.)";

/// The canonical echo reply, shared with the echo skill.
pub fn echo_reply(message: &str) -> String {
    if message.trim().is_empty() {
        PLACEHOLDER_REPLY.to_string()
    } else {
        format!("Echo: {message}")
    }
}

pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Repeat a message back."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": { "message": { "type": "string" } },
            "required": ["message"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let message = arguments["message"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'message' argument".into()))?;
        Ok(ToolResult::ok(self.name(), echo_reply(message)))
    }
}
