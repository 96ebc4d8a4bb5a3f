//! LLM chat tool: a single direct completion without tools.

use async_trait::async_trait;
use memir_core::error::ToolError;
use memir_core::message::{ConversationTurn, Message};
use memir_core::provider::{Provider, ProviderRequest};
use memir_core::tool::{Tool, ToolResult};
use serde_json::Value;
use std::sync::Arc;

pub struct LlmChatTool {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmChatTool {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: 1000,
        }
    }

    pub fn with_limits(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl Tool for LlmChatTool {
    fn name(&self) -> &str {
        "llm_chat"
    }

    fn description(&self) -> &str {
        "Ask the language model a free-form question, optionally with prior conversation turns."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message": { "type": "string" },
                "history": {
                    "type": "array",
                    "description": "Earlier turns as [role, content] pairs"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let message = arguments["message"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'message' argument".into()))?;

        let history: Vec<ConversationTurn> = match arguments.get("history") {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| ToolError::InvalidArguments(format!("invalid history: {e}")))?,
        };

        let mut messages: Vec<Message> = history.iter().map(ConversationTurn::to_message).collect();
        messages.push(Message::user(message));

        let request = ProviderRequest::new(&self.model, messages)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| crate::execution_failed(self.name(), e))?;

        Ok(ToolResult::ok(self.name(), response.message.content))
    }
}
