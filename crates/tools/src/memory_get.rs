//! Memory get tool: fetch one memory by id.

use async_trait::async_trait;
use memir_core::error::{MemoryError, ToolError};
use memir_core::tool::{Tool, ToolResult};
use memir_memory::MemoryStore;
use serde_json::Value;

pub struct MemoryGetTool {
    store: MemoryStore,
}

impl MemoryGetTool {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for MemoryGetTool {
    fn name(&self) -> &str {
        "memory_get"
    }

    fn description(&self) -> &str {
        "Fetch a single memory by its id."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "memory_id": {
                    "type": "string",
                    "description": "The id returned when the memory was stored"
                }
            },
            "required": ["memory_id"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let id = arguments["memory_id"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'memory_id' argument".into()))?;

        match self.store.get(id).await {
            Ok(record) => {
                let output = serde_json::to_string_pretty(&record)
                    .map_err(|e| crate::execution_failed(self.name(), e))?;
                Ok(ToolResult::ok(self.name(), output))
            }
            Err(MemoryError::NotFound { id }) => {
                Ok(ToolResult::ok(self.name(), format!("No memory found with id '{id}'.")))
            }
            Err(e) => Err(crate::execution_failed(self.name(), e)),
        }
    }
}
