//! Memory add tool: lets the agent store a new memory.

use async_trait::async_trait;
use memir_core::error::ToolError;
use memir_core::memory::MemoryMetadata;
use memir_core::tool::{Tool, ToolResult};
use memir_memory::MemoryStore;
use serde_json::Value;

pub struct MemoryAddTool {
    store: MemoryStore,
}

impl MemoryAddTool {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for MemoryAddTool {
    fn name(&self) -> &str {
        "memory_add"
    }

    fn description(&self) -> &str {
        "Store a new memory. Metadata needs at least a 'type' such as note or task."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "document": {
                    "type": "string",
                    "description": "The text to remember"
                },
                "metadata": {
                    "type": "object",
                    "description": "Metadata such as type, title, tags",
                    "default": { "type": "note" }
                }
            },
            "required": ["document"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let document = arguments["document"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'document' argument".into()))?;

        let metadata = match arguments.get("metadata") {
            None | Some(Value::Null) => MemoryMetadata::new("note"),
            Some(value) => {
                let mut value = value.clone();
                if let Some(obj) = value.as_object_mut() {
                    obj.entry("type").or_insert_with(|| Value::from("note"));
                }
                serde_json::from_value(value).map_err(|e| {
                    ToolError::InvalidArguments(format!("invalid metadata: {e}"))
                })?
            }
        };

        let record = self
            .store
            .add(document, metadata)
            .await
            .map_err(|e| crate::execution_failed(self.name(), e))?;

        let output = serde_json::to_string_pretty(&record)
            .map_err(|e| crate::execution_failed(self.name(), e))?;
        Ok(ToolResult::ok(self.name(), output)
            .with_data(serde_json::json!({ "id": record.id })))
    }
}
