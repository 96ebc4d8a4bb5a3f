//! Single-argument memory tools for the line-oriented `NAME(ARG)` call form.
//!
//! These reply with short human-readable text instead of JSON.

use async_trait::async_trait;
use memir_core::error::ToolError;
use memir_core::memory::MemoryMetadata;
use memir_core::tool::{Tool, ToolResult};
use memir_memory::MemoryStore;
use serde_json::{Map, Value};

const SEARCH_LIMIT: usize = 3;

fn bullet_list(documents: impl IntoIterator<Item = String>) -> String {
    documents
        .into_iter()
        .map(|d| format!("- {d}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `save_memory(text)` stores a chat note.
pub struct SaveMemoryTool {
    store: MemoryStore,
}

impl SaveMemoryTool {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for SaveMemoryTool {
    fn name(&self) -> &str {
        "save_memory"
    }

    fn description(&self) -> &str {
        "Save a note to memory."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let text = arguments["text"].as_str().unwrap_or_default();
        let metadata = MemoryMetadata::new("note").with_tags(["chat"]);
        self.store
            .add(text, metadata)
            .await
            .map_err(|e| crate::execution_failed(self.name(), e))?;
        Ok(ToolResult::ok(self.name(), "[Memory saved]"))
    }
}

/// `search_memory(query)` returns matching documents as a bullet list.
pub struct SearchMemoryTool {
    store: MemoryStore,
}

impl SearchMemoryTool {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for SearchMemoryTool {
    fn name(&self) -> &str {
        "search_memory"
    }

    fn description(&self) -> &str {
        "Search memory for relevant notes."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"]
        })
    }

    fn search_query(&self, arguments: &Map<String, Value>) -> Option<String> {
        arguments
            .get("query")
            .and_then(Value::as_str)
            .map(|q| q.trim().to_string())
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"].as_str().unwrap_or_default();
        let records = self
            .store
            .search(query, SEARCH_LIMIT, None)
            .await
            .map_err(|e| crate::execution_failed(self.name(), e))?;
        let lines = bullet_list(records.into_iter().map(|r| r.document));
        Ok(ToolResult::ok(
            self.name(),
            format!("[Memory search results for '{query}']:\n{lines}"),
        ))
    }
}

/// `list_memories()` dumps every stored document.
pub struct ListMemoriesTool {
    store: MemoryStore,
}

impl ListMemoriesTool {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ListMemoriesTool {
    fn name(&self) -> &str {
        "list_memories"
    }

    fn description(&self) -> &str {
        "List all stored memories."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _arguments: Value) -> Result<ToolResult, ToolError> {
        let records = self
            .store
            .list()
            .await
            .map_err(|e| crate::execution_failed(self.name(), e))?;
        let lines = bullet_list(records.into_iter().map(|r| r.document));
        Ok(ToolResult::ok(self.name(), format!("[All memories]:\n{lines}")))
    }
}

/// `remove_memory(id)` deletes one memory.
pub struct RemoveMemoryTool {
    store: MemoryStore,
}

impl RemoveMemoryTool {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for RemoveMemoryTool {
    fn name(&self) -> &str {
        "remove_memory"
    }

    fn description(&self) -> &str {
        "Remove a memory by id."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": { "id": { "type": "string" } },
            "required": ["id"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let id = arguments["id"].as_str().unwrap_or_default();
        let removed = self
            .store
            .remove(id)
            .await
            .map_err(|e| crate::execution_failed(self.name(), e))?;
        let output = if removed {
            format!("[Memory removed: {id}]")
        } else {
            format!("[No memory with id {id}]")
        };
        Ok(ToolResult::ok(self.name(), output))
    }
}
