//! Memory search tool: semantic lookup over the user's stored memories.

use async_trait::async_trait;
use memir_core::error::ToolError;
use memir_core::tool::{Tool, ToolResult};
use memir_memory::MemoryStore;
use serde_json::{Map, Value};

pub const DEFAULT_RESULTS: u64 = 3;

/// Searches the memory store and returns the nearest records as JSON.
pub struct MemorySearchTool {
    store: MemoryStore,
}

impl MemorySearchTool {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for MemorySearchTool {
    fn name(&self) -> &str {
        "memory_search"
    }

    fn description(&self) -> &str {
        "Search your long-term memory for relevant facts, notes, and past conversations. \
         Use this when you need to recall something the user told you before."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to look for"
                },
                "n_results": {
                    "type": "integer",
                    "description": "Maximum number of memories to return",
                    "default": DEFAULT_RESULTS
                }
            },
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
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let n_results = match arguments.get("n_results") {
            None | Some(Value::Null) => DEFAULT_RESULTS,
            Some(value) => value.as_u64().ok_or_else(|| {
                ToolError::InvalidArguments(format!(
                    "'n_results' must be a positive integer, got {value}"
                ))
            })?,
        } as usize;

        let records = self
            .store
            .search(query, n_results, None)
            .await
            .map_err(|e| crate::execution_failed(self.name(), e))?;

        let output = if records.is_empty() {
            format!("No memories found matching '{query}'.")
        } else {
            serde_json::to_string_pretty(&records)
                .map_err(|e| crate::execution_failed(self.name(), e))?
        };

        let data = serde_json::to_value(&records).ok();
        let mut result = ToolResult::ok(self.name(), output);
        result.data = data;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seeded_store, store};
    use memir_core::memory::MemoryRecord;

    #[test]
    fn tool_definition() {
        let tool = MemorySearchTool::new(store());
        assert_eq!(tool.name(), "memory_search");
        let schema = tool.parameters_schema();
        assert_eq!(schema["required"], serde_json::json!(["query"]));
        assert_eq!(schema["properties"]["n_results"]["default"], 3);
    }

    #[test]
    fn exposes_trimmed_search_query() {
        let tool = MemorySearchTool::new(store());
        let mut args = Map::new();
        args.insert("query".into(), Value::from("  favorite color "));
        assert_eq!(tool.search_query(&args).as_deref(), Some("favorite color"));
        assert_eq!(tool.search_query(&Map::new()), None);
    }

    #[tokio::test]
    async fn returns_nearest_records_as_json() {
        let tool = MemorySearchTool::new(seeded_store().await);
        let result = tool
            .execute(serde_json::json!({"query": "favorite color", "n_results": 1}))
            .await
            .unwrap();

        assert!(result.success);
        let records: Vec<MemoryRecord> = serde_json::from_value(result.data.unwrap()).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].document.contains("purple"));
    }

    #[tokio::test]
    async fn empty_store_reports_no_matches() {
        let tool = MemorySearchTool::new(store());
        let result = tool
            .execute(serde_json::json!({"query": "nonexistent topic"}))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.contains("No memories found"));
    }

    #[tokio::test]
    async fn zero_results_is_an_error() {
        let tool = MemorySearchTool::new(store());
        let result = tool
            .execute(serde_json::json!({"query": "x", "n_results": 0}))
            .await;
        assert!(matches!(result, Err(ToolError::ExecutionFailed { .. })));
    }

    #[tokio::test]
    async fn negative_results_is_an_error() {
        let tool = MemorySearchTool::new(seeded_store().await);
        let result = tool
            .execute(serde_json::json!({"query": "favorite color", "n_results": -1}))
            .await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn negative_results_fails_through_dispatch() {
        use memir_core::tool::{ToolInvocation, ToolRegistry};

        let mut registry = ToolRegistry::new();
        registry.register(Box::new(MemorySearchTool::new(seeded_store().await)));
        let mut args = Map::new();
        args.insert("query".into(), Value::from("favorite color"));
        args.insert("n_results".into(), Value::from(-1));

        let result = registry
            .dispatch(&ToolInvocation::new("memory_search", args))
            .await;
        assert!(!result.success);
        assert!(result.output.contains("positive integer"));
    }
}
