//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what let the agent act on the user's memory and the outside
//! world. They are registered once at startup in a [`ToolRegistry`], and the
//! agent loop reaches them only through [`ToolRegistry::dispatch`], which never
//! fails: unknown names and tool errors come back as structured results the
//! model can react to.

use crate::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

/// A tool call parsed out of model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Name of the tool to execute
    pub name: String,

    /// Named arguments
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Canonical `name({json})` form, stable across key order.
    pub fn signature(&self) -> String {
        let mut sorted: Vec<(&String, &Value)> = self.arguments.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let args: Vec<String> = sorted
            .into_iter()
            .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), v))
            .collect();
        format!("{}({{{}}})", self.name, args.join(","))
    }
}

/// Why a dispatch did not produce a normal result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchFailure {
    /// No tool is registered under the requested name
    UnknownTool,
    /// The tool rejected its arguments or failed while running
    ToolError,
    /// The argument blob in the model output was not a JSON object
    MalformedArguments,
}

/// The result of a tool dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The tool this result is for
    pub tool_name: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content, fed back to the model verbatim
    pub output: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<DispatchFailure>,
}

impl ToolResult {
    pub fn ok(tool_name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: true,
            output: output.into(),
            data: None,
            failure: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn unknown_tool(tool_name: impl Into<String>) -> Self {
        let tool_name = tool_name.into();
        Self {
            output: format!("[Unknown tool: {tool_name}]"),
            tool_name,
            success: false,
            data: None,
            failure: Some(DispatchFailure::UnknownTool),
        }
    }

    pub fn tool_error(tool_name: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: false,
            output: format!("[Tool error: {message}]"),
            data: None,
            failure: Some(DispatchFailure::ToolError),
        }
    }

    pub fn malformed_arguments(
        tool_name: impl Into<String>,
        message: impl std::fmt::Display,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: false,
            output: format!("[Tool error: malformed arguments: {message}]"),
            data: None,
            failure: Some(DispatchFailure::MalformedArguments),
        }
    }
}

/// The core Tool trait.
///
/// Each tool (memory_search, memory_add, echo, get_weather, ...) implements
/// this trait and declares its parameters as a JSON Schema object.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "memory_search").
    fn name(&self) -> &str;

    /// A description of what this tool does (shown to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: Value) -> std::result::Result<ToolResult, ToolError>;

    /// The parameter a single positional argument binds to.
    fn positional_parameter(&self) -> Option<String> {
        self.parameters_schema()["required"]
            .as_array()
            .and_then(|required| required.first())
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// For search-style tools, the query string this call would issue.
    fn search_query(&self, _arguments: &Map<String, Value>) -> Option<String> {
        None
    }

    /// One manifest line, e.g. `memory_search(query, n_results=3): Search ...`.
    fn manifest_line(&self) -> String {
        let schema = self.parameters_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let mut params: Vec<String> = required.iter().map(|r| r.to_string()).collect();
        if let Some(props) = schema["properties"].as_object() {
            let mut optional: Vec<(&String, &Value)> = props
                .iter()
                .filter(|(k, _)| !required.contains(&k.as_str()))
                .collect();
            optional.sort_by(|a, b| a.0.cmp(b.0));
            for (name, prop) in optional {
                match prop.get("default") {
                    Some(default) => params.push(format!("{name}={default}")),
                    None => params.push(format!("{name}?")),
                }
            }
        }
        format!("{}({}): {}", self.name(), params.join(", "), self.description())
    }
}

/// Check `arguments` against a tool's parameter schema.
///
/// Rejects missing required parameters, unknown parameters, and values whose
/// JSON type does not match the declared primitive type.
pub fn validate_arguments(
    schema: &Value,
    arguments: &Map<String, Value>,
) -> std::result::Result<(), ToolError> {
    let required: Vec<&str> = schema["required"]
        .as_array()
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    for name in &required {
        match arguments.get(*name) {
            None | Some(Value::Null) => {
                return Err(ToolError::InvalidArguments(format!(
                    "missing required argument '{name}'"
                )));
            }
            Some(_) => {}
        }
    }

    let Some(properties) = schema["properties"].as_object() else {
        return Ok(());
    };

    for (name, value) in arguments {
        let Some(prop) = properties.get(name) else {
            return Err(ToolError::InvalidArguments(format!(
                "unexpected argument '{name}'"
            )));
        };
        if value.is_null() {
            continue;
        }
        let type_ok = match prop["type"].as_str() {
            Some("string") => value.is_string(),
            Some("integer") => value.is_i64() || value.is_u64(),
            Some("number") => value.is_number(),
            Some("boolean") => value.is_boolean(),
            Some("array") => value.is_array(),
            Some("object") => value.is_object(),
            _ => true,
        };
        if !type_ok {
            return Err(ToolError::InvalidArguments(format!(
                "argument '{name}' must be of type {}",
                prop["type"].as_str().unwrap_or("unknown")
            )));
        }
    }
    Ok(())
}

/// A registry of available tools.
///
/// Built once at startup; the agent loop uses it to:
/// 1. Render the tool manifest for the system prompt
/// 2. Dispatch parsed tool calls
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// The manifest shown to the model, one `- ` line per tool.
    pub fn manifest(&self) -> String {
        self.names()
            .into_iter()
            .filter_map(|name| self.get(name))
            .map(|tool| format!("- {}", tool.manifest_line()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Bind a single positional argument to the named tool's positional parameter.
    ///
    /// An empty argument binds nothing. Unknown tools get an empty map so that
    /// dispatch can report them.
    pub fn bind_positional(&self, name: &str, argument: &str) -> Map<String, Value> {
        let mut arguments = Map::new();
        if argument.is_empty() {
            return arguments;
        }
        if let Some(tool) = self.get(name) {
            let param = tool
                .positional_parameter()
                .unwrap_or_else(|| "input".to_string());
            arguments.insert(param, Value::String(argument.to_string()));
        }
        arguments
    }

    /// The query string `invocation` would issue, if it targets a search tool.
    pub fn search_query(&self, invocation: &ToolInvocation) -> Option<String> {
        self.get(&invocation.name)
            .and_then(|tool| tool.search_query(&invocation.arguments))
    }

    /// Dispatch a tool call. Never fails: unknown tools, invalid arguments
    /// and tool errors all come back as a structured [`ToolResult`].
    pub async fn dispatch(&self, invocation: &ToolInvocation) -> ToolResult {
        let Some(tool) = self.tools.get(&invocation.name) else {
            warn!(tool = %invocation.name, "Unknown tool requested");
            return ToolResult::unknown_tool(&invocation.name);
        };

        if let Err(e) = validate_arguments(&tool.parameters_schema(), &invocation.arguments) {
            warn!(tool = %invocation.name, error = %e, "Rejected tool arguments");
            return ToolResult::tool_error(&invocation.name, e);
        }

        match tool.execute(Value::Object(invocation.arguments.clone())).await {
            Ok(result) => {
                debug!(tool = %invocation.name, success = result.success, "Tool executed");
                result
            }
            Err(e) => {
                warn!(tool = %invocation.name, error = %e, "Tool failed");
                ToolResult::tool_error(&invocation.name, e)
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct ShoutTool;

    #[async_trait]
    impl Tool for ShoutTool {
        fn name(&self) -> &str {
            "shout"
        }
        fn description(&self) -> &str {
            "Upper-cases the input"
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" },
                    "times": { "type": "integer", "default": 1 }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: Value) -> std::result::Result<ToolResult, ToolError> {
            let text = arguments["text"].as_str().unwrap_or("");
            if text == "boom" {
                return Err(ToolError::ExecutionFailed {
                    tool_name: "shout".into(),
                    reason: "exploded".into(),
                });
            }
            Ok(ToolResult::ok("shout", text.to_uppercase()))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(ShoutTool));
        registry
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn registry_register_and_lookup() {
        let registry = registry();
        assert!(registry.get("shout").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.names(), vec!["shout"]);
    }

    #[test]
    fn manifest_lists_required_then_defaults() {
        let manifest = registry().manifest();
        assert_eq!(manifest, "- shout(text, times=1): Upper-cases the input");
    }

    #[tokio::test]
    async fn dispatch_runs_registered_tool() {
        let call = ToolInvocation::new("shout", args(serde_json::json!({"text": "hi"})));
        let result = registry().dispatch(&call).await;
        assert!(result.success);
        assert_eq!(result.output, "HI");
        assert!(result.failure.is_none());
    }

    #[tokio::test]
    async fn dispatch_unknown_tool_is_structured() {
        let call = ToolInvocation::new("nonexistent_tool", Map::new());
        let result = registry().dispatch(&call).await;
        assert!(!result.success);
        assert_eq!(result.failure, Some(DispatchFailure::UnknownTool));
        assert_eq!(result.output, "[Unknown tool: nonexistent_tool]");
    }

    #[tokio::test]
    async fn dispatch_tool_error_carries_message() {
        let call = ToolInvocation::new("shout", args(serde_json::json!({"text": "boom"})));
        let result = registry().dispatch(&call).await;
        assert_eq!(result.failure, Some(DispatchFailure::ToolError));
        assert!(result.output.contains("exploded"));
    }

    #[tokio::test]
    async fn dispatch_validates_schema() {
        let registry = registry();

        let missing = ToolInvocation::new("shout", Map::new());
        let result = registry.dispatch(&missing).await;
        assert!(result.output.contains("missing required argument 'text'"));

        let extra = ToolInvocation::new(
            "shout",
            args(serde_json::json!({"text": "a", "volume": 11})),
        );
        let result = registry.dispatch(&extra).await;
        assert!(result.output.contains("unexpected argument 'volume'"));

        let wrong_type = ToolInvocation::new(
            "shout",
            args(serde_json::json!({"text": "a", "times": "twice"})),
        );
        let result = registry.dispatch(&wrong_type).await;
        assert!(result.output.contains("must be of type integer"));
    }

    #[test]
    fn positional_binds_to_first_required_parameter() {
        let registry = registry();
        let bound = registry.bind_positional("shout", "hello");
        assert_eq!(bound["text"], "hello");
        assert!(registry.bind_positional("shout", "").is_empty());
        assert!(registry.bind_positional("missing", "x").is_empty());
    }

    #[test]
    fn signature_ignores_key_order() {
        let a = ToolInvocation::new("t", args(serde_json::json!({"a": 1, "b": "x"})));
        let mut reversed = Map::new();
        reversed.insert("b".into(), Value::from("x"));
        reversed.insert("a".into(), Value::from(1));
        let b = ToolInvocation::new("t", reversed);
        assert_eq!(a.signature(), b.signature());
        assert_ne!(
            a.signature(),
            ToolInvocation::new("t", Map::new()).signature()
        );
    }
}
