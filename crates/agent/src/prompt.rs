//! System prompt assembly for the agentic LLM skill.

use memir_core::tool::ToolRegistry;

pub const DEFAULT_PERSONA: &str = "You are M.E.M.I.R., a helpful, upbeat little buddy. \
You can use tools to recall information, store facts, repeat messages, check the weather, \
and chat directly. You can chain multiple tool calls in a single turn, continuing to use \
tools as needed until you can provide a final answer.";

const CALL_GRAMMAR: &str = "\
You have access to the following tools. After you use a tool you will see its result \
and can decide to use another tool, repeating until you can give the user a final answer. \
To use a tool, reply with exactly:
<function_call>tool_name</function_call><arguments>{JSON arguments}</arguments>
If you do not need a tool, just reply as normal. Do not repeat a call you have just made \
with the same arguments; use the result you already have.";

const EXAMPLES: &str = r#"EXAMPLES:

User: What color did I tell you earlier?
Assistant: <function_call>memory_search</function_call><arguments>{"query": "color", "n_results": 3}</arguments>

User: Please remember this: The password is swordfish.
Assistant: <function_call>memory_add</function_call><arguments>{"document": "The password is swordfish.", "metadata": {"type": "note", "tags": ["password"]}}</arguments>

User: Get me the memory with ID 1234-abcd.
Assistant: <function_call>memory_get</function_call><arguments>{"memory_id": "1234-abcd"}</arguments>

User: What's it like outside?
Assistant: <function_call>get_weather_forecast</function_call><arguments>{}</arguments>"#;

/// Persona, then the tool manifest with call grammar and examples.
pub fn system_prompt(persona: Option<&str>, tools: &ToolRegistry) -> String {
    let persona = persona
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_PERSONA);
    format!(
        "{persona}\n\n{CALL_GRAMMAR}\n\n{}\n\n{EXAMPLES}",
        tools.manifest()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_default_persona() {
        let prompt = system_prompt(None, &ToolRegistry::new());
        assert!(prompt.starts_with(DEFAULT_PERSONA));
        assert!(prompt.contains("<function_call>tool_name</function_call>"));

        let blank = system_prompt(Some("  "), &ToolRegistry::new());
        assert!(blank.starts_with(DEFAULT_PERSONA));
    }

    #[test]
    fn stored_persona_comes_first() {
        let prompt = system_prompt(Some("You are Mimir, keeper of wisdom.\n"), &ToolRegistry::new());
        assert!(prompt.starts_with("You are Mimir, keeper of wisdom.\n\n"));
        assert!(!prompt.contains(DEFAULT_PERSONA));
    }
}
