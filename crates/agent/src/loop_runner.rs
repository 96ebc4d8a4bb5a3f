//! The agent loop: consult the model, run the tool it asks for, feed the
//! result back, and repeat until it answers in plain text.
//!
//! The model is untrusted, so every exchange is bounded three ways:
//!
//! - a step budget on model consultations, ending in [`BUDGET_EXCEEDED_REPLY`];
//! - repeat suppression: an identical call is dispatched at most
//!   `max_consecutive_repeats` times in a row, after which the model is told
//!   the call was already satisfied;
//! - a cap on distinct search queries, ending in [`QUERY_CAP_REPLY`].

use crate::parser::{self, CallArguments, Parsed};
use memir_config::AgentConfig;
use memir_core::event::{DomainEvent, EventBus};
use memir_core::message::{Message, Role};
use memir_core::provider::{Provider, ProviderRequest};
use memir_core::tool::{ToolInvocation, ToolRegistry, ToolResult};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub const BUDGET_EXCEEDED_REPLY: &str = "[Agent loop exceeded max steps]";
pub const QUERY_CAP_REPLY: &str =
    "I don't know. I couldn't find that information. Would you like to tell me?";

fn suppression_notice(tool_name: &str) -> String {
    format!(
        "[Call already satisfied: {tool_name} was just called with the same arguments. \
         Use the previous result and answer the user.]"
    )
}

/// How an exchange ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The model replied with plain text
    Answered,
    /// The step budget ran out while the model kept calling tools
    BudgetExceeded,
    /// The model tried one distinct search query too many
    QueryCapReached,
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Answered => "answered",
            Self::BudgetExceeded => "budget_exceeded",
            Self::QueryCapReached => "query_cap_reached",
        }
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of one exchange.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    /// Always non-empty unless the model itself answered with empty text
    pub reply: String,
    pub termination: Termination,
    /// Model consultations made
    pub steps: usize,
    /// Tool calls actually dispatched
    pub tool_calls: usize,
    /// Every message of the exchange, seed messages included
    pub transcript: Vec<Message>,
}

impl AgentOutcome {
    pub fn function_turns(&self) -> impl Iterator<Item = &Message> {
        self.transcript.iter().filter(|m| m.role == Role::Function)
    }
}

/// Per-exchange bookkeeping for the loop bounds.
#[derive(Default)]
struct ExchangeState {
    steps: usize,
    tool_calls: usize,
    last_signature: Option<String>,
    consecutive: usize,
    queries: HashSet<String>,
}

impl ExchangeState {
    /// Record `signature` and return how many times in a row it has now been seen.
    fn observe(&mut self, signature: String) -> usize {
        if self.last_signature.as_ref() == Some(&signature) {
            self.consecutive += 1;
        } else {
            self.last_signature = Some(signature);
            self.consecutive = 1;
        }
        self.consecutive
    }

    fn forget_last_call(&mut self) {
        self.last_signature = None;
        self.consecutive = 0;
    }
}

/// The core agent loop that orchestrates LLM calls and tool execution.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tools: Arc<ToolRegistry>,
    max_steps: usize,
    max_consecutive_repeats: usize,
    max_distinct_queries: usize,
    event_bus: Option<Arc<EventBus>>,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            tools,
            max_steps: 5,
            max_consecutive_repeats: 2,
            max_distinct_queries: 3,
            event_bus: None,
        }
    }

    /// Take model and bounds from the `[agent]` config section.
    pub fn with_config(mut self, config: &AgentConfig) -> Self {
        self.model = config.model.clone();
        self.max_steps = config.max_steps;
        self.max_consecutive_repeats = config.max_consecutive_repeats;
        self.max_distinct_queries = config.max_distinct_queries;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_max_steps(mut self, max: usize) -> Self {
        self.max_steps = max;
        self
    }

    pub fn with_max_consecutive_repeats(mut self, max: usize) -> Self {
        self.max_consecutive_repeats = max;
        self
    }

    pub fn with_max_distinct_queries(mut self, max: usize) -> Self {
        self.max_distinct_queries = max;
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }

    /// Run one exchange over `messages` (system prompt, history, user message).
    ///
    /// Only an oracle failure is returned as an error; tool problems become
    /// function turns the model can react to.
    pub async fn run(&self, messages: Vec<Message>) -> Result<AgentOutcome, memir_core::Error> {
        let mut transcript = messages;
        let mut state = ExchangeState::default();

        info!(
            model = %self.model,
            messages = transcript.len(),
            max_steps = self.max_steps,
            "Starting agent exchange"
        );

        while state.steps < self.max_steps {
            state.steps += 1;
            debug!(step = state.steps, "Consulting model");

            let mut request = ProviderRequest::new(&self.model, transcript.clone())
                .with_temperature(self.temperature);
            if let Some(max_tokens) = self.max_tokens {
                request = request.with_max_tokens(max_tokens);
            }
            let response = self.provider.complete(request).await?;
            let content = response.message.content;

            let call = match parser::parse(&content) {
                Parsed::Answer(text) => {
                    return Ok(self.finish(transcript, state, text, Termination::Answered));
                }
                Parsed::Call(call) => call,
            };
            transcript.push(Message::assistant(content));

            let arguments = match call.arguments {
                CallArguments::Named(map) => map,
                CallArguments::Positional(arg) => self.tools.bind_positional(&call.name, &arg),
                CallArguments::Malformed(reason) => {
                    warn!(tool = %call.name, %reason, "Malformed tool arguments");
                    state.forget_last_call();
                    let result = ToolResult::malformed_arguments(&call.name, reason);
                    transcript.push(Message::function(&call.name, result.output));
                    continue;
                }
            };
            let invocation = ToolInvocation::new(call.name, arguments);

            if state.observe(invocation.signature()) > self.max_consecutive_repeats {
                warn!(tool = %invocation.name, "Suppressing repeated tool call");
                self.publish(DomainEvent::CallSuppressed {
                    tool_name: invocation.name.clone(),
                    timestamp: chrono::Utc::now(),
                });
                transcript.push(Message::function(
                    &invocation.name,
                    suppression_notice(&invocation.name),
                ));
                continue;
            }

            if let Some(query) = self.tools.search_query(&invocation) {
                if !state.queries.contains(&query) {
                    if state.queries.len() >= self.max_distinct_queries {
                        warn!(
                            tool = %invocation.name,
                            %query,
                            distinct = state.queries.len(),
                            "Distinct query cap reached"
                        );
                        return Ok(self.finish(
                            transcript,
                            state,
                            QUERY_CAP_REPLY.to_string(),
                            Termination::QueryCapReached,
                        ));
                    }
                    state.queries.insert(query);
                }
            }

            let start = Instant::now();
            let result = self.tools.dispatch(&invocation).await;
            let duration_ms = start.elapsed().as_millis() as u64;
            state.tool_calls += 1;

            info!(
                tool = %invocation.name,
                success = result.success,
                duration_ms,
                "Tool dispatched"
            );
            self.publish(DomainEvent::ToolDispatched {
                tool_name: invocation.name.clone(),
                success: result.success,
                duration_ms,
                timestamp: chrono::Utc::now(),
            });

            transcript.push(Message::function(&invocation.name, result.output));
        }

        warn!(steps = state.steps, "Agent loop exceeded max steps");
        Ok(self.finish(
            transcript,
            state,
            BUDGET_EXCEEDED_REPLY.to_string(),
            Termination::BudgetExceeded,
        ))
    }

    fn finish(
        &self,
        mut transcript: Vec<Message>,
        state: ExchangeState,
        reply: String,
        termination: Termination,
    ) -> AgentOutcome {
        transcript.push(Message::assistant(&reply));
        info!(
            steps = state.steps,
            tool_calls = state.tool_calls,
            %termination,
            "Agent exchange finished"
        );
        self.publish(DomainEvent::ExchangeFinished {
            steps: state.steps,
            termination: termination.to_string(),
            timestamp: chrono::Utc::now(),
        });
        AgentOutcome {
            reply,
            termination,
            steps: state.steps,
            tool_calls: state.tool_calls,
            transcript,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FailingProvider, SequentialMockProvider, seeded_registry};
    use memir_core::Error;

    fn seed(question: &str) -> Vec<Message> {
        vec![Message::system("You are a test agent."), Message::user(question)]
    }

    fn agent(provider: Arc<SequentialMockProvider>, tools: ToolRegistry) -> AgentLoop {
        AgentLoop::new(provider, "mock-model", Arc::new(tools))
    }

    #[tokio::test]
    async fn plain_answer_ends_after_one_step() {
        let provider = Arc::new(SequentialMockProvider::texts(&["Hello! How can I help?"]));
        let outcome = agent(provider.clone(), seeded_registry().await)
            .run(seed("Hello!"))
            .await
            .unwrap();

        assert_eq!(outcome.reply, "Hello! How can I help?");
        assert_eq!(outcome.termination, Termination::Answered);
        assert_eq!(outcome.steps, 1);
        assert_eq!(outcome.tool_calls, 0);
        // system + user + assistant
        assert_eq!(outcome.transcript.len(), 3);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn one_tool_call_then_answer() {
        let provider = Arc::new(SequentialMockProvider::texts(&[
            r#"<function_call>memory_search</function_call><arguments>{"query":"x","n_results":1}</arguments>"#,
            "done",
        ]));
        let outcome = agent(provider.clone(), seeded_registry().await)
            .run(seed("What do you know?"))
            .await
            .unwrap();

        assert_eq!(outcome.reply, "done");
        assert_eq!(provider.call_count(), 2);
        assert_eq!(outcome.steps, 2);
        assert_eq!(outcome.tool_calls, 1);

        let functions: Vec<&Message> = outcome.function_turns().collect();
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].name.as_deref(), Some("memory_search"));

        // The second consultation saw the tool result.
        let second = &provider.requests()[1];
        assert_eq!(second.messages.last().unwrap().role, Role::Function);
    }

    #[tokio::test]
    async fn endless_tool_calls_hit_the_budget() {
        let calls: Vec<String> = (0..10)
            .map(|i| {
                format!(
                    r#"<function_call>echo</function_call><arguments>{{"message": "ping {i}"}}</arguments>"#
                )
            })
            .collect();
        let provider = Arc::new(SequentialMockProvider::new(calls));
        let outcome = agent(provider.clone(), seeded_registry().await)
            .with_max_steps(5)
            .run(seed("loop forever"))
            .await
            .unwrap();

        assert_eq!(outcome.reply, BUDGET_EXCEEDED_REPLY);
        assert_eq!(outcome.termination, Termination::BudgetExceeded);
        assert_eq!(provider.call_count(), 5);
        assert_eq!(outcome.tool_calls, 5);
    }

    #[tokio::test]
    async fn third_identical_call_is_suppressed() {
        let bus = Arc::new(EventBus::default());
        let mut events = bus.subscribe();
        let same = r#"<function_call>echo</function_call><arguments>{"message": "hi"}</arguments>"#;
        let provider = Arc::new(SequentialMockProvider::texts(&[same, same, same, "ok"]));

        let outcome = agent(provider.clone(), seeded_registry().await)
            .with_event_bus(bus)
            .run(seed("say hi"))
            .await
            .unwrap();

        assert_eq!(outcome.reply, "ok");
        assert_eq!(outcome.tool_calls, 2);
        assert_eq!(outcome.steps, 4);

        let functions: Vec<&str> = outcome.function_turns().map(|m| m.content.as_str()).collect();
        assert_eq!(functions[0], "Echo: hi");
        assert_eq!(functions[1], "Echo: hi");
        assert_eq!(functions[2], suppression_notice("echo"));

        let mut suppressed = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event.as_ref(), DomainEvent::CallSuppressed { .. }) {
                suppressed += 1;
            }
        }
        assert_eq!(suppressed, 1);
    }

    #[tokio::test]
    async fn different_call_resets_the_repeat_count() {
        let a = r#"<function_call>echo</function_call><arguments>{"message": "a"}</arguments>"#;
        let b = r#"<function_call>echo</function_call><arguments>{"message": "b"}</arguments>"#;
        let provider = Arc::new(SequentialMockProvider::texts(&[a, a, b, a, "ok"]));
        let outcome = agent(provider, seeded_registry().await)
            .with_max_steps(6)
            .run(seed("mix"))
            .await
            .unwrap();
        assert_eq!(outcome.tool_calls, 4);
    }

    #[tokio::test]
    async fn fourth_distinct_query_ends_the_exchange() {
        let provider = Arc::new(SequentialMockProvider::texts(&[
            r#"CALL: search_memory("first")"#,
            r#"CALL: search_memory("second")"#,
            r#"CALL: search_memory("third")"#,
            r#"CALL: search_memory("fourth")"#,
            "unreachable",
        ]));
        let outcome = agent(provider.clone(), seeded_registry().await)
            .with_max_steps(10)
            .run(seed("what is my cat called?"))
            .await
            .unwrap();

        assert_eq!(outcome.reply, QUERY_CAP_REPLY);
        assert_eq!(outcome.termination, Termination::QueryCapReached);
        assert_eq!(outcome.tool_calls, 3);
        assert_eq!(provider.call_count(), 4);
    }

    #[tokio::test]
    async fn repeated_query_does_not_count_twice() {
        let provider = Arc::new(SequentialMockProvider::texts(&[
            r#"<function_call>memory_search</function_call><arguments>{"query": "dog"}</arguments>"#,
            r#"CALL: search_memory("dog")"#,
            r#"CALL: search_memory("cat")"#,
            r#"CALL: search_memory("pet")"#,
            "Your dog is Biscuit.",
        ]));
        let outcome = agent(provider, seeded_registry().await)
            .with_max_steps(10)
            .run(seed("pets?"))
            .await
            .unwrap();
        assert_eq!(outcome.termination, Termination::Answered);
        assert_eq!(outcome.tool_calls, 4);
    }

    #[tokio::test]
    async fn tool_failures_are_fed_back() {
        let provider = Arc::new(SequentialMockProvider::texts(&[
            "<function_call>nonexistent_tool</function_call><arguments>{}</arguments>",
            r#"<function_call>memory_search</function_call><arguments>{"query": </arguments>"#,
            r#"<function_call>memory_get</function_call><arguments>{"id": "x"}</arguments>"#,
            "sorry",
        ]));
        let outcome = agent(provider, seeded_registry().await)
            .run(seed("break things"))
            .await
            .unwrap();

        assert_eq!(outcome.reply, "sorry");
        let functions: Vec<&str> = outcome.function_turns().map(|m| m.content.as_str()).collect();
        assert_eq!(functions[0], "[Unknown tool: nonexistent_tool]");
        assert!(functions[1].starts_with("[Tool error: malformed arguments:"));
        assert!(functions[2].starts_with("[Tool error:"));
        assert_eq!(outcome.tool_calls, 2);
    }

    #[tokio::test]
    async fn positional_call_binds_argument() {
        let provider = Arc::new(SequentialMockProvider::texts(&[
            r#"CALL: echo("hello there")"#,
            "ok",
        ]));
        let outcome = agent(provider, seeded_registry().await)
            .run(seed("echo please"))
            .await
            .unwrap();
        let first = outcome.function_turns().next().unwrap();
        assert_eq!(first.content, "Echo: hello there");
    }

    #[tokio::test]
    async fn oracle_failure_propagates() {
        let tools = Arc::new(seeded_registry().await);
        let result = AgentLoop::new(Arc::new(FailingProvider), "m", tools)
            .run(seed("hi"))
            .await;
        assert!(matches!(result, Err(Error::Provider(_))));
    }

    #[tokio::test]
    async fn exchange_finished_event_carries_termination() {
        let bus = Arc::new(EventBus::default());
        let mut events = bus.subscribe();
        let provider = Arc::new(SequentialMockProvider::texts(&["fine"]));
        agent(provider, ToolRegistry::new())
            .with_event_bus(bus)
            .run(seed("hi"))
            .await
            .unwrap();

        let event = events.try_recv().unwrap();
        match event.as_ref() {
            DomainEvent::ExchangeFinished {
                steps, termination, ..
            } => {
                assert_eq!(*steps, 1);
                assert_eq!(termination, "answered");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn tighter_bounds_come_from_the_builder() {
        let same = r#"<function_call>echo</function_call><arguments>{"message": "hi"}</arguments>"#;
        let provider = Arc::new(SequentialMockProvider::texts(&[
            same,
            same,
            r#"CALL: search_memory("car")"#,
            r#"CALL: search_memory("truck")"#,
        ]));

        let outcome = agent(provider.clone(), seeded_registry().await)
            .with_max_consecutive_repeats(1)
            .with_max_distinct_queries(1)
            .run(seed("tight"))
            .await
            .unwrap();

        assert_eq!(outcome.termination, Termination::QueryCapReached);
        assert_eq!(provider.call_count(), 4);
        // echo once, its repeat suppressed, one search
        assert_eq!(outcome.tool_calls, 2);
        assert!(
            outcome
                .function_turns()
                .any(|m| m.content.starts_with("[Call already satisfied: echo"))
        );
    }
}
