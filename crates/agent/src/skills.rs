//! Skills and the first-match skill router.
//!
//! A skill is a message-handling strategy. The router asks each registered
//! skill in order whether it can handle a message and hands the message to
//! the first that says yes. Register an always-true skill last.

use crate::loop_runner::AgentLoop;
use crate::prompt;
use async_trait::async_trait;
use memir_core::memory::{MemoryRecord, MetadataFilter, Scalar};
use memir_core::message::{ConversationTurn, Message};
use memir_memory::MemoryStore;
use memir_tools::echo_reply;
use tracing::{debug, info, warn};

pub const PERSONALITY_CORE_TYPE: &str = "personality_core";
pub const NO_SKILL_REPLY: &str = "I don't know how to respond to that.";

/// A reply plus the caller's history extended with this exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillReply {
    pub reply: String,
    pub history: Vec<ConversationTurn>,
}

impl SkillReply {
    /// `history` + (user, message) + (bot, reply).
    pub fn new(history: &[ConversationTurn], message: &str, reply: String) -> Self {
        let mut extended = history.to_vec();
        extended.push(ConversationTurn::user(message));
        extended.push(ConversationTurn::bot(reply.clone()));
        Self {
            reply,
            history: extended,
        }
    }
}

#[async_trait]
pub trait Skill: Send + Sync {
    fn name(&self) -> &str;

    fn can_handle(&self, message: &str, history: &[ConversationTurn]) -> bool;

    async fn handle(
        &self,
        message: &str,
        history: &[ConversationTurn],
    ) -> Result<SkillReply, memir_core::Error>;
}

/// Whether the user explicitly asked for an echo (`echo: ...`).
pub fn is_echo_request(message: &str) -> bool {
    message.trim().to_lowercase().starts_with("echo:")
}

/// Repeats the message back.
pub struct EchoSkill {
    prefixed_only: bool,
}

impl EchoSkill {
    /// Handles every message; use as the router's fallback.
    pub fn new() -> Self {
        Self {
            prefixed_only: false,
        }
    }

    /// Handles only `echo:` messages.
    pub fn prefixed() -> Self {
        Self {
            prefixed_only: true,
        }
    }
}

impl Default for EchoSkill {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Skill for EchoSkill {
    fn name(&self) -> &str {
        "echo"
    }

    fn can_handle(&self, message: &str, _history: &[ConversationTurn]) -> bool {
        !self.prefixed_only || is_echo_request(message)
    }

    async fn handle(
        &self,
        message: &str,
        history: &[ConversationTurn],
    ) -> Result<SkillReply, memir_core::Error> {
        Ok(SkillReply::new(history, message, echo_reply(message)))
    }
}

/// Answers through the agent loop, with the stored personality core as persona.
pub struct LlmSkill {
    agent: AgentLoop,
    store: Option<MemoryStore>,
}

impl LlmSkill {
    pub fn new(agent: AgentLoop) -> Self {
        Self { agent, store: None }
    }

    /// Read the persona from the memory store.
    pub fn with_store(mut self, store: MemoryStore) -> Self {
        self.store = Some(store);
        self
    }

    /// The most recently created personality core, if any.
    async fn persona(&self) -> Option<String> {
        let store = self.store.as_ref()?;
        let mut filter = MetadataFilter::new();
        filter.insert("type".into(), Scalar::from(PERSONALITY_CORE_TYPE));

        match store.search("personality core", 5, Some(&filter)).await {
            Ok(records) => latest(records).map(|r| r.document),
            Err(e) => {
                warn!(error = %e, "Personality core lookup failed, using default persona");
                None
            }
        }
    }
}

fn latest(records: Vec<MemoryRecord>) -> Option<MemoryRecord> {
    records
        .into_iter()
        .max_by(|a, b| a.metadata.created_at.cmp(&b.metadata.created_at))
}

#[async_trait]
impl Skill for LlmSkill {
    fn name(&self) -> &str {
        "llm"
    }

    fn can_handle(&self, message: &str, _history: &[ConversationTurn]) -> bool {
        !is_echo_request(message)
    }

    async fn handle(
        &self,
        message: &str,
        history: &[ConversationTurn],
    ) -> Result<SkillReply, memir_core::Error> {
        let persona = self.persona().await;
        let system = prompt::system_prompt(persona.as_deref(), self.agent.tools());

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(system));
        messages.extend(history.iter().map(ConversationTurn::to_message));
        messages.push(Message::user(message));

        let outcome = self.agent.run(messages).await?;
        debug!(
            termination = %outcome.termination,
            tool_calls = outcome.tool_calls,
            "LLM skill finished"
        );
        Ok(SkillReply::new(history, message, outcome.reply))
    }
}

/// Ordered, first-match skill dispatch.
#[derive(Default)]
pub struct SkillRouter {
    skills: Vec<Box<dyn Skill>>,
}

impl SkillRouter {
    pub fn new() -> Self {
        Self { skills: Vec::new() }
    }

    /// The standard order: the LLM skill, then the echo fallback.
    pub fn with_defaults(llm: LlmSkill) -> Self {
        let mut router = Self::new();
        router.register(Box::new(llm));
        router.register(Box::new(EchoSkill::new()));
        router
    }

    pub fn register(&mut self, skill: Box<dyn Skill>) {
        self.skills.push(skill);
    }

    pub fn skill_names(&self) -> Vec<&str> {
        self.skills.iter().map(|s| s.name()).collect()
    }

    /// Hand `message` to the first skill that accepts it.
    pub async fn route(
        &self,
        message: &str,
        history: &[ConversationTurn],
    ) -> Result<SkillReply, memir_core::Error> {
        for skill in &self.skills {
            if skill.can_handle(message, history) {
                info!(skill = skill.name(), "Routing message");
                return skill.handle(message, history).await;
            }
        }
        warn!("No skill accepted the message");
        Ok(SkillReply {
            reply: NO_SKILL_REPLY.to_string(),
            history: history.to_vec(),
        })
    }
}
