//! The agent core of MEMIR: tool-call parsing, the bounded agent loop, and
//! the skill router.
//!
//! A message flows through the [`SkillRouter`]. The LLM skill seeds a
//! conversation with the persona and tool manifest and hands it to the
//! [`AgentLoop`], which alternates between the model and the tool registry:
//!
//! 1. **Consult** the model with the full conversation
//! 2. **Parse** the reply for a tool call
//! 3. **If a call**: dispatch it, append the result as a function turn, go to 1
//! 4. **Otherwise**: the reply is the answer
//!
//! The loop stops early on its step budget or the distinct-query cap.

pub mod loop_runner;
pub mod parser;
pub mod prompt;
pub mod skills;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use loop_runner::{
    AgentLoop, AgentOutcome, BUDGET_EXCEEDED_REPLY, QUERY_CAP_REPLY, Termination,
};
pub use parser::{CallArguments, CallRequest, Parsed, parse};
pub use skills::{EchoSkill, LlmSkill, Skill, SkillReply, SkillRouter};
