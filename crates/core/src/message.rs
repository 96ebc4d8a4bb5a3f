//! Message and conversation-history domain types.
//!
//! Two views of a conversation flow through the system:
//! - [`ConversationTurn`]: the caller-owned history (user, bot, memory, function turns)
//! - [`Message`]: what the language-model oracle sees (system, user, assistant, function)

use serde::{Deserialize, Serialize};

/// The role of a message sent to the language-model oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (persona, tool manifest)
    System,
    /// The end user
    User,
    /// The assistant
    Assistant,
    /// A tool result fed back into the loop
    Function,
}

/// A single message in an oracle conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,

    pub content: String,

    /// For `function` messages, the tool that produced the content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a function-role message carrying a tool's output.
    pub fn function(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Function,
            content: content.into(),
            name: Some(name.into()),
        }
    }
}

/// Who produced a turn in the caller-owned history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Bot,
    Assistant,
    /// A recalled memory injected ahead of the live history
    Memory,
    Function,
}

/// One (role, content) pair of conversation history.
///
/// Serialized as a two-element array `["user", "hi"]`; the object form
/// `{"role": "user", "content": "hi"}` is accepted on input too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TurnRepr", into = "(TurnRole, String)")]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ConversationTurn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content)
    }

    pub fn bot(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Bot, content)
    }

    pub fn memory(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Memory, content)
    }

    /// Map this turn onto an oracle message. Only user turns stay `user`;
    /// everything else is presented to the model as assistant content.
    pub fn to_message(&self) -> Message {
        match self.role {
            TurnRole::User => Message::user(self.content.clone()),
            _ => Message::assistant(self.content.clone()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TurnRepr {
    Pair(TurnRole, String),
    Object { role: TurnRole, content: String },
}

impl From<TurnRepr> for ConversationTurn {
    fn from(repr: TurnRepr) -> Self {
        match repr {
            TurnRepr::Pair(role, content) | TurnRepr::Object { role, content } => {
                Self { role, content }
            }
        }
    }
}

impl From<ConversationTurn> for (TurnRole, String) {
    fn from(turn: ConversationTurn) -> Self {
        (turn.role, turn.content)
    }
}
