//! The chat pipeline shared by `POST /chat` and the CLI.
//!
//! Each exchange recalls related past conversations, routes the message
//! through the skill router, then stores the exchange as a new
//! `conversation` memory. Recall and logging are best-effort.

use chrono::{SecondsFormat, Utc};
use memir_agent::SkillRouter;
use memir_core::memory::{MemoryMetadata, MemoryRecord, MetadataFilter, Scalar};
use memir_core::message::{ConversationTurn, TurnRole};
use memir_memory::MemoryStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const CONVERSATION_TYPE: &str = "conversation";

/// Channel tag used when none is set.
pub const DEFAULT_CHANNEL: &str = "api";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    pub history: Vec<ConversationTurn>,
}

pub struct ChatService {
    router: SkillRouter,
    store: MemoryStore,
    recall_limit: usize,
    channel: String,
}

impl ChatService {
    pub fn new(router: SkillRouter, store: MemoryStore, recall_limit: usize) -> Self {
        Self {
            router,
            store,
            recall_limit,
            channel: DEFAULT_CHANNEL.to_string(),
        }
    }

    /// Tag logged exchanges with `channel` (e.g. `cli`).
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Run one exchange. Only a skill failure fails the call.
    pub async fn chat(
        &self,
        message: &str,
        history: &[ConversationTurn],
    ) -> Result<ChatReply, memir_core::Error> {
        let mut merged = self.recall(message).await;
        merged.extend_from_slice(history);

        let reply = self.router.route(message, &merged).await?;
        self.log_exchange(message, &reply.reply).await;

        // Recall runs again on the next exchange, so recalled turns stay out
        // of the history handed back to the caller.
        let history = reply
            .history
            .into_iter()
            .filter(|turn| turn.role != TurnRole::Memory)
            .collect();
        Ok(ChatReply {
            response: reply.reply,
            history,
        })
    }

    /// Past conversations near `message`, as `memory` turns.
    async fn recall(&self, message: &str) -> Vec<ConversationTurn> {
        if self.recall_limit == 0 {
            return Vec::new();
        }

        let mut filter = MetadataFilter::new();
        filter.insert("type".into(), Scalar::from(CONVERSATION_TYPE));

        match self
            .store
            .search(message, self.recall_limit, Some(&filter))
            .await
        {
            Ok(records) => {
                let turns: Vec<ConversationTurn> = records
                    .into_iter()
                    .filter(|record| !is_same_exchange(record, message))
                    .map(|record| ConversationTurn::memory(record.document))
                    .collect();
                debug!(recalled = turns.len(), "Conversation recall");
                turns
            }
            Err(e) => {
                warn!(error = %e, "Conversation recall failed");
                Vec::new()
            }
        }
    }

    async fn log_exchange(&self, message: &str, reply: &str) {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        let mut extra = serde_json::Map::new();
        extra.insert("user_message".into(), message.into());
        extra.insert("bot_reply".into(), reply.into());

        let metadata = MemoryMetadata::new(CONVERSATION_TYPE)
            .with_format("text")
            .with_title(format!("Chat with M.E.M.I.R. ({now})"))
            .with_tags(["conversation", "chat", self.channel.as_str()])
            .with_source(self.channel.as_str())
            .with_extra(extra);

        let document = format!("User: {message}\nBot: {reply}");
        if let Err(e) = self.store.add(&document, metadata).await {
            warn!(error = %e, "Failed to log conversation");
        }
    }
}

/// A logged exchange for the very message being asked adds nothing.
fn is_same_exchange(record: &MemoryRecord, message: &str) -> bool {
    record
        .metadata
        .extra
        .as_ref()
        .and_then(|extra| extra.get("user_message"))
        .and_then(|value| value.as_str())
        == Some(message)
}
