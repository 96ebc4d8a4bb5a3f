//! Shared test helpers for agent tests.

use memir_core::error::ProviderError;
use memir_core::memory::MemoryMetadata;
use memir_core::message::Message;
use memir_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use memir_core::tool::ToolRegistry;
use memir_memory::{HashingEmbedder, InMemoryIndex, MemoryStore};
use memir_tools::echo::EchoTool;
use memir_tools::legacy_memory::SearchMemoryTool;
use memir_tools::memory_get::MemoryGetTool;
use memir_tools::memory_search::MemorySearchTool;
use std::sync::{Arc, Mutex};

/// A mock provider that returns a sequence of scripted replies.
///
/// Each call to `complete` returns the next reply in the queue.
/// Panics if more calls are made than replies provided.
pub struct SequentialMockProvider {
    replies: Vec<String>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(replies: Vec<String>) -> Self {
        Self {
            replies,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn texts(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| r.to_string()).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let index = requests.len();
        let Some(reply) = self.replies.get(index) else {
            panic!(
                "SequentialMockProvider: no more responses (call #{index}, have {})",
                self.replies.len()
            );
        };
        requests.push(request);
        Ok(make_text_response(reply))
    }
}

/// A provider whose every call fails.
pub struct FailingProvider;

#[async_trait::async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::Network("connection refused".into()))
    }
}

pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

pub fn store() -> MemoryStore {
    MemoryStore::new(
        Arc::new(HashingEmbedder::default()),
        Arc::new(InMemoryIndex::new()),
    )
}

pub async fn seeded_store() -> MemoryStore {
    let store = store();
    for doc in [
        "The user's favorite color is purple.",
        "The user's dog is named Biscuit.",
    ] {
        store.add(doc, MemoryMetadata::new("note")).await.unwrap();
    }
    store
}

/// Memory tools over a small seeded store, plus echo.
pub async fn seeded_registry() -> ToolRegistry {
    let store = seeded_store().await;
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(MemorySearchTool::new(store.clone())));
    registry.register(Box::new(MemoryGetTool::new(store.clone())));
    registry.register(Box::new(SearchMemoryTool::new(store)));
    registry.register(Box::new(EchoTool));
    registry
}
