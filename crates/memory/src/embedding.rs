//! Embedders: the text-to-vector oracles behind the memory store.
//!
//! - [`HashingEmbedder`]: deterministic feature hashing, no model download
//! - [`ProviderEmbedder`]: delegates to a provider's `/embeddings` endpoint
//! - [`LazyEmbedder`]: builds its inner embedder once, on first use

use async_trait::async_trait;
use memir_core::error::MemoryError;
use memir_core::memory::Embedder;
use memir_core::provider::{EmbeddingRequest, Provider};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

pub const DEFAULT_DIMENSIONS: usize = 384;

/// Bag-of-words embedder using signed feature hashing.
///
/// Text is lowercased and split on anything that is not alphanumeric; each
/// token adds ±1 to one bucket chosen by its FNV-1a hash. The result is
/// L2-normalized, so texts sharing words land close under cosine distance.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embed synchronously; hashing needs no I/O.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ *b as u64).wrapping_mul(PRIME))
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        Ok(self.embed_text(text))
    }
}

/// Embeds through an LLM provider's embeddings API.
pub struct ProviderEmbedder {
    provider: Arc<dyn Provider>,
    model: String,
    name: String,
}

impl ProviderEmbedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        let model = model.into();
        let name = format!("{}:{}", provider.name(), model);
        Self {
            provider,
            model,
            name,
        }
    }
}

#[async_trait]
impl Embedder for ProviderEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.model.clone(),
                inputs: vec![text.to_string()],
            })
            .await
            .map_err(|e| MemoryError::Embedding(e.to_string()))?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| MemoryError::Embedding("provider returned no embeddings".into()))
    }
}

type EmbedderInit = Box<dyn Fn() -> Result<Arc<dyn Embedder>, MemoryError> + Send + Sync>;

/// Constructs the wrapped embedder on first use and keeps it for the
/// lifetime of the process. Concurrent first calls build it once.
pub struct LazyEmbedder {
    cell: OnceCell<Arc<dyn Embedder>>,
    init: EmbedderInit,
}

impl LazyEmbedder {
    pub fn new<F>(init: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Embedder>, MemoryError> + Send + Sync + 'static,
    {
        Self {
            cell: OnceCell::new(),
            init: Box::new(init),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    async fn inner(&self) -> Result<&Arc<dyn Embedder>, MemoryError> {
        self.cell
            .get_or_try_init(|| async {
                let embedder = (self.init)()?;
                info!(embedder = embedder.name(), "Embedding model loaded");
                Ok::<_, MemoryError>(embedder)
            })
            .await
    }
}

#[async_trait]
impl Embedder for LazyEmbedder {
    fn name(&self) -> &str {
        match self.cell.get() {
            Some(inner) => inner.name(),
            None => "lazy",
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        self.inner().await?.embed(text).await
    }
}
