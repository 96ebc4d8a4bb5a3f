//! In-memory vector index: useful for testing and ephemeral sessions.

use crate::vector;
use async_trait::async_trait;
use memir_core::error::MemoryError;
use memir_core::memory::{IndexEntry, IndexHit, MetadataFilter, VectorIndex};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A vector index that keeps every entry in a Vec, in insertion order,
/// and answers queries by brute-force cosine ranking.
pub struct InMemoryIndex {
    entries: Arc<RwLock<Vec<IndexEntry>>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn upsert(&self, entry: IndexEntry) -> Result<(), MemoryError> {
        let mut entries = self.entries.write().await;
        match entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexHit>, MemoryError> {
        let entries = self.entries.read().await;
        Ok(vector::rank_nearest(entries.iter(), embedding, k, filter))
    }

    async fn get(&self, ids: &[String]) -> Result<Vec<IndexEntry>, MemoryError> {
        let entries = self.entries.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| entries.iter().find(|e| &e.id == id).cloned())
            .collect())
    }

    async fn list(&self) -> Result<Vec<IndexEntry>, MemoryError> {
        Ok(self.entries.read().await.clone())
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, MemoryError> {
        let mut entries = self.entries.write().await;
        let len_before = entries.len();
        entries.retain(|e| !ids.contains(&e.id));
        Ok(len_before - entries.len())
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.entries.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memir_core::memory::FlatMetadata;

    fn entry(id: &str, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry {
            id: id.into(),
            document: format!("doc {id}"),
            embedding,
            metadata: FlatMetadata::new(),
        }
    }

    #[tokio::test]
    async fn upsert_and_query() {
        let index = InMemoryIndex::new();
        index.upsert(entry("a", vec![1.0, 0.0])).await.unwrap();
        index.upsert(entry("b", vec![0.0, 1.0])).await.unwrap();

        let hits = index.query(&[0.1, 1.0], 1, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "b");
    }

    #[tokio::test]
    async fn upsert_replaces_same_id() {
        let index = InMemoryIndex::new();
        index.upsert(entry("a", vec![1.0, 0.0])).await.unwrap();
        let mut replacement = entry("a", vec![0.0, 1.0]);
        replacement.document = "updated".into();
        index.upsert(replacement).await.unwrap();

        assert_eq!(index.count().await.unwrap(), 1);
        let got = index.get(&["a".to_string()]).await.unwrap();
        assert_eq!(got[0].document, "updated");
    }

    #[tokio::test]
    async fn list_keeps_insertion_order() {
        let index = InMemoryIndex::new();
        for id in ["x", "y", "z"] {
            index.upsert(entry(id, vec![1.0])).await.unwrap();
        }
        let ids: Vec<String> = index
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["x", "y", "z"]);
    }

    #[tokio::test]
    async fn delete_reports_how_many_existed() {
        let index = InMemoryIndex::new();
        index.upsert(entry("a", vec![1.0])).await.unwrap();

        assert_eq!(index.delete(&["a".to_string()]).await.unwrap(), 1);
        assert_eq!(index.delete(&["a".to_string()]).await.unwrap(), 0);
        assert!(index.get(&["a".to_string()]).await.unwrap().is_empty());
    }
}
