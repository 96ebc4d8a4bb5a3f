//! The memory store: embed, index, search, and reconstruct memories.
//!
//! The store owns an [`Embedder`] and a [`VectorIndex`] and is cheap to clone;
//! every clone shares the same index. Embedder and index failures are not
//! retried here. They surface as [`MemoryError::StorageBackend`] tagged with
//! the operation that failed.

use crate::codec;
use chrono::{SecondsFormat, Utc};
use memir_core::error::MemoryError;
use memir_core::event::{DomainEvent, EventBus};
use memir_core::memory::{
    Embedder, IndexEntry, MemoryMetadata, MemoryRecord, MetadataFilter, VectorIndex,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct MemoryStore {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    events: Option<Arc<EventBus>>,
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl MemoryStore {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            events: None,
        }
    }

    /// Publish `MemoryAccessed` events on `bus`.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn embedder_name(&self) -> &str {
        self.embedder.name()
    }

    pub fn index_name(&self) -> &str {
        self.index.name()
    }

    fn publish(&self, operation: &str, count: usize) {
        if let Some(bus) = &self.events {
            bus.publish(DomainEvent::MemoryAccessed {
                operation: operation.to_string(),
                count,
                timestamp: Utc::now(),
            });
        }
    }

    /// Store a new memory under a fresh id.
    ///
    /// `created_at` is kept if the caller supplied one; `modified_at` is always
    /// set to now. The returned record carries the restored metadata.
    pub async fn add(
        &self,
        document: &str,
        mut metadata: MemoryMetadata,
    ) -> Result<MemoryRecord, MemoryError> {
        let id = Uuid::new_v4().to_string();
        let now = now_timestamp();
        if metadata.created_at.is_none() {
            metadata.created_at = Some(now.clone());
        }
        metadata.modified_at = Some(now);

        let embedding = self
            .embedder
            .embed(document)
            .await
            .map_err(|e| MemoryError::backend("add", e))?;

        let flat = codec::encode(&metadata)?;
        self.index
            .upsert(IndexEntry {
                id: id.clone(),
                document: document.to_string(),
                embedding,
                metadata: flat.clone(),
            })
            .await
            .map_err(|e| MemoryError::backend("add", e))?;

        let metadata = codec::decode(&flat)?;
        info!(id = %id, kind = %metadata.kind, "Memory added");
        self.publish("add", 1);

        Ok(MemoryRecord {
            id,
            document: document.to_string(),
            metadata,
            distance: None,
        })
    }

    /// The `n_results` memories nearest to `query`, closest first.
    ///
    /// Returns fewer when fewer match; never pads.
    pub async fn search(
        &self,
        query: &str,
        n_results: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        if n_results == 0 {
            return Err(MemoryError::InvalidRequest(
                "n_results must be a positive integer".into(),
            ));
        }

        let embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| MemoryError::backend("search", e))?;

        let hits = self
            .index
            .query(&embedding, n_results, filter)
            .await
            .map_err(|e| MemoryError::backend("search", e))?;

        let records: Vec<MemoryRecord> = hits
            .into_iter()
            .filter_map(|hit| match codec::decode(&hit.metadata) {
                Ok(metadata) => Some(MemoryRecord {
                    id: hit.id,
                    document: hit.document,
                    metadata,
                    distance: Some(hit.distance),
                }),
                Err(e) => {
                    warn!(id = %hit.id, error = %e, "Skipping unreadable memory");
                    None
                }
            })
            .collect();

        debug!(query, n_results, found = records.len(), "Memory search");
        self.publish("search", records.len());
        Ok(records)
    }

    /// Exact lookup by id.
    pub async fn get(&self, id: &str) -> Result<MemoryRecord, MemoryError> {
        let entry = self
            .index
            .get(&[id.to_string()])
            .await
            .map_err(|e| MemoryError::backend("get", e))?
            .into_iter()
            .next()
            .ok_or_else(|| MemoryError::NotFound { id: id.to_string() })?;

        self.publish("get", 1);
        Ok(MemoryRecord {
            metadata: codec::decode(&entry.metadata)?,
            id: entry.id,
            document: entry.document,
            distance: None,
        })
    }

    /// Every memory, in insertion order.
    pub async fn list(&self) -> Result<Vec<MemoryRecord>, MemoryError> {
        let entries = self
            .index
            .list()
            .await
            .map_err(|e| MemoryError::backend("list", e))?;

        let records: Vec<MemoryRecord> = entries
            .into_iter()
            .filter_map(|entry| match codec::decode(&entry.metadata) {
                Ok(metadata) => Some(MemoryRecord {
                    id: entry.id,
                    document: entry.document,
                    metadata,
                    distance: None,
                }),
                Err(e) => {
                    warn!(id = %entry.id, error = %e, "Skipping unreadable memory");
                    None
                }
            })
            .collect();

        self.publish("list", records.len());
        Ok(records)
    }

    /// Delete a memory. Returns whether it existed; a missing id is not an error.
    pub async fn remove(&self, id: &str) -> Result<bool, MemoryError> {
        let deleted = self
            .index
            .delete(&[id.to_string()])
            .await
            .map_err(|e| MemoryError::backend("remove", e))?;

        if deleted > 0 {
            info!(id, "Memory removed");
        } else {
            debug!(id, "Remove requested for unknown memory");
        }
        self.publish("remove", deleted);
        Ok(deleted > 0)
    }

    pub async fn count(&self) -> Result<usize, MemoryError> {
        self.index
            .count()
            .await
            .map_err(|e| MemoryError::backend("count", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::in_memory::InMemoryIndex;
    use async_trait::async_trait;
    use memir_core::memory::{IndexHit, Scalar};
    use std::collections::HashSet;

    fn test_store() -> MemoryStore {
        MemoryStore::new(
            Arc::new(HashingEmbedder::default()),
            Arc::new(InMemoryIndex::new()),
        )
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl Embedder for BrokenEmbedder {
        fn name(&self) -> &str {
            "broken"
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, MemoryError> {
            Err(MemoryError::Embedding("model unavailable".into()))
        }
    }

    struct BrokenIndex;

    #[async_trait]
    impl VectorIndex for BrokenIndex {
        fn name(&self) -> &str {
            "broken"
        }
        async fn upsert(&self, _entry: IndexEntry) -> Result<(), MemoryError> {
            Err(MemoryError::Index("disk full".into()))
        }
        async fn query(
            &self,
            _embedding: &[f32],
            _k: usize,
            _filter: Option<&MetadataFilter>,
        ) -> Result<Vec<IndexHit>, MemoryError> {
            Err(MemoryError::Index("disk full".into()))
        }
        async fn get(&self, _ids: &[String]) -> Result<Vec<IndexEntry>, MemoryError> {
            Err(MemoryError::Index("disk full".into()))
        }
        async fn list(&self) -> Result<Vec<IndexEntry>, MemoryError> {
            Err(MemoryError::Index("disk full".into()))
        }
        async fn delete(&self, _ids: &[String]) -> Result<usize, MemoryError> {
            Err(MemoryError::Index("disk full".into()))
        }
        async fn count(&self) -> Result<usize, MemoryError> {
            Err(MemoryError::Index("disk full".into()))
        }
    }

    #[tokio::test]
    async fn add_stamps_timestamps_and_restores_metadata() {
        let store = test_store();
        let record = store
            .add(
                "Buy oat milk",
                MemoryMetadata::new("task").with_tags(["shopping", "groceries"]),
            )
            .await
            .unwrap();

        assert!(!record.id.is_empty());
        assert_eq!(record.metadata.kind, "task");
        assert_eq!(record.metadata.format, "markdown");
        assert_eq!(
            record.metadata.tags,
            Some(vec!["shopping".to_string(), "groceries".to_string()])
        );
        assert!(record.metadata.created_at.is_some());
        assert_eq!(record.metadata.created_at, record.metadata.modified_at);
    }

    #[tokio::test]
    async fn add_keeps_caller_created_at_but_refreshes_modified_at() {
        let store = test_store();
        let mut metadata = MemoryMetadata::new("note");
        metadata.created_at = Some("2024-01-01T00:00:00".into());
        metadata.modified_at = Some("2024-01-01T00:00:00".into());

        let record = store.add("old note", metadata).await.unwrap();
        assert_eq!(record.metadata.created_at.as_deref(), Some("2024-01-01T00:00:00"));
        assert_ne!(record.metadata.modified_at.as_deref(), Some("2024-01-01T00:00:00"));
    }

    #[tokio::test]
    async fn favorite_color_is_top_hit() {
        let store = test_store();
        store
            .add("I walked the dog this morning.", MemoryMetadata::new("note"))
            .await
            .unwrap();
        let purple = store
            .add("The user's favorite color is purple.", MemoryMetadata::new("note"))
            .await
            .unwrap();
        store
            .add("Dentist appointment on Friday.", MemoryMetadata::new("task"))
            .await
            .unwrap();

        let results = store.search("favorite color", 5, None).await.unwrap();
        assert_eq!(results[0].id, purple.id);
        assert_eq!(results.len(), 3);
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[tokio::test]
    async fn search_never_pads_and_rejects_zero() {
        let store = test_store();
        store.add("only one", MemoryMetadata::new("note")).await.unwrap();

        assert_eq!(store.search("one", 10, None).await.unwrap().len(), 1);
        assert!(matches!(
            store.search("one", 0, None).await,
            Err(MemoryError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn search_applies_metadata_filter() {
        let store = test_store();
        store.add("User: hi\nBot: hello", MemoryMetadata::new("conversation")).await.unwrap();
        store.add("hi there note", MemoryMetadata::new("note")).await.unwrap();

        let mut filter = MetadataFilter::new();
        filter.insert("type".into(), Scalar::from("conversation"));
        let results = store.search("hi", 5, Some(&filter)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].metadata.kind, "conversation");
    }

    #[tokio::test]
    async fn get_list_and_remove() {
        let store = test_store();
        let a = store.add("first", MemoryMetadata::new("note")).await.unwrap();
        let b = store.add("second", MemoryMetadata::new("note")).await.unwrap();

        assert_eq!(store.get(&a.id).await.unwrap().document, "first");

        let listed: Vec<String> = store.list().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(listed, vec![a.id.clone(), b.id.clone()]);

        assert!(store.remove(&a.id).await.unwrap());
        assert!(!store.remove(&a.id).await.unwrap());
        assert!(matches!(
            store.get(&a.id).await,
            Err(MemoryError::NotFound { .. })
        ));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn embedder_failure_is_storage_backend_error() {
        let store = MemoryStore::new(Arc::new(BrokenEmbedder), Arc::new(InMemoryIndex::new()));

        match store.add("x", MemoryMetadata::new("note")).await {
            Err(MemoryError::StorageBackend { operation, cause }) => {
                assert_eq!(operation, "add");
                assert!(cause.contains("model unavailable"));
            }
            other => panic!("expected StorageBackend, got {other:?}"),
        }
        match store.search("x", 1, None).await {
            Err(MemoryError::StorageBackend { operation, .. }) => assert_eq!(operation, "search"),
            other => panic!("expected StorageBackend, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn index_failure_is_storage_backend_error() {
        let store = MemoryStore::new(Arc::new(HashingEmbedder::default()), Arc::new(BrokenIndex));

        match store.add("x", MemoryMetadata::new("note")).await {
            Err(MemoryError::StorageBackend { operation, cause }) => {
                assert_eq!(operation, "add");
                assert!(cause.contains("disk full"));
            }
            other => panic!("expected StorageBackend, got {other:?}"),
        }
        assert!(matches!(
            store.remove("x").await,
            Err(MemoryError::StorageBackend { .. })
        ));
    }

    #[tokio::test]
    async fn concurrent_adds_do_not_collide() {
        let store = test_store();
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .add(&format!("memory number {i}"), MemoryMetadata::new("note"))
                    .await
                    .unwrap()
                    .id
            }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }
        assert_eq!(ids.len(), 32);
        assert_eq!(store.count().await.unwrap(), 32);
    }

    #[tokio::test]
    async fn publishes_memory_events() {
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();
        let store = test_store().with_event_bus(bus);

        store.add("x", MemoryMetadata::new("note")).await.unwrap();
        match rx.recv().await.unwrap().as_ref() {
            DomainEvent::MemoryAccessed { operation, count, .. } => {
                assert_eq!(operation, "add");
                assert_eq!(*count, 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
