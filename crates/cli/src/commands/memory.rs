//! `memir memory`: Memory management commands.

use super::{CommandResult, load_config, open_store, preview};
use memir_core::memory::{MemoryMetadata, MemoryRecord, MetadataFilter, Scalar};
use memir_memory::MemoryStore;
use std::path::Path;

pub struct MemoryCli {
    store: MemoryStore,
}

impl MemoryCli {
    pub async fn open(config_path: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let config = load_config(config_path)?;
        Ok(Self {
            store: open_store(&config).await?,
        })
    }

    pub async fn add(
        &self,
        document: &str,
        kind: &str,
        title: Option<String>,
        tags: Vec<String>,
    ) -> CommandResult {
        let mut metadata = MemoryMetadata::new(kind);
        if let Some(title) = title {
            metadata = metadata.with_title(title);
        }
        if !tags.is_empty() {
            metadata = metadata.with_tags(tags);
        }

        let record = self.store.add(document, metadata).await?;
        println!("Memory saved: {}", record.id);
        Ok(())
    }

    pub async fn search(&self, query: &str, n_results: usize, kind: Option<&str>) -> CommandResult {
        let filter = kind.map(|k| {
            let mut filter = MetadataFilter::new();
            filter.insert("type".into(), Scalar::from(k));
            filter
        });

        let records = self.store.search(query, n_results, filter.as_ref()).await?;
        if records.is_empty() {
            println!("No memories found matching '{query}'.");
            return Ok(());
        }
        for (i, record) in records.iter().enumerate() {
            println!(
                "{:>2}. [{:.3}] {}",
                i + 1,
                record.distance.unwrap_or_default(),
                summary_line(record)
            );
        }
        Ok(())
    }

    pub async fn get(&self, id: &str) -> CommandResult {
        let record = self.store.get(id).await?;
        println!("{}", serde_json::to_string_pretty(&record)?);
        Ok(())
    }

    pub async fn list(&self) -> CommandResult {
        let records = self.store.list().await?;
        println!("{} memories", records.len());
        for record in &records {
            println!("  {}", summary_line(record));
        }
        Ok(())
    }

    pub async fn remove(&self, id: &str) -> CommandResult {
        if self.store.remove(id).await? {
            println!("Memory removed: {id}");
            Ok(())
        } else {
            Err(format!("No memory with id {id}").into())
        }
    }
}

fn summary_line(record: &MemoryRecord) -> String {
    format!(
        "{} ({}) {}",
        record.id,
        record.metadata.kind,
        preview(&record.document, 80)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use memir_memory::{HashingEmbedder, InMemoryIndex};
    use std::sync::Arc;

    fn cli() -> MemoryCli {
        MemoryCli {
            store: MemoryStore::new(
                Arc::new(HashingEmbedder::default()),
                Arc::new(InMemoryIndex::new()),
            ),
        }
    }

    #[tokio::test]
    async fn add_applies_type_title_and_tags() {
        let memory = cli();
        memory
            .add(
                "buy milk",
                "task",
                Some("Errand".into()),
                vec!["home".into()],
            )
            .await
            .unwrap();

        let record = memory.store.list().await.unwrap().remove(0);
        assert_eq!(record.metadata.kind, "task");
        assert_eq!(record.metadata.title.as_deref(), Some("Errand"));
        assert_eq!(record.metadata.tags, Some(vec!["home".to_string()]));
    }

    #[tokio::test]
    async fn remove_missing_is_an_error() {
        let memory = cli();
        assert!(memory.remove("nope").await.is_err());
    }

    #[tokio::test]
    async fn zero_results_is_rejected() {
        let memory = cli();
        assert!(memory.search("anything", 0, None).await.is_err());
    }

    #[test]
    fn summary_shows_id_type_and_first_line() {
        let record = MemoryRecord {
            id: "abc".into(),
            document: "line one\nline two".into(),
            metadata: MemoryMetadata::new("note"),
            distance: None,
        };
        assert_eq!(summary_line(&record), "abc (note) line one");
    }
}
