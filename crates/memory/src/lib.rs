//! Memory system for M.E.M.I.R.: the record codec, embedders, vector
//! indexes, and the [`MemoryStore`] that ties them together.

pub mod codec;
pub mod embedding;
pub mod in_memory;
pub mod store;
pub mod vector;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use codec::{restore, sanitize};
pub use embedding::{HashingEmbedder, LazyEmbedder, ProviderEmbedder};
pub use in_memory::InMemoryIndex;
pub use store::MemoryStore;
pub use vector::{cosine_distance, cosine_similarity};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteIndex;
