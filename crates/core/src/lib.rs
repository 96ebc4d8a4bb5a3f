//! # M.E.M.I.R. Core
//!
//! Domain types, traits, and error definitions for the M.E.M.I.R. assistant.
//! This crate has **no framework dependencies**: it defines the domain model
//! that the memory store, tools, agent loop, and gateway implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here:
//! - [`Provider`] is the language-model oracle
//! - [`Embedder`] turns text into a vector
//! - [`VectorIndex`] is the nearest-neighbor store
//! - [`Tool`] is a callable the agent loop may dispatch
//!
//! Implementations live in their respective crates, so tests can substitute
//! deterministic fakes for every one of them.

pub mod error;
pub mod event;
pub mod memory;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::Error;
pub use event::{DomainEvent, EventBus};
pub use memory::{
    Embedder, FlatMetadata, IndexEntry, IndexHit, MemoryMetadata, MemoryRecord, MetadataFilter,
    Scalar, VectorIndex,
};
pub use message::{ConversationTurn, Message, Role, TurnRole};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
pub use tool::{DispatchFailure, Tool, ToolInvocation, ToolRegistry, ToolResult};
