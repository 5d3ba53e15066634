//! Ledger read/write seams

use crate::error::Result;
use crate::types::{EntityDefinition, EntityId, Triple};
use async_trait::async_trait;

/// Looks entities up by their defining attributes (an indexer, usually).
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// Find an entity whose four attributes equal `definition` exactly.
    ///
    /// `Ok(None)` means no such entity exists yet.
    async fn find_entity(&self, definition: &EntityDefinition) -> Result<Option<EntityId>>;
}

/// Creates entities and triples. Every call costs a transaction.
#[async_trait]
pub trait LedgerWriter: Send + Sync {
    /// Create an entity and return the identifier from the confirmation
    async fn create_entity(&self, definition: &EntityDefinition) -> Result<EntityId>;

    /// Assert a triple and return its identifier
    async fn create_triple(&self, triple: &Triple) -> Result<EntityId>;
}
