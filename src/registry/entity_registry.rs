//! Find-or-create resolution of ledger entities
//!
//! One logical definition should map to one canonical identifier. Within a
//! process this is enforced by coalescing concurrent resolutions of the same
//! definition and memoizing the result. Across processes it is not: two
//! processes that miss the lookup at the same moment both create.
//!
//! Matching is exact on all four attributes. `"Entry"` and `"Entry "` are
//! different entities.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::RequestCoalescer;
use crate::error::Result;
use crate::traits::{LedgerReader, LedgerWriter};
use crate::types::{EntityDefinition, EntityId};

/// Resolves entity definitions to canonical identifiers
pub struct EntityRegistry {
    reader: Arc<dyn LedgerReader>,
    writer: Arc<dyn LedgerWriter>,
    resolved: DashMap<EntityDefinition, EntityId>,
    in_flight: RequestCoalescer<EntityDefinition, EntityId>,
}

impl EntityRegistry {
    pub fn new(reader: Arc<dyn LedgerReader>, writer: Arc<dyn LedgerWriter>) -> Self {
        Self {
            reader,
            writer,
            resolved: DashMap::new(),
            in_flight: RequestCoalescer::new(),
        }
    }

    /// Identifier for `definition`, creating the entity if the ledger has none.
    pub async fn resolve(&self, definition: &EntityDefinition) -> Result<EntityId> {
        if let Some(id) = self.cached(definition) {
            debug!(name = %definition.name, %id, "Entity already resolved");
            return Ok(id);
        }

        self.in_flight
            .run(definition.clone(), move || async move {
                if let Some(id) = self.cached(definition) {
                    return Ok(id);
                }

                let id = match self.reader.find_entity(definition).await? {
                    Some(id) => {
                        debug!(name = %definition.name, %id, "Found existing entity");
                        id
                    }
                    None => self.write(definition).await?,
                };

                self.resolved.insert(definition.clone(), id);
                Ok(id)
            })
            .await
    }

    /// Create an entity without looking for an existing one.
    ///
    /// For content that cannot exist yet. The new identifier is remembered,
    /// so a later `resolve` of the same definition will not create again.
    pub async fn create(&self, definition: &EntityDefinition) -> Result<EntityId> {
        let id = self.write(definition).await?;
        self.resolved.insert(definition.clone(), id);
        Ok(id)
    }

    /// Identifier already resolved in this process, if any
    pub fn cached(&self, definition: &EntityDefinition) -> Option<EntityId> {
        self.resolved.get(definition).map(|id| *id)
    }

    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }

    pub fn writer(&self) -> &Arc<dyn LedgerWriter> {
        &self.writer
    }

    async fn write(&self, definition: &EntityDefinition) -> Result<EntityId> {
        let id = self.writer.create_entity(definition).await?;
        info!(name = %definition.name, %id, "Created entity");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MarketError;
    use crate::mock::MockLedger;

    fn registry(ledger: &Arc<MockLedger>) -> EntityRegistry {
        EntityRegistry::new(ledger.clone(), ledger.clone())
    }

    #[tokio::test]
    async fn test_existing_entity_is_reused() {
        let ledger = Arc::new(MockLedger::new());
        let definition = EntityDefinition::new("Is Type", "Predicate for marking content type");
        ledger.preload(definition.clone(), EntityId(42));

        let id = registry(&ledger).resolve(&definition).await.unwrap();
        assert_eq!(id, EntityId(42));
        assert_eq!(ledger.entity_writes(), 0);
    }

    #[tokio::test]
    async fn test_missing_entity_is_created_once() {
        let ledger = Arc::new(MockLedger::new());
        let registry = registry(&ledger);
        let definition = EntityDefinition::new("Entry", "An entry");

        let first = registry.resolve(&definition).await.unwrap();
        let second = registry.resolve(&definition).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(ledger.entity_writes(), 1);
        assert_eq!(ledger.entity_lookups(), 1);
        assert_eq!(registry.resolved_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_resolution_creates_once() {
        let ledger = Arc::new(MockLedger::new().with_delay(std::time::Duration::from_millis(10)));
        let registry = registry(&ledger);
        let definition = EntityDefinition::new("Sub-Entry", "A sub-entry");

        let (a, b, c) = tokio::join!(
            registry.resolve(&definition),
            registry.resolve(&definition),
            registry.resolve(&definition),
        );

        let a = a.unwrap();
        assert_eq!(b.unwrap(), a);
        assert_eq!(c.unwrap(), a);
        assert_eq!(ledger.entity_writes(), 1);
    }

    #[tokio::test]
    async fn test_no_normalization() {
        let ledger = Arc::new(MockLedger::new());
        let registry = registry(&ledger);

        let a = registry.resolve(&EntityDefinition::new("Entry", "x")).await.unwrap();
        let b = registry.resolve(&EntityDefinition::new("entry", "x")).await.unwrap();

        assert_ne!(a, b);
        assert_eq!(ledger.entity_writes(), 2);
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates_without_write() {
        let ledger = Arc::new(MockLedger::new().with_available(false));
        let result = registry(&ledger).resolve(&EntityDefinition::new("A", "B")).await;

        assert!(matches!(result, Err(MarketError::RemoteUnavailable(_))));
        assert_eq!(ledger.entity_writes(), 0);
    }

    #[tokio::test]
    async fn test_create_is_remembered() {
        let ledger = Arc::new(MockLedger::new());
        let registry = registry(&ledger);
        let definition = EntityDefinition::new("Question", "What is it?");

        let created = registry.create(&definition).await.unwrap();
        assert_eq!(registry.cached(&definition), Some(created));
        assert_eq!(registry.resolve(&definition).await.unwrap(), created);
        assert_eq!(ledger.entity_lookups(), 0);
    }
}
