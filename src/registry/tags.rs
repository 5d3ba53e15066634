//! Well-known classification entities and content tagging
//!
//! The app classifies its content with a handful of fixed entities:
//!
//! - `[content] "Is Used By" [this app]`
//! - `[entry] "Is Type" [Entry]`
//! - `[sub-entry] "Is Type" [Sub-Entry]` and `[sub-entry] "Is Sub-Entry Of" [entry]`
//!
//! Their identifiers are resolved once per reconciler and then served from
//! memory. Each accessor resolves all of its identifiers together, so it
//! is either fully cached or not cached at all.

use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::entity_registry::EntityRegistry;
use crate::cache::RequestCoalescer;
use crate::config::AppIdentity;
use crate::error::{MarketError, Result};
use crate::types::{EntityDefinition, EntityId, Triple};

/// Identifiers for `"Is Used By"` and the app entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppTagIds {
    pub predicate_id: EntityId,
    pub object_id: EntityId,
}

/// Identifiers for `"Is Type"` and the two type markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeTagIds {
    pub predicate_id: EntityId,
    pub entry_id: EntityId,
    pub sub_entry_id: EntityId,
}

/// Definitions of the well-known classification entities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDefinitions {
    pub app_predicate: EntityDefinition,
    pub app_object: EntityDefinition,
    pub type_predicate: EntityDefinition,
    pub entry_type: EntityDefinition,
    pub sub_entry_type: EntityDefinition,
    pub sub_entry_of_predicate: EntityDefinition,
}

impl TagDefinitions {
    pub fn for_app(app: &AppIdentity) -> Self {
        Self {
            app_predicate: EntityDefinition::new(
                "Is Used By",
                "Predicate for linking content to applications",
            ),
            app_object: app.to_definition(),
            type_predicate: EntityDefinition::new("Is Type", "Predicate for marking content type"),
            entry_type: EntityDefinition::new(
                "Entry",
                "An Entry in the Information Test Markets App",
            ),
            sub_entry_type: EntityDefinition::new(
                "Sub-Entry",
                "A Sub-Entry in the Information Test Markets App",
            ),
            sub_entry_of_predicate: EntityDefinition::new(
                "Is Sub-Entry Of",
                "Predicate for linking Sub-Entries to Entries",
            ),
        }
    }
}

/// Resolves the well-known tag entities and writes classification triples
pub struct TagReconciler {
    registry: Arc<EntityRegistry>,
    definitions: TagDefinitions,
    app_ids: OnceCell<AppTagIds>,
    type_ids: OnceCell<TypeTagIds>,
    sub_entry_of: OnceCell<EntityId>,
    /// Triples this reconciler has seen confirmed
    asserted: DashSet<Triple>,
    in_flight: RequestCoalescer<Triple, ()>,
}

impl TagReconciler {
    pub fn new(registry: Arc<EntityRegistry>, app: &AppIdentity) -> Self {
        Self::with_definitions(registry, TagDefinitions::for_app(app))
    }

    pub fn with_definitions(registry: Arc<EntityRegistry>, definitions: TagDefinitions) -> Self {
        Self {
            registry,
            definitions,
            app_ids: OnceCell::new(),
            type_ids: OnceCell::new(),
            sub_entry_of: OnceCell::new(),
            asserted: DashSet::new(),
            in_flight: RequestCoalescer::new(),
        }
    }

    pub fn definitions(&self) -> &TagDefinitions {
        &self.definitions
    }

    // =========================================================================
    // Memoized identifiers
    // =========================================================================

    pub async fn app_tag_ids(&self) -> Result<AppTagIds> {
        let ids = self
            .app_ids
            .get_or_try_init(move || async move {
                let predicate_id = self.registry.resolve(&self.definitions.app_predicate).await?;
                let object_id = self.registry.resolve(&self.definitions.app_object).await?;
                debug!(%predicate_id, %object_id, "App tag ids resolved");
                Ok::<_, MarketError>(AppTagIds {
                    predicate_id,
                    object_id,
                })
            })
            .await?;
        Ok(*ids)
    }

    pub async fn type_tag_ids(&self) -> Result<TypeTagIds> {
        let ids = self
            .type_ids
            .get_or_try_init(move || async move {
                let predicate_id = self.registry.resolve(&self.definitions.type_predicate).await?;
                let entry_id = self.registry.resolve(&self.definitions.entry_type).await?;
                let sub_entry_id = self.registry.resolve(&self.definitions.sub_entry_type).await?;
                debug!(%predicate_id, %entry_id, %sub_entry_id, "Type tag ids resolved");
                Ok::<_, MarketError>(TypeTagIds {
                    predicate_id,
                    entry_id,
                    sub_entry_id,
                })
            })
            .await?;
        Ok(*ids)
    }

    pub async fn sub_entry_of_predicate_id(&self) -> Result<EntityId> {
        let id = self
            .sub_entry_of
            .get_or_try_init(move || async move {
                self.registry
                    .resolve(&self.definitions.sub_entry_of_predicate)
                    .await
            })
            .await?;
        Ok(*id)
    }

    // =========================================================================
    // Tagging
    // =========================================================================

    /// `[entity] "Is Used By" [app]`
    pub async fn tag_as_app_content(&self, entity_id: EntityId) -> Result<()> {
        let ids = self.app_tag_ids().await?;
        self.assert_triple(Triple::new(entity_id, ids.predicate_id, ids.object_id))
            .await
    }

    /// `[entity] "Is Type" [Entry]`
    pub async fn tag_as_entry(&self, entity_id: EntityId) -> Result<()> {
        let ids = self.type_tag_ids().await?;
        self.assert_triple(Triple::new(entity_id, ids.predicate_id, ids.entry_id))
            .await
    }

    /// `[sub] "Is Type" [Sub-Entry]`, then `[sub] "Is Sub-Entry Of" [entry]`.
    ///
    /// Not atomic. If the link fails after the type triple landed, the error
    /// is [`MarketError::PartialTag`]; calling again writes only the link.
    pub async fn tag_as_sub_entry_of_entry(
        &self,
        sub_entry_id: EntityId,
        entry_id: EntityId,
    ) -> Result<()> {
        let ids = self.type_tag_ids().await?;
        let typed = Triple::new(sub_entry_id, ids.predicate_id, ids.sub_entry_id);
        self.assert_triple(typed).await?;

        let link = async {
            let predicate_id = self.sub_entry_of_predicate_id().await?;
            self.assert_triple(Triple::new(sub_entry_id, predicate_id, entry_id))
                .await
        };

        if let Err(reason) = link.await {
            warn!(%sub_entry_id, %entry_id, error = %reason, "Sub-entry typed but not linked");
            return Err(MarketError::PartialTag {
                written: typed,
                reason: Box::new(reason),
            });
        }

        Ok(())
    }

    /// Whether this reconciler has seen `triple` confirmed
    pub fn is_asserted(&self, triple: &Triple) -> bool {
        self.asserted.contains(triple)
    }

    async fn assert_triple(&self, triple: Triple) -> Result<()> {
        if self.asserted.contains(&triple) {
            debug!(%triple, "Triple already asserted, skipping");
            return Ok(());
        }

        self.in_flight
            .run(triple, move || async move {
                if self.asserted.contains(&triple) {
                    return Ok(());
                }
                let triple_id = self.registry.writer().create_triple(&triple).await?;
                self.asserted.insert(triple);
                info!(%triple, %triple_id, "Created triple");
                Ok(())
            })
            .await
    }
}
