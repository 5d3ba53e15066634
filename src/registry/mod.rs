//! Canonical entity resolution and classification tagging

mod entity_registry;
mod tags;

pub use entity_registry::EntityRegistry;
pub use tags::{AppTagIds, TagDefinitions, TagReconciler, TypeTagIds};
