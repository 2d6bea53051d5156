//! The shared diagram store boundary.
//!
//! Every document change is expressed as a batch of [`Mutation`]s and handed
//! to [`DiagramStore::apply`], which either applies the whole batch as one
//! transaction or rejects it untouched. Readers get owned copies, never live
//! handles into the document.

use std::collections::BTreeMap;

use kurbo::Point;
use thiserror::Error;

use crate::config::ProjectConfig;
use crate::layer::{Layer, LayerId, LayerPatch, RelationLayer};
use crate::presence::{Member, Presence};

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("CRDT error: {0}")]
    Crdt(#[from] loro::LoroError),
    #[error("Layer not found: {0}")]
    UnknownLayer(LayerId),
    #[error("Patch does not match the kind of layer {0}")]
    KindMismatch(LayerId),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// One primitive document change.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Set `layers[id]` and append `id` to `layer_ids` if not already there.
    InsertLayer { id: LayerId, layer: Layer },
    /// Per-field update of an existing layer. Fails the batch if the layer is
    /// missing or of the other kind.
    PatchLayer { id: LayerId, patch: LayerPatch },
    /// Remove `id` from both collections. Missing ids are ignored.
    RemoveLayer { id: LayerId },
    /// Empty both collections.
    Clear,
    /// Replace the whole project configuration record.
    SetProjectConfig(ProjectConfig),
    /// Rename the document.
    SetName(String),
}

/// Point-in-time deep copy of the document graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagramSnapshot {
    pub layers: BTreeMap<LayerId, Layer>,
    pub layer_ids: Vec<LayerId>,
}

impl DiagramSnapshot {
    pub fn get(&self, id: &str) -> Option<&Layer> {
        self.layers.get(id)
    }

    /// Layers in list order. Ids without an entry are skipped.
    pub fn ordered(&self) -> impl Iterator<Item = (&LayerId, &Layer)> {
        self.layer_ids
            .iter()
            .filter_map(|id| self.layers.get(id).map(|layer| (id, layer)))
    }

    pub fn is_empty(&self) -> bool {
        self.layer_ids.is_empty() && self.layers.is_empty()
    }

    /// Relations whose endpoints are not both existing entities.
    pub fn is_dangling(&self, relation: &RelationLayer) -> bool {
        let is_entity = |id: &str| matches!(self.layers.get(id), Some(Layer::Entity(_)));
        !(is_entity(&relation.source_id) && is_entity(&relation.target_id))
    }

    /// Ids of relations that reference any of `ids`.
    pub fn relations_referencing(&self, ids: &[LayerId]) -> Vec<LayerId> {
        self.ordered()
            .filter_map(|(id, layer)| match layer {
                Layer::Relation(r) if ids.iter().any(|x| r.references(x)) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Multi-user document store with presence and local undo history.
pub trait DiagramStore {
    // --- Document reads ---

    fn layer(&self, id: &str) -> Option<Layer>;

    fn layer_ids(&self) -> Vec<LayerId>;

    fn snapshot(&self) -> DiagramSnapshot;

    fn project_config(&self) -> ProjectConfig;

    fn name(&self) -> String;

    // --- Document writes ---

    /// Apply a batch atomically. On error nothing is applied.
    fn apply(&mut self, batch: &[Mutation]) -> StoreResult<()>;

    // --- Presence ---

    fn presence(&self) -> &Presence;

    fn set_selection(&mut self, selection: Vec<LayerId>);

    fn set_cursor(&mut self, cursor: Option<Point>);

    fn me(&self) -> &Member;

    fn others(&self) -> &[Member];

    // --- History ---

    /// Start collapsing subsequent batches into one undo step. Idempotent.
    fn pause_history(&mut self);

    /// Close the step opened by `pause_history`. No-op when not paused.
    fn resume_history(&mut self);

    fn undo(&mut self) -> bool;

    fn redo(&mut self) -> bool;

    fn can_undo(&self) -> bool;

    fn can_redo(&self) -> bool;

    // --- Provided helpers ---

    fn selection(&self) -> &[LayerId] {
        &self.presence().selection
    }

    fn insert(&mut self, id: LayerId, layer: Layer) -> StoreResult<()> {
        self.apply(&[Mutation::InsertLayer { id, layer }])
    }

    fn patch(&mut self, id: LayerId, patch: LayerPatch) -> StoreResult<()> {
        self.apply(&[Mutation::PatchLayer { id, patch }])
    }

    fn remove(&mut self, id: LayerId) -> StoreResult<()> {
        self.apply(&[Mutation::RemoveLayer { id }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{EntityLayer, RelationType};

    fn entity() -> Layer {
        Layer::Entity(EntityLayer::with_defaults(Point::ORIGIN, 10.0, 10.0))
    }

    #[test]
    fn test_dangling_and_referencing() {
        let mut snap = DiagramSnapshot::default();
        for id in ["a", "b"] {
            snap.layers.insert(id.into(), entity());
            snap.layer_ids.push(id.into());
        }
        let rel = RelationLayer::new("a", "b", RelationType::Association);
        snap.layers.insert("r".into(), Layer::Relation(rel.clone()));
        snap.layer_ids.push("r".into());

        assert!(!snap.is_dangling(&rel));
        assert_eq!(snap.relations_referencing(&["b".into()]), vec!["r".to_string()]);

        snap.layers.remove("b");
        assert!(snap.is_dangling(&rel));
        assert_eq!(snap.ordered().count(), 2);
    }
}
