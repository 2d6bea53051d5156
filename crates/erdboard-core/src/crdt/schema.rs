//! Loro-backed implementation of [`DiagramStore`].

use std::collections::{BTreeMap, HashMap};

use kurbo::Point;
use loro::{
    Container, ExportMode, Frontiers, LoroDoc, LoroList, LoroMap, LoroResult, LoroValue, UndoManager,
    ValueOrContainer, VersionVector,
};

use super::convert::{layer_from_loro, layer_to_loro, layer_type_of, patch_to_loro};
use crate::config::ProjectConfig;
use crate::layer::{Layer, LayerId, LayerPatch, LayerType};
use crate::presence::{Member, Presence, Roster, UserInfo};
use crate::store::{DiagramSnapshot, DiagramStore, Mutation, StoreError, StoreResult};

/// Key for the layers map in the document.
pub const LAYERS_KEY: &str = "layers";
/// Key for the ordered layer id list in the document.
pub const LAYER_IDS_KEY: &str = "layer_ids";
/// Key for the document metadata map.
pub const META_KEY: &str = "meta";
/// Key for the document name.
pub const NAME_KEY: &str = "name";

const PROJECT_CONFIG_KEY: &str = "project_config";

/// Default depth of the local undo stack.
pub const DEFAULT_MAX_UNDO_STEPS: usize = 100;

/// A diagram document shared through Loro, plus this client's presence.
///
/// Undo history is local to this peer: remote changes imported through
/// [`CrdtStore::import`] are never undone here.
pub struct CrdtStore {
    doc: LoroDoc,
    undo_manager: UndoManager,
    history_paused: bool,
    roster: Roster,
}

impl CrdtStore {
    /// Create a new empty document. The local connection id is the Loro peer id.
    pub fn new() -> Self {
        Self::with_doc(LoroDoc::new(), UserInfo::default(), DEFAULT_MAX_UNDO_STEPS)
    }

    /// Create a new empty document for a named user.
    pub fn with_user(info: UserInfo, max_undo_steps: usize) -> Self {
        Self::with_doc(LoroDoc::new(), info, max_undo_steps)
    }

    /// Create a document from a snapshot produced by [`CrdtStore::export_snapshot`].
    pub fn from_snapshot(bytes: &[u8]) -> LoroResult<Self> {
        let doc = LoroDoc::new();
        doc.import(bytes)?;
        Ok(Self::with_doc(doc, UserInfo::default(), DEFAULT_MAX_UNDO_STEPS))
    }

    fn with_doc(doc: LoroDoc, info: UserInfo, max_undo_steps: usize) -> Self {
        let mut undo_manager = UndoManager::new(&doc);
        undo_manager.set_max_undo_steps(max_undo_steps);
        // Every committed batch is its own step unless history is paused.
        undo_manager.set_merge_interval(0);
        let roster = Roster::new(Member::new(doc.peer_id(), info));
        Self {
            doc,
            undo_manager,
            history_paused: false,
            roster,
        }
    }

    pub fn loro_doc(&self) -> &LoroDoc {
        &self.doc
    }

    pub fn peer_id(&self) -> u64 {
        self.doc.peer_id()
    }

    /// Remote members are written by the sync session only.
    pub fn roster_mut(&mut self) -> &mut Roster {
        &mut self.roster
    }

    fn layers_map(&self) -> LoroMap {
        self.doc.get_map(LAYERS_KEY)
    }

    fn layer_ids_list(&self) -> LoroList {
        self.doc.get_list(LAYER_IDS_KEY)
    }

    fn meta_map(&self) -> LoroMap {
        self.doc.get_map(META_KEY)
    }

    fn layer_map(&self, id: &str) -> Option<LoroMap> {
        match self.layers_map().get(id)? {
            ValueOrContainer::Container(Container::Map(map)) => Some(map),
            _ => None,
        }
    }

    fn layer_type(&self, id: &str) -> Option<LayerType> {
        self.layer_map(id).as_ref().and_then(layer_type_of)
    }

    fn list_position(&self, id: &str) -> Option<usize> {
        let list = self.layer_ids_list();
        (0..list.len()).find(|&i| {
            matches!(list.get(i), Some(ValueOrContainer::Value(LoroValue::String(s))) if s.to_string() == id)
        })
    }

    /// Check every patch in a batch against the kinds the batch itself
    /// produces, so that a rejected batch leaves the document untouched.
    fn validate(&self, batch: &[Mutation]) -> StoreResult<()> {
        let mut overlay: HashMap<&str, Option<LayerType>> = HashMap::new();
        let mut cleared = false;
        for mutation in batch {
            match mutation {
                Mutation::InsertLayer { id, layer } => {
                    overlay.insert(id.as_str(), Some(layer.layer_type()));
                }
                Mutation::RemoveLayer { id } => {
                    overlay.insert(id.as_str(), None);
                }
                Mutation::Clear => {
                    overlay.clear();
                    cleared = true;
                }
                Mutation::PatchLayer { id, patch } => {
                    let kind = match overlay.get(id.as_str()) {
                        Some(kind) => *kind,
                        None if cleared => None,
                        None => self.layer_type(id),
                    };
                    match (kind, patch) {
                        (None, _) => return Err(StoreError::UnknownLayer(id.clone())),
                        (Some(LayerType::Entity), LayerPatch::Entity(_))
                        | (Some(LayerType::Relation), LayerPatch::Relation(_)) => {}
                        _ => return Err(StoreError::KindMismatch(id.clone())),
                    }
                }
                Mutation::SetProjectConfig(_) | Mutation::SetName(_) => {}
            }
        }
        Ok(())
    }

    /// Run a validated batch through `apply_one` and commit it once. If any
    /// mutation fails the document is reverted to where it was before the
    /// batch.
    fn apply_with(
        &mut self,
        batch: &[Mutation],
        mut apply_one: impl FnMut(&mut Self, &Mutation) -> StoreResult<()>,
    ) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.validate(batch)?;
        let before = self.doc.state_frontiers();
        for mutation in batch {
            if let Err(e) = apply_one(self, mutation) {
                log::error!("Mutation failed mid-batch, rolling back: {e}");
                self.rollback(&before);
                return Err(e);
            }
        }
        self.doc.commit();
        Ok(())
    }

    /// Undo the uncommitted part of a failed batch. The partial edit and its
    /// revert share one undo group.
    fn rollback(&mut self, before: &Frontiers) {
        let grouped = !self.history_paused && self.undo_manager.group_start().is_ok();
        self.doc.commit();
        if let Err(e) = self.doc.revert_to(before) {
            log::error!("Failed to roll back partial batch: {e}");
        }
        self.doc.commit();
        if grouped {
            self.undo_manager.group_end();
        }
    }

    fn apply_one(&mut self, mutation: &Mutation) -> StoreResult<()> {
        match mutation {
            Mutation::InsertLayer { id, layer } => {
                let layers = self.layers_map();
                let layer_map = layers.insert_container(id, LoroMap::new())?;
                layer_to_loro(layer, &layer_map)?;
                if self.list_position(id).is_none() {
                    self.layer_ids_list().push(LoroValue::String(id.clone().into()))?;
                }
            }
            Mutation::PatchLayer { id, patch } => {
                let layer_map = self
                    .layer_map(id)
                    .ok_or_else(|| StoreError::UnknownLayer(id.clone()))?;
                patch_to_loro(patch, &layer_map)?;
            }
            Mutation::RemoveLayer { id } => {
                let list = self.layer_ids_list();
                for i in (0..list.len()).rev() {
                    if let Some(ValueOrContainer::Value(LoroValue::String(s))) = list.get(i) {
                        if s.to_string() == *id {
                            list.delete(i, 1)?;
                        }
                    }
                }
                let layers = self.layers_map();
                if layers.get(id).is_some() {
                    layers.delete(id)?;
                }
            }
            Mutation::Clear => {
                let list = self.layer_ids_list();
                for i in (0..list.len()).rev() {
                    list.delete(i, 1)?;
                }
                let layers = self.layers_map();
                let keys: Vec<String> = match layers.get_deep_value() {
                    LoroValue::Map(map) => map.keys().cloned().collect(),
                    _ => Vec::new(),
                };
                for key in keys {
                    layers.delete(&key)?;
                }
            }
            Mutation::SetProjectConfig(config) => {
                let json = serde_json::to_string(config)?;
                self.meta_map().insert(PROJECT_CONFIG_KEY, json)?;
            }
            Mutation::SetName(name) => {
                let text = self.doc.get_text(NAME_KEY);
                let len = text.len_unicode();
                if len > 0 {
                    text.delete(0, len)?;
                }
                text.insert(0, name)?;
            }
        }
        Ok(())
    }

    // --- Sync ---

    /// Export the document as a snapshot (full state).
    pub fn export_snapshot(&self) -> Vec<u8> {
        self.doc.export(ExportMode::Snapshot).unwrap_or_default()
    }

    /// Export incremental updates since a version.
    pub fn export_updates(&self, since: &VersionVector) -> Vec<u8> {
        self.doc.export(ExportMode::updates(since)).unwrap_or_default()
    }

    /// Import updates or a snapshot from another peer.
    pub fn import(&mut self, bytes: &[u8]) -> StoreResult<()> {
        self.doc.import(bytes)?;
        Ok(())
    }

    /// Current version vector.
    pub fn version(&self) -> VersionVector {
        self.doc.oplog_vv()
    }
}

impl Default for CrdtStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagramStore for CrdtStore {
    fn layer(&self, id: &str) -> Option<Layer> {
        match self.layer_map(id)?.get_deep_value() {
            LoroValue::Map(map) => layer_from_loro(&map),
            _ => None,
        }
    }

    fn layer_ids(&self) -> Vec<LayerId> {
        let list = self.layer_ids_list();
        let mut result = Vec::with_capacity(list.len());
        for i in 0..list.len() {
            if let Some(ValueOrContainer::Value(LoroValue::String(id))) = list.get(i) {
                result.push(id.to_string());
            }
        }
        result
    }

    fn snapshot(&self) -> DiagramSnapshot {
        let mut layers = BTreeMap::new();
        if let LoroValue::Map(map) = self.layers_map().get_deep_value() {
            for (id, value) in map.iter() {
                match value {
                    LoroValue::Map(layer_map) => match layer_from_loro(layer_map) {
                        Some(layer) => {
                            layers.insert(id.clone(), layer);
                        }
                        None => log::warn!("Skipping unreadable layer {id}"),
                    },
                    _ => log::warn!("Skipping non-map layer entry {id}"),
                }
            }
        }
        DiagramSnapshot {
            layers,
            layer_ids: self.layer_ids(),
        }
    }

    fn project_config(&self) -> ProjectConfig {
        match self.meta_map().get(PROJECT_CONFIG_KEY) {
            Some(ValueOrContainer::Value(LoroValue::String(json))) => {
                serde_json::from_str(&json.to_string()).unwrap_or_else(|e| {
                    log::warn!("Stored project config is unreadable, using defaults: {e}");
                    ProjectConfig::default()
                })
            }
            _ => ProjectConfig::default(),
        }
    }

    fn name(&self) -> String {
        self.doc.get_text(NAME_KEY).to_string()
    }

    fn apply(&mut self, batch: &[Mutation]) -> StoreResult<()> {
        self.apply_with(batch, Self::apply_one)
    }

    fn presence(&self) -> &Presence {
        &self.roster.me().presence
    }

    fn set_selection(&mut self, selection: Vec<LayerId>) {
        self.roster.presence_mut().selection = selection;
    }

    fn set_cursor(&mut self, cursor: Option<Point>) {
        self.roster.presence_mut().cursor = cursor;
    }

    fn me(&self) -> &Member {
        self.roster.me()
    }

    fn others(&self) -> &[Member] {
        self.roster.others()
    }

    fn pause_history(&mut self) {
        if !self.history_paused {
            match self.undo_manager.group_start() {
                Ok(()) => self.history_paused = true,
                Err(e) => log::warn!("Could not start history group: {e}"),
            }
        }
    }

    fn resume_history(&mut self) {
        if self.history_paused {
            self.undo_manager.group_end();
            self.history_paused = false;
        }
    }

    fn undo(&mut self) -> bool {
        self.resume_history();
        self.undo_manager.undo().unwrap_or(false)
    }

    fn redo(&mut self) -> bool {
        self.resume_history();
        self.undo_manager.redo().unwrap_or(false)
    }

    fn can_undo(&self) -> bool {
        self.undo_manager.can_undo()
    }

    fn can_redo(&self) -> bool {
        self.undo_manager.can_redo()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::EntityLayer;

    fn entity_at(x: f64) -> Layer {
        Layer::Entity(EntityLayer::with_defaults(Point::new(x, 0.0), 240.0, 140.0))
    }

    #[test]
    fn test_failed_batch_is_rolled_back() {
        let mut store = CrdtStore::new();
        store.insert("a".into(), entity_at(0.0)).unwrap();
        let batch = [
            Mutation::InsertLayer {
                id: "x".into(),
                layer: entity_at(300.0),
            },
            Mutation::SetName("Tienda".into()),
        ];

        let result = store.apply_with(&batch, |store, mutation| match mutation {
            Mutation::SetName(_) => Err(StoreError::UnknownLayer("meta".into())),
            other => store.apply_one(other),
        });

        assert!(matches!(result, Err(StoreError::UnknownLayer(_))));
        assert_eq!(store.layer_ids(), vec!["a".to_string()]);
        assert_eq!(store.layer("x"), None);
        assert_eq!(store.snapshot().layers.len(), 1);
        assert_eq!(store.name(), "");

        store.insert("b".into(), entity_at(600.0)).unwrap();
        assert_eq!(store.layer_ids(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_pause_history_failure_leaves_history_running() {
        let mut store = CrdtStore::new();
        store.undo_manager.group_start().unwrap();
        store.pause_history();
        assert!(!store.history_paused);
        store.undo_manager.group_end();

        store.pause_history();
        assert!(store.history_paused);
        store.resume_history();
        assert!(!store.history_paused);
    }
}
