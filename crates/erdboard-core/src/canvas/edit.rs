//! Document edits issued by the engine: gestures, sidebar edits, keyboard
//! commands and bulk replacement.

use chrono::Utc;
use kurbo::{Point, Rect, Vec2};

use super::{CanvasEngine, CanvasState};
use crate::config::ProjectConfig;
use crate::exchange::{ExchangeResult, ExportEnvelope, export_file_name};
use crate::generate::{GenerateOptions, GenerationResult, generated_batch};
use crate::geometry::{Side, resize_bounds};
use crate::input::Command;
use crate::layer::{
    Attribute, AttributePatch, EntityLayer, EntityPatch, Layer, LayerId, LayerPatch, RelationPatch, new_id,
};
use crate::store::{DiagramSnapshot, DiagramStore, Mutation, StoreResult};

/// Name used for export files when the document has none.
const UNTITLED: &str = "untitled";

/// Work the engine cannot do itself and hands back to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEffect {
    /// Offer `json` to the user as a download named `file_name`.
    ExportRequested { file_name: String, json: String },
    /// Show a file picker; the chosen file goes to [`CanvasEngine::import_json`].
    OpenImportPicker,
}

impl<S: DiagramStore> CanvasEngine<S> {
    pub(super) fn run_command(&mut self, command: Command) -> Option<EngineEffect> {
        match command {
            Command::DeleteSelection => {
                self.delete_selected();
                None
            }
            Command::Undo => {
                self.undo();
                None
            }
            Command::Redo => {
                self.redo();
                None
            }
            Command::SelectAll => {
                self.select_all();
                None
            }
            Command::Export => match self.export_json() {
                Ok(effect) => Some(effect),
                Err(e) => {
                    log::error!("Export failed: {e}");
                    None
                }
            },
            Command::Import => Some(EngineEffect::OpenImportPicker),
        }
    }

    // --- Gestures ---

    /// Move every selected entity by the pointer delta. Relations follow
    /// their endpoints and are never moved directly.
    pub(super) fn translate_selected(&mut self, from: Point, to: Point) {
        let delta: Vec2 = to - from;
        if delta == Vec2::ZERO {
            return;
        }

        let batch: Vec<Mutation> = self
            .store
            .selection()
            .iter()
            .filter_map(|id| {
                let entity = self.store.layer(id)?.as_entity()?.clone();
                Some(Mutation::PatchLayer {
                    id: id.clone(),
                    patch: LayerPatch::Entity(EntityPatch::position(Point::new(
                        entity.x + delta.x,
                        entity.y + delta.y,
                    ))),
                })
            })
            .collect();
        if batch.is_empty() {
            return;
        }
        if let Err(e) = self.store.apply(&batch) {
            log::error!("Failed to move selection: {e}");
        }
    }

    /// Resize the first selected layer, if it is an entity.
    pub(super) fn resize_selected(&mut self, initial_bounds: Rect, side: Side, point: Point) {
        let Some(id) = self.store.selection().first().cloned() else {
            return;
        };
        if !matches!(self.store.layer(&id), Some(Layer::Entity(_))) {
            return;
        }
        let bounds = resize_bounds(initial_bounds, side, point, self.config.min_layer_size);
        if let Err(e) = self.store.patch(id, LayerPatch::Entity(EntityPatch::bounds(bounds))) {
            log::error!("Failed to resize layer: {e}");
        }
    }

    /// Drop a default entity with its top-left corner at `origin` and select it.
    pub fn insert_entity(&mut self, origin: Point) -> StoreResult<LayerId> {
        let entity = EntityLayer::with_defaults(
            origin,
            self.config.default_entity_width,
            self.config.default_entity_height,
        );
        let id = new_id();
        self.store.insert(id.clone(), Layer::Entity(entity))?;
        self.store.set_selection(vec![id.clone()]);
        log::debug!("Inserted entity {id} at ({}, {})", origin.x, origin.y);
        Ok(id)
    }

    // --- Selection ---

    /// Select every layer, relations included, in list order.
    pub fn select_all(&mut self) {
        let ids = self.store.layer_ids();
        self.store.set_selection(ids);
    }

    /// Select a single layer, e.g. from the layer list.
    pub fn select_layer(&mut self, id: &str) {
        if self.store.layer(id).is_none() {
            return;
        }
        self.store.set_selection(vec![id.to_string()]);
    }

    pub fn unselect(&mut self) {
        if !self.store.selection().is_empty() {
            self.store.set_selection(Vec::new());
        }
    }

    /// Delete the selected layers along with every relation that references
    /// them, as one history step.
    pub fn delete_selected(&mut self) {
        let selection = self.store.selection().to_vec();
        if selection.is_empty() {
            return;
        }

        let snapshot = self.store.snapshot();
        let mut doomed = selection.clone();
        for id in snapshot.relations_referencing(&selection) {
            if !doomed.contains(&id) {
                doomed.push(id);
            }
        }
        let cascaded = doomed.len() - selection.len();

        let batch: Vec<Mutation> = doomed.into_iter().map(|id| Mutation::RemoveLayer { id }).collect();
        match self.store.apply(&batch) {
            Ok(()) => {
                if cascaded > 0 {
                    log::info!(
                        "Deleted {} layers and {cascaded} dependent relations",
                        selection.len()
                    );
                }
                self.store.set_selection(Vec::new());
            }
            Err(e) => log::error!("Failed to delete selection: {e}"),
        }
    }

    /// Drop ids that no longer exist from the local selection.
    fn prune_selection(&mut self) {
        let selection = self.store.selection();
        let kept: Vec<LayerId> = selection
            .iter()
            .filter(|id| self.store.layer(id).is_some())
            .cloned()
            .collect();
        if kept.len() != selection.len() {
            self.store.set_selection(kept);
        }
    }

    // --- Property edits ---

    pub fn update_entity(&mut self, id: &str, patch: EntityPatch) {
        if patch.is_empty() || !matches!(self.store.layer(id), Some(Layer::Entity(_))) {
            return;
        }
        if let Err(e) = self.store.patch(id.to_string(), LayerPatch::Entity(patch)) {
            log::error!("Failed to update entity {id}: {e}");
        }
    }

    pub fn update_relation(&mut self, id: &str, patch: RelationPatch) {
        if patch == RelationPatch::default() || !matches!(self.store.layer(id), Some(Layer::Relation(_))) {
            return;
        }
        if let Err(e) = self.store.patch(id.to_string(), LayerPatch::Relation(patch)) {
            log::error!("Failed to update relation {id}: {e}");
        }
    }

    /// Rewrite an entity's attribute list with `edit` and store it whole.
    fn edit_attributes(&mut self, id: &str, edit: impl FnOnce(&mut Vec<Attribute>) -> bool) {
        let Some(Layer::Entity(entity)) = self.store.layer(id) else {
            return;
        };
        let mut attributes = entity.attributes;
        if !edit(&mut attributes) {
            return;
        }
        let patch = EntityPatch {
            attributes: Some(attributes),
            ..Default::default()
        };
        if let Err(e) = self.store.patch(id.to_string(), LayerPatch::Entity(patch)) {
            log::error!("Failed to update attributes of {id}: {e}");
        }
    }

    /// Append a `nuevoCampo: string` attribute.
    pub fn add_attribute(&mut self, id: &str) {
        self.edit_attributes(id, |attributes| {
            attributes.push(Attribute::new("nuevoCampo", "string"));
            true
        });
    }

    pub fn update_attribute(&mut self, id: &str, attribute_id: &str, patch: AttributePatch) {
        self.edit_attributes(id, |attributes| {
            match attributes.iter_mut().find(|a| a.id == attribute_id) {
                Some(attribute) => {
                    attribute.apply(&patch);
                    true
                }
                None => false,
            }
        });
    }

    pub fn delete_attribute(&mut self, id: &str, attribute_id: &str) {
        self.edit_attributes(id, |attributes| {
            let before = attributes.len();
            attributes.retain(|a| a.id != attribute_id);
            attributes.len() != before
        });
    }

    // --- Document metadata ---

    pub fn project_config(&self) -> ProjectConfig {
        self.store.project_config()
    }

    /// Replace the whole project configuration record.
    pub fn save_project_config(&mut self, config: ProjectConfig) -> StoreResult<()> {
        self.store.apply(&[Mutation::SetProjectConfig(config)])
    }

    pub fn rename_document(&mut self, name: &str) -> StoreResult<()> {
        self.store.apply(&[Mutation::SetName(name.to_string())])
    }

    // --- History ---

    pub fn undo(&mut self) -> bool {
        let undone = self.store.undo();
        if undone {
            self.prune_selection();
        }
        undone
    }

    pub fn redo(&mut self) -> bool {
        let redone = self.store.redo();
        if redone {
            self.prune_selection();
        }
        redone
    }

    pub fn can_undo(&self) -> bool {
        self.store.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.store.can_redo()
    }

    // --- Import / export ---

    /// Serialize the document for download.
    pub fn export_json(&self) -> ExchangeResult<EngineEffect> {
        let mut name = self.store.name();
        if name.trim().is_empty() {
            name = UNTITLED.to_string();
        }
        let envelope = ExportEnvelope::from_snapshot(self.store.snapshot(), name.clone(), Utc::now());
        let json = envelope.to_json_pretty()?;
        log::info!("Exported {} layers", envelope.layer_ids.len());
        Ok(EngineEffect::ExportRequested {
            file_name: export_file_name(&name),
            json,
        })
    }

    /// Replace the document with the contents of an export file.
    ///
    /// On error neither the document nor the interaction state changes.
    pub fn import_json(&mut self, json: &str) -> ExchangeResult<()> {
        let envelope = match ExportEnvelope::parse(json) {
            Ok(envelope) => envelope,
            Err(e) => {
                log::warn!("Rejected import: {e}");
                return Err(e);
            }
        };
        self.store.apply(&envelope.replace_batch())?;
        self.store.set_selection(Vec::new());
        self.set_state(CanvasState::None);
        log::info!("Imported {} layers", envelope.layer_ids.len());
        Ok(())
    }

    /// Put a diagram produced by a generator into the document.
    pub fn apply_generated(&mut self, diagram: DiagramSnapshot, options: GenerateOptions) -> GenerationResult<()> {
        let count = diagram.layer_ids.len();
        let batch = generated_batch(&self.store.snapshot(), diagram, options)?;
        self.store.apply(&batch)?;
        if options.replace {
            self.store.set_selection(Vec::new());
            self.set_state(CanvasState::None);
        }
        log::info!("Applied {count} generated layers");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::crdt::CrdtStore;
    use crate::exchange::ExchangeError;
    use crate::input::KeyInput;
    use crate::layer::{Cardinality, LayerType, RelationLayer, RelationType};
    use pretty_assertions::assert_eq;

    fn engine() -> CanvasEngine {
        CanvasEngine::new(CrdtStore::new(), EngineConfig::default())
    }

    fn entity_at(engine: &mut CanvasEngine, id: &str, x: f64) {
        let layer = Layer::Entity(EntityLayer::with_defaults(Point::new(x, 0.0), 100.0, 100.0));
        engine.store_mut().insert(id.into(), layer).unwrap();
    }

    fn relate(engine: &mut CanvasEngine, id: &str, from: &str, to: &str) {
        let layer = Layer::Relation(RelationLayer::new(from, to, RelationType::Association));
        engine.store_mut().insert(id.into(), layer).unwrap();
    }

    #[test]
    fn test_delete_cascades_to_relations() {
        let mut engine = engine();
        entity_at(&mut engine, "a", 0.0);
        entity_at(&mut engine, "b", 200.0);
        entity_at(&mut engine, "c", 400.0);
        relate(&mut engine, "ab", "a", "b");
        relate(&mut engine, "bc", "b", "c");
        engine.select_layer("a");

        engine.delete_selected();
        assert_eq!(engine.store().layer_ids(), vec!["b", "c", "bc"]);
        assert!(engine.store().layer("a").is_none());
        assert!(engine.store().layer("ab").is_none());
        assert!(engine.store().selection().is_empty());

        assert!(engine.undo());
        assert_eq!(engine.store().layer_ids(), vec!["a", "b", "c", "ab", "bc"]);
    }

    #[test]
    fn test_delete_with_empty_selection_is_noop() {
        let mut engine = engine();
        entity_at(&mut engine, "a", 0.0);
        engine.delete_selected();
        assert_eq!(engine.store().layer_ids(), vec!["a"]);
    }

    #[test]
    fn test_select_all_includes_relations() {
        let mut engine = engine();
        entity_at(&mut engine, "a", 0.0);
        entity_at(&mut engine, "b", 200.0);
        relate(&mut engine, "r", "a", "b");
        engine.key_down(&KeyInput::new("a").with_command());
        assert_eq!(engine.store().selection(), engine.store().layer_ids().as_slice());
        assert_eq!(engine.store().selection().len(), 3);

        engine.delete_selected();
        assert!(engine.store().layer_ids().is_empty());
    }

    #[test]
    fn test_select_layer_ignores_unknown() {
        let mut engine = engine();
        entity_at(&mut engine, "a", 0.0);
        engine.select_layer("a");
        engine.select_layer("ghost");
        assert_eq!(engine.store().selection(), ["a".to_string()]);
    }

    #[test]
    fn test_attribute_crud() {
        let mut engine = engine();
        entity_at(&mut engine, "a", 0.0);

        engine.add_attribute("a");
        let attrs = engine.store().layer("a").unwrap().as_entity().unwrap().attributes.clone();
        assert_eq!(attrs.len(), 3);
        let added = attrs[2].clone();
        assert_eq!((added.name.as_str(), added.data_type.as_str()), ("nuevoCampo", "string"));
        assert!(!added.required && !added.pk);

        engine.update_attribute(
            "a",
            &added.id,
            AttributePatch {
                name: Some("email".into()),
                required: Some(true),
                ..Default::default()
            },
        );
        let attrs = engine.store().layer("a").unwrap().as_entity().unwrap().attributes.clone();
        assert_eq!(attrs[2].name, "email");
        assert!(attrs[2].required);
        assert_eq!(attrs[2].data_type, "string");

        engine.delete_attribute("a", &added.id);
        let attrs = engine.store().layer("a").unwrap().as_entity().unwrap().attributes.clone();
        assert_eq!(attrs.len(), 2);

        // Each edit is its own step.
        assert!(engine.undo());
        assert_eq!(
            engine.store().layer("a").unwrap().as_entity().unwrap().attributes.len(),
            3
        );
    }

    #[test]
    fn test_property_edits_ignore_wrong_kind() {
        let mut engine = engine();
        entity_at(&mut engine, "a", 0.0);
        entity_at(&mut engine, "b", 200.0);
        relate(&mut engine, "r", "a", "b");
        let before = engine.store().snapshot();

        engine.update_entity(
            "r",
            EntityPatch {
                name: Some("x".into()),
                ..Default::default()
            },
        );
        engine.update_relation(
            "a",
            RelationPatch {
                target_card: Some(Cardinality::Many),
                ..Default::default()
            },
        );
        engine.add_attribute("r");
        engine.update_attribute("a", "missing", AttributePatch::default());
        assert_eq!(engine.store().snapshot(), before);

        engine.update_relation(
            "r",
            RelationPatch {
                target_card: Some(Cardinality::Many),
                ..Default::default()
            },
        );
        let rel = engine.store().layer("r").unwrap();
        assert_eq!(rel.as_relation().unwrap().target_card, Cardinality::Many);
    }

    #[test]
    fn test_undo_prunes_selection() {
        let mut engine = engine();
        engine.start_inserting(LayerType::Entity);
        engine.pointer_up(crate::input::PointerInput::at(100.0, 100.0));
        assert_eq!(engine.store().selection().len(), 1);

        engine.key_down(&KeyInput::new("z").with_command());
        assert!(engine.store().layer_ids().is_empty());
        assert!(engine.store().selection().is_empty());
        assert!(engine.can_redo());

        engine.key_down(&KeyInput::new("z").with_command().with_shift());
        assert_eq!(engine.store().layer_ids().len(), 1);
    }

    #[test]
    fn test_export_effect() {
        let mut engine = engine();
        entity_at(&mut engine, "a", 0.0);
        engine.rename_document("Mi Sala").unwrap();

        let Some(EngineEffect::ExportRequested { file_name, json }) =
            engine.key_down(&KeyInput::new("s").with_command())
        else {
            panic!("expected export");
        };
        assert_eq!(file_name, "Mi_Sala_canvas_export.json");
        let parsed = ExportEnvelope::parse(&json).unwrap();
        assert_eq!(parsed.name, "Mi Sala");
        assert_eq!(parsed.layer_ids, vec!["a"]);
    }

    #[test]
    fn test_export_unnamed_document() {
        let engine = engine();
        let EngineEffect::ExportRequested { file_name, .. } = engine.export_json().unwrap() else {
            panic!("expected export");
        };
        assert_eq!(file_name, "untitled_canvas_export.json");
    }

    #[test]
    fn test_import_key_requests_picker() {
        let mut engine = engine();
        assert_eq!(
            engine.key_down(&KeyInput::new("o").with_command()),
            Some(EngineEffect::OpenImportPicker)
        );
        assert_eq!(engine.key_down(&KeyInput::new("o").with_command().in_text_input()), None);
    }

    #[test]
    fn test_import_replaces_and_resets() {
        let mut source = engine();
        entity_at(&mut source, "x", 0.0);
        entity_at(&mut source, "y", 200.0);
        relate(&mut source, "xy", "x", "y");
        let EngineEffect::ExportRequested { json, .. } = source.export_json().unwrap() else {
            panic!("expected export");
        };

        let mut engine = engine();
        entity_at(&mut engine, "old", 0.0);
        engine.select_layer("old");
        engine.start_panning();

        engine.import_json(&json).unwrap();
        assert_eq!(engine.store().snapshot(), source.store().snapshot());
        assert!(engine.store().selection().is_empty());
        assert!(engine.state().is_idle());

        // The whole import is one step.
        assert!(engine.undo());
        assert_eq!(engine.store().layer_ids(), vec!["old"]);
    }

    #[test]
    fn test_failed_import_leaves_everything() {
        let mut engine = engine();
        entity_at(&mut engine, "a", 0.0);
        engine.select_layer("a");
        engine.start_panning();
        let before = engine.store().snapshot();

        let err = engine.import_json(r#"{"layers": {}}"#).unwrap_err();
        assert!(matches!(err, ExchangeError::MissingCollections));
        assert_eq!(engine.store().snapshot(), before);
        assert_eq!(engine.store().selection(), ["a".to_string()]);
        assert_eq!(engine.state(), &CanvasState::Dragging { origin: None });
    }

    #[test]
    fn test_apply_generated_append() {
        let mut engine = engine();
        entity_at(&mut engine, "a", 0.0);

        let mut generated = DiagramSnapshot::default();
        generated.layers.insert(
            "g".into(),
            Layer::Entity(EntityLayer::with_defaults(Point::new(500.0, 0.0), 100.0, 100.0)),
        );
        generated.layer_ids.push("g".into());
        engine.apply_generated(generated, GenerateOptions::default()).unwrap();
        assert_eq!(engine.store().layer_ids(), vec!["a", "g"]);
    }

    #[test]
    fn test_project_config_roundtrip() {
        let mut engine = engine();
        assert_eq!(engine.project_config(), ProjectConfig::default());
        let config = ProjectConfig {
            artifact_id: "tienda".into(),
            ..Default::default()
        };
        engine.save_project_config(config.clone()).unwrap();
        assert_eq!(engine.project_config(), config);
    }
}
