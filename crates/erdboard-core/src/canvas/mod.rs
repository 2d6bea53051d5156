//! The canvas interaction engine.
//!
//! [`CanvasEngine`] turns pointer and keyboard input into document mutations.
//! It owns the local, unshared state (interaction mode, camera, relation type
//! picked in the toolbar) and talks to the shared document only through
//! [`DiagramStore`].
//!
//! Pointer positions arrive in screen coordinates and are mapped to canvas
//! coordinates with the engine's camera. Hosts call [`CanvasEngine::pointer_down`]
//! for presses on empty canvas and [`CanvasEngine::layer_pointer_down`] for
//! presses on a layer, never both for the same press.

mod edit;
mod state;

pub use edit::EngineEffect;
pub use state::CanvasState;

use kurbo::{Point, Rect, Vec2};

use crate::camera::Camera;
use crate::config::EngineConfig;
use crate::crdt::CrdtStore;
use crate::geometry::{Anchor, Side, manhattan};
use crate::input::{KeyInput, MouseButton, PointerInput};
use crate::layer::{Layer, LayerId, LayerType, RelationLayer, RelationType, new_id};
use crate::selection::find_intersecting_layers;
use crate::store::DiagramStore;

/// Interaction state machine over a shared diagram store.
pub struct CanvasEngine<S: DiagramStore = CrdtStore> {
    store: S,
    state: CanvasState,
    camera: Camera,
    relation_type: RelationType,
    config: EngineConfig,
}

impl<S: DiagramStore> CanvasEngine<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            state: CanvasState::None,
            camera: Camera::with_bounds(config.min_zoom, config.max_zoom),
            relation_type: config.relation_type,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn state(&self) -> &CanvasState {
        &self.state
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Relation type the next link gesture will create.
    pub fn relation_type(&self) -> RelationType {
        self.relation_type
    }

    pub fn set_relation_type(&mut self, relation_type: RelationType) {
        self.relation_type = relation_type;
    }

    fn set_state(&mut self, state: CanvasState) {
        if std::mem::discriminant(&self.state) != std::mem::discriminant(&state) {
            log::debug!("Canvas state {} -> {}", self.state.name(), state.name());
        }
        self.state = state;
    }

    fn to_canvas(&self, input: &PointerInput) -> Point {
        self.camera.screen_to_canvas(input.position)
    }

    // --- Toolbar modes ---

    /// Arm the insert tool.
    pub fn start_inserting(&mut self, layer_type: LayerType) {
        self.set_state(CanvasState::Inserting { layer_type });
    }

    /// Arm camera panning.
    pub fn start_panning(&mut self) {
        self.set_state(CanvasState::Dragging { origin: None });
    }

    /// Begin drawing a relation from an entity's anchor, using the relation
    /// type currently picked in the toolbar.
    pub fn start_linking(&mut self, entity_id: impl Into<LayerId>, anchor: Anchor) {
        self.set_state(CanvasState::Linking {
            from_entity_id: entity_id.into(),
            from_anchor: anchor,
            relation_type: self.relation_type,
            current: None,
        });
    }

    /// Begin resizing the selected entity from a handle.
    pub fn start_resize(&mut self, side: Side, initial_bounds: Rect) {
        self.store.pause_history();
        self.set_state(CanvasState::Resizing {
            initial_bounds,
            side,
        });
    }

    /// Drop whatever gesture is in progress.
    pub fn cancel(&mut self) {
        self.store.resume_history();
        self.set_state(CanvasState::None);
    }

    // --- Pointer ---

    /// Press on empty canvas.
    pub fn pointer_down(&mut self, input: PointerInput) {
        let point = self.to_canvas(&input);
        match self.state {
            // Background clicks never cancel a link in progress.
            CanvasState::Linking { .. } => {}
            CanvasState::Dragging { .. } => {
                self.set_state(CanvasState::Dragging {
                    origin: Some(point),
                });
            }
            // Insertion happens on release.
            CanvasState::Inserting { .. } => {}
            _ => self.set_state(CanvasState::Pressing { origin: point }),
        }
    }

    /// Press on a rendered layer.
    pub fn layer_pointer_down(&mut self, layer_id: &str, input: PointerInput) {
        if let CanvasState::Linking {
            from_entity_id,
            relation_type,
            ..
        } = &self.state
        {
            if layer_id == from_entity_id {
                return;
            }
            let from_entity_id = from_entity_id.clone();
            let relation_type = *relation_type;
            self.complete_link(from_entity_id, layer_id, relation_type);
            return;
        }
        if matches!(self.state, CanvasState::Inserting { .. }) {
            return;
        }

        self.store.pause_history();
        if !self.store.selection().iter().any(|id| id == layer_id) {
            self.store.set_selection(vec![layer_id.to_string()]);
        }

        if input.button == MouseButton::Right {
            self.set_state(CanvasState::RightClick);
        } else {
            let current = self.to_canvas(&input);
            self.set_state(CanvasState::Translating { current });
        }
    }

    /// Create the relation if both ends are entities; otherwise stay in
    /// linking mode.
    fn complete_link(&mut self, source_id: LayerId, target_id: &str, relation_type: RelationType) {
        let is_entity = |layer: Option<Layer>| matches!(layer, Some(Layer::Entity(_)));
        if !is_entity(self.store.layer(&source_id)) || !is_entity(self.store.layer(target_id)) {
            log::debug!("Ignoring link target {target_id}: both ends must be entities");
            return;
        }

        let id = new_id();
        let relation = RelationLayer::new(source_id, target_id, relation_type);
        match self.store.insert(id.clone(), Layer::Relation(relation)) {
            Ok(()) => {
                log::info!("Created {} relation {id}", relation_type.as_str());
                self.set_state(CanvasState::None);
            }
            Err(e) => log::error!("Failed to create relation: {e}"),
        }
    }

    pub fn pointer_move(&mut self, input: PointerInput) {
        let point = self.to_canvas(&input);

        match self.state.clone() {
            CanvasState::Pressing { origin } => {
                if manhattan(origin, point) > self.config.drag_threshold {
                    self.set_state(CanvasState::SelectionNet {
                        origin,
                        current: point,
                    });
                }
            }
            CanvasState::SelectionNet { origin, .. } => {
                self.set_state(CanvasState::SelectionNet {
                    origin,
                    current: point,
                });
                let ids = find_intersecting_layers(&self.store.snapshot(), origin, point);
                self.store.set_selection(ids);
            }
            CanvasState::Dragging { origin: Some(_) } => {
                self.camera.pan(input.movement);
            }
            CanvasState::Translating { current } => {
                self.translate_selected(current, point);
                self.set_state(CanvasState::Translating { current: point });
            }
            CanvasState::Resizing {
                initial_bounds,
                side,
            } => {
                self.resize_selected(initial_bounds, side, point);
            }
            CanvasState::Linking { .. } => {
                if let CanvasState::Linking { current, .. } = &mut self.state {
                    *current = Some(point);
                }
            }
            CanvasState::None
            | CanvasState::Dragging { origin: None }
            | CanvasState::Inserting { .. }
            | CanvasState::RightClick => {}
        }

        self.store.set_cursor(Some(point));
    }

    pub fn pointer_up(&mut self, input: PointerInput) {
        let point = self.to_canvas(&input);

        match self.state.clone() {
            CanvasState::RightClick | CanvasState::Linking { .. } => {}
            CanvasState::None | CanvasState::Pressing { .. } => {
                self.unselect();
                self.set_state(CanvasState::None);
            }
            CanvasState::Inserting { layer_type } => match layer_type {
                LayerType::Entity => {
                    if let Err(e) = self.insert_entity(point) {
                        log::error!("Failed to insert entity: {e}");
                    }
                    self.set_state(CanvasState::None);
                }
                LayerType::Relation => {
                    log::warn!("Relations are created by linking two entities");
                    self.set_state(CanvasState::None);
                }
            },
            CanvasState::Dragging { .. } => {
                self.set_state(CanvasState::Dragging { origin: None });
            }
            CanvasState::SelectionNet { .. }
            | CanvasState::Translating { .. }
            | CanvasState::Resizing { .. } => {
                self.set_state(CanvasState::None);
            }
        }

        self.store.resume_history();
    }

    /// Pointer left the canvas.
    pub fn pointer_leave(&mut self) {
        self.store.set_cursor(None);
    }

    /// Scroll pans the camera; it never zooms.
    pub fn wheel(&mut self, delta: Vec2) {
        self.camera.pan(-delta);
    }

    // --- Camera ---

    pub fn zoom_in(&mut self) -> bool {
        self.camera.zoom_in(self.config.zoom_step)
    }

    pub fn zoom_out(&mut self) -> bool {
        self.camera.zoom_out(self.config.zoom_step)
    }

    pub fn can_zoom_in(&self) -> bool {
        self.camera.can_zoom_in()
    }

    pub fn can_zoom_out(&self) -> bool {
        self.camera.can_zoom_out()
    }

    // --- Keyboard ---

    /// Handle a key press. Returns work the host has to do, if any.
    pub fn key_down(&mut self, key: &KeyInput) -> Option<EngineEffect> {
        let command = key.command()?;
        self.run_command(command)
    }
}
