//! Headless host: owns the engine, feeds it events and performs the effects
//! it hands back.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use erdboard_core::canvas::{CanvasEngine, EngineEffect};
use erdboard_core::input::PointerInput;
use erdboard_core::presence::UserInfo;
use erdboard_core::store::DiagramStore;
use erdboard_core::{ConfigError, CrdtStore, EngineConfig, ExchangeError, ExportEnvelope, StoreError};
use erdboard_render::{DisplayListRenderer, RenderConfig, RenderContext, Renderer, RendererError, Scene, route_pointer_down};
use kurbo::{Size, Vec2};
use thiserror::Error;

use crate::script::ScriptEvent;

/// Host errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid event on line {line}: {source}")]
    Script {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid engine config: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Render(#[from] RendererError),
}

/// Result type for host operations.
pub type AppResult<T> = Result<T, AppError>;

fn read_file(path: &Path) -> AppResult<String> {
    fs::read_to_string(path).map_err(|source| AppError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, contents: &str) -> AppResult<()> {
    fs::write(path, contents).map_err(|source| AppError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Host configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub render: RenderConfig,
    /// Size of the simulated window, in pixels.
    pub viewport: Size,
    /// Display name announced to collaborators.
    pub user_name: String,
    /// Where export downloads are written. Created on first export.
    pub export_dir: PathBuf,
    /// File handed to the engine when it asks for an import picker.
    pub import_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            render: RenderConfig::default(),
            viewport: Size::new(1280.0, 800.0),
            user_name: String::new(),
            export_dir: PathBuf::from("."),
            import_file: None,
        }
    }
}

impl AppConfig {
    /// Load the engine section from a JSON file; missing fields keep their
    /// defaults.
    pub fn load_engine_config(&mut self, path: &Path) -> AppResult<()> {
        let json = read_file(path)?;
        self.engine = EngineConfig::from_json(&json)?;
        Ok(())
    }
}

/// The host application.
pub struct App {
    engine: CanvasEngine,
    renderer: DisplayListRenderer,
    config: AppConfig,
    /// Files written by export requests, in order.
    exports: Vec<PathBuf>,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        let info = UserInfo {
            name: config.user_name.clone(),
            avatar: None,
        };
        let store = CrdtStore::with_user(info, config.engine.max_undo_steps);
        Self {
            engine: CanvasEngine::new(store, config.engine.clone()),
            renderer: DisplayListRenderer::new(),
            config,
            exports: Vec::new(),
        }
    }

    pub fn engine(&self) -> &CanvasEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut CanvasEngine {
        &mut self.engine
    }

    pub fn exports(&self) -> &[PathBuf] {
        &self.exports
    }

    /// Replace the document with an export file.
    pub fn open(&mut self, path: &Path) -> AppResult<()> {
        let json = read_file(path)?;
        self.engine.import_json(&json)?;
        log::info!("Opened {}", path.display());
        Ok(())
    }

    /// Write the document as an export file.
    pub fn save(&self, path: &Path) -> AppResult<()> {
        write_file(path, &self.document_json()?)?;
        log::info!("Saved {}", path.display());
        Ok(())
    }

    /// The document in export format.
    pub fn document_json(&self) -> AppResult<String> {
        let store = self.engine.store();
        let envelope = ExportEnvelope::from_snapshot(store.snapshot(), store.name(), Utc::now());
        Ok(envelope.to_json_pretty()?)
    }

    /// Replay events in order.
    pub fn run(&mut self, events: impl IntoIterator<Item = ScriptEvent>) -> AppResult<()> {
        for event in events {
            self.handle_event(event)?;
        }
        Ok(())
    }

    pub fn handle_event(&mut self, event: ScriptEvent) -> AppResult<()> {
        log::trace!("Event: {event:?}");
        let engine = &mut self.engine;
        match event {
            ScriptEvent::PointerDown { x, y, button } => {
                let input = PointerInput::at(x, y).with_button(button);
                route_pointer_down(engine, input, &self.config.render);
            }
            ScriptEvent::PointerMove { x, y, dx, dy } => {
                engine.pointer_move(PointerInput::at(x, y).with_movement(dx, dy));
            }
            ScriptEvent::PointerUp { x, y, button } => {
                engine.pointer_up(PointerInput::at(x, y).with_button(button));
            }
            ScriptEvent::PointerLeave => engine.pointer_leave(),
            ScriptEvent::Wheel { dx, dy } => engine.wheel(Vec2::new(dx, dy)),
            ScriptEvent::Key(key) => {
                if let Some(effect) = engine.key_down(&key) {
                    self.handle_effect(effect)?;
                }
            }
            ScriptEvent::Insert { layer_type } => engine.start_inserting(layer_type),
            ScriptEvent::Pan => engine.start_panning(),
            ScriptEvent::RelationType { relation_type } => engine.set_relation_type(relation_type),
            ScriptEvent::Link { entity_id, anchor } => engine.start_linking(entity_id, anchor),
            ScriptEvent::Cancel => engine.cancel(),
            ScriptEvent::ZoomIn => {
                engine.zoom_in();
            }
            ScriptEvent::ZoomOut => {
                engine.zoom_out();
            }
            ScriptEvent::Undo => {
                engine.undo();
            }
            ScriptEvent::Redo => {
                engine.redo();
            }
            ScriptEvent::Export => {
                let effect = engine.export_json()?;
                self.handle_effect(effect)?;
            }
            ScriptEvent::Import => self.handle_effect(EngineEffect::OpenImportPicker)?,
            ScriptEvent::Select { id } => engine.select_layer(&id),
            ScriptEvent::SelectAll => engine.select_all(),
            ScriptEvent::Unselect => engine.unselect(),
            ScriptEvent::Delete => engine.delete_selected(),
            ScriptEvent::UpdateEntity { id, patch } => engine.update_entity(&id, patch),
            ScriptEvent::UpdateRelation { id, patch } => engine.update_relation(&id, patch),
            ScriptEvent::AddAttribute { id } => engine.add_attribute(&id),
            ScriptEvent::UpdateAttribute {
                id,
                attribute_id,
                patch,
            } => engine.update_attribute(&id, &attribute_id, patch),
            ScriptEvent::DeleteAttribute { id, attribute_id } => engine.delete_attribute(&id, &attribute_id),
            ScriptEvent::Rename { name } => engine.rename_document(&name)?,
            ScriptEvent::Render => {
                let commands = self.render_frame()?.len();
                log::debug!("Rendered {commands} draw commands");
            }
        }
        Ok(())
    }

    /// Perform work the engine handed back.
    ///
    /// A rejected import file is reported and leaves the document as it was,
    /// like a browser alert would.
    pub fn handle_effect(&mut self, effect: EngineEffect) -> AppResult<()> {
        match effect {
            EngineEffect::ExportRequested { file_name, json } => {
                let dir = &self.config.export_dir;
                fs::create_dir_all(dir).map_err(|source| AppError::Io {
                    path: dir.clone(),
                    source,
                })?;
                let safe_name: String = file_name
                    .chars()
                    .map(|c| if c == '/' || c == '\\' { '_' } else { c })
                    .collect();
                let path = dir.join(safe_name);
                write_file(&path, &json)?;
                log::info!("Exported to {}", path.display());
                self.exports.push(path);
            }
            EngineEffect::OpenImportPicker => {
                let Some(path) = self.config.import_file.clone() else {
                    log::warn!("Import requested but no import file is configured");
                    return Ok(());
                };
                let json = read_file(&path)?;
                if let Err(e) = self.engine.import_json(&json) {
                    log::error!("Error importing {}: {e}", path.display());
                }
            }
        }
        Ok(())
    }

    /// Build the display list for the current frame.
    pub fn render_frame(&mut self) -> AppResult<&Scene> {
        let ctx = RenderContext::new(&self.engine, self.config.viewport).with_config(self.config.render.clone());
        self.renderer.build_scene(&ctx)?;
        Ok(self.renderer.scene())
    }

    pub fn layer_count(&self) -> usize {
        self.engine.store().layer_ids().len()
    }
}
