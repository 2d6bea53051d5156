//! Renderer trait abstraction.

use erdboard_core::canvas::{CanvasEngine, CanvasState};
use erdboard_core::presence::Member;
use erdboard_core::store::{DiagramSnapshot, DiagramStore};
use erdboard_core::{Camera, LayerId};
use kurbo::Size;
use peniko::Color;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Invalid viewport: {width}x{height}")]
    InvalidViewport { width: f64, height: f64 },
    #[error("Nothing to render: the diagram has no entities")]
    EmptyDiagram,
    #[error("Render failed: {0}")]
    RenderFailed(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Colors and metrics used to draw a diagram.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub background_color: Color,
    pub entity_fill: Color,
    pub entity_stroke: Color,
    pub header_fill: Color,
    pub text_color: Color,
    pub muted_text_color: Color,
    pub relation_color: Color,
    pub selection_color: Color,
    pub link_preview_color: Color,
    pub net_fill: Color,
    pub net_stroke: Color,
    /// Entity header band height, in canvas units.
    pub header_height: f64,
    /// Height of one attribute row, in canvas units.
    pub row_height: f64,
    pub font_size: f64,
    pub padding: f64,
    pub corner_radius: f64,
    /// Length of relation end markers, in canvas units.
    pub marker_size: f64,
    /// Handle size in screen pixels.
    pub handle_size: f64,
    /// Distance between an entity edge and its link handle, in screen pixels.
    pub link_handle_offset: f64,
    /// Pointer slop for handles and relation edges, in screen pixels.
    pub hit_tolerance: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            background_color: Color::from_rgba8(250, 250, 250, 255),
            entity_fill: Color::WHITE,
            entity_stroke: Color::from_rgba8(148, 163, 184, 255),
            header_fill: Color::from_rgba8(241, 245, 249, 255),
            text_color: Color::from_rgba8(15, 23, 42, 255),
            muted_text_color: Color::from_rgba8(100, 116, 139, 255),
            relation_color: Color::from_rgba8(71, 85, 105, 255),
            selection_color: Color::from_rgba8(59, 130, 246, 255),
            link_preview_color: Color::from_rgba8(59, 130, 246, 255),
            net_fill: Color::from_rgba8(37, 99, 235, 13),
            net_stroke: Color::from_rgba8(37, 99, 235, 255),
            header_height: 32.0,
            row_height: 22.0,
            font_size: 14.0,
            padding: 10.0,
            corner_radius: 6.0,
            marker_size: 12.0,
            handle_size: erdboard_core::selection::HANDLE_SIZE,
            link_handle_offset: 16.0,
            hit_tolerance: erdboard_core::selection::HANDLE_HIT_TOLERANCE,
        }
    }
}

/// Everything a renderer needs for one frame.
pub struct RenderContext<'a> {
    /// Copy of the document taken for this frame.
    pub snapshot: DiagramSnapshot,
    pub state: &'a CanvasState,
    pub camera: &'a Camera,
    /// Own selection.
    pub selection: &'a [LayerId],
    /// Remote collaborators, for their cursors and selections.
    pub others: &'a [Member],
    /// Viewport size in physical pixels.
    pub viewport_size: Size,
    /// Device pixel ratio (for HiDPI).
    pub scale_factor: f64,
    pub config: RenderConfig,
}

impl<'a> RenderContext<'a> {
    /// Create a render context for the engine's current frame.
    pub fn new<S: DiagramStore>(engine: &'a CanvasEngine<S>, viewport_size: Size) -> Self {
        let store = engine.store();
        Self {
            snapshot: store.snapshot(),
            state: engine.state(),
            camera: engine.camera(),
            selection: store.selection(),
            others: store.others(),
            viewport_size,
            scale_factor: 1.0,
            config: RenderConfig::default(),
        }
    }

    /// Set the scale factor for HiDPI.
    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    pub fn with_config(mut self, config: RenderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn zoom(&self) -> f64 {
        self.camera.zoom()
    }

    /// Convert a length in screen pixels to canvas units at the current zoom.
    pub fn screen_len(&self, pixels: f64) -> f64 {
        pixels / self.camera.zoom()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selection.iter().any(|s| s == id)
    }

    /// The selected entity, when exactly one layer is selected and it is an
    /// entity.
    pub fn single_selected_entity(&self) -> Option<(&LayerId, kurbo::Rect)> {
        match self.selection {
            [id] => self.snapshot.get(id)?.bounds().map(|b| (id, b)),
            _ => None,
        }
    }
}

/// Trait for rendering backends.
pub trait Renderer {
    /// Build the drawing commands for a frame.
    fn build_scene(&mut self, ctx: &RenderContext) -> RenderResult<()>;

    /// Get the background color (for clearing).
    fn background_color(&self, ctx: &RenderContext) -> Color {
        ctx.config.background_color
    }
}
