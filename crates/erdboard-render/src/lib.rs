//! erdboard render library
//!
//! Turns a [`CanvasEngine`](erdboard_core::CanvasEngine) frame into a
//! backend-agnostic display list, and maps pointer presses back onto the
//! layer or handle they hit.

mod display;
pub mod hit;
pub mod layers;
mod renderer;
pub mod scene;

pub use display::{DisplayListRenderer, diagram_bounds};
pub use hit::{HitTarget, dispatch_pointer_down, hit_test, route_pointer_down};
pub use renderer::{RenderConfig, RenderContext, RenderResult, Renderer, RendererError};
pub use scene::{DrawCommand, Paint, Primitive, Scene, Space, StrokeStyle};
