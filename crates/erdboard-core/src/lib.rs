//! erdboard core library
//!
//! Platform-agnostic model and interaction engine for the collaborative
//! entity-relationship canvas.

pub mod camera;
pub mod canvas;
pub mod config;
pub mod crdt;
pub mod exchange;
pub mod generate;
pub mod geometry;
pub mod input;
pub mod layer;
pub mod presence;
pub mod selection;
pub mod store;
pub mod sync;

pub use camera::Camera;
pub use canvas::{CanvasEngine, CanvasState, EngineEffect};
pub use config::{ConfigError, EngineConfig, ProjectConfig};
pub use crdt::CrdtStore;
pub use exchange::{ExchangeError, ExportEnvelope};
pub use generate::{CodeGenerator, DiagramGenerator, GenerateOptions, GenerationError, GenerationInput};
pub use geometry::{Anchor, Side};
pub use input::{Command, KeyInput, Modifiers, MouseButton, PointerInput, ShortcutRegistry};
pub use layer::{Attribute, EntityLayer, Layer, LayerId, LayerType, RelationLayer, RelationType};
pub use presence::{Member, Presence, UserInfo};
pub use store::{DiagramSnapshot, DiagramStore, Mutation, StoreError};
pub use sync::{ClientMessage, ServerMessage, SyncEvent, SyncSession};
