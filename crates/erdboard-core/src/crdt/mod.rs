//! CRDT integration using Loro for collaborative editing.
//!
//! # Schema
//!
//! ```text
//! LoroDoc
//! ├── "name": LoroText (document name)
//! ├── "layers": LoroMap<LayerId, LoroMap> (layer data)
//! ├── "layer_ids": LoroList<String> (layer ids in list order)
//! └── "meta": LoroMap
//!     └── "project_config": String (JSON record, replaced as a whole)
//! ```
//!
//! Each layer in "layers" is a LoroMap with:
//! - "type": String ("entity" or "relation")
//! - entity fields: "x", "y", "width", "height", "name", "opacity" and
//!   "attributes", a LoroList of LoroMaps (`id`, `name`, `type`, `required`, `pk`)
//! - relation fields: "sourceId", "targetId", "relationType", "sourceCard",
//!   "targetCard", "owningSide", "opacity"

mod convert;
mod schema;

pub use convert::{layer_from_loro, layer_to_loro};
pub use schema::{
    CrdtStore, DEFAULT_MAX_UNDO_STEPS, LAYER_IDS_KEY, LAYERS_KEY, META_KEY, NAME_KEY,
};

pub use loro::VersionVector;
