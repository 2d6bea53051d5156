//! Input scripts: one JSON event per line.
//!
//! ```text
//! {"type": "insert", "layer_type": "entity"}
//! {"type": "pointer_up", "x": 120, "y": 80}
//! {"type": "key", "key": "s", "modifiers": {"ctrl": true}}
//! ```

use erdboard_core::geometry::Anchor;
use erdboard_core::input::{KeyInput, MouseButton};
use erdboard_core::layer::{AttributePatch, EntityPatch, LayerType, RelationPatch, RelationType};
use serde::{Deserialize, Serialize};

use crate::app::{AppError, AppResult};

/// A single host event, in screen coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptEvent {
    // === Pointer ===
    PointerDown {
        x: f64,
        y: f64,
        #[serde(default)]
        button: MouseButton,
    },
    PointerMove {
        x: f64,
        y: f64,
        /// Raw movement since the previous event; used while panning.
        #[serde(default)]
        dx: f64,
        #[serde(default)]
        dy: f64,
    },
    PointerUp {
        x: f64,
        y: f64,
        #[serde(default)]
        button: MouseButton,
    },
    PointerLeave,
    Wheel { dx: f64, dy: f64 },
    Key(KeyInput),

    // === Toolbar ===
    Insert { layer_type: LayerType },
    Pan,
    RelationType { relation_type: RelationType },
    /// Press on a link handle of an entity.
    Link { entity_id: String, anchor: Anchor },
    Cancel,
    ZoomIn,
    ZoomOut,
    Undo,
    Redo,
    Export,
    Import,

    // === Sidebar ===
    Select { id: String },
    SelectAll,
    Unselect,
    Delete,
    UpdateEntity { id: String, patch: EntityPatch },
    UpdateRelation { id: String, patch: RelationPatch },
    AddAttribute { id: String },
    UpdateAttribute {
        id: String,
        attribute_id: String,
        patch: AttributePatch,
    },
    DeleteAttribute { id: String, attribute_id: String },
    Rename { name: String },

    /// Build a frame's display list.
    Render,
}

/// Parse a script. Blank lines and lines starting with `#` are skipped.
pub fn parse_script(source: &str) -> AppResult<Vec<ScriptEvent>> {
    source
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| AppError::Script { line: i + 1, source })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_script() {
        let source = r#"
# create an entity
{"type": "insert", "layer_type": "entity"}
{"type": "pointer_up", "x": 120, "y": 80}

{"type": "key", "key": "z", "modifiers": {"ctrl": true}}
{"type": "update_attribute", "id": "a", "attribute_id": "f", "patch": {"type": "int", "pk": true}}
"#;
        let events = parse_script(source).unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(
            events[0],
            ScriptEvent::Insert {
                layer_type: LayerType::Entity
            }
        );
        assert_eq!(
            events[1],
            ScriptEvent::PointerUp {
                x: 120.0,
                y: 80.0,
                button: MouseButton::Left
            }
        );
        assert_eq!(events[2], ScriptEvent::Key(KeyInput::new("z").with_command()));
        let ScriptEvent::UpdateAttribute { patch, .. } = &events[3] else {
            panic!("expected update_attribute");
        };
        assert_eq!(patch.data_type.as_deref(), Some("int"));
        assert_eq!(patch.pk, Some(true));
    }

    #[test]
    fn test_parse_error_reports_line() {
        let err = parse_script("{\"type\": \"pan\"}\n\n{\"type\": \"teleport\"}").unwrap_err();
        assert!(matches!(err, AppError::Script { line: 3, .. }));
    }
}
