//! Interaction modes of the canvas.

use kurbo::{Point, Rect};

use crate::geometry::{Anchor, Side};
use crate::layer::{LayerId, LayerType, RelationType};

/// The gesture currently in progress. Exactly one is active at a time.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CanvasState {
    /// Idle.
    #[default]
    None,
    /// Pressed on empty canvas, not yet moved past the drag threshold.
    Pressing { origin: Point },
    /// Marquee selection spanning `origin` to `current`.
    SelectionNet { origin: Point, current: Point },
    /// Dragging the selected entities; `current` is the last canvas point.
    Translating { current: Point },
    /// Resizing the first selected entity from `side`, with the bounds it
    /// had when the gesture started.
    Resizing { initial_bounds: Rect, side: Side },
    /// Panning the camera. `origin` is `None` while armed but not pressed.
    Dragging { origin: Option<Point> },
    /// The next release on the canvas creates a layer of this type.
    Inserting { layer_type: LayerType },
    /// Drawing a relation from an anchor of `from_entity_id`.
    Linking {
        from_entity_id: LayerId,
        from_anchor: Anchor,
        relation_type: RelationType,
        /// Live pointer position for the preview line.
        current: Option<Point>,
    },
    /// A context-menu press on a layer; swallows the following release.
    RightClick,
}

impl CanvasState {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            CanvasState::None => "none",
            CanvasState::Pressing { .. } => "pressing",
            CanvasState::SelectionNet { .. } => "selection_net",
            CanvasState::Translating { .. } => "translating",
            CanvasState::Resizing { .. } => "resizing",
            CanvasState::Dragging { .. } => "dragging",
            CanvasState::Inserting { .. } => "inserting",
            CanvasState::Linking { .. } => "linking",
            CanvasState::RightClick => "right_click",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, CanvasState::None)
    }

    pub fn is_linking(&self) -> bool {
        matches!(self, CanvasState::Linking { .. })
    }

    /// Marquee rectangle while selecting.
    pub fn selection_net(&self) -> Option<Rect> {
        match self {
            CanvasState::SelectionNet { origin, current } => Some(Rect::from_points(*origin, *current)),
            _ => Option::None,
        }
    }
}
