//! Marquee selection and the handles drawn around a selected entity.

use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

use crate::geometry::{Anchor, Side, anchor_point, marquee_rect, rects_overlap};
use crate::layer::{Layer, LayerId};
use crate::store::DiagramSnapshot;

/// Handle size in screen pixels.
pub const HANDLE_SIZE: f64 = 8.0;
/// Handle hit tolerance in screen pixels.
pub const HANDLE_HIT_TOLERANCE: f64 = 10.0;

/// Type of handle around a selected entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandleKind {
    /// Resize handle at a corner or edge midpoint.
    Resize(Side),
    /// Link anchor that starts drawing a relation.
    Link(Anchor),
}

/// A handle with its position in canvas coordinates.
#[derive(Debug, Clone, Copy)]
pub struct Handle {
    pub position: Point,
    pub kind: HandleKind,
}

impl Handle {
    pub fn new(position: Point, kind: HandleKind) -> Self {
        Self { position, kind }
    }

    /// Check if a canvas point hits this handle. `tolerance` is in canvas
    /// units, so callers divide the screen tolerance by the zoom.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        let dx = point.x - self.position.x;
        let dy = point.y - self.position.y;
        dx * dx + dy * dy <= tolerance * tolerance
    }
}

/// Resize handles for an entity's bounds.
pub fn resize_handles(bounds: Rect) -> Vec<Handle> {
    Side::ALL
        .into_iter()
        .map(|side| Handle::new(side.position(bounds), HandleKind::Resize(side)))
        .collect()
}

/// Link anchors for an entity's bounds.
pub fn link_handles(bounds: Rect) -> Vec<Handle> {
    Anchor::ALL
        .into_iter()
        .map(|anchor| Handle::new(anchor_point(bounds, anchor), HandleKind::Link(anchor)))
        .collect()
}

/// Ids of the entities whose bounds overlap the marquee from `origin` to
/// `current`, in list order. Relations never participate.
pub fn find_intersecting_layers(
    snapshot: &DiagramSnapshot,
    origin: Point,
    current: Point,
) -> Vec<LayerId> {
    let rect = marquee_rect(origin, current);
    snapshot
        .ordered()
        .filter_map(|(id, layer)| match layer {
            Layer::Entity(e) if rects_overlap(e.bounds(), rect) => Some(id.clone()),
            _ => None,
        })
        .collect()
}

/// Union of the bounds of the selected entities, if any.
pub fn selection_bounds(snapshot: &DiagramSnapshot, selection: &[LayerId]) -> Option<Rect> {
    selection
        .iter()
        .filter_map(|id| snapshot.get(id)?.bounds())
        .reduce(|acc, r| acc.union(r))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{EntityLayer, RelationLayer, RelationType};

    fn fixture() -> DiagramSnapshot {
        let mut snap = DiagramSnapshot::default();
        let boxes = [
            ("far", Rect::new(500.0, 500.0, 600.0, 600.0)),
            ("partial", Rect::new(80.0, 80.0, 180.0, 180.0)),
            ("inside", Rect::new(120.0, 120.0, 140.0, 140.0)),
        ];
        for (id, r) in boxes {
            let e = EntityLayer::with_defaults(r.origin(), r.width(), r.height());
            snap.layers.insert(id.into(), Layer::Entity(e));
            snap.layer_ids.push(id.into());
        }
        snap.layers.insert(
            "rel".into(),
            Layer::Relation(RelationLayer::new("partial", "inside", RelationType::Association)),
        );
        snap.layer_ids.push("rel".into());
        snap
    }

    #[test]
    fn test_marquee_hits_partial_and_contained() {
        let snap = fixture();
        let ids = find_intersecting_layers(&snap, Point::new(100.0, 100.0), Point::new(200.0, 200.0));
        assert_eq!(ids, vec!["partial".to_string(), "inside".to_string()]);
    }

    #[test]
    fn test_marquee_direction_does_not_matter() {
        let snap = fixture();
        let a = find_intersecting_layers(&snap, Point::new(100.0, 100.0), Point::new(200.0, 200.0));
        let b = find_intersecting_layers(&snap, Point::new(200.0, 200.0), Point::new(100.0, 100.0));
        assert_eq!(a, b);
    }

    #[test]
    fn test_marquee_empty_region() {
        let snap = fixture();
        let ids = find_intersecting_layers(&snap, Point::new(300.0, 300.0), Point::new(400.0, 400.0));
        assert!(ids.is_empty());
    }

    #[test]
    fn test_marquee_touching_edge_counts() {
        let snap = fixture();
        let ids = find_intersecting_layers(&snap, Point::new(600.0, 600.0), Point::new(700.0, 700.0));
        assert_eq!(ids, vec!["far".to_string()]);
    }

    #[test]
    fn test_handles() {
        let r = Rect::new(0.0, 0.0, 100.0, 50.0);
        assert_eq!(resize_handles(r).len(), 8);
        let links = link_handles(r);
        let right = links
            .iter()
            .find(|h| h.kind == HandleKind::Link(Anchor::Right))
            .unwrap();
        assert_eq!(right.position, Point::new(100.0, 25.0));
        assert!(right.hit_test(Point::new(103.0, 25.0), 5.0));
        assert!(!right.hit_test(Point::new(110.0, 25.0), 5.0));
    }

    #[test]
    fn test_selection_bounds_skips_relations() {
        let snap = fixture();
        let sel = vec!["partial".to_string(), "inside".to_string(), "rel".to_string()];
        assert_eq!(selection_bounds(&snap, &sel), Some(Rect::new(80.0, 80.0, 180.0, 180.0)));
        assert_eq!(selection_bounds(&snap, &["rel".to_string()]), None);
    }
}
