//! Per-layer visual geometry: entity boxes and relation edges.
//!
//! These are pure functions of the snapshot; drawing and hit testing both
//! build on them so what is hit is exactly what is drawn.

use erdboard_core::geometry::{Anchor, anchor_point};
use erdboard_core::layer::{Attribute, Cardinality, EntityLayer, LayerId, RelationLayer, RelationType};
use erdboard_core::store::DiagramSnapshot;
use kurbo::{Point, Rect, Vec2};

/// Text shown for one attribute row.
pub fn attribute_label(attribute: &Attribute) -> String {
    let mut label = format!("{}: {}", attribute.name, attribute.data_type);
    if attribute.required && !attribute.pk {
        label.push_str(" *");
    }
    label
}

/// Row layout of an entity box.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityView {
    pub bounds: Rect,
    pub header: Rect,
    pub title: String,
    /// One row per attribute: its label, whether it is a key, and its rect.
    pub rows: Vec<(String, bool, Rect)>,
}

impl EntityView {
    /// Rows that do not fit inside the entity's height are dropped.
    pub fn new(entity: &EntityLayer, header_height: f64, row_height: f64) -> Self {
        let bounds = entity.bounds();
        let header = Rect::new(bounds.x0, bounds.y0, bounds.x1, (bounds.y0 + header_height).min(bounds.y1));
        let rows = entity
            .attributes
            .iter()
            .enumerate()
            .map(|(i, attr)| {
                let y0 = header.y1 + i as f64 * row_height;
                (
                    attribute_label(attr),
                    attr.pk,
                    Rect::new(bounds.x0, y0, bounds.x1, y0 + row_height),
                )
            })
            .take_while(|(_, _, rect)| rect.y1 <= bounds.y1)
            .collect();
        Self {
            bounds,
            header,
            title: entity.name.clone(),
            rows,
        }
    }
}

/// The anchor pair giving the shortest connector between two boxes.
pub fn nearest_anchors(from: Rect, to: Rect) -> (Anchor, Anchor) {
    let mut best = (Anchor::Right, Anchor::Left);
    let mut best_dist = f64::INFINITY;
    for a in Anchor::ALL {
        for b in Anchor::ALL {
            let d = anchor_point(from, a).distance(anchor_point(to, b));
            if d < best_dist {
                best_dist = d;
                best = (a, b);
            }
        }
    }
    best
}

/// Resolved geometry of a relation edge.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationView {
    pub id: LayerId,
    pub from: Point,
    pub to: Point,
    pub relation_type: RelationType,
    pub source_label: &'static str,
    pub target_label: &'static str,
}

impl RelationView {
    /// Geometry for `relation`, or `None` if either endpoint is missing or
    /// not an entity.
    pub fn resolve(snapshot: &DiagramSnapshot, id: &str, relation: &RelationLayer) -> Option<Self> {
        if snapshot.is_dangling(relation) {
            return None;
        }
        let source = snapshot.get(&relation.source_id)?.bounds()?;
        let target = snapshot.get(&relation.target_id)?.bounds()?;
        let (a, b) = nearest_anchors(source, target);
        Some(Self {
            id: id.to_string(),
            from: anchor_point(source, a),
            to: anchor_point(target, b),
            relation_type: relation.relation_type,
            source_label: cardinality_label(relation.source_card),
            target_label: cardinality_label(relation.target_card),
        })
    }

    /// Realizations and dependencies are drawn dashed.
    pub fn is_dashed(&self) -> bool {
        matches!(
            self.relation_type,
            RelationType::Realization | RelationType::Dependency
        )
    }

    /// Distance from `point` to the edge segment.
    pub fn distance_to(&self, point: Point) -> f64 {
        segment_distance(self.from, self.to, point)
    }

    /// Marker shapes at each end, in canvas coordinates.
    pub fn markers(&self, size: f64) -> Vec<Marker> {
        let mut markers = Vec::new();
        match self.relation_type {
            RelationType::Association => {}
            RelationType::Aggregation => markers.push(Marker::Diamond {
                points: diamond(self.from, self.to, size),
                filled: false,
            }),
            RelationType::Composition => markers.push(Marker::Diamond {
                points: diamond(self.from, self.to, size),
                filled: true,
            }),
            RelationType::Generalization | RelationType::Realization => {
                markers.push(Marker::Triangle(triangle(self.to, self.from, size)))
            }
            RelationType::Dependency => markers.push(Marker::OpenArrow(triangle(self.to, self.from, size))),
        }
        markers
    }
}

fn cardinality_label(card: Cardinality) -> &'static str {
    match card {
        Cardinality::One => "1",
        Cardinality::Many => "*",
    }
}

/// End decoration of a relation edge.
#[derive(Debug, Clone, PartialEq)]
pub enum Marker {
    /// Aggregation (hollow) or composition (filled), at the source end.
    Diamond { points: [Point; 4], filled: bool },
    /// Hollow triangle at the target end: `[left, tip, right]`.
    Triangle([Point; 3]),
    /// Two strokes meeting at the target: `[left, tip, right]`.
    OpenArrow([Point; 3]),
}

/// Unit vector from `from` towards `to`, or zero for coincident points.
fn direction(from: Point, to: Point) -> Vec2 {
    let v = to - from;
    let len = v.hypot();
    if len < f64::EPSILON { Vec2::ZERO } else { v / len }
}

/// Arrowhead with its tip at `tip`, pointing away from `tail`.
fn triangle(tip: Point, tail: Point, size: f64) -> [Point; 3] {
    let back = direction(tip, tail);
    let normal = Vec2::new(-back.y, back.x);
    let base = tip + back * size;
    [base + normal * (size / 2.0), tip, base - normal * (size / 2.0)]
}

/// Diamond starting at `start` and extending towards `toward`.
fn diamond(start: Point, toward: Point, size: f64) -> [Point; 4] {
    let dir = direction(start, toward);
    let normal = Vec2::new(-dir.y, dir.x);
    let mid = start + dir * (size / 2.0);
    [
        start,
        mid + normal * (size / 3.0),
        start + dir * size,
        mid - normal * (size / 3.0),
    ]
}

fn segment_distance(a: Point, b: Point, p: Point) -> f64 {
    let ab = b - a;
    let len2 = ab.hypot2();
    if len2 < f64::EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}
