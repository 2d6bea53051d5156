//! Pure geometry helpers shared by the engine and the renderer.
//!
//! Everything here is a free function over explicit parameters so it can be
//! tested without a document or an engine.

use kurbo::{Point, Rect};
use peniko::Color;
use serde::{Deserialize, Serialize};

/// One of the eight resize handles around an entity's bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Side {
    /// All handles, in clockwise order starting from the top-left corner.
    pub const ALL: [Side; 8] = [
        Side::TopLeft,
        Side::Top,
        Side::TopRight,
        Side::Right,
        Side::BottomRight,
        Side::Bottom,
        Side::BottomLeft,
        Side::Left,
    ];

    /// Which horizontal edge this handle drags: `Some(true)` for the left
    /// edge, `Some(false)` for the right edge, `None` if x is untouched.
    fn drags_left(self) -> Option<bool> {
        match self {
            Side::Left | Side::TopLeft | Side::BottomLeft => Some(true),
            Side::Right | Side::TopRight | Side::BottomRight => Some(false),
            Side::Top | Side::Bottom => None,
        }
    }

    /// Same as [`Side::drags_left`] for the vertical axis.
    fn drags_top(self) -> Option<bool> {
        match self {
            Side::Top | Side::TopLeft | Side::TopRight => Some(true),
            Side::Bottom | Side::BottomLeft | Side::BottomRight => Some(false),
            Side::Left | Side::Right => None,
        }
    }

    /// Position of this handle on the given bounds.
    pub fn position(self, bounds: Rect) -> Point {
        let cx = bounds.center().x;
        let cy = bounds.center().y;
        let x = match self.drags_left() {
            Some(true) => bounds.x0,
            Some(false) => bounds.x1,
            None => cx,
        };
        let y = match self.drags_top() {
            Some(true) => bounds.y0,
            Some(false) => bounds.y1,
            None => cy,
        };
        Point::new(x, y)
    }
}

/// Connection point on an entity used as the origin of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    Left,
    Right,
    Top,
    Bottom,
}

impl Anchor {
    pub const ALL: [Anchor; 4] = [Anchor::Left, Anchor::Right, Anchor::Top, Anchor::Bottom];
}

/// Resolve an anchor to its point on the given bounds.
pub fn anchor_point(bounds: Rect, anchor: Anchor) -> Point {
    let mid_x = bounds.x0 + bounds.width() / 2.0;
    let mid_y = bounds.y0 + bounds.height() / 2.0;
    match anchor {
        Anchor::Left => Point::new(bounds.x0, mid_y),
        Anchor::Right => Point::new(bounds.x1, mid_y),
        Anchor::Top => Point::new(mid_x, bounds.y0),
        Anchor::Bottom => Point::new(mid_x, bounds.y1),
    }
}

/// Resize one axis. `drags_low` tells whether the low edge is the one being
/// dragged; the other edge stays fixed.
fn resize_axis(lo: f64, hi: f64, drags_low: Option<bool>, p: f64, min_size: f64) -> (f64, f64) {
    let Some(drags_low) = drags_low else {
        return (lo, hi);
    };
    let anchor = if drags_low { hi } else { lo };
    let extent = (p - anchor).abs().max(min_size);
    if p < anchor {
        (anchor - extent, anchor)
    } else {
        (anchor, anchor + extent)
    }
}

/// Corner-anchored resize.
///
/// The edge(s) opposite `side` stay where they were in `initial`; the dragged
/// edge follows `point`. Dragging past the anchor flips the rectangle rather
/// than producing a negative size, and each affected dimension is floored at
/// `min_size`.
pub fn resize_bounds(initial: Rect, side: Side, point: Point, min_size: f64) -> Rect {
    let (x0, x1) = resize_axis(initial.x0, initial.x1, side.drags_left(), point.x, min_size);
    let (y0, y1) = resize_axis(initial.y0, initial.y1, side.drags_top(), point.y, min_size);
    Rect::new(x0, y0, x1, y1)
}

/// Inclusive axis-aligned overlap test: touching edges count as overlap.
pub fn rects_overlap(a: Rect, b: Rect) -> bool {
    !(a.x1 < b.x0 || a.x0 > b.x1 || a.y1 < b.y0 || a.y0 > b.y1)
}

/// Normalized rectangle spanned by a drag from `origin` to `current`.
pub fn marquee_rect(origin: Point, current: Point) -> Rect {
    Rect::from_points(origin, current)
}

/// Manhattan distance between two points.
pub fn manhattan(a: Point, b: Point) -> f64 {
    (a.x - b.x).abs() + (a.y - b.y).abs()
}

const PRESENCE_PALETTE: [Color; 8] = [
    Color::from_rgb8(0xDC, 0x26, 0x26),
    Color::from_rgb8(0xD9, 0x77, 0x06),
    Color::from_rgb8(0x05, 0x96, 0x69),
    Color::from_rgb8(0x7C, 0x3A, 0xED),
    Color::from_rgb8(0xDB, 0x27, 0x77),
    Color::from_rgb8(0x25, 0x63, 0xEB),
    Color::from_rgb8(0x08, 0x91, 0xB2),
    Color::from_rgb8(0x65, 0xA3, 0x0D),
];

/// Stable color for a collaborator's connection id.
pub fn connection_id_to_color(connection_id: u64) -> Color {
    PRESENCE_PALETTE[(connection_id % PRESENCE_PALETTE.len() as u64) as usize]
}
