//! Retained display list.
//!
//! A [`Scene`] is a flat list of drawing commands that any 2D backend can
//! replay. Commands in [`Space::Canvas`] are drawn through the scene's camera
//! transform; [`Space::Screen`] commands are drawn as-is.

use kurbo::{Affine, Point, Rect};
use peniko::Color;

/// Coordinate space a command is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Space {
    Canvas,
    Screen,
}

/// Geometry of a single command.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Rect { rect: Rect, radius: f64 },
    Line { from: Point, to: Point },
    /// Closed polygon.
    Polygon(Vec<Point>),
    Circle { center: Point, radius: f64 },
    /// Single line of text; `origin` is the left end of the baseline.
    Text {
        origin: Point,
        text: String,
        size: f64,
        bold: bool,
    },
}

/// Stroke parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub width: f64,
    /// Dash and gap lengths, if dashed.
    pub dash: Option<[f64; 2]>,
}

impl StrokeStyle {
    pub fn new(width: f64) -> Self {
        Self { width, dash: None }
    }

    pub fn with_dashes(mut self, dash: f64, gap: f64) -> Self {
        self.dash = Some([dash, gap]);
        self
    }
}

/// How a primitive is painted.
#[derive(Debug, Clone, Copy)]
pub enum Paint {
    Fill(Color),
    Stroke(Color, StrokeStyle),
}

#[derive(Debug, Clone)]
pub struct DrawCommand {
    pub space: Space,
    pub primitive: Primitive,
    pub paint: Paint,
}

/// One frame's worth of drawing commands.
#[derive(Debug, Clone)]
pub struct Scene {
    background: Color,
    transform: Affine,
    commands: Vec<DrawCommand>,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            background: Color::WHITE,
            transform: Affine::IDENTITY,
            commands: Vec::new(),
        }
    }
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all commands and start a new frame.
    pub fn reset(&mut self, background: Color, transform: Affine) {
        self.background = background;
        self.transform = transform;
        self.commands.clear();
    }

    pub fn background(&self) -> Color {
        self.background
    }

    /// Canvas to screen transform for [`Space::Canvas`] commands.
    pub fn transform(&self) -> Affine {
        self.transform
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn fill(&mut self, space: Space, primitive: Primitive, color: Color) {
        self.commands.push(DrawCommand {
            space,
            primitive,
            paint: Paint::Fill(color),
        });
    }

    pub fn stroke(&mut self, space: Space, primitive: Primitive, style: StrokeStyle, color: Color) {
        self.commands.push(DrawCommand {
            space,
            primitive,
            paint: Paint::Stroke(color, style),
        });
    }

    pub fn text(&mut self, space: Space, origin: Point, text: impl Into<String>, size: f64, bold: bool, color: Color) {
        self.fill(
            space,
            Primitive::Text {
                origin,
                text: text.into(),
                size,
                bold,
            },
            color,
        );
    }

    /// Text commands, in draw order. Handy for assertions.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|c| match &c.primitive {
            Primitive::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}
