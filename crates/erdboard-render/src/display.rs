//! Renderer that records a [`Scene`] display list.

use erdboard_core::canvas::CanvasState;
use erdboard_core::geometry::{Anchor, anchor_point, connection_id_to_color};
use erdboard_core::layer::Layer;
use erdboard_core::selection::{resize_handles, selection_bounds};
use erdboard_core::store::DiagramSnapshot;
use kurbo::{Point, Rect, Vec2};
use peniko::Color;

use crate::hit::link_handle_position;
use crate::layers::{EntityView, Marker, RelationView};
use crate::renderer::{RenderConfig, RenderContext, RenderResult, Renderer, RendererError};
use crate::scene::{Primitive, Scene, Space, StrokeStyle};

/// Draws diagrams into a backend-agnostic [`Scene`].
#[derive(Debug, Default)]
pub struct DisplayListRenderer {
    scene: Scene,
    /// Current zoom, used to keep strokes and handles a constant screen size.
    zoom: f64,
}

impl DisplayListRenderer {
    pub fn new() -> Self {
        Self {
            scene: Scene::new(),
            zoom: 1.0,
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn take_scene(&mut self) -> Scene {
        std::mem::take(&mut self.scene)
    }

    /// Screen pixels to canvas units.
    fn px(&self, pixels: f64) -> f64 {
        pixels / self.zoom
    }

    fn render_entity(&mut self, view: &EntityView, config: &RenderConfig) {
        let body = Primitive::Rect {
            rect: view.bounds,
            radius: config.corner_radius,
        };
        self.scene.fill(Space::Canvas, body.clone(), config.entity_fill);
        self.scene.fill(
            Space::Canvas,
            Primitive::Rect {
                rect: view.header,
                radius: config.corner_radius,
            },
            config.header_fill,
        );
        self.scene.stroke(
            Space::Canvas,
            body,
            StrokeStyle::new(self.px(1.0)),
            config.entity_stroke,
        );
        self.scene.stroke(
            Space::Canvas,
            Primitive::Line {
                from: Point::new(view.header.x0, view.header.y1),
                to: Point::new(view.header.x1, view.header.y1),
            },
            StrokeStyle::new(self.px(1.0)),
            config.entity_stroke,
        );

        let baseline = (view.header.height() + config.font_size) / 2.0;
        self.scene.text(
            Space::Canvas,
            Point::new(view.header.x0 + config.padding, view.header.y0 + baseline),
            view.title.clone(),
            config.font_size,
            true,
            config.text_color,
        );

        let row_baseline = (config.row_height + config.font_size) / 2.0;
        for (label, is_key, rect) in &view.rows {
            let color = if *is_key {
                config.text_color
            } else {
                config.muted_text_color
            };
            self.scene.text(
                Space::Canvas,
                Point::new(rect.x0 + config.padding, rect.y0 + row_baseline),
                label.clone(),
                config.font_size,
                *is_key,
                color,
            );
        }
    }

    fn render_relation(&mut self, view: &RelationView, config: &RenderConfig) {
        let mut style = StrokeStyle::new(self.px(1.5));
        if view.is_dashed() {
            style = style.with_dashes(self.px(6.0), self.px(4.0));
        }
        self.scene.stroke(
            Space::Canvas,
            Primitive::Line {
                from: view.from,
                to: view.to,
            },
            style,
            config.relation_color,
        );

        let solid = StrokeStyle::new(self.px(1.5));
        for marker in view.markers(config.marker_size) {
            match marker {
                Marker::Diamond { points, filled } => {
                    let shape = Primitive::Polygon(points.to_vec());
                    let fill = if filled { config.relation_color } else { config.entity_fill };
                    self.scene.fill(Space::Canvas, shape.clone(), fill);
                    self.scene.stroke(Space::Canvas, shape, solid, config.relation_color);
                }
                Marker::Triangle(points) => {
                    let shape = Primitive::Polygon(points.to_vec());
                    self.scene.fill(Space::Canvas, shape.clone(), config.entity_fill);
                    self.scene.stroke(Space::Canvas, shape, solid, config.relation_color);
                }
                Marker::OpenArrow([left, tip, right]) => {
                    for from in [left, right] {
                        self.scene.stroke(
                            Space::Canvas,
                            Primitive::Line { from, to: tip },
                            solid,
                            config.relation_color,
                        );
                    }
                }
            }
        }

        // Cardinalities sit just off each end, on the left of the edge.
        let dir = view.to - view.from;
        let len = dir.hypot().max(f64::EPSILON);
        let along = dir / len * (config.marker_size + config.padding);
        let side = Vec2::new(dir.y, -dir.x) / len * config.padding;
        self.scene.text(
            Space::Canvas,
            view.from + along + side,
            view.source_label,
            config.font_size * 0.85,
            false,
            config.muted_text_color,
        );
        self.scene.text(
            Space::Canvas,
            view.to - along + side,
            view.target_label,
            config.font_size * 0.85,
            false,
            config.muted_text_color,
        );
    }

    fn render_handle_square(&mut self, center: Point, size: f64, color: Color) {
        let half = size / 2.0;
        let rect = Primitive::Rect {
            rect: Rect::new(center.x - half, center.y - half, center.x + half, center.y + half),
            radius: 0.0,
        };
        self.scene.fill(Space::Canvas, rect.clone(), Color::WHITE);
        self.scene.stroke(Space::Canvas, rect, StrokeStyle::new(self.px(1.5)), color);
    }

    fn render_handle_circle(&mut self, center: Point, size: f64, color: Color) {
        let circle = Primitive::Circle {
            center,
            radius: size / 2.0,
        };
        self.scene.fill(Space::Canvas, circle.clone(), Color::WHITE);
        self.scene.stroke(Space::Canvas, circle, StrokeStyle::new(self.px(2.0)), color);
    }

    /// Dashed box around the selection; handles only when a single entity is
    /// selected.
    fn render_selection(&mut self, ctx: &RenderContext) {
        let config = &ctx.config;
        let Some(bounds) = selection_bounds(&ctx.snapshot, ctx.selection) else {
            return;
        };
        self.scene.stroke(
            Space::Canvas,
            Primitive::Rect { rect: bounds, radius: 0.0 },
            StrokeStyle::new(self.px(1.0)).with_dashes(self.px(4.0), self.px(4.0)),
            config.selection_color,
        );

        let Some((_, bounds)) = ctx.single_selected_entity() else {
            return;
        };
        let size = self.px(config.handle_size);
        for handle in resize_handles(bounds) {
            self.render_handle_square(handle.position, size, config.selection_color);
        }
        if !ctx.state.is_linking() {
            let offset = self.px(config.link_handle_offset);
            for anchor in Anchor::ALL {
                let center = link_handle_position(bounds, anchor, offset);
                self.render_handle_circle(center, size, config.selection_color);
            }
        }
    }

    fn render_link_preview(&mut self, ctx: &RenderContext) {
        let CanvasState::Linking {
            from_entity_id,
            from_anchor,
            current: Some(current),
            ..
        } = ctx.state
        else {
            return;
        };
        let Some(bounds) = ctx.snapshot.get(from_entity_id).and_then(Layer::bounds) else {
            return;
        };
        self.scene.stroke(
            Space::Canvas,
            Primitive::Line {
                from: anchor_point(bounds, *from_anchor),
                to: *current,
            },
            StrokeStyle::new(self.px(1.5)).with_dashes(self.px(6.0), self.px(4.0)),
            ctx.config.link_preview_color,
        );
    }

    fn render_selection_net(&mut self, ctx: &RenderContext) {
        let Some(rect) = ctx.state.selection_net() else {
            return;
        };
        let shape = Primitive::Rect { rect, radius: 0.0 };
        self.scene.fill(Space::Canvas, shape.clone(), ctx.config.net_fill);
        self.scene.stroke(
            Space::Canvas,
            shape,
            StrokeStyle::new(self.px(0.5)),
            ctx.config.net_stroke,
        );
    }

    /// Other users' selections and cursors, each in their connection color.
    fn render_collaborators(&mut self, ctx: &RenderContext) {
        for member in ctx.others {
            let color = connection_id_to_color(member.connection_id);
            for id in &member.presence.selection {
                if let Some(bounds) = ctx.snapshot.get(id).and_then(Layer::bounds) {
                    self.scene.stroke(
                        Space::Canvas,
                        Primitive::Rect {
                            rect: bounds.inflate(self.px(2.0), self.px(2.0)),
                            radius: 0.0,
                        },
                        StrokeStyle::new(self.px(2.0)),
                        color,
                    );
                }
            }

            if let Some(cursor) = member.presence.cursor {
                let tip = ctx.camera.canvas_to_screen(cursor);
                self.draw_cursor(tip, color);
                if !member.info.name.is_empty() {
                    self.scene.text(
                        Space::Screen,
                        tip + Vec2::new(16.0, 28.0),
                        member.info.name.clone(),
                        12.0,
                        false,
                        color,
                    );
                }
            }
        }
    }

    /// Draw a remote user's cursor at a screen position.
    pub fn draw_cursor(&mut self, screen_pos: Point, color: Color) {
        let arrow = Primitive::Polygon(vec![
            screen_pos,
            Point::new(screen_pos.x, screen_pos.y + 18.0),
            Point::new(screen_pos.x + 14.0, screen_pos.y + 14.0),
        ]);
        self.scene.fill(Space::Screen, arrow.clone(), color);
        self.scene.stroke(Space::Screen, arrow, StrokeStyle::new(1.5), Color::WHITE);
    }
}

impl Renderer for DisplayListRenderer {
    fn build_scene(&mut self, ctx: &RenderContext) -> RenderResult<()> {
        let size = ctx.viewport_size;
        if !(size.width >= 0.0 && size.height >= 0.0) {
            return Err(RendererError::InvalidViewport {
                width: size.width,
                height: size.height,
            });
        }

        self.scene.reset(self.background_color(ctx), ctx.camera.transform());
        self.zoom = ctx.zoom();
        let config = &ctx.config;

        for (id, layer) in ctx.snapshot.ordered() {
            match layer {
                Layer::Entity(e) => {
                    let view = EntityView::new(e, config.header_height, config.row_height);
                    self.render_entity(&view, config);
                }
                Layer::Relation(r) => match RelationView::resolve(&ctx.snapshot, id, r) {
                    Some(view) => self.render_relation(&view, config),
                    None => log::warn!("Skipping dangling relation {id}"),
                },
            }
        }

        self.render_link_preview(ctx);
        self.render_selection(ctx);
        self.render_selection_net(ctx);
        self.render_collaborators(ctx);
        Ok(())
    }
}

/// Canvas area covered by the diagram's entities, padded by `padding`.
pub fn diagram_bounds(snapshot: &DiagramSnapshot, padding: f64) -> RenderResult<Rect> {
    snapshot
        .ordered()
        .filter_map(|(_, layer)| layer.bounds())
        .reduce(|acc, r| acc.union(r))
        .map(|r| r.inflate(padding, padding))
        .ok_or(RendererError::EmptyDiagram)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Paint;
    use erdboard_core::canvas::CanvasEngine;
    use erdboard_core::input::PointerInput;
    use erdboard_core::layer::{EntityLayer, RelationLayer, RelationType};
    use erdboard_core::presence::Presence;
    use erdboard_core::store::DiagramStore;
    use erdboard_core::{CrdtStore, EngineConfig};
    use kurbo::Size;
    use pretty_assertions::assert_eq;

    fn engine() -> CanvasEngine {
        let mut engine = CanvasEngine::new(CrdtStore::new(), EngineConfig::default());
        for (id, x) in [("a", 0.0), ("b", 300.0)] {
            let mut e = EntityLayer::with_defaults(Point::new(x, 0.0), 100.0, 100.0);
            e.name = id.to_uppercase();
            engine.store_mut().insert(id.into(), Layer::Entity(e)).unwrap();
        }
        engine
    }

    fn build(engine: &CanvasEngine) -> Scene {
        let mut renderer = DisplayListRenderer::new();
        renderer
            .build_scene(&RenderContext::new(engine, Size::new(800.0, 600.0)))
            .unwrap();
        renderer.take_scene()
    }

    fn count_circles(scene: &Scene) -> usize {
        scene
            .commands()
            .iter()
            .filter(|c| matches!(c.primitive, Primitive::Circle { .. }) && matches!(c.paint, Paint::Stroke(..)))
            .count()
    }

    #[test]
    fn test_entities_render_titles_and_rows() {
        let scene = build(&engine());
        let texts: Vec<&str> = scene.texts().collect();
        assert_eq!(texts, vec!["A", "id: long", "nombre: string", "B", "id: long", "nombre: string"]);
    }

    #[test]
    fn test_relation_labels_and_dangling_skip() {
        let mut engine = engine();
        let mut rel = RelationLayer::new("a", "b", RelationType::Aggregation);
        rel.target_card = erdboard_core::layer::Cardinality::Many;
        engine.store_mut().insert("r".into(), Layer::Relation(rel)).unwrap();
        let orphan = RelationLayer::new("a", "ghost", RelationType::Association);
        engine.store_mut().insert("o".into(), Layer::Relation(orphan)).unwrap();

        let scene = build(&engine);
        let texts: Vec<&str> = scene.texts().collect();
        assert_eq!(&texts[6..], ["1", "*"]);
        let polygons = scene
            .commands()
            .iter()
            .filter(|c| matches!(c.primitive, Primitive::Polygon(_)))
            .count();
        assert_eq!(polygons, 2);
    }

    #[test]
    fn test_handles_only_for_single_selection() {
        let mut engine = engine();
        assert_eq!(count_circles(&build(&engine)), 0);

        engine.select_layer("a");
        assert_eq!(count_circles(&build(&engine)), 4);

        engine.select_all();
        assert_eq!(count_circles(&build(&engine)), 0);
    }

    #[test]
    fn test_link_preview_and_net() {
        let mut engine = engine();
        engine.start_linking("a", Anchor::Right);
        engine.pointer_move(PointerInput::at(200.0, 80.0));
        let scene = build(&engine);
        let preview = scene.commands().iter().any(|c| {
            matches!(c.primitive, Primitive::Line { from, to } if from == Point::new(100.0, 50.0) && to == Point::new(200.0, 80.0))
        });
        assert!(preview);

        let mut engine = self::engine();
        engine.pointer_down(PointerInput::at(500.0, 500.0));
        engine.pointer_move(PointerInput::at(600.0, 550.0));
        let scene = build(&engine);
        let net = scene.commands().iter().any(|c| {
            matches!(c.primitive, Primitive::Rect { rect, .. } if rect == Rect::new(500.0, 500.0, 600.0, 550.0))
        });
        assert!(net);
    }

    #[test]
    fn test_collaborator_cursor_in_screen_space() {
        let mut engine = engine();
        engine.wheel(Vec2::new(-10.0, -20.0));
        engine.store_mut().roster_mut().update_other_presence(
            7,
            Presence {
                selection: vec!["b".into()],
                cursor: Some(Point::new(5.0, 5.0)),
            },
        );
        let scene = build(&engine);
        let cursor = scene.commands().iter().find(|c| c.space == Space::Screen).unwrap();
        match &cursor.primitive {
            Primitive::Polygon(points) => assert_eq!(points[0], Point::new(15.0, 25.0)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_diagram_bounds() {
        let engine = engine();
        let bounds = diagram_bounds(&engine.store().snapshot(), 10.0).unwrap();
        assert_eq!(bounds, Rect::new(-10.0, -10.0, 410.0, 110.0));
        assert!(matches!(
            diagram_bounds(&DiagramSnapshot::default(), 0.0),
            Err(RendererError::EmptyDiagram)
        ));
    }

    #[test]
    fn test_invalid_viewport() {
        let engine = engine();
        let mut renderer = DisplayListRenderer::new();
        let ctx = RenderContext::new(&engine, Size::new(f64::NAN, 10.0));
        assert!(renderer.build_scene(&ctx).is_err());
    }
}
