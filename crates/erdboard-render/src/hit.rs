//! Pointer hit testing and routing of presses into the engine.

use erdboard_core::canvas::CanvasEngine;
use erdboard_core::geometry::{Anchor, Side, anchor_point};
use erdboard_core::input::PointerInput;
use erdboard_core::layer::{Layer, LayerId};
use erdboard_core::selection::{HandleKind, resize_handles};
use erdboard_core::store::DiagramStore;
use kurbo::{Point, Rect, Size, Vec2};

use crate::layers::RelationView;
use crate::renderer::{RenderConfig, RenderContext};

/// What lies under the pointer, topmost first.
#[derive(Debug, Clone, PartialEq)]
pub enum HitTarget {
    /// Resize handle of the single selected entity.
    ResizeHandle { side: Side, bounds: Rect },
    /// Link handle of the single selected entity.
    LinkAnchor { entity_id: LayerId, anchor: Anchor },
    /// Body of an entity or a relation edge.
    Layer(LayerId),
    /// Empty canvas.
    Canvas,
}

/// Where the link handle for `anchor` is drawn: pushed outwards from the
/// anchor point so it does not overlap the resize handle on the same edge.
pub fn link_handle_position(bounds: Rect, anchor: Anchor, offset: f64) -> Point {
    let outward = match anchor {
        Anchor::Left => Vec2::new(-1.0, 0.0),
        Anchor::Right => Vec2::new(1.0, 0.0),
        Anchor::Top => Vec2::new(0.0, -1.0),
        Anchor::Bottom => Vec2::new(0.0, 1.0),
    };
    anchor_point(bounds, anchor) + outward * offset
}

/// Find what a screen point hits in the frame described by `ctx`.
///
/// Handles are only live around a single selected entity, and relations are
/// not hittable while a link is being drawn so the press reaches the entity
/// underneath.
pub fn hit_test(ctx: &RenderContext, screen_point: Point) -> HitTarget {
    let point = ctx.camera.screen_to_canvas(screen_point);
    let tolerance = ctx.screen_len(ctx.config.hit_tolerance);
    let linking = ctx.state.is_linking();

    if !linking {
        if let Some((id, bounds)) = ctx.single_selected_entity() {
            for handle in resize_handles(bounds) {
                if let HandleKind::Resize(side) = handle.kind {
                    if handle.hit_test(point, tolerance) {
                        return HitTarget::ResizeHandle { side, bounds };
                    }
                }
            }
            let offset = ctx.screen_len(ctx.config.link_handle_offset);
            for anchor in Anchor::ALL {
                if link_handle_position(bounds, anchor, offset).distance(point) <= tolerance {
                    return HitTarget::LinkAnchor {
                        entity_id: id.clone(),
                        anchor,
                    };
                }
            }
        }
    }

    let layers: Vec<_> = ctx.snapshot.ordered().collect();
    for (id, layer) in layers.into_iter().rev() {
        match layer {
            Layer::Entity(e) => {
                if e.bounds().contains(point) {
                    return HitTarget::Layer(id.clone());
                }
            }
            Layer::Relation(r) => {
                if linking {
                    continue;
                }
                let hit = RelationView::resolve(&ctx.snapshot, id, r).is_some_and(|v| v.distance_to(point) <= tolerance);
                if hit {
                    return HitTarget::Layer(id.clone());
                }
            }
        }
    }

    HitTarget::Canvas
}

/// Send a press to the engine entry point matching what was hit.
pub fn dispatch_pointer_down<S: DiagramStore>(engine: &mut CanvasEngine<S>, target: &HitTarget, input: PointerInput) {
    match target {
        HitTarget::ResizeHandle { side, bounds } => engine.start_resize(*side, *bounds),
        HitTarget::LinkAnchor { entity_id, anchor } => engine.start_linking(entity_id.clone(), *anchor),
        HitTarget::Layer(id) => engine.layer_pointer_down(id, input),
        HitTarget::Canvas => engine.pointer_down(input),
    }
}

/// Hit test a press against the engine's current frame and dispatch it.
pub fn route_pointer_down<S: DiagramStore>(
    engine: &mut CanvasEngine<S>,
    input: PointerInput,
    config: &RenderConfig,
) -> HitTarget {
    let target = {
        let ctx = RenderContext::new(engine, Size::ZERO).with_config(config.clone());
        hit_test(&ctx, input.position)
    };
    log::trace!("Pointer down on {target:?}");
    dispatch_pointer_down(engine, &target, input);
    target
}
