//! Local pan/zoom view of the canvas. Never shared with collaborators.

use kurbo::{Affine, Point, Vec2};
use serde::{Deserialize, Serialize};

/// Smallest zoom the toolbar allows.
pub const MIN_ZOOM: f64 = 0.5;
/// Largest zoom the toolbar allows.
pub const MAX_ZOOM: f64 = 2.0;
/// Increment applied by one zoom-in/zoom-out command.
pub const ZOOM_STEP: f64 = 0.1;

/// Camera maps canvas coordinates to screen coordinates.
///
/// `screen = offset + zoom * canvas`. Panning never changes the zoom, and
/// every path that changes the zoom clamps it to `[min_zoom, max_zoom]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Current translation (pan), in screen pixels.
    pub offset: Vec2,
    zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: 1.0,
            min_zoom: MIN_ZOOM,
            max_zoom: MAX_ZOOM,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Camera with custom zoom bounds. Unusable bounds fall back to the
    /// defaults.
    pub fn with_bounds(min_zoom: f64, max_zoom: f64) -> Self {
        if !(min_zoom.is_finite() && max_zoom.is_finite() && min_zoom > 0.0 && min_zoom <= max_zoom) {
            log::warn!("Ignoring invalid zoom bounds [{min_zoom}, {max_zoom}]");
            return Self::default();
        }
        Self {
            min_zoom,
            max_zoom,
            zoom: 1.0_f64.clamp(min_zoom, max_zoom),
            ..Self::default()
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Set the zoom level, clamped to the camera's bounds.
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
    }

    /// Canvas to screen transform.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.zoom)
    }

    /// Screen to canvas transform.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.zoom) * Affine::translate(-self.offset)
    }

    pub fn screen_to_canvas(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    pub fn canvas_to_screen(&self, canvas_point: Point) -> Point {
        self.transform() * canvas_point
    }

    /// Pan by a delta in screen pixels.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    pub fn can_zoom_in(&self) -> bool {
        self.zoom < self.max_zoom - 1e-9
    }

    pub fn can_zoom_out(&self) -> bool {
        self.zoom > self.min_zoom + 1e-9
    }

    /// One zoom-in step. Returns `false` when already at the upper bound.
    pub fn zoom_in(&mut self, step: f64) -> bool {
        if !self.can_zoom_in() {
            return false;
        }
        self.set_zoom(self.zoom + step);
        true
    }

    /// One zoom-out step. Returns `false` when already at the lower bound.
    pub fn zoom_out(&mut self, step: f64) -> bool {
        if !self.can_zoom_out() {
            return false;
        }
        self.set_zoom(self.zoom - step);
        true
    }

    /// Reset to the origin at 100%.
    pub fn reset(&mut self) {
        self.offset = Vec2::ZERO;
        self.set_zoom(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_camera() {
        let camera = Camera::new();
        assert_eq!(camera.offset, Vec2::ZERO);
        assert!((camera.zoom() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_bounds_fall_back_to_defaults() {
        let camera = Camera::with_bounds(2.0, 0.5);
        assert_eq!(camera, Camera::default());
        let camera = Camera::with_bounds(f64::NAN, 2.0);
        assert_eq!(camera, Camera::default());
        let camera = Camera::with_bounds(0.25, 4.0);
        assert_eq!((camera.min_zoom, camera.max_zoom), (0.25, 4.0));
    }

    #[test]
    fn test_screen_to_canvas_with_offset() {
        let mut camera = Camera::new();
        camera.pan(Vec2::new(50.0, 100.0));
        let canvas = camera.screen_to_canvas(Point::new(100.0, 200.0));
        assert!((canvas.x - 50.0).abs() < f64::EPSILON);
        assert!((canvas.y - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_screen_to_canvas_with_zoom() {
        let mut camera = Camera::new();
        camera.set_zoom(2.0);
        let canvas = camera.screen_to_canvas(Point::new(100.0, 200.0));
        assert!((canvas.x - 50.0).abs() < f64::EPSILON);
        assert!((canvas.y - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_roundtrip_conversion() {
        let mut camera = Camera::new();
        camera.pan(Vec2::new(30.0, -20.0));
        camera.set_zoom(1.5);

        let original = Point::new(123.0, 456.0);
        let back = camera.canvas_to_screen(camera.screen_to_canvas(original));
        assert!((back.x - original.x).abs() < 1e-10);
        assert!((back.y - original.y).abs() < 1e-10);
    }

    #[test]
    fn test_zoom_steps_stop_at_bounds() {
        let mut camera = Camera::new();
        let mut steps = 0;
        while camera.zoom_in(ZOOM_STEP) {
            steps += 1;
            assert!(steps < 100);
        }
        assert!((camera.zoom() - MAX_ZOOM).abs() < 1e-9);
        assert!(!camera.can_zoom_in());

        while camera.zoom_out(ZOOM_STEP) {}
        assert!((camera.zoom() - MIN_ZOOM).abs() < 1e-9);
        assert!(!camera.can_zoom_out());
    }

    #[test]
    fn test_set_zoom_clamps() {
        let mut camera = Camera::new();
        camera.set_zoom(10.0);
        assert!((camera.zoom() - MAX_ZOOM).abs() < f64::EPSILON);
        camera.set_zoom(0.0);
        assert!((camera.zoom() - MIN_ZOOM).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pan_keeps_zoom() {
        let mut camera = Camera::new();
        camera.set_zoom(1.3);
        camera.pan(Vec2::new(10.0, 20.0));
        assert!((camera.zoom() - 1.3).abs() < f64::EPSILON);
        assert!((camera.offset.x - 10.0).abs() < f64::EPSILON);
    }
}
