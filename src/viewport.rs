use serde::{Deserialize, Serialize};

use crate::error::{MindMapError, Result};
use crate::layout::Point;

pub const MIN_ZOOM: f64 = 0.5;
pub const MAX_ZOOM: f64 = 2.0;
pub const ZOOM_STEP: f64 = 0.1;

pub const DEFAULT_CANVAS_WIDTH: f64 = 1200.0;
pub const DEFAULT_CANVAS_HEIGHT: f64 = 800.0;

/// Pan offset and zoom mapping model space to screen space.
///
/// The offset is kept in pre-zoom units: panning and centering never look at
/// the zoom factor. Zoom is applied afterwards as a uniform scale about the
/// center of the canvas, the way a CSS `scale()` with a centered origin
/// would draw it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub offset: Point,
    pub zoom: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WheelInput {
    pub delta_y: f64,
    /// Ctrl or Meta held: the wheel zooms instead of scrolling.
    #[serde(default)]
    pub ctrl: bool,
    /// Shift held: the wheel also scrolls horizontally.
    #[serde(default)]
    pub shift: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(DEFAULT_CANVAS_WIDTH, DEFAULT_CANVAS_HEIGHT)
    }
}

/// Snaps to the nearest zoom step so repeated steps never accumulate error.
fn round_step(value: f64) -> f64 {
    let steps_per_unit = (1.0 / ZOOM_STEP).round();
    (value * steps_per_unit).round() / steps_per_unit
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            offset: Point::ORIGIN,
            zoom: 1.0,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }

    pub fn model_to_screen(&self, point: Point) -> Point {
        let c = self.center();
        c + (point + self.offset - c) * self.zoom
    }

    pub fn screen_to_model(&self, point: Point) -> Point {
        let c = self.center();
        c + (point - c) * (1.0 / self.zoom) - self.offset
    }

    /// Puts `point` at the middle of the canvas.
    pub fn center_on(&mut self, point: Point) {
        self.offset = self.center() - point;
    }

    pub fn pan_by(&mut self, delta: Point) -> Result<()> {
        self.offset = self.offset + delta.finite()?;
        Ok(())
    }

    pub fn zoom_in(&mut self) -> bool {
        if self.zoom >= MAX_ZOOM {
            return false;
        }
        self.zoom = round_step(self.zoom + ZOOM_STEP).min(MAX_ZOOM);
        true
    }

    pub fn zoom_out(&mut self) -> bool {
        if self.zoom <= MIN_ZOOM {
            return false;
        }
        self.zoom = round_step(self.zoom - ZOOM_STEP).max(MIN_ZOOM);
        true
    }

    pub fn reset_zoom(&mut self) {
        self.zoom = 1.0;
    }

    /// Zoom percentage as shown next to the zoom buttons.
    pub fn zoom_percent(&self) -> u32 {
        (self.zoom * 100.0).round() as u32
    }

    pub fn wheel(&mut self, input: WheelInput) -> Result<()> {
        if !input.delta_y.is_finite() {
            return Err(MindMapError::invalid(format!(
                "wheel delta {} is not a number",
                input.delta_y
            )));
        }
        if input.ctrl {
            if input.delta_y < 0.0 {
                self.zoom_in();
            } else {
                self.zoom_out();
            }
            return Ok(());
        }

        self.offset.y -= input.delta_y;
        if input.shift {
            self.offset.x -= input.delta_y;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point) -> bool {
        a.distance(b) < 1e-9
    }

    #[test]
    fn zoom_saturates_at_both_ends() {
        let mut viewport = Viewport::default();
        for _ in 0..25 {
            viewport.zoom_in();
            assert!(viewport.zoom <= MAX_ZOOM);
        }
        assert_eq!(viewport.zoom, MAX_ZOOM);
        assert!(!viewport.zoom_in());

        viewport.reset_zoom();
        for _ in 0..25 {
            viewport.zoom_out();
            assert!(viewport.zoom >= MIN_ZOOM);
        }
        assert_eq!(viewport.zoom, MIN_ZOOM);
        assert!(!viewport.zoom_out());
    }

    #[test]
    fn zoom_steps_do_not_drift() {
        let mut viewport = Viewport::default();
        for _ in 0..3 {
            viewport.zoom_in();
        }
        assert_eq!(viewport.zoom_percent(), 130);
        for _ in 0..3 {
            viewport.zoom_out();
        }
        assert_eq!(viewport.zoom, 1.0);
    }

    #[test]
    fn centered_point_lands_mid_canvas_at_any_zoom() {
        let mut viewport = Viewport::new(1000.0, 600.0);
        let target = Point::new(250.0, -75.0);
        viewport.center_on(target);
        assert!(close(viewport.model_to_screen(target), Point::new(500.0, 300.0)));

        viewport.zoom_in();
        viewport.zoom_in();
        assert!(close(viewport.model_to_screen(target), Point::new(500.0, 300.0)));
    }

    #[test]
    fn screen_to_model_inverts_model_to_screen() {
        let mut viewport = Viewport::new(800.0, 800.0);
        viewport.pan_by(Point::new(35.0, -12.0)).unwrap();
        viewport.zoom_out();
        let model = Point::new(120.0, 340.0);
        let screen = viewport.model_to_screen(model);
        assert!(close(viewport.screen_to_model(screen), model));
    }

    #[test]
    fn unit_zoom_is_plain_translation() {
        let mut viewport = Viewport::new(800.0, 600.0);
        viewport.pan_by(Point::new(10.0, 20.0)).unwrap();
        assert!(close(
            viewport.model_to_screen(Point::new(1.0, 2.0)),
            Point::new(11.0, 22.0)
        ));
    }

    #[test]
    fn wheel_scrolls_or_zooms() {
        let mut viewport = Viewport::default();
        viewport.wheel(WheelInput { delta_y: 40.0, ..WheelInput::default() }).unwrap();
        assert_eq!(viewport.offset, Point::new(0.0, -40.0));

        viewport.wheel(WheelInput { delta_y: -10.0, shift: true, ..WheelInput::default() }).unwrap();
        assert_eq!(viewport.offset, Point::new(10.0, -30.0));

        viewport.wheel(WheelInput { delta_y: -1.0, ctrl: true, ..WheelInput::default() }).unwrap();
        assert_eq!(viewport.zoom_percent(), 110);
        assert_eq!(viewport.offset, Point::new(10.0, -30.0));

        viewport.wheel(WheelInput { delta_y: 1.0, ctrl: true, ..WheelInput::default() }).unwrap();
        assert_eq!(viewport.zoom, 1.0);
    }

    #[test]
    fn non_finite_input_leaves_view_unchanged() {
        let mut viewport = Viewport::default();
        viewport.pan_by(Point::new(15.0, 5.0)).unwrap();
        let before = viewport;

        assert!(viewport.pan_by(Point::new(f64::NAN, 0.0)).is_err());
        assert!(viewport.pan_by(Point::new(0.0, f64::INFINITY)).is_err());
        assert!(
            viewport
                .wheel(WheelInput { delta_y: f64::NAN, ctrl: true, ..WheelInput::default() })
                .is_err()
        );
        assert_eq!(viewport, before);
    }
}
