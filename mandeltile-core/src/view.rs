use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// An immutable snapshot of what to render.
///
/// `(cx, cy)` is the centre of the canvas in fractal space and `per_pixel`
/// is how many fractal-space units each pixel spans. Pixel rows grow
/// downward with increasing `y`.
///
/// Changes never happen in place: [`apply`](Self::apply) returns a new
/// snapshot, so a render that captured the old value is unaffected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewState {
    pub cx: f64,
    pub cy: f64,
    pub per_pixel: f64,
    pub max_iterations: u32,
}

/// Validates on load so a hand-edited snapshot can't smuggle in a zero
/// scale or iteration cap.
impl<'de> Deserialize<'de> for ViewState {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            cx: f64,
            cy: f64,
            per_pixel: f64,
            max_iterations: u32,
        }
        let raw = Raw::deserialize(deserializer)?;
        Self::new(raw.cx, raw.cy, raw.per_pixel, raw.max_iterations)
            .map_err(serde::de::Error::custom)
    }
}

/// Arrow-key style nudge direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// A navigation step, resolved against the canvas size by [`ViewState::apply`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewCommand {
    /// Back to [`ViewState::initial`] for the current canvas.
    Reset,
    /// Multiply the iteration cap by 1.5.
    MoreIterations,
    /// Divide the iteration cap by 1.5, never below 1.
    FewerIterations,
    /// Double the per-pixel scale, keeping the centre.
    ZoomOut,
    /// Centre on the given pixel and halve the per-pixel scale.
    ZoomIn { px: f64, py: f64 },
    /// Drag the image by a pixel offset; content follows the pointer.
    Pan { dx: f64, dy: f64 },
    /// Move the centre a tenth of the canvas.
    Nudge(Direction),
}

impl ViewState {
    pub const DEFAULT_MAX_ITERATIONS: u32 = 500;

    /// Fractal-space height visible in the initial view.
    pub const INITIAL_SPAN: f64 = 3.0;

    /// Starting view: the whole set, three units tall.
    pub fn initial(canvas_height: u32) -> Self {
        Self {
            cx: -0.5,
            cy: 0.0,
            per_pixel: Self::INITIAL_SPAN / canvas_height.max(1) as f64,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Create a snapshot with explicit parameters.
    pub fn new(cx: f64, cy: f64, per_pixel: f64, max_iterations: u32) -> crate::Result<Self> {
        if !cx.is_finite() || !cy.is_finite() {
            return Err(CoreError::InvalidCenter { cx, cy });
        }
        if per_pixel <= 0.0 || !per_pixel.is_finite() {
            return Err(CoreError::InvalidPerPixel(per_pixel));
        }
        if max_iterations < 1 {
            return Err(CoreError::InvalidMaxIterations(max_iterations));
        }
        Ok(Self {
            cx,
            cy,
            per_pixel,
            max_iterations,
        })
    }

    /// Fractal-space coordinate of the top-left pixel of a canvas.
    #[inline]
    pub fn origin(&self, width: u32, height: u32) -> (f64, f64) {
        (
            self.cx - self.per_pixel * width as f64 / 2.0,
            self.cy - self.per_pixel * height as f64 / 2.0,
        )
    }

    /// Map a pixel coordinate to its fractal-space point.
    #[inline]
    pub fn pixel_to_point(&self, width: u32, height: u32, px: u32, py: u32) -> (f64, f64) {
        let (x0, y0) = self.origin(width, height);
        (
            x0 + px as f64 * self.per_pixel,
            y0 + py as f64 * self.per_pixel,
        )
    }

    /// Return the snapshot produced by applying `command` on a
    /// `width`×`height` canvas.
    pub fn apply(self, command: ViewCommand, width: u32, height: u32) -> Self {
        let pp = self.per_pixel;
        match command {
            ViewCommand::Reset => Self::initial(height),
            ViewCommand::MoreIterations => Self {
                max_iterations: (self.max_iterations as f64 * 1.5).round() as u32,
                ..self
            },
            ViewCommand::FewerIterations => Self {
                max_iterations: ((self.max_iterations as f64 / 1.5).round() as u32).max(1),
                ..self
            },
            ViewCommand::ZoomOut => Self {
                per_pixel: pp * 2.0,
                ..self
            },
            ViewCommand::ZoomIn { px, py } => Self {
                cx: self.cx + (px - width as f64 / 2.0) * pp,
                cy: self.cy + (py - height as f64 / 2.0) * pp,
                per_pixel: pp / 2.0,
                ..self
            },
            ViewCommand::Pan { dx, dy } => Self {
                cx: self.cx - dx * pp,
                cy: self.cy - dy * pp,
                ..self
            },
            ViewCommand::Nudge(direction) => {
                let step_x = width as f64 / 10.0 * pp;
                let step_y = height as f64 / 10.0 * pp;
                match direction {
                    Direction::Up => Self {
                        cy: self.cy - step_y,
                        ..self
                    },
                    Direction::Down => Self {
                        cy: self.cy + step_y,
                        ..self
                    },
                    Direction::Left => Self {
                        cx: self.cx - step_x,
                        ..self
                    },
                    Direction::Right => Self {
                        cx: self.cx + step_x,
                        ..self
                    },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-12;

    fn view() -> ViewState {
        ViewState::new(0.0, 0.0, 0.01, 100).unwrap()
    }

    #[test]
    fn initial_view_spans_three_units() {
        let v = ViewState::initial(600);
        assert!((v.cx - (-0.5)).abs() < EPSILON);
        assert!((v.cy).abs() < EPSILON);
        assert!((v.per_pixel * 600.0 - 3.0).abs() < EPSILON);
        assert_eq!(v.max_iterations, 500);
    }

    #[test]
    fn origin_is_top_left() {
        let v = view();
        let (x0, y0) = v.origin(200, 100);
        assert!((x0 - (-1.0)).abs() < EPSILON);
        assert!((y0 - (-0.5)).abs() < EPSILON);
        let (x, y) = v.pixel_to_point(200, 100, 100, 50);
        assert!(x.abs() < EPSILON && y.abs() < EPSILON);
    }

    #[test]
    fn invalid_parameters() {
        assert!(ViewState::new(0.0, 0.0, 0.0, 100).is_err());
        assert!(ViewState::new(0.0, 0.0, -1.0, 100).is_err());
        assert!(ViewState::new(0.0, 0.0, f64::INFINITY, 100).is_err());
        assert!(ViewState::new(f64::NAN, 0.0, 0.01, 100).is_err());
        assert!(ViewState::new(0.0, 0.0, 0.01, 0).is_err());
    }

    #[test]
    fn iteration_scaling_clamps_at_one() {
        let v = view().apply(ViewCommand::MoreIterations, 100, 100);
        assert_eq!(v.max_iterations, 150);

        let mut v = ViewState::new(0.0, 0.0, 0.01, 2).unwrap();
        for _ in 0..4 {
            v = v.apply(ViewCommand::FewerIterations, 100, 100);
        }
        assert_eq!(v.max_iterations, 1);
    }

    #[test]
    fn zoom_in_centres_on_pixel() {
        let v = view().apply(ViewCommand::ZoomIn { px: 150.0, py: 50.0 }, 200, 100);
        assert!((v.cx - 0.5).abs() < EPSILON);
        assert!(v.cy.abs() < EPSILON);
        assert!((v.per_pixel - 0.005).abs() < EPSILON);
    }

    #[test]
    fn pan_follows_pointer() {
        let v = view().apply(ViewCommand::Pan { dx: 10.0, dy: -20.0 }, 200, 100);
        assert!((v.cx - (-0.1)).abs() < EPSILON);
        assert!((v.cy - 0.2).abs() < EPSILON);
    }

    #[test]
    fn nudge_moves_a_tenth() {
        let v = view().apply(ViewCommand::Nudge(Direction::Right), 200, 100);
        assert!((v.cx - 0.2).abs() < EPSILON);
        let v = view().apply(ViewCommand::Nudge(Direction::Up), 200, 100);
        assert!((v.cy - (-0.1)).abs() < EPSILON);
    }

    #[test]
    fn apply_leaves_original_untouched() {
        let before = view();
        let after = before.apply(ViewCommand::ZoomOut, 100, 100);
        assert_eq!(before, view());
        assert!((after.per_pixel - 0.02).abs() < EPSILON);
    }

    #[test]
    fn reset_uses_canvas_height() {
        let v = view().apply(ViewCommand::Reset, 400, 300);
        assert_eq!(v, ViewState::initial(300));
    }
}
