use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{PressError, Result};
use crate::palette::{PaletteColor, ScreenPoint};
use crate::sampler::{BASE_CANVAS_HEIGHT, BASE_CANVAS_WIDTH};

/// Translation from drawing-canvas coordinates to device screen coordinates.
pub const CANVAS_SCREEN_OFFSET: ScreenPoint = ScreenPoint::new(259, 168);

/// Largest shifted coordinate that still lands on the canvas.
pub const BOUNDARY: ScreenPoint = ScreenPoint::new(
    BASE_CANVAS_WIDTH as i32 + CANVAS_SCREEN_OFFSET.x,
    BASE_CANVAS_HEIGHT as i32 + CANVAS_SCREEN_OFFSET.y,
);

/// Empirical numbers measured on the device. Not derived, just tuned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub seconds_per_pixel: f64,
    pub duration_factor: f64,
    /// Strokes a canvas can take before the ink runs out.
    pub ink_budget: usize,
    /// Added to the poll rate between two samples.
    pub input_lag_ms: u64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            seconds_per_pixel: 0.062,
            duration_factor: 2.15,
            ink_budget: 10_000,
            input_lag_ms: 93,
        }
    }
}

/// One dot to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplePoint {
    pub color: Arc<PaletteColor>,
    pub x: u32,
    pub y: u32,
}

impl SamplePoint {
    pub fn new(color: Arc<PaletteColor>, x: u32, y: u32) -> Self {
        Self { color, x, y }
    }

    /// Where to touch for this point, given a user shift.
    pub fn screen_position(&self, offset_x: i32, offset_y: i32) -> ScreenPoint {
        ScreenPoint::new(
            shift(self.x, CANVAS_SCREEN_OFFSET.x).saturating_add(offset_x),
            shift(self.y, CANVAS_SCREEN_OFFSET.y).saturating_add(offset_y),
        )
    }
}

/// Canvas coordinate moved by a signed offset, clamped to the `i32` range.
fn shift(coord: u32, offset: i32) -> i32 {
    i32::try_from(coord).unwrap_or(i32::MAX).saturating_add(offset)
}

/// Ordered sample points of one image, column by column.
#[derive(Debug, Clone, Default)]
pub struct DrawPlan {
    points: Vec<SamplePoint>,
}

impl DrawPlan {
    pub fn new(points: Vec<SamplePoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[SamplePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn estimated_duration_seconds(&self, calibration: &Calibration) -> u64 {
        (self.points.len() as f64 * calibration.seconds_per_pixel * calibration.duration_factor).round() as u64
    }

    pub fn too_many_pixels(&self, calibration: &Calibration) -> bool {
        self.points.len() > calibration.ink_budget
    }

    /// Only the last point is checked: sampling order puts the largest
    /// coordinates at the end.
    pub fn exceeds_boundary(&self, offset_x: i32, offset_y: i32) -> bool {
        match self.points.last() {
            Some(last) => {
                shift(last.x, offset_x) > BOUNDARY.x || shift(last.y, offset_y) > BOUNDARY.y
            }
            None => false,
        }
    }

    pub fn check_boundary(&self, offset_x: i32, offset_y: i32) -> Result<()> {
        if !self.exceeds_boundary(offset_x, offset_y) {
            return Ok(());
        }
        // exceeds_boundary is only true for a non-empty plan
        let last = &self.points[self.points.len() - 1];
        Err(PressError::BoundaryViolation {
            x: shift(last.x, offset_x),
            y: shift(last.y, offset_y),
            max_x: BOUNDARY.x,
            max_y: BOUNDARY.y,
        })
    }

    /// Advisory: the drawing may run out of ink before it finishes.
    pub fn check_ink(&self, calibration: &Calibration) -> Result<()> {
        if self.too_many_pixels(calibration) {
            return Err(PressError::InkBudgetExceeded {
                samples: self.points.len(),
                budget: calibration.ink_budget,
            });
        }
        Ok(())
    }
}
