use image::{Rgba, RgbaImage};
use imageproc::drawing::{Blend, Canvas};

use crate::plan::DrawPlan;
use crate::sampler::{BASE_CANVAS_HEIGHT, BASE_CANVAS_WIDTH};

pub const DOT_RADIUS: f32 = 2.4;

/// Sub-samples per axis used to estimate dot coverage.
const SUPERSAMPLE: u32 = 4;

/// Rasterize a plan the way it will look on the canvas: one anti-aliased dot
/// per point in its display color, on a transparent background.
pub fn render(plan: &DrawPlan, offset_x: i32, offset_y: i32) -> RgbaImage {
    let mut canvas = Blend(RgbaImage::new(BASE_CANVAS_WIDTH, BASE_CANVAS_HEIGHT));
    for point in plan.points() {
        let cx = point.x as f32 + offset_x as f32;
        let cy = point.y as f32 + offset_y as f32;
        let [r, g, b] = point.color.display.0;
        fill_dot(&mut canvas, cx, cy, [r, g, b]);
    }
    canvas.0
}

fn fill_dot(canvas: &mut Blend<RgbaImage>, cx: f32, cy: f32, rgb: [u8; 3]) {
    let (width, height) = canvas.dimensions();
    let min_x = (cx - DOT_RADIUS).floor().max(0.0) as i64;
    let min_y = (cy - DOT_RADIUS).floor().max(0.0) as i64;
    let max_x = (cx + DOT_RADIUS).ceil().min(width as f32 - 1.0) as i64;
    let max_y = (cy + DOT_RADIUS).ceil().min(height as f32 - 1.0) as i64;

    let r2 = DOT_RADIUS * DOT_RADIUS;
    let step = 1.0 / SUPERSAMPLE as f32;
    for py in min_y..=max_y {
        for px in min_x..=max_x {
            let mut hits = 0u32;
            for sy in 0..SUPERSAMPLE {
                for sx in 0..SUPERSAMPLE {
                    let x = px as f32 - 0.5 + (sx as f32 + 0.5) * step;
                    let y = py as f32 - 0.5 + (sy as f32 + 0.5) * step;
                    let (dx, dy) = (x - cx, y - cy);
                    if dx * dx + dy * dy <= r2 {
                        hits += 1;
                    }
                }
            }
            if hits == 0 {
                continue;
            }
            let alpha = (255 * hits / (SUPERSAMPLE * SUPERSAMPLE)) as u8;
            canvas.draw_pixel(px as u32, py as u32, Rgba([rgb[0], rgb[1], rgb[2], alpha]));
        }
    }
}
