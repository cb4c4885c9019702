use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, RgbImage, Rgba, RgbaImage};
use tracing::{debug, info};

use crate::error::{PressError, Result};
use crate::palette::Palette;
use crate::plan::{DrawPlan, SamplePoint};

/// Logical size of the in-game canvas at 100%.
pub const BASE_CANVAS_WIDTH: u32 = 760;
pub const BASE_CANVAS_HEIGHT: u32 = 460;

pub const RESIZE_PERCENTAGES: [u32; 4] = [50, 60, 80, 100];
pub const STRIDES: [u32; 2] = [2, 4];

/// Luminance cutoff of the monochrome pre-pass, as a fraction of full scale.
const MONOCHROME_THRESHOLD: f32 = 0.7;

/// How an image is turned into sample points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleParams {
    pub resize_percent: u32,
    pub stride: u32,
    pub monochrome: bool,
}

impl Default for SampleParams {
    fn default() -> Self {
        Self {
            resize_percent: 100,
            stride: 4,
            monochrome: false,
        }
    }
}

impl SampleParams {
    pub fn new(resize_percent: u32, stride: u32, monochrome: bool) -> Result<Self> {
        if !RESIZE_PERCENTAGES.contains(&resize_percent) {
            return Err(PressError::InvalidParameter(format!(
                "resize must be one of {:?}, got {}",
                RESIZE_PERCENTAGES, resize_percent
            )));
        }
        if !STRIDES.contains(&stride) {
            return Err(PressError::InvalidParameter(format!(
                "stride must be one of {:?}, got {}",
                STRIDES, stride
            )));
        }
        Ok(Self {
            resize_percent,
            stride,
            monochrome,
        })
    }

    /// Target canvas size, rounded down.
    pub fn canvas_size(&self) -> (u32, u32) {
        (
            BASE_CANVAS_WIDTH * self.resize_percent / 100,
            BASE_CANVAS_HEIGHT * self.resize_percent / 100,
        )
    }

    /// Offsets only apply to shrunken drawings; a full-size drawing always
    /// starts at the canvas origin.
    pub fn effective_offset(&self, offset_x: i32, offset_y: i32) -> (i32, i32) {
        if self.resize_percent == 100 {
            (0, 0)
        } else {
            (offset_x, offset_y)
        }
    }
}

/// Decode an image file in any format the `image` crate understands.
pub fn load_image(path: impl AsRef<Path>) -> Result<DynamicImage> {
    let path = path.as_ref();
    let img = image::open(path).map_err(|source| PressError::ImageLoad {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), width = img.width(), height = img.height(), "image loaded");
    Ok(img)
}

/// Load, fit and sample an image file in one go.
pub fn sample_path(path: impl AsRef<Path>, palette: &Palette, params: &SampleParams) -> Result<DrawPlan> {
    let img = load_image(path)?;
    Ok(sample(&img, palette, params))
}

/// Scale `img` to fit inside `width`x`height` without distortion, centered
/// on a white background.
pub fn fit_to_canvas(img: &DynamicImage, width: u32, height: u32) -> RgbImage {
    let (src_w, src_h) = img.dimensions();
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
    if src_w == 0 || src_h == 0 || width == 0 || height == 0 {
        return DynamicImage::ImageRgba8(canvas).to_rgb8();
    }

    let ratio_w = width as f32 / src_w as f32;
    let ratio_h = height as f32 / src_h as f32;
    let (ratio, dest_x, dest_y) = if ratio_h < ratio_w {
        let dx = ((width as f32 - src_w as f32 * ratio_h) / 2.0).round() as i64;
        (ratio_h, dx, 0)
    } else {
        let dy = ((height as f32 - src_h as f32 * ratio_w) / 2.0).round() as i64;
        (ratio_w, 0, dy)
    };

    let dest_w = ((src_w as f32 * ratio) as u32).clamp(1, width);
    let dest_h = ((src_h as f32 * ratio) as u32).clamp(1, height);
    let scaled = imageops::resize(&img.to_rgba8(), dest_w, dest_h, FilterType::CatmullRom);
    imageops::overlay(&mut canvas, &scaled, dest_x, dest_y);

    DynamicImage::ImageRgba8(canvas).to_rgb8()
}

/// Collapse the image to pure black and white: grayscale by luma weights,
/// then a hard cut at 70% intensity.
pub fn monochrome(img: &mut RgbImage) {
    let cutoff = MONOCHROME_THRESHOLD * 255.0;
    for pixel in img.pixels_mut() {
        let [r, g, b] = pixel.0;
        let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        let v = if luma > cutoff { 255 } else { 0 };
        pixel.0 = [v, v, v];
    }
}

/// Turn an image into an ordered draw plan.
///
/// - `img`: decoded source image, any size
/// - `palette`: inks to classify against
/// - `params`: resize, stride and monochrome settings
///
/// The canvas is walked column by column (outer x, inner y) at `stride`
/// spacing. Points that classify as the background color are dropped.
///
/// Returns the plan in drawing order
pub fn sample(img: &DynamicImage, palette: &Palette, params: &SampleParams) -> DrawPlan {
    let (width, height) = params.canvas_size();
    let mut canvas = fit_to_canvas(img, width, height);
    if params.monochrome {
        monochrome(&mut canvas);
    }

    let stride = params.stride.max(1) as usize;
    let mut points = Vec::new();
    for x in (0..width).step_by(stride) {
        for y in (0..height).step_by(stride) {
            let color = palette.classify(*canvas.get_pixel(x, y));
            if color.is_skip() {
                continue;
            }
            points.push(SamplePoint::new(color.clone(), x, y));
        }
    }

    info!(
        points = points.len(),
        width,
        height,
        stride = params.stride,
        monochrome = params.monochrome,
        "image sampled"
    );
    DrawPlan::new(points)
}
